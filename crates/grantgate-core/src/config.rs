//! Configuration module
//!
//! Process configuration for the grant subsystem, read from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const DOWNLOAD_EXPIRY_SECS: u64 = 10_000;
const RETRY_MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 200;
const RETRY_MAX_DELAY_MS: u64 = 5_000;
const GATE_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_SERVICE_NAME: &str = "grantgate";
const DEFAULT_TRANSIENT_CODES: &str = "SERVICE_UNAVAILABLE,TOO_MANY_REQUESTS,REQUEST_TIMEOUT";

/// How bound tokens are checked.
///
/// Fixed when the verifier is built; never switched per call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationMode {
    /// Fetch the authority's `/.well-known/jwks` once at startup
    Jwks,
    /// Load a JWKS document from disk
    Static { jwks_path: PathBuf },
    /// Decode without signature checks. Trusted internal deployments only.
    PassThrough,
}

/// What happens when one content-type partition fails upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Any failed partition fails the whole call
    #[default]
    FailFast,
    /// Successful partitions are returned next to per-partition failures
    PartialSuccess,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_delay_ms: RETRY_BASE_DELAY_MS,
            max_delay_ms: RETRY_MAX_DELAY_MS,
        }
    }
}

/// Grant subsystem configuration
#[derive(Clone, Debug)]
pub struct GrantGateConfig {
    pub authority_url: String,
    pub verification_mode: VerificationMode,
    pub service_name: String,
    pub request_timeout_secs: u64,
    pub download_expiry_secs: u64,
    pub batch_mode: BatchMode,
    pub retry: RetrySettings,
    pub gate_poll_interval_ms: u64,
    /// Upstream error codes that are safe to retry
    pub transient_error_codes: Vec<String>,
    pub environment: String,
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, anyhow::Error>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a number, got '{}'", key, raw)),
        None => Ok(default),
    }
}

impl GrantGateConfig {
    /// Configuration with defaults for everything but the authority URL.
    pub fn new(authority_url: impl Into<String>) -> Self {
        Self {
            authority_url: authority_url.into().trim_end_matches('/').to_string(),
            verification_mode: VerificationMode::Jwks,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            download_expiry_secs: DOWNLOAD_EXPIRY_SECS,
            batch_mode: BatchMode::FailFast,
            retry: RetrySettings::default(),
            gate_poll_interval_ms: GATE_POLL_INTERVAL_MS,
            transient_error_codes: split_codes(DEFAULT_TRANSIENT_CODES),
            environment: "development".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let authority_url = lookup("GRANTGATE_AUTHORITY_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("GRANTGATE_AUTHORITY_URL must be set"))?;

        let verification_mode = match lookup("GRANTGATE_VERIFICATION_MODE")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            None | Some("jwks") => VerificationMode::Jwks,
            Some("static") => {
                let jwks_path = lookup("GRANTGATE_JWKS_PATH").ok_or_else(|| {
                    anyhow!(
                        "GRANTGATE_JWKS_PATH must be set when GRANTGATE_VERIFICATION_MODE=static"
                    )
                })?;
                VerificationMode::Static {
                    jwks_path: PathBuf::from(jwks_path),
                }
            }
            Some("passthrough") => VerificationMode::PassThrough,
            Some(other) => {
                return Err(anyhow!(
                    "GRANTGATE_VERIFICATION_MODE must be one of jwks, static, passthrough; got '{}'",
                    other
                ))
            }
        };

        let batch_mode = match lookup("GRANTGATE_BATCH_MODE")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            None | Some("fail_fast") => BatchMode::FailFast,
            Some("partial_success") => BatchMode::PartialSuccess,
            Some(other) => {
                return Err(anyhow!(
                    "GRANTGATE_BATCH_MODE must be fail_fast or partial_success; got '{}'",
                    other
                ))
            }
        };

        let mut config = Self::new(authority_url);
        config.verification_mode = verification_mode;
        config.batch_mode = batch_mode;
        if let Some(name) = lookup("GRANTGATE_SERVICE_NAME").filter(|v| !v.trim().is_empty()) {
            config.service_name = name;
        }
        config.request_timeout_secs =
            parse_number(&lookup, "GRANTGATE_REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)?;
        config.download_expiry_secs =
            parse_number(&lookup, "GRANTGATE_DOWNLOAD_EXPIRY_SECS", DOWNLOAD_EXPIRY_SECS)?;
        config.retry = RetrySettings {
            max_attempts: parse_number(
                &lookup,
                "GRANTGATE_RETRY_MAX_ATTEMPTS",
                RETRY_MAX_ATTEMPTS,
            )?,
            base_delay_ms: parse_number(
                &lookup,
                "GRANTGATE_RETRY_BASE_DELAY_MS",
                RETRY_BASE_DELAY_MS,
            )?,
            max_delay_ms: parse_number(
                &lookup,
                "GRANTGATE_RETRY_MAX_DELAY_MS",
                RETRY_MAX_DELAY_MS,
            )?,
        };
        config.gate_poll_interval_ms =
            parse_number(&lookup, "GRANTGATE_GATE_POLL_INTERVAL_MS", GATE_POLL_INTERVAL_MS)?;
        if let Some(codes) = lookup("GRANTGATE_TRANSIENT_ERROR_CODES") {
            config.transient_error_codes = split_codes(&codes);
        }
        if let Some(environment) = lookup("ENVIRONMENT").or_else(|| lookup("APP_ENV")) {
            config.environment = environment;
        }

        config.validate()?;

        if config.verification_mode == VerificationMode::PassThrough {
            tracing::warn!(
                environment = %config.environment,
                "Bound tokens will be decoded WITHOUT signature verification"
            );
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.authority_url.starts_with("http://") && !self.authority_url.starts_with("https://")
        {
            return Err(anyhow!(
                "GRANTGATE_AUTHORITY_URL must be an http(s) URL, got '{}'",
                self.authority_url
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("GRANTGATE_REQUEST_TIMEOUT_SECS must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("GRANTGATE_RETRY_MAX_ATTEMPTS must be at least 1"));
        }
        if self.gate_poll_interval_ms == 0 {
            return Err(anyhow!("GRANTGATE_GATE_POLL_INTERVAL_MS must be greater than 0"));
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn gate_poll_interval(&self) -> Duration {
        Duration::from_millis(self.gate_poll_interval_ms)
    }
}

fn split_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_only_authority_url() {
        let config = GrantGateConfig::from_lookup(lookup_from(&[(
            "GRANTGATE_AUTHORITY_URL",
            "https://upload.example.com/",
        )]))
        .unwrap();
        assert_eq!(config.authority_url, "https://upload.example.com");
        assert_eq!(config.verification_mode, VerificationMode::Jwks);
        assert_eq!(config.batch_mode, BatchMode::FailFast);
        assert_eq!(config.download_expiry_secs, 10_000);
        assert_eq!(config.retry, RetrySettings::default());
        assert!(config
            .transient_error_codes
            .contains(&"TOO_MANY_REQUESTS".to_string()));
    }

    #[test]
    fn authority_url_is_required() {
        assert!(GrantGateConfig::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn passthrough_must_be_explicit() {
        let config = GrantGateConfig::from_lookup(lookup_from(&[
            ("GRANTGATE_AUTHORITY_URL", "http://localhost:9000"),
            ("GRANTGATE_VERIFICATION_MODE", "passthrough"),
        ]))
        .unwrap();
        assert_eq!(config.verification_mode, VerificationMode::PassThrough);

        let err = GrantGateConfig::from_lookup(lookup_from(&[
            ("GRANTGATE_AUTHORITY_URL", "http://localhost:9000"),
            ("GRANTGATE_VERIFICATION_MODE", "none"),
        ]));
        assert!(err.is_err());
    }

    #[test]
    fn static_mode_needs_a_path() {
        assert!(GrantGateConfig::from_lookup(lookup_from(&[
            ("GRANTGATE_AUTHORITY_URL", "http://localhost:9000"),
            ("GRANTGATE_VERIFICATION_MODE", "static"),
        ]))
        .is_err());

        let config = GrantGateConfig::from_lookup(lookup_from(&[
            ("GRANTGATE_AUTHORITY_URL", "http://localhost:9000"),
            ("GRANTGATE_VERIFICATION_MODE", "static"),
            ("GRANTGATE_JWKS_PATH", "/etc/grantgate/jwks.json"),
        ]))
        .unwrap();
        assert_eq!(
            config.verification_mode,
            VerificationMode::Static {
                jwks_path: PathBuf::from("/etc/grantgate/jwks.json")
            }
        );
    }

    #[test]
    fn invalid_numbers_are_errors_not_defaults() {
        let result = GrantGateConfig::from_lookup(lookup_from(&[
            ("GRANTGATE_AUTHORITY_URL", "http://localhost:9000"),
            ("GRANTGATE_REQUEST_TIMEOUT_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn partial_success_and_overrides() {
        let config = GrantGateConfig::from_lookup(lookup_from(&[
            ("GRANTGATE_AUTHORITY_URL", "http://localhost:9000"),
            ("GRANTGATE_BATCH_MODE", "partial_success"),
            ("GRANTGATE_RETRY_MAX_ATTEMPTS", "5"),
            ("GRANTGATE_TRANSIENT_ERROR_CODES", "busy, throttled"),
            ("ENVIRONMENT", "production"),
        ]))
        .unwrap();
        assert_eq!(config.batch_mode, BatchMode::PartialSuccess);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.transient_error_codes,
            vec!["BUSY".to_string(), "THROTTLED".to_string()]
        );
        assert!(config.is_production());
    }
}
