use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::correlation::CorrelationId;
use crate::error::{GrantError, GrantResult, UpstreamCall, UpstreamContext};

/// Object identifier bound into an upload token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upload grant minted by the grant authority. Not renewable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedGrant {
    pub identifier: String,
    #[serde(alias = "signedURL")]
    pub signed_url: String,
    #[serde(alias = "jwtToken")]
    pub bound_token: String,
    /// Unix timestamp (seconds) after which the signed URL is no longer honoured
    pub expiry: i64,
}

impl SignedGrant {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expiry, 0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|at| at <= now).unwrap_or(true)
    }
}

/// Download grant as returned by the grant authority.
///
/// A well-formed grant has exactly one of `signed_url` / `public_url` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadGrant {
    pub token: String,
    #[serde(default, alias = "signedURL")]
    pub signed_url: String,
    #[serde(default)]
    pub expiry: i64,
    #[serde(default, alias = "publicURL")]
    pub public_url: String,
}

/// Download grant reduced to the single URL the client should follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDownload {
    pub token: String,
    pub url: String,
    pub is_public: bool,
    pub expiry: i64,
}

impl DownloadGrant {
    /// Pick the public URL for public objects, the signed URL otherwise.
    ///
    /// A grant with neither URL is a malformed authority response and never resolves to
    /// an empty redirect.
    pub fn resolve(&self, correlation_id: &CorrelationId) -> GrantResult<ResolvedDownload> {
        let (url, is_public) = if !self.public_url.trim().is_empty() {
            (self.public_url.clone(), true)
        } else if !self.signed_url.trim().is_empty() {
            (self.signed_url.clone(), false)
        } else {
            return Err(GrantError::DecodeFailure {
                context: UpstreamContext::new(
                    UpstreamCall::DownloadRequest,
                    correlation_id.clone(),
                ),
                message: format!("download grant for token {} has no URL", self.token),
            });
        };

        Ok(ResolvedDownload {
            token: self.token.clone(),
            url,
            is_public,
            expiry: self.expiry,
        })
    }
}
