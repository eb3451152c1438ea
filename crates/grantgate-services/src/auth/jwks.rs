//! Conversion of a JWKS document into verification keys.

use grantgate_client::{Jwk, Jwks};
use grantgate_core::{GrantError, GrantResult};
use jsonwebtoken::{Algorithm, DecodingKey};

/// One usable public key from the authority's key set.
#[derive(Clone)]
pub struct VerificationKey {
    pub key_id: Option<String>,
    pub algorithm: Algorithm,
    pub key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Immutable set of verification keys. Replaced as a whole on rotation.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<VerificationKey>,
}

impl KeySet {
    /// Build a key set, skipping keys that cannot be used for verification.
    ///
    /// Fails when no key in the document is usable.
    pub fn from_jwks(jwks: &Jwks) -> GrantResult<Self> {
        let mut keys = Vec::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            match jwk_to_verification_key(jwk) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    tracing::warn!(
                        key_id = ?jwk.key_id,
                        key_type = %jwk.key_type,
                        error = %e,
                        "Skipping unusable JWKS key"
                    );
                }
            }
        }

        if keys.is_empty() {
            return Err(GrantError::Configuration(
                "JWKS contains no usable verification keys".to_string(),
            ));
        }
        Ok(Self { keys })
    }

    /// Key for a token header's `kid`; the first key when the header has none.
    pub fn select(&self, kid: Option<&str>) -> Option<&VerificationKey> {
        match kid {
            Some(kid) => self
                .keys
                .iter()
                .find(|k| k.key_id.as_deref() == Some(kid)),
            None => self.keys.first(),
        }
    }

    pub fn key_ids(&self) -> Vec<String> {
        self.keys.iter().filter_map(|k| k.key_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn rsa_algorithm(declared: Option<&str>) -> GrantResult<Algorithm> {
    match declared {
        None | Some("RS256") => Ok(Algorithm::RS256),
        Some("RS384") => Ok(Algorithm::RS384),
        Some("RS512") => Ok(Algorithm::RS512),
        Some(other) => Err(GrantError::Configuration(format!(
            "Unsupported RSA algorithm: {}",
            other
        ))),
    }
}

/// Convert JWK to a verification key
pub fn jwk_to_verification_key(jwk: &Jwk) -> GrantResult<VerificationKey> {
    let (algorithm, key) = match jwk.key_type.as_str() {
        "RSA" => {
            let n = jwk.modulus.as_ref().ok_or_else(|| {
                GrantError::Configuration("RSA key missing modulus".to_string())
            })?;
            let e = jwk.exponent.as_ref().ok_or_else(|| {
                GrantError::Configuration("RSA key missing exponent".to_string())
            })?;

            let key = DecodingKey::from_rsa_components(n, e).map_err(|e| {
                GrantError::Configuration(format!("Failed to create RSA key: {}", e))
            })?;
            (rsa_algorithm(jwk.algorithm.as_deref())?, key)
        }
        "EC" => {
            let x = jwk.x_coordinate.as_ref().ok_or_else(|| {
                GrantError::Configuration("EC key missing x coordinate".to_string())
            })?;
            let y = jwk.y_coordinate.as_ref().ok_or_else(|| {
                GrantError::Configuration("EC key missing y coordinate".to_string())
            })?;
            let curve = jwk
                .curve
                .as_ref()
                .ok_or_else(|| GrantError::Configuration("EC key missing curve".to_string()))?;

            if curve != "P-256" {
                return Err(GrantError::Configuration(format!(
                    "Unsupported EC curve: {} (only P-256 is supported)",
                    curve
                )));
            }

            let key = DecodingKey::from_ec_components(x, y).map_err(|e| {
                GrantError::Configuration(format!("Failed to create EC key: {}", e))
            })?;
            (Algorithm::ES256, key)
        }
        _ => {
            return Err(GrantError::Configuration(format!(
                "Unsupported key type: {}",
                jwk.key_type
            )))
        }
    };

    Ok(VerificationKey {
        key_id: jwk.key_id.clone(),
        algorithm,
        key,
    })
}
