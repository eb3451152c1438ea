//! Bound-token verification
//!
//! A bound token is a JWT issued by the grant authority whose `token` claim names the
//! stored object. In verified mode the signature and expiry are checked against the
//! cached key set; pass-through mode only decodes and must be chosen explicitly.

use std::collections::HashSet;
use std::sync::Arc;

use grantgate_core::{GrantError, GrantResult, ObjectId};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use super::key_cache::KeySetCache;

/// Claim carrying the object binding
pub const BINDING_CLAIM: &str = "token";

enum Mode {
    Verified(Arc<KeySetCache>),
    PassThrough,
}

/// Extracts the object identifier from bound tokens.
///
/// The mode is fixed at construction.
pub struct TokenVerifier {
    mode: Mode,
}

impl TokenVerifier {
    pub fn verified(keys: Arc<KeySetCache>) -> Self {
        Self {
            mode: Mode::Verified(keys),
        }
    }

    /// Decode tokens without checking signature or expiry.
    pub fn pass_through() -> Self {
        tracing::warn!("Token verifier running in pass-through mode; signatures are not checked");
        Self {
            mode: Mode::PassThrough,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self.mode, Mode::PassThrough)
    }

    /// Key cache backing verified mode
    pub fn key_cache(&self) -> Option<&Arc<KeySetCache>> {
        match &self.mode {
            Mode::Verified(keys) => Some(keys),
            Mode::PassThrough => None,
        }
    }

    pub async fn verify(&self, token: &str) -> GrantResult<ObjectId> {
        if token.trim().is_empty() {
            return Err(GrantError::InvalidToken("token is empty".to_string()));
        }

        let claims = match &self.mode {
            Mode::Verified(keys) => verify_signed(keys, token).await?,
            Mode::PassThrough => decode_unverified(token)?,
        };

        binding_from_claims(&claims)
    }
}

async fn verify_signed(keys: &KeySetCache, token: &str) -> GrantResult<Map<String, Value>> {
    let header = decode_header(token)
        .map_err(|e| GrantError::InvalidToken(format!("Invalid token header: {}", e)))?;

    let key_set = keys.current_key_set().await;
    let key = key_set.select(header.kid.as_deref()).ok_or_else(|| {
        GrantError::InvalidToken(format!(
            "Key ID {} not found in key set",
            header.kid.as_deref().unwrap_or("<none>")
        ))
    })?;

    if header.alg != key.algorithm {
        return Err(GrantError::InvalidToken(format!(
            "Unsupported algorithm: {:?}. Key expects {:?}",
            header.alg, key.algorithm
        )));
    }

    let mut validation = Validation::new(key.algorithm);
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.leeway = 0;

    let data = decode::<Map<String, Value>>(token, &key.key, &validation).map_err(|e| {
        tracing::debug!("Bound token validation failed: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                GrantError::InvalidToken("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                GrantError::InvalidToken("Token signature does not verify".to_string())
            }
            jsonwebtoken::errors::ErrorKind::ImmatureSignature => {
                GrantError::InvalidToken("Token is not yet valid (nbf)".to_string())
            }
            _ => GrantError::InvalidToken(format!("Invalid token: {}", e)),
        }
    })?;

    Ok(data.claims)
}

fn decode_unverified(token: &str) -> GrantResult<Map<String, Value>> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    decode::<Map<String, Value>>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| GrantError::InvalidToken(format!("Malformed token: {}", e)))
}

/// Render the binding claim as an object id. Non-string values use their JSON text.
fn binding_from_claims(claims: &Map<String, Value>) -> GrantResult<ObjectId> {
    let missing = || GrantError::MissingBinding {
        claim: BINDING_CLAIM.to_string(),
    };

    match claims.get(BINDING_CLAIM) {
        None | Some(Value::Null) => Err(missing()),
        Some(Value::String(s)) if s.is_empty() => Err(missing()),
        Some(Value::String(s)) => Ok(ObjectId::new(s.clone())),
        Some(other) => Ok(ObjectId::new(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        foreign_token, mint_foreign_token, mint_token, signed_token, signing_jwks, unix_now,
        SIGNING_KEY_ID,
    };
    use serde_json::json;

    fn verifier() -> TokenVerifier {
        TokenVerifier::verified(Arc::new(KeySetCache::from_jwks(&signing_jwks()).unwrap()))
    }

    #[tokio::test]
    async fn valid_token_yields_object_id() {
        let token = signed_token("obj-42");
        let id = verifier().verify(&token).await.unwrap();
        assert_eq!(id.as_str(), "obj-42");
    }

    #[tokio::test]
    async fn foreign_signature_is_rejected() {
        let err = verifier()
            .verify(&foreign_token("obj-42", Some(SIGNING_KEY_ID)))
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let token = mint_token(
            &json!({ "token": "obj-1", "exp": unix_now() - 60 }),
            Some(SIGNING_KEY_ID),
        );
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn unknown_kid_is_rejected_without_refresh() {
        let token = mint_token(&json!({ "token": "obj-1" }), Some("rotated-away"));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, GrantError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn token_without_kid_uses_first_key() {
        let token = mint_token(&json!({ "token": "obj-7", "exp": unix_now() + 60 }), None);
        assert_eq!(verifier().verify(&token).await.unwrap().as_str(), "obj-7");
    }

    #[tokio::test]
    async fn missing_claim_is_distinct_from_invalid_token() {
        let token = mint_token(&json!({ "sub": "someone" }), Some(SIGNING_KEY_ID));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, GrantError::MissingBinding { ref claim } if claim == "token"));

        let err = verifier().verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, GrantError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn numeric_claim_is_rendered_as_text() {
        let token = mint_token(&json!({ "token": 9001 }), Some(SIGNING_KEY_ID));
        assert_eq!(verifier().verify(&token).await.unwrap().as_str(), "9001");
    }

    #[tokio::test]
    async fn pass_through_skips_signature_and_expiry() {
        let verifier = TokenVerifier::pass_through();
        assert!(verifier.is_pass_through());

        let expired_foreign =
            mint_foreign_token(&json!({ "token": "obj-9", "exp": unix_now() - 600 }), None);
        assert_eq!(
            verifier.verify(&expired_foreign).await.unwrap().as_str(),
            "obj-9"
        );

        let err = verifier.verify("a.b").await.unwrap_err();
        assert!(matches!(err, GrantError::InvalidToken(_)));
    }
}
