//! Bound-token verification against the authority's public keys.

pub mod jwks;
pub mod key_cache;
pub mod verifier;

pub use jwks::{jwk_to_verification_key, KeySet, VerificationKey};
pub use key_cache::KeySetCache;
pub use verifier::{TokenVerifier, BINDING_CLAIM};
