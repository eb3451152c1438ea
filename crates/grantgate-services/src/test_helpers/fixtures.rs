//! Fixture signing keys and token minting.
//!
//! The PEM files are throwaway 2048-bit keys generated for tests only.

use grantgate_client::{Jwk, Jwks};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

pub const SIGNING_KEY_ID: &str = "grantgate-test-1";
pub const FOREIGN_KEY_ID: &str = "grantgate-test-2";

const SIGNING_KEY_PEM: &str = include_str!("signing_key.pem");
const FOREIGN_KEY_PEM: &str = include_str!("foreign_key.pem");

const SIGNING_KEY_MODULUS: &str = "34tBBeLOR_pUyvhlUTtDny1Et4ocLMRmbAf-QgEheoVvLNa_IzBhLY645aYsfZDVTNt9WKYVJxWAp5XIMa1vaN82zNiI247CYKf6kPxbRPqrqnxTcBbyfKc5x0nhm4JHQjqXegPBbkXjtlkJo_5aGncxklQPCbP1E-Svh5uVI-XtPLHxViRfQChf3k9zGb74X5hFikOZFHOiw-X_UWu_jY9Jbjng8A8u3zD9QSljVZuWYIayeC2VUoZZt01_oTyRH9bBA3CkjJs0PLEVky0HqPgJYxgDDB6VwTKYAl5FMleIFagvKyY0oHhIkdn10Fh40tVAbbCFBlHtQ0wcUNQa3w";
const FOREIGN_KEY_MODULUS: &str = "vNoN5V-BAC2lUQI-ZtIjXAbuwwgYOdMlVQPSut1yELIN_7H-Sw5UoE3wG0Xw_TeNMli34RJJeZj8Ljj0OwFvkhHe5g5BeOjChZO2sVEg7S6048sqEgbxObhjcdysjR3MBpGeVfpxX5hri7y67Rly1eZz4ijEKjzG7OOEugWFj5etz1gDrFBFYcoNqZHLu9aF_6gz5S7wpeVHnE0u650ExJuv-0qsf57VU-Zd1_n-vki-gFuvt5Vcu-llC31WbLNBVa1TmsZJUDGRvi9fL2zMcILkVPS6J5jqj5NplbLmM8HxUde7QVmhEJWeJ2R9oaQmmjiLPddYCha6PxJtfsUt7Q";
const RSA_EXPONENT: &str = "AQAB";

fn rsa_jwk(kid: &str, modulus: &str) -> Jwk {
    Jwk {
        key_type: "RSA".to_string(),
        key_id: Some(kid.to_string()),
        key_use: Some("sig".to_string()),
        algorithm: Some("RS256".to_string()),
        modulus: Some(modulus.to_string()),
        exponent: Some(RSA_EXPONENT.to_string()),
        x_coordinate: None,
        y_coordinate: None,
        curve: None,
    }
}

/// Key set the fake authority publishes by default
pub fn signing_jwks() -> Jwks {
    Jwks {
        keys: vec![rsa_jwk(SIGNING_KEY_ID, SIGNING_KEY_MODULUS)],
    }
}

/// Key set containing only the foreign key, used to simulate rotation
pub fn foreign_jwks() -> Jwks {
    Jwks {
        keys: vec![rsa_jwk(FOREIGN_KEY_ID, FOREIGN_KEY_MODULUS)],
    }
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn mint_with(pem: &str, claims: &Value, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key is valid PEM");
    encode(&header, claims, &key).expect("fixture token encodes")
}

/// Sign arbitrary claims with the published signing key.
pub fn mint_token(claims: &Value, kid: Option<&str>) -> String {
    mint_with(SIGNING_KEY_PEM, claims, kid)
}

/// Sign arbitrary claims with a key the authority never published.
pub fn mint_foreign_token(claims: &Value, kid: Option<&str>) -> String {
    mint_with(FOREIGN_KEY_PEM, claims, kid)
}

/// Bound token for `object_id`, valid for fifteen minutes.
pub fn signed_token(object_id: &str) -> String {
    mint_token(
        &json!({ "token": object_id, "exp": unix_now() + 900 }),
        Some(SIGNING_KEY_ID),
    )
}

pub fn foreign_token(object_id: &str, kid: Option<&str>) -> String {
    mint_foreign_token(&json!({ "token": object_id, "exp": unix_now() + 900 }), kid)
}
