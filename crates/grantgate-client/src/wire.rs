//! Wire types exchanged with the upstream authority.
//!
//! Success bodies are wrapped as `{ "message": ..., "data": ... }` and error bodies as
//! `{ "errors": [{ "reqId", "code", "message" }] }`. The JWKS document is not wrapped.

use grantgate_core::{AssetCategory, EnrichedRequest, UploadMetadata};
use serde::{Deserialize, Serialize};

/// Success envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorItem {
    #[serde(default, rename = "reqId")]
    pub req_id: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Error envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

/// One object in a `POST /upload/bulkRequest` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDescriptor {
    pub identifier: String,
    pub file_name: String,
    pub service_name: String,
    pub category: AssetCategory,
    pub is_public: bool,
    #[serde(flatten)]
    pub metadata: UploadMetadata,
}

impl UploadDescriptor {
    pub fn from_enriched(request: &EnrichedRequest, service_name: &str) -> Self {
        Self {
            identifier: request.identifier.clone(),
            file_name: request.file_name.clone(),
            service_name: service_name.to_string(),
            category: request.category,
            is_public: request.is_public,
            metadata: request.metadata.clone(),
        }
    }

    pub fn content_type(&self) -> &str {
        self.metadata.content_type()
    }
}

/// `POST /download/request` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub tokens: Vec<String>,
    pub expiry_in_seconds: u64,
}

/// `POST /upload/check` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCheckRequest {
    pub tokens: Vec<String>,
}

/// JWKS (JSON Web Key Set) structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// JSON Web Key structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(rename = "kty")]
    pub key_type: String,
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(rename = "alg", default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub modulus: Option<String>, // For RSA
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub exponent: Option<String>, // For RSA
    #[serde(rename = "x", default, skip_serializing_if = "Option::is_none")]
    pub x_coordinate: Option<String>, // For EC
    #[serde(rename = "y", default, skip_serializing_if = "Option::is_none")]
    pub y_coordinate: Option<String>, // For EC
    #[serde(rename = "crv", default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>, // For EC
}
