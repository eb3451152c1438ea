//! Grantgate Core Library
//!
//! This crate provides the domain models, constraint catalog, request enrichment,
//! error taxonomy and configuration shared by every grantgate component.
//! Nothing in here performs I/O; upstream calls live in `grantgate-client`.

pub mod catalog;
pub mod config;
pub mod correlation;
pub mod enrichment;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use catalog::{allowed_content_types, constraints_for, SPREADSHEET_CONTENT_TYPE};
pub use config::{BatchMode, GrantGateConfig, RetrySettings, VerificationMode};
pub use correlation::CorrelationId;
pub use enrichment::{enrich, partition_by_content_type};
pub use error::{ErrorMetadata, GrantError, GrantResult, LogLevel, UpstreamCall, UpstreamContext};
pub use models::{
    AssetCategory, ConstraintTemplate, DocumentConstraint, DownloadGrant, EnrichedRequest,
    ImageConstraint, ObjectId, ResolvedDownload, SignedGrant, TokenStatus, UploadMetadata, UploadRequest,
    UploadStatus, VideoConstraint,
};
