//! Grantgate services
//!
//! Batching orchestration, bound-token verification, the upload-completion gate and the
//! [`GrantService`] facade that sequences them. Upstream I/O goes through
//! [`grantgate_client::GrantAuthority`].

pub mod auth;
pub mod gate;
pub mod orchestrator;
pub mod retry;
pub mod service;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use auth::{KeySet, KeySetCache, TokenVerifier, BINDING_CLAIM};
pub use gate::CompletionGate;
pub use orchestrator::{BatchOutcome, BatchingOrchestrator, PartitionFailure};
pub use retry::RetryPolicy;
pub use service::{GrantService, IssuedGrant, UploadBatchResult};
