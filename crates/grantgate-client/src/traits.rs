use async_trait::async_trait;
use bytes::Bytes;
use grantgate_core::{CorrelationId, DownloadGrant, GrantResult, SignedGrant, TokenStatus};

use crate::wire::{DownloadRequest, Jwks, UploadDescriptor};

/// Upstream grant, status and key authority.
///
/// Implementations must be usable from many tasks at once. Every call carries the
/// correlation id of the inbound request so the authority can tie its logs to ours.
#[async_trait]
pub trait GrantAuthority: Send + Sync {
    /// `POST /upload/bulkRequest` for one content-type partition.
    async fn request_upload_grants(
        &self,
        correlation_id: &CorrelationId,
        descriptors: &[UploadDescriptor],
    ) -> GrantResult<Vec<SignedGrant>>;

    /// `POST /download/request`
    async fn request_download_grants(
        &self,
        correlation_id: &CorrelationId,
        request: &DownloadRequest,
    ) -> GrantResult<Vec<DownloadGrant>>;

    /// `POST /upload/check`
    async fn check_upload_status(
        &self,
        correlation_id: &CorrelationId,
        tokens: &[String],
    ) -> GrantResult<Vec<TokenStatus>>;

    /// `GET /.well-known/jwks`
    async fn fetch_key_set(&self, correlation_id: &CorrelationId) -> GrantResult<Jwks>;

    /// Raw PUT of object bytes to a previously granted URL.
    async fn put_object(
        &self,
        correlation_id: &CorrelationId,
        signed_url: &str,
        content_type: &str,
        body: Bytes,
    ) -> GrantResult<()>;
}
