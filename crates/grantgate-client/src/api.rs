//! Upstream endpoints implemented on [`HttpAuthority`].

use async_trait::async_trait;
use bytes::Bytes;
use grantgate_core::{
    CorrelationId, DownloadGrant, GrantError, GrantResult, SignedGrant, TokenStatus, UpstreamCall,
};
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE};

use crate::traits::GrantAuthority;
use crate::wire::{DownloadRequest, Jwks, UploadCheckRequest, UploadDescriptor};
use crate::{send, with_correlation, HttpAuthority, OBJECT_PUT_CONTENT_RANGE};

pub const BULK_UPLOAD_PATH: &str = "/upload/bulkRequest";
pub const DOWNLOAD_REQUEST_PATH: &str = "/download/request";
pub const UPLOAD_CHECK_PATH: &str = "/upload/check";
pub const JWKS_PATH: &str = "/.well-known/jwks";

#[async_trait]
impl GrantAuthority for HttpAuthority {
    async fn request_upload_grants(
        &self,
        correlation_id: &CorrelationId,
        descriptors: &[UploadDescriptor],
    ) -> GrantResult<Vec<SignedGrant>> {
        let grants: Vec<SignedGrant> = self
            .post_enveloped(
                UpstreamCall::BulkUploadRequest,
                BULK_UPLOAD_PATH,
                correlation_id,
                descriptors,
            )
            .await?;

        tracing::debug!(
            correlation_id = %correlation_id,
            requested = descriptors.len(),
            granted = grants.len(),
            "Upload grants received"
        );
        Ok(grants)
    }

    async fn request_download_grants(
        &self,
        correlation_id: &CorrelationId,
        request: &DownloadRequest,
    ) -> GrantResult<Vec<DownloadGrant>> {
        self.post_enveloped(
            UpstreamCall::DownloadRequest,
            DOWNLOAD_REQUEST_PATH,
            correlation_id,
            request,
        )
        .await
    }

    async fn check_upload_status(
        &self,
        correlation_id: &CorrelationId,
        tokens: &[String],
    ) -> GrantResult<Vec<TokenStatus>> {
        let body = UploadCheckRequest {
            tokens: tokens.to_vec(),
        };
        self.post_enveloped(
            UpstreamCall::UploadCheck,
            UPLOAD_CHECK_PATH,
            correlation_id,
            &body,
        )
        .await
    }

    async fn fetch_key_set(&self, correlation_id: &CorrelationId) -> GrantResult<Jwks> {
        self.get_document(UpstreamCall::Jwks, JWKS_PATH, correlation_id)
            .await
    }

    async fn put_object(
        &self,
        correlation_id: &CorrelationId,
        signed_url: &str,
        content_type: &str,
        body: Bytes,
    ) -> GrantResult<()> {
        if signed_url.is_empty() {
            return Err(GrantError::InvalidRequest(
                "signed URL must not be empty".to_string(),
            ));
        }

        let size = body.len();
        let request = self
            .raw_put(signed_url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_RANGE, OBJECT_PUT_CONTENT_RANGE)
            .body(body);
        send(
            UpstreamCall::ObjectPut,
            correlation_id,
            with_correlation(request, correlation_id),
        )
        .await?;

        tracing::info!(
            correlation_id = %correlation_id,
            content_type = %content_type,
            size_bytes = size,
            "Object uploaded to granted URL"
        );
        Ok(())
    }
}
