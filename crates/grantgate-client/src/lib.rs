//! HTTP client for the upstream grant authority.
//!
//! [`HttpAuthority`] speaks the authority's JSON protocol over `reqwest`: bulk upload grant
//! requests, download grant requests, upload status checks, the public key set, and the raw
//! object PUT to a granted URL. The service layer only sees the [`GrantAuthority`] trait.

pub mod api;
pub mod traits;
pub mod wire;

pub use traits::GrantAuthority;
pub use wire::{
    ApiEnvelope, ApiErrorItem, DownloadRequest, ErrorEnvelope, Jwk, Jwks, UploadCheckRequest,
    UploadDescriptor,
};

use std::time::Duration;

use grantgate_core::correlation::CORRELATION_HEADER;
use grantgate_core::{CorrelationId, GrantError, GrantGateConfig, GrantResult, UpstreamCall};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Content-Range sent with every raw object PUT
pub const OBJECT_PUT_CONTENT_RANGE: &str = "bytes 0-*/*";

/// HTTP client for the upstream authority.
#[derive(Clone, Debug)]
pub struct HttpAuthority {
    client: Client,
    base_url: String,
}

impl HttpAuthority {
    pub fn new(base_url: &str, timeout: Duration) -> GrantResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                GrantError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GrantGateConfig) -> GrantResult<Self> {
        Self::new(&config.authority_url, config.request_timeout())
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and unwrap the `data` field of the success envelope.
    pub(crate) async fn post_enveloped<T, B>(
        &self,
        call: UpstreamCall,
        path: &str,
        correlation_id: &CorrelationId,
        body: &B,
    ) -> GrantResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.build_url(path);
        tracing::debug!(
            call = %call,
            correlation_id = %correlation_id,
            url = %url,
            "Calling grant authority"
        );

        let request = self.client.post(&url).json(body);
        let response =
            send(call, correlation_id, with_correlation(request, correlation_id)).await?;
        let envelope: ApiEnvelope<T> = read_json(call, correlation_id, response).await?;

        envelope.data.ok_or_else(|| {
            GrantError::decode_failure(call, correlation_id, "response envelope has no data")
        })
    }

    /// GET a bare (non-enveloped) JSON document.
    pub(crate) async fn get_document<T: DeserializeOwned>(
        &self,
        call: UpstreamCall,
        path: &str,
        correlation_id: &CorrelationId,
    ) -> GrantResult<T> {
        let url = self.build_url(path);
        tracing::debug!(
            call = %call,
            correlation_id = %correlation_id,
            url = %url,
            "Fetching document"
        );

        let request = with_correlation(self.client.get(&url), correlation_id);
        let response = send(call, correlation_id, request).await?;
        read_json(call, correlation_id, response).await
    }

    pub(crate) fn raw_put(&self, url: &str) -> RequestBuilder {
        self.client.put(url)
    }
}

pub(crate) fn with_correlation(
    request: RequestBuilder,
    correlation_id: &CorrelationId,
) -> RequestBuilder {
    request.header(CORRELATION_HEADER, correlation_id.as_str())
}

/// Send the request and map failures to [`GrantError`].
///
/// Transport errors (connect, timeout, reset) become `UpstreamUnavailable`; non-2xx
/// answers are classified by [`rejection_from_body`].
pub(crate) async fn send(
    call: UpstreamCall,
    correlation_id: &CorrelationId,
    request: RequestBuilder,
) -> GrantResult<Response> {
    let response = request.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            format!("request timed out: {}", e)
        } else {
            format!("request failed: {}", e)
        };
        tracing::warn!(
            call = %call,
            correlation_id = %correlation_id,
            error = %message,
            "Upstream call failed"
        );
        GrantError::unavailable(call, correlation_id, message)
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    tracing::error!(
        call = %call,
        correlation_id = %correlation_id,
        status = status.as_u16(),
        body = %error_text,
        "Upstream call returned an error response"
    );
    Err(rejection_from_body(call, correlation_id, status, &error_text))
}

/// Classify a non-2xx answer.
///
/// A structured error list yields `UpstreamRejected` with the first entry's code and
/// message verbatim. Without one, 502/503/504 are treated as unavailability and every
/// other status as a rejection coded `HTTP_<status>`.
pub fn rejection_from_body(
    call: UpstreamCall,
    correlation_id: &CorrelationId,
    status: StatusCode,
    body: &str,
) -> GrantError {
    let first = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.errors.into_iter().next());

    match first {
        Some(item) => GrantError::UpstreamRejected {
            context: grantgate_core::UpstreamContext::new(call, correlation_id.clone()),
            code: item.code,
            message: item.message,
            http_status: Some(status.as_u16()),
        },
        None if matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ) =>
        {
            GrantError::unavailable(call, correlation_id, format!("status {}", status))
        }
        None => GrantError::UpstreamRejected {
            context: grantgate_core::UpstreamContext::new(call, correlation_id.clone()),
            code: format!("HTTP_{}", status.as_u16()),
            message: if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("upstream error").to_string()
            } else {
                body.trim().to_string()
            },
            http_status: Some(status.as_u16()),
        },
    }
}

async fn read_json<T: DeserializeOwned>(
    call: UpstreamCall,
    correlation_id: &CorrelationId,
    response: Response,
) -> GrantResult<T> {
    let bytes = response.bytes().await.map_err(|e| {
        GrantError::unavailable(call, correlation_id, format!("failed to read body: {}", e))
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        GrantError::decode_failure(call, correlation_id, format!("invalid JSON body: {}", e))
    })
}
