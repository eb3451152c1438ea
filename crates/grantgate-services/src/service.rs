//! Grant service
//!
//! The operations exposed to the surrounding service layer: issue upload grants, verify a
//! bound token, and issue download grants behind the completion gate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::try_join_all;
use grantgate_client::{DownloadRequest, GrantAuthority};
use grantgate_core::{
    enrich, AssetCategory, BatchMode, CorrelationId, DownloadGrant, GrantError, GrantGateConfig,
    GrantResult, ObjectId, ResolvedDownload, SignedGrant, UploadRequest, UpstreamCall,
    VerificationMode,
};
use tokio_util::sync::CancellationToken;

use crate::auth::{KeySetCache, TokenVerifier};
use crate::gate::CompletionGate;
use crate::orchestrator::{BatchingOrchestrator, PartitionFailure};
use crate::retry::RetryPolicy;

/// An upload grant matched to the request it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedGrant {
    pub identifier: String,
    pub grant: SignedGrant,
    /// Object id bound into `grant.bound_token`
    pub object_id: ObjectId,
}

#[derive(Debug, Default)]
pub struct UploadBatchResult {
    /// Grants in request order
    pub issued: Vec<IssuedGrant>,
    /// Always empty in fail-fast mode
    pub failures: Vec<PartitionFailure>,
}

pub struct GrantService {
    authority: Arc<dyn GrantAuthority>,
    orchestrator: BatchingOrchestrator,
    verifier: Arc<TokenVerifier>,
    gate: CompletionGate,
    retry: RetryPolicy,
    batch_mode: BatchMode,
    download_expiry_secs: u64,
}

impl GrantService {
    pub fn new(
        config: &GrantGateConfig,
        authority: Arc<dyn GrantAuthority>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        let retry = RetryPolicy::from_config(config);
        Self {
            orchestrator: BatchingOrchestrator::new(
                authority.clone(),
                &config.service_name,
                retry.clone(),
            ),
            gate: CompletionGate::new(
                authority.clone(),
                config.gate_poll_interval(),
                retry.clone(),
            ),
            authority,
            verifier,
            retry,
            batch_mode: config.batch_mode,
            download_expiry_secs: config.download_expiry_secs,
        }
    }

    /// Build the verifier for the configured mode, then the service.
    ///
    /// In `jwks` mode the key set is fetched here; failing to fetch it is fatal.
    pub async fn connect(
        config: &GrantGateConfig,
        authority: Arc<dyn GrantAuthority>,
    ) -> GrantResult<Self> {
        let verifier = match &config.verification_mode {
            VerificationMode::Jwks => {
                let keys = KeySetCache::fetch(authority.clone(), &CorrelationId::generate()).await?;
                TokenVerifier::verified(Arc::new(keys))
            }
            VerificationMode::Static { jwks_path } => {
                TokenVerifier::verified(Arc::new(KeySetCache::from_file(jwks_path).await?))
            }
            VerificationMode::PassThrough => TokenVerifier::pass_through(),
        };
        Ok(Self::new(config, authority, Arc::new(verifier)))
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Validate, enrich and partition `requests`, then obtain one grant per request.
    ///
    /// Invalid input fails before any upstream call. Every returned bound token is
    /// verified before it is handed out.
    pub async fn issue_upload_grants(
        &self,
        correlation_id: &CorrelationId,
        category: AssetCategory,
        requests: &[UploadRequest],
    ) -> GrantResult<UploadBatchResult> {
        let enriched = enrich(category, requests)?;
        let order: Vec<String> = enriched.iter().map(|r| r.identifier.clone()).collect();

        let (grants, failures) = match self.batch_mode {
            BatchMode::FailFast => (
                self.orchestrator
                    .request_grants(correlation_id, enriched)
                    .await?,
                Vec::new(),
            ),
            BatchMode::PartialSuccess => {
                let outcome = self
                    .orchestrator
                    .request_grants_partial(correlation_id, enriched)
                    .await?;
                (outcome.grants, outcome.failures)
            }
        };

        let failed: Vec<&str> = failures
            .iter()
            .flat_map(|f| f.identifiers.iter().map(String::as_str))
            .collect();
        let expected: Vec<&str> = order
            .iter()
            .map(String::as_str)
            .filter(|id| !failed.contains(id))
            .collect();
        let grants = reassociate(correlation_id, &expected, grants)?;

        let issued = try_join_all(grants.into_iter().map(|grant| async move {
            let object_id = self.verifier.verify(&grant.bound_token).await?;
            Ok::<_, GrantError>(IssuedGrant {
                identifier: grant.identifier.clone(),
                grant,
                object_id,
            })
        }))
        .await?;

        tracing::info!(
            correlation_id = %correlation_id,
            category = %category,
            issued = issued.len(),
            failed_partitions = failures.len(),
            "Upload grants issued"
        );
        Ok(UploadBatchResult { issued, failures })
    }

    pub async fn verify_token(&self, token: &str) -> GrantResult<ObjectId> {
        self.verifier.verify(token).await
    }

    /// Re-verify `bound_tokens`, pass the completion gate, then request download grants.
    ///
    /// Returns one resolved download per token, in the order given.
    pub async fn issue_download_grant(
        &self,
        correlation_id: &CorrelationId,
        bound_tokens: &[String],
    ) -> GrantResult<Vec<ResolvedDownload>> {
        let upload_tokens = self.upload_tokens(bound_tokens).await?;
        self.gate.ensure_ready(correlation_id, &upload_tokens).await?;
        self.request_downloads(correlation_id, upload_tokens).await
    }

    /// Like [`issue_download_grant`](Self::issue_download_grant), but waits up to `timeout`
    /// for pending uploads to finish.
    pub async fn issue_download_grant_with_wait(
        &self,
        correlation_id: &CorrelationId,
        bound_tokens: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> GrantResult<Vec<ResolvedDownload>> {
        let upload_tokens = self.upload_tokens(bound_tokens).await?;
        self.gate
            .wait_until_ready(correlation_id, &upload_tokens, timeout, cancel)
            .await?;
        self.request_downloads(correlation_id, upload_tokens).await
    }

    /// PUT `body` to the URL of an unexpired upload grant.
    pub async fn upload_object(
        &self,
        correlation_id: &CorrelationId,
        grant: &SignedGrant,
        content_type: &str,
        body: Bytes,
    ) -> GrantResult<()> {
        if grant.is_expired_at(chrono::Utc::now()) {
            return Err(GrantError::InvalidRequest(format!(
                "upload grant for '{}' has expired; request a new one",
                grant.identifier
            )));
        }

        self.retry
            .run("object_put", || {
                self.authority.put_object(
                    correlation_id,
                    &grant.signed_url,
                    content_type,
                    body.clone(),
                )
            })
            .await
    }

    /// Reload the verification keys. No-op in pass-through mode.
    pub async fn refresh_keys(&self, correlation_id: &CorrelationId) -> GrantResult<()> {
        match self.verifier.key_cache() {
            Some(keys) => keys.refresh(correlation_id).await,
            None => Ok(()),
        }
    }

    async fn upload_tokens(&self, bound_tokens: &[String]) -> GrantResult<Vec<String>> {
        if bound_tokens.is_empty() {
            return Err(GrantError::InvalidRequest(
                "at least one token is required".to_string(),
            ));
        }

        let ids = try_join_all(bound_tokens.iter().map(|t| self.verifier.verify(t))).await?;

        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(duplicate) = ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(GrantError::InvalidRequest(format!(
                "object '{}' was presented more than once",
                duplicate
            )));
        }
        Ok(ids.into_iter().map(ObjectId::into_inner).collect())
    }

    async fn request_downloads(
        &self,
        correlation_id: &CorrelationId,
        upload_tokens: Vec<String>,
    ) -> GrantResult<Vec<ResolvedDownload>> {
        let request = DownloadRequest {
            tokens: upload_tokens,
            expiry_in_seconds: self.download_expiry_secs,
        };

        let grants = self
            .retry
            .run("download_request", || {
                self.authority.request_download_grants(correlation_id, &request)
            })
            .await?;

        let mut by_token: HashMap<String, DownloadGrant> =
            grants.into_iter().map(|g| (g.token.clone(), g)).collect();

        let resolved = request
            .tokens
            .iter()
            .map(|token| {
                by_token
                    .remove(token)
                    .ok_or_else(|| {
                        GrantError::decode_failure(
                            UpstreamCall::DownloadRequest,
                            correlation_id,
                            format!("no download grant returned for token '{}'", token),
                        )
                    })
                    .and_then(|grant| grant.resolve(correlation_id))
            })
            .collect::<GrantResult<Vec<_>>>()?;

        tracing::info!(
            correlation_id = %correlation_id,
            token_count = resolved.len(),
            "Download grants issued"
        );
        Ok(resolved)
    }
}

/// Match grants to `expected` identifiers and return them in that order.
///
/// A duplicate, unknown or missing identifier means the response cannot be trusted.
fn reassociate(
    correlation_id: &CorrelationId,
    expected: &[&str],
    grants: Vec<SignedGrant>,
) -> GrantResult<Vec<SignedGrant>> {
    let decode_failure = |message: String| {
        GrantError::decode_failure(UpstreamCall::BulkUploadRequest, correlation_id, message)
    };

    let mut by_identifier: HashMap<String, SignedGrant> = HashMap::with_capacity(grants.len());
    for grant in grants {
        if !expected.contains(&grant.identifier.as_str()) {
            return Err(decode_failure(format!(
                "grant returned for unknown identifier '{}'",
                grant.identifier
            )));
        }
        let identifier = grant.identifier.clone();
        if by_identifier.insert(identifier.clone(), grant).is_some() {
            return Err(decode_failure(format!(
                "duplicate grant for identifier '{}'",
                identifier
            )));
        }
    }

    expected
        .iter()
        .map(|id| {
            by_identifier
                .remove(*id)
                .ok_or_else(|| decode_failure(format!("no grant returned for identifier '{}'", id)))
        })
        .collect()
}
