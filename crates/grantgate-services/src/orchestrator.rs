//! Batching orchestrator
//!
//! Splits an enriched batch by content type and issues one upstream grant request per
//! partition, concurrently. In fail-fast mode the first failing partition cancels the
//! rest; in partial-success mode every partition runs to completion.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use grantgate_client::{GrantAuthority, UploadDescriptor};
use grantgate_core::{
    partition_by_content_type, CorrelationId, EnrichedRequest, GrantError, GrantResult,
    SignedGrant,
};

use crate::retry::RetryPolicy;

/// A content-type partition whose grant request failed.
#[derive(Debug)]
pub struct PartitionFailure {
    pub content_type: String,
    pub identifiers: Vec<String>,
    pub error: GrantError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub grants: Vec<SignedGrant>,
    pub failures: Vec<PartitionFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct BatchingOrchestrator {
    authority: Arc<dyn GrantAuthority>,
    service_name: String,
    retry: RetryPolicy,
}

impl BatchingOrchestrator {
    pub fn new(authority: Arc<dyn GrantAuthority>, service_name: &str, retry: RetryPolicy) -> Self {
        Self {
            authority,
            service_name: service_name.to_string(),
            retry,
        }
    }

    /// Request grants for every partition; any failure fails the whole call.
    pub async fn request_grants(
        &self,
        correlation_id: &CorrelationId,
        enriched: Vec<EnrichedRequest>,
    ) -> GrantResult<Vec<SignedGrant>> {
        ensure_not_empty(&enriched)?;
        let partitions = partition_by_content_type(enriched);

        let results = try_join_all(
            partitions
                .iter()
                .map(|(content_type, requests)| {
                    self.request_partition(correlation_id, content_type, requests)
                }),
        )
        .await?;

        Ok(results.into_iter().flatten().collect())
    }

    /// Request grants for every partition, keeping the grants of the ones that succeed.
    pub async fn request_grants_partial(
        &self,
        correlation_id: &CorrelationId,
        enriched: Vec<EnrichedRequest>,
    ) -> GrantResult<BatchOutcome> {
        ensure_not_empty(&enriched)?;
        let partitions = partition_by_content_type(enriched);

        let results = join_all(partitions.iter().map(|(content_type, requests)| async move {
            (
                content_type,
                requests,
                self.request_partition(correlation_id, content_type, requests)
                    .await,
            )
        }))
        .await;

        let mut outcome = BatchOutcome::default();
        for (content_type, requests, result) in results {
            match result {
                Ok(grants) => outcome.grants.extend(grants),
                Err(error) => {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        content_type = %content_type,
                        partition_size = requests.len(),
                        error = %error,
                        "Partition failed; keeping grants of the other partitions"
                    );
                    outcome.failures.push(PartitionFailure {
                        content_type: content_type.clone(),
                        identifiers: requests.iter().map(|r| r.identifier.clone()).collect(),
                        error,
                    });
                }
            }
        }
        Ok(outcome)
    }

    async fn request_partition(
        &self,
        correlation_id: &CorrelationId,
        content_type: &str,
        requests: &[EnrichedRequest],
    ) -> GrantResult<Vec<SignedGrant>> {
        let descriptors: Vec<UploadDescriptor> = requests
            .iter()
            .map(|r| UploadDescriptor::from_enriched(r, &self.service_name))
            .collect();

        tracing::info!(
            correlation_id = %correlation_id,
            content_type = %content_type,
            partition_size = descriptors.len(),
            "Requesting upload grants"
        );

        self.retry
            .run("bulk_upload_request", || {
                self.authority
                    .request_upload_grants(correlation_id, &descriptors)
            })
            .await
    }
}

fn ensure_not_empty(enriched: &[EnrichedRequest]) -> GrantResult<()> {
    if enriched.is_empty() {
        return Err(GrantError::InvalidRequest(
            "upload batch must not be empty".to_string(),
        ));
    }
    Ok(())
}
