//! Request enrichment and validation
//!
//! Turns raw [`UploadRequest`]s into [`EnrichedRequest`]s carrying the category metadata
//! block. Any invalid item rejects the whole batch before an upstream call is made.

use std::collections::{BTreeMap, HashSet};

use crate::catalog::{constraints_for, is_allowed, SPREADSHEET_CONTENT_TYPE};
use crate::error::{GrantError, GrantResult};
use crate::models::{AssetCategory, EnrichedRequest, UploadRequest};

fn invalid_content_type(request: &UploadRequest, category: AssetCategory) -> GrantError {
    GrantError::InvalidContentType {
        identifier: request.identifier.clone(),
        content_type: request.content_type.clone(),
        category,
    }
}

fn validate_request(request: &UploadRequest, category: AssetCategory) -> GrantResult<()> {
    if request.identifier.trim().is_empty() {
        return Err(GrantError::InvalidRequest(
            "Upload identifier must not be empty".to_string(),
        ));
    }
    if request.file_name.trim().is_empty() {
        return Err(GrantError::InvalidRequest(format!(
            "File name must not be empty for upload '{}'",
            request.identifier
        )));
    }

    // Bulk actions only ever take the spreadsheet type, whatever the item declares.
    if category == AssetCategory::BulkAction && request.content_type != SPREADSHEET_CONTENT_TYPE
    {
        return Err(invalid_content_type(request, category));
    }
    if !is_allowed(category, &request.content_type) {
        return Err(invalid_content_type(request, category));
    }

    if let Some(declared) = request.category {
        if declared != category {
            return Err(GrantError::InvalidRequest(format!(
                "Upload '{}' declares category {} but the batch is {}",
                request.identifier, declared, category
            )));
        }
    }

    Ok(())
}

/// Validate a batch of upload requests for one category and attach metadata blocks.
///
/// Output order matches input order.
pub fn enrich(
    category: AssetCategory,
    requests: &[UploadRequest],
) -> GrantResult<Vec<EnrichedRequest>> {
    if requests.is_empty() {
        return Err(GrantError::InvalidRequest(
            "Upload batch must contain at least one request".to_string(),
        ));
    }

    let template = constraints_for(category);
    let mut seen = HashSet::with_capacity(requests.len());
    let mut enriched = Vec::with_capacity(requests.len());

    for request in requests {
        validate_request(request, category)?;
        if !seen.insert(request.identifier.as_str()) {
            return Err(GrantError::InvalidRequest(format!(
                "Duplicate upload identifier '{}'",
                request.identifier
            )));
        }

        enriched.push(EnrichedRequest {
            identifier: request.identifier.clone(),
            file_name: request.file_name.clone(),
            is_public: request.is_public,
            category,
            metadata: template.instantiate(&request.content_type),
        });
    }

    tracing::debug!(
        category = %category,
        request_count = enriched.len(),
        "Upload requests enriched"
    );

    Ok(enriched)
}

/// Group enriched requests by content type.
///
/// Keys are ordered, and each group keeps the relative input order of its members, so
/// the same set of requests always yields the same groups.
pub fn partition_by_content_type(
    enriched: Vec<EnrichedRequest>,
) -> BTreeMap<String, Vec<EnrichedRequest>> {
    let mut partitions: BTreeMap<String, Vec<EnrichedRequest>> = BTreeMap::new();
    for request in enriched {
        partitions
            .entry(request.content_type().to_string())
            .or_default()
            .push(request);
    }
    partitions
}
