//! In-memory grant authority.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use grantgate_client::{DownloadRequest, GrantAuthority, Jwks, UploadDescriptor};
use grantgate_core::{
    CorrelationId, DownloadGrant, GrantError, GrantResult, SignedGrant, TokenStatus,
    UploadStatus, UpstreamCall, UpstreamContext,
};

use super::fixtures::{signed_token, signing_jwks, unix_now};

/// Object id the fake binds into the token it issues for `identifier`.
pub fn object_id_for(identifier: &str) -> String {
    format!("obj-{}", identifier)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    UploadGrants {
        correlation_id: String,
        content_type: String,
        identifiers: Vec<String>,
    },
    DownloadGrants {
        correlation_id: String,
        tokens: Vec<String>,
        expiry_in_seconds: u64,
    },
    StatusCheck {
        correlation_id: String,
        tokens: Vec<String>,
    },
    KeySet,
    PutObject {
        url: String,
        content_type: String,
        size: usize,
    },
}

#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    Rejected { code: String, message: String },
    Unavailable,
}

impl ScriptedFailure {
    pub fn rejected(code: &str, message: &str) -> Self {
        ScriptedFailure::Rejected {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    fn to_error(&self, call: UpstreamCall, correlation_id: &CorrelationId) -> GrantError {
        match self {
            ScriptedFailure::Rejected { code, message } => GrantError::UpstreamRejected {
                context: UpstreamContext::new(call, correlation_id.clone()),
                code: code.clone(),
                message: message.clone(),
                http_status: Some(400),
            },
            ScriptedFailure::Unavailable => {
                GrantError::unavailable(call, correlation_id, "connection refused")
            }
        }
    }
}

/// A failure that fires `remaining` more times, or forever when `None`.
#[derive(Debug, Clone)]
struct Armed {
    failure: ScriptedFailure,
    remaining: Option<usize>,
}

impl Armed {
    fn fire(slot: &mut Option<Armed>) -> Option<ScriptedFailure> {
        if matches!(slot, Some(Armed { remaining: Some(0), .. })) {
            *slot = None;
        }
        let armed = slot.as_mut()?;
        if let Some(n) = armed.remaining.as_mut() {
            *n -= 1;
        }
        Some(armed.failure.clone())
    }
}

#[derive(Default)]
struct State {
    calls: Vec<RecordedCall>,
    upload_failures: HashMap<String, Option<Armed>>,
    status_failure: Option<Armed>,
    download_failure: Option<Armed>,
    put_failure: Option<Armed>,
    key_set: Option<Jwks>,
    key_set_failure: bool,
    omitted_grants: HashSet<String>,
    unknown_grants: Vec<String>,
    statuses: HashMap<String, VecDeque<UploadStatus>>,
    public_tokens: HashSet<String>,
    empty_download_tokens: HashSet<String>,
    status_delay: Option<Duration>,
}

/// Records every call and answers from scripted state.
///
/// Upload grants bind `obj-<identifier>` into a token signed with the fixture key.
/// Status sequences advance one step per check and stick on their last value.
#[derive(Default)]
pub struct FakeAuthority {
    state: Mutex<State>,
}

impl FakeAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake authority state poisoned")
    }

    pub fn fail_uploads_for(&self, content_type: &str, failure: ScriptedFailure) {
        self.state().upload_failures.insert(
            content_type.to_string(),
            Some(Armed {
                failure,
                remaining: None,
            }),
        );
    }

    pub fn fail_uploads_for_times(
        &self,
        content_type: &str,
        failure: ScriptedFailure,
        times: usize,
    ) {
        self.state().upload_failures.insert(
            content_type.to_string(),
            Some(Armed {
                failure,
                remaining: Some(times),
            }),
        );
    }

    pub fn fail_status_checks(&self, failure: ScriptedFailure, times: Option<usize>) {
        self.state().status_failure = Some(Armed {
            failure,
            remaining: times,
        });
    }

    pub fn fail_downloads(&self, failure: ScriptedFailure) {
        self.state().download_failure = Some(Armed {
            failure,
            remaining: None,
        });
    }

    /// Make every status check take `delay` (tokio time) before answering.
    pub fn delay_status_checks(&self, delay: Duration) {
        self.state().status_delay = Some(delay);
    }

    pub fn fail_puts(&self, failure: ScriptedFailure, times: Option<usize>) {
        self.state().put_failure = Some(Armed {
            failure,
            remaining: times,
        });
    }

    pub fn fail_key_set(&self) {
        self.state().key_set_failure = true;
    }

    pub fn set_key_set(&self, jwks: Jwks) {
        let mut state = self.state();
        state.key_set = Some(jwks);
        state.key_set_failure = false;
    }

    /// Leave `identifier` out of upload grant responses.
    pub fn omit_grant_for(&self, identifier: &str) {
        self.state().omitted_grants.insert(identifier.to_string());
    }

    /// Add a grant for an identifier nobody asked for.
    pub fn add_unknown_grant(&self, identifier: &str) {
        self.state().unknown_grants.push(identifier.to_string());
    }

    pub fn set_status(&self, token: &str, status: UploadStatus) {
        self.set_status_sequence(token, &[status]);
    }

    pub fn set_status_sequence(&self, token: &str, sequence: &[UploadStatus]) {
        self.state()
            .statuses
            .insert(token.to_string(), sequence.iter().copied().collect());
    }

    pub fn mark_public(&self, token: &str) {
        self.state().public_tokens.insert(token.to_string());
    }

    /// Answer download requests for `token` with neither URL set.
    pub fn return_empty_download_for(&self, token: &str) {
        self.state().empty_download_tokens.insert(token.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    pub fn upload_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, RecordedCall::UploadGrants { .. }))
            .collect()
    }

    pub fn status_checks(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::StatusCheck { .. }))
    }

    pub fn download_requests(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::DownloadGrants { .. }))
    }

    pub fn key_set_fetches(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::KeySet))
    }

    pub fn puts(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::PutObject { .. }))
    }

    fn count(&self, predicate: impl Fn(&RecordedCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }
}

fn fake_grant(identifier: &str) -> SignedGrant {
    SignedGrant {
        identifier: identifier.to_string(),
        signed_url: format!("https://storage.test/upload/{}", identifier),
        bound_token: signed_token(&object_id_for(identifier)),
        expiry: unix_now() + 900,
    }
}

#[async_trait]
impl GrantAuthority for FakeAuthority {
    async fn request_upload_grants(
        &self,
        correlation_id: &CorrelationId,
        descriptors: &[UploadDescriptor],
    ) -> GrantResult<Vec<SignedGrant>> {
        let content_type = descriptors
            .first()
            .map(|d| d.content_type().to_string())
            .unwrap_or_default();

        let mut state = self.state();
        state.calls.push(RecordedCall::UploadGrants {
            correlation_id: correlation_id.to_string(),
            content_type: content_type.clone(),
            identifiers: descriptors.iter().map(|d| d.identifier.clone()).collect(),
        });

        if let Some(slot) = state.upload_failures.get_mut(&content_type) {
            if let Some(failure) = Armed::fire(slot) {
                return Err(failure.to_error(UpstreamCall::BulkUploadRequest, correlation_id));
            }
        }

        let mut grants: Vec<SignedGrant> = descriptors
            .iter()
            .filter(|d| !state.omitted_grants.contains(&d.identifier))
            .map(|d| fake_grant(&d.identifier))
            .collect();
        grants.extend(state.unknown_grants.iter().map(|id| fake_grant(id)));
        // Answer in reverse so callers cannot rely on positional order.
        grants.reverse();
        Ok(grants)
    }

    async fn request_download_grants(
        &self,
        correlation_id: &CorrelationId,
        request: &DownloadRequest,
    ) -> GrantResult<Vec<DownloadGrant>> {
        let mut state = self.state();
        state.calls.push(RecordedCall::DownloadGrants {
            correlation_id: correlation_id.to_string(),
            tokens: request.tokens.clone(),
            expiry_in_seconds: request.expiry_in_seconds,
        });

        if let Some(failure) = Armed::fire(&mut state.download_failure) {
            return Err(failure.to_error(UpstreamCall::DownloadRequest, correlation_id));
        }

        let expiry = unix_now() + request.expiry_in_seconds as i64;
        Ok(request
            .tokens
            .iter()
            .map(|token| {
                let (signed_url, public_url) = if state.empty_download_tokens.contains(token) {
                    (String::new(), String::new())
                } else if state.public_tokens.contains(token) {
                    (String::new(), format!("https://cdn.test/{}", token))
                } else {
                    (format!("https://storage.test/download/{}", token), String::new())
                };
                DownloadGrant {
                    token: token.clone(),
                    signed_url,
                    expiry,
                    public_url,
                }
            })
            .collect())
    }

    async fn check_upload_status(
        &self,
        correlation_id: &CorrelationId,
        tokens: &[String],
    ) -> GrantResult<Vec<TokenStatus>> {
        let delay = {
            let mut state = self.state();
            state.calls.push(RecordedCall::StatusCheck {
                correlation_id: correlation_id.to_string(),
                tokens: tokens.to_vec(),
            });
            state.status_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();

        if let Some(failure) = Armed::fire(&mut state.status_failure) {
            return Err(failure.to_error(UpstreamCall::UploadCheck, correlation_id));
        }

        let mut statuses = Vec::with_capacity(tokens.len());
        for token in tokens {
            if let Some(sequence) = state.statuses.get_mut(token) {
                let status = if sequence.len() > 1 {
                    sequence.pop_front()
                } else {
                    sequence.front().copied()
                };
                if let Some(status) = status {
                    statuses.push(TokenStatus::new(token.clone(), status));
                }
            }
        }
        Ok(statuses)
    }

    async fn fetch_key_set(&self, correlation_id: &CorrelationId) -> GrantResult<Jwks> {
        let mut state = self.state();
        state.calls.push(RecordedCall::KeySet);
        if state.key_set_failure {
            return Err(GrantError::unavailable(
                UpstreamCall::Jwks,
                correlation_id,
                "connection refused",
            ));
        }
        Ok(state.key_set.clone().unwrap_or_else(signing_jwks))
    }

    async fn put_object(
        &self,
        correlation_id: &CorrelationId,
        signed_url: &str,
        content_type: &str,
        body: Bytes,
    ) -> GrantResult<()> {
        let mut state = self.state();
        state.calls.push(RecordedCall::PutObject {
            url: signed_url.to_string(),
            content_type: content_type.to_string(),
            size: body.len(),
        });
        if let Some(failure) = Armed::fire(&mut state.put_failure) {
            return Err(failure.to_error(UpstreamCall::ObjectPut, correlation_id));
        }
        Ok(())
    }
}
