//! Upload-completion gate
//!
//! A download grant may only be requested once every upload token involved has reached
//! `UPLOAD_SUCCESS`. Terminal failures are reported as `Denied`, anything still moving
//! through validation or scanning as `NotReady`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use grantgate_client::GrantAuthority;
use grantgate_core::{CorrelationId, GrantError, GrantResult, TokenStatus, UpstreamCall};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::retry::RetryPolicy;

pub struct CompletionGate {
    authority: Arc<dyn GrantAuthority>,
    poll_interval: Duration,
    retry: RetryPolicy,
}

impl CompletionGate {
    pub fn new(
        authority: Arc<dyn GrantAuthority>,
        poll_interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            authority,
            poll_interval,
            retry,
        }
    }

    /// One status check for all `tokens`; ok only if every token succeeded.
    pub async fn ensure_ready(
        &self,
        correlation_id: &CorrelationId,
        tokens: &[String],
    ) -> GrantResult<()> {
        if tokens.is_empty() {
            return Err(GrantError::InvalidRequest(
                "at least one token is required".to_string(),
            ));
        }

        let reported = self
            .retry
            .run("upload_check", || {
                self.authority.check_upload_status(correlation_id, tokens)
            })
            .await?;

        let decision = evaluate(tokens, reported);
        match &decision {
            Ok(()) => tracing::debug!(
                correlation_id = %correlation_id,
                token_count = tokens.len(),
                "All uploads complete"
            ),
            Err(e) => tracing::info!(
                correlation_id = %correlation_id,
                token_count = tokens.len(),
                decision = e.error_type(),
                error = %e,
                "Upload completion gate closed"
            ),
        }
        decision
    }

    /// Poll until every token succeeded, one is denied, `timeout` elapses, or `cancel` fires.
    ///
    /// The deadline also bounds a status check still in flight. Reaching it returns the
    /// last `NotReady`, or `UpstreamUnavailable` if no check finished in time. Cancellation
    /// returns `UpstreamUnavailable` without issuing further status checks.
    pub async fn wait_until_ready(
        &self,
        correlation_id: &CorrelationId,
        tokens: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> GrantResult<()> {
        let deadline = Instant::now() + timeout;
        let cancelled =
            || GrantError::unavailable(UpstreamCall::UploadCheck, correlation_id, "wait cancelled");
        let mut last_pending: Option<Vec<TokenStatus>> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled());
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                result = self.ensure_ready(correlation_id, tokens) => result,
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::info!(
                        correlation_id = %correlation_id,
                        token_count = tokens.len(),
                        "Deadline reached during status check"
                    );
                    return Err(match last_pending.take() {
                        Some(statuses) => GrantError::NotReady { statuses },
                        None => GrantError::unavailable(
                            UpstreamCall::UploadCheck,
                            correlation_id,
                            "no status check finished before the deadline",
                        ),
                    });
                }
            };

            match result {
                Err(GrantError::NotReady { statuses }) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(GrantError::NotReady { statuses });
                    }
                    last_pending = Some(statuses);
                    let wake = (now + self.poll_interval).min(deadline);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(cancelled()),
                        _ = tokio::time::sleep_until(wake) => {}
                    }
                }
                other => return other,
            }
        }
    }
}

/// Aggregate per-token statuses into one decision.
///
/// Any denial wins over pending work. A requested token the authority did not report on
/// is treated as not ready.
fn evaluate(tokens: &[String], reported: Vec<TokenStatus>) -> GrantResult<()> {
    let by_token: HashMap<&str, &TokenStatus> =
        reported.iter().map(|s| (s.token.as_str(), s)).collect();

    let mut statuses = Vec::with_capacity(tokens.len());
    let mut missing = Vec::new();
    for token in tokens {
        match by_token.get(token.as_str()) {
            Some(status) => statuses.push((*status).clone()),
            None => missing.push(token.as_str()),
        }
    }

    if statuses.iter().any(|s| s.status.is_denied()) {
        return Err(GrantError::Denied { statuses });
    }
    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "Status authority did not report on some tokens");
    }
    if !missing.is_empty() || statuses.iter().any(|s| !s.status.is_success()) {
        return Err(GrantError::NotReady { statuses });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeAuthority, ScriptedFailure};
    use grantgate_core::UploadStatus;
    use tokio_test::assert_ok;

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn gate(authority: Arc<FakeAuthority>) -> CompletionGate {
        CompletionGate::new(authority, Duration::from_secs(1), RetryPolicy::none())
    }

    #[tokio::test]
    async fn all_success_is_ready_with_one_call() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status("t1", UploadStatus::UploadSuccess);
        authority.set_status("t2", UploadStatus::UploadSuccess);

        assert_ok!(
            gate(authority.clone())
                .ensure_ready(&CorrelationId::nil(), &tokens(&["t1", "t2"]))
                .await
        );
        assert_eq!(authority.status_checks(), 1);
    }

    #[tokio::test]
    async fn one_pending_token_blocks_the_whole_batch() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status("t1", UploadStatus::UploadSuccess);
        authority.set_status("t2", UploadStatus::UploadOnMalwareScanning);

        let err = gate(authority)
            .ensure_ready(&CorrelationId::nil(), &tokens(&["t1", "t2"]))
            .await
            .unwrap_err();
        match err {
            GrantError::NotReady { statuses } => assert_eq!(statuses.len(), 2),
            other => panic!("expected NotReady, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn virus_detected_is_denied_not_pending() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status("t1", UploadStatus::UploadSuccess);
        authority.set_status("t2", UploadStatus::UploadVirusDetected);
        authority.set_status("t3", UploadStatus::UploadOnMetadataValidation);

        let err = gate(authority)
            .ensure_ready(&CorrelationId::nil(), &tokens(&["t1", "t2", "t3"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::Denied { .. }));
    }

    #[tokio::test]
    async fn unreported_token_is_not_ready() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status("t1", UploadStatus::UploadSuccess);

        let err = gate(authority)
            .ensure_ready(&CorrelationId::nil(), &tokens(&["t1", "ghost"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::NotReady { .. }));
    }

    #[tokio::test]
    async fn status_rejection_passes_through() {
        let authority = Arc::new(FakeAuthority::new());
        authority.fail_status_checks(ScriptedFailure::rejected("TOKEN_UNKNOWN", "no such"), None);

        let err = gate(authority)
            .ensure_ready(&CorrelationId::nil(), &tokens(&["t1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::UpstreamRejected { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_polls_until_success() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status_sequence(
            "t1",
            &[
                UploadStatus::UploadOnMetadataValidation,
                UploadStatus::UploadOnMalwareScanning,
                UploadStatus::UploadSuccess,
            ],
        );

        gate(authority.clone())
            .wait_until_ready(
                &CorrelationId::nil(),
                &tokens(&["t1"]),
                Duration::from_secs(30),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(authority.status_checks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_denial_immediately() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status_sequence(
            "t1",
            &[
                UploadStatus::UploadOnMalwareScanning,
                UploadStatus::UploadVirusDetected,
            ],
        );

        let err = gate(authority.clone())
            .wait_until_ready(
                &CorrelationId::nil(),
                &tokens(&["t1"]),
                Duration::from_secs(30),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::Denied { .. }));
        assert_eq!(authority.status_checks(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_gives_up_at_the_deadline() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status("t1", UploadStatus::UploadOnMalwareScanning);

        let err = gate(authority.clone())
            .wait_until_ready(
                &CorrelationId::nil(),
                &tokens(&["t1"]),
                Duration::from_secs(3),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::NotReady { .. }));
        // checks at t = 0, 1, 2, 3
        assert_eq!(authority.status_checks(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status("t1", UploadStatus::UploadOnMalwareScanning);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            trigger.cancel();
        });

        let err = gate(authority.clone())
            .wait_until_ready(
                &CorrelationId::nil(),
                &tokens(&["t1"]),
                Duration::from_secs(60),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GrantError::UpstreamUnavailable { .. }));
        assert_eq!(authority.status_checks(), 2);

        let already = CancellationToken::new();
        already.cancel();
        let before = authority.status_checks();
        assert!(gate(authority.clone())
            .wait_until_ready(
                &CorrelationId::nil(),
                &tokens(&["t1"]),
                Duration::from_secs(5),
                &already,
            )
            .await
            .is_err());
        assert_eq!(authority.status_checks(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_bounds_a_slow_status_check() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status("t1", UploadStatus::UploadOnMalwareScanning);
        authority.delay_status_checks(Duration::from_secs(60));

        let started = Instant::now();
        let err = gate(authority.clone())
            .wait_until_ready(
                &CorrelationId::nil(),
                &tokens(&["t1"]),
                Duration::from_secs(3),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(3));
        match err {
            GrantError::UpstreamUnavailable { context, .. } => {
                assert_eq!(context.call, UpstreamCall::UploadCheck)
            }
            other => panic!("expected UpstreamUnavailable, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_second_check_returns_last_pending() {
        let authority = Arc::new(FakeAuthority::new());
        authority.set_status("t1", UploadStatus::UploadOnMalwareScanning);
        authority.delay_status_checks(Duration::from_secs(2));

        let started = Instant::now();
        let err = gate(authority.clone())
            .wait_until_ready(
                &CorrelationId::nil(),
                &tokens(&["t1"]),
                Duration::from_secs(3),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(3));
        match err {
            GrantError::NotReady { statuses } => {
                assert_eq!(statuses[0].status, UploadStatus::UploadOnMalwareScanning)
            }
            other => panic!("expected NotReady, got {:?}", other),
        }
        // first check finished at t = 2, second was cut off at t = 3
        assert_eq!(authority.status_checks(), 2);
    }
}
