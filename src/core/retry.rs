//! 單一網域變更的有界重試狀態機

use crate::core::rate_limit::RateLimitGuard;
use crate::domain::model::{ApiResponse, Domain, MutationKind};
use crate::domain::ports::{BlockApi, Clock};
use crate::utils::error::SyncError;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const STATUS_UNPROCESSABLE: u16 = 422;
const STATUS_NOT_FOUND: u16 = 404;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Longest response body echoed into an error message.
const BODY_EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// `base * 2^retries`
    pub fn backoff(&self, retries: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retries.min(31)))
    }
}

/// 整體執行期限；由 `SyncEngine` 在開始時建立
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunDeadline {
    pub at: DateTime<Utc>,
    pub budget: Duration,
}

impl RunDeadline {
    pub fn starting_at(now: DateTime<Utc>, budget: Duration) -> Self {
        let span = chrono::Duration::from_std(budget).unwrap_or(chrono::Duration::MAX);
        Self {
            at: now.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC),
            budget,
        }
    }

    pub fn has_passed(&self, now: DateTime<Utc>) -> bool {
        now >= self.at
    }

    /// True when waiting `wait` from `now` ends after the deadline.
    pub fn cuts_off(&self, now: DateTime<Utc>, wait: Duration) -> bool {
        match chrono::Duration::from_std(wait) {
            Ok(wait) => now.checked_add_signed(wait).map_or(true, |end| end > self.at),
            Err(_) => true,
        }
    }

    pub fn error(&self) -> SyncError {
        SyncError::Timeout {
            seconds: self.budget.as_secs(),
        }
    }
}

/// 一次嘗試之後的狀態；嘗試本身（Attempting）即 `execute` 迴圈的起點
#[derive(Debug)]
pub enum AttemptState {
    Retrying { wait: Duration },
    Succeeded,
    SucceededAsNoop,
    FailedPermanently(SyncError),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptState::Retrying { .. })
    }

    fn into_outcome(self) -> Option<MutationOutcome> {
        match self {
            AttemptState::Retrying { .. } => None,
            AttemptState::Succeeded => Some(MutationOutcome::Succeeded),
            AttemptState::SucceededAsNoop => Some(MutationOutcome::SucceededAsNoop),
            AttemptState::FailedPermanently(err) => Some(MutationOutcome::Failed(err)),
        }
    }
}

/// 依回應決定下一個狀態；`retries` 為此回應之前已重試的次數
pub fn next_state(
    kind: MutationKind,
    domain: &Domain,
    response: &ApiResponse,
    retries: u32,
    policy: &RetryPolicy,
) -> AttemptState {
    if response.is_success() {
        return AttemptState::Succeeded;
    }

    match (kind, response.status) {
        (MutationKind::Add, STATUS_UNPROCESSABLE) | (MutationKind::Remove, STATUS_NOT_FOUND) => {
            AttemptState::SucceededAsNoop
        }
        (_, STATUS_TOO_MANY_REQUESTS) => {
            let attempts = retries + 1;
            if attempts >= policy.max_attempts {
                AttemptState::FailedPermanently(SyncError::RateLimitExceeded {
                    domain: domain.to_string(),
                    attempts,
                })
            } else {
                let wait = response
                    .retry_after
                    .unwrap_or_else(|| policy.backoff(retries));
                AttemptState::Retrying { wait }
            }
        }
        (_, status) => AttemptState::FailedPermanently(SyncError::Mutation {
            domain: domain.to_string(),
            reason: format!("HTTP {}: {}", status, excerpt(&response.body)),
        }),
    }
}

fn excerpt(body: &str) -> &str {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}

#[derive(Debug)]
pub enum MutationOutcome {
    Succeeded,
    SucceededAsNoop,
    Failed(SyncError),
}

impl MutationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, MutationOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct MutationReport {
    pub outcome: MutationOutcome,
    pub attempts: u32,
}

pub struct MutationExecutor<'a> {
    api: &'a dyn BlockApi,
    clock: &'a dyn Clock,
    policy: RetryPolicy,
    deadline: Option<RunDeadline>,
}

impl<'a> MutationExecutor<'a> {
    pub fn new(api: &'a dyn BlockApi, clock: &'a dyn Clock, policy: RetryPolicy) -> Self {
        Self {
            api,
            clock,
            policy,
            deadline: None,
        }
    }

    /// A retry wait that would run past `deadline` ends the mutation with `SyncError::Timeout`.
    pub fn with_deadline(mut self, deadline: Option<RunDeadline>) -> Self {
        self.deadline = deadline;
        self
    }

    async fn send(
        &self,
        kind: MutationKind,
        domain: &Domain,
        block_id: Option<&str>,
    ) -> crate::Result<ApiResponse> {
        match kind {
            MutationKind::Add => self.api.create_block(domain.as_str()).await,
            MutationKind::Remove => {
                let id = block_id.ok_or_else(|| SyncError::Mutation {
                    domain: domain.to_string(),
                    reason: "remote block has no id".to_string(),
                })?;
                self.api.delete_block(id).await
            }
        }
    }

    /// Runs one add/remove until a terminal state. `block_id` is required for removals.
    pub async fn execute(
        &self,
        kind: MutationKind,
        domain: &Domain,
        block_id: Option<&str>,
    ) -> MutationReport {
        let guard = RateLimitGuard::new(self.clock);
        let mut retries = 0u32;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let state = match self.send(kind, domain, block_id).await {
                Ok(response) => {
                    tracing::debug!("{} {} -> HTTP {}", kind, domain, response.status);
                    let next = next_state(kind, domain, &response, retries, &self.policy);
                    guard.check(response.rate_limit.as_ref(), domain.as_str()).await;
                    next
                }
                Err(err @ SyncError::Mutation { .. }) => AttemptState::FailedPermanently(err),
                Err(other) => AttemptState::FailedPermanently(SyncError::Mutation {
                    domain: domain.to_string(),
                    reason: other.to_string(),
                }),
            };

            if let AttemptState::Retrying { wait } = state {
                if let Some(deadline) = self.deadline {
                    if deadline.cuts_off(self.clock.now(), wait) {
                        tracing::warn!(
                            "⏰ Run deadline reached while rate limited on {} {}",
                            kind,
                            domain
                        );
                        return MutationReport {
                            outcome: MutationOutcome::Failed(deadline.error()),
                            attempts,
                        };
                    }
                }
                tracing::debug!(
                    "🔁 Rate limited on {} {}, retry {} in {:?}",
                    kind,
                    domain,
                    retries + 1,
                    wait
                );
                self.clock.sleep(wait).await;
                retries += 1;
                continue;
            }

            if let Some(outcome) = state.into_outcome() {
                return MutationReport { outcome, attempts };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{response, FakeApi, RecordingClock};

    fn domain(name: &str) -> Domain {
        Domain::parse(name).unwrap()
    }

    #[test]
    fn test_backoff_is_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn test_next_state_transitions() {
        let policy = RetryPolicy::default();
        let d = domain("a.com");

        assert!(matches!(
            next_state(MutationKind::Add, &d, &response(200), 0, &policy),
            AttemptState::Succeeded
        ));
        assert!(matches!(
            next_state(MutationKind::Add, &d, &response(422), 0, &policy),
            AttemptState::SucceededAsNoop
        ));
        assert!(matches!(
            next_state(MutationKind::Remove, &d, &response(404), 0, &policy),
            AttemptState::SucceededAsNoop
        ));
        assert!(matches!(
            next_state(MutationKind::Add, &d, &response(404), 0, &policy),
            AttemptState::FailedPermanently(SyncError::Mutation { .. })
        ));
        assert!(matches!(
            next_state(MutationKind::Remove, &d, &response(403), 0, &policy),
            AttemptState::FailedPermanently(SyncError::Mutation { .. })
        ));
    }

    #[test]
    fn test_rate_limited_prefers_retry_after() {
        let policy = RetryPolicy::default();
        let d = domain("a.com");

        let mut limited = response(429);
        limited.retry_after = Some(Duration::from_secs(17));
        match next_state(MutationKind::Add, &d, &limited, 2, &policy) {
            AttemptState::Retrying { wait } => assert_eq!(wait, Duration::from_secs(17)),
            other => panic!("unexpected state {:?}", other),
        }

        match next_state(MutationKind::Add, &d, &response(429), 2, &policy) {
            AttemptState::Retrying { wait } => assert_eq!(wait, Duration::from_secs(4)),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_always_rate_limited_stops_at_max_attempts() {
        let api = FakeApi::new().with_create_responses(vec![response(429); 10]);
        let clock = RecordingClock::new();
        let executor = MutationExecutor::new(&api, &clock, RetryPolicy::new(5));

        let report = executor
            .execute(MutationKind::Add, &domain("a.com"), None)
            .await;

        assert_eq!(report.attempts, 5);
        assert_eq!(api.create_calls().len(), 5);
        assert!(matches!(
            report.outcome,
            MutationOutcome::Failed(SyncError::RateLimitExceeded { attempts: 5, .. })
        ));
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[tokio::test]
    async fn test_recovers_after_rate_limit() {
        let api = FakeApi::new().with_create_responses(vec![response(429), response(429), response(200)]);
        let clock = RecordingClock::new();
        let executor = MutationExecutor::new(&api, &clock, RetryPolicy::default());

        let report = executor
            .execute(MutationKind::Add, &domain("a.com"), None)
            .await;

        assert!(matches!(report.outcome, MutationOutcome::Succeeded));
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_success() {
        let api = FakeApi::new().with_create_responses(vec![response(422)]);
        let clock = RecordingClock::new();
        let executor = MutationExecutor::new(&api, &clock, RetryPolicy::default());

        let report = executor
            .execute(MutationKind::Add, &domain("a.com"), None)
            .await;

        assert!(matches!(report.outcome, MutationOutcome::SucceededAsNoop));
        assert!(report.outcome.is_success());
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test]
    async fn test_remove_without_id_fails_without_network_call() {
        let api = FakeApi::new();
        let clock = RecordingClock::new();
        let executor = MutationExecutor::new(&api, &clock, RetryPolicy::default());

        let report = executor
            .execute(MutationKind::Remove, &domain("a.com"), None)
            .await;

        assert!(matches!(report.outcome, MutationOutcome::Failed(SyncError::Mutation { .. })));
        assert!(api.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_guard_pauses_after_successful_attempt() {
        let mut ok = response(200);
        let clock = RecordingClock::new();
        ok.rate_limit = Some(crate::domain::model::RateLimitSignal {
            limit: Some(300),
            remaining: Some(1),
            reset_at: Some(clock.now() + chrono::Duration::seconds(12)),
        });
        let api = FakeApi::new().with_create_responses(vec![ok]);
        let executor = MutationExecutor::new(&api, &clock, RetryPolicy::default());

        let report = executor
            .execute(MutationKind::Add, &domain("a.com"), None)
            .await;

        assert!(matches!(report.outcome, MutationOutcome::Succeeded));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(12)]);
    }

    #[tokio::test]
    async fn test_guard_pauses_before_backoff_on_rate_limited_attempt() {
        let clock = RecordingClock::new();
        let mut limited = response(429);
        limited.rate_limit = Some(crate::domain::model::RateLimitSignal {
            limit: Some(300),
            remaining: Some(1),
            reset_at: Some(clock.now() + chrono::Duration::seconds(10)),
        });
        let api = FakeApi::new().with_create_responses(vec![limited, response(200)]);
        let executor = MutationExecutor::new(&api, &clock, RetryPolicy::default());

        let report = executor
            .execute(MutationKind::Add, &domain("a.com"), None)
            .await;

        assert!(matches!(report.outcome, MutationOutcome::Succeeded));
        assert_eq!(report.attempts, 2);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(10), Duration::from_secs(1)]
        );
    }

    #[tokio::test]
    async fn test_guard_pauses_after_failed_attempt() {
        let clock = RecordingClock::new();
        let mut forbidden = response(403);
        forbidden.rate_limit = Some(crate::domain::model::RateLimitSignal {
            limit: None,
            remaining: Some(1),
            reset_at: Some(clock.now() + chrono::Duration::seconds(4)),
        });
        let api = FakeApi::new().with_create_responses(vec![forbidden]);
        let executor = MutationExecutor::new(&api, &clock, RetryPolicy::default());

        let report = executor
            .execute(MutationKind::Add, &domain("a.com"), None)
            .await;

        assert!(matches!(report.outcome, MutationOutcome::Failed(SyncError::Mutation { .. })));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn test_retry_wait_past_deadline_times_out() {
        let api = FakeApi::new().with_create_responses(vec![response(429); 10]);
        let clock = RecordingClock::new();
        let deadline = RunDeadline::starting_at(clock.now(), Duration::from_secs(3));
        let executor = MutationExecutor::new(&api, &clock, RetryPolicy::default())
            .with_deadline(Some(deadline));

        let report = executor
            .execute(MutationKind::Add, &domain("a.com"), None)
            .await;

        // waits of 1s and 2s fit in the budget, the 4s backoff does not
        assert_eq!(report.attempts, 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert!(matches!(
            report.outcome,
            MutationOutcome::Failed(SyncError::Timeout { seconds: 3 })
        ));
    }

    #[test]
    fn test_deadline_cutoff() {
        let start = RecordingClock::new().now();
        let deadline = RunDeadline::starting_at(start, Duration::from_secs(10));

        assert!(!deadline.has_passed(start));
        assert!(!deadline.cuts_off(start, Duration::from_secs(10)));
        assert!(deadline.cuts_off(start, Duration::from_secs(11)));
        assert!(deadline.has_passed(start + chrono::Duration::seconds(10)));
    }
}
