use crate::core::report::{DomainEvent, Reporter};
use crate::core::retry::{MutationExecutor, MutationOutcome, RetryPolicy, RunDeadline};
use crate::domain::model::{DiffResult, DomainSet, MutationKind, RemoteSnapshot, SyncStats};
use crate::domain::ports::{BlockApi, Clock};
use crate::utils::error::{Result, SyncError};
use std::io::Write;

/// to_add = D − C, to_remove = C − D, already = D ∩ C
pub fn compute_diff(desired: &DomainSet, current: &DomainSet) -> DiffResult {
    DiffResult {
        to_add: desired.difference(current).cloned().collect(),
        to_remove: current.difference(desired).cloned().collect(),
        already: desired.intersection(current).cloned().collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub dry_run: bool,
    pub removals_enabled: bool,
    pub retry: RetryPolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            removals_enabled: true,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub diff: DiffResult,
    pub stats: SyncStats,
    /// The run deadline stopped the loops before every domain was handled.
    pub timed_out: bool,
}

pub struct Reconciler<'a> {
    api: &'a dyn BlockApi,
    clock: &'a dyn Clock,
    options: ReconcileOptions,
    deadline: Option<RunDeadline>,
}

impl<'a> Reconciler<'a> {
    pub fn new(api: &'a dyn BlockApi, clock: &'a dyn Clock, options: ReconcileOptions) -> Self {
        Self {
            api,
            clock,
            options,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<RunDeadline>) -> Self {
        self.deadline = deadline;
        self
    }

    fn deadline_passed(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| deadline.has_passed(self.clock.now()))
    }

    /// 依差異逐一新增、移除；單一網域失敗不會中斷其餘網域
    pub async fn reconcile<W: Write>(
        &self,
        desired: &DomainSet,
        snapshot: &RemoteSnapshot,
        reporter: &mut Reporter<W>,
    ) -> Result<ReconcileReport> {
        let diff = compute_diff(desired, &snapshot.domains());
        let mut stats = SyncStats {
            already_blocked: diff.already.len(),
            ..SyncStats::default()
        };

        tracing::info!(
            "🧮 {} to add, {} to remove, {} already blocked",
            diff.to_add.len(),
            diff.to_remove.len(),
            diff.already.len()
        );

        if reporter.is_verbose() {
            for domain in &diff.already {
                reporter.event(DomainEvent::AlreadyBlocked(domain))?;
            }
        }

        let executor = MutationExecutor::new(self.api, self.clock, self.options.retry)
            .with_deadline(self.deadline);
        let mut timed_out = false;

        for domain in &diff.to_add {
            if self.options.dry_run {
                reporter.event(DomainEvent::WouldAdd(domain))?;
                continue;
            }
            if self.deadline_passed() {
                timed_out = true;
                break;
            }

            let report = executor.execute(MutationKind::Add, domain, None).await;
            match &report.outcome {
                MutationOutcome::Succeeded => {
                    stats.added += 1;
                    reporter.event(DomainEvent::Added(domain))?;
                }
                MutationOutcome::SucceededAsNoop => {
                    stats.added += 1;
                    reporter.event(DomainEvent::AddedExisting(domain))?;
                }
                MutationOutcome::Failed(err) => {
                    stats.failed_add += 1;
                    reporter.event(DomainEvent::FailedAdd(domain, err))?;
                    if matches!(err, SyncError::Timeout { .. }) {
                        timed_out = true;
                        break;
                    }
                }
            }
        }

        if timed_out || !self.options.removals_enabled {
            if timed_out {
                tracing::warn!("⏰ Run deadline reached, remaining domains were not processed");
            } else if !diff.to_remove.is_empty() {
                tracing::info!(
                    "⏭️ Skipping {} removal(s): removals are disabled",
                    diff.to_remove.len()
                );
            }
            return Ok(ReconcileReport {
                diff,
                stats,
                timed_out,
            });
        }

        for domain in &diff.to_remove {
            if self.options.dry_run {
                reporter.event(DomainEvent::WouldRemove(domain))?;
                continue;
            }
            if self.deadline_passed() {
                timed_out = true;
                break;
            }

            let report = executor
                .execute(MutationKind::Remove, domain, snapshot.block_id(domain))
                .await;
            match &report.outcome {
                MutationOutcome::Succeeded => {
                    stats.removed += 1;
                    reporter.event(DomainEvent::Removed(domain))?;
                }
                MutationOutcome::SucceededAsNoop => {
                    stats.removed += 1;
                    reporter.event(DomainEvent::RemovedMissing(domain))?;
                }
                MutationOutcome::Failed(err) => {
                    stats.failed_remove += 1;
                    reporter.event(DomainEvent::FailedRemove(domain, err))?;
                    if matches!(err, SyncError::Timeout { .. }) {
                        timed_out = true;
                        break;
                    }
                }
            }
        }

        if timed_out {
            tracing::warn!("⏰ Run deadline reached, remaining domains were not processed");
        }
        Ok(ReconcileReport {
            diff,
            stats,
            timed_out,
        })
    }
}
