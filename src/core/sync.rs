use crate::adapters::http::build_client;
use crate::adapters::mastodon::MastodonClient;
use crate::adapters::source::{EmbeddedListSource, HttpListSource};
use crate::config::{SourceKind, SyncConfig};
use crate::core::fetcher::fetch_remote_state;
use crate::core::reconciler::{ReconcileOptions, ReconcileReport, Reconciler};
use crate::core::report::{Reporter, SyncSummary};
use crate::core::retry::RunDeadline;
use crate::domain::model::{DiffResult, DomainSet, RemoteSnapshot};
use crate::domain::ports::{BlockApi, Clock, DomainSource, TokioClock};
use crate::utils::error::Result;
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub diff: DiffResult,
    pub summary: SyncSummary,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        !self.summary.stats.has_failures()
    }
}

pub struct SyncEngine<A: BlockApi, C: Clock = TokioClock> {
    source: Box<dyn DomainSource>,
    api: A,
    clock: C,
    options: ReconcileOptions,
    run_timeout: Option<Duration>,
}

impl SyncEngine<MastodonClient, TokioClock> {
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let client = build_client(config.request_timeout)?;
        let source: Box<dyn DomainSource> = match config.source {
            SourceKind::Remote => Box::new(HttpListSource::new(client.clone(), &config.domains_url)),
            SourceKind::Embedded => Box::new(EmbeddedListSource::new()),
        };
        let api = MastodonClient::new(client, &config.mastodon_host, config.api_token.clone());

        Ok(Self::new(source, api, TokioClock, config.reconcile_options())
            .with_run_timeout(config.run_timeout))
    }
}

impl<A: BlockApi, C: Clock> SyncEngine<A, C> {
    pub fn new(source: Box<dyn DomainSource>, api: A, clock: C, options: ReconcileOptions) -> Self {
        Self {
            source,
            api,
            clock,
            options,
            run_timeout: None,
        }
    }

    pub fn with_run_timeout(mut self, run_timeout: Option<Duration>) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    async fn load_state(&self) -> Result<(DomainSet, RemoteSnapshot)> {
        let desired = self.source.load().await?;
        let snapshot = fetch_remote_state(&self.api).await?;
        Ok((desired, snapshot))
    }

    /// 讀取來源 → 讀取遠端 → 比對並套用 → 輸出摘要。
    /// Fetch failures abort before any mutation; per-domain failures only show up in the stats.
    /// When the run deadline cuts reconciliation short, the partial summary is still
    /// printed before `SyncError::Timeout` is returned.
    pub async fn run<W: Write>(&self, reporter: &mut Reporter<W>) -> Result<SyncOutcome> {
        tracing::info!("🚀 Starting email domain block sync");
        if self.options.dry_run {
            tracing::info!("🧪 Dry run: no changes will be applied");
        }

        let deadline = self
            .run_timeout
            .map(|budget| RunDeadline::starting_at(self.clock.now(), budget));

        let (desired, snapshot) = match deadline {
            Some(deadline) => tokio::time::timeout(deadline.budget, self.load_state())
                .await
                .map_err(|_| deadline.error())??,
            None => self.load_state().await?,
        };

        let reconciler =
            Reconciler::new(&self.api, &self.clock, self.options).with_deadline(deadline);
        let ReconcileReport {
            diff,
            stats,
            timed_out,
        } = reconciler.reconcile(&desired, &snapshot, reporter).await?;

        let summary = SyncSummary {
            source: self.source.describe(),
            dry_run: self.options.dry_run,
            removals_enabled: self.options.removals_enabled,
            desired: desired.len(),
            current: snapshot.len(),
            to_add: diff.to_add.len(),
            to_remove: diff.to_remove.len(),
            stats,
            timed_out,
        };
        reporter.summary(&summary)?;

        if timed_out {
            if let Some(deadline) = deadline {
                return Err(deadline.error());
            }
        }

        tracing::info!(
            "✅ Sync complete: {} added, {} removed, {} failed",
            stats.added,
            stats.removed,
            stats.failed_add + stats.failed_remove
        );

        Ok(SyncOutcome { diff, summary })
    }
}
