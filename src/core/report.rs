use crate::domain::model::{Domain, SyncStats};
use crate::utils::error::{Result, SyncError};
use serde::Serialize;
use std::io::Write;

/// 單一網域在本次執行中的結果
#[derive(Debug)]
pub enum DomainEvent<'a> {
    AlreadyBlocked(&'a Domain),
    WouldAdd(&'a Domain),
    WouldRemove(&'a Domain),
    Added(&'a Domain),
    AddedExisting(&'a Domain),
    Removed(&'a Domain),
    RemovedMissing(&'a Domain),
    FailedAdd(&'a Domain, &'a SyncError),
    FailedRemove(&'a Domain, &'a SyncError),
}

impl DomainEvent<'_> {
    pub fn line(&self) -> String {
        match self {
            DomainEvent::AlreadyBlocked(d) => format!("Already blocked: {}", d),
            DomainEvent::WouldAdd(d) => format!("[DRY RUN] Would block domain: {}", d),
            DomainEvent::WouldRemove(d) => format!("[DRY RUN] Would remove domain: {}", d),
            DomainEvent::Added(d) => format!("Blocked domain: {}", d),
            DomainEvent::AddedExisting(d) => format!("Blocked domain: {} (already present on server)", d),
            DomainEvent::Removed(d) => format!("Removed domain: {}", d),
            DomainEvent::RemovedMissing(d) => format!("Removed domain: {} (already gone from server)", d),
            DomainEvent::FailedAdd(d, err) => format!("Failed to block {}: {}", d, err),
            DomainEvent::FailedRemove(d, err) => format!("Failed to remove {}: {}", d, err),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncSummary {
    pub source: String,
    pub dry_run: bool,
    pub removals_enabled: bool,
    pub desired: usize,
    pub current: usize,
    pub to_add: usize,
    pub to_remove: usize,
    pub stats: SyncStats,
    pub timed_out: bool,
}

impl SyncSummary {
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if self.dry_run {
            lines.push("Sync summary (dry run, no changes applied)".to_string());
        } else {
            lines.push("Sync summary".to_string());
        }
        lines.push(format!("  Source: {}", self.source));
        lines.push(format!("  Desired domains: {}", self.desired));
        lines.push(format!("  Current blocks: {}", self.current));
        lines.push(format!("  Domains to add: {}", self.to_add));
        if self.removals_enabled {
            lines.push(format!("  Domains to remove: {}", self.to_remove));
        } else {
            lines.push(format!("  Domains to remove: {} (removals disabled)", self.to_remove));
        }
        lines.push(format!("  Domains successfully added: {}", self.stats.added));
        lines.push(format!("  Domains failed to add: {}", self.stats.failed_add));
        lines.push(format!("  Domains removed: {}", self.stats.removed));
        lines.push(format!("  Domains failed to remove: {}", self.stats.failed_remove));
        lines.push(format!("  Domains already blocked: {}", self.stats.already_blocked));
        if self.timed_out {
            lines.push("  Stopped early: run deadline reached".to_string());
        }
        lines.join("\n")
    }
}

pub struct Reporter<W: Write> {
    out: W,
    verbose: bool,
}

impl Reporter<std::io::Stdout> {
    pub fn stdout(verbose: bool) -> Self {
        Self::new(std::io::stdout(), verbose)
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self { out, verbose }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Per-domain line, verbose mode only. Failures are always logged.
    pub fn event(&mut self, event: DomainEvent<'_>) -> Result<()> {
        match &event {
            DomainEvent::FailedAdd(..) | DomainEvent::FailedRemove(..) => {
                tracing::warn!("⚠️ {}", event.line())
            }
            _ => tracing::debug!("{}", event.line()),
        }

        if self.verbose {
            writeln!(self.out, "{}", event.line())?;
        }
        Ok(())
    }

    pub fn summary(&mut self, summary: &SyncSummary) -> Result<()> {
        writeln!(self.out, "{}", summary.render())?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
