pub mod file;

use crate::adapters::http::DEFAULT_REQUEST_TIMEOUT;
use crate::adapters::source::DEFAULT_LIST_URL;
use crate::core::reconciler::ReconcileOptions;
use crate::core::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_required_field, validate_url, Validate,
};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use file::FileConfig;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 期望清單來源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Download the list from `--domains-url`.
    #[default]
    Remote,
    /// Use the list bundled into the binary.
    Embedded,
}

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "blocklist-sync")]
#[command(about = "Sync disposable email domains to a Mastodon email domain block list")]
#[command(version)]
pub struct CliArgs {
    /// Mastodon server, e.g. https://mastodon.social
    #[arg(long, env = "MASTODON_HOST")]
    pub mastodon_host: Option<String>,

    /// Token with admin:read and admin:write email_domain_blocks scopes
    #[arg(long, env = "MASTODON_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    #[arg(long, env = "DISPOSABLE_DOMAINS_URL")]
    pub domains_url: Option<String>,

    #[arg(long, value_enum, env = "DOMAIN_SOURCE")]
    pub source: Option<SourceKind>,

    /// Report intended changes without applying them (`--dry-run=false` overrides the file)
    #[arg(
        long,
        env = "DRY_RUN",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub dry_run: Option<bool>,

    #[arg(
        short,
        long,
        env = "VERBOSE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub verbose: Option<bool>,

    /// Only add blocks; never delete remote blocks missing from the list
    #[arg(
        long,
        env = "SKIP_REMOVALS",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub skip_removals: Option<bool>,

    /// Attempts per domain while rate limited
    #[arg(long, env = "MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    #[arg(long = "request-timeout", env = "REQUEST_TIMEOUT_SECONDS")]
    pub request_timeout_seconds: Option<u64>,

    /// Abort the whole run after this many seconds
    #[arg(long = "run-timeout", env = "RUN_TIMEOUT_SECONDS")]
    pub run_timeout_seconds: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json_logs: bool,

    /// Optional TOML file; command line and environment take precedence
    #[arg(long, env = "BLOCKLIST_SYNC_CONFIG")]
    pub config: Option<PathBuf>,
}

/// 啟動時建立一次，之後以參考傳遞
#[derive(Clone)]
pub struct SyncConfig {
    pub mastodon_host: String,
    pub api_token: String,
    pub source: SourceKind,
    pub domains_url: String,
    pub dry_run: bool,
    pub verbose: bool,
    pub skip_removals: bool,
    pub max_attempts: u32,
    pub request_timeout: Duration,
    pub run_timeout: Option<Duration>,
    pub json_logs: bool,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("mastodon_host", &self.mastodon_host)
            .field("api_token", &if self.api_token.is_empty() { "unset" } else { "set" })
            .field("source", &self.source)
            .field("domains_url", &self.domains_url)
            .field("dry_run", &self.dry_run)
            .field("verbose", &self.verbose)
            .field("skip_removals", &self.skip_removals)
            .field("max_attempts", &self.max_attempts)
            .field("request_timeout", &self.request_timeout)
            .field("run_timeout", &self.run_timeout)
            .finish()
    }
}

impl SyncConfig {
    /// CLI/env > config file > defaults, then validated.
    pub fn resolve(cli: CliArgs) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    pub fn merge(cli: CliArgs, file: FileConfig) -> Result<Self> {
        let mastodon_host = cli.mastodon_host.or(file.mastodon_host);
        let api_token = cli.api_token.or(file.api_token);
        let mastodon_host = validate_required_field("mastodon_host", &mastodon_host)?;
        let api_token = validate_required_field("api_token", &api_token)?;

        let config = Self {
            mastodon_host: mastodon_host.trim().trim_end_matches('/').to_string(),
            api_token: api_token.trim().to_string(),
            source: cli.source.or(file.source).unwrap_or_default(),
            domains_url: cli
                .domains_url
                .or(file.domains_url)
                .unwrap_or_else(|| DEFAULT_LIST_URL.to_string()),
            dry_run: cli.dry_run.or(file.dry_run).unwrap_or(false),
            verbose: cli.verbose.or(file.verbose).unwrap_or(false),
            skip_removals: cli.skip_removals.or(file.skip_removals).unwrap_or(false),
            max_attempts: cli
                .max_attempts
                .or(file.max_attempts)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            request_timeout: cli
                .request_timeout_seconds
                .or(file.request_timeout_seconds)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            run_timeout: cli
                .run_timeout_seconds
                .or(file.run_timeout_seconds)
                .map(Duration::from_secs),
            json_logs: cli.json_logs,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            dry_run: self.dry_run,
            removals_enabled: !self.skip_removals,
            retry: RetryPolicy::new(self.max_attempts),
        }
    }
}

impl Validate for SyncConfig {
    fn validate(&self) -> Result<()> {
        validate_url("mastodon_host", &self.mastodon_host)?;
        validate_non_empty_string("api_token", &self.api_token)?;
        if self.source == SourceKind::Remote {
            validate_url("domains_url", &self.domains_url)?;
        }
        validate_range("max_attempts", self.max_attempts, 1, 20)?;
        validate_range("request_timeout_seconds", self.request_timeout.as_secs(), 1, 600)?;
        if let Some(run_timeout) = self.run_timeout {
            validate_range("run_timeout_seconds", run_timeout.as_secs(), 1, 86_400)?;
        }
        Ok(())
    }
}
