use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Config file parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to fetch domain list from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to query remote blocks at {url}: {reason}")]
    RemoteQuery { url: String, reason: String },

    #[error("Mutation failed for {domain}: {reason}")]
    Mutation { domain: String, reason: String },

    #[error("Rate limit still exceeded for {domain} after {attempts} attempts")]
    RateLimitExceeded { domain: String, attempts: u32 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Run exceeded deadline of {seconds}s")]
    Timeout { seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Mutation,
    System,
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::Config { .. }
            | SyncError::MissingConfig { .. }
            | SyncError::InvalidConfigValue { .. }
            | SyncError::ConfigParse(_) => ErrorCategory::Configuration,
            SyncError::Fetch { .. }
            | SyncError::RemoteQuery { .. }
            | SyncError::Http(_)
            | SyncError::Timeout { .. } => ErrorCategory::Network,
            SyncError::Mutation { .. } | SyncError::RateLimitExceeded { .. } => {
                ErrorCategory::Mutation
            }
            SyncError::Io(_) => ErrorCategory::System,
        }
    }

    /// 單一網域的失敗只記錄，不中止整個流程
    pub fn is_fatal(&self) -> bool {
        self.category() != ErrorCategory::Mutation
    }

    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Mutation => 1,
            ErrorCategory::Configuration => 2,
            ErrorCategory::Network | ErrorCategory::System => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            SyncError::MissingConfig { field } => {
                format!("{} is required but was not provided", field)
            }
            SyncError::Fetch { url, .. } => {
                format!("Could not download the disposable domain list from {}", url)
            }
            SyncError::RemoteQuery { .. } => {
                "Could not read the current email domain blocks from the server".to_string()
            }
            SyncError::Timeout { seconds } => {
                format!("The sync did not finish within {} seconds", seconds)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SyncError::MissingConfig { .. } => {
                "Set MASTODON_HOST and MASTODON_API_TOKEN in the environment or a .env file"
            }
            SyncError::Config { .. }
            | SyncError::InvalidConfigValue { .. }
            | SyncError::ConfigParse(_) => "Check the configuration file and command-line flags",
            SyncError::Fetch { .. } => {
                "Check DISPOSABLE_DOMAINS_URL or use --source embedded"
            }
            SyncError::RemoteQuery { .. } => {
                "Check the host URL and that the token has the admin:read:email_domain_blocks scope"
            }
            SyncError::Mutation { .. } => {
                "Check that the token has the admin:write:email_domain_blocks scope"
            }
            SyncError::RateLimitExceeded { .. } => "Re-run later or raise --max-attempts",
            SyncError::Http(_) => "Check network connectivity to the server",
            SyncError::Timeout { .. } => "Raise --run-timeout or re-run; the sync is idempotent",
            SyncError::Io(_) => "Check stdout/stderr and file permissions",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
