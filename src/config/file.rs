use crate::config::SourceKind;
use crate::utils::error::{Result, SyncError};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

/// TOML 設定檔；所有欄位皆可省略，CLI 與環境變數優先
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub mastodon_host: Option<String>,
    pub api_token: Option<String>,
    pub domains_url: Option<String>,
    pub source: Option<SourceKind>,
    pub dry_run: Option<bool>,
    pub verbose: Option<bool>,
    pub skip_removals: Option<bool>,
    pub max_attempts: Option<u32>,
    pub request_timeout_seconds: Option<u64>,
    pub run_timeout_seconds: Option<u64>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| SyncError::Config {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }
}

/// 替換 `${VAR}`；未設定的變數保持原樣
fn substitute_env_vars(content: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(content, |caps: &Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
}
