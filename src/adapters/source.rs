use crate::domain::model::{Domain, DomainSet};
use crate::domain::ports::DomainSource;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::Client;

pub const DEFAULT_LIST_URL: &str = "https://raw.githubusercontent.com/disposable-email-domains/disposable-email-domains/master/disposable_email_blocklist.conf";

/// Version tag of the bundled snapshot in `data/`.
pub const EMBEDDED_LIST_VERSION: &str = "2024.05.01";

const EMBEDDED_LIST: &str = include_str!("../../data/disposable_email_blocklist.conf");

/// 一行一個網域；略過空行與 `#` 註解，並轉為小寫
pub fn parse_domain_list(text: &str) -> DomainSet {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(Domain::parse)
        .collect()
}

pub struct HttpListSource {
    client: Client,
    url: String,
}

impl HttpListSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    fn fetch_error(&self, reason: impl Into<String>) -> SyncError {
        SyncError::Fetch {
            url: self.url.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl DomainSource for HttpListSource {
    async fn load(&self) -> Result<DomainSet> {
        tracing::info!("📥 Fetching disposable domains from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.fetch_error(e.to_string()))?;

        let status = response.status();
        tracing::debug!("Domain list response status: {}", status);
        if !status.is_success() {
            return Err(self.fetch_error(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.fetch_error(e.to_string()))?;

        let domains = parse_domain_list(&body);
        tracing::info!("📥 Fetched {} disposable domains", domains.len());
        Ok(domains)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

pub struct EmbeddedListSource {
    text: &'static str,
    version: &'static str,
}

impl EmbeddedListSource {
    pub fn new() -> Self {
        Self {
            text: EMBEDDED_LIST,
            version: EMBEDDED_LIST_VERSION,
        }
    }

    pub fn version(&self) -> &str {
        self.version
    }
}

impl Default for EmbeddedListSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DomainSource for EmbeddedListSource {
    async fn load(&self) -> Result<DomainSet> {
        let domains = parse_domain_list(self.text);
        tracing::info!(
            "📦 Loaded {} disposable domains from embedded list {}",
            domains.len(),
            self.version
        );
        Ok(domains)
    }

    fn describe(&self) -> String {
        format!("embedded disposable-email-domains {}", self.version)
    }
}
