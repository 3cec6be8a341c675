use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 正規化後（trim + 小寫）的郵件網域
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type DomainSet = BTreeSet<Domain>;

/// 遠端 API 回傳的單筆封鎖紀錄
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainBlock {
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: Option<String>,
    pub domain: String,
}

// Mastodon 以字串回傳 id，但部分相容實作回傳數字
fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// 單次執行期間取得的遠端封鎖快照
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
    blocks: BTreeMap<Domain, Option<String>>,
}

impl RemoteSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// First id seen wins when the remote lists a domain twice with different casing.
    pub fn insert(&mut self, block: DomainBlock) {
        if let Some(domain) = Domain::parse(&block.domain) {
            self.blocks.entry(domain).or_insert(block.id);
        }
    }

    pub fn domains(&self) -> DomainSet {
        self.blocks.keys().cloned().collect()
    }

    pub fn block_id(&self, domain: &Domain) -> Option<&str> {
        self.blocks.get(domain).and_then(|id| id.as_deref())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub to_add: DomainSet,
    pub to_remove: DomainSet,
    pub already: DomainSet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub added: usize,
    pub removed: usize,
    pub already_blocked: usize,
    pub failed_add: usize,
    pub failed_remove: usize,
}

impl SyncStats {
    pub fn has_failures(&self) -> bool {
        self.failed_add > 0 || self.failed_remove > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitSignal {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
}

/// 單次 HTTP 回應中與重試判斷相關的部分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub rate_limit: Option<RateLimitSignal>,
    pub retry_after: Option<std::time::Duration>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 一頁遠端封鎖清單
#[derive(Debug, Clone, Default)]
pub struct BlockPage {
    pub blocks: Vec<DomainBlock>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Remove,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Add => f.write_str("add"),
            MutationKind::Remove => f.write_str("remove"),
        }
    }
}
