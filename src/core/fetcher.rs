use crate::domain::model::RemoteSnapshot;
use crate::domain::ports::BlockApi;
use crate::utils::error::{Result, SyncError};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static LINK_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([^>]*)>\s*((?:;\s*[^;,]+)*)"#).expect("link entry pattern is valid")
});

static REL_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)rel\s*=\s*"?([^";]*)"?"#).expect("rel pattern is valid")
});

/// 從 Link 標頭取出 rel="next" 的網址
pub fn parse_next_link(link_header: &str) -> Option<String> {
    LINK_ENTRY.captures_iter(link_header).find_map(|entry| {
        let url = entry.get(1)?.as_str().trim();
        let params = entry.get(2).map(|m| m.as_str()).unwrap_or_default();
        let rel = REL_PARAM.captures(params)?.get(1)?.as_str();

        let is_next = rel
            .split_whitespace()
            .any(|value| value.eq_ignore_ascii_case("next"));
        (is_next && !url.is_empty()).then(|| url.to_string())
    })
}

/// 逐頁讀取遠端既有封鎖，直到沒有下一頁
pub async fn fetch_remote_state(api: &dyn BlockApi) -> Result<RemoteSnapshot> {
    let mut snapshot = RemoteSnapshot::new();
    let mut visited = HashSet::new();
    let mut next = Some(api.first_page_url());
    let mut pages = 0usize;

    while let Some(url) = next.take() {
        if !visited.insert(url.clone()) {
            return Err(SyncError::RemoteQuery {
                url,
                reason: "pagination loops back to an already fetched page".to_string(),
            });
        }

        let page = api.list_page(&url).await?;
        pages += 1;
        tracing::debug!("📄 Page {} from {}: {} blocks", pages, url, page.blocks.len());

        for block in page.blocks {
            snapshot.insert(block);
        }
        next = page.next;
    }

    tracing::info!(
        "🛡️ Found {} existing blocks across {} page(s)",
        snapshot.len(),
        pages
    );
    Ok(snapshot)
}
