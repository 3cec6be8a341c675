use crate::core::fetcher::parse_next_link;
use crate::core::rate_limit::{parse_rate_limit, parse_retry_after};
use crate::domain::model::{ApiResponse, BlockPage, DomainBlock};
use crate::domain::ports::BlockApi;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::LINK;
use reqwest::{Client, Response};
use serde::Serialize;

const BLOCKS_PATH: &str = "/api/v1/admin/email_domain_blocks";

/// Mastodon caps admin list pages at 200 records.
const PAGE_LIMIT: u32 = 200;

#[derive(Serialize)]
struct CreateBlockRequest<'a> {
    domain: &'a str,
}

/// Mastodon Admin API 的 email domain block 端點
pub struct MastodonClient {
    client: Client,
    host: String,
    token: String,
}

impl MastodonClient {
    pub fn new(client: Client, host: &str, token: impl Into<String>) -> Self {
        Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn blocks_url(&self) -> String {
        format!("{}{}", self.host, BLOCKS_PATH)
    }

    async fn into_api_response(response: Response) -> Result<ApiResponse> {
        let now = Utc::now();
        let status = response.status().as_u16();
        let rate_limit = parse_rate_limit(response.headers(), now);
        let retry_after = parse_retry_after(response.headers(), now);
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            rate_limit,
            retry_after,
            body,
        })
    }
}

#[async_trait]
impl BlockApi for MastodonClient {
    fn first_page_url(&self) -> String {
        format!("{}?limit={}", self.blocks_url(), PAGE_LIMIT)
    }

    async fn list_page(&self, url: &str) -> Result<BlockPage> {
        let query_error = |reason: String| SyncError::RemoteQuery {
            url: url.to_string(),
            reason,
        };

        tracing::debug!("Making API request to: {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| query_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(query_error(format!("HTTP {}", status)));
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        let body = response
            .text()
            .await
            .map_err(|e| query_error(e.to_string()))?;
        let blocks: Vec<DomainBlock> = serde_json::from_str(&body)
            .map_err(|e| query_error(format!("malformed page payload: {}", e)))?;

        Ok(BlockPage { blocks, next })
    }

    async fn create_block(&self, domain: &str) -> Result<ApiResponse> {
        let response = self
            .client
            .post(self.blocks_url())
            .bearer_auth(&self.token)
            .json(&CreateBlockRequest { domain })
            .send()
            .await?;

        Self::into_api_response(response).await
    }

    async fn delete_block(&self, id: &str) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.blocks_url(), urlencode_segment(id));
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::into_api_response(response).await
    }
}

// Mastodon ids are numeric strings; anything else is percent-encoded as a single path segment.
fn urlencode_segment(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
