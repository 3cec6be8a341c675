use crate::domain::model::{ApiResponse, BlockPage, DomainSet};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// 期望封鎖清單的來源
#[async_trait]
pub trait DomainSource: Send + Sync {
    async fn load(&self) -> Result<DomainSet>;

    /// Human-readable origin, e.g. a URL or dataset version.
    fn describe(&self) -> String;
}

/// 遠端管理 API
#[async_trait]
pub trait BlockApi: Send + Sync {
    /// URL of the first page of existing blocks.
    fn first_page_url(&self) -> String;

    async fn list_page(&self, url: &str) -> Result<BlockPage>;

    /// One network call. Transport failures surface as `Err`, every HTTP status as `Ok`.
    async fn create_block(&self, domain: &str) -> Result<ApiResponse>;

    async fn delete_block(&self, id: &str) -> Result<ApiResponse>;
}

/// 時間來源與等待，測試時可替換
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
