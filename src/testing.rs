//! In-memory fakes for the ports, shared by unit tests.

use crate::domain::model::{ApiResponse, BlockPage, DomainBlock};
use crate::domain::ports::{BlockApi, Clock};
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub const FIRST_PAGE: &str = "fake://blocks?page=1";

pub fn response(status: u16) -> ApiResponse {
    ApiResponse {
        status,
        rate_limit: None,
        retry_after: None,
        body: String::new(),
    }
}

pub fn block(id: &str, domain: &str) -> DomainBlock {
    DomainBlock {
        id: Some(id.to_string()),
        domain: domain.to_string(),
    }
}

/// Scripted `BlockApi`. Unscripted mutations answer 200.
#[derive(Default)]
pub struct FakeApi {
    pages: HashMap<String, std::result::Result<BlockPage, u16>>,
    create_responses: Mutex<VecDeque<ApiResponse>>,
    delete_responses: Mutex<VecDeque<ApiResponse>>,
    page_calls: Mutex<Vec<String>>,
    create_calls: Mutex<Vec<String>>,
    delete_calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single page holding `blocks`, ids assigned from position.
    pub fn with_blocks(self, domains: &[&str]) -> Self {
        let blocks = domains
            .iter()
            .enumerate()
            .map(|(i, d)| block(&(i + 1).to_string(), d))
            .collect();
        self.with_page(FIRST_PAGE, blocks, None)
    }

    pub fn with_page(mut self, url: &str, blocks: Vec<DomainBlock>, next: Option<&str>) -> Self {
        self.pages.insert(
            url.to_string(),
            Ok(BlockPage {
                blocks,
                next: next.map(str::to_string),
            }),
        );
        self
    }

    pub fn with_failing_page(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), Err(status));
        self
    }

    pub fn with_create_responses(self, responses: Vec<ApiResponse>) -> Self {
        *self.create_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn with_delete_responses(self, responses: Vec<ApiResponse>) -> Self {
        *self.delete_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn page_calls(&self) -> Vec<String> {
        self.page_calls.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> Vec<String> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlockApi for FakeApi {
    fn first_page_url(&self) -> String {
        FIRST_PAGE.to_string()
    }

    async fn list_page(&self, url: &str) -> Result<BlockPage> {
        self.page_calls.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(status)) => Err(SyncError::RemoteQuery {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            }),
            None => Ok(BlockPage::default()),
        }
    }

    async fn create_block(&self, domain: &str) -> Result<ApiResponse> {
        self.create_calls.lock().unwrap().push(domain.to_string());
        Ok(self
            .create_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| response(200)))
    }

    async fn delete_block(&self, id: &str) -> Result<ApiResponse> {
        self.delete_calls.lock().unwrap().push(id.to_string());
        Ok(self
            .delete_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| response(200)))
    }
}

/// Starts at a fixed instant; every sleep is recorded and advances `now` instead of waiting.
pub struct RecordingClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Default for RecordingClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        *self.now.lock().unwrap() += chrono::Duration::from_std(duration).unwrap();
    }
}
