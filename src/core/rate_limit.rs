//! 速率限制標頭解析與暫停判斷

use crate::domain::model::RateLimitSignal;
use crate::domain::ports::Clock;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Numeric reset values at or above this are epoch seconds; smaller ones are seconds from now.
const EPOCH_THRESHOLD: f64 = 1_000_000_000.0;

/// Numeric reset values at or above this are epoch milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

/// Pause once the quota is down to this many requests.
const PAUSE_AT_REMAINING: u32 = 1;

const MIN_PAUSE: Duration = Duration::from_secs(1);

/// Upper bound for any server-requested wait. Mastodon windows are five minutes.
pub const MAX_WAIT: Duration = Duration::from_secs(15 * 60);

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_count(raw: &str) -> Option<u32> {
    raw.parse::<u32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u32))
}

/// Accepts RFC3339/ISO8601, epoch seconds, or seconds relative to `now`.
pub fn parse_reset_time(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let numeric = raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)?;
    if numeric >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(numeric as i64).single()
    } else if numeric >= EPOCH_THRESHOLD {
        let millis = (numeric * 1000.0) as i64;
        Utc.timestamp_millis_opt(millis).single()
    } else {
        let delta = chrono::Duration::milliseconds((numeric * 1000.0) as i64);
        Some(now + delta)
    }
}

/// 解析 X-RateLimit-* 標頭；三者皆缺或無法解析時回傳 None
pub fn parse_rate_limit(headers: &HeaderMap, now: DateTime<Utc>) -> Option<RateLimitSignal> {
    let signal = RateLimitSignal {
        limit: header_str(headers, LIMIT_HEADER).and_then(parse_count),
        remaining: header_str(headers, REMAINING_HEADER).and_then(parse_count),
        reset_at: header_str(headers, RESET_HEADER).and_then(|raw| parse_reset_time(raw, now)),
    };

    if signal.limit.is_none() && signal.remaining.is_none() && signal.reset_at.is_none() {
        None
    } else {
        Some(signal)
    }
}

/// `Retry-After` as delta-seconds or an HTTP-date, capped at [`MAX_WAIT`].
/// Values that do not fit a `Duration` are unknown.
pub fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let raw = header_str(headers, RETRY_AFTER.as_str())?;

    let wait = if let Ok(seconds) = raw.parse::<u64>() {
        Duration::from_secs(seconds)
    } else if let Ok(seconds) = raw.parse::<f64>() {
        Duration::try_from_secs_f64(seconds).ok()?
    } else {
        let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
        (at - now).to_std().unwrap_or(Duration::ZERO)
    };
    Some(wait.min(MAX_WAIT))
}

/// Wait required before the next request, or `None` when no pause applies.
pub fn pause_duration(signal: &RateLimitSignal, now: DateTime<Utc>) -> Option<Duration> {
    let remaining = signal.remaining?;
    let reset_at = signal.reset_at?;
    if remaining != PAUSE_AT_REMAINING {
        return None;
    }

    let wait = (reset_at - now)
        .num_seconds()
        .clamp(MIN_PAUSE.as_secs() as i64, MAX_WAIT.as_secs() as i64);
    Some(Duration::from_secs(wait as u64))
}

pub struct RateLimitGuard<'a> {
    clock: &'a dyn Clock,
}

impl<'a> RateLimitGuard<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self { clock }
    }

    /// Blocks until the quota resets when the last response left exactly one request.
    pub async fn check(&self, signal: Option<&RateLimitSignal>, domain: &str) -> Option<Duration> {
        let wait = signal.and_then(|s| pause_duration(s, self.clock.now()))?;
        tracing::info!(
            "⏳ Approaching rate limit after {}. Waiting {}s until reset",
            domain,
            wait.as_secs()
        );
        self.clock.sleep(wait).await;
        Some(wait)
    }
}
