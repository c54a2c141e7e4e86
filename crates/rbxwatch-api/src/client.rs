// Resilient HTTP client
//
// Every upstream call goes through `ApiClient::request`: optional cache
// lookup, one rate-limit admission per logical request, then a bounded
// retry loop with exponential backoff. Typed endpoint wrappers live in
// `crate::roblox` and only build `RequestSpec`s and decode payloads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::cache::ResponseCache;
use crate::error::Error;
use crate::rate_limit::{EndpointClass, RateLimiter};
use crate::transport::TransportConfig;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Bodies longer than this are truncated in error payloads.
const ERROR_BODY_PREVIEW: usize = 512;

// ── Request description ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One logical upstream call, retried as a unit.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: Url,
    pub class: EndpointClass,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub max_retries: u32,
    pub timeout: Duration,
    /// `None` disables caching for this call.
    pub cache_ttl: Option<Duration>,
}

impl RequestSpec {
    pub fn get(url: Url, class: EndpointClass) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            class,
            params: Vec::new(),
            body: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: None,
        }
    }

    pub fn post(url: Url, class: EndpointClass, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            body: Some(body),
            ..Self::get(url, class)
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cache successful responses for `ttl`. A zero TTL disables caching.
    pub fn cached(mut self, ttl: Duration) -> Self {
        self.cache_ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }
}

// ── Retry policy ────────────────────────────────────────────────────

/// Backoff knobs for the retry loop.
///
/// Attempt `n > 0` waits `backoff_base * 2^n` plus uniform jitter in
/// `[0, jitter_max)`. An upstream 429 instead waits `rate_limit_pause`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff_base: Duration,
    pub jitter_max: Duration,
    pub rate_limit_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(1),
            jitter_max: Duration::from_secs(1),
            rate_limit_pause: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// No waiting at all. Useful for tests against a mock server.
    pub fn immediate() -> Self {
        Self {
            backoff_base: Duration::ZERO,
            jitter_max: Duration::ZERO,
            rate_limit_pause: Duration::ZERO,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.backoff_base.saturating_mul(2_u32.saturating_pow(attempt));
        let jitter = self.jitter_max.mul_f64(rand::random::<f64>());
        exp + jitter
    }
}

// ── Statistics ──────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    cache_hits: AtomicU64,
}

/// Point-in-time snapshot of client statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiStats {
    /// HTTP attempts made (retries included, cache hits excluded).
    pub total_calls: u64,
    pub successful_calls: u64,
    /// Logical requests that exhausted their retries or failed outright.
    pub failed_calls: u64,
    pub retries: u64,
    pub cache_hits: u64,
    /// `successful / total * 100`, rounded to two decimals.
    pub success_rate: f64,
    pub cache_entries: usize,
}

// ── Client ──────────────────────────────────────────────────────────

/// Rate-limited, caching, retrying JSON client shared by every loop.
pub struct ApiClient {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    cache: ResponseCache,
    retry: RetryPolicy,
    counters: Counters,
}

impl ApiClient {
    pub fn new(
        transport: &TransportConfig,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, limiter, retry))
    }

    /// Build around an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            http,
            limiter,
            cache: ResponseCache::new(),
            retry,
            counters: Counters::default(),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Perform one logical request.
    ///
    /// A fresh cache hit returns immediately without touching the rate
    /// limiter. Otherwise the call is admitted once, then attempted up to
    /// `1 + max_retries` times. Timeouts, connection errors, undecodable
    /// bodies, 5xx and 429 are retried; any other non-200 status fails
    /// immediately.
    pub async fn request(&self, spec: &RequestSpec) -> Result<Value, Error> {
        let cache_key = spec
            .cache_ttl
            .map(|ttl| (ResponseCache::key(spec.url.as_str(), &spec.params), ttl));

        if let Some((key, ttl)) = &cache_key {
            if let Some(hit) = self.cache.get(key, *ttl) {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(url = %spec.url, "cache hit");
                return Ok(hit);
            }
        }

        self.limiter.await_slot(spec.class).await;

        let mut last_error: Option<Error> = None;
        for attempt in 0..=spec.max_retries {
            self.counters.total.fetch_add(1, Ordering::Relaxed);

            if attempt > 0 {
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                let pause = if matches!(last_error, Some(Error::RateLimited)) {
                    self.retry.rate_limit_pause
                } else {
                    self.retry.backoff(attempt)
                };
                debug!(
                    url = %spec.url,
                    attempt,
                    max_retries = spec.max_retries,
                    pause_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
                    "retrying request"
                );
                tokio::time::sleep(pause).await;
            }

            match self.attempt(spec).await {
                Ok(body) => {
                    self.counters.successful.fetch_add(1, Ordering::Relaxed);
                    if let Some((key, _)) = cache_key {
                        self.cache.insert(key, body.clone());
                    }
                    return Ok(body);
                }
                Err(e) if e.is_retryable() => {
                    warn!(url = %spec.url, attempt, error = %e, "request attempt failed");
                    last_error = Some(e);
                }
                Err(e) => {
                    debug!(url = %spec.url, error = %e, "request failed, not retrying");
                    last_error = Some(e);
                    break;
                }
            }
        }

        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        Err(last_error.unwrap_or_else(|| Error::InvalidResponse("no attempt was made".into())))
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> ApiStats {
        let total = self.counters.total.load(Ordering::Relaxed);
        let successful = self.counters.successful.load(Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
        let success_rate = if total == 0 {
            0.0
        } else {
            (successful as f64 / total as f64 * 10_000.0).round() / 100.0
        };

        ApiStats {
            total_calls: total,
            successful_calls: successful,
            failed_calls: self.counters.failed.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            success_rate,
            cache_entries: self.cache.len(),
        }
    }

    // ── Single attempt ───────────────────────────────────────────────

    async fn attempt(&self, spec: &RequestSpec) -> Result<Value, Error> {
        let builder = match spec.method {
            HttpMethod::Get => self.http.get(spec.url.clone()),
            HttpMethod::Post => self.http.post(spec.url.clone()),
        };
        let mut builder = builder.timeout(spec.timeout);
        if !spec.params.is_empty() {
            builder = builder.query(&spec.params);
        }
        if let Some(body) = &spec.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: spec.timeout.as_secs(),
                }
            } else {
                Error::Transport(e)
            }
        })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(Error::RateLimited);
        }
        if status.as_u16() != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message: preview(&body, status.canonical_reason().unwrap_or("unknown")),
            });
        }

        let text = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: spec.timeout.as_secs(),
                }
            } else {
                Error::Transport(e)
            }
        })?;

        serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: preview(&text, ""),
        })
    }
}

fn preview(body: &str, fallback: &str) -> String {
    if body.trim().is_empty() {
        return fallback.to_owned();
    }
    match body.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_owned(),
    }
}
