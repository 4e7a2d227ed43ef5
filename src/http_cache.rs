//! Conditional-request cache in front of the GitHub API.
//!
//! Every outbound `GET` goes through [`HttpCache::fetch`]. For each location
//! the cache remembers the last parsed body, its `ETag`, and the minimum poll
//! interval GitHub advertised in `X-Poll-Interval`:
//!
//! ```text
//!            ┌──────── entry fresh? ────────┐
//!   fetch ──▶│ yes: return cached body      │
//!            │ no:  GET + If-None-Match     │──▶ 304: touch, return cached body
//!            └──────────────────────────────┘──▶ 2xx: parse, store, return
//!                                           └──▶ other: UpstreamError, entry untouched
//! ```
//!
//! Rate limiting is advisory and tracked per location only. Many distinct
//! locations fetched in one cycle (one per new commit) are not throttled
//! against each other.
//!
//! The network sits behind the [`Transport`] trait; the production
//! implementation is [`GithubClient`](crate::connector_github::GithubClient).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Poll interval assumed when the server does not advertise one.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// The parts of an HTTP response the cache cares about.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Canonical reason phrase, e.g. `"Not Found"`.
    pub reason: String,
    pub etag: Option<String>,
    /// Value of `X-Poll-Interval`, in seconds.
    pub poll_interval: Option<u64>,
    pub body: String,
}

/// A single-shot `GET` against the remote API.
///
/// Implementations send `If-None-Match: <etag>` when `etag` is given and
/// must return 304 responses as `Ok`, not as errors. Only connection-level
/// failures are `Err` (as [`SyncError::Transport`]).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, location: &str, etag: Option<&str>) -> Result<RawResponse>;
}

/// What the cache knows about one location.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub last_fetched_at: DateTime<Utc>,
    pub etag: Option<String>,
    /// Minimum seconds between two requests to this location.
    pub poll_interval: u64,
    /// Last successfully parsed body.
    pub body: Value,
}

impl CacheEntry {
    /// Whether `now` is still inside this entry's poll interval.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let elapsed_ms = (now - self.last_fetched_at).num_milliseconds();
        let interval_ms = i64::try_from(self.poll_interval)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        elapsed_ms < interval_ms
    }
}

/// Per-location response cache owned by the ingestion engine.
pub struct HttpCache {
    transport: Box<dyn Transport>,
    entries: HashMap<String, CacheEntry>,
    requests_sent: u64,
}

impl HttpCache {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            entries: HashMap::new(),
            requests_sent: 0,
        }
    }

    /// Fetch `location`, honoring its poll interval and ETag.
    pub async fn fetch(&mut self, location: &str) -> Result<Value> {
        self.fetch_at(location, Utc::now()).await
    }

    /// Same as [`fetch`](Self::fetch) with an explicit clock reading.
    pub async fn fetch_at(&mut self, location: &str, now: DateTime<Utc>) -> Result<Value> {
        let etag = match self.entries.get(location) {
            Some(entry) if entry.is_fresh(now) => {
                debug!(location, poll_interval = entry.poll_interval, "cache hit");
                return Ok(entry.body.clone());
            }
            Some(entry) => entry.etag.clone(),
            None => None,
        };

        self.requests_sent += 1;
        let response = self.transport.get(location, etag.as_deref()).await?;

        match response.status {
            304 => {
                let entry = self.entries.get_mut(location).ok_or_else(|| SyncError::Upstream {
                    location: location.to_string(),
                    status: 304,
                    reason: "Not Modified without a cached body".to_string(),
                })?;
                entry.last_fetched_at = now;
                if let Some(interval) = response.poll_interval {
                    entry.poll_interval = interval;
                }
                debug!(location, "not modified");
                Ok(entry.body.clone())
            }
            200..=299 => {
                let body: Value =
                    serde_json::from_str(&response.body).map_err(|source| SyncError::Decode {
                        location: location.to_string(),
                        source,
                    })?;
                let poll_interval = response.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
                debug!(location, etag = ?response.etag, poll_interval, "fetched fresh body");
                self.entries.insert(
                    location.to_string(),
                    CacheEntry {
                        last_fetched_at: now,
                        etag: response.etag,
                        poll_interval,
                        body: body.clone(),
                    },
                );
                Ok(body)
            }
            status => Err(SyncError::Upstream {
                location: location.to_string(),
                status,
                reason: response.reason,
            }),
        }
    }

    /// All known locations and what is cached for them.
    pub fn entries(&self) -> &HashMap<String, CacheEntry> {
        &self.entries
    }

    pub fn entry(&self, location: &str) -> Option<&CacheEntry> {
        self.entries.get(location)
    }

    /// Number of requests handed to the transport since creation.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted [`Transport`] for unit tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::Value;

    use super::{RawResponse, Transport};
    use crate::error::{Result, SyncError};

    #[derive(Default)]
    struct Inner {
        routes: HashMap<String, VecDeque<RawResponse>>,
        calls: Vec<(String, Option<String>)>,
    }

    /// Replays canned responses per location. The last response queued for a
    /// location is repeated once the queue is drained to one element.
    /// Unknown locations answer 404.
    #[derive(Clone, Default)]
    pub struct ScriptedTransport {
        inner: Arc<Mutex<Inner>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, location: &str, response: RawResponse) {
            let mut inner = self.inner.lock().unwrap();
            inner
                .routes
                .entry(location.to_string())
                .or_default()
                .push_back(response);
        }

        pub fn push_json(&self, location: &str, body: Value, etag: Option<&str>, poll: Option<u64>) {
            self.push(location, ok_json(body, etag, poll));
        }

        pub fn calls(&self) -> Vec<(String, Option<String>)> {
            self.inner.lock().unwrap().calls.clone()
        }

        pub fn calls_to(&self, location: &str) -> usize {
            self.calls().iter().filter(|(l, _)| l == location).count()
        }
    }

    pub fn ok_json(body: Value, etag: Option<&str>, poll: Option<u64>) -> RawResponse {
        RawResponse {
            status: 200,
            reason: "OK".to_string(),
            etag: etag.map(str::to_string),
            poll_interval: poll,
            body: body.to_string(),
        }
    }

    pub fn status_only(code: u16, reason: &str) -> RawResponse {
        RawResponse {
            status: code,
            reason: reason.to_string(),
            etag: None,
            poll_interval: None,
            body: String::new(),
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, location: &str, etag: Option<&str>) -> Result<RawResponse> {
            let mut inner = self.inner.lock().unwrap();
            inner
                .calls
                .push((location.to_string(), etag.map(str::to_string)));
            let Some(queue) = inner.routes.get_mut(location) else {
                return Ok(status_only(404, "Not Found"));
            };
            let response = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            response.ok_or_else(|| SyncError::data_shape(location, "<scripted response>"))
        }
    }
}
