//! GitHub REST API connector.
//!
//! Implements [`Transport`] over `reqwest` with HTTP basic authentication
//! (`<user>:<token>`), and knows the URL shapes of the endpoints gitbored
//! polls.
//!
//! # Endpoints
//!
//! | Purpose | Location |
//! |---------|----------|
//! | Repository list | `{api_url}/users/{user}/repos?per_page={n}&page={p}` |
//! | Activity feed | `{api_url}/users/{user}/events` |
//! | Commit detail | the `url` field of each push-event commit |
//!
//! # Headers
//!
//! Requests carry `Accept: application/vnd.github+json`, a `User-Agent`
//! (GitHub rejects requests without one) and, when revalidating, an
//! `If-None-Match` validator. Responses are read for `ETag` and
//! `X-Poll-Interval`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ETAG, IF_NONE_MATCH, USER_AGENT};

use crate::config::GithubConfig;
use crate::credentials::Credentials;
use crate::error::SyncError;
use crate::http_cache::{RawResponse, Transport};

/// Header GitHub uses to advertise the minimum seconds between polls.
pub const POLL_INTERVAL_HEADER: &str = "x-poll-interval";

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Authenticated GitHub API client.
pub struct GithubClient {
    client: reqwest::Client,
    credentials: Credentials,
}

impl GithubClient {
    pub fn new(credentials: Credentials, config: &GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .with_context(|| format!("Invalid user agent: {}", config.user_agent))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl Transport for GithubClient {
    async fn get(&self, location: &str, etag: Option<&str>) -> crate::error::Result<RawResponse> {
        let transport_err = |source| SyncError::Transport {
            location: location.to_string(),
            source,
        };

        let mut request = self
            .client
            .get(location)
            .basic_auth(&self.credentials.username, Some(&self.credentials.token));
        if let Some(tag) = etag {
            request = request.header(IF_NONE_MATCH, tag);
        }

        let response = request.send().await.map_err(transport_err)?;
        let status = response.status();
        let headers = response.headers();

        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let poll_interval = headers
            .get(POLL_INTERVAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response.text().await.map_err(transport_err)?;

        let canonical = status.canonical_reason().unwrap_or("").to_string();
        let reason = if status.is_success() || status.as_u16() == 304 {
            canonical
        } else {
            match upstream_message(&body) {
                Some(message) => format!("{}: {}", canonical, message),
                None => canonical,
            }
        };

        Ok(RawResponse {
            status: status.as_u16(),
            reason,
            etag,
            poll_interval,
            body,
        })
    }
}

/// GitHub error bodies look like `{"message": "...", "documentation_url": "..."}`.
fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(|m| m.chars().take(200).collect())
}

pub fn repos_location(api_url: &str, user: &str, per_page: u32, page: u32) -> String {
    format!(
        "{}/users/{}/repos?per_page={}&page={}",
        api_url.trim_end_matches('/'),
        user,
        per_page,
        page
    )
}

pub fn events_location(api_url: &str, user: &str) -> String {
    format!("{}/users/{}/events", api_url.trim_end_matches('/'), user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locations_strip_trailing_slash() {
        assert_eq!(
            repos_location("https://api.github.com/", "octo", 100, 2),
            "https://api.github.com/users/octo/repos?per_page=100&page=2"
        );
        assert_eq!(
            events_location("https://api.github.com", "octo"),
            "https://api.github.com/users/octo/events"
        );
    }

    #[test]
    fn test_upstream_message_extracts_github_error() {
        let body = r#"{"message":"Bad credentials","documentation_url":"https://docs.github.com"}"#;
        assert_eq!(upstream_message(body).as_deref(), Some("Bad credentials"));
        assert_eq!(upstream_message("<html>"), None);
    }
}
