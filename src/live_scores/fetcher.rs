//! Bounded-time HTTP access to upstream score sources.
//!
//! Every request runs under a deadline. When the deadline elapses the request
//! future is dropped, which aborts the connection and releases the timer, so a
//! hung upstream never pins a task. Retry and fallback policy live in the
//! providers, not here.

use anyhow::{Context, Result};
use reqwest::header::CACHE_CONTROL;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const USER_AGENT: &str = "realtime-scores/0.3";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unreadable payload from {url}: {reason}")]
    Parse { url: String, reason: String },
}

/// Per-request knobs: deadline and extra headers.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub deadline: Duration,
    pub headers: Vec<(&'static str, String)>,
}

impl FetchOptions {
    pub fn with_deadline(deadline: Duration) -> Self {
        FetchOptions {
            deadline,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

#[derive(Clone)]
pub struct SourceFetcher {
    http: Client,
    default_deadline: Duration,
}

impl SourceFetcher {
    pub fn new(default_deadline: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(SourceFetcher {
            http,
            default_deadline,
        })
    }

    /// Options carrying the default deadline and no extra headers.
    pub fn options(&self) -> FetchOptions {
        FetchOptions::with_deadline(self.default_deadline)
    }

    /// GET `url` and decode the body as JSON into `T`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<T, UpstreamError> {
        let body = self.fetch_text(url, options).await?;
        serde_json::from_str(&body).map_err(|e| UpstreamError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// GET `url` and return the raw body (HTML pages, or JSON decoded later).
    pub async fn fetch_text(&self, url: &str, options: &FetchOptions) -> Result<String, UpstreamError> {
        debug!("GET {} (deadline {:?})", url, options.deadline);

        let request = async {
            let mut req = self.http.get(url).header(CACHE_CONTROL, "no-store");
            for (name, value) in &options.headers {
                req = req.header(*name, value);
            }
            let resp = req.send().await.map_err(|source| UpstreamError::Network {
                url: url.to_string(),
                source,
            })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(UpstreamError::Status {
                    url: url.to_string(),
                    status,
                });
            }
            resp.text().await.map_err(|source| UpstreamError::Network {
                url: url.to_string(),
                source,
            })
        };

        match tokio::time::timeout(options.deadline, request).await {
            Ok(outcome) => outcome,
            Err(_) => Err(UpstreamError::Timeout {
                url: url.to_string(),
                after: options.deadline,
            }),
        }
    }
}
