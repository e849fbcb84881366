// Category page retrieval.
//
// `RecordSource` is the seam between the pipeline and the network: the
// harvest runner only sees the trait, so tests feed it canned pages.
// `HttpSource` is the production implementation over a shared reqwest
// client with a per-request timeout.

use crate::config::SourceUrls;
use crate::stats::Category;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a category page could not be retrieved. A failed category degrades
/// to zero records for the run; it never blocks the other three.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {category} table failed: {source}")]
    Transport {
        category: Category,
        source: reqwest::Error,
    },

    #[error("{category} table returned HTTP {status}")]
    Status {
        category: Category,
        status: reqwest::StatusCode,
    },

    #[error("failed to read {category} response body: {source}")]
    Body {
        category: Category,
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn category(&self) -> Category {
        match self {
            FetchError::Transport { category, .. }
            | FetchError::Status { category, .. }
            | FetchError::Body { category, .. } => *category,
        }
    }
}

// ---------------------------------------------------------------------------
// RecordSource trait
// ---------------------------------------------------------------------------

/// Supplies the raw records page for one stat category.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, category: Category) -> Result<String, FetchError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

const USER_AGENT: &str = concat!("auction-desk/", env!("CARGO_PKG_VERSION"));

/// Fetches the records pages over HTTP. One client is built up front and
/// shared by the four concurrent category fetches.
pub struct HttpSource {
    http: reqwest::Client,
    urls: SourceUrls,
}

impl HttpSource {
    pub fn new(urls: SourceUrls, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http, urls })
    }

    fn url_for(&self, category: Category) -> &str {
        match category {
            Category::Runs => &self.urls.runs,
            Category::Wickets => &self.urls.wickets,
            Category::Dismissals => &self.urls.dismissals,
            Category::Catches => &self.urls.catches,
        }
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn fetch(&self, category: Category) -> Result<String, FetchError> {
        let response = self
            .http
            .get(self.url_for(category))
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                category,
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { category, status });
        }

        response.text().await.map_err(|e| FetchError::Body {
            category,
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
