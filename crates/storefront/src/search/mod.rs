//! Hosted search service client.
//!
//! The index holds a denormalized, currency-flattened projection of every
//! product. Queries are plain text plus a boolean filter expression over the
//! indexed attributes; results are converted back to store products.
//!
//! Search is optional: without a host and key the client is never built and
//! callers report the feature as unavailable.

pub mod convert;
pub mod filters;
pub mod types;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use mariquita_core::CollectionId;

use crate::config::SearchConfig;

pub use convert::{collect_weight_labels, compute_search_price_range, hit_to_product};
pub use filters::{build_filter_expression, collection_filter};
pub use types::{SEARCH_PRODUCT_ATTRIBUTES, SearchHit, SearchResponse, parse_search_price};

/// Upper bound on hits read when collecting facet values.
const FACET_SCAN_LIMIT: u32 = 1000;

/// Errors that can occur when querying the search service.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Search service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One page of hits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Estimated total number of matching documents.
    pub estimated_total_hits: u64,
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
    offset: u64,
    limit: u32,
    attributes_to_retrieve: &'a [&'a str],
}

/// Client for the products index.
#[derive(Clone)]
pub struct SearchClient {
    inner: Arc<SearchClientInner>,
}

struct SearchClientInner {
    client: reqwest::Client,
    search_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("search_url", &self.inner.search_url)
            .finish_non_exhaustive()
    }
}

impl SearchClient {
    /// Create a client for the configured index.
    #[must_use]
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            inner: Arc::new(SearchClientInner {
                client: reqwest::Client::new(),
                search_url: format!("{}/indexes/{}/search", config.host, config.index),
                api_key: config.api_key.clone(),
            }),
        }
    }

    /// Run a search.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        filter: Option<&str>,
        offset: u64,
        limit: u32,
    ) -> Result<SearchResults, SearchError> {
        self.search_attributes(query, filter, offset, limit, SEARCH_PRODUCT_ATTRIBUTES)
            .await
    }

    async fn search_attributes(
        &self,
        query: &str,
        filter: Option<&str>,
        offset: u64,
        limit: u32,
        attributes: &[&str],
    ) -> Result<SearchResults, SearchError> {
        let request = SearchRequest {
            q: query,
            filter,
            offset,
            limit,
            attributes_to_retrieve: attributes,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.search_url)
            .bearer_auth(self.inner.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Search service returned non-success status"
            );
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        let body: SearchResponse = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse search response"
            );
            SearchError::Parse(e)
        })?;

        let estimated_total_hits = body
            .estimated_total_hits
            .unwrap_or_else(|| u64::try_from(body.hits.len()).unwrap_or(u64::MAX));
        debug!(hits = body.hits.len(), estimated_total_hits, "Search completed");

        Ok(SearchResults {
            hits: body.hits,
            estimated_total_hits,
            offset,
            limit,
        })
    }

    /// Distinct weight labels offered by products of a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the search request fails.
    #[instrument(skip(self), fields(collection_id = %collection_id.as_str()))]
    pub async fn available_weights_for_collection(
        &self,
        collection_id: &CollectionId,
    ) -> Result<Vec<String>, SearchError> {
        let filter = collection_filter(collection_id.as_str());
        let results = self
            .search_attributes(
                "",
                Some(&filter),
                0,
                FACET_SCAN_LIMIT,
                &["available_weights_text"],
            )
            .await?;
        Ok(collect_weight_labels(&results.hits))
    }
}
