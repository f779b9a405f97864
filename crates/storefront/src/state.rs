//! Application state shared across handlers.

use std::sync::Arc;

use crate::catalog::{CachedCatalogSource, CommerceCatalogSource, SearchCatalogSource};
use crate::commerce::{CommerceClient, CommerceError};
use crate::config::StorefrontConfig;
use crate::media::MediaSigner;
use crate::search::SearchClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend clients, the shared catalog page caches and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    commerce: CommerceClient,
    search: Option<SearchClient>,
    commerce_catalog: CachedCatalogSource<CommerceCatalogSource>,
    search_catalog: Option<CachedCatalogSource<SearchCatalogSource>>,
    media: Option<MediaSigner>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Search and media are enabled only when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the commerce client cannot be built (no region).
    pub fn new(config: StorefrontConfig) -> Result<Self, CommerceError> {
        let commerce = CommerceClient::new(&config.commerce)?;
        let search = config.search.as_ref().map(SearchClient::new);
        let media = config.media.as_ref().map(MediaSigner::new);

        let ttl = config.catalog_cache_ttl;
        let commerce_catalog =
            CachedCatalogSource::new(CommerceCatalogSource::new(commerce.clone()), ttl);
        let search_catalog = search
            .clone()
            .map(|client| CachedCatalogSource::new(SearchCatalogSource::new(client), ttl));

        tracing::info!(
            search = search.is_some(),
            media = media.is_some(),
            catalog_cache_ttl_ms = ttl.as_millis(),
            "Application state ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                commerce,
                search,
                commerce_catalog,
                search_catalog,
                media,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the commerce backend client.
    #[must_use]
    pub fn commerce(&self) -> &CommerceClient {
        &self.inner.commerce
    }

    /// The search client, if search is configured.
    #[must_use]
    pub fn search(&self) -> Option<&SearchClient> {
        self.inner.search.as_ref()
    }

    /// Cached catalog pages from the commerce backend.
    #[must_use]
    pub fn commerce_catalog(&self) -> &CachedCatalogSource<CommerceCatalogSource> {
        &self.inner.commerce_catalog
    }

    /// Cached catalog pages from the search index, if search is configured.
    #[must_use]
    pub fn search_catalog(&self) -> Option<&CachedCatalogSource<SearchCatalogSource>> {
        self.inner.search_catalog.as_ref()
    }

    /// The media URL signer, if the image proxy is configured.
    #[must_use]
    pub fn media(&self) -> Option<&MediaSigner> {
        self.inner.media.as_ref()
    }
}
