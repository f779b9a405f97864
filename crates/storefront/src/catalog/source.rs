//! Where catalog pages come from.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::instrument;

use super::{CatalogError, CatalogFilterSet, CatalogResultPage};
use crate::cache::{TtlCache, serialize_cache_key};
use crate::commerce::{CommerceClient, ProductListQuery, compute_price_range};
use crate::search::{SearchClient, build_filter_expression, compute_search_price_range, hit_to_product};

/// A backend able to serve one page of a filtered catalog.
pub trait CatalogSource: Send + Sync + 'static {
    /// Fetch `filters.limit` products starting at `offset`.
    fn fetch_page(
        &self,
        filters: &CatalogFilterSet,
        offset: u64,
    ) -> impl Future<Output = Result<CatalogResultPage, CatalogError>> + Send;
}

impl<S: CatalogSource> CatalogSource for Arc<S> {
    fn fetch_page(
        &self,
        filters: &CatalogFilterSet,
        offset: u64,
    ) -> impl Future<Output = Result<CatalogResultPage, CatalogError>> + Send {
        S::fetch_page(self, filters, offset)
    }
}

// =============================================================================
// Commerce backend
// =============================================================================

/// Pages listed directly from the commerce backend.
///
/// The store API only exposes published products and has no weight facet,
/// so `status` and `weight` do not narrow these results.
#[derive(Debug, Clone)]
pub struct CommerceCatalogSource {
    client: CommerceClient,
}

impl CommerceCatalogSource {
    #[must_use]
    pub const fn new(client: CommerceClient) -> Self {
        Self { client }
    }
}

impl CatalogSource for CommerceCatalogSource {
    #[instrument(skip(self, filters), fields(source = "commerce"))]
    async fn fetch_page(
        &self,
        filters: &CatalogFilterSet,
        offset: u64,
    ) -> Result<CatalogResultPage, CatalogError> {
        let query = ProductListQuery {
            limit: filters.limit,
            offset,
            category_ids: filters.category_ids.clone(),
            collection_ids: filters.collection_id.iter().cloned().collect(),
            tag_ids: filters.tag_ids.clone(),
            type_ids: filters.type_ids.clone(),
            ..ProductListQuery::default()
        };

        let list = self.client.list_products(&query).await?;
        let price_range = compute_price_range(&list.products);

        Ok(CatalogResultPage {
            products: list.products,
            count: list.count,
            limit: list.limit,
            offset: list.offset,
            price_range: Some(price_range),
        })
    }
}

// =============================================================================
// Search index
// =============================================================================

/// Pages served by the search index, priced for the selected weight.
#[derive(Debug, Clone)]
pub struct SearchCatalogSource {
    client: SearchClient,
}

impl SearchCatalogSource {
    #[must_use]
    pub const fn new(client: SearchClient) -> Self {
        Self { client }
    }
}

impl CatalogSource for SearchCatalogSource {
    #[instrument(skip(self, filters), fields(source = "search"))]
    async fn fetch_page(
        &self,
        filters: &CatalogFilterSet,
        offset: u64,
    ) -> Result<CatalogResultPage, CatalogError> {
        let filter = build_filter_expression(filters);
        let results = self
            .client
            .search("", filter.as_deref(), offset, filters.limit)
            .await?;

        let products: Vec<_> = results
            .hits
            .iter()
            .map(|hit| hit_to_product(hit, filters.weight))
            .collect();
        let price_range = compute_search_price_range(&products);

        Ok(CatalogResultPage {
            products,
            count: results.estimated_total_hits,
            limit: filters.limit,
            offset,
            price_range: Some(price_range),
        })
    }
}

// =============================================================================
// Shared cache
// =============================================================================

#[derive(Serialize)]
struct PageKey<'a> {
    filters: &'a CatalogFilterSet,
    offset: u64,
}

/// Any source behind the process-wide page cache.
///
/// Identical `(filters, offset)` requests from different consumers share one
/// load while it is in flight and its result until the TTL elapses.
pub struct CachedCatalogSource<S> {
    source: Arc<S>,
    cache: TtlCache<CatalogResultPage, CatalogError>,
}

impl<S> Clone for CachedCatalogSource<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
        }
    }
}

impl<S> std::fmt::Debug for CachedCatalogSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCatalogSource")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<S: CatalogSource> CachedCatalogSource<S> {
    /// Wrap `source`, keeping pages for `ttl` (`Duration::ZERO` disables caching).
    #[must_use]
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source: Arc::new(source),
            cache: TtlCache::new(ttl),
        }
    }

    /// The wrapped source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Drop every cached page.
    pub async fn clear(&self) {
        self.cache.clear().await;
    }
}

impl<S: CatalogSource> CatalogSource for CachedCatalogSource<S> {
    async fn fetch_page(
        &self,
        filters: &CatalogFilterSet,
        offset: u64,
    ) -> Result<CatalogResultPage, CatalogError> {
        let filters = filters.normalized();
        let key = serialize_cache_key(&PageKey {
            filters: &filters,
            offset,
        })?;

        let source = Arc::clone(&self.source);
        self.cache
            .get(&key, move || async move { source.fetch_page(&filters, offset).await })
            .await
            .map_err(CatalogError::Shared)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mariquita_core::CategoryId;

    use super::*;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    impl CatalogSource for CountingSource {
        async fn fetch_page(
            &self,
            filters: &CatalogFilterSet,
            offset: u64,
        ) -> Result<CatalogResultPage, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(CatalogResultPage {
                offset,
                ..CatalogResultPage::empty(filters.limit)
            })
        }
    }

    fn filters(ids: &[&str]) -> CatalogFilterSet {
        CatalogFilterSet {
            category_ids: ids.iter().map(|id| CategoryId::new(*id)).collect(),
            ..CatalogFilterSet::default()
        }
    }

    #[tokio::test]
    async fn test_equivalent_filters_share_one_load() {
        let cached = CachedCatalogSource::new(CountingSource::default(), Duration::from_secs(60));

        let (ba, ab) = (filters(&["b", "a"]), filters(&["a", "b"]));
        let (a, b) = tokio::join!(cached.fetch_page(&ba, 0), cached.fetch_page(&ab, 0));
        a.unwrap();
        b.unwrap();
        cached.fetch_page(&filters(&["a", "b", "a"]), 0).await.unwrap();

        assert_eq!(cached.source().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offsets_are_distinct_keys() {
        let cached = CachedCatalogSource::new(CountingSource::default(), Duration::from_secs(60));
        cached.fetch_page(&filters(&[]), 0).await.unwrap();
        let second = cached.fetch_page(&filters(&[]), 12).await.unwrap();

        assert_eq!(second.offset, 12);
        assert_eq!(cached.source().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_loads() {
        let cached = CachedCatalogSource::new(CountingSource::default(), Duration::ZERO);
        cached.fetch_page(&filters(&[]), 0).await.unwrap();
        cached.fetch_page(&filters(&[]), 0).await.unwrap();
        assert_eq!(cached.source().calls.load(Ordering::SeqCst), 2);
    }
}
