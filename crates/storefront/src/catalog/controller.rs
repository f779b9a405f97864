//! Per-consumer catalog state machine.
//!
//! ```text
//! Idle ──set_filters──▶ (page known) ─────────────────────▶ Ready
//!                    └─▶ Debouncing ──▶ Loading ──▶ Ready | Error
//! Ready | Error | Idle ──load_more (has_more)──▶ LoadingMore ──▶ Ready | Error
//! ```
//!
//! A failed filter change leaves the previous filters in force: the view keeps
//! showing their products, "load more" continues them, and requesting the
//! failed filters again retries the fetch.
//!
//! Every fetch takes a new generation and cancellation token and cancels the
//! previous one. A result is applied only if its generation is still current,
//! so a superseded response can never overwrite newer state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    CATALOG_ERROR_MESSAGE, CatalogError, CatalogFilterSet, CatalogResultPage, CatalogSource,
    FilterSignature,
};

/// Quiet period after a filter change before fetching.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Lifecycle of a consumer's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStatus {
    /// Showing the seed page; nothing fetched yet.
    Idle,
    /// Waiting out the debounce window after a filter change.
    Debouncing,
    /// Fetching the first page for new filters.
    Loading,
    /// Fetching the next page to append.
    LoadingMore,
    Ready,
    /// The last fetch failed; the previous result is still shown.
    Error,
}

impl CatalogStatus {
    /// Whether a fetch is pending or running.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Debouncing | Self::Loading | Self::LoadingMore)
    }
}

/// What a consumer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogView {
    pub result: CatalogResultPage,
    pub status: CatalogStatus,
    pub has_more: bool,
    /// Shopper-facing message of the last failure.
    pub error: Option<String>,
    /// Offset the next "load more" starts at.
    pub next_offset: u64,
}

impl CatalogView {
    fn settled(result: CatalogResultPage, status: CatalogStatus) -> Self {
        Self {
            has_more: result.has_more(),
            next_offset: result.loaded(),
            error: None,
            status,
            result,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FetchMode {
    Replace,
    Append { offset: u64 },
}

struct ControllerState {
    /// Filters requested last; equal to `shown_filters` unless a change is pending.
    filters: CatalogFilterSet,
    signature: FilterSignature,
    /// Filters the published view's products belong to.
    shown_filters: CatalogFilterSet,
    shown: FilterSignature,
    pages: HashMap<FilterSignature, CatalogResultPage>,
    debounce: Duration,
    generation: u64,
    token: Option<CancellationToken>,
}

impl ControllerState {
    /// Supersede any running fetch and start a new one.
    fn begin_fetch(&mut self) -> (u64, CancellationToken) {
        if let Some(previous) = self.token.take() {
            previous.cancel();
        }
        self.generation += 1;
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        (self.generation, token)
    }
}

struct Shared<S> {
    source: S,
    state: Mutex<ControllerState>,
    view: watch::Sender<CatalogView>,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drives one consumer's catalog view over a [`CatalogSource`].
///
/// Must be used from within a Tokio runtime; fetches run as spawned tasks.
pub struct CatalogController<S> {
    shared: Arc<Shared<S>>,
}

impl<S: CatalogSource> CatalogController<S> {
    /// Seed a controller with a page already rendered for `filters`.
    ///
    /// The seed page is registered under its signature, so returning to these
    /// filters later is served without a fetch.
    pub fn new(source: S, initial: CatalogResultPage, filters: CatalogFilterSet) -> Self {
        let signature = filters.signature();
        let pages = HashMap::from([(signature.clone(), initial.clone())]);
        let (view, _) = watch::channel(CatalogView::settled(initial, CatalogStatus::Idle));

        Self {
            shared: Arc::new(Shared {
                source,
                state: Mutex::new(ControllerState {
                    shown_filters: filters.clone(),
                    shown: signature.clone(),
                    filters,
                    signature,
                    pages,
                    debounce: DEFAULT_DEBOUNCE,
                    generation: 0,
                    token: None,
                }),
                view,
            }),
        }
    }

    /// Use a different debounce window for later filter changes.
    #[must_use]
    pub fn with_debounce(self, debounce: Duration) -> Self {
        self.shared.lock().debounce = debounce;
        self
    }

    /// Current view.
    #[must_use]
    pub fn snapshot(&self) -> CatalogView {
        self.shared.view.borrow().clone()
    }

    /// Receive every future view.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CatalogView> {
        self.shared.view.subscribe()
    }

    /// Filters the view currently reflects or is loading.
    #[must_use]
    pub fn filters(&self) -> CatalogFilterSet {
        self.shared.lock().filters.clone()
    }

    /// Switch to new filters.
    ///
    /// Unchanged signatures are ignored. A page already seen for the new
    /// signature is adopted immediately; otherwise a fetch is scheduled after
    /// the debounce window, restarting the window if called again.
    pub fn set_filters(&self, filters: CatalogFilterSet) {
        let signature = filters.signature();
        let mut state = self.shared.lock();
        if signature == state.signature {
            return;
        }

        state.filters = filters.clone();
        state.signature = signature.clone();
        let (generation, token) = state.begin_fetch();

        if let Some(page) = state.pages.get(&signature).cloned() {
            debug!(%signature, "Catalog page reused");
            state.shown_filters = filters;
            state.shown = signature;
            self.shared
                .view
                .send_replace(CatalogView::settled(page, CatalogStatus::Ready));
            return;
        }

        let debounce = state.debounce;
        self.shared.view.send_modify(|view| {
            view.status = CatalogStatus::Debouncing;
            view.error = None;
        });
        drop(state);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(debounce) => {}
            }

            {
                let state = shared.lock();
                if state.generation != generation {
                    return;
                }
                shared.view.send_modify(|view| view.status = CatalogStatus::Loading);
            }

            let outcome = tokio::select! {
                () = token.cancelled() => return,
                outcome = shared.source.fetch_page(&filters, 0) => outcome,
            };
            shared.apply(generation, signature, FetchMode::Replace, outcome);
        });
    }

    /// Fetch the next page and append it.
    ///
    /// Ignored while a fetch is pending, when everything is loaded, or when
    /// the view does not reflect the current filters.
    pub fn load_more(&self) {
        let mut state = self.shared.lock();
        let (offset, ready) = {
            let view = self.shared.view.borrow();
            (view.next_offset, !view.status.is_busy() && view.has_more)
        };
        if !ready || state.shown != state.signature {
            return;
        }

        let (generation, token) = state.begin_fetch();
        let filters = state.filters.clone();
        let signature = state.signature.clone();
        self.shared.view.send_modify(|view| {
            view.status = CatalogStatus::LoadingMore;
            view.error = None;
        });
        drop(state);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                () = token.cancelled() => return,
                outcome = shared.source.fetch_page(&filters, offset) => outcome,
            };
            shared.apply(generation, signature, FetchMode::Append { offset }, outcome);
        });
    }
}

impl<S> Shared<S> {
    fn apply(
        &self,
        generation: u64,
        signature: FilterSignature,
        mode: FetchMode,
        outcome: Result<CatalogResultPage, CatalogError>,
    ) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(%signature, "Discarding superseded catalog response");
            return;
        }
        state.token = None;

        match outcome {
            Ok(page) => {
                let result = match mode {
                    FetchMode::Replace => page,
                    FetchMode::Append { .. } => self.view.borrow().result.clone().append(page),
                };
                if let FetchMode::Replace = mode {
                    state.shown_filters = state.filters.clone();
                    state.shown = signature.clone();
                }
                state.pages.insert(signature, result.clone());

                let mut view = CatalogView::settled(result, CatalogStatus::Ready);
                if let FetchMode::Append { offset } = mode {
                    // Advance by what was returned, not by the page size.
                    let appended = view.result.loaded().saturating_sub(offset);
                    view.next_offset = offset + appended;
                }
                self.view.send_replace(view);
            }
            Err(e) => {
                warn!(error = %e, %signature, "Catalog fetch failed");
                if let FetchMode::Replace = mode {
                    state.filters = state.shown_filters.clone();
                    state.signature = state.shown.clone();
                }
                self.view.send_modify(|view| {
                    view.status = CatalogStatus::Error;
                    view.error = Some(CATALOG_ERROR_MESSAGE.to_string());
                });
            }
        }
    }
}

impl<S> Drop for CatalogController<S> {
    fn drop(&mut self) {
        if let Some(token) = self.shared.lock().token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use mariquita_core::{CategoryId, PriceRange};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::commerce::{CommerceError, StoreProduct};

    const TOTAL: u64 = 5;

    /// Serves `TOTAL` products per category, slowly for category "slow".
    #[derive(Default)]
    struct MockSource {
        calls: StdMutex<Vec<(String, u64)>>,
        fail: std::sync::atomic::AtomicBool,
    }

    impl MockSource {
        fn calls(&self) -> Vec<(String, u64)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn product(id: String) -> StoreProduct {
        serde_json::from_value(json!({ "id": id })).unwrap()
    }

    fn range_for(offset: u64) -> PriceRange {
        match offset {
            0 => PriceRange::new(Decimal::from(5), Decimal::from(20)),
            2 => PriceRange::new(Decimal::from(2), Decimal::from(25)),
            _ => PriceRange::new(Decimal::from(10), Decimal::from(12)),
        }
    }

    fn make_page(tag: &str, offset: u64, limit: u32) -> CatalogResultPage {
        let end = (offset + u64::from(limit)).min(TOTAL);
        CatalogResultPage {
            products: (offset..end).map(|i| product(format!("{tag}-{i}"))).collect(),
            count: TOTAL,
            limit,
            offset,
            price_range: Some(range_for(offset)),
        }
    }

    impl CatalogSource for MockSource {
        async fn fetch_page(
            &self,
            filters: &CatalogFilterSet,
            offset: u64,
        ) -> Result<CatalogResultPage, CatalogError> {
            let tag = filters
                .category_ids
                .first()
                .map_or_else(|| "all".to_string(), |id| id.to_string());
            self.calls.lock().unwrap().push((tag.clone(), offset));

            let delay = if tag == "slow" { 1_000 } else { 50 };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(CommerceError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }
                .into());
            }
            Ok(make_page(&tag, offset, filters.limit))
        }
    }

    fn filters(ids: &[&str]) -> CatalogFilterSet {
        CatalogFilterSet {
            category_ids: ids.iter().map(|id| CategoryId::new(*id)).collect(),
            limit: 2,
            ..CatalogFilterSet::default()
        }
    }

    fn controller() -> CatalogController<Arc<MockSource>> {
        controller_with(Arc::new(MockSource::default()))
    }

    fn controller_with(source: Arc<MockSource>) -> CatalogController<Arc<MockSource>> {
        CatalogController::new(source, make_page("all", 0, 2), filters(&[]))
    }

    async fn settle(controller: &CatalogController<Arc<MockSource>>) -> CatalogView {
        let mut rx = controller.subscribe();
        rx.wait_for(|view| !view.status.is_busy()).await.unwrap().clone()
    }

    fn product_ids(view: &CatalogView) -> Vec<String> {
        view.result.products.iter().map(|p| p.id.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_page_is_idle() {
        let view = controller().snapshot();
        assert_eq!(view.status, CatalogStatus::Idle);
        assert_eq!(view.next_offset, 2);
        assert!(view.has_more);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_debounces_then_replaces() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        controller.set_filters(filters(&["fruta"]));
        assert_eq!(controller.snapshot().status, CatalogStatus::Debouncing);

        let view = settle(&controller).await;
        assert_eq!(view.status, CatalogStatus::Ready);
        assert_eq!(product_ids(&view), vec!["fruta-0", "fruta-1"]);
        assert_eq!(view.next_offset, 2);
        assert_eq!(source.calls(), vec![("fruta".to_string(), 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_fetch_once() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        controller.set_filters(filters(&["a"]));
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.set_filters(filters(&["b"]));
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.set_filters(filters(&["c"]));

        let view = settle(&controller).await;
        assert_eq!(product_ids(&view), vec!["c-0", "c-1"]);
        assert_eq!(source.calls(), vec![("c".to_string(), 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equivalent_filters_hit_page_cache() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        controller.set_filters(filters(&["b", "a"]));
        settle(&controller).await;

        controller.set_filters(filters(&["x"]));
        settle(&controller).await;

        controller.set_filters(filters(&["a", "b"]));
        let view = controller.snapshot();
        assert_eq!(view.status, CatalogStatus::Ready);
        assert_eq!(product_ids(&view), vec!["b-0", "b-1"]);
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returning_to_seed_filters_is_cached() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        controller.set_filters(filters(&["a"]));
        settle(&controller).await;
        controller.set_filters(filters(&[]));

        assert_eq!(product_ids(&controller.snapshot()), vec!["all-0", "all-1"]);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source)).with_debounce(Duration::ZERO);

        controller.set_filters(filters(&["slow"]));
        // Let the slow fetch start.
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.set_filters(filters(&["fast"]));

        let view = settle(&controller).await;
        assert_eq!(product_ids(&view), vec!["fast-0", "fast-1"]);

        // Well past the slow fetch's completion time.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(product_ids(&controller.snapshot()), vec!["fast-0", "fast-1"]);
        assert_eq!(
            source.calls(),
            vec![("slow".to_string(), 0), ("fast".to_string(), 0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_appends_and_widens_range() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        controller.load_more();
        assert_eq!(controller.snapshot().status, CatalogStatus::LoadingMore);
        let view = settle(&controller).await;

        assert_eq!(product_ids(&view), vec!["all-0", "all-1", "all-2", "all-3"]);
        assert_eq!(view.next_offset, 4);
        assert!(view.has_more);
        assert_eq!(
            view.result.price_range,
            Some(PriceRange::new(Decimal::from(2), Decimal::from(25)))
        );

        controller.load_more();
        let view = settle(&controller).await;
        assert_eq!(view.result.products.len(), 5);
        assert_eq!(view.next_offset, 5);
        assert!(!view.has_more);
        assert_eq!(
            view.result.price_range,
            Some(PriceRange::new(Decimal::from(2), Decimal::from(25)))
        );

        controller.load_more();
        assert_eq!(controller.snapshot().status, CatalogStatus::Ready);
        assert_eq!(
            source.calls(),
            vec![("all".to_string(), 2), ("all".to_string(), 4)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_while_loading_is_noop() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        controller.load_more();
        controller.load_more();
        settle(&controller).await;

        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_cancels_load_more() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source)).with_debounce(Duration::ZERO);

        controller.load_more();
        controller.set_filters(filters(&["a"]));

        let view = settle(&controller).await;
        assert_eq!(product_ids(&view), vec!["a-0", "a-1"]);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(product_ids(&controller.snapshot()), vec!["a-0", "a-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_keeps_previous_result() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));
        source.fail.store(true, std::sync::atomic::Ordering::SeqCst);

        controller.load_more();
        let view = settle(&controller).await;

        assert_eq!(view.status, CatalogStatus::Error);
        assert_eq!(view.error.as_deref(), Some(CATALOG_ERROR_MESSAGE));
        assert_eq!(product_ids(&view), vec!["all-0", "all-1"]);
        assert_eq!(view.next_offset, 2);

        // No automatic retry.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls().len(), 1);

        // A manual retry from the error state succeeds.
        source.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        controller.load_more();
        let view = settle(&controller).await;
        assert_eq!(view.status, CatalogStatus::Ready);
        assert_eq!(view.error, None);
        assert_eq!(view.result.products.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_filter_change_keeps_previous_filters() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        source.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        controller.set_filters(filters(&["a"]));
        let view = settle(&controller).await;
        assert_eq!(view.status, CatalogStatus::Error);
        assert_eq!(product_ids(&view), vec!["all-0", "all-1"]);
        assert_eq!(controller.filters(), filters(&[]));

        // Load more continues the products on screen.
        source.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        controller.load_more();
        let view = settle(&controller).await;
        assert_eq!(view.status, CatalogStatus::Ready);
        assert_eq!(product_ids(&view), vec!["all-0", "all-1", "all-2", "all-3"]);
        assert_eq!(
            source.calls(),
            vec![("a".to_string(), 0), ("all".to_string(), 2)]
        );

        // The page stored for "a" is its own, not a mix.
        controller.set_filters(filters(&["a"]));
        let view = settle(&controller).await;
        assert_eq!(product_ids(&view), vec!["a-0", "a-1"]);
        controller.set_filters(filters(&["x"]));
        settle(&controller).await;
        controller.set_filters(filters(&["a"]));
        assert_eq!(product_ids(&controller.snapshot()), vec!["a-0", "a-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_filters_retry_after_failure() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        source.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        controller.set_filters(filters(&["a"]));
        assert_eq!(settle(&controller).await.status, CatalogStatus::Error);

        source.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        controller.set_filters(filters(&["a"]));
        assert_eq!(controller.snapshot().status, CatalogStatus::Debouncing);

        let view = settle(&controller).await;
        assert_eq!(view.status, CatalogStatus::Ready);
        assert_eq!(product_ids(&view), vec!["a-0", "a-1"]);
        assert_eq!(controller.filters(), filters(&["a"]));
        assert_eq!(source.calls(), vec![("a".to_string(), 0), ("a".to_string(), 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_waits_for_pending_filter_change() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        controller.set_filters(filters(&["a"]));
        controller.load_more();
        let view = settle(&controller).await;

        assert_eq!(product_ids(&view), vec!["a-0", "a-1"]);
        assert_eq!(source.calls(), vec![("a".to_string(), 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_signature_is_ignored() {
        let source = Arc::new(MockSource::default());
        let controller = controller_with(Arc::clone(&source));

        controller.set_filters(filters(&[]));
        assert_eq!(controller.snapshot().status, CatalogStatus::Idle);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(source.calls().is_empty());
    }
}
