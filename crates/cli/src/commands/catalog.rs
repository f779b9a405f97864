//! Catalog queries from the command line.
//!
//! # Usage
//!
//! ```bash
//! # First page of published products in a category
//! mq-cli catalog --category pcat_fruit
//!
//! # Three pages of a collection from the search index, 250 g variants
//! mq-cli catalog --collection pcol_dried --weight 250 --source search --pages 3
//! ```
//!
//! # Environment Variables
//!
//! - `COMMERCE_BACKEND_URL`, `COMMERCE_PUBLISHABLE_KEY`, `COMMERCE_REGION_ID`
//! - `SEARCH_HOST`, `SEARCH_API_KEY`, `SEARCH_INDEX` for `--source search`

use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use mariquita_core::{CategoryId, CollectionId, PriceRange, ProductStatus, ProductTypeId, TagId};
use mariquita_storefront::catalog::{
    CatalogController, CatalogError, CatalogFilterSet, CatalogSource, CatalogStatus, CatalogView,
    CommerceCatalogSource, DEFAULT_PAGE_SIZE, ProductCard, SearchCatalogSource,
};
use mariquita_storefront::commerce::{CommerceClient, CommerceError};
use mariquita_storefront::config::{CommerceConfig, ConfigError, SearchConfig};
use mariquita_storefront::search::SearchClient;

/// Errors that can occur while querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Search is not configured: set SEARCH_HOST and SEARCH_API_KEY")]
    SearchUnavailable,

    #[error("Failed to load page {page}: {message}")]
    Page { page: u32, message: String },

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Backend the catalog is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CatalogSourceKind {
    Commerce,
    Search,
}

/// Catalog filters and pagination.
#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    /// Category id (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Collection id
    #[arg(long)]
    pub collection: Option<String>,

    /// Tag id (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Product type id (repeatable)
    #[arg(long = "type")]
    pub types: Vec<String>,

    /// Variant weight in grams (search source only)
    #[arg(long)]
    pub weight: Option<Decimal>,

    /// Products per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub limit: u32,

    /// Publication status (search source only)
    #[arg(long, default_value = "published")]
    pub status: ProductStatus,

    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pub pages: u32,

    /// Where to read the catalog from
    #[arg(long, value_enum, default_value = "commerce")]
    pub source: CatalogSourceKind,
}

impl CatalogArgs {
    /// The filter set these arguments describe.
    #[must_use]
    pub fn filters(&self) -> CatalogFilterSet {
        CatalogFilterSet {
            category_ids: self.categories.iter().map(CategoryId::new).collect(),
            collection_id: self.collection.as_ref().map(CollectionId::new),
            tag_ids: self.tags.iter().map(TagId::new).collect(),
            type_ids: self.types.iter().map(ProductTypeId::new).collect(),
            weight: self.weight,
            limit: self.limit.max(1),
            status: self.status,
        }
    }
}

/// What the command prints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogReport {
    pub count: u64,
    pub loaded: u64,
    pub has_more: bool,
    pub price_range: Option<PriceRange>,
    pub cards: Vec<ProductCard>,
}

/// Run the `catalog` command.
///
/// # Errors
///
/// Returns an error if configuration is missing or a page fails to load.
pub async fn run(args: &CatalogArgs) -> Result<(), CatalogCommandError> {
    dotenvy::dotenv().ok();

    let commerce_config = CommerceConfig::from_env()?;
    let currency = commerce_config.currency_code.clone();
    let filters = args.filters();

    let report = match args.source {
        CatalogSourceKind::Commerce => {
            let client = CommerceClient::new(&commerce_config)?;
            load_pages(CommerceCatalogSource::new(client), filters, args.pages).await?
        }
        CatalogSourceKind::Search => {
            let config = SearchConfig::from_env().ok_or(CatalogCommandError::SearchUnavailable)?;
            let source = SearchCatalogSource::new(SearchClient::new(&config));
            load_pages(source, filters, args.pages).await?
        }
    };

    let report = CatalogReport {
        count: report.result.count,
        loaded: report.result.loaded(),
        has_more: report.has_more,
        price_range: report.result.price_range,
        cards: report
            .result
            .products
            .into_iter()
            .map(|product| ProductCard::from_store(product, &currency))
            .collect(),
    };
    super::print_json(&report)?;
    Ok(())
}

/// Load the first page, then "load more" until `pages` pages are shown or
/// the catalog is exhausted.
///
/// # Errors
///
/// Returns an error if any page fails.
pub async fn load_pages<S: CatalogSource>(
    source: S,
    filters: CatalogFilterSet,
    pages: u32,
) -> Result<CatalogView, CatalogCommandError> {
    let first = source.fetch_page(&filters, 0).await?;
    let controller = CatalogController::new(source, first, filters);
    let mut rx = controller.subscribe();

    for page in 2..=pages {
        if !controller.snapshot().has_more {
            break;
        }
        tracing::debug!(page, "Loading next catalog page");
        controller.load_more();

        let view = rx
            .wait_for(|view| !view.status.is_busy())
            .await
            .map_err(|e| CatalogCommandError::Page {
                page,
                message: e.to_string(),
            })?
            .clone();

        if view.status == CatalogStatus::Error {
            return Err(CatalogCommandError::Page {
                page,
                message: view.error.unwrap_or_default(),
            });
        }
    }

    Ok(controller.snapshot())
}
