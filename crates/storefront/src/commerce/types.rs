//! Domain types returned by the commerce backend's store API.
//!
//! Only the fields the catalog and cart use are modelled. Price amounts are
//! parsed leniently: anything that is not a recognisable number becomes
//! `None` instead of failing the whole response.

use mariquita_core::{
    CategoryId, CollectionId, ProductId, ProductStatus, ProductTypeId, TagId, VariantId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::pricing::parse_amount;

/// Deserialize an optional amount that may be a number, a string or junk.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_amount))
}

/// Deserialize a status, treating unknown values as absent.
fn lenient_status<'de, D>(deserializer: D) -> Result<Option<ProductStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|s| s.parse().ok()))
}

/// A product as listed by the store API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreProduct {
    pub id: ProductId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub variants: Vec<StoreVariant>,
    #[serde(default)]
    pub categories: Vec<ProductCategory>,
    #[serde(default)]
    pub collection: Option<ProductCollection>,
    #[serde(default, rename = "type")]
    pub product_type: Option<ProductType>,
    #[serde(default)]
    pub tags: Vec<ProductTag>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

/// A purchasable variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreVariant {
    pub id: VariantId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    /// Weight in grams.
    #[serde(default, deserialize_with = "lenient_amount")]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub calculated_price: Option<CalculatedPrice>,
    #[serde(default)]
    pub prices: Vec<MoneyAmount>,
}

/// Region-specific price computed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculatedPrice {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub calculated_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub calculated_amount_with_tax: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub original_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub original_amount_with_tax: Option<Decimal>,
    #[serde(default)]
    pub calculated_price: Option<PriceListInfo>,
}

/// Price list the calculated amount came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceListInfo {
    #[serde(default)]
    pub price_list_type: Option<String>,
}

/// Raw price entry, used when no calculated price is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyAmount {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCategory {
    pub id: CategoryId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCollection {
    pub id: CollectionId,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductType {
    pub id: ProductTypeId,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTag {
    #[serde(default)]
    pub id: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
}

/// One page of the product listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductList {
    pub products: Vec<StoreProduct>,
    /// Total matching products, possibly more than `products.len()`.
    pub count: u64,
    pub limit: u32,
    pub offset: u64,
}

/// Parameters accepted by the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductListQuery {
    pub limit: u32,
    pub offset: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub category_ids: Vec<CategoryId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collection_ids: Vec<CollectionId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<TagId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_ids: Vec<ProductTypeId>,
}

impl StoreProduct {
    /// Title with the storefront's fallback.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled product")
    }

    /// Thumbnail, first image, or the placeholder image.
    #[must_use]
    pub fn display_thumbnail(&self) -> &str {
        self.thumbnail
            .as_deref()
            .or_else(|| self.images.first().map(|img| img.url.as_str()))
            .unwrap_or(PLACEHOLDER_PRODUCT_IMAGE)
    }
}

/// Image shown when a product has none.
pub const PLACEHOLDER_PRODUCT_IMAGE: &str = "/images/placeholder-product.jpg";
