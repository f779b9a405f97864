//! Filter expressions for the search index.
//!
//! Each selector becomes one clause; multi-valued selectors are OR-groups and
//! clauses are joined with ` AND `.

use crate::catalog::CatalogFilterSet;

/// Quote a value for the filter syntax.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn equals(attribute: &str, value: &str) -> String {
    format!("{attribute} = {}", quote(value))
}

fn any_of<'a>(attribute: &str, values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let clauses: Vec<String> = values.into_iter().map(|v| equals(attribute, v)).collect();
    (!clauses.is_empty()).then(|| format!("({})", clauses.join(" OR ")))
}

/// Build the filter expression for `filters`, `None` when nothing filters.
#[must_use]
pub fn build_filter_expression(filters: &CatalogFilterSet) -> Option<String> {
    let parts = [
        Some(equals("status", filters.status.as_str())),
        any_of("category_ids", filters.category_ids.iter().map(|id| id.as_str())),
        filters
            .collection_id
            .as_ref()
            .map(|id| equals("collection_id", id.as_str())),
        any_of("tag_values", filters.tag_ids.iter().map(|id| id.as_str())),
        any_of("type_id", filters.type_ids.iter().map(|id| id.as_str())),
        filters
            .weight
            .map(|weight| format!("variant_weights = {}", weight.normalize())),
    ];

    let parts: Vec<String> = parts.into_iter().flatten().collect();
    (!parts.is_empty()).then(|| parts.join(" AND "))
}

/// Filter expression matching every product of a collection.
#[must_use]
pub fn collection_filter(collection_id: &str) -> String {
    equals("collection_id", collection_id)
}
