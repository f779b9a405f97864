//! Core types for Mariquita.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod status;

pub use id::*;
pub use price::{PriceRange, merge_price_ranges};
pub use status::{ProductStatus, StatusParseError};
