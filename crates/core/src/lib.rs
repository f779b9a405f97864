//! Mariquita Core - Shared types library.
//!
//! This crate provides common types used across all Mariquita components:
//! - `storefront` - Catalog, cart, search and media proxy server
//! - `cli` - Command-line tools for catalog queries, cart files and signing
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identifiers, price ranges and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
