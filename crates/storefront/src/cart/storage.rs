//! Durable cart persistence.
//!
//! The whole line-item list is stored as one JSON document under
//! [`CART_STORAGE_KEY`]. The contract is read-on-init, write-on-every-mutation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use super::CartLineItem;

/// Key the cart is stored under (also used as the session key).
pub const CART_STORAGE_KEY: &str = "cart";

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum CartStorageError {
    /// Reading or writing the backing file failed.
    #[error("cart storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stored document is not a valid line-item list.
    #[error("cart storage contains invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A place the cart's line items survive between runs.
pub trait CartStorage: Send + Sync {
    /// Load the stored line items, `None` if nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or holds invalid data.
    fn load(&self) -> Result<Option<Vec<CartLineItem>>, CartStorageError>;

    /// Replace the stored line items.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn save(&self, items: &[CartLineItem]) -> Result<(), CartStorageError>;
}

/// In-memory storage holding the serialized document.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    document: Mutex<Option<String>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage pre-filled with a raw JSON document.
    #[must_use]
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
        }
    }

    /// The raw stored document.
    #[must_use]
    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CartStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<CartLineItem>>, CartStorageError> {
        self.document()
            .map(|doc| serde_json::from_str(&doc))
            .transpose()
            .map_err(CartStorageError::from)
    }

    fn save(&self, items: &[CartLineItem]) -> Result<(), CartStorageError> {
        let doc = serde_json::to_string(items)?;
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(doc);
        Ok(())
    }
}

/// Storage backed by a `cart.json` file inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Store the cart under `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{CART_STORAGE_KEY}.json")),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<Vec<CartLineItem>>, CartStorageError> {
        match fs::read_to_string(&self.path) {
            Ok(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, items: &[CartLineItem]) -> Result<(), CartStorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a truncated document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_memory_storage_starts_empty() {
        let storage = MemoryStorage::new();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_memory_storage_reads_legacy_numbers() {
        let storage = MemoryStorage::with_document(
            r#"[{"product_id":"p1","variant_id":"v1","title":"Mango","thumbnail":null,"quantity":2,"unit_price":4.5}]"#,
        );
        let items = storage.load().unwrap().unwrap();
        assert_eq!(items[0].unit_price, Decimal::new(45, 1));
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested"));
        assert!(storage.load().unwrap().is_none());

        let items = vec![CartLineItem::new("p1", "v1", "Piña", 1, Decimal::from(3))];
        storage.save(&items).unwrap();
        assert_eq!(storage.load().unwrap().unwrap(), items);
        assert!(storage.path().ends_with("cart.json"));
    }

    #[test]
    fn test_file_storage_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path());
        fs::write(storage.path(), "not json").unwrap();
        assert!(matches!(storage.load(), Err(CartStorageError::Json(_))));
    }
}
