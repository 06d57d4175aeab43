//! Tile source resolvers.
//!
//! Decoding container formats is the caller's business; stitching only needs
//! something that turns an address into a raster or a field record.

use std::collections::{HashMap, HashSet};

use common::Buffer2;

use crate::error::TileLoadError;
use crate::fields::FieldBundle;

/// Loads tiles by address. Shared across the threads that process time steps.
pub trait TileSource: Sync {
    fn load_image(&self, address: &str) -> Result<Buffer2<f32>, TileLoadError>;

    fn load_fields(&self, address: &str) -> Result<FieldBundle, TileLoadError>;
}

/// Tiles held in memory, keyed by address.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    images: HashMap<String, Buffer2<f32>>,
    fields: HashMap<String, FieldBundle>,
    corrupt: HashSet<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_image(&mut self, address: impl Into<String>, image: Buffer2<f32>) {
        self.images.insert(address.into(), image);
    }

    pub fn insert_fields(&mut self, address: impl Into<String>, fields: FieldBundle) {
        self.fields.insert(address.into(), fields);
    }

    /// Makes every later load of `address` fail as corrupt.
    pub fn mark_corrupt(&mut self, address: impl Into<String>) {
        self.corrupt.insert(address.into());
    }

    pub fn remove(&mut self, address: &str) {
        self.images.remove(address);
        self.fields.remove(address);
    }

    fn check_corrupt(&self, address: &str) -> Result<(), TileLoadError> {
        if self.corrupt.contains(address) {
            return Err(TileLoadError::Corrupt {
                address: address.to_string(),
                reason: "marked corrupt".to_string(),
            });
        }
        Ok(())
    }
}

impl TileSource for MemorySource {
    fn load_image(&self, address: &str) -> Result<Buffer2<f32>, TileLoadError> {
        self.check_corrupt(address)?;
        self.images
            .get(address)
            .cloned()
            .ok_or_else(|| TileLoadError::NotFound {
                address: address.to_string(),
            })
    }

    fn load_fields(&self, address: &str) -> Result<FieldBundle, TileLoadError> {
        self.check_corrupt(address)?;
        let fields = self
            .fields
            .get(address)
            .cloned()
            .ok_or_else(|| TileLoadError::NotFound {
                address: address.to_string(),
            })?;
        fields.validate(address)?;
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_corrupt_are_distinguished() {
        let mut source = MemorySource::new();
        source.insert_image("a", Buffer2::new_filled(2, 2, 1.0));
        source.insert_image("b", Buffer2::new_filled(2, 2, 1.0));
        source.mark_corrupt("b");

        assert_eq!(source.load_image("a").unwrap().size(), (2, 2));
        assert!(matches!(
            source.load_image("b"),
            Err(TileLoadError::Corrupt { .. })
        ));
        assert!(matches!(
            source.load_image("c"),
            Err(TileLoadError::NotFound { .. })
        ));
        assert!(matches!(
            source.load_fields("a"),
            Err(TileLoadError::NotFound { .. })
        ));
    }

    #[test]
    fn test_remove_forgets_tile() {
        let mut source = MemorySource::new();
        source.insert_image("a", Buffer2::new_filled(1, 1, 0.0));
        source.remove("a");
        assert!(source.load_image("a").is_err());
    }
}
