//! Persistence of registration results.
//!
//! Registration is the expensive pass. Storing its result per grid lets the
//! compositing and merge passes be re-run with different settings without
//! correlating a single image again.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use common::SerdeFormat;

use crate::config::StitchConfig;
use crate::error::{Error, Result};
use crate::grid::TileSet;
use crate::registration::{register_grid, Registration};
use crate::source::TileSource;

/// Read/write access to registrations keyed by grid identity.
pub trait RegistrationStore {
    /// `Ok(None)` when nothing was stored for `grid_id`.
    fn load(&self, grid_id: &str) -> Result<Option<Registration>>;
    fn save(&mut self, grid_id: &str, registration: &Registration) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, Registration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RegistrationStore for MemoryStore {
    fn load(&self, grid_id: &str) -> Result<Option<Registration>> {
        Ok(self.entries.get(grid_id).cloned())
    }

    fn save(&mut self, grid_id: &str, registration: &Registration) -> Result<()> {
        self.entries
            .insert(grid_id.to_string(), registration.clone());
        Ok(())
    }
}

/// One file per grid, `<dir>/<grid_id>.<ext>`, encoded with `format`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    format: SerdeFormat,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, format: SerdeFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn path(&self, grid_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", grid_id, self.format.extension()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RegistrationStore for FileStore {
    fn load(&self, grid_id: &str) -> Result<Option<Registration>> {
        let path = self.path(grid_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|source| Error::StoreIo {
            path: path.clone(),
            source,
        })?;
        let registration = common::serde::deserialize(&bytes, self.format)
            .map_err(|source| Error::StoreFormat { path, source })?;
        Ok(Some(registration))
    }

    fn save(&mut self, grid_id: &str, registration: &Registration) -> Result<()> {
        let path = self.path(grid_id);
        let bytes = common::serde::serialize(registration, self.format).map_err(|source| {
            Error::StoreFormat {
                path: path.clone(),
                source,
            }
        })?;
        fs::create_dir_all(&self.dir).map_err(|source| Error::StoreIo {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, bytes).map_err(|source| Error::StoreIo { path, source })?;
        Ok(())
    }
}

/// Returns the stored registration for `grid_id` if it covers every step of
/// `tiles`; otherwise registers the grid and stores the result.
///
/// A stored registration for a different layout, or one missing a time step, is
/// stale and gets replaced.
pub fn load_or_register(
    store: &mut dyn RegistrationStore,
    grid_id: &str,
    tiles: &TileSet,
    source: &dyn TileSource,
    config: &StitchConfig,
) -> Result<Registration> {
    match store.load(grid_id)? {
        Some(registration) if registration.covers(&tiles.grid) => {
            tracing::info!(grid_id, steps = registration.steps.len(), "Using stored registration");
            return Ok(registration);
        }
        Some(registration) => {
            tracing::warn!(
                grid_id,
                stored_rows = registration.grid.rows(),
                stored_cols = registration.grid.cols(),
                stored_steps = registration.steps.len(),
                "Stored registration does not match the tile grid, registering again"
            );
        }
        None => {
            tracing::info!(grid_id, "No stored registration, registering grid");
        }
    }

    let registration = register_grid(tiles, source, config)?;
    store.save(grid_id, &registration)?;
    Ok(registration)
}
