//! Tessera - registration and stitching of gridded measurement tiles.
//!
//! A specimen imaged as a grid of overlapping tiles (rows `r`, columns `c`) at
//! successive load steps `e` is reassembled into one canvas per step:
//! - Grid indexing of tile addresses into a dense (e, r, c) grid
//! - Tile registration by normalized cross-correlation along row and column chains
//! - Raw image mosaics (overwrite or overlap averaging, Lanczos downscales)
//! - Displacement/strain field merging with drift correction and
//!   confidence-driven overlap resolution
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tessera::{
//!     index_grid, stitch_fields, FileStore, MemorySink, NamingScheme, SerdeFormat, StitchConfig,
//! };
//!
//! let scheme = NamingScheme::new("specimen_e{e}_r{r:02}_c{c:02}")?;
//! let tiles = index_grid(addresses, &scheme)?;
//! let mut store = FileStore::new("registrations", SerdeFormat::Yaml);
//! let mut sink = MemorySink::new();
//!
//! let config = StitchConfig::default();
//! let report = stitch_fields(&tiles, &source, &mut store, "specimen", &mut sink, &config)?;
//! for warning in &report.warnings {
//!     eprintln!("{warning}");
//! }
//! ```

pub mod config;
pub mod error;
pub mod fields;
pub mod grid;
pub mod merge;
pub mod mosaic;
pub mod pipeline;
pub mod registration;
pub mod sink;
pub mod source;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

// ============================================================================
// Configuration and errors
// ============================================================================

pub use config::{OverlapMode, SmoothingConfig, StitchConfig};
pub use error::{Error, Result, TileLoadError, TileLoadWarning};

// ============================================================================
// Grid and tiles
// ============================================================================

pub use fields::{FieldBundle, FieldKind};
pub use grid::{index_grid, Grid3, GridIndex, NamingScheme, TileKey, TileSet};
pub use source::{MemorySource, TileSource};

// ============================================================================
// Registration
// ============================================================================

pub use registration::{
    accumulate_chain, register_grid, register_pair, register_step, CanvasSize, Chain,
    PairOffset, Registration, StepRegistration,
};
pub use store::{load_or_register, FileStore, MemoryStore, RegistrationStore};

// ============================================================================
// Stitching
// ============================================================================

pub use merge::{merge_all, merge_step, MergedStep};
pub use mosaic::{compose_all, compose_step, Mosaic};
pub use pipeline::{stitch_fields, stitch_images, StitchReport};
pub use sink::{MemorySink, OutputSink};

pub use common::{Buffer2, SerdeFormat};
