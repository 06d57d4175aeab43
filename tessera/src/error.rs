//! Error types for grid indexing, registration and stitching.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use common::serde::SerdeError;

/// Fatal errors. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No address matched naming scheme '{pattern}'")]
    NoMatch { pattern: String },

    #[error("Invalid naming scheme '{pattern}': {reason}")]
    InvalidNamingScheme { pattern: String, reason: String },

    #[error("Grid cell (e={e}, r={r}, c={c}) has {count} addresses, expected exactly one")]
    AmbiguousGrid { e: u32, r: u32, c: u32, count: usize },

    #[error("Template size {template_size} exceeds image dimensions {width}x{height}")]
    InvalidCrop {
        template_size: usize,
        width: usize,
        height: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Time step {0} has no registration")]
    UnknownTimeStep(u32),

    #[error("Grid layout mismatch: {0}")]
    GridMismatch(String),

    #[error("Failed to load tile during registration: {0}")]
    TileLoad(#[from] TileLoadError),

    #[error("Registration store I/O failed at '{path}': {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Registration store at '{path}' is unreadable: {source}")]
    StoreFormat {
        path: PathBuf,
        #[source]
        source: SerdeError,
    },

    #[error("Output sink rejected '{name}' for step {step}: {reason}")]
    Sink {
        step: u32,
        name: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a tile could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileLoadError {
    #[error("tile '{address}' not found")]
    NotFound { address: String },

    #[error("tile '{address}' is corrupt: {reason}")]
    Corrupt { address: String, reason: String },
}

impl TileLoadError {
    pub fn address(&self) -> &str {
        match self {
            TileLoadError::NotFound { address } | TileLoadError::Corrupt { address, .. } => {
                address
            }
        }
    }
}

/// A tile that was skipped while compositing or merging. Its samples stay unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLoadWarning {
    pub step: u32,
    pub row: u32,
    pub col: u32,
    pub error: TileLoadError,
}

impl std::fmt::Display for TileLoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "skipped tile (e={}, r={}, c={}): {}",
            self.step, self.row, self.col, self.error
        )
    }
}

impl TileLoadWarning {
    pub(crate) fn report(step: u32, row: u32, col: u32, error: TileLoadError) -> Self {
        let warning = Self {
            step,
            row,
            col,
            error,
        };
        tracing::warn!(step, row, col, address = warning.error.address(), "{}", warning);
        warning
    }
}
