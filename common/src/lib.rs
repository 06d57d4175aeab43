//! Shared building blocks for the tessera workspace: rasters, persistence
//! formats and bounded parallel iteration.

pub mod buffer2;
pub mod file_format;
pub mod parallel;
pub mod serde;

pub use buffer2::Buffer2;
pub use file_format::SerdeFormat;
