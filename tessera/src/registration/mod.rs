//! Tile registration.
//!
//! - **ncc**: zero-normalized cross-correlation surface and peak search
//! - **pairwise**: offset between two neighbouring tiles
//! - **chain**: cumulative offsets along one row or column
//! - **solver**: per-time-step global anchors and canvas size


mod chain;
mod ncc;
mod pairwise;
mod solver;

pub use chain::{accumulate_chain, Chain};
pub use ncc::{find_peak, match_template, Peak};
pub use pairwise::{register_pair, PairOffset};
pub use solver::{register_grid, register_step, CanvasSize, Registration, StepRegistration};
