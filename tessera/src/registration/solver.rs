//! Global tile positions per time step.
//!
//! Each column and each row is registered as an independent chain. A tile's
//! anchor is the mean of two paths from the grid origin: down the first column
//! then along its row, and along the first row then down its column. Averaging
//! the two cancels the first-order bias a single raster-order walk accumulates.

use std::collections::BTreeMap;

use glam::{IVec2, UVec2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use common::parallel::try_par_map_limited;
use common::Buffer2;

use crate::config::StitchConfig;
use crate::error::{Error, Result};
use crate::grid::{GridIndex, TileSet};
use crate::registration::chain::{accumulate_chain, Chain};
use crate::source::TileSource;

/// Canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: usize,
    pub height: usize,
}

/// Anchors and canvas of one time step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRegistration {
    pub step: u32,
    pub rows: usize,
    pub cols: usize,
    /// Row-major `(x, y)` pixel offset of every tile's origin in the canvas.
    pub anchors: Vec<UVec2>,
    pub canvas: CanvasSize,
}

impl StepRegistration {
    pub fn anchor(&self, row: usize, col: usize) -> UVec2 {
        assert!(row < self.rows && col < self.cols, "tile ({row}, {col}) out of grid");
        self.anchors[row * self.cols + col]
    }
}

/// Registration of every time step of one grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub grid: GridIndex,
    /// Persisted as a sequence; each entry carries its own step.
    #[serde(with = "steps_as_seq")]
    pub steps: BTreeMap<u32, StepRegistration>,
}

mod steps_as_seq {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::StepRegistration;

    pub fn serialize<S: Serializer>(
        steps: &BTreeMap<u32, StepRegistration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(steps.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<u32, StepRegistration>, D::Error> {
        let mut steps = BTreeMap::new();
        for step in Vec::<StepRegistration>::deserialize(deserializer)? {
            if let Some(previous) = steps.insert(step.step, step) {
                return Err(D::Error::custom(format!(
                    "time step {} is registered twice",
                    previous.step
                )));
            }
        }
        Ok(steps)
    }
}

impl Registration {
    pub fn step(&self, step: u32) -> Result<&StepRegistration> {
        self.steps.get(&step).ok_or(Error::UnknownTimeStep(step))
    }

    /// True when this registration was computed for `grid` and has every one of its steps.
    pub fn covers(&self, grid: &GridIndex) -> bool {
        self.grid.same_layout(grid) && grid.e.iter().all(|e| self.steps.contains_key(e))
    }

    /// The configured reference step, or the first step of the grid.
    pub fn reference_step(&self, config: &StitchConfig) -> Result<u32> {
        let step = match config.reference_step {
            Some(step) => step,
            None => *self
                .grid
                .e
                .first()
                .ok_or_else(|| Error::InvalidConfig("grid has no time steps".to_string()))?,
        };
        self.step(step)?;
        Ok(step)
    }
}

/// Registers every time step of `tiles`, at most `config.max_concurrent_steps` at once.
pub fn register_grid(
    tiles: &TileSet,
    source: &dyn TileSource,
    config: &StitchConfig,
) -> Result<Registration> {
    config.validate()?;
    let steps = try_par_map_limited(&tiles.grid.e, config.max_concurrent_steps, |&step| {
        register_step(tiles, source, step, config.template_size)
    })?;

    Ok(Registration {
        grid: tiles.grid.clone(),
        steps: steps.into_iter().map(|s| (s.step, s)).collect(),
    })
}

/// Computes anchors and canvas size for one time step.
pub fn register_step(
    tiles: &TileSet,
    source: &dyn TileSource,
    step: u32,
    template_size: usize,
) -> Result<StepRegistration> {
    let step_idx = tiles
        .grid
        .step_position(step)
        .ok_or(Error::UnknownTimeStep(step))?;
    let (rows, cols) = (tiles.grid.rows(), tiles.grid.cols());

    tracing::info!(step, rows, cols, template_size, "Registering time step");

    let images: Vec<Buffer2<f32>> = (0..rows * cols)
        .into_par_iter()
        .map(|i| source.load_image(tiles.at(step_idx, i / cols, i % cols)))
        .collect::<std::result::Result<_, _>>()?;
    let tile = |row: usize, col: usize| &images[row * cols + col];

    let column_chains: Vec<Chain> = (0..cols)
        .into_par_iter()
        .map(|col| {
            let chain: Vec<&Buffer2<f32>> = (0..rows).map(|row| tile(row, col)).collect();
            accumulate_chain(&chain, template_size)
        })
        .collect::<Result<_>>()?;
    let row_chains: Vec<Chain> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let chain: Vec<&Buffer2<f32>> = (0..cols).map(|col| tile(row, col)).collect();
            accumulate_chain(&chain, template_size)
        })
        .collect::<Result<_>>()?;

    let anchors = combine_chains(&column_chains, &row_chains);

    // Canvas reaches the far edge of every tile.
    let far = anchors
        .iter()
        .zip(&images)
        .fold(UVec2::ZERO, |acc, (anchor, image)| {
            acc.max(*anchor + UVec2::new(image.width() as u32, image.height() as u32))
        });
    let canvas = CanvasSize {
        width: far.x as usize,
        height: far.y as usize,
    };

    tracing::info!(
        step,
        canvas_width = canvas.width,
        canvas_height = canvas.height,
        "Time step registered"
    );

    Ok(StepRegistration {
        step,
        rows,
        cols,
        anchors,
        canvas,
    })
}

/// Averages the rows-first and columns-first paths and shifts the result so the
/// smallest anchor coordinate on each axis is zero.
fn combine_chains(column_chains: &[Chain], row_chains: &[Chain]) -> Vec<UVec2> {
    let rows = row_chains.len();
    let cols = column_chains.len();
    // Position relative to the chain's first tile.
    let rel = |chain: &Chain, i: usize| chain.offsets[i] - chain.offsets[0];

    let mut raw = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let via_rows = rel(&column_chains[0], row) + rel(&row_chains[row], col);
            let via_cols = rel(&row_chains[0], col) + rel(&column_chains[col], row);
            let sum = via_rows + via_cols;
            raw.push(IVec2::new(sum.x.div_euclid(2), sum.y.div_euclid(2)));
        }
    }

    let min = raw.iter().fold(IVec2::MAX, |acc, a| acc.min(*a));
    raw.into_iter().map(|a| (a - min).as_uvec2()).collect()
}
