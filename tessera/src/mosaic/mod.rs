//! Mosaic compositor: paints raw image tiles into the registered canvas.
//!
//! Tiles are painted in reverse row-major order, so in overwrite mode the tile
//! at (0, 0) is painted last and wins every overlap it takes part in. Overlap
//! precedence is positional, never driven by image content.


mod resample;

use common::parallel::try_par_map_limited;
use common::Buffer2;

use crate::config::{OverlapMode, StitchConfig};
use crate::error::{Error, Result, TileLoadWarning};
use crate::grid::TileSet;
use crate::registration::{Registration, StepRegistration};
use crate::source::TileSource;

pub use resample::downscale;

/// Stitched image of one time step.
#[derive(Debug, Clone, PartialEq)]
pub struct Mosaic {
    pub step: u32,
    /// Full-resolution canvas. Pixels no tile covers are NaN.
    pub image: Buffer2<f32>,
    /// `(factor, image)` for every configured scale factor above 1.
    pub scaled: Vec<(u32, Buffer2<f32>)>,
    /// Tiles that failed to load and were left out.
    pub warnings: Vec<TileLoadWarning>,
}

/// Running per-pixel state for one overlap mode.
enum Accumulator {
    Overwrite(Buffer2<f32>),
    Average {
        sum: Buffer2<f64>,
        count: Buffer2<u32>,
    },
}

impl Accumulator {
    fn new(mode: OverlapMode, width: usize, height: usize) -> Self {
        match mode {
            OverlapMode::Overwrite => Self::Overwrite(Buffer2::new_filled(width, height, f32::NAN)),
            OverlapMode::Average => Self::Average {
                sum: Buffer2::new_filled(width, height, 0.0),
                count: Buffer2::new_filled(width, height, 0),
            },
        }
    }

    /// Paints `tile` with its top-left corner at `(x0, y0)`, clipped to the canvas.
    /// Unset tile pixels leave the canvas untouched.
    fn paint(&mut self, tile: &Buffer2<f32>, x0: usize, y0: usize) {
        let (canvas_w, canvas_h) = match self {
            Self::Overwrite(image) => image.size(),
            Self::Average { sum, .. } => sum.size(),
        };
        let w = tile.width().min(canvas_w.saturating_sub(x0));
        let h = tile.height().min(canvas_h.saturating_sub(y0));
        if w == 0 || h == 0 {
            return;
        }

        for ty in 0..h {
            let src = &tile.row(ty)[..w];
            match self {
                Self::Overwrite(image) => {
                    let dst = &mut image.row_mut(y0 + ty)[x0..x0 + w];
                    for (d, &s) in dst.iter_mut().zip(src) {
                        if !s.is_nan() {
                            *d = s;
                        }
                    }
                }
                Self::Average { sum, count } => {
                    let sum_row = &mut sum.row_mut(y0 + ty)[x0..x0 + w];
                    let count_row = &mut count.row_mut(y0 + ty)[x0..x0 + w];
                    for ((acc, n), &s) in sum_row.iter_mut().zip(count_row.iter_mut()).zip(src) {
                        if !s.is_nan() {
                            *acc += s as f64;
                            *n += 1;
                        }
                    }
                }
            }
        }
    }

    fn finish(self) -> Buffer2<f32> {
        match self {
            Self::Overwrite(image) => image,
            Self::Average { sum, count } => {
                let (width, height) = sum.size();
                let pixels = sum
                    .iter()
                    .zip(count.iter())
                    .map(|(&s, &n)| if n == 0 { f32::NAN } else { (s / n as f64) as f32 })
                    .collect();
                Buffer2::new(width, height, pixels)
            }
        }
    }
}

/// Composes the mosaic of one time step from its registration.
///
/// Tiles that fail to load are reported as warnings and leave their pixels unset.
pub fn compose_step(
    tiles: &TileSet,
    source: &dyn TileSource,
    registration: &StepRegistration,
    config: &StitchConfig,
) -> Result<Mosaic> {
    let step = registration.step;
    let step_idx = tiles
        .grid
        .step_position(step)
        .ok_or(Error::UnknownTimeStep(step))?;
    check_layout(tiles, registration)?;

    let canvas = registration.canvas;
    tracing::info!(
        step,
        width = canvas.width,
        height = canvas.height,
        overlap = ?config.overlap,
        "Composing mosaic"
    );

    let mut accumulator = Accumulator::new(config.overlap, canvas.width, canvas.height);
    let mut warnings = Vec::new();
    for row in (0..registration.rows).rev() {
        for col in (0..registration.cols).rev() {
            let image = match source.load_image(tiles.at(step_idx, row, col)) {
                Ok(image) => image,
                Err(error) => {
                    warnings.push(TileLoadWarning::report(
                        step,
                        tiles.grid.r[row],
                        tiles.grid.c[col],
                        error,
                    ));
                    continue;
                }
            };
            let anchor = registration.anchor(row, col);
            tracing::debug!(step, row, col, x = anchor.x, y = anchor.y, "Painting tile");
            accumulator.paint(&image, anchor.x as usize, anchor.y as usize);
        }
    }

    let image = accumulator.finish();
    let scaled = config
        .scale_factors
        .iter()
        .filter(|&&factor| factor > 1)
        .map(|&factor| (factor, downscale(&image, factor)))
        .collect();

    Ok(Mosaic {
        step,
        image,
        scaled,
        warnings,
    })
}

/// Composes every time step of `tiles`, at most `config.max_concurrent_steps` at once.
pub fn compose_all(
    tiles: &TileSet,
    source: &dyn TileSource,
    registration: &Registration,
    config: &StitchConfig,
) -> Result<Vec<Mosaic>> {
    config.validate()?;
    try_par_map_limited(&tiles.grid.e, config.max_concurrent_steps, |&step| {
        compose_step(tiles, source, registration.step(step)?, config)
    })
}

pub(crate) fn check_layout(tiles: &TileSet, registration: &StepRegistration) -> Result<()> {
    if registration.rows != tiles.grid.rows()
        || registration.cols != tiles.grid.cols()
        || registration.anchors.len() != registration.rows * registration.cols
    {
        return Err(Error::GridMismatch(format!(
            "step {} is registered as {}x{} with {} anchors, tiles are {}x{}",
            registration.step,
            registration.rows,
            registration.cols,
            registration.anchors.len(),
            tiles.grid.rows(),
            tiles.grid.cols()
        )));
    }
    Ok(())
}
