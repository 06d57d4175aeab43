//! Field merge engine.
//!
//! Paints per-tile displacement, strain and confidence samples into one global
//! sampling grid per deformed time step. Tiles are reduced in reverse row-major
//! order into a single owned set of canvas buffers:
//!
//! 1. displacement is corrected by the tile's rigid drift, the difference
//!    between its deformed and reference anchors,
//! 2. local sample coordinates are moved to the global grid with the
//!    reference anchor,
//! 3. a sample is written when its confidence is not the failure sentinel and,
//!    with confidence filtering, when it improves on (is strictly lower than)
//!    what the canvas already holds.
//!
//! Smoothing and the optional deformed-configuration warp run after all tiles
//! are painted and never feed back into overlap resolution.


mod deform;
mod smoothing;

use std::collections::BTreeMap;

use glam::{IVec2, Vec2};
use rayon::prelude::*;

use common::parallel::try_par_map_limited;
use common::Buffer2;

use crate::config::StitchConfig;
use crate::error::{Error, Result, TileLoadError, TileLoadWarning};
use crate::fields::{FieldBundle, FieldKind};
use crate::grid::TileSet;
use crate::mosaic::check_layout;
use crate::registration::{CanvasSize, Registration};
use crate::source::TileSource;

pub use deform::{fill_linear, warp_nearest};
pub use smoothing::{gaussian_kernel_1d, smooth};

/// Relative tolerance when comparing a tile's sample spacing to the canvas spacing.
const SPACING_TOLERANCE: f32 = 1e-3;

/// Merged fields of one deformed time step on the reference sampling grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedStep {
    pub step: u32,
    /// Pixels between neighbouring samples.
    pub spacing: f32,
    /// One array per tracked field. Samples no tile provided are NaN.
    pub fields: BTreeMap<FieldKind, Buffer2<f32>>,
    /// Confidence of the sample that won each position; the failure sentinel where none did.
    pub confidence: Buffer2<f32>,
    /// Every tracked field resampled onto the deformed configuration.
    pub deformed: Option<BTreeMap<FieldKind, Buffer2<f32>>>,
    pub warnings: Vec<TileLoadWarning>,
}

/// Number of samples along a canvas axis of `pixels` at `spacing`.
fn samples_along(pixels: usize, spacing: f32) -> usize {
    (pixels.saturating_sub(1) as f32 / spacing).floor() as usize + 1
}

/// Global sampling grid and the buffers being reduced into.
struct FieldCanvas {
    spacing: f32,
    sentinel: f32,
    filtering: bool,
    fields: BTreeMap<FieldKind, Buffer2<f32>>,
    confidence: Buffer2<f32>,
}

impl FieldCanvas {
    fn new(
        canvas: CanvasSize,
        spacing: f32,
        tracked: &[FieldKind],
        sentinel: f32,
        filtering: bool,
    ) -> Self {
        let width = samples_along(canvas.width, spacing);
        let height = samples_along(canvas.height, spacing);
        Self {
            spacing,
            sentinel,
            filtering,
            fields: tracked
                .iter()
                .map(|&kind| (kind, Buffer2::new_filled(width, height, f32::NAN)))
                .collect(),
            confidence: Buffer2::new_filled(width, height, sentinel),
        }
    }

    /// Canvas index of a global pixel coordinate.
    #[inline]
    fn index(&self, global: f32, len: usize) -> Option<usize> {
        let i = (global / self.spacing).round();
        (i >= 0.0 && (i as usize) < len).then_some(i as usize)
    }

    /// Writes every accepted sample of `bundle`, whose local coordinates are
    /// shifted by `origin`. Returns the number of samples written.
    fn paint(&mut self, bundle: &FieldBundle, origin: Vec2, confidence_field: FieldKind) -> usize {
        let (width, height) = self.confidence.size();
        let scores = bundle.field(confidence_field);
        let mut written = 0;

        for ty in 0..bundle.y.height() {
            for tx in 0..bundle.x.width() {
                let score = scores[(tx, ty)];
                if score.is_nan() || score == self.sentinel {
                    continue;
                }
                let (Some(cx), Some(cy)) = (
                    self.index(bundle.x[(tx, ty)] + origin.x, width),
                    self.index(bundle.y[(tx, ty)] + origin.y, height),
                ) else {
                    continue;
                };

                let existing = self.confidence[(cx, cy)];
                if self.filtering && existing != self.sentinel && existing <= score {
                    continue;
                }

                for (&kind, merged) in self.fields.iter_mut() {
                    merged[(cx, cy)] = bundle.field(kind)[(tx, ty)];
                }
                self.confidence[(cx, cy)] = score;
                written += 1;
            }
        }
        written
    }
}

fn corrected(
    mut bundle: FieldBundle,
    drift: IVec2,
    displacement_fields: &[FieldKind],
) -> FieldBundle {
    for &kind in displacement_fields {
        let shift = match kind {
            FieldKind::DisplacementX => drift.x as f32,
            FieldKind::DisplacementY => drift.y as f32,
            _ => continue,
        };
        for value in bundle.field_mut(kind).iter_mut() {
            *value += shift;
        }
    }
    bundle
}

/// Merges the field tiles of deformed time step `step`.
///
/// Tiles that fail to load, or whose sample spacing differs from the canvas
/// spacing, are reported as warnings and contribute nothing.
pub fn merge_step(
    tiles: &TileSet,
    source: &dyn TileSource,
    registration: &Registration,
    step: u32,
    config: &StitchConfig,
) -> Result<MergedStep> {
    let reference = registration.step(registration.reference_step(config)?)?;
    let deformed = registration.step(step)?;
    let step_idx = tiles
        .grid
        .step_position(step)
        .ok_or(Error::UnknownTimeStep(step))?;
    check_layout(tiles, reference)?;
    check_layout(tiles, deformed)?;

    let (rows, cols) = (deformed.rows, deformed.cols);
    tracing::info!(step, reference = reference.step, rows, cols, "Merging field tiles");

    let loaded: Vec<std::result::Result<FieldBundle, TileLoadError>> = (0..rows * cols)
        .into_par_iter()
        .map(|i| -> std::result::Result<FieldBundle, TileLoadError> {
            let address = tiles.at(step_idx, i / cols, i % cols);
            let bundle = source.load_fields(address)?;
            bundle.validate(address)?;
            Ok(bundle)
        })
        .collect();

    // Reverse row-major; the first tile that loads fixes the sampling grid.
    let order: Vec<usize> = (0..rows * cols).rev().collect();
    let spacing = order
        .iter()
        .find_map(|&i| loaded[i].as_ref().ok().map(FieldBundle::spacing))
        .unwrap_or(1.0);

    let tracked = config.tracked_fields();
    let mut canvas = FieldCanvas::new(
        reference.canvas,
        spacing,
        &tracked,
        config.failed_confidence,
        config.confidence_filtering,
    );
    let mut warnings = Vec::new();

    for (i, result) in order.into_iter().zip(loaded.into_iter().rev()) {
        let (row, col) = (i / cols, i % cols);
        let mut warn = |error| {
            warnings.push(TileLoadWarning::report(
                step,
                tiles.grid.r[row],
                tiles.grid.c[col],
                error,
            ));
        };

        let bundle = match result {
            Ok(bundle) => bundle,
            Err(error) => {
                warn(error);
                continue;
            }
        };
        let tile_spacing = bundle.spacing();
        if (tile_spacing - spacing).abs() > SPACING_TOLERANCE * spacing {
            warn(TileLoadError::Corrupt {
                address: tiles.at(step_idx, row, col).to_string(),
                reason: format!(
                    "sample spacing {} differs from canvas spacing {}",
                    tile_spacing, spacing
                ),
            });
            continue;
        }

        let reference_anchor = reference.anchor(row, col);
        let drift = deformed.anchor(row, col).as_ivec2() - reference_anchor.as_ivec2();
        let bundle = corrected(bundle, drift, &config.displacement_fields);
        let written = canvas.paint(&bundle, reference_anchor.as_vec2(), config.confidence_field);
        tracing::debug!(
            step,
            row,
            col,
            drift_x = drift.x,
            drift_y = drift.y,
            written,
            "Merged tile"
        );
    }

    let FieldCanvas {
        mut fields,
        confidence,
        ..
    } = canvas;

    for kind in &config.smoothing_fields {
        if let Some(field) = fields.get_mut(kind) {
            *field = smooth(field, &config.smoothing);
        }
    }

    let deformed_fields = config.deformed_output.then(|| deform_fields(&fields, spacing));

    tracing::info!(
        step,
        width = confidence.width(),
        height = confidence.height(),
        skipped = warnings.len(),
        "Time step merged"
    );

    Ok(MergedStep {
        step,
        spacing,
        fields,
        confidence,
        deformed: deformed_fields,
        warnings,
    })
}

/// Warps every merged field with the gap-filled displacement.
fn deform_fields(
    fields: &BTreeMap<FieldKind, Buffer2<f32>>,
    spacing: f32,
) -> BTreeMap<FieldKind, Buffer2<f32>> {
    let (Some(u), Some(v)) = (
        fields.get(&FieldKind::DisplacementX),
        fields.get(&FieldKind::DisplacementY),
    ) else {
        return BTreeMap::new();
    };
    let u = fill_linear(u);
    let v = fill_linear(v);
    fields
        .iter()
        .map(|(&kind, field)| (kind, warp_nearest(field, &u, &v, spacing)))
        .collect()
}

/// Merges every time step except the reference, at most
/// `config.max_concurrent_steps` at once.
pub fn merge_all(
    tiles: &TileSet,
    source: &dyn TileSource,
    registration: &Registration,
    config: &StitchConfig,
) -> Result<Vec<MergedStep>> {
    config.validate()?;
    let reference = registration.reference_step(config)?;
    let steps: Vec<u32> = tiles.grid.e.iter().copied().filter(|&e| e != reference).collect();
    try_par_map_limited(&steps, config.max_concurrent_steps, |&step| {
        merge_step(tiles, source, registration, step, config)
    })
}
