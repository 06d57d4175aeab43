//! End-to-end drivers: registration (stored or fresh), then compositing or
//! merging of every time step, then output.

use crate::config::StitchConfig;
use crate::error::{Error, Result, TileLoadWarning};
use crate::grid::TileSet;
use crate::merge::merge_all;
use crate::mosaic::compose_all;
use crate::registration::Registration;
use crate::sink::{deformed_field_name, scaled_image_name, OutputSink, CONFIDENCE_BEST, IMAGE};
use crate::source::TileSource;
use crate::store::{load_or_register, RegistrationStore};

/// What a stitching run produced besides the arrays it wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchReport {
    pub registration: Registration,
    /// Time steps written to the sink, in order.
    pub steps: Vec<u32>,
    /// Tiles skipped across all steps.
    pub warnings: Vec<TileLoadWarning>,
}

/// Stitches the raw images of every time step.
///
/// Writes `image` and `image_x{factor}` per step.
pub fn stitch_images(
    tiles: &TileSet,
    source: &dyn TileSource,
    store: &mut dyn RegistrationStore,
    grid_id: &str,
    sink: &mut dyn OutputSink,
    config: &StitchConfig,
) -> Result<StitchReport> {
    config.validate()?;
    let registration = load_or_register(store, grid_id, tiles, source, config)?;
    let mosaics = compose_all(tiles, source, &registration, config)?;

    let mut steps = Vec::with_capacity(mosaics.len());
    let mut warnings = Vec::new();
    for mosaic in mosaics {
        sink.write(mosaic.step, IMAGE, &mosaic.image)?;
        for (factor, image) in &mosaic.scaled {
            sink.write(mosaic.step, &scaled_image_name(*factor), image)?;
        }
        steps.push(mosaic.step);
        warnings.extend(mosaic.warnings);
    }

    tracing::info!(grid_id, steps = steps.len(), skipped = warnings.len(), "Images stitched");
    Ok(StitchReport {
        registration,
        steps,
        warnings,
    })
}

/// Merges the field tiles of every deformed time step.
///
/// Writes one array per tracked field, `confidence_best`, and with deformed
/// output enabled `<field>_deformed` per step. Registration needs the raw
/// images, so `source` must serve both images and fields unless `store`
/// already holds a matching registration.
pub fn stitch_fields(
    tiles: &TileSet,
    source: &dyn TileSource,
    store: &mut dyn RegistrationStore,
    grid_id: &str,
    sink: &mut dyn OutputSink,
    config: &StitchConfig,
) -> Result<StitchReport> {
    config.validate()?;
    if tiles.grid.steps() < 2 {
        return Err(Error::InvalidConfig(
            "field merging needs a reference and at least one deformed time step".to_string(),
        ));
    }
    let registration = load_or_register(store, grid_id, tiles, source, config)?;
    let merged = merge_all(tiles, source, &registration, config)?;

    let mut steps = Vec::with_capacity(merged.len());
    let mut warnings = Vec::new();
    for step in merged {
        for (kind, field) in &step.fields {
            sink.write(step.step, &kind.to_string(), field)?;
        }
        sink.write(step.step, CONFIDENCE_BEST, &step.confidence)?;
        for (kind, field) in step.deformed.iter().flatten() {
            sink.write(step.step, &deformed_field_name(*kind), field)?;
        }
        steps.push(step.step);
        warnings.extend(step.warnings);
    }

    tracing::info!(grid_id, steps = steps.len(), skipped = warnings.len(), "Fields stitched");
    Ok(StitchReport {
        registration,
        steps,
        warnings,
    })
}
