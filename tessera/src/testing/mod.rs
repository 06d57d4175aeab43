//! Synthetic tiles for tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use glam::UVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::Buffer2;

use crate::fields::{FieldBundle, FieldKind};
use crate::grid::{GridIndex, NamingScheme, TileKey, TileSet};
use crate::registration::{CanvasSize, Registration, StepRegistration};
use crate::source::MemorySource;

pub const SCHEME: &str = "tile_e{e}_r{r}_c{c}";

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub fn scheme() -> NamingScheme {
    NamingScheme::new(SCHEME).unwrap()
}

/// Uniform noise in [0, 1). Every patch of a few pixels is unique, which keeps
/// correlation peaks sharp.
pub fn textured_image(width: usize, height: usize, seed: u64) -> Buffer2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let pixels = (0..width * height).map(|_| rng.random::<f32>()).collect();
    Buffer2::new(width, height, pixels)
}

/// Row-major tile origins of a `rows x cols` grid of square tiles with uniform overlap.
pub fn regular_origins(rows: usize, cols: usize, tile: usize, overlap: usize) -> Vec<UVec2> {
    let step = (tile - overlap) as u32;
    (0..rows * cols)
        .map(|i| UVec2::new((i % cols) as u32 * step, (i / cols) as u32 * step))
        .collect()
}

/// Crops a `width x height` tile out of `scene` at every origin.
pub fn slice_tiles(
    scene: &Buffer2<f32>,
    origins: &[UVec2],
    width: usize,
    height: usize,
) -> Vec<Buffer2<f32>> {
    origins
        .iter()
        .map(|o| scene.crop(o.x as usize, o.y as usize, width, height))
        .collect()
}

/// `rows x cols` grid over time steps `0..steps`.
pub fn tile_set(steps: usize, rows: usize, cols: usize) -> TileSet {
    let e: Vec<u32> = (0..steps as u32).collect();
    let r: Vec<u32> = (0..rows as u32).collect();
    let c: Vec<u32> = (0..cols as u32).collect();
    TileSet::from_scheme(GridIndex::new(&e, &r, &c), &scheme())
}

/// Image tiles where `steps[e]` holds the row-major tiles of time step `e`.
pub fn image_grid(
    steps: Vec<Vec<Buffer2<f32>>>,
    rows: usize,
    cols: usize,
) -> (TileSet, MemorySource) {
    let tiles = tile_set(steps.len(), rows, cols);
    let mut source = MemorySource::new();
    for (e, images) in steps.into_iter().enumerate() {
        assert_eq!(images.len(), rows * cols);
        for (i, image) in images.into_iter().enumerate() {
            source.insert_image(tiles.at(e, i / cols, i % cols), image);
        }
    }
    (tiles, source)
}

/// Field tiles where `steps[e]` holds the row-major tiles of time step `e`.
pub fn field_grid(
    steps: Vec<Vec<FieldBundle>>,
    rows: usize,
    cols: usize,
) -> (TileSet, MemorySource) {
    let tiles = tile_set(steps.len(), rows, cols);
    let mut source = MemorySource::new();
    for (e, bundles) in steps.into_iter().enumerate() {
        assert_eq!(bundles.len(), rows * cols);
        for (i, bundle) in bundles.into_iter().enumerate() {
            source.insert_fields(tiles.at(e, i / cols, i % cols), bundle);
        }
    }
    (tiles, source)
}

/// Field tile of `width x height` samples with local coordinates `index * spacing`.
///
/// `value(kind, x, y)` supplies every measured field at sample `(x, y)`.
pub fn field_tile(
    width: usize,
    height: usize,
    spacing: f32,
    value: impl Fn(FieldKind, usize, usize) -> f32,
) -> FieldBundle {
    let field = |kind| Buffer2::from_fn(width, height, |x, y| value(kind, x, y));
    FieldBundle {
        x: Buffer2::from_fn(width, height, |x, _| x as f32 * spacing),
        y: Buffer2::from_fn(width, height, |_, y| y as f32 * spacing),
        u: field(FieldKind::DisplacementX),
        v: field(FieldKind::DisplacementY),
        exx: field(FieldKind::StrainXX),
        eyy: field(FieldKind::StrainYY),
        exy: field(FieldKind::StrainXY),
        sigma: field(FieldKind::Confidence),
    }
}

/// Field tile with the same constant value in every field except confidence.
pub fn constant_tile(
    width: usize,
    height: usize,
    spacing: f32,
    value: f32,
    confidence: f32,
) -> FieldBundle {
    field_tile(width, height, spacing, |kind, _, _| match kind {
        FieldKind::Confidence => confidence,
        _ => value,
    })
}

/// Registration with the given row-major anchors for each step `0..anchors.len()`.
pub fn registration(
    rows: usize,
    cols: usize,
    anchors: Vec<Vec<UVec2>>,
    canvas: CanvasSize,
) -> Registration {
    let tiles = tile_set(anchors.len(), rows, cols);
    let steps: BTreeMap<u32, StepRegistration> = anchors
        .into_iter()
        .enumerate()
        .map(|(e, anchors)| {
            let step = e as u32;
            (
                step,
                StepRegistration {
                    step,
                    rows,
                    cols,
                    anchors,
                    canvas,
                },
            )
        })
        .collect();
    Registration {
        grid: tiles.grid,
        steps,
    }
}

pub fn key(e: u32, r: u32, c: u32) -> TileKey {
    TileKey::new(e, r, c)
}
