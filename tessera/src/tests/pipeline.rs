use common::Buffer2;

use crate::config::StitchConfig;
use crate::error::{Error, Result};
use crate::grid::index_grid;
use crate::pipeline::{stitch_fields, stitch_images};
use crate::sink::{MemorySink, OutputSink};
use crate::store::MemoryStore;
use crate::testing::{image_grid, regular_origins, scheme, slice_tiles, textured_image};

/// Rejects every array with a given name.
struct RejectingSink {
    name: &'static str,
    inner: MemorySink,
}

impl OutputSink for RejectingSink {
    fn write(&mut self, step: u32, name: &str, data: &Buffer2<f32>) -> Result<()> {
        if name == self.name {
            return Err(Error::Sink {
                step,
                name: name.to_string(),
                reason: "disk full".to_string(),
            });
        }
        self.inner.write(step, name, data)
    }
}

fn grid(steps: usize) -> (crate::grid::TileSet, crate::source::MemorySource) {
    let scene = textured_image(200, 200, 31);
    let tiles = slice_tiles(&scene, &regular_origins(2, 2, 100, 10), 100, 100);
    image_grid(vec![tiles; steps], 2, 2)
}

fn config() -> StitchConfig {
    StitchConfig {
        template_size: 10,
        ..Default::default()
    }
}

#[test]
fn test_sink_failure_aborts_run() {
    let (tiles, source) = grid(1);
    let mut store = MemoryStore::new();
    let mut sink = RejectingSink {
        name: "image_x2",
        inner: MemorySink::new(),
    };
    let cfg = StitchConfig {
        scale_factors: vec![1, 2],
        ..config()
    };

    let err = stitch_images(&tiles, &source, &mut store, "grid", &mut sink, &cfg).unwrap_err();
    assert!(matches!(err, Error::Sink { step: 0, ref name, .. } if name == "image_x2"));
    assert!(sink.inner.get(0, "image").is_some());
}

#[test]
fn test_invalid_config_fails_before_registration() {
    let (tiles, source) = grid(1);
    let mut store = MemoryStore::new();
    let mut sink = MemorySink::new();
    let cfg = StitchConfig {
        scale_factors: vec![],
        ..config()
    };

    assert!(matches!(
        stitch_images(&tiles, &source, &mut store, "grid", &mut sink, &cfg),
        Err(Error::InvalidConfig(_))
    ));
    assert!(store.is_empty());
    assert!(sink.is_empty());
}

#[test]
fn test_field_stitching_needs_two_steps() {
    let (tiles, source) = grid(1);
    let mut store = MemoryStore::new();
    let mut sink = MemorySink::new();
    assert!(matches!(
        stitch_fields(&tiles, &source, &mut store, "grid", &mut sink, &config()),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_indexed_addresses_drive_stitching() {
    let (expected, source) = grid(2);
    // Shuffled, with files the scheme does not describe.
    let mut addresses: Vec<String> = expected.addresses.cells().iter().rev().cloned().collect();
    addresses.push("notes.txt".to_string());
    addresses.push("tile_e0_r0_cX".to_string());

    let tiles = index_grid(addresses, &scheme()).unwrap();
    assert_eq!(tiles, expected);

    let mut store = MemoryStore::new();
    let mut sink = MemorySink::new();
    let report = stitch_images(&tiles, &source, &mut store, "grid", &mut sink, &config()).unwrap();
    assert_eq!(report.steps, vec![0, 1]);
    assert_eq!(sink.get(0, "image"), sink.get(1, "image"));
}

#[test]
fn test_warnings_are_collected_across_steps() {
    let (tiles, mut source) = grid(3);
    let mut store = MemoryStore::new();
    let mut sink = MemorySink::new();
    // Register first so the missing tiles only affect compositing.
    stitch_images(&tiles, &source, &mut store, "grid", &mut sink, &config()).unwrap();
    source.remove(tiles.at(1, 0, 1));
    source.mark_corrupt(tiles.at(2, 1, 1));

    let report = stitch_images(&tiles, &source, &mut store, "grid", &mut sink, &config()).unwrap();
    let skipped: Vec<(u32, u32, u32)> = report
        .warnings
        .iter()
        .map(|w| (w.step, w.row, w.col))
        .collect();
    assert_eq!(skipped, vec![(1, 0, 1), (2, 1, 1)]);
}
