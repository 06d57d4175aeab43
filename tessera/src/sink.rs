//! Output sinks for stitched arrays.

use std::collections::BTreeMap;

use common::Buffer2;

use crate::error::Result;
use crate::fields::FieldKind;

/// Name of the full-resolution mosaic.
pub const IMAGE: &str = "image";
/// Name of the per-sample winning confidence array.
pub const CONFIDENCE_BEST: &str = "confidence_best";

/// Name of the mosaic downscaled by `factor`.
pub fn scaled_image_name(factor: u32) -> String {
    format!("{}_x{}", IMAGE, factor)
}

/// Name of a merged field warped onto the deformed configuration.
pub fn deformed_field_name(kind: FieldKind) -> String {
    format!("{}_deformed", kind)
}

/// Receives named 2-D arrays per time step. Container format is the sink's business.
pub trait OutputSink {
    fn write(&mut self, step: u32, name: &str, data: &Buffer2<f32>) -> Result<()>;
}

/// Keeps every array in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    outputs: BTreeMap<(u32, String), Buffer2<f32>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, step: u32, name: &str) -> Option<&Buffer2<f32>> {
        self.outputs.get(&(step, name.to_string()))
    }

    /// Names written for `step`, sorted.
    pub fn names(&self, step: u32) -> Vec<&str> {
        self.outputs
            .keys()
            .filter(|(s, _)| *s == step)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, step: u32, name: &str, data: &Buffer2<f32>) -> Result<()> {
        self.outputs.insert((step, name.to_string()), data.clone());
        Ok(())
    }
}
