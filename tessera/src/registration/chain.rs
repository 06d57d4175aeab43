use glam::{IVec2, UVec2};

use common::Buffer2;

use crate::error::Result;
use crate::registration::pairwise::register_pair;

/// Cumulative tile positions along one row or one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    /// Per-tile `(x, y)` position; the minimum of each axis is zero.
    pub offsets: Vec<IVec2>,
    /// `(width, height)` of the last tile.
    pub extent: UVec2,
}

/// Walks `images` in order, accumulating pairwise offsets.
///
/// # Panics
///
/// Panics if `images` is empty.
pub fn accumulate_chain(images: &[&Buffer2<f32>], template_size: usize) -> Result<Chain> {
    assert!(!images.is_empty(), "a chain needs at least one tile");

    let mut offsets = Vec::with_capacity(images.len());
    offsets.push(IVec2::ZERO);
    for pair in images.windows(2) {
        let step = register_pair(pair[0], pair[1], template_size)?;
        let previous = offsets[offsets.len() - 1];
        offsets.push(previous + step.offset);
    }

    let min = offsets.iter().fold(IVec2::MAX, |acc, o| acc.min(*o));
    for offset in &mut offsets {
        *offset -= min;
    }

    let last = images[images.len() - 1];
    Ok(Chain {
        offsets,
        extent: UVec2::new(last.width() as u32, last.height() as u32),
    })
}
