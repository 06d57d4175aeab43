use glam::IVec2;

use common::Buffer2;

use crate::error::{Error, Result};
use crate::registration::ncc::{find_peak, match_template};

/// Peak scores below this are logged as unreliable.
const WEAK_CORRELATION: f32 = 0.5;

/// Offset of one tile relative to its predecessor in a chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairOffset {
    /// `(dx, dy)` placing the next tile's origin relative to the current one.
    pub offset: IVec2,
    /// Correlation score at the peak.
    pub score: f32,
}

/// Locates `next` relative to `current`.
///
/// A `template_size` square is cropped from the top-left corner of `next` and
/// matched against `current`; the peak position is the displacement of the
/// next tile's origin. Fails with [`Error::InvalidCrop`] if the template does
/// not fit in either image.
pub fn register_pair(
    current: &Buffer2<f32>,
    next: &Buffer2<f32>,
    template_size: usize,
) -> Result<PairOffset> {
    for image in [current, next] {
        if template_size == 0 || template_size > image.width() || template_size > image.height() {
            return Err(Error::InvalidCrop {
                template_size,
                width: image.width(),
                height: image.height(),
            });
        }
    }

    let template = next.crop(0, 0, template_size, template_size);
    let peak = find_peak(&match_template(current, &template));
    let offset = IVec2::new(peak.x as i32, peak.y as i32);

    if peak.score < WEAK_CORRELATION {
        tracing::warn!(
            dx = offset.x,
            dy = offset.y,
            score = peak.score,
            "Weak correlation peak between neighbouring tiles"
        );
    } else {
        tracing::debug!(dx = offset.x, dy = offset.y, score = peak.score, "Registered tile pair");
    }

    Ok(PairOffset {
        offset,
        score: peak.score,
    })
}
