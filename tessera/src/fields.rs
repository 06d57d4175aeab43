//! Full-field measurement tiles produced by per-tile correlation.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use common::Buffer2;

use crate::error::TileLoadError;

/// Named arrays carried by a field tile.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum FieldKind {
    #[strum(serialize = "u")]
    #[serde(rename = "u")]
    DisplacementX,
    #[strum(serialize = "v")]
    #[serde(rename = "v")]
    DisplacementY,
    #[strum(serialize = "exx")]
    #[serde(rename = "exx")]
    StrainXX,
    #[strum(serialize = "eyy")]
    #[serde(rename = "eyy")]
    StrainYY,
    #[strum(serialize = "exy")]
    #[serde(rename = "exy")]
    StrainXY,
    /// Correlation quality. Lower is better.
    #[strum(serialize = "sigma")]
    #[serde(rename = "sigma")]
    Confidence,
}

/// One tile's field record. Every array shares the shape of `x`.
///
/// `x` and `y` hold the tile-local pixel coordinates of each sample; they form a
/// regular grid (x constant down a column, y constant along a row).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBundle {
    pub x: Buffer2<f32>,
    pub y: Buffer2<f32>,
    pub u: Buffer2<f32>,
    pub v: Buffer2<f32>,
    pub exx: Buffer2<f32>,
    pub eyy: Buffer2<f32>,
    pub exy: Buffer2<f32>,
    pub sigma: Buffer2<f32>,
}

impl FieldBundle {
    pub fn field(&self, kind: FieldKind) -> &Buffer2<f32> {
        match kind {
            FieldKind::DisplacementX => &self.u,
            FieldKind::DisplacementY => &self.v,
            FieldKind::StrainXX => &self.exx,
            FieldKind::StrainYY => &self.eyy,
            FieldKind::StrainXY => &self.exy,
            FieldKind::Confidence => &self.sigma,
        }
    }

    pub fn field_mut(&mut self, kind: FieldKind) -> &mut Buffer2<f32> {
        match kind {
            FieldKind::DisplacementX => &mut self.u,
            FieldKind::DisplacementY => &mut self.v,
            FieldKind::StrainXX => &mut self.exx,
            FieldKind::StrainYY => &mut self.eyy,
            FieldKind::StrainXY => &mut self.exy,
            FieldKind::Confidence => &mut self.sigma,
        }
    }

    /// Number of samples per axis as `(width, height)`.
    pub fn size(&self) -> (usize, usize) {
        self.x.size()
    }

    /// Checks that every array has the coordinate grid's shape, that the grid is
    /// non-empty and that samples are spaced apart.
    pub fn validate(&self, address: &str) -> Result<(), TileLoadError> {
        let corrupt = |reason: String| TileLoadError::Corrupt {
            address: address.to_string(),
            reason,
        };
        if self.x.is_empty() {
            return Err(corrupt("empty coordinate grid".to_string()));
        }
        let arrays = [
            ("y", &self.y),
            ("u", &self.u),
            ("v", &self.v),
            ("exx", &self.exx),
            ("eyy", &self.eyy),
            ("exy", &self.exy),
            ("sigma", &self.sigma),
        ];
        for (name, array) in arrays {
            if !array.same_size(&self.x) {
                return Err(corrupt(format!(
                    "array '{}' is {}x{}, coordinates are {}x{}",
                    name,
                    array.width(),
                    array.height(),
                    self.x.width(),
                    self.x.height()
                )));
            }
        }
        let spacing = self.spacing();
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(corrupt(format!("sample spacing {} is not positive", spacing)));
        }
        Ok(())
    }

    /// Sample spacing in pixels, taken from the first coordinate step.
    ///
    /// Falls back to the y step for single-column tiles and to 1 for single samples.
    pub fn spacing(&self) -> f32 {
        if self.x.width() > 1 {
            (self.x[(1, 0)] - self.x[(0, 0)]).abs()
        } else if self.y.height() > 1 {
            (self.y[(0, 1)] - self.y[(0, 0)]).abs()
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    fn bundle(width: usize, height: usize, spacing: f32) -> FieldBundle {
        let zeros = Buffer2::new_filled(width, height, 0.0f32);
        FieldBundle {
            x: Buffer2::from_fn(width, height, |x, _| 5.0 + x as f32 * spacing),
            y: Buffer2::from_fn(width, height, |_, y| 5.0 + y as f32 * spacing),
            u: Buffer2::new_filled(width, height, 1.0),
            v: Buffer2::new_filled(width, height, 2.0),
            exx: zeros.clone(),
            eyy: zeros.clone(),
            exy: zeros.clone(),
            sigma: zeros,
        }
    }

    #[test]
    fn test_field_names_parse_back() {
        for kind in FieldKind::iter() {
            assert_eq!(FieldKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert_eq!(FieldKind::Confidence.to_string(), "sigma");
    }

    #[test]
    fn test_field_accessors_match_members() {
        let mut b = bundle(3, 2, 1.0);
        assert_eq!(b.field(FieldKind::DisplacementY)[(0, 0)], 2.0);
        b.field_mut(FieldKind::StrainXY)[(2, 1)] = 0.5;
        assert_eq!(b.exy[(2, 1)], 0.5);
    }

    #[test]
    fn test_validate_rejects_shape_mismatch() {
        let mut b = bundle(3, 2, 1.0);
        assert!(b.validate("t").is_ok());
        b.eyy = Buffer2::new_filled(2, 2, 0.0);
        let err = b.validate("t").unwrap_err();
        assert!(matches!(err, TileLoadError::Corrupt { ref reason, .. } if reason.contains("eyy")));
    }

    #[test]
    fn test_validate_rejects_collapsed_coordinates() {
        let mut b = bundle(3, 2, 1.0);
        b.x = Buffer2::new_filled(3, 2, 4.0);
        assert!(b.validate("t").is_err());
    }

    #[test]
    fn test_spacing_from_coordinates() {
        assert_eq!(bundle(4, 4, 5.0).spacing(), 5.0);
        assert_eq!(bundle(1, 4, 2.0).spacing(), 2.0);
        assert_eq!(bundle(1, 1, 3.0).spacing(), 1.0);
    }
}
