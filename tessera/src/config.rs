//! Stitching configuration.
//!
//! One struct carries every knob of the registration, compositing and merge
//! passes. It round-trips through any [`SerdeFormat`] so a run can be reproduced
//! from a config file.

use serde::{Deserialize, Serialize};

use common::SerdeFormat;

use crate::error::{Error, Result};
use crate::fields::FieldKind;

/// How the mosaic compositor resolves overlapping raw-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMode {
    /// Later tiles in reverse row-major order overwrite earlier ones.
    #[default]
    Overwrite,
    /// Running sum / count per pixel.
    Average,
}

/// Post-merge Gaussian smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Gaussian standard deviation in samples.
    pub sigma: f32,
    /// Kernel half-width in samples.
    pub radius: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            radius: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Side of the square template cropped from the next tile's top-left corner.
    /// Must not exceed the overlap between neighbouring tiles.
    pub template_size: usize,
    /// Undeformed baseline step. `None` uses the first time step of the grid.
    pub reference_step: Option<u32>,
    /// Field whose values drive overlap resolution.
    pub confidence_field: FieldKind,
    /// Confidence value marking failed or missing samples.
    pub failed_confidence: f32,
    /// Displacement components to merge and shift by the rigid tile drift.
    pub displacement_fields: Vec<FieldKind>,
    /// Strain components to merge.
    pub strain_fields: Vec<FieldKind>,
    /// Merged fields that get smoothed after all tiles are painted.
    pub smoothing_fields: Vec<FieldKind>,
    pub smoothing: SmoothingConfig,
    /// Lower confidence wins overlaps instead of plain reverse-order overwrite.
    pub confidence_filtering: bool,
    pub overlap: OverlapMode,
    /// Also warp every merged field onto the deformed configuration.
    pub deformed_output: bool,
    /// Mosaic downscale factors. `1` is the full-resolution output.
    pub scale_factors: Vec<u32>,
    /// Maximum number of time steps processed at once.
    pub max_concurrent_steps: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            template_size: 32,
            reference_step: None,
            confidence_field: FieldKind::Confidence,
            failed_confidence: -1.0,
            displacement_fields: vec![FieldKind::DisplacementX, FieldKind::DisplacementY],
            strain_fields: vec![FieldKind::StrainXX, FieldKind::StrainYY, FieldKind::StrainXY],
            smoothing_fields: vec![
                FieldKind::DisplacementX,
                FieldKind::DisplacementY,
                FieldKind::StrainYY,
            ],
            smoothing: SmoothingConfig::default(),
            confidence_filtering: true,
            overlap: OverlapMode::default(),
            deformed_output: false,
            scale_factors: vec![1],
            max_concurrent_steps: 4,
        }
    }
}

impl StitchConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.template_size == 0 {
            return invalid("template_size must be positive".to_string());
        }
        if self.failed_confidence.is_nan() {
            return invalid("failed_confidence must not be NaN".to_string());
        }
        if self.displacement_fields.iter().any(|k| {
            !matches!(k, FieldKind::DisplacementX | FieldKind::DisplacementY)
        }) {
            return invalid(format!(
                "displacement_fields may only name u and v, got {:?}",
                self.displacement_fields
            ));
        }
        if self.smoothing.sigma.is_nan() || self.smoothing.sigma <= 0.0 {
            return invalid(format!(
                "smoothing sigma must be positive, got {}",
                self.smoothing.sigma
            ));
        }
        if self.scale_factors.is_empty() {
            return invalid("scale_factors must not be empty".to_string());
        }
        for (i, &factor) in self.scale_factors.iter().enumerate() {
            if factor == 0 {
                return invalid("scale factors must be at least 1".to_string());
            }
            if self.scale_factors[..i].contains(&factor) {
                return invalid(format!("duplicate scale factor {}", factor));
            }
        }
        if self.max_concurrent_steps == 0 {
            return invalid("max_concurrent_steps must be positive".to_string());
        }
        if self.deformed_output
            && !(self.displacement_fields.contains(&FieldKind::DisplacementX)
                && self.displacement_fields.contains(&FieldKind::DisplacementY))
        {
            return invalid("deformed_output needs both u and v in displacement_fields".to_string());
        }
        Ok(())
    }

    /// Fields written by the merge engine, in merge order and without duplicates.
    pub fn tracked_fields(&self) -> Vec<FieldKind> {
        let mut fields = Vec::new();
        let all = self
            .displacement_fields
            .iter()
            .chain(&self.strain_fields)
            .chain(std::iter::once(&self.confidence_field));
        for &kind in all {
            if !fields.contains(&kind) {
                fields.push(kind);
            }
        }
        fields
    }

    pub fn from_bytes(bytes: &[u8], format: SerdeFormat) -> Result<Self> {
        let config: Self = common::serde::deserialize(bytes, format).map_err(|e| {
            Error::InvalidConfig(format!("cannot parse {:?} config: {}", format, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_bytes(&self, format: SerdeFormat) -> Result<Vec<u8>> {
        common::serde::serialize(self, format)
            .map_err(|e| Error::InvalidConfig(format!("cannot encode config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        StitchConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            StitchConfig {
                template_size: 0,
                ..Default::default()
            },
            StitchConfig {
                failed_confidence: f32::NAN,
                ..Default::default()
            },
            StitchConfig {
                scale_factors: vec![1, 2, 2],
                ..Default::default()
            },
            StitchConfig {
                scale_factors: vec![0],
                ..Default::default()
            },
            StitchConfig {
                smoothing: SmoothingConfig {
                    sigma: 0.0,
                    radius: 2,
                },
                ..Default::default()
            },
            StitchConfig {
                max_concurrent_steps: 0,
                ..Default::default()
            },
            StitchConfig {
                displacement_fields: vec![FieldKind::StrainXX],
                ..Default::default()
            },
            StitchConfig {
                deformed_output: true,
                displacement_fields: vec![FieldKind::DisplacementX],
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(Error::InvalidConfig(_))),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn test_tracked_fields_dedup_and_include_confidence() {
        let config = StitchConfig {
            displacement_fields: vec![FieldKind::DisplacementX],
            strain_fields: vec![FieldKind::StrainYY, FieldKind::DisplacementX],
            ..Default::default()
        };
        assert_eq!(
            config.tracked_fields(),
            vec![
                FieldKind::DisplacementX,
                FieldKind::StrainYY,
                FieldKind::Confidence
            ]
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "template_size: 12\n\
                    confidence_filtering: false\n\
                    overlap: average\n\
                    smoothing_fields: [u, eyy]\n";
        let config = StitchConfig::from_bytes(yaml.as_bytes(), SerdeFormat::Yaml).unwrap();
        assert_eq!(config.template_size, 12);
        assert!(!config.confidence_filtering);
        assert_eq!(config.overlap, OverlapMode::Average);
        assert_eq!(
            config.smoothing_fields,
            vec![FieldKind::DisplacementX, FieldKind::StrainYY]
        );
        assert_eq!(config.failed_confidence, -1.0);
    }

    #[test]
    fn test_from_bytes_validates() {
        let json = br#"{ "template_size": 0 }"#;
        assert!(matches!(
            StitchConfig::from_bytes(json, SerdeFormat::Json),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = StitchConfig {
            reference_step: Some(3),
            scale_factors: vec![1, 4],
            deformed_output: true,
            ..Default::default()
        };
        let bytes = config.to_bytes(SerdeFormat::Json).unwrap();
        assert_eq!(StitchConfig::from_bytes(&bytes, SerdeFormat::Json).unwrap(), config);
    }
}
