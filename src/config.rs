use std::path::Path;

use anyhow::Context as _;

use crate::foundation::{
    core::{Canvas, Fps, Rgba8},
    error::{AnimError, AnimResult},
};

pub const DEFAULT_INPUT: &str = "simulation_output.txt";
pub const DEFAULT_OUTPUT: &str = "simulation.gif";

/// Tunables for parameter derivation, rasterisation and encoding.
///
/// Every field has a default, so a JSON config only needs to name the values it overrides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimConfig {
    /// Smallest marker area (points²). Every marker is at least this large.
    pub min_size: f64,
    /// Largest marker area (points²), given to the heaviest particle of the run.
    pub max_size: f64,
    /// View window extent as a multiple of the bounding box half-size.
    pub padding: f64,
    /// Bounding box half-size as a multiple of the frame's largest coordinate.
    pub box_scale: f64,
    /// Absolute margin added to the bounding box half-size.
    pub box_margin: f64,
    pub fps: Fps,
    pub canvas: Canvas,
    pub background: Rgba8,
    pub marker_fill: Rgba8,
    pub marker_edge: Rgba8,
    pub box_stroke: Rgba8,
    pub label_fill: Rgba8,
    /// Marker opacity in `0.0..=1.0`.
    pub alpha: f64,
}

impl Default for AnimConfig {
    fn default() -> Self {
        Self {
            min_size: 10.0,
            max_size: 300.0,
            padding: 1.2,
            box_scale: 1.5,
            box_margin: 10.0,
            fps: Fps { num: 30, den: 1 },
            canvas: Canvas {
                width: 1000,
                height: 1000,
            },
            background: Rgba8::rgb(0, 0, 0),
            marker_fill: Rgba8::rgb(0, 255, 255),
            marker_edge: Rgba8::rgb(255, 255, 255),
            box_stroke: Rgba8::rgb(255, 0, 0),
            label_fill: Rgba8::rgb(255, 255, 255),
            alpha: 1.0,
        }
    }
}

impl AnimConfig {
    pub fn validate(&self) -> AnimResult<()> {
        if !(self.min_size.is_finite() && self.max_size.is_finite()) {
            return Err(AnimError::validation("marker sizes must be finite"));
        }
        if self.min_size <= 0.0 {
            return Err(AnimError::validation("min_size must be > 0"));
        }
        if self.min_size > self.max_size {
            return Err(AnimError::validation("min_size must be <= max_size"));
        }
        if !self.padding.is_finite() || self.padding < 1.0 {
            return Err(AnimError::validation("padding must be >= 1.0"));
        }
        if !self.box_scale.is_finite() || self.box_scale < 1.0 {
            return Err(AnimError::validation("box_scale must be >= 1.0"));
        }
        if !self.box_margin.is_finite() || self.box_margin <= 0.0 {
            return Err(AnimError::validation("box_margin must be > 0"));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(AnimError::validation("canvas width/height must be non-zero"));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            // yuv420p mp4 output needs even dimensions; keep gif output consistent with it.
            return Err(AnimError::validation("canvas width/height must be even"));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(AnimError::validation("alpha must be within 0.0..=1.0"));
        }
        Ok(())
    }

    /// Load a JSON config; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> AnimResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| AnimError::serde(format!("config '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AnimConfig::default().validate().unwrap();
    }

    #[test]
    fn validation_catches_bad_values() {
        let bad = [
            AnimConfig {
                min_size: 400.0,
                ..AnimConfig::default()
            },
            AnimConfig {
                min_size: 0.0,
                ..AnimConfig::default()
            },
            AnimConfig {
                padding: 0.5,
                ..AnimConfig::default()
            },
            AnimConfig {
                fps: Fps { num: 0, den: 1 },
                ..AnimConfig::default()
            },
            AnimConfig {
                canvas: Canvas {
                    width: 11,
                    height: 10,
                },
                ..AnimConfig::default()
            },
            AnimConfig {
                alpha: 1.5,
                ..AnimConfig::default()
            },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: AnimConfig = serde_json::from_str(r#"{ "max_size": 500.0 }"#).unwrap();
        assert_eq!(cfg.max_size, 500.0);
        assert_eq!(cfg.min_size, 10.0);
        assert_eq!(cfg.fps, Fps { num: 30, den: 1 });
    }

    #[test]
    fn unknown_json_fields_are_rejected() {
        assert!(serde_json::from_str::<AnimConfig>(r#"{ "max_blob": 1 }"#).is_err());
    }
}
