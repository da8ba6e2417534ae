use std::path::Path;

use crate::foundation::error::AnimResult;
use crate::ingest::parse::{Frame, Sample, read_frames};

/// Normalisation constant used when the run has no samples or only zero masses.
pub const DEFAULT_GLOBAL_MAX_MASS: f64 = 1.0;

/// Every parsed frame of one log plus the run-wide maximum mass.
///
/// Built once and only read afterwards; marker sizes of every frame are normalised against the
/// same constant.
#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    frames: Vec<Frame>,
    global_max_mass: f64,
}

impl Run {
    pub fn new(frames: Vec<Frame>) -> Self {
        let global_max_mass = global_max_mass(&frames);
        Self {
            frames,
            global_max_mass,
        }
    }

    pub fn from_path(path: &Path) -> AnimResult<Self> {
        Ok(Self::new(read_frames(path)?))
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn global_max_mass(&self) -> f64 {
        self.global_max_mass
    }

    pub fn sample_count(&self) -> usize {
        self.frames.iter().map(Frame::len).sum()
    }
}

/// Largest mass over every sample of every frame.
///
/// Falls back to [`DEFAULT_GLOBAL_MAX_MASS`] when there are no samples or the maximum is zero.
/// A negative maximum is returned as is. NaN masses never win the comparison.
pub fn global_max_mass(frames: &[Frame]) -> f64 {
    let max = frames
        .iter()
        .flat_map(Frame::samples)
        .map(|s: &Sample| s.mass)
        .filter(|m| !m.is_nan())
        .fold(None, |acc: Option<f64>, m| Some(acc.map_or(m, |a| a.max(m))));

    match max {
        Some(m) if m != 0.0 => m,
        _ => DEFAULT_GLOBAL_MAX_MASS,
    }
}
