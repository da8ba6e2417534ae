use crate::foundation::error::{AnimError, AnimResult};

pub use kurbo::{Affine, Point, Rect};

/// 0-based index of a frame within a run.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> AnimResult<Self> {
        if den == 0 {
            return Err(AnimError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(AnimError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Whole-number rate, the common case for animation output.
    pub fn integer(num: u32) -> AnimResult<Self> {
        Self::new(num, 1)
    }

    /// Duration of one frame in milliseconds as `(numer, denom)`.
    pub fn frame_duration_ms(self) -> (u32, u32) {
        (self.den.saturating_mul(1000), self.num)
    }

    /// `Some(n)` when the rate is a whole number of frames per second.
    pub fn as_integer(self) -> Option<u32> {
        self.num.is_multiple_of(self.den).then(|| self.num / self.den)
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// Straight-alpha RGBA8 colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// `#rrggbb` form used in SVG paint attributes.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Alpha as a `0.0..=1.0` opacity.
    pub fn opacity(self) -> f64 {
        f64::from(self.a) / 255.0
    }
}
