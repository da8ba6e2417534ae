use crate::{
    config::AnimConfig,
    foundation::core::{FrameIndex, Point, Rect},
    ingest::{
        parse::{Frame, Sample},
        run::Run,
    },
};

/// Square bounding box centred on the origin, stored as origin + extent.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub origin: Point,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn centred(half_dim: f64) -> Self {
        Self {
            origin: Point::new(-half_dim, -half_dim),
            width: 2.0 * half_dim,
            height: 2.0 * half_dim,
        }
    }

    pub fn to_rect(self) -> Rect {
        Rect::from_origin_size(self.origin, (self.width, self.height))
    }
}

/// Visible data-space extents.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ViewWindow {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl ViewWindow {
    pub fn symmetric(limit: f64) -> Self {
        Self {
            x_min: -limit,
            x_max: limit,
            y_min: -limit,
            y_max: limit,
        }
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(self.x_min, self.y_min, self.x_max, self.y_max)
    }
}

/// Everything the rasteriser needs to draw one frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderParameters {
    pub frame: FrameIndex,
    pub label: String,
    pub marker_positions: Vec<Point>,
    /// Marker areas in points², parallel to `marker_positions`.
    pub marker_sizes: Vec<f64>,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub view_window: ViewWindow,
}

impl RenderParameters {
    /// State before any frame was presented: no markers, unit box, unit view.
    pub fn initial() -> Self {
        Self {
            frame: FrameIndex(0),
            label: String::new(),
            marker_positions: Vec::new(),
            marker_sizes: Vec::new(),
            bbox: BoundingBox {
                origin: Point::ORIGIN,
                width: 1.0,
                height: 1.0,
            },
            view_window: ViewWindow {
                x_min: 0.0,
                x_max: 1.0,
                y_min: 0.0,
                y_max: 1.0,
            },
        }
    }
}

/// Marker area before clamping: mass as a fraction of the run maximum, scaled to `max_size`.
pub fn raw_marker_size(mass: f64, global_max_mass: f64, max_size: f64) -> f64 {
    if global_max_mass > 0.0 {
        (mass / global_max_mass) * max_size
    } else {
        0.0
    }
}

/// Clamped marker area, always within `[min_size, max_size]`.
pub fn marker_size(mass: f64, global_max_mass: f64, cfg: &AnimConfig) -> f64 {
    let raw = raw_marker_size(mass, global_max_mass, cfg.max_size);
    if raw.is_nan() {
        // Non-finite masses are not rejected at parse time and can produce NaN here.
        return cfg.min_size;
    }
    raw.clamp(cfg.min_size, cfg.max_size)
}

/// Half side length of the frame's bounding box, `None` for a frame without samples.
///
/// Saturates so the padded view window is still finite for coordinates near `f64::MAX`.
pub fn box_half_dim(samples: &[Sample], cfg: &AnimConfig) -> Option<f64> {
    let max_coord = samples
        .iter()
        .map(|s| s.x.abs().max(s.y.abs()))
        .reduce(f64::max)?;
    let limit = f64::MAX / (4.0 * cfg.padding);
    Some((max_coord * cfg.box_scale + cfg.box_margin).min(limit))
}

pub fn frame_label(idx: FrameIndex) -> String {
    format!("Step: {idx}")
}

/// Derive the parameters for frame `idx` from the previous ones.
///
/// Out-of-range indices leave `prev` untouched; a frame without samples only updates the label.
pub fn render_params(
    idx: FrameIndex,
    frames: &[Frame],
    global_max_mass: f64,
    cfg: &AnimConfig,
    prev: &RenderParameters,
) -> RenderParameters {
    let Some(frame) = usize::try_from(idx.0).ok().and_then(|i| frames.get(i)) else {
        return prev.clone();
    };

    let label = frame_label(idx);
    let Some(half_dim) = box_half_dim(frame.samples(), cfg) else {
        return RenderParameters {
            frame: idx,
            label,
            ..prev.clone()
        };
    };

    let samples = frame.samples();
    RenderParameters {
        frame: idx,
        label,
        marker_positions: samples.iter().map(|s| Point::new(s.x, s.y)).collect(),
        marker_sizes: samples
            .iter()
            .map(|s| marker_size(s.mass, global_max_mass, cfg))
            .collect(),
        bbox: BoundingBox::centred(half_dim),
        view_window: ViewWindow::symmetric(half_dim * cfg.padding),
    }
}

/// Walks a [`Run`] frame by frame, carrying the last presented parameters forward.
pub struct FrameRenderer<'a> {
    run: &'a Run,
    cfg: &'a AnimConfig,
    current: RenderParameters,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(run: &'a Run, cfg: &'a AnimConfig) -> Self {
        Self {
            run,
            cfg,
            current: RenderParameters::initial(),
        }
    }

    pub fn update(&mut self, idx: FrameIndex) -> &RenderParameters {
        self.current = render_params(
            idx,
            self.run.frames(),
            self.run.global_max_mass(),
            self.cfg,
            &self.current,
        );
        &self.current
    }

    pub fn current(&self) -> &RenderParameters {
        &self.current
    }
}
