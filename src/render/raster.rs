use std::{fmt::Write as _, sync::Arc};

use anyhow::Context as _;

use crate::{
    config::AnimConfig,
    foundation::{
        core::{Affine, Canvas, Point},
        error::{AnimError, AnimResult},
    },
    render::FrameRGBA,
    scene::params::{RenderParameters, ViewWindow},
};

/// Points per inch; the canvas is treated as a 10-inch square figure.
const POINTS_PER_FIGURE: f64 = 720.0;
const MARKER_EDGE_PT: f64 = 0.5;
const BOX_STROKE_PT: f64 = 2.0;
/// Dash pattern of the bounding box, in multiples of its stroke width.
const BOX_DASH: (f64, f64) = (3.7, 1.6);
const LABEL_SIZE_PT: f64 = 12.0;
/// Label anchor as a fraction of the canvas, measured from the top-left.
const LABEL_ANCHOR: (f64, f64) = (0.05, 0.05);

/// Map data space to pixels so the view window fills the canvas, y pointing up, equal aspect.
pub fn data_to_pixel(view: &ViewWindow, canvas: Canvas) -> AnimResult<Affine> {
    let w = view.x_max - view.x_min;
    let h = view.y_max - view.y_min;
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(AnimError::render(format!(
            "view window must have positive finite extent, got {w}x{h}"
        )));
    }

    let cw = f64::from(canvas.width);
    let ch = f64::from(canvas.height);
    let s = (cw / w).min(ch / h);
    let cx = 0.5 * (view.x_min + view.x_max);
    let cy = 0.5 * (view.y_min + view.y_max);

    Ok(Affine::new([
        s,
        0.0,
        0.0,
        -s,
        0.5 * cw - s * cx,
        0.5 * ch + s * cy,
    ]))
}

fn px_per_pt(canvas: Canvas) -> f64 {
    f64::from(canvas.width.min(canvas.height)) / POINTS_PER_FIGURE
}

/// Radius in pixels of a marker whose area is `size` points².
pub fn marker_radius_px(size: f64, canvas: Canvas) -> f64 {
    0.5 * size.max(0.0).sqrt() * px_per_pt(canvas)
}

/// Build the SVG document for one frame: background, dashed box, markers, then the label.
pub fn scene_svg(params: &RenderParameters, cfg: &AnimConfig) -> AnimResult<String> {
    let canvas = cfg.canvas;
    let xf = data_to_pixel(&params.view_window, canvas)?;
    let pt = px_per_pt(canvas);

    let mut svg = String::with_capacity(256 + params.marker_positions.len() * 128);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = canvas.width,
        h = canvas.height,
    );
    let _ = write!(
        svg,
        r#"<rect x="0" y="0" width="{}" height="{}" fill="{}"/>"#,
        canvas.width,
        canvas.height,
        cfg.background.to_hex(),
    );

    let bbox = xf.transform_rect_bbox(params.bbox.to_rect());
    let stroke = BOX_STROKE_PT * pt;
    let _ = write!(
        svg,
        r#"<rect x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}" fill="none" stroke="{}" stroke-width="{:.3}" stroke-dasharray="{:.3} {:.3}"/>"#,
        bbox.x0,
        bbox.y0,
        bbox.width(),
        bbox.height(),
        cfg.box_stroke.to_hex(),
        stroke,
        BOX_DASH.0 * stroke,
        BOX_DASH.1 * stroke,
    );

    for (pos, size) in params.marker_positions.iter().zip(&params.marker_sizes) {
        let c: Point = xf * *pos;
        let _ = write!(
            svg,
            r#"<circle cx="{:.3}" cy="{:.3}" r="{:.3}" fill="{}" fill-opacity="{:.3}" stroke="{}" stroke-width="{:.3}"/>"#,
            c.x,
            c.y,
            marker_radius_px(*size, canvas),
            cfg.marker_fill.to_hex(),
            cfg.alpha * cfg.marker_fill.opacity(),
            cfg.marker_edge.to_hex(),
            MARKER_EDGE_PT * pt,
        );
    }

    let _ = write!(
        svg,
        r#"<text x="{:.3}" y="{:.3}" font-family="sans-serif" font-size="{:.3}" fill="{}">{}</text>"#,
        LABEL_ANCHOR.0 * f64::from(canvas.width),
        LABEL_ANCHOR.1 * f64::from(canvas.height),
        LABEL_SIZE_PT * pt,
        cfg.label_fill.to_hex(),
        escape_xml(&params.label),
    );
    svg.push_str("</svg>");
    Ok(svg)
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// CPU rasteriser turning [`RenderParameters`] into pixels through `usvg`/`resvg`.
///
/// The font database is loaded once and shared by every frame.
pub struct Rasterizer {
    cfg: AnimConfig,
    opts: usvg::Options<'static>,
}

impl Rasterizer {
    pub fn new(cfg: AnimConfig) -> AnimResult<Self> {
        cfg.validate()?;
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded label fonts");

        let opts = usvg::Options {
            fontdb: Arc::new(db),
            ..Default::default()
        };
        Ok(Self { cfg, opts })
    }

    pub fn config(&self) -> &AnimConfig {
        &self.cfg
    }

    pub fn render(&self, params: &RenderParameters) -> AnimResult<FrameRGBA> {
        let svg = scene_svg(params, &self.cfg)?;
        let tree = usvg::Tree::from_str(&svg, &self.opts)
            .with_context(|| format!("build scene for frame {}", params.frame))?;

        let Canvas { width, height } = self.cfg.canvas;
        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| AnimError::render("failed to allocate frame pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );

        Ok(FrameRGBA {
            width,
            height,
            data: pixmap.take(),
            premultiplied: true,
        })
    }
}
