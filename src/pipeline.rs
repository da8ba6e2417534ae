use std::path::Path;

use crate::{
    config::AnimConfig,
    encode::{FrameSink, SinkConfig, create_sink},
    foundation::{
        core::FrameIndex,
        error::{AnimError, AnimResult},
    },
    ingest::run::Run,
    render::{FrameRGBA, Rasterizer},
    scene::params::{FrameRenderer, RenderParameters},
};

/// Result of [`animate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnimateOutcome {
    /// An artefact was written with one visual frame per parsed frame.
    Rendered { frames: u64, global_max_mass: f64 },
    /// The log held no frames; nothing was written.
    NoData,
}

/// Per-frame parameters for the whole run, in presentation order.
pub fn frame_parameters(run: &Run, cfg: &AnimConfig) -> Vec<RenderParameters> {
    let mut renderer = FrameRenderer::new(run, cfg);
    (0..run.len() as u64)
        .map(|i| renderer.update(FrameIndex(i)).clone())
        .collect()
}

/// Render a single frame of the run.
pub fn render_frame(run: &Run, idx: FrameIndex, rasterizer: &Rasterizer) -> AnimResult<FrameRGBA> {
    if idx.0 >= run.len() as u64 {
        return Err(AnimError::validation(format!(
            "frame {idx} is out of range (run has {} frames)",
            run.len()
        )));
    }
    let mut renderer = FrameRenderer::new(run, rasterizer.config());
    rasterizer.render(renderer.update(idx))
}

/// Present every frame of `run`, in order, to `sink` and finish the artefact.
///
/// Returns the number of frames pushed. An empty run is rejected before the sink is opened.
pub fn render_run(
    run: &Run,
    rasterizer: &Rasterizer,
    sink: &mut dyn FrameSink,
) -> AnimResult<u64> {
    if run.is_empty() {
        return Err(AnimError::validation("cannot render a run without frames"));
    }

    let cfg = rasterizer.config();
    sink.begin(SinkConfig {
        width: cfg.canvas.width,
        height: cfg.canvas.height,
        fps: cfg.fps,
        bg_rgba: cfg.background.to_array(),
    })?;

    let mut renderer = FrameRenderer::new(run, cfg);
    let total = run.len() as u64;
    for i in 0..total {
        let idx = FrameIndex(i);
        let frame = rasterizer.render(renderer.update(idx))?;
        sink.push_frame(idx, &frame)?;
        tracing::debug!(frame = i, total, "frame rendered");
    }

    sink.end()?;
    Ok(total)
}

/// Read `input`, render every frame and write the animation to `output`.
///
/// The output format follows `output`'s extension (`.gif` or `.mp4`).
#[tracing::instrument(skip(cfg))]
pub fn animate(
    input: &Path,
    output: &Path,
    cfg: &AnimConfig,
    overwrite: bool,
) -> AnimResult<AnimateOutcome> {
    let run = Run::from_path(input)?;
    if run.is_empty() {
        tracing::info!("no frames in input");
        return Ok(AnimateOutcome::NoData);
    }
    tracing::info!(
        frames = run.len(),
        samples = run.sample_count(),
        global_max_mass = run.global_max_mass(),
        "loaded run"
    );

    let rasterizer = Rasterizer::new(cfg.clone())?;
    let mut sink = create_sink(output, overwrite)?;
    let frames = render_run(&run, &rasterizer, sink.as_mut())?;

    Ok(AnimateOutcome::Rendered {
        frames,
        global_max_mass: run.global_max_mass(),
    })
}
