//! Turn an N-body simulation snapshot log into an animation.
//!
//! The log is a sequence of `x,y,mass` lines; blank lines separate simulation steps. Each step
//! becomes one frame: markers sized by mass relative to the heaviest particle of the whole run,
//! a dashed box tracking the system's extent, and a step label.
//!
//! Pipeline:
//! 1. [`parse_frames`] / [`Run::from_path`]: segment the log into [`Frame`]s.
//! 2. [`Run::global_max_mass`]: one normalisation constant for the run.
//! 3. [`render_params`] / [`FrameRenderer`]: per-frame [`RenderParameters`].
//! 4. [`Rasterizer`] + [`FrameSink`]: pixels, then a GIF or MP4 via [`render_run`] / [`animate`].
#![forbid(unsafe_code)]

pub mod config;
pub mod encode;
pub mod foundation;
pub mod ingest;
pub mod pipeline;
pub mod render;
pub mod scene;

pub use config::{AnimConfig, DEFAULT_INPUT, DEFAULT_OUTPUT};
pub use encode::{
    FfmpegSink, FrameSink, GifSink, InMemorySink, OutputFormat, SinkConfig, create_sink,
    is_ffmpeg_on_path,
};
pub use foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
pub use foundation::error::{AnimError, AnimResult};
pub use ingest::parse::{
    Frame, Sample, SampleError, parse_frames, parse_sample, parse_str, read_frames,
};
pub use ingest::run::{DEFAULT_GLOBAL_MAX_MASS, Run, global_max_mass};
pub use pipeline::{AnimateOutcome, animate, frame_parameters, render_frame, render_run};
pub use render::{FrameRGBA, Rasterizer};
pub use scene::params::{
    BoundingBox, FrameRenderer, RenderParameters, ViewWindow, box_half_dim, frame_label,
    marker_size, raw_marker_size, render_params,
};
