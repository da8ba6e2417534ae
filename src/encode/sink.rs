use crate::{
    foundation::{
        core::{Fps, FrameIndex},
        error::{AnimError, AnimResult},
    },
    render::FrameRGBA,
};

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Presentation rate.
    pub fps: Fps,
    /// Background colour (straight RGBA8) to flatten translucent pixels over.
    pub bg_rgba: [u8; 4],
}

impl SinkConfig {
    pub fn validate(&self) -> AnimResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(AnimError::validation("sink width/height must be non-zero"));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        Ok(())
    }

    pub fn frame_bytes(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// Consumer of rendered frames, typically an encoder writing one artefact.
///
/// Ordering contract: `push_frame` is called with strictly increasing, gap-free frame indices
/// starting at 0. Nothing may be visible at the output path until `end` succeeds.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> AnimResult<()>;
    /// Push one frame in presentation order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> AnimResult<()>;
    /// Called once after the last frame is pushed; publishes the artefact.
    fn end(&mut self) -> AnimResult<()>;
}

/// Check a frame against the sink configuration and the expected next index.
pub(crate) fn check_frame(
    cfg: &SinkConfig,
    expected: FrameIndex,
    idx: FrameIndex,
    frame: &FrameRGBA,
) -> AnimResult<()> {
    if idx != expected {
        return Err(AnimError::encode(format!(
            "frames out of order: got {idx}, expected {expected}"
        )));
    }
    if frame.width != cfg.width || frame.height != cfg.height {
        return Err(AnimError::validation(format!(
            "frame size mismatch: got {}x{}, expected {}x{}",
            frame.width, frame.height, cfg.width, cfg.height
        )));
    }
    if frame.data.len() != cfg.frame_bytes() {
        return Err(AnimError::validation(
            "frame.data size mismatch with width*height*4",
        ));
    }
    Ok(())
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    finished: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Frames in presentation order.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> AnimResult<()> {
        cfg.validate()?;
        self.cfg = Some(cfg);
        self.frames.clear();
        self.finished = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> AnimResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| AnimError::encode("push_frame called before begin"))?;
        check_frame(&cfg, FrameIndex(self.frames.len() as u64), idx, frame)?;
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> AnimResult<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SinkConfig {
        SinkConfig {
            width: 2,
            height: 2,
            fps: Fps { num: 30, den: 1 },
            bg_rgba: [0, 0, 0, 255],
        }
    }

    fn frame() -> FrameRGBA {
        FrameRGBA {
            width: 2,
            height: 2,
            data: vec![0; 16],
            premultiplied: true,
        }
    }

    #[test]
    fn in_memory_sink_keeps_order() {
        let mut sink = InMemorySink::new();
        sink.begin(cfg()).unwrap();
        sink.push_frame(FrameIndex(0), &frame()).unwrap();
        sink.push_frame(FrameIndex(1), &frame()).unwrap();
        sink.end().unwrap();
        assert!(sink.is_finished());
        let idx: Vec<_> = sink.frames().iter().map(|(i, _)| i.0).collect();
        assert_eq!(idx, vec![0, 1]);
    }

    #[test]
    fn skipped_or_reordered_frames_are_rejected() {
        let mut sink = InMemorySink::new();
        sink.begin(cfg()).unwrap();
        assert!(sink.push_frame(FrameIndex(1), &frame()).is_err());
        sink.push_frame(FrameIndex(0), &frame()).unwrap();
        assert!(sink.push_frame(FrameIndex(0), &frame()).is_err());
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mut sink = InMemorySink::new();
        sink.begin(cfg()).unwrap();
        let mut f = frame();
        f.width = 4;
        assert!(sink.push_frame(FrameIndex(0), &f).is_err());
    }

    #[test]
    fn push_before_begin_fails() {
        let mut sink = InMemorySink::new();
        assert!(sink.push_frame(FrameIndex(0), &frame()).is_err());
    }
}
