use std::{
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use image::codecs::gif::{GifEncoder, Repeat};

use crate::{
    encode::{
        check_overwrite, ensure_parent_dir, flatten_to_opaque_rgba8, partial_path, publish,
        sink::{FrameSink, SinkConfig, check_frame},
    },
    foundation::{
        core::FrameIndex,
        error::{AnimError, AnimResult},
    },
    render::FrameRGBA,
};

/// Quantiser speed handed to the GIF encoder (1 = best, 30 = fastest).
const GIF_SPEED: i32 = 10;

/// Byte buffer the encoder writes into while the sink keeps a handle to read it back.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn take(&self) -> AnimResult<Vec<u8>> {
        let mut bytes = self
            .0
            .lock()
            .map_err(|_| AnimError::encode("gif buffer lock poisoned"))?;
        Ok(std::mem::take(&mut *bytes))
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("gif buffer lock poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct GifState {
    cfg: SinkConfig,
    encoder: GifEncoder<SharedBuffer>,
    bytes: SharedBuffer,
    delay: image::Delay,
    next: FrameIndex,
}

/// Looping animated GIF written through `image`.
///
/// The encoded stream is held in memory. `end` writes it to `<out>.partial` and renames that
/// into place, so nothing exists on disk until the whole animation has been encoded.
pub struct GifSink {
    out_path: PathBuf,
    partial: PathBuf,
    overwrite: bool,
    state: Option<GifState>,
}

impl GifSink {
    pub fn new(out_path: impl Into<PathBuf>, overwrite: bool) -> Self {
        let out_path = out_path.into();
        Self {
            partial: partial_path(&out_path),
            out_path,
            overwrite,
            state: None,
        }
    }
}

impl FrameSink for GifSink {
    fn begin(&mut self, cfg: SinkConfig) -> AnimResult<()> {
        cfg.validate()?;
        if cfg.width > u32::from(u16::MAX) || cfg.height > u32::from(u16::MAX) {
            return Err(AnimError::validation("gif width/height must fit in u16"));
        }
        check_overwrite(&self.out_path, self.overwrite)?;
        ensure_parent_dir(&self.out_path)?;

        let bytes = SharedBuffer::default();
        let mut encoder = GifEncoder::new_with_speed(bytes.clone(), GIF_SPEED);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| AnimError::encode(format!("gif header: {e}")))?;

        let (numer, denom) = cfg.fps.frame_duration_ms();
        self.state = Some(GifState {
            cfg,
            encoder,
            bytes,
            delay: image::Delay::from_numer_denom_ms(numer, denom),
            next: FrameIndex(0),
        });
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> AnimResult<()> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| AnimError::encode("gif sink is not open"))?;
        check_frame(&state.cfg, state.next, idx, frame)?;

        let mut opaque = vec![0u8; frame.data.len()];
        flatten_to_opaque_rgba8(
            &mut opaque,
            &frame.data,
            frame.premultiplied,
            state.cfg.bg_rgba,
        )?;
        let buffer = image::RgbaImage::from_raw(frame.width, frame.height, opaque)
            .ok_or_else(|| AnimError::encode("frame buffer does not match its dimensions"))?;

        state
            .encoder
            .encode_frame(image::Frame::from_parts(buffer, 0, 0, state.delay))
            .map_err(|e| AnimError::encode(format!("gif frame {idx}: {e}")))?;
        state.next = FrameIndex(state.next.0 + 1);
        Ok(())
    }

    fn end(&mut self) -> AnimResult<()> {
        let state = self
            .state
            .take()
            .ok_or_else(|| AnimError::encode("gif sink is not open"))?;
        // Dropping the encoder appends the trailer to the in-memory stream.
        drop(state.encoder);
        let bytes = state.bytes.take()?;

        if let Err(e) = std::fs::write(&self.partial, &bytes) {
            let _ = std::fs::remove_file(&self.partial);
            return Err(AnimError::encode(format!(
                "write '{}': {e}",
                self.partial.display()
            )));
        }
        if let Err(e) = publish(&self.partial, &self.out_path) {
            let _ = std::fs::remove_file(&self.partial);
            return Err(e);
        }
        tracing::info!(
            path = %self.out_path.display(),
            frames = state.next.0,
            "wrote gif"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Fps;

    fn cfg() -> SinkConfig {
        SinkConfig {
            width: 4,
            height: 4,
            fps: Fps { num: 10, den: 1 },
            bg_rgba: [0, 0, 0, 255],
        }
    }

    fn solid(rgba: [u8; 4]) -> FrameRGBA {
        FrameRGBA {
            width: 4,
            height: 4,
            data: rgba.repeat(16),
            premultiplied: true,
        }
    }

    #[test]
    fn unfinished_sink_leaves_nothing_behind() {
        let dir = PathBuf::from("target").join("gif_sink_unit");
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("dropped.gif");
        let _ = std::fs::remove_file(&out);

        let mut sink = GifSink::new(&out, true);
        sink.begin(cfg()).unwrap();
        sink.push_frame(FrameIndex(0), &solid([255, 0, 0, 255])).unwrap();
        let partial = partial_path(&out);
        assert!(!partial.exists());
        drop(sink);

        assert!(!partial.exists());
        assert!(!out.exists());
    }

    #[test]
    fn failed_write_publishes_nothing() {
        let dir = PathBuf::from("target").join("gif_sink_unit");
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("blocked.gif");
        let _ = std::fs::remove_file(&out);
        // A directory in the way of the temporary file makes the final write fail.
        let partial = partial_path(&out);
        std::fs::create_dir_all(&partial).unwrap();

        let mut sink = GifSink::new(&out, true);
        sink.begin(cfg()).unwrap();
        sink.push_frame(FrameIndex(0), &solid([255, 0, 0, 255])).unwrap();
        assert!(matches!(sink.end(), Err(AnimError::Encode(_))));
        assert!(!out.exists());

        std::fs::remove_dir(&partial).unwrap();
    }

    #[test]
    fn finished_sink_writes_a_complete_gif() {
        let dir = PathBuf::from("target").join("gif_sink_unit");
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("complete.gif");
        let _ = std::fs::remove_file(&out);

        let mut sink = GifSink::new(&out, true);
        sink.begin(cfg()).unwrap();
        sink.push_frame(FrameIndex(0), &solid([255, 0, 0, 255])).unwrap();
        sink.push_frame(FrameIndex(1), &solid([0, 0, 255, 255])).unwrap();
        sink.end().unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"GIF89a"));
        assert_eq!(bytes.last(), Some(&0x3b));
        assert!(!partial_path(&out).exists());
    }

    #[test]
    fn refuses_to_overwrite_when_asked() {
        let dir = PathBuf::from("target").join("gif_sink_unit");
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("existing.gif");
        std::fs::write(&out, b"keep").unwrap();

        let mut sink = GifSink::new(&out, false);
        assert!(sink.begin(cfg()).is_err());
        assert_eq!(std::fs::read(&out).unwrap(), b"keep");
    }

    #[test]
    fn push_without_begin_fails() {
        let mut sink = GifSink::new("target/gif_sink_unit/never.gif", true);
        assert!(sink.push_frame(FrameIndex(0), &solid([0, 0, 0, 255])).is_err());
    }
}
