use std::{
    io::Write as _,
    path::PathBuf,
    process::{Child, ChildStdin, Command, Stdio},
};

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

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

struct FfmpegProcess {
    cfg: SinkConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
    next: FrameIndex,
}

/// H.264 MP4 encoded by piping raw RGBA frames into the system `ffmpeg` binary.
pub struct FfmpegSink {
    out_path: PathBuf,
    partial: PathBuf,
    overwrite: bool,
    process: Option<FfmpegProcess>,
}

impl FfmpegSink {
    pub fn new(out_path: impl Into<PathBuf>, overwrite: bool) -> Self {
        let out_path = out_path.into();
        Self {
            partial: partial_path(&out_path),
            out_path,
            overwrite,
            process: None,
        }
    }
}

fn validate_for_mp4(cfg: &SinkConfig) -> AnimResult<u32> {
    cfg.validate()?;
    if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
        // yuv420p output needs even dimensions.
        return Err(AnimError::validation(
            "encode width/height must be even (required for yuv420p mp4 output)",
        ));
    }
    cfg.fps
        .as_integer()
        .ok_or_else(|| AnimError::validation("mp4 output requires an integer fps"))
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> AnimResult<()> {
        let fps = validate_for_mp4(&cfg)?;
        check_overwrite(&self.out_path, self.overwrite)?;
        ensure_parent_dir(&self.out_path)?;

        if !is_ffmpeg_on_path() {
            return Err(AnimError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .arg("-y")
            .args([
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", cfg.width, cfg.height),
                "-r",
                &fps.to_string(),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
                "-f",
                "mp4",
            ])
            .arg(&self.partial);

        let mut child = cmd.spawn().map_err(|e| {
            AnimError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AnimError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        self.process = Some(FfmpegProcess {
            scratch: vec![0u8; cfg.frame_bytes()],
            cfg,
            child,
            stdin: Some(stdin),
            next: FrameIndex(0),
        });
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> AnimResult<()> {
        let p = self
            .process
            .as_mut()
            .ok_or_else(|| AnimError::encode("ffmpeg sink is not open"))?;
        check_frame(&p.cfg, p.next, idx, frame)?;

        flatten_to_opaque_rgba8(
            &mut p.scratch,
            &frame.data,
            frame.premultiplied,
            p.cfg.bg_rgba,
        )?;

        let Some(stdin) = p.stdin.as_mut() else {
            return Err(AnimError::encode("ffmpeg encoder is already finalized"));
        };
        stdin.write_all(&p.scratch).map_err(|e| {
            AnimError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        p.next = FrameIndex(p.next.0 + 1);
        Ok(())
    }

    fn end(&mut self) -> AnimResult<()> {
        let mut p = self
            .process
            .take()
            .ok_or_else(|| AnimError::encode("ffmpeg sink is not open"))?;
        drop(p.stdin.take());

        let output = p.child.wait_with_output().map_err(|e| {
            AnimError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let _ = std::fs::remove_file(&self.partial);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnimError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        publish(&self.partial, &self.out_path)?;
        tracing::info!(
            path = %self.out_path.display(),
            frames = p.next.0,
            "wrote mp4"
        );
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Some(mut p) = self.process.take() {
            drop(p.stdin.take());
            let _ = p.child.kill();
            let _ = p.child.wait();
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Fps;

    fn cfg(width: u32, fps: Fps) -> SinkConfig {
        SinkConfig {
            width,
            height: 10,
            fps,
            bg_rgba: [0, 0, 0, 255],
        }
    }

    #[test]
    fn mp4_config_validation_catches_bad_values() {
        let thirty = Fps { num: 30, den: 1 };
        assert!(validate_for_mp4(&cfg(0, thirty)).is_err());
        assert!(validate_for_mp4(&cfg(11, thirty)).is_err());
        assert!(validate_for_mp4(&cfg(10, Fps { num: 0, den: 1 })).is_err());
        assert!(validate_for_mp4(&cfg(10, Fps { num: 30000, den: 1001 })).is_err());
        assert_eq!(validate_for_mp4(&cfg(10, thirty)).unwrap(), 30);
    }

    #[test]
    fn end_without_begin_fails() {
        let mut sink = FfmpegSink::new("target/ffmpeg_unit/never.mp4", true);
        assert!(sink.end().is_err());
    }
}
