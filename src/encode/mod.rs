pub mod ffmpeg;
pub mod gif;
pub mod sink;

use std::path::{Path, PathBuf};

pub use ffmpeg::{FfmpegSink, is_ffmpeg_on_path};
pub use gif::GifSink;
pub use sink::{FrameSink, InMemorySink, SinkConfig};

use crate::foundation::error::{AnimError, AnimResult};

/// Container chosen from the output path's extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Gif,
    Mp4,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> AnimResult<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("gif") => Ok(Self::Gif),
            Some("mp4") => Ok(Self::Mp4),
            _ => Err(AnimError::validation(format!(
                "unsupported output '{}': expected a .gif or .mp4 path",
                path.display()
            ))),
        }
    }
}

/// Open the sink matching `out_path`'s extension.
pub fn create_sink(out_path: &Path, overwrite: bool) -> AnimResult<Box<dyn FrameSink>> {
    match OutputFormat::from_path(out_path)? {
        OutputFormat::Gif => Ok(Box::new(GifSink::new(out_path, overwrite))),
        OutputFormat::Mp4 => Ok(Box::new(FfmpegSink::new(out_path, overwrite))),
    }
}

pub fn ensure_parent_dir(path: &Path) -> AnimResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Refuse to clobber an existing artefact unless asked to.
pub(crate) fn check_overwrite(path: &Path, overwrite: bool) -> AnimResult<()> {
    if !overwrite && path.exists() {
        return Err(AnimError::validation(format!(
            "output file '{}' already exists",
            path.display()
        )));
    }
    Ok(())
}

/// Sibling path an encoder writes to before the artefact is published.
pub(crate) fn partial_path(out_path: &Path) -> PathBuf {
    let mut name = out_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    out_path.with_file_name(name)
}

/// Move a finished partial file into place.
pub(crate) fn publish(partial: &Path, out_path: &Path) -> AnimResult<()> {
    use anyhow::Context as _;
    std::fs::rename(partial, out_path).with_context(|| {
        format!(
            "move '{}' to '{}'",
            partial.display(),
            out_path.display()
        )
    })?;
    Ok(())
}

pub(crate) fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> AnimResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(AnimError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;

        let (r, g, b) = if src_is_premul {
            (
                s[0] as u16 + mul_div255(bg_r, inv),
                s[1] as u16 + mul_div255(bg_g, inv),
                s[2] as u16 + mul_div255(bg_b, inv),
            )
        } else {
            (
                mul_div255(s[0] as u16, a) + mul_div255(bg_r, inv),
                mul_div255(s[1] as u16, a) + mul_div255(bg_g, inv),
                mul_div255(s[2] as u16, a) + mul_div255(bg_b, inv),
            )
        };

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            OutputFormat::from_path(Path::new("out/sim.GIF")).unwrap(),
            OutputFormat::Gif
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("sim.mp4")).unwrap(),
            OutputFormat::Mp4
        );
        assert!(OutputFormat::from_path(Path::new("sim.avi")).is_err());
        assert!(OutputFormat::from_path(Path::new("sim")).is_err());
    }

    #[test]
    fn partial_path_is_a_sibling() {
        assert_eq!(
            partial_path(Path::new("out/simulation.gif")),
            PathBuf::from("out/simulation.gif.partial")
        );
    }

    #[test]
    fn flatten_premul_over_black_produces_expected_rgb() {
        // Premultiplied red @ 50% alpha => rgb is 128,0,0 when premul.
        let src = vec![128u8, 0u8, 0u8, 128u8];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, true, [0, 0, 0, 255]).unwrap();
        assert_eq!(dst, vec![128u8, 0u8, 0u8, 255u8]);
    }

    #[test]
    fn flatten_straight_over_white_blends() {
        let src = vec![0u8, 0u8, 0u8, 0u8];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, false, [255, 255, 255, 255]).unwrap();
        assert_eq!(dst, vec![255u8, 255u8, 255u8, 255u8]);
    }

    #[test]
    fn flatten_rejects_mismatched_buffers() {
        let mut dst = vec![0u8; 8];
        assert!(flatten_to_opaque_rgba8(&mut dst, &[0u8; 4], true, [0, 0, 0, 255]).is_err());
    }
}
