use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::foundation::error::{AnimError, AnimResult};

/// One particle observation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub mass: f64,
}

impl Sample {
    pub fn new(x: f64, y: f64, mass: f64) -> Self {
        Self { x, y, mass }
    }
}

/// All samples of one simulation step, in line order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Frame {
    samples: Vec<Sample>,
}

impl Frame {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Why a non-blank line did not yield a [`Sample`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error("expected at least 3 comma-separated fields, found {found}")]
    MissingField { found: usize },

    #[error("field {field} is not a number: '{text}'")]
    BadNumber { field: usize, text: String },

    #[error("non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },
}

/// Parse one `x,y,mass` line. Fields past the third are ignored.
///
/// Only the coordinates are checked for finiteness; `mass` is passed through as parsed.
pub fn parse_sample(line: &str) -> Result<Sample, SampleError> {
    let mut fields = line.split(',');
    let mut values = [0.0f64; 3];
    for (field, slot) in values.iter_mut().enumerate() {
        let text = fields
            .next()
            .ok_or(SampleError::MissingField { found: field })?
            .trim();
        *slot = text.parse::<f64>().map_err(|_| SampleError::BadNumber {
            field,
            text: text.to_string(),
        })?;
    }

    let [x, y, mass] = values;
    if !(x.is_finite() && y.is_finite()) {
        return Err(SampleError::NonFiniteCoordinate { x, y });
    }
    Ok(Sample { x, y, mass })
}

/// Frame segmentation state. The pending buffer never leaves the parser.
#[derive(Debug, Default)]
struct FrameFold {
    frames: Vec<Frame>,
    pending: Vec<Sample>,
    line_no: usize,
}

impl FrameFold {
    fn step(mut self, line: &str) -> Self {
        self.line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            self.close_pending();
            return self;
        }

        match parse_sample(line) {
            Ok(sample) => self.pending.push(sample),
            Err(err) => {
                tracing::debug!(line = self.line_no, %err, "skipping sample line");
            }
        }
        self
    }

    fn close_pending(&mut self) {
        if !self.pending.is_empty() {
            self.frames
                .push(Frame::new(std::mem::take(&mut self.pending)));
        }
    }

    fn finish(mut self) -> Vec<Frame> {
        self.close_pending();
        self.frames
    }
}

/// Lines of one `\n`-terminated chunk. `\r\n` is a single break; a bare `\r` is one too.
fn split_lines(chunk: &str) -> std::str::Split<'_, char> {
    let chunk = chunk.strip_suffix('\n').unwrap_or(chunk);
    let chunk = chunk.strip_suffix('\r').unwrap_or(chunk);
    chunk.split('\r')
}

/// Segment an in-memory log into frames.
pub fn parse_str(text: &str) -> Vec<Frame> {
    text.split('\n')
        .flat_map(split_lines)
        .fold(FrameFold::default(), FrameFold::step)
        .finish()
}

/// Segment a line stream into frames.
///
/// Lines are decoded lossily, so a line with invalid UTF-8 is skipped like any other malformed
/// line. Only I/O failures of the reader itself are returned.
pub fn parse_frames<R: BufRead>(mut reader: R) -> std::io::Result<Vec<Frame>> {
    let mut fold = FrameFold::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        fold = split_lines(&String::from_utf8_lossy(&buf)).fold(fold, FrameFold::step);
    }
    Ok(fold.finish())
}

/// Open and segment a simulation log. Failing to open or read it is fatal.
pub fn read_frames(path: &Path) -> AnimResult<Vec<Frame>> {
    let file = File::open(path).map_err(|e| AnimError::unreadable(path, e))?;
    parse_frames(BufReader::new(file)).map_err(|e| AnimError::unreadable(path, e))
}
