//! JSON-lines detection feed.
//!
//! Lets an external inference process drive the logger: each line is one
//! frame's worth of detections, either a JSON array or a single object.
//!
//! ```text
//! [{"class": "deer", "confidence": 0.91, "bbox": [12, 40, 220, 310]}]
//! {"class": "boar", "confidence": 0.64}
//! []
//! ```

use super::{Detector, FrameSource, RawDetection};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum FrameLine {
    Many(Vec<RawDetection>),
    One(RawDetection),
}

/// Frame source reading pre-computed detections, one frame per line.
pub struct JsonLinesFeed<R> {
    reader: R,
    line_number: usize,
    buffer: String,
}

impl JsonLinesFeed<Box<dyn BufRead>> {
    /// Open a feed from a file path, or standard input when `path` is `-`.
    pub fn open(path: &Path) -> Result<Self> {
        let reader: Box<dyn BufRead> = if path.as_os_str() == "-" {
            Box::new(BufReader::new(std::io::stdin()))
        } else {
            let file = File::open(path).map_err(|source| Error::FeedOpen {
                path: path.to_path_buf(),
                source,
            })?;
            Box::new(BufReader::new(file))
        };
        Ok(Self::from_reader(reader))
    }
}

impl<R: BufRead> JsonLinesFeed<R> {
    /// Wrap any buffered reader.
    pub const fn from_reader(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead> FrameSource for JsonLinesFeed<R> {
    type Frame = Vec<RawDetection>;

    fn grab(&mut self) -> Result<Option<Self::Frame>> {
        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return Ok(None),
                Ok(_) => self.line_number += 1,
                // The bad bytes are consumed, so the next grab starts on the next line.
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    self.line_number += 1;
                    return Err(Error::FrameGrab {
                        reason: format!("line {}: {e}", self.line_number),
                    });
                }
                Err(e) => return Err(e.into()),
            }

            let line = self.buffer.trim();
            if line.is_empty() {
                continue;
            }

            return match serde_json::from_str::<FrameLine>(line) {
                Ok(FrameLine::Many(detections)) => Ok(Some(detections)),
                Ok(FrameLine::One(detection)) => Ok(Some(vec![detection])),
                Err(e) => Err(Error::FrameGrab {
                    reason: format!("line {}: {e}", self.line_number),
                }),
            };
        }
    }
}

/// Detector for frames that already carry their detections.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrecomputedDetector;

impl Detector for PrecomputedDetector {
    type Frame = Vec<RawDetection>;

    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<RawDetection>> {
        Ok(frame.clone())
    }
}
