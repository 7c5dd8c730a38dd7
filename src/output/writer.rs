//! Output writer trait definition.

use crate::error::Result;
use crate::store::DetectionRecord;

/// Trait for exporting stored detections.
pub trait OutputWriter {
    /// Write the file header (if applicable).
    fn write_header(&mut self) -> Result<()>;

    /// Write a single record.
    fn write_record(&mut self, record: &DetectionRecord) -> Result<()>;

    /// Finalize the output (flush, close, etc.).
    fn finalize(&mut self) -> Result<()>;
}
