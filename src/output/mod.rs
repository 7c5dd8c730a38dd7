//! Export writers and terminal progress.

mod csv;
mod json;
pub mod progress;
mod types;
mod writer;

pub use csv::CsvWriter;
pub use json::JsonWriter;
pub use types::ExportFormat;
pub use writer::OutputWriter;

use crate::error::Result;
use crate::store::DetectionRecord;
use std::path::Path;

/// Write `records` to `path` in the given format.
pub fn export_records(records: &[DetectionRecord], path: &Path, format: ExportFormat) -> Result<()> {
    let mut writer: Box<dyn OutputWriter> = match format {
        ExportFormat::Csv => Box::new(CsvWriter::new(path)?),
        ExportFormat::Json => Box::new(JsonWriter::new(path)),
    };

    writer.write_header()?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.finalize()
}
