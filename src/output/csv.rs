//! CSV export.

use crate::constants::TIMESTAMP_FORMAT;
use crate::constants::confidence::DECIMAL_PLACES;
use crate::error::{Error, Result};
use crate::output::OutputWriter;
use crate::store::DetectionRecord;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const HEADER: [&str; 6] = [
    "id",
    "class",
    "confidence",
    "latitude",
    "longitude",
    "timestamp",
];

/// CSV format output writer.
pub struct CsvWriter {
    writer: csv::Writer<BufWriter<File>>,
    path: PathBuf,
}

impl CsvWriter {
    /// Create a new CSV writer.
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: csv::Writer::from_writer(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    fn wrap(&self, source: csv::Error) -> Error {
        Error::CsvWrite {
            path: self.path.clone(),
            source,
        }
    }
}

impl OutputWriter for CsvWriter {
    fn write_header(&mut self) -> Result<()> {
        self.writer.write_record(HEADER).map_err(|e| self.wrap(e))
    }

    fn write_record(&mut self, record: &DetectionRecord) -> Result<()> {
        let row = [
            record.id.to_string(),
            record.class_label.clone(),
            format!("{:.decimal$}", record.confidence, decimal = DECIMAL_PLACES),
            record.latitude.to_string(),
            record.longitude.to_string(),
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ];
        self.writer.write_record(&row).map_err(|e| self.wrap(e))
    }

    fn finalize(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
