//! JSON export.

use crate::error::{Error, Result};
use crate::output::OutputWriter;
use crate::store::DetectionRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Exported file structure.
#[derive(Debug, Serialize)]
struct JsonExportFile<'a> {
    exported_at: DateTime<Utc>,
    total_records: usize,
    detections: &'a [DetectionRecord],
}

/// Writer collecting records and emitting one JSON document on finalize.
pub struct JsonWriter {
    records: Vec<DetectionRecord>,
    output_path: PathBuf,
}

impl JsonWriter {
    /// Create a new JSON writer.
    pub fn new(output_path: &Path) -> Self {
        Self {
            records: Vec::new(),
            output_path: output_path.to_path_buf(),
        }
    }
}

impl OutputWriter for JsonWriter {
    fn write_header(&mut self) -> Result<()> {
        // Written at finalize
        Ok(())
    }

    fn write_record(&mut self, record: &DetectionRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let file = File::create(&self.output_path)?;
        self.write_document(BufWriter::new(file))
    }
}

impl JsonWriter {
    /// Serialize the collected records and flush `writer`.
    fn write_document<W: Write>(&self, mut writer: W) -> Result<()> {
        let document = JsonExportFile {
            exported_at: Utc::now(),
            total_records: self.records.len(),
            detections: &self.records,
        };

        serde_json::to_writer_pretty(&mut writer, &document)
            .and_then(|()| writer.flush().map_err(serde_json::Error::io))
            .map_err(|e| Error::JsonWrite {
                path: self.output_path.clone(),
                source: e,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_json_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");

        let mut writer = JsonWriter::new(&path);
        writer.write_header().unwrap();
        writer
            .write_record(&DetectionRecord {
                id: 7,
                class_label: "boar".to_string(),
                confidence: 1.0,
                latitude: 3.0,
                longitude: 4.0,
                timestamp: NaiveDate::from_ymd_opt(2026, 5, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            })
            .unwrap();
        writer.finalize().unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_records"], 1);
        assert_eq!(value["detections"][0]["class_label"], "boar");
        assert_eq!(value["detections"][0]["id"], 7);
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_flush_failure_is_reported() {
        let writer = JsonWriter::new(Path::new("/media/sd/out.json"));

        // The document fits the buffer, so only the flush reaches the device.
        let err = writer
            .write_document(BufWriter::new(FullDisk))
            .unwrap_err();

        assert!(matches!(err, Error::JsonWrite { ref path, .. } if path.ends_with("out.json")));
    }
}
