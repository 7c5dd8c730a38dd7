//! Wire types for the remote detection server.

use crate::constants::{REMOTE_CONFIDENCE, TIMESTAMP_FORMAT};
use crate::store::{DetectionRecord, NaturalKey, NewDetection};
use serde::{Deserialize, Serialize};

/// One element of the `GET /get_all_data` array.
///
/// Only the natural key fields are read; anything else the server sends
/// (ids, its own timestamps) is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteRecord {
    /// Detected category (`type` on the wire).
    #[serde(rename = "type")]
    pub class_label: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl RemoteRecord {
    /// Create a remote record.
    pub fn new(class_label: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            class_label: class_label.into(),
            latitude,
            longitude,
        }
    }

    /// Natural key of this record.
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(&self.class_label, self.latitude, self.longitude)
    }

    /// Local form of this record, with the remote-delta confidence.
    pub fn to_new_detection(&self) -> NewDetection {
        NewDetection::new(
            self.class_label.clone(),
            REMOTE_CONFIDENCE,
            self.latitude,
            self.longitude,
        )
    }
}

/// Body of `POST /add_data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload<'a> {
    /// Detected category.
    #[serde(rename = "type")]
    pub class_label: &'a str,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Detector confidence.
    pub confidence: f64,
    /// Local persistence time, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
}

impl<'a> From<&'a DetectionRecord> for PushPayload<'a> {
    fn from(record: &'a DetectionRecord) -> Self {
        Self {
            class_label: &record.class_label,
            latitude: record.latitude,
            longitude: record.longitude,
            confidence: record.confidence,
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_remote_record_reads_type_field() {
        let record: RemoteRecord = serde_json::from_str(
            r#"{"id": 17, "type": "boar", "latitude": 3.0, "longitude": 4, "seen": "x"}"#,
        )
        .unwrap();
        assert_eq!(record, RemoteRecord::new("boar", 3.0, 4.0));
    }

    #[test]
    fn test_remote_record_becomes_full_confidence_detection() {
        let detection = RemoteRecord::new("boar", 3.0, 4.0).to_new_detection();
        assert_eq!(detection.confidence, 1.0);
        assert_eq!(detection.key(), NaturalKey::new("boar", 3.0, 4.0));
    }

    #[test]
    fn test_push_payload_shape() {
        let record = DetectionRecord {
            id: 3,
            class_label: "deer".to_string(),
            confidence: 0.8,
            latitude: 1.0,
            longitude: 2.0,
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(6, 30, 0)
                .unwrap(),
        };

        let json = serde_json::to_value(PushPayload::from(&record)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "deer",
                "latitude": 1.0,
                "longitude": 2.0,
                "confidence": 0.8,
                "timestamp": "2024-05-01 06:30:00"
            })
        );
    }
}
