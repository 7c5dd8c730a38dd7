//! Detection record types and the natural key used for deduplication.

use crate::constants::confidence;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::hash::{Hash, Hasher};

/// A detection as persisted in the local store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    /// Store-assigned identifier, increasing with insertion order.
    pub id: i64,
    /// Detected category.
    pub class_label: String,
    /// Detector confidence (0.0 - 1.0).
    pub confidence: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// When this node persisted the record (UTC, second resolution).
    pub timestamp: NaiveDateTime,
}

impl DetectionRecord {
    /// Natural key of this record.
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(&self.class_label, self.latitude, self.longitude)
    }
}

/// A detection waiting to be persisted.
///
/// Has no id or timestamp: the store assigns both.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDetection {
    /// Detected category.
    pub class_label: String,
    /// Detector confidence (0.0 - 1.0).
    pub confidence: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl NewDetection {
    /// Create a new detection.
    pub fn new(
        class_label: impl Into<String>,
        confidence: f64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
            latitude,
            longitude,
        }
    }

    /// Natural key of this detection.
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(&self.class_label, self.latitude, self.longitude)
    }

    /// Check label, confidence and coordinate ranges.
    pub fn validate(&self) -> Result<()> {
        if self.class_label.trim().is_empty() {
            return Err(Error::EmptyClassLabel);
        }
        if !(confidence::MIN..=confidence::MAX).contains(&self.confidence) {
            return Err(Error::InvalidConfidence {
                value: self.confidence,
            });
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidLatitude {
                value: self.latitude,
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidLongitude {
                value: self.longitude,
            });
        }
        Ok(())
    }
}

/// `(class_label, latitude, longitude)`: identity of a detection event.
///
/// Coordinates compare exactly. `-0.0` and `0.0` are the same key, matching
/// how SQLite compares the stored values.
#[derive(Debug, Clone)]
pub struct NaturalKey {
    class_label: String,
    latitude: f64,
    longitude: f64,
}

impl NaturalKey {
    /// Build a key from its parts.
    pub fn new(class_label: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            class_label: class_label.to_string(),
            latitude,
            longitude,
        }
    }

    /// Class label component.
    pub fn class_label(&self) -> &str {
        &self.class_label
    }

    /// Latitude component.
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude component.
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    fn coordinate_bits(&self) -> (u64, u64) {
        (canonical_bits(self.latitude), canonical_bits(self.longitude))
    }
}

fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 { 0.0_f64.to_bits() } else { value.to_bits() }
}

impl PartialEq for NaturalKey {
    fn eq(&self, other: &Self) -> bool {
        self.class_label == other.class_label && self.coordinate_bits() == other.coordinate_bits()
    }
}

impl Eq for NaturalKey {}

impl Hash for NaturalKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class_label.hash(state);
        self.coordinate_bits().hash(state);
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.class_label, self.latitude, self.longitude
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_ignores_confidence() {
        let a = NewDetection::new("deer", 0.91, 1.0, 2.0);
        let b = NewDetection::new("deer", 0.62, 1.0, 2.0);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_exact_coordinates() {
        let a = NaturalKey::new("deer", 1.0, 2.0);
        let b = NaturalKey::new("deer", 1.000_000_1, 2.0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_class_is_case_sensitive() {
        assert_ne!(
            NaturalKey::new("Deer", 1.0, 2.0),
            NaturalKey::new("deer", 1.0, 2.0)
        );
    }

    #[test]
    fn test_negative_zero_matches_zero() {
        let mut keys = HashSet::new();
        keys.insert(NaturalKey::new("boar", 0.0, -0.0));
        assert!(keys.contains(&NaturalKey::new("boar", -0.0, 0.0)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(matches!(
            NewDetection::new("", 0.9, 1.0, 2.0).validate(),
            Err(Error::EmptyClassLabel)
        ));
        assert!(matches!(
            NewDetection::new("deer", 1.2, 1.0, 2.0).validate(),
            Err(Error::InvalidConfidence { .. })
        ));
        assert!(matches!(
            NewDetection::new("deer", 0.9, 91.0, 2.0).validate(),
            Err(Error::InvalidLatitude { .. })
        ));
        assert!(matches!(
            NewDetection::new("deer", 0.9, 1.0, f64::NAN).validate(),
            Err(Error::InvalidLongitude { .. })
        ));
        assert!(NewDetection::new("deer", 0.9, 1.0, 2.0).validate().is_ok());
    }
}
