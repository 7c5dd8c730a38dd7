//! Turns raw detections into stored, position-tagged records.

use super::RawDetection;
use crate::error::Result;
use crate::gps::PositionSource;
use crate::store::{NewDetection, SqliteStore};
use tracing::{debug, info, warn};

/// What happened to a single raw detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// Persisted with this id.
    Recorded(i64),
    /// A record with the same natural key already exists.
    Duplicate,
    /// Confidence under the threshold.
    BelowThreshold,
    /// No GPS fix; the event is dropped.
    NoPosition,
    /// Label or confidence out of range.
    Rejected,
}

/// Running totals for a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Detections examined.
    pub seen: usize,
    /// Detections persisted.
    pub recorded: usize,
    /// Detections matching an existing natural key.
    pub duplicates: usize,
    /// Detections under the confidence threshold.
    pub below_threshold: usize,
    /// Detections dropped for lack of a GPS fix.
    pub no_position: usize,
    /// Detections with invalid fields.
    pub rejected: usize,
}

impl PipelineStats {
    fn record(&mut self, outcome: DetectionOutcome) {
        self.seen += 1;
        match outcome {
            DetectionOutcome::Recorded(_) => self.recorded += 1,
            DetectionOutcome::Duplicate => self.duplicates += 1,
            DetectionOutcome::BelowThreshold => self.below_threshold += 1,
            DetectionOutcome::NoPosition => self.no_position += 1,
            DetectionOutcome::Rejected => self.rejected += 1,
        }
    }
}

/// Filters detections by confidence, tags them with a position, and appends
/// them to the store.
pub struct DetectionPipeline<P> {
    position: P,
    min_confidence: f64,
    stats: PipelineStats,
}

impl<P: PositionSource> DetectionPipeline<P> {
    /// Create a pipeline with an inclusive confidence threshold.
    pub fn new(position: P, min_confidence: f64) -> Self {
        Self {
            position,
            min_confidence,
            stats: PipelineStats::default(),
        }
    }

    /// Totals so far.
    pub const fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Handle every detection from one frame.
    ///
    /// Stops at the first persistence failure.
    pub fn process_frame(
        &mut self,
        store: &mut SqliteStore,
        detections: &[RawDetection],
    ) -> Result<Vec<DetectionOutcome>> {
        let mut outcomes = Vec::with_capacity(detections.len());
        for detection in detections {
            outcomes.push(self.handle(store, detection)?);
        }
        Ok(outcomes)
    }

    /// Handle a single detection.
    pub fn handle(
        &mut self,
        store: &mut SqliteStore,
        detection: &RawDetection,
    ) -> Result<DetectionOutcome> {
        let outcome = self.evaluate(store, detection)?;
        self.stats.record(outcome);
        Ok(outcome)
    }

    fn evaluate(
        &mut self,
        store: &mut SqliteStore,
        detection: &RawDetection,
    ) -> Result<DetectionOutcome> {
        if detection.confidence.is_nan() || detection.confidence > 1.0 {
            warn!(
                "Rejecting detection '{}' with confidence {}",
                detection.class_label, detection.confidence
            );
            return Ok(DetectionOutcome::Rejected);
        }

        if detection.confidence < self.min_confidence {
            return Ok(DetectionOutcome::BelowThreshold);
        }

        // Sample only for detections that will be kept.
        let position = match self.position.sample_position() {
            Ok(position) => position,
            Err(e) if e.is_recoverable() => {
                warn!(
                    "Dropping detection '{}' ({:.2}): {e}",
                    detection.class_label, detection.confidence
                );
                return Ok(DetectionOutcome::NoPosition);
            }
            Err(e) => return Err(e),
        };

        let new = NewDetection::new(
            detection.class_label.clone(),
            detection.confidence,
            position.latitude,
            position.longitude,
        );
        if let Err(e) = new.validate() {
            warn!("Rejecting detection: {e}");
            return Ok(DetectionOutcome::Rejected);
        }

        match store.insert_if_absent(&new)? {
            Some(id) => {
                info!(
                    "Detected: {}, confidence {:.2}, GPS ({:.6}, {:.6})",
                    new.class_label, new.confidence, new.latitude, new.longitude
                );
                Ok(DetectionOutcome::Recorded(id))
            }
            None => {
                debug!("Already recorded: {}", new.key());
                Ok(DetectionOutcome::Duplicate)
            }
        }
    }
}
