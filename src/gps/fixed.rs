//! Static position for stationary deployments.

use super::{Position, PositionSource};
use crate::error::Result;

/// Reports the same position for every sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition {
    position: Position,
}

impl FixedPosition {
    /// Create a fixed source at the given coordinates.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            position: Position {
                latitude,
                longitude,
            },
        }
    }
}

impl PositionSource for FixedPosition {
    fn sample_position(&mut self) -> Result<Position> {
        Ok(self.position)
    }
}
