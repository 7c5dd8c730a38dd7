//! Position sources for tagging detections.

mod fixed;
mod gpsd;

pub use fixed::FixedPosition;
pub use gpsd::{GpsdSource, parse_fix};

use crate::config::{GpsConfig, GpsSourceKind};
use crate::error::{Error, Result};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

/// Anything that can report where the device is right now.
pub trait PositionSource {
    /// Sample the current position.
    ///
    /// Returns [`Error::GpsUnavailable`] when there is no fix.
    fn sample_position(&mut self) -> Result<Position>;
}

impl<T: PositionSource + ?Sized> PositionSource for Box<T> {
    fn sample_position(&mut self) -> Result<Position> {
        (**self).sample_position()
    }
}

/// Build the position source selected in configuration.
pub fn position_source_from_config(config: &GpsConfig) -> Result<Box<dyn PositionSource>> {
    match config.source {
        GpsSourceKind::Gpsd => Ok(Box::new(GpsdSource::from_config(config))),
        GpsSourceKind::Fixed => match (config.latitude, config.longitude) {
            (Some(latitude), Some(longitude)) => {
                Ok(Box::new(FixedPosition::new(latitude, longitude)))
            }
            _ => Err(Error::ConfigValidation {
                message: "fixed gps source needs latitude and longitude".to_string(),
            }),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_source_from_config() {
        let config = GpsConfig {
            source: GpsSourceKind::Fixed,
            latitude: Some(61.49),
            longitude: Some(23.76),
            ..GpsConfig::default()
        };
        let mut source = position_source_from_config(&config).unwrap();
        assert_eq!(
            source.sample_position().unwrap(),
            Position {
                latitude: 61.49,
                longitude: 23.76
            }
        );
    }

    #[test]
    fn test_fixed_source_without_coordinates_is_rejected() {
        let config = GpsConfig {
            source: GpsSourceKind::Fixed,
            ..GpsConfig::default()
        };
        assert!(position_source_from_config(&config).is_err());
    }
}
