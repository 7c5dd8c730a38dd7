//! Configuration validation.

use crate::config::{Config, GpsSourceKind};
use crate::constants::confidence;
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_detection(config)?;
    validate_remote(config)?;
    validate_gps(config)?;
    Ok(())
}

fn validate_detection(config: &Config) -> Result<()> {
    let min_confidence = config.detection.min_confidence;
    if !(confidence::MIN..=confidence::MAX).contains(&min_confidence) {
        return Err(Error::ConfigValidation {
            message: format!(
                "min_confidence must be between {} and {}, got {}",
                confidence::MIN,
                confidence::MAX,
                min_confidence
            ),
        });
    }
    Ok(())
}

fn validate_remote(config: &Config) -> Result<()> {
    let remote = &config.remote;
    if !remote.enabled {
        return Ok(());
    }

    if !(remote.base_url.starts_with("http://") || remote.base_url.starts_with("https://")) {
        return Err(Error::ConfigValidation {
            message: format!(
                "remote.base_url must start with http:// or https://, got '{}'",
                remote.base_url
            ),
        });
    }

    if remote.timeout_secs == 0 || remote.connect_timeout_secs == 0 {
        return Err(Error::ConfigValidation {
            message: "remote timeouts must be at least 1 second".to_string(),
        });
    }

    Ok(())
}

fn validate_gps(config: &Config) -> Result<()> {
    let gps = &config.gps;

    if let Some(lat) = gps.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        return Err(Error::InvalidLatitude { value: lat });
    }

    if let Some(lon) = gps.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        return Err(Error::InvalidLongitude { value: lon });
    }

    match gps.source {
        GpsSourceKind::Fixed if gps.latitude.is_none() || gps.longitude.is_none() => {
            Err(Error::ConfigValidation {
                message: "gps.source = \"fixed\" requires gps.latitude and gps.longitude"
                    .to_string(),
            })
        }
        GpsSourceKind::Gpsd if gps.timeout_secs == 0 => Err(Error::ConfigValidation {
            message: "gps.timeout_secs must be at least 1".to_string(),
        }),
        _ => Ok(()),
    }
}
