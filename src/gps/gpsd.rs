//! gpsd client.
//!
//! Speaks just enough of the gpsd JSON protocol to get a fix: enable watch
//! mode, then read reports until a `TPV` with a 2D or 3D fix arrives or the
//! deadline passes. A fresh connection is used per sample so no stale,
//! buffered reports are ever returned.

use super::{Position, PositionSource};
use crate::config::GpsConfig;
use crate::constants::gps::WATCH_COMMAND;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Minimum gpsd `mode` that carries a usable position (2 = 2D fix).
const MIN_FIX_MODE: u8 = 2;

#[derive(Debug, Deserialize)]
struct Report {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Extract a position from one line of gpsd output, if it carries a fix.
pub fn parse_fix(line: &str) -> Option<Position> {
    let report: Report = serde_json::from_str(line.trim()).ok()?;
    if report.class != "TPV" || report.mode < MIN_FIX_MODE {
        return None;
    }
    match (report.lat, report.lon) {
        (Some(latitude), Some(longitude)) => Some(Position {
            latitude,
            longitude,
        }),
        _ => None,
    }
}

/// Position source backed by a gpsd daemon.
#[derive(Debug, Clone)]
pub struct GpsdSource {
    host: String,
    port: u16,
    timeout: Duration,
}

impl GpsdSource {
    /// Create a source for the daemon at `host:port`.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Create a source from GPS settings.
    pub fn from_config(config: &GpsConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> Error {
        Error::GpsUnavailable {
            reason: format!("gpsd at {}:{}: {reason}", self.host, self.port),
        }
    }

    fn connect(&self) -> Result<TcpStream> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| self.unavailable(e))?
            .next()
            .ok_or_else(|| self.unavailable("address did not resolve"))?;

        let mut stream =
            TcpStream::connect_timeout(&addr, self.timeout).map_err(|e| self.unavailable(e))?;
        stream
            .write_all(WATCH_COMMAND.as_bytes())
            .map_err(|e| self.unavailable(e))?;
        Ok(stream)
    }
}

impl PositionSource for GpsdSource {
    fn sample_position(&mut self) -> Result<Position> {
        let deadline = Instant::now() + self.timeout;
        let stream = self.connect()?;
        let mut reader = BufReader::new(stream);
        let mut line = String::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.unavailable("no fix before timeout"));
            }
            reader
                .get_ref()
                .set_read_timeout(Some(remaining))
                .map_err(|e| self.unavailable(e))?;

            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => return Err(self.unavailable("connection closed")),
                Ok(_) => {
                    trace!("gpsd: {}", line.trim_end());
                    if let Some(position) = parse_fix(&line) {
                        debug!(
                            "GPS fix: {:.6}, {:.6}",
                            position.latitude, position.longitude
                        );
                        return Ok(position);
                    }
                }
                Err(e) => return Err(self.unavailable(e)),
            }
        }
    }
}
