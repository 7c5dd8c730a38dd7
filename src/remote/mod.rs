//! Remote detection server access.

mod http;
mod types;

pub use http::{HttpRemote, parse_snapshot};
pub use types::{PushPayload, RemoteRecord};

use crate::error::Result;
use crate::store::DetectionRecord;

/// Accessor for the server's view of the detection set.
///
/// Both calls report failure as [`crate::Error::NetworkUnavailable`]; callers
/// log it and carry on offline.
pub trait RemoteClient {
    /// Retrieve every record the server currently holds.
    fn fetch_all(&self) -> Result<Vec<RemoteRecord>>;

    /// Send one record. The server deduplicates on the natural key.
    fn push(&self, record: &DetectionRecord) -> Result<()>;
}

impl<T: RemoteClient + ?Sized> RemoteClient for &T {
    fn fetch_all(&self) -> Result<Vec<RemoteRecord>> {
        (**self).fetch_all()
    }

    fn push(&self, record: &DetectionRecord) -> Result<()> {
        (**self).push(record)
    }
}
