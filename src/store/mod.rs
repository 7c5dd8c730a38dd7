//! Local detection store.

mod record;
mod sqlite;

pub use record::{DetectionRecord, NaturalKey, NewDetection};
pub use sqlite::SqliteStore;
