//! Diff-and-sync between the local store and the remote server.

use crate::error::Result;
use crate::output::progress;
use crate::remote::RemoteClient;
use crate::store::{NaturalKey, SqliteStore};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Counts and keys from one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records in the remote snapshot.
    pub fetched: usize,
    /// Remote-only records written locally.
    pub pulled: usize,
    /// Local-only records the server accepted.
    pub pushed: Vec<NaturalKey>,
    /// Local-only records whose push failed; retried next pass.
    pub push_failed: Vec<NaturalKey>,
    /// Remote records with out-of-range fields that were not stored.
    pub skipped: usize,
}

impl ReconcileReport {
    /// True when the pass changed nothing on either side.
    pub fn is_noop(&self) -> bool {
        self.pulled == 0 && self.pushed.is_empty() && self.push_failed.is_empty()
    }
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The remote snapshot could not be fetched; nothing was touched.
    Offline,
    /// The pass ran to completion.
    Completed(ReconcileReport),
}

/// Makes the local store and the server eventually consistent.
///
/// There is no shared transaction: the remote snapshot is the reference for
/// both directions within a pass, and the next pass is the retry mechanism.
pub struct Reconciler<R> {
    remote: R,
    show_progress: bool,
}

impl<R: RemoteClient> Reconciler<R> {
    /// Create a reconciler for the given remote.
    pub const fn new(remote: R) -> Self {
        Self {
            remote,
            show_progress: false,
        }
    }

    /// Show a progress bar while pushing.
    #[must_use]
    pub const fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// The remote this reconciler talks to.
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Run one pass.
    ///
    /// Network failures never surface as errors: a failed fetch yields
    /// [`PassOutcome::Offline`] and a failed push is listed in the report.
    /// Store failures are returned.
    pub fn run(&self, store: &mut SqliteStore) -> Result<PassOutcome> {
        let snapshot = match self.remote.fetch_all() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Skipping reconciliation, remote fetch failed: {e}");
                return Ok(PassOutcome::Offline);
            }
        };

        let mut report = ReconcileReport {
            fetched: snapshot.len(),
            ..ReconcileReport::default()
        };
        let remote_keys: HashSet<NaturalKey> = snapshot.iter().map(|r| r.key()).collect();

        // Pull: remote-only records, each key once.
        let mut local_keys = store.all_keys()?;
        let mut missing = Vec::new();
        for record in &snapshot {
            let detection = record.to_new_detection();
            if let Err(e) = detection.validate() {
                warn!("Ignoring remote record {}: {e}", record.key());
                report.skipped += 1;
                continue;
            }
            if local_keys.insert(detection.key()) {
                missing.push(detection);
            }
        }
        report.pulled = store.insert_missing(&missing)?;

        // Push: local-only records against the same snapshot.
        let mut attempted = HashSet::new();
        let pending: Vec<_> = store
            .all()?
            .into_iter()
            .filter(|record| {
                let key = record.key();
                !remote_keys.contains(&key) && attempted.insert(key)
            })
            .collect();

        let pb = progress::create_push_progress(pending.len(), self.show_progress);
        for record in &pending {
            match self.remote.push(record) {
                Ok(()) => {
                    debug!("Pushed {}", record.key());
                    report.pushed.push(record.key());
                }
                Err(e) => {
                    warn!("Push failed for {}, will retry next pass: {e}", record.key());
                    report.push_failed.push(record.key());
                }
            }
            progress::inc_progress(pb.as_ref());
        }
        progress::finish_progress(pb, "Push complete");

        info!(
            "Reconciled: {} remote, {} pulled, {} pushed, {} push failures, {} skipped",
            report.fetched,
            report.pulled,
            report.pushed.len(),
            report.push_failed.len(),
            report.skipped
        );

        Ok(PassOutcome::Completed(report))
    }
}
