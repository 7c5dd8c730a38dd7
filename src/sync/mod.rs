//! Store-and-forward reconciliation.

mod reconciler;

pub use reconciler::{PassOutcome, ReconcileReport, Reconciler};
