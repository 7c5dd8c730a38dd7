//! End-to-end reconciliation between file-backed stores and a shared server.

use fieldlog::Error;
use fieldlog::Result;
use fieldlog::gps::FixedPosition;
use fieldlog::pipeline::{DetectionPipeline, RawDetection};
use fieldlog::remote::{RemoteClient, RemoteRecord};
use fieldlog::store::{DetectionRecord, NaturalKey, NewDetection, SqliteStore};
use fieldlog::sync::{PassOutcome, ReconcileReport, Reconciler};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use tempfile::TempDir;

/// Server that dedupes on the natural key and can be switched off.
#[derive(Default)]
struct MemoryServer {
    records: RefCell<Vec<RemoteRecord>>,
    push_count: Cell<usize>,
    down: Cell<bool>,
}

impl MemoryServer {
    fn keys(&self) -> HashSet<NaturalKey> {
        self.records.borrow().iter().map(RemoteRecord::key).collect()
    }
}

impl RemoteClient for MemoryServer {
    fn fetch_all(&self) -> Result<Vec<RemoteRecord>> {
        if self.down.get() {
            return Err(Error::network("memory://get_all_data", "link down"));
        }
        Ok(self.records.borrow().clone())
    }

    fn push(&self, record: &DetectionRecord) -> Result<()> {
        if self.down.get() {
            return Err(Error::network("memory://add_data", "link down"));
        }
        self.push_count.set(self.push_count.get() + 1);
        let key = record.key();
        let mut records = self.records.borrow_mut();
        if !records.iter().any(|r| r.key() == key) {
            records.push(RemoteRecord::new(
                record.class_label.clone(),
                record.latitude,
                record.longitude,
            ));
        }
        Ok(())
    }
}

fn report(outcome: PassOutcome) -> ReconcileReport {
    match outcome {
        PassOutcome::Completed(report) => report,
        PassOutcome::Offline => panic!("pass unexpectedly offline"),
    }
}

#[test]
fn test_deer_and_boar_exchange() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("detections.db");
    let server = MemoryServer::default();
    server
        .records
        .borrow_mut()
        .push(RemoteRecord::new("boar", 3.0, 4.0));

    let mut store = SqliteStore::open(&db).unwrap();
    store
        .insert_if_absent(&NewDetection::new("deer", 0.8, 1.0, 2.0))
        .unwrap();

    let first = report(Reconciler::new(&server).run(&mut store).unwrap());
    assert_eq!(first.pulled, 1);
    assert_eq!(first.pushed, vec![NaturalKey::new("deer", 1.0, 2.0)]);
    drop(store);

    // Survives a restart.
    let mut store = SqliteStore::open(&db).unwrap();
    let records = store.all().unwrap();
    assert_eq!(records.len(), 2);
    let boar = records.iter().find(|r| r.class_label == "boar").unwrap();
    assert!((boar.confidence - 1.0).abs() < f64::EPSILON);
    assert_eq!(server.keys(), store.all_keys().unwrap());

    let second = report(Reconciler::new(&server).run(&mut store).unwrap());
    assert!(second.is_noop());
    assert_eq!(server.push_count.get(), 1);
}

#[test]
fn test_two_nodes_converge() {
    let dir = TempDir::new().unwrap();
    let server = MemoryServer::default();
    server
        .records
        .borrow_mut()
        .push(RemoteRecord::new("hare", 9.0, 9.0));

    let mut node_a = SqliteStore::open(&dir.path().join("a.db")).unwrap();
    let mut node_b = SqliteStore::open(&dir.path().join("b.db")).unwrap();
    node_a
        .insert_if_absent(&NewDetection::new("deer", 0.8, 1.0, 2.0))
        .unwrap();
    node_b
        .insert_if_absent(&NewDetection::new("fox", 0.7, 5.0, 6.0))
        .unwrap();

    let reconciler = Reconciler::new(&server);
    reconciler.run(&mut node_a).unwrap();
    reconciler.run(&mut node_b).unwrap();
    reconciler.run(&mut node_a).unwrap();

    let expected: HashSet<NaturalKey> = [
        NaturalKey::new("deer", 1.0, 2.0),
        NaturalKey::new("fox", 5.0, 6.0),
        NaturalKey::new("hare", 9.0, 9.0),
    ]
    .into_iter()
    .collect();
    assert_eq!(node_a.all_keys().unwrap(), expected);
    assert_eq!(node_b.all_keys().unwrap(), expected);
    assert_eq!(server.keys(), expected);
}

#[test]
fn test_offline_then_recovered() {
    let server = MemoryServer::default();
    server.down.set(true);
    let mut store = SqliteStore::open_in_memory().unwrap();
    store
        .insert_if_absent(&NewDetection::new("deer", 0.8, 1.0, 2.0))
        .unwrap();
    let reconciler = Reconciler::new(&server);

    for _ in 0..3 {
        assert_eq!(reconciler.run(&mut store).unwrap(), PassOutcome::Offline);
    }
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(server.push_count.get(), 0);

    server.down.set(false);
    let recovered = report(reconciler.run(&mut store).unwrap());
    assert_eq!(recovered.pushed.len(), 1);
    assert_eq!(server.keys(), store.all_keys().unwrap());
}

#[test]
fn test_pipeline_detection_already_on_server_is_not_duplicated() {
    let server = MemoryServer::default();
    server
        .records
        .borrow_mut()
        .push(RemoteRecord::new("deer", 1.0, 2.0));
    let mut store = SqliteStore::open_in_memory().unwrap();
    let mut pipeline = DetectionPipeline::new(FixedPosition::new(1.0, 2.0), 0.6);

    pipeline
        .process_frame(&mut store, &[RawDetection::new("deer", 0.9)])
        .unwrap();
    let pass = report(Reconciler::new(&server).run(&mut store).unwrap());
    pipeline
        .process_frame(&mut store, &[RawDetection::new("deer", 0.95)])
        .unwrap();

    assert_eq!(pass.pulled, 0);
    assert!(pass.pushed.is_empty());
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(server.records.borrow().len(), 1);
}
