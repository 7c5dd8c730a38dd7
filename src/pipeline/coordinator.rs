//! Session loop: frames in, records out, periodic reconciliation.

use super::{DetectionPipeline, Detector, FrameSource, PipelineStats};
use crate::error::{Error, Result};
use crate::gps::PositionSource;
use crate::remote::RemoteClient;
use crate::store::SqliteStore;
use crate::sync::{PassOutcome, ReconcileReport, Reconciler};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// When the session reconciles and when it stops.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Reconcile between frames once this much time has passed.
    pub sync_interval: Option<Duration>,
    /// Reconcile once more before returning.
    pub sync_on_exit: bool,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            sync_interval: None,
            sync_on_exit: true,
            max_frames: None,
        }
    }
}

/// Totals for a finished session.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    /// Frames grabbed from the source.
    pub frames: u64,
    /// Frames skipped because grabbing or detection failed.
    pub frame_errors: u64,
    /// Detection pipeline totals.
    pub detections: PipelineStats,
    /// Passes that ran to completion.
    pub passes: usize,
    /// Passes abandoned because the remote was unreachable.
    pub offline_passes: usize,
    /// Records pulled across all passes.
    pub pulled: usize,
    /// Records pushed across all passes.
    pub pushed: usize,
    /// Failed pushes in the most recent completed pass.
    pub pending_pushes: usize,
}

impl SessionSummary {
    fn absorb(&mut self, outcome: &PassOutcome) {
        match outcome {
            PassOutcome::Offline => self.offline_passes += 1,
            PassOutcome::Completed(ReconcileReport {
                pulled,
                pushed,
                push_failed,
                ..
            }) => {
                self.passes += 1;
                self.pulled += pulled;
                self.pushed += pushed.len();
                self.pending_pushes = push_failed.len();
            }
        }
    }
}

/// Owns the frame source, detector, and GPS for the lifetime of a run.
pub struct Session<S, D, P, R> {
    frames: S,
    detector: D,
    pipeline: DetectionPipeline<P>,
    reconciler: Option<Reconciler<R>>,
    options: SessionOptions,
    stop: Arc<AtomicBool>,
}

impl<S, D, P, R> Session<S, D, P, R>
where
    S: FrameSource,
    D: Detector<Frame = S::Frame>,
    P: PositionSource,
    R: RemoteClient,
{
    /// Assemble a session. `reconciler` is `None` when running without a
    /// server.
    pub fn new(
        frames: S,
        detector: D,
        pipeline: DetectionPipeline<P>,
        reconciler: Option<Reconciler<R>>,
        options: SessionOptions,
    ) -> Self {
        Self {
            frames,
            detector,
            pipeline,
            reconciler,
            options,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned stop flag, e.g. one set from a signal
    /// handler.
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Run until the source is exhausted, the frame limit is reached, or the
    /// stop flag is raised.
    ///
    /// Only persistence failures end the session early.
    pub fn run(&mut self, store: &mut SqliteStore) -> Result<SessionSummary> {
        let mut summary = SessionSummary::default();

        self.reconcile(store, &mut summary)?;
        let mut last_sync = Instant::now();

        while !self.stop.load(Ordering::SeqCst) {
            if self
                .options
                .max_frames
                .is_some_and(|max| summary.frames >= max)
            {
                debug!("Frame limit reached");
                break;
            }

            let frame = match self.frames.grab() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Frame source exhausted");
                    break;
                }
                Err(e @ Error::FrameGrab { .. }) => {
                    warn!("Skipping frame: {e}");
                    summary.frame_errors += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            summary.frames += 1;

            match self.detector.detect(&frame) {
                Ok(detections) => {
                    self.pipeline.process_frame(store, &detections)?;
                }
                Err(e @ Error::Detection { .. }) => {
                    warn!("Detection failed on frame {}: {e}", summary.frames);
                    summary.frame_errors += 1;
                }
                Err(e) => return Err(e),
            }

            if let Some(interval) = self.options.sync_interval
                && last_sync.elapsed() >= interval
            {
                self.reconcile(store, &mut summary)?;
                last_sync = Instant::now();
            }
        }

        if self.options.sync_on_exit {
            self.reconcile(store, &mut summary)?;
        }

        summary.detections = self.pipeline.stats();
        Ok(summary)
    }

    fn reconcile(&self, store: &mut SqliteStore, summary: &mut SessionSummary) -> Result<()> {
        if let Some(reconciler) = &self.reconciler {
            let outcome = reconciler.run(store)?;
            summary.absorb(&outcome);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gps::FixedPosition;
    use crate::pipeline::{JsonLinesFeed, PrecomputedDetector, RawDetection};
    use crate::remote::RemoteRecord;
    use crate::store::DetectionRecord;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::io::Cursor;

    struct ScriptedFrames(VecDeque<Result<Vec<RawDetection>>>);

    impl FrameSource for ScriptedFrames {
        type Frame = Vec<RawDetection>;

        fn grab(&mut self) -> Result<Option<Self::Frame>> {
            self.0.pop_front().transpose()
        }
    }

    #[derive(Default)]
    struct CountingRemote {
        fetches: Cell<usize>,
        pushed: RefCell<Vec<String>>,
    }

    impl RemoteClient for CountingRemote {
        fn fetch_all(&self) -> Result<Vec<RemoteRecord>> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(Vec::new())
        }

        fn push(&self, record: &DetectionRecord) -> Result<()> {
            self.pushed.borrow_mut().push(record.class_label.clone());
            Ok(())
        }
    }

    fn frames(items: Vec<Result<Vec<RawDetection>>>) -> ScriptedFrames {
        ScriptedFrames(items.into())
    }

    #[test]
    fn test_syncs_at_start_and_exit() {
        let remote = CountingRemote::default();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut session = Session::new(
            frames(vec![
                Ok(vec![RawDetection::new("deer", 0.9)]),
                Ok(vec![RawDetection::new("fox", 0.2)]),
            ]),
            PrecomputedDetector,
            DetectionPipeline::new(FixedPosition::new(1.0, 2.0), 0.6),
            Some(Reconciler::new(&remote)),
            SessionOptions::default(),
        );

        let summary = session.run(&mut store).unwrap();

        assert_eq!(remote.fetches.get(), 2);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.pushed, 1);
        assert_eq!(summary.detections.recorded, 1);
        assert_eq!(*remote.pushed.borrow(), vec!["deer".to_string()]);
    }

    #[test]
    fn test_bad_frames_are_skipped() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut session: Session<_, _, _, CountingRemote> = Session::new(
            frames(vec![
                Err(Error::FrameGrab {
                    reason: "sensor timeout".to_string(),
                }),
                Ok(vec![RawDetection::new("deer", 0.9)]),
            ]),
            PrecomputedDetector,
            DetectionPipeline::new(FixedPosition::new(1.0, 2.0), 0.6),
            None,
            SessionOptions::default(),
        );

        let summary = session.run(&mut store).unwrap();

        assert_eq!(summary.frame_errors, 1);
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.passes, 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_interval_sync_between_frames() {
        let remote = CountingRemote::default();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut session = Session::new(
            frames(vec![Ok(Vec::new()), Ok(Vec::new()), Ok(Vec::new())]),
            PrecomputedDetector,
            DetectionPipeline::new(FixedPosition::new(1.0, 2.0), 0.6),
            Some(Reconciler::new(&remote)),
            SessionOptions {
                sync_interval: Some(Duration::ZERO),
                sync_on_exit: false,
                max_frames: None,
            },
        );

        session.run(&mut store).unwrap();

        // Startup pass plus one after each frame.
        assert_eq!(remote.fetches.get(), 4);
    }

    #[test]
    fn test_undecodable_feed_line_does_not_end_the_session() {
        let remote = CountingRemote::default();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut input = b"{\"class\":\"deer\",\"confidence\":0.9}\n".to_vec();
        input.extend_from_slice(b"\xff\xfe garbage\n");
        input.extend_from_slice(b"{\"class\":\"fox\",\"confidence\":0.8}\n");
        let mut session = Session::new(
            JsonLinesFeed::from_reader(Cursor::new(input)),
            PrecomputedDetector,
            DetectionPipeline::new(FixedPosition::new(1.0, 2.0), 0.6),
            Some(Reconciler::new(&remote)),
            SessionOptions::default(),
        );

        let summary = session.run(&mut store).unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.frame_errors, 1);
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(remote.fetches.get(), 2);
        assert_eq!(*remote.pushed.borrow(), vec!["deer".to_string(), "fox".to_string()]);
    }

    #[test]
    fn test_stops_on_frame_limit_and_flag() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut session: Session<_, _, _, CountingRemote> = Session::new(
            frames(vec![Ok(Vec::new()), Ok(Vec::new()), Ok(Vec::new())]),
            PrecomputedDetector,
            DetectionPipeline::new(FixedPosition::new(1.0, 2.0), 0.6),
            None,
            SessionOptions {
                max_frames: Some(2),
                ..SessionOptions::default()
            },
        )
        .with_stop_flag(Arc::clone(&stop));
        assert_eq!(session.run(&mut store).unwrap().frames, 2);

        stop.store(true, Ordering::SeqCst);
        assert_eq!(session.run(&mut store).unwrap().frames, 0);
    }
}
