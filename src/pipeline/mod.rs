//! Detection pipeline and session loop.

mod coordinator;
mod feed;
mod processor;
mod source;

pub use coordinator::{Session, SessionOptions, SessionSummary};
pub use feed::{JsonLinesFeed, PrecomputedDetector};
pub use processor::{DetectionOutcome, DetectionPipeline, PipelineStats};
pub use source::{Detector, FrameSource, RawDetection};
