//! Live classification frame pipeline.
//!
//! Takes planar YUV420 sensor frames, converts them to packed ARGB, and runs an
//! image classifier on them at whatever rate the classifier sustains. Frames
//! that arrive while one is already in flight are dropped, never queued.
//!
//! # Module Structure
//!
//! - `frame`: PlanarFrame (release-once), PixelBuffer, ScratchPlanes
//! - `convert`: strided YUV420 to ARGB conversion
//! - `orientation`: sensor/screen relative rotation
//! - `gate`: single-flight backpressure gate
//! - `pipeline`: FramePipeline orchestration
//! - `classify`: Classifier boundary and the stub backend
//! - `sink`: ResultSink boundary
//! - `ingest`: FrameSource boundary and the synthetic source
//! - `config`: classifyd configuration

pub mod classify;
pub mod config;
pub mod convert;
pub mod frame;
pub mod gate;
pub mod ingest;
pub mod orientation;
pub mod pipeline;
pub mod sink;

pub use classify::{
    format_recognitions, ClassificationError, ClassificationErrorKind, Classifier, Recognition,
    StubClassifier,
};
pub use convert::{yuv420_to_argb, ConversionError, Yuv420Layout};
pub use frame::{PixelBuffer, PlanarFrame, Plane, ScratchPlanes};
pub use gate::{Admission, AdmittedFrame, FrameGate, GateState};
pub use ingest::{FrameSource, SourceConfig, SyntheticSource};
pub use orientation::{resolve as resolve_orientation, Rotation};
pub use pipeline::{
    FrameOutcome, FramePipeline, PipelineResources, PipelineStats, StreamGeometry,
};
pub use sink::{LatestResults, LatestSink, ResultSink};
