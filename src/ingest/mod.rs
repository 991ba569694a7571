//! Frame sources.
//!
//! A source delivers `PlanarFrame`s through a pull-style "latest available"
//! accessor. Camera devices themselves are opened and configured by the host
//! platform; this crate only ships a synthetic `stub://` source for tests and
//! demos.
//!
//! Every frame a source hands out carries a release hook. The source learns
//! that a frame came back exactly once, whether it was processed or dropped.

pub mod synthetic;

pub use synthetic::{ChromaLayout, Scene, SourceConfig, SourceStats, SyntheticSource};

use crate::frame::PlanarFrame;

pub trait FrameSource {
    /// Newest frame available, if any.
    ///
    /// A source that buffers frames must release the ones it skips over before
    /// returning the newest. `SyntheticSource` renders on demand and never has
    /// a backlog.
    fn latest_frame(&mut self) -> Option<PlanarFrame>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn latest_frame(&mut self) -> Option<PlanarFrame> {
        (**self).latest_frame()
    }
}
