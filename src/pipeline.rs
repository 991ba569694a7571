//! Frame pipeline.
//!
//! `FramePipeline::on_frame_available` carries one frame through:
//!
//! 1. Configuration guard (frames before `on_stream_configured` are ignored)
//! 2. Pull the latest frame from the source
//! 3. Single-flight admission through the `FrameGate`
//! 4. Copy planes into reusable scratch buffers
//! 5. YUV420 to ARGB conversion into the reusable pixel buffer
//! 6. Classification
//! 7. Publish non-empty results to the sink
//! 8. Release the frame and reopen the gate (every path)
//!
//! Failures in steps 4-6 are contained: logged, counted, and the next frame is
//! processed normally. Only classifier start-up failure is fatal.

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::classify::Classifier;
use crate::convert::{yuv420_to_argb, Yuv420Layout};
use crate::frame::{PixelBuffer, PlanarFrame, ScratchPlanes};
use crate::gate::{Admission, FrameGate, GateState};
use crate::ingest::FrameSource;
use crate::orientation::{self, Rotation};
use crate::sink::ResultSink;

/// Session geometry fixed by stream configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamGeometry {
    pub width: u32,
    pub height: u32,
    /// Sensor rotation relative to the screen, resolved once per session.
    pub rotation: Rotation,
}

/// What happened to one `on_frame_available` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Stream not configured yet; the source was not touched.
    NotConfigured,
    /// The source had no frame.
    NoFrame,
    /// Another frame was in flight; this one was released unprocessed.
    Dropped,
    /// Results were published to the sink.
    Published(usize),
    /// Classification succeeded with an empty list; nothing published.
    NoResults,
    /// Conversion or classification failed; nothing published.
    Failed,
}

/// Counter snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub admitted: u64,
    pub dropped: u64,
    pub published: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    admitted: AtomicU64,
    dropped: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Buffers reused across frames, owned by the pipeline and never shared.
#[derive(Debug, Default)]
pub struct PipelineResources {
    pub scratch: ScratchPlanes,
    pub pixels: PixelBuffer,
}

impl PipelineResources {
    pub fn new() -> Self {
        Self::default()
    }
}

struct Stage {
    resources: PipelineResources,
    classifier: Box<dyn Classifier>,
}

pub struct FramePipeline {
    gate: FrameGate,
    geometry: RwLock<Option<StreamGeometry>>,
    stage: Mutex<Stage>,
    sink: Arc<dyn ResultSink>,
    stats: StatsCounters,
}

impl FramePipeline {
    /// Build a pipeline around a constructed classifier.
    ///
    /// Runs the classifier's warm-up. Failure here is fatal: no frame is ever
    /// classified by a pipeline that did not start.
    pub fn new(mut classifier: Box<dyn Classifier>, sink: Arc<dyn ResultSink>) -> Result<Self> {
        classifier
            .warm_up()
            .with_context(|| format!("classifier '{}' failed to start", classifier.name()))?;
        log::info!(
            "pipeline ready: classifier={} input={}x{}",
            classifier.name(),
            classifier.input_size(),
            classifier.input_size()
        );
        Ok(Self {
            gate: FrameGate::new(),
            geometry: RwLock::new(None),
            stage: Mutex::new(Stage {
                resources: PipelineResources::new(),
                classifier,
            }),
            sink,
            stats: StatsCounters::default(),
        })
    }

    /// Fix frame dimensions and orientation for the session.
    ///
    /// Must precede frame delivery. Reconfiguring with new dimensions
    /// reallocates the pixel buffer; it waits for an in-flight frame to finish.
    pub fn on_stream_configured(
        &self,
        width: u32,
        height: u32,
        sensor_orientation: i32,
        screen_rotation: i32,
    ) -> Result<StreamGeometry> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "stream dimensions must be non-zero, got {}x{}",
                width,
                height
            ));
        }
        let geometry = StreamGeometry {
            width,
            height,
            rotation: orientation::resolve(screen_rotation, sensor_orientation),
        };

        {
            let mut stage = self.lock_stage();
            stage
                .resources
                .pixels
                .ensure_dimensions(width, height)
                .context("failed to allocate pixel buffer")?;
        }
        *self
            .geometry
            .write()
            .map_err(|_| anyhow!("stream geometry lock poisoned"))? = Some(geometry);

        log::info!(
            "stream configured: {}x{} sensor={} screen={} rotation={}",
            width,
            height,
            sensor_orientation,
            screen_rotation,
            geometry.rotation
        );
        Ok(geometry)
    }

    pub fn geometry(&self) -> Option<StreamGeometry> {
        match self.geometry.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Process the latest frame from `source`, or drop it if busy.
    pub fn on_frame_available<S: FrameSource + ?Sized>(&self, source: &mut S) -> FrameOutcome {
        let Some(geometry) = self.geometry() else {
            return FrameOutcome::NotConfigured;
        };
        let Some(frame) = source.latest_frame() else {
            return FrameOutcome::NoFrame;
        };

        let admitted = match self.gate.admit(frame) {
            Admission::Admitted(admitted) => admitted,
            Admission::Rejected => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return FrameOutcome::Dropped;
            }
        };
        self.stats.admitted.fetch_add(1, Ordering::Relaxed);
        let sequence = admitted.sequence();

        let result = {
            let mut stage = self.lock_stage();
            let Stage {
                resources,
                classifier,
            } = &mut *stage;
            process_frame(
                resources,
                classifier.as_mut(),
                self.sink.as_ref(),
                admitted.frame(),
                &geometry,
            )
        };
        admitted.finish();

        match result {
            Ok(0) => FrameOutcome::NoResults,
            Ok(count) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                FrameOutcome::Published(count)
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                log::warn!("frame {} skipped: {:#}", sequence, e);
                FrameOutcome::Failed
            }
        }
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.snapshot()
    }

    /// Stop the pipeline and free its buffers.
    ///
    /// Takes the pipeline by value: an admitted frame borrows the pipeline, so
    /// none can still be in flight once this is callable.
    pub fn shutdown(self) -> PipelineStats {
        debug_assert_eq!(self.gate.state(), GateState::Idle);
        let stats = self.stats.snapshot();
        log::info!(
            "pipeline stopped: admitted={} dropped={} published={} failed={}",
            stats.admitted,
            stats.dropped,
            stats.published,
            stats.failed
        );
        stats
    }

    // Poisoned only by a classifier panic. Stage buffers are fully rewritten per frame.
    fn lock_stage(&self) -> std::sync::MutexGuard<'_, Stage> {
        match self.stage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Steps 4-7 for one admitted frame. Returns the number of results published.
fn process_frame(
    resources: &mut PipelineResources,
    classifier: &mut dyn Classifier,
    sink: &dyn ResultSink,
    frame: &PlanarFrame,
    geometry: &StreamGeometry,
) -> Result<usize> {
    let allocated = resources.scratch.fill_from(frame);
    if allocated > 0 {
        log::debug!(
            "scratch planes (re)allocated for frame {}: {:?}",
            frame.sequence(),
            resources.scratch.capacities()
        );
    }

    let layout = Yuv420Layout {
        width: geometry.width,
        height: geometry.height,
        y_row_stride: frame.y_plane().row_stride,
        uv_row_stride: frame.u_plane().row_stride,
        uv_pixel_stride: frame.u_plane().pixel_stride,
    };
    resources
        .pixels
        .ensure_dimensions(geometry.width, geometry.height)?;
    let scratch = &resources.scratch;
    yuv420_to_argb(
        scratch.y(),
        scratch.u(),
        scratch.v(),
        &layout,
        resources.pixels.as_mut_slice(),
    )?;

    let results = classifier.classify(
        resources.pixels.as_slice(),
        geometry.width,
        geometry.height,
    )?;
    if results.is_empty() {
        return Ok(0);
    }
    sink.publish(&results);
    Ok(results.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Recognition, StubClassifier};
    use crate::frame::Plane;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Vec<Recognition>>>);

    impl ResultSink for Collect {
        fn publish(&self, results: &[Recognition]) {
            self.0.lock().expect("collect lock").push(results.to_vec());
        }
    }

    struct OneShot(Option<PlanarFrame>);

    impl FrameSource for OneShot {
        fn latest_frame(&mut self) -> Option<PlanarFrame> {
            self.0.take()
        }
    }

    fn gray_frame(width: u32, height: u32) -> PlanarFrame {
        let (w, h) = (width as usize, height as usize);
        PlanarFrame::new(
            1,
            width,
            height,
            Plane::new(vec![128; w * h], w, 1),
            Plane::new(vec![128; (w / 2) * (h / 2)], w / 2, 1),
            Plane::new(vec![128; (w / 2) * (h / 2)], w / 2, 1),
        )
    }

    fn pipeline(sink: Arc<Collect>) -> FramePipeline {
        let classifier = StubClassifier::new(4).expect("stub classifier");
        FramePipeline::new(Box::new(classifier), sink).expect("pipeline")
    }

    #[test]
    fn ignores_frames_before_configuration() {
        let sink = Arc::new(Collect::default());
        let pipeline = pipeline(Arc::clone(&sink));
        let mut source = OneShot(Some(gray_frame(4, 4)));

        assert_eq!(pipeline.on_frame_available(&mut source), FrameOutcome::NotConfigured);
        assert!(source.0.is_some(), "source must not be consumed");
        assert_eq!(pipeline.stats(), PipelineStats::default());
    }

    #[test]
    fn processes_configured_frame_and_reuses_buffers() -> Result<()> {
        let sink = Arc::new(Collect::default());
        let pipeline = pipeline(Arc::clone(&sink));
        let geometry = pipeline.on_stream_configured(4, 4, 90, 0)?;
        assert_eq!(geometry.rotation, Rotation::Deg90);

        let outcome = pipeline.on_frame_available(&mut OneShot(Some(gray_frame(4, 4))));
        assert_eq!(outcome, FrameOutcome::Published(4));
        assert_eq!(
            pipeline.on_frame_available(&mut OneShot(None)),
            FrameOutcome::NoFrame
        );
        assert_eq!(pipeline.gate_state(), GateState::Idle);
        assert_eq!(sink.0.lock().expect("collect lock").len(), 1);

        let stats = pipeline.shutdown();
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.published, 1);
        Ok(())
    }

    #[test]
    fn rejects_zero_dimensions() {
        let pipeline = pipeline(Arc::new(Collect::default()));
        assert!(pipeline.on_stream_configured(0, 480, 0, 0).is_err());
        assert!(pipeline.geometry().is_none());
    }

    #[test]
    fn undersized_frame_fails_without_publishing() -> Result<()> {
        let sink = Arc::new(Collect::default());
        let pipeline = pipeline(Arc::clone(&sink));
        pipeline.on_stream_configured(8, 8, 0, 0)?;

        let outcome = pipeline.on_frame_available(&mut OneShot(Some(gray_frame(4, 4))));
        assert_eq!(outcome, FrameOutcome::Failed);
        assert!(sink.0.lock().expect("collect lock").is_empty());
        assert_eq!(pipeline.gate_state(), GateState::Idle);
        assert_eq!(pipeline.stats().failed, 1);
        Ok(())
    }
}
