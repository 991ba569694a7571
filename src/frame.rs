//! Frame and buffer types.
//!
//! - `PlanarFrame`: one YUV420 sensor frame, borrowed from a frame source for a
//!   single processing cycle. Carries the source's release hook.
//! - `PixelBuffer`: packed ARGB output, reused across frames of the same size.
//! - `ScratchPlanes`: reusable copies of the three planes.
//!
//! A `PlanarFrame` is released exactly once. `release()` consumes the frame, and
//! a frame that is dropped without an explicit release runs its hook from `Drop`.

use anyhow::{anyhow, Result};
use std::fmt;

/// Callback run when a frame is handed back to its source. Receives the frame sequence.
pub type ReleaseHook = Box<dyn FnOnce(u64) + Send>;

/// One image plane: raw bytes plus the strides needed to address them.
#[derive(Clone, Debug, Default)]
pub struct Plane {
    data: Vec<u8>,
    /// Bytes between the starts of consecutive rows.
    pub row_stride: usize,
    /// Bytes between consecutive samples within a row.
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reported capacity of the plane buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ----------------------------------------------------------------------------
// PlanarFrame
// ----------------------------------------------------------------------------

/// A planar YUV420 frame owned by its source until released.
///
/// Not `Clone`: a second handle to the same frame would make exactly-once
/// release impossible to reason about.
pub struct PlanarFrame {
    planes: [Plane; 3],
    /// Logical image width in pixels.
    pub width: u32,
    /// Logical image height in pixels.
    pub height: u32,
    sequence: u64,
    release: Option<ReleaseHook>,
}

impl PlanarFrame {
    pub fn new(sequence: u64, width: u32, height: u32, y: Plane, u: Plane, v: Plane) -> Self {
        Self {
            planes: [y, u, v],
            width,
            height,
            sequence,
            release: None,
        }
    }

    /// Attach the hook the source wants run when the frame is released.
    pub fn with_release_hook<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.release = Some(Box::new(hook));
        self
    }

    /// Source-assigned identity, used for release bookkeeping and logs.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn y_plane(&self) -> &Plane {
        &self.planes[0]
    }

    pub fn u_plane(&self) -> &Plane {
        &self.planes[1]
    }

    pub fn v_plane(&self) -> &Plane {
        &self.planes[2]
    }

    pub fn planes(&self) -> &[Plane; 3] {
        &self.planes
    }

    /// Hand the frame back to its source.
    pub fn release(mut self) {
        self.run_release_hook();
    }

    /// Run the release hook now, leaving an inert frame behind. Used by
    /// owners that cannot move the frame out, such as the gate's guard.
    pub(crate) fn run_release_hook(&mut self) {
        if let Some(hook) = self.release.take() {
            hook(self.sequence);
        }
    }
}

impl Drop for PlanarFrame {
    fn drop(&mut self) {
        self.run_release_hook();
    }
}

impl fmt::Debug for PlanarFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanarFrame")
            .field("sequence", &self.sequence)
            .field("width", &self.width)
            .field("height", &self.height)
            .field(
                "plane_lens",
                &[self.planes[0].len(), self.planes[1].len(), self.planes[2].len()],
            )
            .field("released", &self.release.is_none())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// PixelBuffer
// ----------------------------------------------------------------------------

/// Packed `0xAARRGGBB` pixels, row-major, no padding.
#[derive(Clone, Debug, Default)]
pub struct PixelBuffer {
    pixels: Vec<u32>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize for `width x height`. Returns true when the buffer was reallocated.
    ///
    /// Same dimensions reuse the existing allocation untouched.
    pub fn ensure_dimensions(&mut self, width: u32, height: u32) -> Result<bool> {
        if width == self.width && height == self.height && !self.pixels.is_empty() {
            return Ok(false);
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("pixel buffer dimensions overflow: {}x{}", width, height))?;
        self.pixels = vec![0u32; len];
        self.width = width;
        self.height = height;
        Ok(true)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.pixels
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn pixel_at(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

// ----------------------------------------------------------------------------
// ScratchPlanes
// ----------------------------------------------------------------------------

/// Reusable copies of a frame's three planes.
///
/// Plane capacity is only known once a frame arrives, so each buffer is sized
/// on first sight and grown if a later frame reports a larger plane.
#[derive(Debug, Default)]
pub struct ScratchPlanes {
    buffers: [Vec<u8>; 3],
    filled: [usize; 3],
}

impl ScratchPlanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy all three planes out of `frame`. Returns how many buffers were (re)allocated.
    pub fn fill_from(&mut self, frame: &PlanarFrame) -> usize {
        let mut allocations = 0;
        for ((buffer, filled), plane) in self
            .buffers
            .iter_mut()
            .zip(self.filled.iter_mut())
            .zip(frame.planes())
        {
            let src = plane.bytes();
            if buffer.len() < src.len() {
                *buffer = vec![0u8; src.len()];
                allocations += 1;
            }
            buffer[..src.len()].copy_from_slice(src);
            *filled = src.len();
        }
        allocations
    }

    pub fn y(&self) -> &[u8] {
        &self.buffers[0][..self.filled[0]]
    }

    pub fn u(&self) -> &[u8] {
        &self.buffers[1][..self.filled[1]]
    }

    pub fn v(&self) -> &[u8] {
        &self.buffers[2][..self.filled[2]]
    }

    /// Allocated capacity per plane.
    pub fn capacities(&self) -> [usize; 3] {
        [
            self.buffers[0].len(),
            self.buffers[1].len(),
            self.buffers[2].len(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn frame_with_counter(counter: &Arc<AtomicUsize>) -> PlanarFrame {
        let counter = Arc::clone(counter);
        PlanarFrame::new(
            7,
            2,
            2,
            Plane::new(vec![16; 4], 2, 1),
            Plane::new(vec![128; 1], 1, 1),
            Plane::new(vec![128; 1], 1, 1),
        )
        .with_release_hook(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn explicit_release_runs_hook_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        frame_with_counter(&counter).release();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_frame_is_released() {
        let counter = Arc::new(AtomicUsize::new(0));
        drop(frame_with_counter(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_hook_receives_sequence() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_hook = Arc::clone(&seen);
        let frame = PlanarFrame::new(
            42,
            1,
            1,
            Plane::default(),
            Plane::default(),
            Plane::default(),
        )
        .with_release_hook(move |seq| seen_hook.store(seq as usize, Ordering::SeqCst));
        frame.release();
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn pixel_buffer_reallocates_only_on_dimension_change() -> Result<()> {
        let mut buffer = PixelBuffer::new();
        assert!(buffer.ensure_dimensions(4, 2)?);
        assert_eq!(buffer.len(), 8);
        assert!(!buffer.ensure_dimensions(4, 2)?);
        assert!(buffer.ensure_dimensions(2, 2)?);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.pixel_at(2, 0), None);
        Ok(())
    }

    #[test]
    fn scratch_planes_allocate_lazily_and_grow() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scratch = ScratchPlanes::new();
        let frame = frame_with_counter(&counter);

        assert_eq!(scratch.fill_from(&frame), 3);
        assert_eq!(scratch.fill_from(&frame), 0);
        assert_eq!(scratch.y(), &[16, 16, 16, 16]);
        assert_eq!(scratch.capacities(), [4, 1, 1]);

        let bigger = PlanarFrame::new(
            8,
            2,
            2,
            Plane::new(vec![20; 8], 4, 1),
            Plane::new(vec![100; 1], 1, 1),
            Plane::new(vec![140; 1], 1, 1),
        );
        assert_eq!(scratch.fill_from(&bigger), 1);
        assert_eq!(scratch.y().len(), 8);
        assert_eq!(scratch.v(), &[140]);
    }
}
