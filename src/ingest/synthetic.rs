//! Synthetic frame source (`stub://`).
//!
//! Produces YUV420 frames with padded rows and either planar or interleaved
//! chroma, so the conversion path sees the same stride shapes a real sensor
//! delivers. Release accounting lets tests check that every frame handed out
//! came back exactly once.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::FrameSource;
use crate::convert::Yuv420Layout;
use crate::frame::{PlanarFrame, Plane};

/// How chroma samples are laid out in the U and V planes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChromaLayout {
    /// Separate U and V planes, pixel stride 1 (I420).
    #[default]
    Planar,
    /// One interleaved UV buffer viewed as two planes, pixel stride 2 (NV12).
    SemiPlanar,
}

/// What the synthetic camera is looking at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scene {
    /// Diagonal luma ramp with slowly drifting chroma; changes every frame.
    #[default]
    Gradient,
    /// Every sample fixed.
    Uniform { y: u8, u: u8, v: u8 },
}

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Source URL. Only `stub://` is built in.
    pub url: String,
    /// Target frame rate (frames per second). Paces the daemon's producer
    /// loop; the source itself renders a frame whenever one is asked for.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    /// Extra bytes at the end of every luma row (chroma rows get half for planar).
    pub row_padding: usize,
    pub chroma: ChromaLayout,
    pub scene: Scene,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
            row_padding: 32,
            chroma: ChromaLayout::default(),
            scene: Scene::default(),
        }
    }
}

/// Statistics for a synthetic source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub frames_released: u64,
    pub url: String,
}

pub struct SyntheticSource {
    config: SourceConfig,
    layout: Yuv420Layout,
    frame_count: u64,
    released: Arc<AtomicU64>,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            bail!(
                "unsupported frame source {}: camera devices are opened by the host platform, \
                 only stub:// sources are built in",
                config.url
            );
        }
        if config.width == 0 || config.height == 0 {
            bail!(
                "synthetic source needs non-zero dimensions, got {}x{}",
                config.width,
                config.height
            );
        }
        let layout = layout_for(&config);
        Ok(Self {
            config,
            layout,
            frame_count: 0,
            released: Arc::new(AtomicU64::new(0)),
            connected: false,
        })
    }

    /// Synthetic sources are always reachable.
    pub fn connect(&mut self) -> Result<()> {
        log::info!("SyntheticSource: connected to {} (synthetic)", self.config.url);
        self.connected = true;
        Ok(())
    }

    /// Stride geometry of the frames this source produces.
    pub fn layout(&self) -> Yuv420Layout {
        self.layout
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Capture the next frame.
    pub fn next_frame(&mut self) -> PlanarFrame {
        self.frame_count += 1;
        let sequence = self.frame_count;
        let (y, u, v) = self.render_planes();
        let released = Arc::clone(&self.released);
        PlanarFrame::new(sequence, self.config.width, self.config.height, y, u, v)
            .with_release_hook(move |_| {
                released.fetch_add(1, Ordering::SeqCst);
            })
    }

    pub fn is_healthy(&self) -> bool {
        self.connected
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_released: self.released.load(Ordering::SeqCst),
            url: self.config.url.clone(),
        }
    }

    fn render_planes(&self) -> (Plane, Plane, Plane) {
        let layout = &self.layout;
        let w = layout.width as usize;
        let h = layout.height as usize;
        let (cw, ch) = layout.chroma_dimensions();
        let t = self.frame_count as usize;

        let mut y_plane = vec![0u8; layout.y_row_stride * h];
        for (row, line) in y_plane.chunks_exact_mut(layout.y_row_stride).enumerate() {
            for (col, sample) in line[..w].iter_mut().enumerate() {
                *sample = match self.config.scene {
                    Scene::Gradient => ((col + 2 * row + 4 * t) % 256) as u8,
                    Scene::Uniform { y, .. } => y,
                };
            }
        }

        let chroma_at = |col: usize, row: usize| -> (u8, u8) {
            match self.config.scene {
                Scene::Gradient => (
                    (96 + (col + t) % 64) as u8,
                    (96 + (row + t) % 64) as u8,
                ),
                Scene::Uniform { u, v, .. } => (u, v),
            }
        };

        let stride = layout.uv_row_stride;
        let y = Plane::new(y_plane, layout.y_row_stride, 1);
        match self.config.chroma {
            ChromaLayout::Planar => {
                let mut u_plane = vec![0u8; stride * ch];
                let mut v_plane = vec![0u8; stride * ch];
                for row in 0..ch {
                    for col in 0..cw {
                        let (u, v) = chroma_at(col, row);
                        u_plane[row * stride + col] = u;
                        v_plane[row * stride + col] = v;
                    }
                }
                (y, Plane::new(u_plane, stride, 1), Plane::new(v_plane, stride, 1))
            }
            ChromaLayout::SemiPlanar => {
                let mut interleaved = vec![0u8; stride * ch];
                for row in 0..ch {
                    for col in 0..cw {
                        let (u, v) = chroma_at(col, row);
                        interleaved[row * stride + 2 * col] = u;
                        interleaved[row * stride + 2 * col + 1] = v;
                    }
                }
                // V is the same buffer seen one byte later, as sensors expose NV12.
                let v_plane = interleaved[1..].to_vec();
                (
                    y,
                    Plane::new(interleaved, stride, 2),
                    Plane::new(v_plane, stride, 2),
                )
            }
        }
    }
}

impl FrameSource for SyntheticSource {
    fn latest_frame(&mut self) -> Option<PlanarFrame> {
        if !self.connected {
            return None;
        }
        Some(self.next_frame())
    }
}

fn layout_for(config: &SourceConfig) -> Yuv420Layout {
    let packed = Yuv420Layout::packed(config.width, config.height);
    let (chroma_cols, _) = packed.chroma_dimensions();
    let (uv_row_stride, uv_pixel_stride) = match config.chroma {
        ChromaLayout::Planar => (chroma_cols + config.row_padding / 2, 1),
        ChromaLayout::SemiPlanar => (2 * chroma_cols + config.row_padding, 2),
    };
    Yuv420Layout {
        y_row_stride: config.width as usize + config.row_padding,
        uv_row_stride,
        uv_pixel_stride,
        ..packed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(config: SourceConfig) -> SyntheticSource {
        let mut source = SyntheticSource::new(config).expect("stub source");
        source.connect().expect("connect");
        source
    }

    #[test]
    fn rejects_non_stub_urls() {
        let config = SourceConfig {
            url: "rtsp://camera".to_string(),
            ..SourceConfig::default()
        };
        assert!(SyntheticSource::new(config).is_err());
    }

    #[test]
    fn no_frames_before_connect() {
        let mut source = SyntheticSource::new(SourceConfig::default()).expect("stub source");
        assert!(source.latest_frame().is_none());
        assert!(!source.is_healthy());
    }

    #[test]
    fn padded_planar_frame_matches_layout() {
        let mut source = source(SourceConfig {
            width: 8,
            height: 6,
            row_padding: 4,
            ..SourceConfig::default()
        });
        let layout = source.layout();
        assert_eq!(layout.y_row_stride, 12);
        assert_eq!(layout.uv_row_stride, 6);

        let frame = source.latest_frame().expect("frame");
        assert_eq!(frame.y_plane().len(), 12 * 6);
        assert_eq!(frame.u_plane().len(), 6 * 3);
        assert_eq!(frame.u_plane().pixel_stride, 1);
        // Padding stays zero; content does not depend on it.
        assert_eq!(frame.y_plane().bytes()[8..12], [0, 0, 0, 0]);
    }

    #[test]
    fn semi_planar_views_share_one_buffer() {
        let mut source = source(SourceConfig {
            width: 4,
            height: 2,
            row_padding: 0,
            chroma: ChromaLayout::SemiPlanar,
            scene: Scene::Uniform {
                y: 10,
                u: 20,
                v: 30,
            },
            ..SourceConfig::default()
        });
        let frame = source.latest_frame().expect("frame");
        assert_eq!(frame.u_plane().bytes(), &[20, 30, 20, 30]);
        assert_eq!(frame.v_plane().bytes(), &[30, 20, 30]);
        assert_eq!(frame.v_plane().pixel_stride, 2);
    }

    #[test]
    fn renders_one_frame_per_request_without_backlog() {
        let mut source = source(SourceConfig {
            width: 2,
            height: 2,
            target_fps: 1,
            ..SourceConfig::default()
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        let sequences: Vec<u64> = (0..3)
            .map(|_| source.latest_frame().expect("frame").sequence())
            .collect();
        assert_eq!(sequences, [1, 2, 3]);
        let stats = source.stats();
        assert_eq!(stats.frames_captured, 3);
        assert_eq!(stats.frames_released, 3);
    }

    #[test]
    fn counts_releases() {
        let mut source = source(SourceConfig {
            width: 2,
            height: 2,
            ..SourceConfig::default()
        });
        let a = source.latest_frame().expect("frame");
        let b = source.latest_frame().expect("frame");
        assert_eq!(b.sequence(), 2);
        a.release();
        drop(b);
        let stats = source.stats();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.frames_released, 2);
    }
}
