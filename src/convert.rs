//! Planar YUV420 to packed ARGB conversion.
//!
//! Every plane is addressed through its own row stride, and chroma through its
//! pixel stride, so padded rows and interleaved (semi-planar) chroma layouts
//! convert the same way as tightly packed I420.
//!
//! Arithmetic is `f32` BT.601 with round-to-nearest before clamping.

use std::fmt;

/// Geometry of a YUV420 frame as delivered by the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Yuv420Layout {
    pub width: u32,
    pub height: u32,
    pub y_row_stride: usize,
    pub uv_row_stride: usize,
    pub uv_pixel_stride: usize,
}

impl Yuv420Layout {
    /// Tightly packed I420: no row padding, planar chroma.
    pub fn packed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            y_row_stride: width as usize,
            uv_row_stride: chroma_extent(width as usize),
            uv_pixel_stride: 1,
        }
    }

    /// Chroma grid size. Odd dimensions truncate; never smaller than 1x1.
    pub fn chroma_dimensions(&self) -> (usize, usize) {
        (
            chroma_extent(self.width as usize),
            chroma_extent(self.height as usize),
        )
    }

    fn validate(
        &self,
        y_len: usize,
        u_len: usize,
        v_len: usize,
        out_len: usize,
    ) -> Result<(), ConversionError> {
        let w = self.width as usize;
        let h = self.height as usize;
        if w == 0 || h == 0 {
            return Err(ConversionError::new(format!(
                "frame dimensions must be non-zero, got {}x{}",
                w, h
            )));
        }
        if self.uv_pixel_stride == 0 {
            return Err(ConversionError::new("chroma pixel stride must be non-zero"));
        }
        if self.y_row_stride < w {
            return Err(ConversionError::new(format!(
                "luma row stride {} is smaller than width {}",
                self.y_row_stride, w
            )));
        }

        let (chroma_cols, chroma_rows) = self.chroma_dimensions();
        let chroma_row_span = (chroma_cols - 1)
            .checked_mul(self.uv_pixel_stride)
            .and_then(|v| v.checked_add(1))
            .ok_or_else(|| ConversionError::new("chroma row span overflows"))?;
        if self.uv_row_stride < chroma_row_span {
            return Err(ConversionError::new(format!(
                "chroma row stride {} cannot hold {} samples at pixel stride {}",
                self.uv_row_stride, chroma_cols, self.uv_pixel_stride
            )));
        }

        let y_needed = (h - 1)
            .checked_mul(self.y_row_stride)
            .and_then(|v| v.checked_add(w))
            .ok_or_else(|| ConversionError::new("luma plane extent overflows"))?;
        if y_len < y_needed {
            return Err(ConversionError::new(format!(
                "luma plane too short: need {} bytes, have {}",
                y_needed, y_len
            )));
        }

        let uv_needed = (chroma_rows - 1)
            .checked_mul(self.uv_row_stride)
            .and_then(|v| v.checked_add(chroma_row_span))
            .ok_or_else(|| ConversionError::new("chroma plane extent overflows"))?;
        for (name, len) in [("u", u_len), ("v", v_len)] {
            if len < uv_needed {
                return Err(ConversionError::new(format!(
                    "{} plane too short: need {} bytes, have {}",
                    name, uv_needed, len
                )));
            }
        }

        let pixels = w
            .checked_mul(h)
            .ok_or_else(|| ConversionError::new("frame dimensions overflow"))?;
        if out_len != pixels {
            return Err(ConversionError::new(format!(
                "output buffer holds {} pixels, frame has {}",
                out_len, pixels
            )));
        }
        Ok(())
    }
}

/// Conversion refused because planes or output do not match the declared layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionError {
    pub reason: String,
}

impl ConversionError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "yuv420 conversion failed: {}", self.reason)
    }
}

impl std::error::Error for ConversionError {}

/// Convert planar YUV420 into `out` as `0xFFRRGGBB` pixels.
///
/// `out` must hold exactly `width * height` pixels. Every output pixel is written.
pub fn yuv420_to_argb(
    y_plane: &[u8],
    u_plane: &[u8],
    v_plane: &[u8],
    layout: &Yuv420Layout,
    out: &mut [u32],
) -> Result<(), ConversionError> {
    layout.validate(y_plane.len(), u_plane.len(), v_plane.len(), out.len())?;

    let w = layout.width as usize;
    let (chroma_cols, chroma_rows) = layout.chroma_dimensions();
    let last_chroma_col = chroma_cols - 1;

    for (row, out_row) in out.chunks_exact_mut(w).enumerate() {
        let y_base = row * layout.y_row_stride;
        let uv_base = (row / 2).min(chroma_rows - 1) * layout.uv_row_stride;
        let luma_row = &y_plane[y_base..y_base + w];

        for (col, (dst, &luma)) in out_row.iter_mut().zip(luma_row).enumerate() {
            let uv = uv_base + (col / 2).min(last_chroma_col) * layout.uv_pixel_stride;
            *dst = yuv_to_argb(luma, u_plane[uv], v_plane[uv]);
        }
    }
    Ok(())
}

/// BT.601 full-range YUV to opaque ARGB.
pub fn yuv_to_argb(y: u8, u: u8, v: u8) -> u32 {
    let y = f32::from(y);
    let u = f32::from(u) - 128.0;
    let v = f32::from(v) - 128.0;

    let r = clamp_to_u8(y + 1.402_f32 * v);
    let g = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
    let b = clamp_to_u8(y + 1.772_f32 * u);

    0xFF00_0000 | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Split a packed pixel into `(a, r, g, b)`.
pub fn unpack_argb(pixel: u32) -> (u8, u8, u8, u8) {
    (
        (pixel >> 24) as u8,
        (pixel >> 16) as u8,
        (pixel >> 8) as u8,
        pixel as u8,
    )
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn chroma_extent(luma_extent: usize) -> usize {
    (luma_extent / 2).max(1)
}
