use anyhow::Result;
use std::time::Duration;

use crate::classify::backend::{ClassificationError, Classifier};
use crate::classify::result::Recognition;
use crate::convert::unpack_argb;

/// Scene labels and the mean brightness (0..=1) each one sits at.
const SCENE_LABELS: [(&str, f32); 4] = [
    ("overexposed", 0.95),
    ("daylight", 0.70),
    ("indoor", 0.40),
    ("night", 0.10),
];

/// Stub backend for testing and demos.
///
/// Resamples the live frame to its fixed square input (nearest neighbour) and
/// ranks a small set of scene labels by distance to the mean brightness.
/// Deterministic for identical input.
pub struct StubClassifier {
    input_size: u32,
    top_k: usize,
    delay: Duration,
    scaled: Vec<u32>,
}

impl StubClassifier {
    pub fn new(input_size: u32) -> Result<Self> {
        if input_size == 0 {
            return Err(ClassificationError::load("input size must be non-zero").into());
        }
        let len = (input_size as usize)
            .checked_mul(input_size as usize)
            .ok_or_else(|| ClassificationError::load("input size overflows"))?;
        Ok(Self {
            input_size,
            top_k: SCENE_LABELS.len(),
            delay: Duration::ZERO,
            scaled: vec![0; len],
        })
    }

    /// Keep only the `k` best labels.
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Sleep this long per call, to simulate a slow model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn resample(&mut self, pixels: &[u32], width: u32, height: u32) {
        let side = self.input_size as usize;
        let (w, h) = (width as usize, height as usize);
        for (dy, row) in self.scaled.chunks_exact_mut(side).enumerate() {
            let sy = dy * h / side;
            for (dx, dst) in row.iter_mut().enumerate() {
                let sx = dx * w / side;
                *dst = pixels[sy * w + sx];
            }
        }
    }

    fn mean_brightness(&self) -> f32 {
        let total: u64 = self
            .scaled
            .iter()
            .map(|&p| {
                let (_, r, g, b) = unpack_argb(p);
                // BT.601 luma weights in 8.8 fixed point.
                u64::from((77 * u32::from(r) + 150 * u32::from(g) + 29 * u32::from(b)) >> 8)
            })
            .sum();
        total as f32 / (self.scaled.len() as f32 * 255.0)
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn classify(&mut self, pixels: &[u32], width: u32, height: u32) -> Result<Vec<Recognition>> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| ClassificationError::inference("frame dimensions overflow"))?;
        if expected == 0 || pixels.len() != expected {
            return Err(ClassificationError::inference(format!(
                "expected {} pixels for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ))
            .into());
        }

        self.resample(pixels, width, height);
        let brightness = self.mean_brightness();

        let mut ranked: Vec<Recognition> = SCENE_LABELS
            .iter()
            .map(|(label, centre)| Recognition::new(*label, 1.0 - (brightness - centre).abs()))
            .collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked.truncate(self.top_k);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::backend::ClassificationErrorKind;

    #[test]
    fn ranks_bright_frame_as_overexposed() -> Result<()> {
        let mut classifier = StubClassifier::new(8)?.with_top_k(2);
        let pixels = vec![0xFFEB_EBEB; 32 * 24];
        let results = classifier.classify(&pixels, 32, 24)?;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].label, "overexposed");
        assert_eq!(results[1].label, "daylight");
        assert!(results[0].confidence >= results[1].confidence);
        Ok(())
    }

    #[test]
    fn ranks_black_frame_as_night() -> Result<()> {
        let mut classifier = StubClassifier::new(4)?;
        let results = classifier.classify(&vec![0xFF00_0000; 9], 3, 3)?;
        assert_eq!(results.len(), SCENE_LABELS.len());
        assert_eq!(results[0].label, "night");
        Ok(())
    }

    #[test]
    fn zero_input_size_is_a_load_error() {
        let err = StubClassifier::new(0).err().expect("zero input size must fail");
        let classification = err
            .downcast_ref::<ClassificationError>()
            .expect("typed classification error");
        assert!(classification.is_fatal());
    }

    #[test]
    fn mismatched_buffer_is_an_inference_error() -> Result<()> {
        let mut classifier = StubClassifier::new(4)?;
        let err = classifier.classify(&[0; 10], 4, 4).unwrap_err();
        let classification = err
            .downcast_ref::<ClassificationError>()
            .expect("typed classification error");
        assert_eq!(classification.kind, ClassificationErrorKind::Inference);
        Ok(())
    }
}
