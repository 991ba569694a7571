use anyhow::Result;
use std::fmt;

use crate::classify::result::Recognition;

/// Classifier backend trait.
///
/// The pipeline hands over the live frame as packed ARGB at the camera's
/// resolution. Scaling or cropping to the model's fixed square input is the
/// backend's job. Calls are always serial; backends need not be reentrant.
pub trait Classifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Side length of the square input the backend was built for.
    fn input_size(&self) -> u32;

    /// Rank labels for one frame, most confident first.
    ///
    /// `pixels.len()` is `width * height`. The slice is only valid for the call.
    fn classify(&mut self, pixels: &[u32], width: u32, height: u32) -> Result<Vec<Recognition>>;

    /// Optional warm-up hook, run once before the pipeline starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassificationErrorKind {
    /// The backend could not be built. Fatal: the pipeline must not start.
    Load,
    /// One inference call failed. The frame is skipped.
    Inference,
}

#[derive(Clone, Debug)]
pub struct ClassificationError {
    pub kind: ClassificationErrorKind,
    pub reason: String,
}

impl ClassificationError {
    pub fn load(reason: impl Into<String>) -> Self {
        Self {
            kind: ClassificationErrorKind::Load,
            reason: reason.into(),
        }
    }

    pub fn inference(reason: impl Into<String>) -> Self {
        Self {
            kind: ClassificationErrorKind::Inference,
            reason: reason.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ClassificationErrorKind::Load
    }
}

impl fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ClassificationErrorKind::Load => write!(f, "classifier load failed: {}", self.reason),
            ClassificationErrorKind::Inference => {
                write!(f, "classification failed: {}", self.reason)
            }
        }
    }
}

impl std::error::Error for ClassificationError {}
