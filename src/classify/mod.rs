mod backend;
mod backends;
mod result;

pub use backend::{ClassificationError, ClassificationErrorKind, Classifier};
pub use backends::StubClassifier;
pub use result::{format_recognitions, Recognition};
