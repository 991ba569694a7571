use std::fmt;

/// One ranked label from the classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    pub label: String,
    /// Model-defined confidence; higher is more confident.
    pub confidence: f32,
}

impl Recognition {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

impl fmt::Display for Recognition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.label, self.confidence)
    }
}

/// One `label, confidence` line per result, in the order given.
pub fn format_recognitions(results: &[Recognition]) -> String {
    results.iter().map(|r| format!("{}\n", r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_one_line_per_result_in_order() {
        let results = vec![
            Recognition::new("golden retriever", 0.75),
            Recognition::new("tennis ball", 0.125),
        ];
        assert_eq!(
            format_recognitions(&results),
            "golden retriever, 0.75\ntennis ball, 0.125\n"
        );
        assert_eq!(format_recognitions(&[]), "");
    }
}
