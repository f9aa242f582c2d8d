//! Classifier output and the label-to-gesture mapping

use crate::config::LabelConfig;
use std::collections::HashMap;

/// Gesture interpretation of a single classified frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// Mouth open; starts an episode when idle
    Open,
    /// Chip shape; sustained runs confirm and end an episode
    Chip,
    /// Any other label
    Other,
}

impl Gesture {
    /// Lower-case name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::Open => "open",
            Gesture::Chip => "chip",
            Gesture::Other => "other",
        }
    }
}

/// Top-1 classification of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationSample {
    /// Class name reported by the classifier
    pub label: String,
    /// Top-1 confidence in [0, 1]
    pub confidence: f32,
}

impl ClassificationSample {
    /// Creates a sample, clamping confidence into [0, 1]
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Log form used for change detection, e.g. `chip (0.80)`
    pub fn display_state(&self) -> String {
        format!("{} ({:.2})", self.label.to_lowercase(), self.confidence)
    }
}

/// Maps classifier label names to gestures
///
/// Lookup is exact after trimming and lower-casing. Unknown labels are
/// [`Gesture::Other`].
#[derive(Debug, Clone)]
pub struct LabelMap {
    entries: HashMap<String, Gesture>,
}

impl LabelMap {
    /// Builds the map from open and chip label lists
    pub fn new<S: AsRef<str>>(open: &[S], chip: &[S]) -> Self {
        let mut entries = HashMap::new();
        for name in open {
            entries.insert(normalise(name.as_ref()), Gesture::Open);
        }
        for name in chip {
            entries.insert(normalise(name.as_ref()), Gesture::Chip);
        }
        Self { entries }
    }

    /// Builds the map from the label settings
    pub fn from_config(config: &LabelConfig) -> Self {
        Self::new(&config.open, &config.chip)
    }

    /// Gesture for a raw label name
    pub fn gesture_for(&self, label: &str) -> Gesture {
        self.entries
            .get(&normalise(label))
            .copied()
            .unwrap_or(Gesture::Other)
    }

    /// Gesture for a classified sample
    pub fn classify(&self, sample: &ClassificationSample) -> Gesture {
        self.gesture_for(&sample.label)
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::from_config(&LabelConfig::default())
    }
}

fn normalise(label: &str) -> String {
    label.trim().to_lowercase()
}
