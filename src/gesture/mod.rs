//! Gesture interpretation
//!
//! Maps raw classifier labels to gestures and debounces them into session
//! events.

pub mod debouncer;
pub mod label;

pub use debouncer::GestureDebouncer;
pub use label::{ClassificationSample, Gesture, LabelMap};
