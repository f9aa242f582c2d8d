//! Camera and classifier collaborators
//!
//! The monitor only needs two things from the vision side: a frame on demand
//! and a top-1 label for that frame. Both report transient failures as typed
//! errors so the monitor can skip the cycle instead of unwinding.

use crate::gesture::ClassificationSample;

/// One captured image
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Raw pixel data in the source's native layout
    pub data: Vec<u8>,
}

/// Frame acquisition failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum AcquireError {
    /// No frame ready this cycle
    #[error("No frame available")]
    NotReady,

    /// The device reported an error
    #[error("Camera error: {0}")]
    Device(String),
}

/// Classification failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifyError {
    /// The model produced no class probabilities
    #[error("Classifier returned no probabilities")]
    NoProbabilities,

    /// Inference failed
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Camera collaborator
///
/// Dropping the source releases the device.
pub trait FrameSource: Send {
    /// Capture the next frame
    fn read(&mut self) -> Result<Frame, AcquireError>;

    /// Whether the device is still usable
    fn is_open(&self) -> bool {
        true
    }
}

/// Pretrained classifier collaborator
pub trait Classifier: Send {
    /// Top-1 label and confidence for `frame`
    fn classify(&mut self, frame: &Frame) -> Result<ClassificationSample, ClassifyError>;
}

/// Camera plus classifier, owned by the monitoring thread
pub struct VisionPipeline {
    frames: Box<dyn FrameSource>,
    classifier: Box<dyn Classifier>,
}

/// Result of one acquisition + classification attempt
#[derive(Debug)]
pub enum Detection {
    Sample(ClassificationSample),
    NoFrame(AcquireError),
    Failed(ClassifyError),
}

impl VisionPipeline {
    /// Pairs a frame source with a classifier
    pub fn new(frames: Box<dyn FrameSource>, classifier: Box<dyn Classifier>) -> Self {
        Self { frames, classifier }
    }

    /// Whether the camera is still usable
    pub fn is_open(&self) -> bool {
        self.frames.is_open()
    }

    /// Read one frame and classify it
    pub fn detect(&mut self) -> Detection {
        let frame = match self.frames.read() {
            Ok(frame) => frame,
            Err(e) => return Detection::NoFrame(e),
        };
        match self.classifier.classify(&frame) {
            Ok(sample) => Detection::Sample(sample),
            Err(e) => Detection::Failed(e),
        }
    }
}
