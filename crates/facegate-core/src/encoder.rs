//! Frame-to-descriptors pipeline: detection followed by per-face description.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{DetectionMode, FaceDescriptor};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Turns a frame into one descriptor per detected face, in detection order.
///
/// An empty vector means no face was found; that is not an error.
pub trait FaceEncoder {
    fn encode(&mut self, frame: &RgbImage) -> Result<Vec<FaceDescriptor>, EncodeError>;
}

/// SCRFD detection + ArcFace description.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    pub fn load(
        detector_path: &str,
        recognizer_path: &str,
        mode: DetectionMode,
    ) -> Result<Self, EncodeError> {
        Ok(Self {
            detector: FaceDetector::load(detector_path, mode)?,
            recognizer: FaceRecognizer::load(recognizer_path)?,
        })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&mut self, frame: &RgbImage) -> Result<Vec<FaceDescriptor>, EncodeError> {
        let faces = self.detector.detect(frame)?;
        faces
            .iter()
            .map(|face| self.recognizer.extract(frame, face).map_err(EncodeError::from))
            .collect()
    }
}
