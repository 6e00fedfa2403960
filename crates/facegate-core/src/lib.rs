//! facegate-core: face login engine.
//!
//! SCRFD detection and ArcFace descriptors via ONNX Runtime, the enrolled
//! gallery, and the first-match decision procedure used at login.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod frame;
pub mod gallery;
pub mod matcher;
pub mod recognizer;
pub mod types;

pub use encoder::{EncodeError, FaceEncoder, OnnxFaceEncoder};
pub use gallery::{Gallery, GalleryError};
pub use matcher::{FirstMatchMatcher, MatchResult, Matcher, DEFAULT_TOLERANCE};
pub use types::{BoundingBox, DetectionMode, FaceDescriptor, GalleryEntry};

use std::path::PathBuf;

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default model directory: `$XDG_DATA_HOME/facegate/models`, falling back to
/// `~/.local/share/facegate/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
        .join("models")
}

/// Load both ONNX models from `model_dir`.
pub fn load_encoder(
    model_dir: &std::path::Path,
    mode: DetectionMode,
) -> Result<OnnxFaceEncoder, EncodeError> {
    let detector = model_dir.join(DETECTOR_MODEL_FILE);
    let recognizer = model_dir.join(RECOGNIZER_MODEL_FILE);
    OnnxFaceEncoder::load(
        &detector.to_string_lossy(),
        &recognizer.to_string_lossy(),
        mode,
    )
}
