use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face descriptor: a fixed-length embedding where Euclidean distance
/// approximates visual similarity. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDescriptor {
    pub values: Vec<f32>,
    /// Model version that produced this descriptor (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance between two descriptors.
    ///
    /// Descriptors of different dimensionality are incomparable and report
    /// `f32::INFINITY`, which never falls within any tolerance.
    pub fn euclidean_distance(&self, other: &FaceDescriptor) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One enrolled identity: a label derived from the image file name and the
/// descriptor of the first face found in that image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub label: String,
    pub descriptor: FaceDescriptor,
}

/// Detector speed/accuracy trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Reduced input resolution, favours latency.
    #[default]
    Fast,
    /// Full input resolution.
    Accurate,
}

impl DetectionMode {
    /// Square detector input size in pixels.
    pub fn input_size(self) -> usize {
        match self {
            DetectionMode::Fast => 320,
            DetectionMode::Accurate => 640,
        }
    }
}

impl std::str::FromStr for DetectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(DetectionMode::Fast),
            "accurate" => Ok(DetectionMode::Accurate),
            other => Err(format!("unknown detection mode: {other} (expected fast or accurate)")),
        }
    }
}
