//! Login decision: compare probe descriptors against the gallery under a
//! Euclidean distance tolerance.

use crate::gallery::Gallery;
use crate::types::FaceDescriptor;

/// Default maximum distance for a positive match. Stricter than the usual
/// 0.6 to cut false accepts.
pub const DEFAULT_TOLERANCE: f32 = 0.5;

/// Outcome of matching one frame against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched {
        identity: String,
        /// Distance between the probe and the selected gallery entry.
        distance: f32,
    },
    NoMatch,
}

impl MatchResult {
    pub fn identity(&self) -> Option<&str> {
        match self {
            MatchResult::Matched { identity, .. } => Some(identity),
            MatchResult::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }
}

/// Distance from `probe` to every gallery entry, in gallery order.
pub fn face_distances(gallery: &Gallery, probe: &FaceDescriptor) -> Vec<f32> {
    gallery
        .entries()
        .iter()
        .map(|entry| entry.descriptor.euclidean_distance(probe))
        .collect()
}

/// Whether each gallery entry lies within `tolerance` of `probe`.
pub fn compare_faces(gallery: &Gallery, probe: &FaceDescriptor, tolerance: f32) -> Vec<bool> {
    face_distances(gallery, probe)
        .into_iter()
        .map(|d| d <= tolerance)
        .collect()
}

/// Strategy for deciding a login from the descriptors found in one frame.
pub trait Matcher {
    fn identify(&self, probes: &[FaceDescriptor], gallery: &Gallery) -> MatchResult;
}

/// Ordered scan with early exit.
///
/// Probes are tried in detection order. For the first probe that has any
/// gallery entry within tolerance, the earliest such entry in gallery order
/// is returned, even if a later entry is closer. Remaining probes are not
/// examined.
#[derive(Debug, Clone, Copy)]
pub struct FirstMatchMatcher {
    pub tolerance: f32,
}

impl Default for FirstMatchMatcher {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl FirstMatchMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }
}

impl Matcher for FirstMatchMatcher {
    fn identify(&self, probes: &[FaceDescriptor], gallery: &Gallery) -> MatchResult {
        for (face, probe) in probes.iter().enumerate() {
            let hit = gallery.entries().iter().find_map(|entry| {
                let distance = entry.descriptor.euclidean_distance(probe);
                (distance <= self.tolerance).then_some((entry, distance))
            });

            if let Some((entry, distance)) = hit {
                tracing::debug!(face, identity = %entry.label, distance, "probe matched gallery entry");
                return MatchResult::Matched {
                    identity: entry.label.clone(),
                    distance,
                };
            }
        }

        tracing::debug!(faces = probes.len(), gallery = gallery.len(), "no probe within tolerance");
        MatchResult::NoMatch
    }
}
