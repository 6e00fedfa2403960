//! Enrolled identity gallery, built once from a directory of reference images.

use crate::encoder::FaceEncoder;
use crate::frame;
use crate::types::GalleryEntry;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions considered enrollment images (compared case-insensitively).
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("cannot read gallery directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ordered, read-only set of enrolled identities.
///
/// Order is significant: when several entries fall within tolerance of a probe,
/// the earliest one wins.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    /// Scan `dir` and enroll the first face of every image in it.
    ///
    /// Files are visited in name order. A file that fails to decode or encode
    /// is logged and skipped, as is one with no detectable face; only an
    /// unreadable directory aborts the load.
    pub fn load(dir: &Path, encoder: &mut dyn FaceEncoder) -> Result<Self, GalleryError> {
        let dir_err = |source| GalleryError::Directory {
            path: dir.to_path_buf(),
            source,
        };

        let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(dir_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image_path(path))
            .collect();
        candidates.sort();

        tracing::info!(dir = %dir.display(), candidates = candidates.len(), "loading gallery");

        let mut entries = Vec::with_capacity(candidates.len());
        for path in candidates {
            let Some(label) = label_for(&path) else {
                tracing::warn!(file = %path.display(), "file name is not valid UTF-8; skipping");
                continue;
            };

            let descriptors = match frame::load_image_file(&path)
                .map_err(|e| e.to_string())
                .and_then(|img| encoder.encode(&img).map_err(|e| e.to_string()))
            {
                Ok(d) => d,
                Err(error) => {
                    tracing::error!(file = %path.display(), %error, "failed to enroll image; skipping");
                    continue;
                }
            };

            match descriptors.into_iter().next() {
                Some(descriptor) => {
                    tracing::info!(%label, "loaded gallery entry");
                    entries.push(GalleryEntry { label, descriptor });
                }
                None => {
                    tracing::warn!(file = %path.display(), "no face found in enrollment image; skipping");
                }
            }
        }

        if entries.is_empty() {
            tracing::warn!(dir = %dir.display(), "gallery is empty; every login will be denied");
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Identity label: the file name with its extension stripped.
fn label_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
