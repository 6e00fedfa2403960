use facegate_core::frame::{self, DecodeError};
use facegate_core::{EncodeError, FaceEncoder, FirstMatchMatcher, Gallery, MatchResult, Matcher};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("image decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("face encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Identify {
        image_data_url: String,
        reply: oneshot::Sender<Result<MatchResult, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    gallery: Arc<Gallery>,
}

impl EngineHandle {
    /// Decode a login snapshot and match every face in it against the gallery.
    pub async fn identify(&self, image_data_url: String) -> Result<MatchResult, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Identify {
                image_data_url,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Number of enrolled identities the engine matches against.
    pub fn gallery_len(&self) -> usize {
        self.gallery.len()
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the encoder (model sessions need exclusive access) and
/// shares the read-only gallery. Requests are served one at a time in arrival
/// order; `queue` bounds how many may wait.
pub fn spawn_engine(
    mut encoder: Box<dyn FaceEncoder + Send>,
    gallery: Arc<Gallery>,
    matcher: FirstMatchMatcher,
    queue: usize,
) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue.max(1));
    let thread_gallery = Arc::clone(&gallery);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!(
                gallery = thread_gallery.len(),
                tolerance = matcher.tolerance,
                "engine thread started"
            );
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Identify {
                        image_data_url,
                        reply,
                    } => {
                        let result =
                            run_identify(encoder.as_mut(), &thread_gallery, &matcher, &image_data_url);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx, gallery })
}

/// Decode, detect + describe, then match.
fn run_identify(
    encoder: &mut dyn FaceEncoder,
    gallery: &Gallery,
    matcher: &impl Matcher,
    image_data_url: &str,
) -> Result<MatchResult, EngineError> {
    let frame = frame::decode_data_url(image_data_url)?;
    let probes = encoder.encode(&frame)?;
    tracing::debug!(
        width = frame.width(),
        height = frame.height(),
        faces = probes.len(),
        "identify: frame encoded"
    );
    Ok(matcher.identify(&probes, gallery))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use facegate_core::{FaceDescriptor, GalleryEntry};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// One face per distinct non-black colour in the top row, in column order;
    /// each descriptor is the red and green channels divided by 100.
    pub(crate) struct RowEncoder;

    impl FaceEncoder for RowEncoder {
        fn encode(&mut self, frame: &RgbImage) -> Result<Vec<FaceDescriptor>, EncodeError> {
            let mut seen: Vec<[u8; 3]> = Vec::new();
            for x in 0..frame.width() {
                let px = frame.get_pixel(x, 0).0;
                if px != [0, 0, 0] && !seen.contains(&px) {
                    seen.push(px);
                }
            }
            Ok(seen
                .into_iter()
                .map(|px| FaceDescriptor::new(vec![px[0] as f32 / 100.0, px[1] as f32 / 100.0]))
                .collect())
        }
    }

    /// alice at (0, 0), bob at (1, 0).
    pub(crate) fn alice_bob() -> Arc<Gallery> {
        Arc::new(Gallery::from_entries(vec![
            GalleryEntry {
                label: "alice".into(),
                descriptor: FaceDescriptor::new(vec![0.0, 0.0]),
            },
            GalleryEntry {
                label: "bob".into(),
                descriptor: FaceDescriptor::new(vec![1.0, 0.0]),
            },
        ]))
    }

    /// PNG data URL whose top row holds one pixel per face colour, followed by
    /// black padding. An empty slice yields a faceless frame.
    pub(crate) fn data_url(faces: &[[u8; 3]]) -> String {
        use base64::Engine;
        let width = faces.len() as u32 + 1;
        let img = RgbImage::from_fn(width, 2, |x, y| match (y, faces.get(x as usize)) {
            (0, Some(c)) => Rgb(*c),
            _ => Rgb([0, 0, 0]),
        });
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
        )
    }

    fn engine() -> EngineHandle {
        spawn_engine(Box::new(RowEncoder), alice_bob(), FirstMatchMatcher::default(), 4).unwrap()
    }

    #[tokio::test]
    async fn test_identify_match() {
        // (30, 0) → descriptor (0.3, 0.0): 0.3 from alice, 0.7 from bob.
        let result = engine().identify(data_url(&[[30, 0, 0]])).await.unwrap();
        assert_eq!(result.identity(), Some("alice"));
    }

    #[tokio::test]
    async fn test_identify_no_face() {
        let result = engine().identify(data_url(&[])).await.unwrap();
        assert_eq!(result, MatchResult::NoMatch);
    }

    #[tokio::test]
    async fn test_identify_stops_at_first_matching_face() {
        // Faces: stranger (2.5, 2.5), bob (1.0, 0.1), alice (0.0, 0.1).
        let result = engine()
            .identify(data_url(&[[250, 250, 1], [100, 10, 0], [0, 10, 0]]))
            .await
            .unwrap();
        assert_eq!(result.identity(), Some("bob"));
    }

    #[tokio::test]
    async fn test_identify_decode_error() {
        let err = engine().identify("not a data url".into()).await.unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[tokio::test]
    async fn test_handle_reports_gallery_size() {
        assert_eq!(engine().gallery_len(), 2);
    }
}
