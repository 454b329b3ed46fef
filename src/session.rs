//
// session.rs
// seriesnav
//
// Session boundary: holds aggregated series per upload session and serves encoded frames by (session, series, index).
//

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::models::SeriesSummary;
use crate::render::{RenderRequest, RenderTier, Renderer};
use crate::series::Series;

/// Domain errors surfaced at the session boundary. These are lookup
/// failures, distinct from the per-instance extraction failures that are
/// absorbed during aggregation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("series not found: {0}")]
    SeriesNotFound(String),
    #[error("frame index {index} out of range (series has {total} frame(s))")]
    FrameOutOfRange { index: usize, total: usize },
    #[error("failed to encode frame: {0}")]
    Encoding(String),
}

/// Options applied when a frame is requested for display.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameOptions {
    pub window: Option<(f32, f32)>,
    pub zoom_percent: Option<u32>,
    pub max_dimension: Option<u32>,
    pub instant: bool,
}

/// One encoded frame plus its pixel dimensions.
#[derive(Debug, Clone)]
pub struct FramePayload {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub total_frames: usize,
}

const DEFAULT_ZOOM_PERCENT: u32 = 100;
const DEFAULT_MAX_DIMENSION: u32 = 1024;
const PREFETCH_RADIUS: usize = 3;

/// Holds one `series UID -> Series` mapping per session and renders frames
/// through a shared cache. Sessions share no mutable state with each other.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<BTreeMap<String, Series>>>>,
    renderer: Renderer,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            renderer: Renderer::new(),
        }
    }

    /// Register the result of one aggregation call under a content-derived
    /// session id and return the id.
    pub fn create(&self, series: BTreeMap<String, Series>, seed: &[u8]) -> String {
        let digest = hex::encode(Sha256::digest(seed));
        let session_id = format!("session-{}", &digest[..12]);
        info!(session = %session_id, series = series.len(), "session created");
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session_id.clone(), Arc::new(series));
        }
        session_id
    }

    pub fn list(&self) -> Vec<String> {
        self.sessions
            .lock()
            .map(|sessions| {
                let mut ids: Vec<String> = sessions.keys().cloned().collect();
                ids.sort();
                ids
            })
            .unwrap_or_default()
    }

    pub fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionError::SessionNotFound(session_id.to_string()))?;
        sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    fn session(&self, session_id: &str) -> Result<Arc<BTreeMap<String, Series>>, SessionError> {
        self.sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(session_id).cloned())
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    /// Series listing for selection UIs.
    pub fn series_list(&self, session_id: &str) -> Result<Vec<SeriesSummary>, SessionError> {
        let session = self.session(session_id)?;
        Ok(session.values().map(Series::summary).collect())
    }

    pub fn series_summary(
        &self,
        session_id: &str,
        series_uid: &str,
    ) -> Result<SeriesSummary, SessionError> {
        let session = self.session(session_id)?;
        session
            .get(series_uid)
            .map(Series::summary)
            .ok_or_else(|| SessionError::SeriesNotFound(series_uid.to_string()))
    }

    /// Render one frame as PNG bytes plus its pixel dimensions.
    ///
    /// Invalid session, series, or frame index yields the corresponding
    /// "not found" error rather than a panic. Neighboring frames are
    /// pre-rendered in the background window of the final tier.
    pub fn frame_png(
        &self,
        session_id: &str,
        series_uid: &str,
        frame_index: usize,
        options: FrameOptions,
    ) -> Result<FramePayload, SessionError> {
        let session = self.session(session_id)?;
        let series = session
            .get(series_uid)
            .ok_or_else(|| SessionError::SeriesNotFound(series_uid.to_string()))?;

        let request = RenderRequest {
            series_uid: series_uid.to_string(),
            frame_index,
            window: options.window,
            zoom_percent: options.zoom_percent.unwrap_or(DEFAULT_ZOOM_PERCENT),
            max_dimension: options.max_dimension.unwrap_or(DEFAULT_MAX_DIMENSION),
            tier: if options.instant {
                RenderTier::Instant
            } else {
                RenderTier::Final
            },
        };

        let view = self
            .renderer
            .render(series, &request)
            .ok_or(SessionError::FrameOutOfRange {
                index: frame_index,
                total: series.frames.len(),
            })?;

        if !options.instant {
            self.renderer
                .prefetch_neighbors(series, &request, PREFETCH_RADIUS);
        }

        let (width, height) = view.dimensions();
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(view.image.clone())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| SessionError::Encoding(e.to_string()))?;

        Ok(FramePayload {
            png,
            width,
            height,
            total_frames: series.frames.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeriesMetadata;
    use ndarray::Array2;

    fn store_with_series() -> (SessionStore, String) {
        let frames = (0..3)
            .map(|i| Array2::from_elem((4, 4), (i * 10) as f32))
            .collect();
        let series = Series {
            uid: "1.2.3".into(),
            metadata: SeriesMetadata::default(),
            frames,
            source_names: vec!["a.dcm".into()],
        };
        let mut map = BTreeMap::new();
        map.insert(series.uid.clone(), series);

        let store = SessionStore::new();
        let id = store.create(map, b"seed");
        (store, id)
    }

    #[test]
    fn frame_retrieval_returns_png_and_dimensions() {
        let (store, id) = store_with_series();
        let payload = store
            .frame_png(&id, "1.2.3", 0, FrameOptions::default())
            .expect("frame");
        assert!(payload.png.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!((payload.width, payload.height), (4, 4));
        assert_eq!(payload.total_frames, 3);
    }

    #[test]
    fn lookups_fail_with_domain_errors() {
        let (store, id) = store_with_series();

        assert!(matches!(
            store.frame_png("nope", "1.2.3", 0, FrameOptions::default()),
            Err(SessionError::SessionNotFound(_))
        ));
        assert!(matches!(
            store.frame_png(&id, "9.9.9", 0, FrameOptions::default()),
            Err(SessionError::SeriesNotFound(_))
        ));
        assert!(matches!(
            store.frame_png(&id, "1.2.3", 3, FrameOptions::default()),
            Err(SessionError::FrameOutOfRange { index: 3, total: 3 })
        ));
    }

    #[test]
    fn sessions_can_be_listed_and_removed() {
        let (store, id) = store_with_series();
        assert_eq!(store.list(), vec![id.clone()]);

        store.remove(&id).expect("remove");
        assert!(store.list().is_empty());
        assert!(matches!(
            store.remove(&id),
            Err(SessionError::SessionNotFound(_))
        ));
    }

    #[test]
    fn series_listing_reports_frame_counts() {
        let (store, id) = store_with_series();
        let listing = store.series_list(&id).expect("listing");
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].frame_count, 3);
        assert_eq!(listing[0].uid, "1.2.3");
    }
}
