//
// web.rs
// seriesnav
//
// Axum-based HTTP server exposing upload, session, series listing, and frame rendering APIs.
//

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::archive;
use crate::frames::FrameValueMode;
use crate::models::SeriesSummary;
use crate::session::{FrameOptions, SessionError, SessionStore};

#[derive(Clone)]
struct AppState {
    store: Arc<SessionStore>,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Bootstraps the Axum HTTP server and wires up API routes.
pub async fn start_server(host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState {
        store: Arc::new(SessionStore::new()),
    };

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:session_id", delete(delete_session))
        .route("/api/series/:session_id", get(list_series))
        .route("/api/series/:session_id/:series_uid", get(get_series))
        .route(
            "/api/series/:session_id/:series_uid/frame/:frame_index",
            get(get_frame),
        )
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(%addr, "server running");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root_handler() -> Json<Value> {
    Json(json!({ "service": "seriesnav", "status": "running" }))
}

/// Accept one or more ZIP archives, assemble their DICOM series, and open a
/// session over the result. Invalid uploads are reported per file; the
/// request only fails when no valid archive remains.
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut items = Vec::new();
    let mut invalid_files = Vec::new();
    let mut seed = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload.zip".to_string());
        let data = field.bytes().await.map_err(internal_error)?;

        if data.is_empty() {
            invalid_files.push(format!("{original_name} (empty file)"));
            continue;
        }
        match archive::load_zip(&data) {
            Ok(entries) => {
                seed.extend_from_slice(&data);
                items.extend(entries);
            }
            Err(err) => invalid_files.push(format!("{original_name} ({err})")),
        }
    }

    if items.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "No valid ZIP files found".to_string(),
        ));
    }

    let series = archive::ingest_items(&items, FrameValueMode::Native);
    let summaries: Vec<SeriesSummary> = series.values().map(|s| s.summary()).collect();
    let session_id = state.store.create(series, &seed);

    Ok(Json(json!({
        "session_id": session_id,
        "series": summaries,
        "invalid_files": invalid_files,
        "total_series": summaries.len()
    })))
}

async fn list_sessions(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.store.list();
    Json(json!({ "count": sessions.len(), "sessions": sessions }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.store.remove(&session_id).map_err(session_error)?;
    Ok(Json(json!({ "deleted": session_id })))
}

async fn list_series(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<SeriesSummary>>> {
    let listing = state.store.series_list(&session_id).map_err(session_error)?;
    Ok(Json(listing))
}

async fn get_series(
    State(state): State<AppState>,
    Path((session_id, series_uid)): Path<(String, String)>,
) -> ApiResult<Json<SeriesSummary>> {
    let summary = state
        .store
        .series_summary(&session_id, &series_uid)
        .map_err(session_error)?;
    Ok(Json(summary))
}

#[derive(Debug, Default, Deserialize)]
struct FrameQuery {
    ww: Option<f32>,
    wl: Option<f32>,
    zoom: Option<u32>,
    max_dim: Option<u32>,
    /// "instant" selects the coarse low-latency path.
    tier: Option<String>,
}

async fn get_frame(
    State(state): State<AppState>,
    Path((session_id, series_uid, frame_index)): Path<(String, String, usize)>,
    Query(query): Query<FrameQuery>,
) -> ApiResult<impl IntoResponse> {
    let window = match (query.ww, query.wl) {
        (Some(ww), Some(wl)) => Some((ww, wl)),
        (None, None) => None,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Provide both ww and wl, or neither".to_string(),
            ))
        }
    };

    let options = FrameOptions {
        window,
        zoom_percent: query.zoom,
        max_dimension: query.max_dim,
        instant: query.tier.as_deref() == Some("instant"),
    };

    let payload = state
        .store
        .frame_png(&session_id, &series_uid, frame_index, options)
        .map_err(session_error)?;

    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("image/png"),
        ),
        (
            header::HeaderName::from_static("x-frame-width"),
            header_value(payload.width),
        ),
        (
            header::HeaderName::from_static("x-frame-height"),
            header_value(payload.height),
        ),
        (
            header::HeaderName::from_static("x-total-frames"),
            header_value(payload.total_frames),
        ),
    ];
    Ok((headers, payload.png))
}

fn header_value<T: Display>(value: T) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

fn session_error(err: SessionError) -> (StatusCode, String) {
    match err {
        SessionError::SessionNotFound(_)
        | SessionError::SeriesNotFound(_)
        | SessionError::FrameOutOfRange { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        SessionError::Encoding(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn bad_request<E: Display>(err: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn internal_error<E: Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
