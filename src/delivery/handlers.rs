use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::core::error::StreamError;
use crate::core::ratelimit::Decision;
use crate::core::redact::redact_signature;
use crate::core::types::{MediaAsset, MediaId, MediaType};
use crate::observability::metrics as obs;
use crate::storage::MetadataStore;
use crate::views::tracker::client_identity;

use super::range;
use super::router::AppState;
use super::stream::span_stream;

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    status: u16,
}

fn error_json(status: StatusCode, error: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
        status: status.as_u16(),
    };
    (status, Json(body)).into_response()
}

/// Map a stream error to its JSON response, including the extra headers
/// some statuses carry (Retry-After on 429, Content-Range on 416).
fn stream_error_response(err: &StreamError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = error_json(status, err.error_code(), &err.to_string());

    match err {
        StreamError::RateLimited { retry_after_secs } => {
            if let Ok(val) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, val);
            }
        }
        StreamError::RangeNotSatisfiable { total_len, .. } => {
            if let Ok(val) = format!("bytes */{}", total_len).parse() {
                response.headers_mut().insert(header::CONTENT_RANGE, val);
            }
        }
        _ => {}
    }
    response
}

// ---------------------------------------------------------------------------
// Asset registration and upload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateMediaRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub file_url: String,
}

#[derive(Debug, Serialize)]
pub struct CreateMediaResponse {
    pub media_id: String,
    pub created_at: String,
}

/// `POST /media` — register a media asset pointing at a stored file.
pub async fn create_media(
    State(state): State<AppState>,
    Json(body): Json<CreateMediaRequest>,
) -> Response {
    if body.title.trim().is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "invalid_title",
            "Title must not be empty.",
        );
    }

    let asset = MediaAsset::new(body.title, body.media_type, body.file_url);
    let created_at = asset.created_at.to_rfc3339();
    let media_id = match state.store.save_media(asset).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "failed to save media asset");
            return error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Failed to save media asset.",
            );
        }
    };

    info!(%media_id, "media asset registered");
    (
        StatusCode::CREATED,
        Json(CreateMediaResponse {
            media_id: media_id.to_string(),
            created_at,
        }),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_url: String,
}

/// `POST /media/upload` — store a raw upload body, returning the location
/// reference to register an asset with.
pub async fn upload_media(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response {
    let name = query.filename.as_deref().unwrap_or("upload");
    let size = body.len();

    match state.files.store(name, body).await {
        Ok(file_url) => {
            obs::inc_upload();
            obs::record_upload_size(size as f64);
            (StatusCode::CREATED, Json(UploadResponse { file_url })).into_response()
        }
        Err(e) => {
            let err = StreamError::Storage(e);
            if err.status_code() >= 500 {
                error!(error = %err, "upload failed");
            }
            stream_error_response(&err)
        }
    }
}

// ---------------------------------------------------------------------------
// Signed stream URLs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StreamUrlResponse {
    pub stream_url: String,
    pub expires_at_ms: i64,
}

/// `GET /media/{media_id}/stream-url` — issue a signed, expiring stream URL.
pub async fn stream_url(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
) -> Response {
    let id = match parse_media_id(&media_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let asset = match find_asset(&state, id).await {
        Ok(asset) => asset,
        Err(resp) => return resp,
    };

    let token = state.signer.issue(&asset.file_url);
    obs::inc_token_issued();
    debug!(
        %id,
        expiry_ms = token.expiry_ms,
        signature = %redact_signature(&token.signature),
        "stream URL issued"
    );

    Json(StreamUrlResponse {
        stream_url: format!(
            "/media/{}/stream?exp={}&sig={}",
            id, token.expiry_ms, token.signature
        ),
        expires_at_ms: token.expiry_ms,
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub exp: i64,
    pub sig: String,
}

/// `GET /media/{media_id}/stream?exp=&sig=` — serve the media bytes.
///
/// Order of checks: asset lookup, token verification, rate limiting, file
/// open, range resolution. A request that fails verification never
/// consumes a rate-limit slot, and a rate-limited request never opens
/// the file.
pub async fn stream_media(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
    Query(query): Query<StreamQuery>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let start = std::time::Instant::now();
    let response = serve_stream(&state, &media_id, &query, remote, &headers).await;
    obs::inc_stream_request(response.status().as_u16());
    obs::record_stream_request_duration(start.elapsed().as_secs_f64());
    response
}

async fn serve_stream(
    state: &AppState,
    media_id: &str,
    query: &StreamQuery,
    remote: SocketAddr,
    headers: &HeaderMap,
) -> Response {
    let id = match parse_media_id(media_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let asset = match find_asset(state, id).await {
        Ok(asset) => asset,
        Err(resp) => return resp,
    };

    // The signature binds the file location, so verification needs the
    // asset first.
    if !state.signer.verify(&asset.file_url, query.exp, &query.sig) {
        obs::inc_token_rejected("invalid_or_expired");
        debug!(
            %id,
            exp = query.exp,
            sig = %redact_signature(&query.sig),
            "stream token rejected"
        );
        return stream_error_response(&StreamError::InvalidToken);
    }

    let client = client_identity(headers, Some(remote));
    if let Decision::Denied { retry_after_secs } = state.tracker.admit(id, &client) {
        obs::inc_rate_limited("stream");
        return stream_error_response(&StreamError::RateLimited { retry_after_secs });
    }

    let opened = match state.files.open(&asset.file_url).await {
        Ok(opened) => opened,
        Err(e) => {
            let err = StreamError::from_file_open(e);
            warn!(%id, error = %err, "media file unavailable");
            return stream_error_response(&err);
        }
    };
    let total_len = opened.total_len;

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let resolved = match range::resolve(range_header, total_len) {
        Ok(resolved) => resolved,
        Err(e) => return stream_error_response(&e),
    };

    let content_type = opened.content_type;
    let file_name = opened.file_name.clone();
    let body = match span_stream(opened, &resolved).await {
        Ok(stream) => Body::from_stream(stream),
        Err(e) => {
            error!(%id, error = %e, "failed to position media file");
            return stream_error_response(&StreamError::Storage(e));
        }
    };

    // The admitted stream counts as a view; denial above wrote nothing.
    if let Err(e) = state.tracker.log_view(id, &client).await {
        warn!(%id, error = %e, "failed to record view for stream");
    } else {
        obs::inc_view_recorded();
    }
    obs::add_stream_bytes_sent(resolved.len);

    let status = if resolved.partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, resolved.len.to_string())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CACHE_CONTROL,
            state.config.delivery.cache_control.clone(),
        )
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", file_name),
        );
    if resolved.partial {
        builder = builder.header(header::CONTENT_RANGE, resolved.content_range(total_len));
    }

    match builder.body(body) {
        Ok(response) => response,
        Err(e) => {
            error!(%id, error = %e, "failed to build stream response");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Failed to build stream response.",
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Views and analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub status: String,
    pub media_id: String,
}

/// `POST /media/{media_id}/view` — record a view without streaming.
pub async fn record_view(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let id = match parse_media_id(&media_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(resp) = find_asset(&state, id).await {
        return resp;
    }

    let client = client_identity(&headers, Some(remote));
    match state.tracker.record_view(id, &client).await {
        Ok(crate::views::tracker::ViewOutcome::Admitted) => {
            obs::inc_view_recorded();
            Json(ViewResponse {
                status: "recorded".to_string(),
                media_id: id.to_string(),
            })
            .into_response()
        }
        Ok(crate::views::tracker::ViewOutcome::RateLimited { retry_after_secs }) => {
            obs::inc_rate_limited("view");
            stream_error_response(&StreamError::RateLimited { retry_after_secs })
        }
        Err(e) => {
            error!(%id, error = %e, "failed to record view");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Failed to record view.",
            )
        }
    }
}

/// `GET /media/{media_id}/analytics` — cached view statistics.
///
/// `X-Cache-Status` reports whether the snapshot was served from the
/// cache or recomputed from the view log.
pub async fn analytics(State(state): State<AppState>, Path(media_id): Path<String>) -> Response {
    let id = match parse_media_id(&media_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(resp) = find_asset(&state, id).await {
        return resp;
    }

    match state.analytics.get(id).await {
        Ok((snapshot, cache_status)) => {
            obs::inc_analytics_request(cache_status.as_str());
            obs::set_analytics_cache_entries(state.analytics.entry_count() as f64);

            let mut response = Json(snapshot).into_response();
            if let Ok(val) = cache_status.as_str().parse() {
                response.headers_mut().insert("x-cache-status", val);
            }
            response
        }
        Err(e) => {
            error!(%id, error = %e, "failed to compute analytics");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Failed to compute analytics.",
            )
        }
    }
}

/// `GET /media/{media_id}/view-log` — raw view-log entries, insertion order.
pub async fn view_log(State(state): State<AppState>, Path(media_id): Path<String>) -> Response {
    let id = match parse_media_id(&media_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(resp) = find_asset(&state, id).await {
        return resp;
    }

    match state.store.views_for(id).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => {
            error!(%id, error = %e, "failed to read view log");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Failed to read view log.",
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Health and metrics endpoints
// ---------------------------------------------------------------------------

/// `GET /healthz` — liveness probe.
pub async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /metrics` — Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    let metrics = state.metrics_handle.render();
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn parse_media_id(raw: &str) -> Result<MediaId, Response> {
    raw.parse::<uuid::Uuid>()
        .map(MediaId::from_uuid)
        .map_err(|_| {
            error_json(
                StatusCode::BAD_REQUEST,
                "invalid_media_id",
                "Invalid media ID format.",
            )
        })
}

async fn find_asset(state: &AppState, id: MediaId) -> Result<MediaAsset, Response> {
    match state.store.find_media(id).await {
        Ok(Some(asset)) => Ok(asset),
        Ok(None) => Err(stream_error_response(&StreamError::MediaNotFound {
            media_id: id.to_string(),
        })),
        Err(e) => {
            error!(%id, error = %e, "metadata lookup failed");
            Err(error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Metadata lookup failed.",
            ))
        }
    }
}
