//! HTTP routes for the face detection endpoint and the storage relay.

use crate::config::Config;
use crate::error::ApiError;
use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderValue, Request};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use facerelay_core::{normalize, BlobName, BlobReceipt, BlobStore, FaceDetector, Rectangle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Collaborators shared by every request. Built once at startup.
pub struct AppState<D, S> {
    pub detector: D,
    pub store: S,
}

#[derive(Debug, Deserialize)]
struct DetectRequest {
    /// Base64 image, optionally as a `data:<mime>;base64,` URL.
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Serialize)]
struct DetectResponse {
    faces: Vec<Rectangle>,
}

/// Build the application router with its middleware stack.
pub fn router<D: FaceDetector, S: BlobStore>(state: Arc<AppState<D, S>>, config: &Config) -> Router {
    Router::new()
        .route("/faces", post(detect_faces::<D, S>))
        .route("/storage/:name", get(get_blob::<D, S>).put(put_blob::<D, S>))
        .route("/status", get(status::<D, S>))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.cors_origins))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

async fn detect_faces<D: FaceDetector, S: BlobStore>(
    State(state): State<Arc<AppState<D, S>>>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let Json(request) = payload?;
    let encoded = request
        .image
        .filter(|s| !s.trim().is_empty())
        .ok_or(ApiError::MissingImage)?;
    let image = decode_image(&encoded)?;

    let annotations = state.detector.detect(&image).await?;
    let faces = normalize(&annotations);

    tracing::info!(
        image_bytes = image.len(),
        detected = annotations.len(),
        faces = faces.len(),
        "faces detected"
    );
    Ok(Json(DetectResponse { faces }))
}

fn decode_image(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    let image = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    if image.is_empty() {
        return Err(ApiError::MissingImage);
    }
    Ok(image)
}

fn resolve_name(name: &str) -> Result<BlobName, ApiError> {
    BlobName::parse(name).ok_or_else(|| ApiError::UnknownName(name.to_string()))
}

async fn put_blob<D: FaceDetector, S: BlobStore>(
    State(state): State<Arc<AppState<D, S>>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<BlobReceipt>, ApiError> {
    let blob = resolve_name(&name)?;
    let receipt = state.store.put(blob.key(), &body).await?;
    tracing::info!(
        name = blob.name(),
        key = blob.key(),
        size = receipt.size,
        "blob uploaded"
    );
    Ok(Json(receipt))
}

async fn get_blob<D: FaceDetector, S: BlobStore>(
    State(state): State<Arc<AppState<D, S>>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blob = resolve_name(&name)?;
    let data = state
        .store
        .get(blob.key())
        .await?
        .ok_or(ApiError::NotFound(blob.key()))?;
    tracing::debug!(name = blob.name(), size = data.len(), "blob downloaded");
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}

async fn status<D: FaceDetector, S: BlobStore>(
    State(state): State<Arc<AppState<D, S>>>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "detector": state.detector.name(),
        "store": state.store.name(),
        "objects": BlobName::accepted().collect::<Vec<_>>(),
    }))
}
