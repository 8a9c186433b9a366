use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::{Extension, Form};
use base64::{engine::general_purpose, Engine};
use serde::Deserialize;
use std::any::Any;
use tracing::{debug, error, info, warn};

use crate::core::config::MAX_UPLOAD_BYTES;
use crate::core::errors::{IntakeError, IntakeResult};
use crate::core::types::{AnalysisResult, Flash, ResultId, ResultImage, SessionId, UploadPayload};
use crate::utils::image_ops::highlight_jpeg_async;
use crate::web::views;
use crate::web::AppState;

const NO_RESULT_WARNING: &str = "No image has been analyzed. Please upload an image first.";

#[derive(Debug, Deserialize)]
pub struct UploadForm {
    image_data: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HighlightQuery {
    highlight: Option<String>,
}

impl HighlightQuery {
    fn enabled(&self) -> bool {
        matches!(
            self.highlight.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("true" | "1" | "yes" | "on")
        )
    }
}

/// Upload form
pub async fn index(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Html<String> {
    state.metrics.record_endpoint_request("/");
    Html(views::index_page(&state.flashes.take(&session)))
}

/// Accept a multipart or urlencoded upload and run the analysis.
///
/// # Request Format:
/// - Field "file": image file (png, jpg, jpeg), or
/// - Field "image_data": base64 image, optionally `data:...;base64,` prefixed
///
/// # Response:
/// - 303 to /results on success, 303 to / with a flash otherwise
/// - 413 with `Location: /` when the body exceeds 16MB
pub async fn upload(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    request: Request,
) -> Response {
    state.metrics.record_endpoint_request("/upload");

    let payload = match read_payload(&state, request).await {
        Ok(payload) => payload,
        Err(IntakeError::TooLarge { limit }) => {
            warn!("Upload exceeded {} bytes", limit);
            return too_large(&state, &session);
        }
        Err(e) => {
            info!("Upload rejected: {}", e);
            state.metrics.record_rejected_upload();
            return redirect_with(&state, &session, Flash::error(e.user_message(false)), "/");
        }
    };

    let captured = payload.is_captured();
    match state.orchestrator.analyze_upload(payload).await {
        Ok(result) => {
            state.results.put(&session, result);
            Redirect::to("/results").into_response()
        }
        Err(e) => redirect_with(&state, &session, Flash::error(e.user_message(captured)), "/"),
    }
}

async fn read_payload(state: &AppState, request: Request) -> IntakeResult<UploadPayload> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if !is_multipart {
        let Form(form) = Form::<UploadForm>::from_request(request, state)
            .await
            .map_err(|rejection| match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => IntakeError::TooLarge {
                    limit: MAX_UPLOAD_BYTES,
                },
                _ => IntakeError::NoImageData,
            })?;
        return match form.image_data {
            Some(data) if !data.trim().is_empty() => Ok(UploadPayload::DataUrl(data)),
            _ => Err(IntakeError::NoFileSelected),
        };
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|_| IntakeError::NoImageData)?;
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            IntakeError::TooLarge {
                limit: MAX_UPLOAD_BYTES,
            }
        } else {
            debug!("Malformed multipart body: {}", e);
            IntakeError::NoImageData
        }
    };

    let mut file = None;
    let mut image_data = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, bytes.to_vec()));
            }
            "image_data" => {
                image_data = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    match (file, image_data) {
        (Some((filename, bytes)), _) if !filename.is_empty() => {
            Ok(UploadPayload::File { filename, bytes })
        }
        (_, Some(data)) if !data.trim().is_empty() => Ok(UploadPayload::DataUrl(data)),
        _ => Err(IntakeError::NoFileSelected),
    }
}

/// 413 answer: flash the size error and point the browser back at the form
fn too_large(state: &AppState, session: &SessionId) -> Response {
    state.metrics.record_oversized_body();
    state.flashes.push(
        session,
        Flash::error(IntakeError::TooLarge { limit: MAX_UPLOAD_BYTES }.user_message(false)),
    );
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        [(LOCATION, "/")],
        Html(r#"<!DOCTYPE html><meta http-equiv="refresh" content="0; url=/"><a href="/">Back</a>"#),
    )
        .into_response()
}

fn redirect_with(state: &AppState, session: &SessionId, flash: Flash, to: &str) -> Response {
    state.flashes.push(session, flash);
    if let Some(ref cleanup) = state.on_demand_cleanup {
        cleanup.spawn_if_due();
    }
    Redirect::to(to).into_response()
}

/// Latest result for the session
pub async fn results(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Query(query): Query<HighlightQuery>,
) -> Response {
    state.metrics.record_endpoint_request("/results");

    let Some(result) = state.results.get(&session) else {
        return redirect_with(&state, &session, Flash::warning(NO_RESULT_WARNING), "/");
    };

    let highlighted = query.enabled() && !result.affected_areas.is_empty();
    let image_src = match &result.image {
        ResultImage::Stored { id } if highlighted => {
            format!("/results/image/{}?highlight=true", id)
        }
        ResultImage::Stored { id } => format!("/results/image/{}", id),
        ResultImage::Inline { jpeg_base64 } if highlighted => {
            let rendered = inline_highlight(&state, &result, jpeg_base64).await;
            let encoded = rendered.as_deref().unwrap_or(jpeg_base64.as_str());
            format!("data:image/jpeg;base64,{}", encoded)
        }
        ResultImage::Inline { jpeg_base64 } => format!("data:image/jpeg;base64,{}", jpeg_base64),
    };

    let flashes = state.flashes.take(&session);
    Html(views::results_page(&result, &image_src, highlighted, &flashes)).into_response()
}

async fn inline_highlight(
    state: &AppState,
    result: &AnalysisResult,
    jpeg_base64: &str,
) -> Option<String> {
    let jpeg = match general_purpose::STANDARD.decode(jpeg_base64) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            error!("Stored inline image is not valid base64: {}", e);
            return None;
        }
    };
    match highlight_jpeg_async(jpeg, result.display_areas(), state.orchestrator.jpeg_quality()).await
    {
        Ok(rendered) => Some(general_purpose::STANDARD.encode(rendered)),
        Err(e) => {
            error!("Highlighting failed: {:#}", e);
            None
        }
    }
}

/// Stored display JPEG, optionally with the session's affected areas outlined
pub async fn result_image(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Path(raw_id): Path<String>,
    Query(query): Query<HighlightQuery>,
) -> Response {
    state.metrics.record_endpoint_request("/results/image");

    let id = match ResultId::parse(&raw_id) {
        Ok(id) => id,
        Err(e) => {
            warn!("Rejected result image request: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid result ID").into_response();
        }
    };

    let jpeg = match state.images.fetch(&id).await {
        Ok(Some(jpeg)) => jpeg,
        Ok(None) => return (StatusCode::NOT_FOUND, "Image not found").into_response(),
        Err(e) => {
            error!("Failed to read result image {}: {}", id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    let areas = query
        .enabled()
        .then(|| state.results.get(&session))
        .flatten()
        .filter(|result| result.stored_id() == Some(&id))
        .map(|result| result.display_areas())
        .filter(|areas| !areas.is_empty());

    let body = match areas {
        Some(areas) => {
            match highlight_jpeg_async(jpeg.clone(), areas, state.orchestrator.jpeg_quality()).await
            {
                Ok(rendered) => rendered,
                Err(e) => {
                    error!("Highlighting failed for {}: {:#}", id, e);
                    jpeg
                }
            }
        }
        None => jpeg,
    };

    state.metrics.record_image_served();
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "image/jpeg"), (CACHE_CONTROL, "private, max-age=3600")],
        body,
    )
        .into_response()
}

/// Whole disease catalog
pub async fn browse(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
) -> Html<String> {
    state.metrics.record_endpoint_request("/browse");
    Html(views::browse_page(
        state.catalog.all(),
        &state.flashes.take(&session),
    ))
}

/// JSON lookup of one catalog record
pub async fn disease_api(State(state): State<AppState>, Path(raw_id): Path<String>) -> Response {
    state.metrics.record_endpoint_request("/api/disease");

    match raw_id.parse::<u32>().ok().and_then(|id| state.catalog.lookup(id)) {
        Some(record) => Json(record.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Disease not found" })),
        )
            .into_response(),
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
pub async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

/// Outermost panic boundary: log and answer with a bare 500
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    error!("Request handler panicked: {}", detail);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
