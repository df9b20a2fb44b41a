use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::object_store::ObjectStoreError;
use crate::AppState;

/// Serve a stored image by its filename.
/// Route: GET /uploads/*filename
pub async fn serve_upload(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(filename): axum::extract::Path<String>,
) -> Result<Response, ApiError> {
    // Only files the catalog knows about are served
    let image = state
        .db
        .get_image_by_filename(&filename)?
        .ok_or_else(|| ApiError::not_found("Image not found"))?;

    let data = state
        .object_store
        .get(&image.filename)
        .await
        .map_err(|e| match e {
            ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidKey(_) => {
                ApiError::not_found("Image file not found")
            }
            _ => ApiError::internal(format!("Failed to retrieve image: {e}")),
        })?;

    let content_type = mime_guess::from_path(&image.filename)
        .first_or_octet_stream()
        .to_string();
    let byte_size = data.len() as u64;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        content_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(byte_size));

    if let Ok(value) = format!("inline; filename=\"{}\"", image.filename).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Stored files never change in place; edits only touch metadata
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=3600"),
    );

    Ok(response)
}
