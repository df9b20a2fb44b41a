use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppJson, AppQuery, JSend, JSendPaginated, Pagination};
use crate::gallery::{self, ImageMetadata, ImageUpload, UploadedFile};
use crate::storage::models::ImageRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub category_id: u64,
    pub description: Option<String>,
    pub filename: String,
    pub id: u64,
    pub name: String,
    pub prompt: Option<String>,
    pub subcategory_id: u64,
    pub upload_date: String,
    /// Route serving the stored file
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EditImageRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub category: Option<u64>,
    #[serde(default)]
    pub subcategory: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ListImagesParams {
    #[serde(default = "default_page")]
    pub page: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: u64,
    #[serde(default)]
    pub subcategory: u64,
}

fn default_page() -> u32 {
    1
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<JSend<ImageResponse>>, ApiError> {
    let mut upload = ImageUpload::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "image" => {
                let original_filename = field.file_name().unwrap_or("").to_string();

                let data = field.bytes().await.map_err(multipart_error)?;

                if data.len() as u64 > state.config.gallery.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {} bytes",
                        state.config.gallery.max_upload_size
                    )));
                }

                // A file input left empty still sends a part with no filename
                if !original_filename.is_empty() || !data.is_empty() {
                    upload.file = Some(UploadedFile {
                        original_filename,
                        data,
                    });
                }
            }
            "name" => upload.metadata.name = text_field(field).await?,
            "description" => {
                upload.metadata.description = Some(text_field(field).await?);
            }
            "prompt" => upload.metadata.prompt = Some(text_field(field).await?),
            "category" => {
                let text = text_field(field).await?;
                upload.metadata.category_id = parse_choice(&text, "category")?;
            }
            "subcategory" => {
                let text = text_field(field).await?;
                upload.metadata.subcategory_id = parse_choice(&text, "subcategory")?;
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let image = gallery::upload_image(&state, upload).await?;
    Ok(JSend::success(image_to_response(&image)))
}

pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<JSend<ImageResponse>>, ApiError> {
    let image = gallery::get_image(&state, id)?;
    Ok(JSend::success(image_to_response(&image)))
}

pub async fn edit_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    AppJson(req): AppJson<EditImageRequest>,
) -> Result<Json<JSend<ImageResponse>>, ApiError> {
    let metadata = ImageMetadata {
        name: req.name,
        description: req.description,
        prompt: req.prompt,
        category_id: req.category,
        subcategory_id: req.subcategory,
    };
    let image = gallery::edit_image(&state, id, metadata)?;
    Ok(JSend::success(image_to_response(&image)))
}

pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<JSend<()>>, ApiError> {
    gallery::delete_image(&state, id).await?;
    Ok(JSend::success(()))
}

/// Home listing: every image, newest first, one page at a time.
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListImagesParams>,
) -> Result<Json<JSendPaginated<ImageResponse>>, ApiError> {
    let page = gallery::recent_images(&state, params.page)?;
    let pagination = Pagination::from(&page);
    let items = page.items.iter().map(image_to_response).collect();
    Ok(JSendPaginated::success(items, pagination))
}

pub async fn search_images(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<JSend<Vec<ImageResponse>>>, ApiError> {
    let images = gallery::search_images(
        &state,
        params.q.as_deref(),
        params.category,
        params.subcategory,
    )?;
    Ok(JSend::success(images.iter().map(image_to_response).collect()))
}

// ============================================================================
// Helpers
// ============================================================================

/// The body limit surfaces here as a multipart read error.
fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the maximum request size")
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}

async fn text_field(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

/// Parse a select value; an empty value means nothing was selected.
fn parse_choice(text: &str, name: &str) -> Result<Option<u64>, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("{name} must be a non-negative integer")))
}

fn image_to_response(image: &ImageRecord) -> ImageResponse {
    ImageResponse {
        category_id: image.category_id,
        description: image.description.clone(),
        filename: image.filename.clone(),
        id: image.id,
        name: image.name.clone(),
        prompt: image.prompt.clone(),
        subcategory_id: image.subcategory_id,
        upload_date: image.upload_date.to_rfc3339(),
        url: format!("/uploads/{}", image.filename),
    }
}
