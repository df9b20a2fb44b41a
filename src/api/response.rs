use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::gallery::{GalleryError, ValidationErrors};
use crate::storage::models::Page;
use crate::storage::DatabaseError;

// ============================================================================
// JSend status enum
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

// ============================================================================
// JSend success envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSend<T: Serialize> {
    pub data: T,
    pub status: JSendStatus,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend {
            data,
            status: JSendStatus::Success,
        })
    }
}

// ============================================================================
// JSend paginated envelope
// ============================================================================

#[derive(Debug, Serialize)]
pub struct JSendPaginated<T: Serialize> {
    pub data: PaginatedData<T>,
    pub status: JSendStatus,
}

#[derive(Debug, Serialize)]
pub struct PaginatedData<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub has_next: bool,
    pub has_prev: bool,
    pub page: u32,
    pub pages: u64,
    pub per_page: u32,
    pub total: u64,
}

impl<T> From<&Page<T>> for Pagination {
    fn from(page: &Page<T>) -> Self {
        Pagination {
            has_next: page.has_next(),
            has_prev: page.has_prev(),
            page: page.page,
            pages: page.pages(),
            per_page: page.per_page,
            total: page.total,
        }
    }
}

impl<T: Serialize> JSendPaginated<T> {
    pub fn success(items: Vec<T>, pagination: Pagination) -> Json<JSendPaginated<T>> {
        Json(JSendPaginated {
            data: PaginatedData { items, pagination },
            status: JSendStatus::Success,
        })
    }
}

// ============================================================================
// JSend fail envelope (client errors, 4xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendFail {
    pub data: FailData,
    pub status: JSendStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailData {
    pub message: String,
    /// Field name -> messages, present for validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

impl JSendFail {
    pub fn response(
        status_code: StatusCode,
        message: impl Into<String>,
    ) -> (StatusCode, Json<JSendFail>) {
        (
            status_code,
            Json(JSendFail {
                data: FailData {
                    message: message.into(),
                    errors: None,
                },
                status: JSendStatus::Fail,
            }),
        )
    }

    pub fn validation(errors: ValidationErrors) -> (StatusCode, Json<JSendFail>) {
        (
            StatusCode::BAD_REQUEST,
            Json(JSendFail {
                data: FailData {
                    message: "Validation failed".to_string(),
                    errors: Some(errors),
                },
                status: JSendStatus::Fail,
            }),
        )
    }
}

// ============================================================================
// JSend error envelope (server errors, 5xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendError {
    pub message: String,
    pub status: JSendStatus,
}

impl JSendError {
    pub fn response(
        status_code: StatusCode,
        message: impl Into<String>,
    ) -> (StatusCode, Json<JSendError>) {
        (
            status_code,
            Json(JSendError {
                message: message.into(),
                status: JSendStatus::Error,
            }),
        )
    }
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

/// A JSend-compatible error that can be either a fail (4xx) or error (5xx).
#[derive(Debug)]
pub enum ApiError {
    Fail(StatusCode, String),
    Invalid(ValidationErrors),
    Error(StatusCode, String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Fail(code, msg) => {
                let (status, json) = JSendFail::response(code, msg);
                (status, json).into_response()
            }
            ApiError::Invalid(errors) => {
                let (status, json) = JSendFail::validation(errors);
                (status, json).into_response()
            }
            ApiError::Error(code, msg) => {
                let (status, json) = JSendError::response(code, msg);
                (status, json).into_response()
            }
        }
    }
}

impl From<GalleryError> for ApiError {
    fn from(e: GalleryError) -> Self {
        match e {
            GalleryError::Validation(errors) => ApiError::Invalid(errors),
            GalleryError::PageOutOfRange(page) => {
                ApiError::not_found(format!("Page {page} is out of range"))
            }
            GalleryError::Database(e) => e.into(),
            GalleryError::Storage(e) => {
                tracing::error!(error = %e, "Content storage failure");
                ApiError::internal(format!("Failed to access image storage: {e}"))
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity, .. } => {
                ApiError::not_found(format!("{entity} not found"))
            }
            DatabaseError::InUse { entity, .. } => ApiError::conflict(format!(
                "Cannot delete {} that contains images. Move or delete the images first.",
                entity.to_string().to_lowercase()
            )),
            DatabaseError::Pinned { entity, .. } => ApiError::conflict(format!(
                "Cannot move a {} that contains images to another category. \
                 Move or delete the images first.",
                entity.to_string().to_lowercase()
            )),
            DatabaseError::Duplicate(what) => ApiError::conflict(format!("{what} already exists")),
            DatabaseError::InvalidReference(reason) => ApiError::bad_request(reason),
            other => {
                tracing::error!(error = %other, "Catalog failure");
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::NOT_FOUND, message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::PAYLOAD_TOO_LARGE, message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::CONFLICT, message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }
}

// ============================================================================
// Custom extractors (reject with JSend-formatted ApiError)
// ============================================================================

/// Drop-in replacement for `axum::Json` that rejects with JSend errors.
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = match rejection {
                    JsonRejection::JsonDataError(err) => {
                        format!("Invalid request body: {}", err.body_text())
                    }
                    JsonRejection::JsonSyntaxError(_) => "Malformed JSON in request body".into(),
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing Content-Type: application/json header".into()
                    }
                    _ => "Failed to read request body".into(),
                };
                Err(ApiError::bad_request(message))
            }
        }
    }
}

/// Drop-in replacement for `axum::extract::Query` that rejects with JSend errors.
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, ApiError> {
        let query = parts.uri.query().unwrap_or_default();
        serde_qs::from_str(query)
            .map(AppQuery)
            .map_err(|e| ApiError::bad_request(friendly_query_error(&e.to_string())))
    }
}

/// Translate serde/serde_qs error messages into human-friendly descriptions.
fn friendly_query_error(raw: &str) -> String {
    let cleaned = raw
        .replace("u32", "non-negative integer")
        .replace("u64", "non-negative integer")
        .replace("i32", "integer")
        .replace("i64", "integer");

    format!("Invalid query parameter: {cleaned}")
}
