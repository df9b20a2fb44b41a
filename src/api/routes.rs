use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Room for the metadata fields and multipart framing around the file.
const FORM_OVERHEAD: usize = 64 * 1024;

/// Request body limit for the upload route.
fn upload_body_limit(max_upload_size: u64) -> usize {
    usize::try_from(max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = upload_body_limit(state.config.gallery.max_upload_size);

    Router::new()
        // Images
        .route(
            "/images",
            get(handlers::list_images)
                .post(handlers::upload_image)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/images/:id",
            get(handlers::get_image)
                .put(handlers::edit_image)
                .delete(handlers::delete_image),
        )
        .route("/search", get(handlers::search_images))
        // Taxonomy
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route(
            "/categories/:id",
            get(handlers::get_category)
                .put(handlers::rename_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/categories/:id/subcategories",
            get(handlers::list_category_subcategories),
        )
        .route("/subcategories", post(handlers::create_subcategory))
        .route(
            "/subcategories/:id",
            get(handlers::get_subcategory)
                .put(handlers::update_subcategory)
                .delete(handlers::delete_subcategory),
        )
        // Stored content
        .route("/uploads/*filename", get(handlers::serve_upload))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .route("/_internal/stats", get(handlers::stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
