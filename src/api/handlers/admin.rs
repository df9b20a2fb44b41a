use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub categories: usize,
    pub images: usize,
    pub subcategories: usize,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Catalog entity counts.
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<JSend<StatsResponse>>, ApiError> {
    let stats = StatsResponse {
        categories: state.db.list_categories()?.len(),
        images: state.db.search_images(&Default::default())?.len(),
        subcategories: state.db.list_subcategories()?.len(),
    };
    Ok(JSend::success(stats))
}
