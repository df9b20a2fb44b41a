use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppJson, JSend};
use crate::gallery;
use crate::storage::models::{Category, Entity, Subcategory};
use crate::storage::DatabaseError;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: u64,
    pub name: String,
    pub subcategories: Vec<SubcategoryResponse>,
}

#[derive(Debug, Serialize)]
pub struct SubcategoryResponse {
    pub category_id: u64,
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteCategoryResponse {
    pub subcategories_deleted: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SubcategoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<u64>,
}

// ============================================================================
// Category handlers
// ============================================================================

/// All categories ordered by name, each with its subcategories.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<CategoryResponse>>>, ApiError> {
    let categories = state.db.list_categories()?;
    let subcategories = state.db.list_subcategories()?;

    let items = categories
        .into_iter()
        .map(|category| {
            let children = subcategories
                .iter()
                .filter(|s| s.category_id == category.id)
                .map(subcategory_to_response)
                .collect();
            category_to_response(category, children)
        })
        .collect();

    Ok(JSend::success(items))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<JSend<CategoryResponse>>, ApiError> {
    let category = state
        .db
        .get_category(id)?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    let children = children_of(&state, id)?;
    Ok(JSend::success(category_to_response(category, children)))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CategoryRequest>,
) -> Result<Json<JSend<CategoryResponse>>, ApiError> {
    let category = gallery::create_category(&state, &req.name)?;
    Ok(JSend::success(category_to_response(category, Vec::new())))
}

pub async fn rename_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    AppJson(req): AppJson<CategoryRequest>,
) -> Result<Json<JSend<CategoryResponse>>, ApiError> {
    let category = gallery::rename_category(&state, id, &req.name)?;
    let children = children_of(&state, id)?;
    Ok(JSend::success(category_to_response(category, children)))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<JSend<DeleteCategoryResponse>>, ApiError> {
    let deleted = gallery::delete_category(&state, id)?;
    Ok(JSend::success(DeleteCategoryResponse {
        subcategories_deleted: deleted.subcategories,
    }))
}

/// Subcategories of one category, for populating a dependent selection.
pub async fn list_category_subcategories(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<u64>,
) -> Result<Json<JSend<Vec<SubcategoryResponse>>>, ApiError> {
    if state.db.get_category(category_id)?.is_none() {
        return Err(DatabaseError::NotFound {
            entity: Entity::Category,
            id: category_id,
        }
        .into());
    }
    Ok(JSend::success(children_of(&state, category_id)?))
}

// ============================================================================
// Subcategory handlers
// ============================================================================

pub async fn get_subcategory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<JSend<SubcategoryResponse>>, ApiError> {
    let subcategory = state
        .db
        .get_subcategory(id)?
        .ok_or_else(|| ApiError::not_found("Subcategory not found"))?;
    Ok(JSend::success(subcategory_to_response(&subcategory)))
}

pub async fn create_subcategory(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SubcategoryRequest>,
) -> Result<Json<JSend<SubcategoryResponse>>, ApiError> {
    let subcategory = gallery::create_subcategory(&state, &req.name, req.category)?;
    Ok(JSend::success(subcategory_to_response(&subcategory)))
}

pub async fn update_subcategory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    AppJson(req): AppJson<SubcategoryRequest>,
) -> Result<Json<JSend<SubcategoryResponse>>, ApiError> {
    let subcategory = gallery::update_subcategory(&state, id, &req.name, req.category)?;
    Ok(JSend::success(subcategory_to_response(&subcategory)))
}

pub async fn delete_subcategory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<JSend<()>>, ApiError> {
    gallery::delete_subcategory(&state, id)?;
    Ok(JSend::success(()))
}

// ============================================================================
// Helpers
// ============================================================================

fn children_of(state: &AppState, category_id: u64) -> Result<Vec<SubcategoryResponse>, ApiError> {
    Ok(state
        .db
        .list_subcategories_for(category_id)?
        .iter()
        .map(subcategory_to_response)
        .collect())
}

fn category_to_response(
    category: Category,
    subcategories: Vec<SubcategoryResponse>,
) -> CategoryResponse {
    CategoryResponse {
        id: category.id,
        name: category.name,
        subcategories,
    }
}

fn subcategory_to_response(subcategory: &Subcategory) -> SubcategoryResponse {
    SubcategoryResponse {
        category_id: subcategory.category_id,
        id: subcategory.id,
        name: subcategory.name.clone(),
    }
}
