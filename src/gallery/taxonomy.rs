use super::validation::{check_taxonomy_name, selected, ValidationErrors, INVALID_CHOICE, REQUIRED};
use super::GalleryError;
use crate::storage::models::{Category, Entity, Subcategory};
use crate::storage::{Database, DatabaseError, DeletedCategory};
use crate::AppState;

const DUPLICATE_CATEGORY: &str = "A category with this name already exists.";

fn duplicate_name(e: DatabaseError) -> GalleryError {
    match e {
        DatabaseError::Duplicate(_) => ValidationErrors::single("name", DUPLICATE_CATEGORY).into(),
        other => other.into(),
    }
}

pub fn create_category(state: &AppState, name: &str) -> Result<Category, GalleryError> {
    let mut errors = ValidationErrors::default();
    let Some(name) = check_taxonomy_name(&mut errors, name) else {
        return Err(errors.into());
    };

    let category = state.db.create_category(&name).map_err(duplicate_name)?;
    tracing::debug!(category_id = category.id, name = %category.name, "Created category");
    Ok(category)
}

pub fn rename_category(state: &AppState, id: u64, name: &str) -> Result<Category, GalleryError> {
    let mut errors = ValidationErrors::default();
    let Some(name) = check_taxonomy_name(&mut errors, name) else {
        return Err(errors.into());
    };

    let category = state.db.rename_category(id, &name).map_err(duplicate_name)?;
    tracing::debug!(category_id = id, name = %category.name, "Renamed category");
    Ok(category)
}

/// Delete an empty category together with all of its subcategories.
pub fn delete_category(state: &AppState, id: u64) -> Result<DeletedCategory, GalleryError> {
    match state.db.delete_category(id) {
        Ok(deleted) => {
            tracing::debug!(
                category_id = id,
                subcategories = deleted.subcategories,
                "Deleted category"
            );
            Ok(deleted)
        }
        Err(e @ DatabaseError::InUse { .. }) => {
            tracing::warn!(category_id = id, error = %e, "Refused to delete category");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolve the parent category selection of a subcategory form.
fn parent_category(
    db: &Database,
    category_id: Option<u64>,
    errors: &mut ValidationErrors,
) -> Result<Option<u64>, DatabaseError> {
    let Some(category_id) = selected(category_id) else {
        errors.add("category", REQUIRED);
        return Ok(None);
    };
    if db.get_category(category_id)?.is_none() {
        errors.add("category", INVALID_CHOICE);
        return Ok(None);
    }
    Ok(Some(category_id))
}

pub fn create_subcategory(
    state: &AppState,
    name: &str,
    category_id: Option<u64>,
) -> Result<Subcategory, GalleryError> {
    let mut errors = ValidationErrors::default();
    let name = check_taxonomy_name(&mut errors, name);
    let category_id = parent_category(&state.db, category_id, &mut errors)?;
    let (Some(name), Some(category_id)) = (name, category_id) else {
        return Err(errors.into());
    };

    let subcategory = state.db.create_subcategory(&name, category_id)?;
    tracing::debug!(
        subcategory_id = subcategory.id,
        category_id,
        name = %subcategory.name,
        "Created subcategory"
    );
    Ok(subcategory)
}

/// Rename a subcategory and optionally move it to another category.
pub fn update_subcategory(
    state: &AppState,
    id: u64,
    name: &str,
    category_id: Option<u64>,
) -> Result<Subcategory, GalleryError> {
    if state.db.get_subcategory(id)?.is_none() {
        return Err(DatabaseError::NotFound {
            entity: Entity::Subcategory,
            id,
        }
        .into());
    }

    let mut errors = ValidationErrors::default();
    let name = check_taxonomy_name(&mut errors, name);
    let category_id = parent_category(&state.db, category_id, &mut errors)?;
    let (Some(name), Some(category_id)) = (name, category_id) else {
        return Err(errors.into());
    };

    match state.db.update_subcategory(id, &name, category_id) {
        Ok(subcategory) => {
            tracing::debug!(subcategory_id = id, category_id, "Updated subcategory");
            Ok(subcategory)
        }
        Err(e @ DatabaseError::Pinned { .. }) => {
            tracing::warn!(subcategory_id = id, error = %e, "Refused to move subcategory");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a subcategory that holds no images.
pub fn delete_subcategory(state: &AppState, id: u64) -> Result<Subcategory, GalleryError> {
    match state.db.delete_subcategory(id) {
        Ok(subcategory) => {
            tracing::debug!(subcategory_id = id, "Deleted subcategory");
            Ok(subcategory)
        }
        Err(e @ DatabaseError::InUse { .. }) => {
            tracing::warn!(subcategory_id = id, error = %e, "Refused to delete subcategory");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
