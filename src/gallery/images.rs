use super::validation::{check_metadata, ImageMetadata, ValidationErrors, SEARCH_TERM_MAX};
use super::GalleryError;
use crate::object_store::ObjectStoreError;
use crate::storage::models::{Entity, ImageFilter, ImageRecord, Page};
use crate::storage::DatabaseError;
use crate::AppState;

fn not_found(id: u64) -> DatabaseError {
    DatabaseError::NotFound {
        entity: Entity::Image,
        id,
    }
}

pub fn get_image(state: &AppState, id: u64) -> Result<ImageRecord, GalleryError> {
    Ok(state.db.get_image(id)?.ok_or_else(|| not_found(id))?)
}

/// Replace an image's name, description, prompt and taxonomy tags.
pub fn edit_image(
    state: &AppState,
    id: u64,
    metadata: ImageMetadata,
) -> Result<ImageRecord, GalleryError> {
    get_image(state, id)?;

    let mut errors = ValidationErrors::default();
    let changes = check_metadata(&state.db, &metadata, &mut errors)?;
    let Some(changes) = changes.filter(|_| errors.is_empty()) else {
        return Err(GalleryError::Validation(errors));
    };

    let image = state.db.update_image(id, changes).map_err(|e| match e {
        DatabaseError::InvalidReference(reason) => {
            GalleryError::Validation(ValidationErrors::single("subcategory", reason))
        }
        other => other.into(),
    })?;

    tracing::debug!(image_id = id, "Updated image");
    Ok(image)
}

/// Delete an image's file, then its row.
///
/// A file that is already gone does not block the row deletion. Any other
/// failure to remove the file aborts before the catalog is touched.
pub async fn delete_image(state: &AppState, id: u64) -> Result<ImageRecord, GalleryError> {
    let image = get_image(state, id)?;

    match state.object_store.delete(&image.filename).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(image_id = id, filename = %image.filename, "Image file already missing");
        }
        Err(ObjectStoreError::InvalidKey(key)) => {
            tracing::warn!(image_id = id, filename = %key, "Image has an unusable filename");
        }
        Err(e) => return Err(e.into()),
    }

    if !state.db.delete_image_row(id)? {
        return Err(not_found(id).into());
    }

    tracing::debug!(image_id = id, filename = %image.filename, "Deleted image");
    Ok(image)
}

/// One page of the home listing. Pages are 1-based; a page past the end
/// other than the first is reported as not found.
pub fn recent_images(state: &AppState, page: u32) -> Result<Page<ImageRecord>, GalleryError> {
    if page == 0 {
        return Err(ValidationErrors::single("page", "Page numbers start at 1").into());
    }

    let listing = state
        .db
        .recent_images(page, state.config.gallery.images_per_page)?;
    if listing.items.is_empty() && page > 1 {
        return Err(GalleryError::PageOutOfRange(page));
    }
    Ok(listing)
}

/// Images matching every given criterion, newest first. A taxonomy id of 0
/// means "all".
pub fn search_images(
    state: &AppState,
    term: Option<&str>,
    category_id: u64,
    subcategory_id: u64,
) -> Result<Vec<ImageRecord>, GalleryError> {
    if let Some(term) = term {
        if term.chars().count() > SEARCH_TERM_MAX {
            return Err(ValidationErrors::single(
                "q",
                "Search query cannot exceed 200 characters",
            )
            .into());
        }
    }

    let filter = ImageFilter::from_raw(term, category_id, subcategory_id);
    Ok(state.db.search_images(&filter)?)
}
