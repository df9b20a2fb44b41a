//! Gallery operations: validation, the upload pipeline, image lifecycle and
//! taxonomy maintenance. Every operation validates before it mutates.

mod images;
mod taxonomy;
mod upload;
pub mod validation;

pub use images::{delete_image, edit_image, get_image, recent_images, search_images};
pub use taxonomy::{
    create_category, create_subcategory, delete_category, delete_subcategory, rename_category,
    update_subcategory,
};
pub use upload::{upload_image, ImageUpload, UploadedFile};
pub use validation::{sanitize_filename, ImageMetadata, ValidationErrors};

use thiserror::Error;

use crate::object_store::ObjectStoreError;
use crate::storage::DatabaseError;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] ObjectStoreError),
    #[error("Page {0} is out of range")]
    PageOutOfRange(u32),
}

impl From<ValidationErrors> for GalleryError {
    fn from(errors: ValidationErrors) -> Self {
        GalleryError::Validation(errors)
    }
}
