use bytes::Bytes;
use chrono::Utc;

use super::validation::{
    check_file, check_metadata, ImageMetadata, ValidationErrors, DUPLICATE_FILE_IN_CATALOG,
    DUPLICATE_FILE_ON_DISK,
};
use super::GalleryError;
use crate::object_store::ObjectStoreError;
use crate::storage::models::{ImageRecord, NewImage};
use crate::storage::DatabaseError;
use crate::AppState;

/// A file received from a client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_filename: String,
    pub data: Bytes,
}

/// An image submission: metadata plus the attached file, if any
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub metadata: ImageMetadata,
    pub file: Option<UploadedFile>,
}

/// Validate a submission, store its file under the sanitized filename and
/// create the matching catalog row.
///
/// Nothing is written unless every check passes. The file is published
/// before the row is inserted; if the insert fails the file is removed
/// again, and a failed removal leaves an orphaned file that is logged.
pub async fn upload_image(
    state: &AppState,
    upload: ImageUpload,
) -> Result<ImageRecord, GalleryError> {
    let mut errors = ValidationErrors::default();

    let changes = check_metadata(&state.db, &upload.metadata, &mut errors)?;

    let byte_size = upload.file.as_ref().map_or(0, |f| f.data.len() as u64);
    let original_filename = upload.file.as_ref().map(|f| f.original_filename.as_str());
    let filename = check_file(
        &state.config.gallery,
        original_filename,
        byte_size,
        &mut errors,
    );

    if let Some(ref filename) = filename {
        if state.object_store.exists(filename).await? {
            errors.add("image", DUPLICATE_FILE_ON_DISK);
        } else if state.db.filename_exists(filename)? {
            errors.add("image", DUPLICATE_FILE_IN_CATALOG);
        }
    }

    let (changes, filename, data) = match (changes, filename, upload.file) {
        (Some(changes), Some(filename), Some(file)) if errors.is_empty() => {
            (changes, filename, file.data)
        }
        _ => return Err(GalleryError::Validation(errors)),
    };

    let staged = state.object_store.stage(data).await?;
    let staged_size = staged.byte_size();
    if let Err(e) = state.object_store.promote(staged, &filename).await {
        return Err(match e {
            // Another upload took the name after validation
            ObjectStoreError::AlreadyExists(_) => {
                ValidationErrors::single("image", DUPLICATE_FILE_ON_DISK).into()
            }
            other => other.into(),
        });
    }

    let new_image = NewImage {
        name: changes.name,
        filename: filename.clone(),
        description: changes.description,
        prompt: changes.prompt,
        upload_date: Utc::now(),
        category_id: changes.category_id,
        subcategory_id: changes.subcategory_id,
    };

    match state.db.insert_image(new_image) {
        Ok(image) => {
            tracing::debug!(
                image_id = image.id,
                filename = %image.filename,
                byte_size = staged_size,
                "Uploaded image"
            );
            Ok(image)
        }
        Err(e) => {
            match state.object_store.delete(&filename).await {
                Ok(_) => tracing::warn!(
                    filename = %filename,
                    error = %e,
                    "Catalog insert failed, removed stored file"
                ),
                Err(cleanup) => tracing::error!(
                    filename = %filename,
                    error = %e,
                    cleanup_error = %cleanup,
                    "Catalog insert failed and the stored file could not be removed; file is orphaned"
                ),
            }
            Err(insert_error(e))
        }
    }
}

/// Constraint violations raised inside the insert transaction are reported
/// the same way as their pre-write validation counterparts.
fn insert_error(e: DatabaseError) -> GalleryError {
    match e {
        DatabaseError::Duplicate(_) => {
            ValidationErrors::single("image", DUPLICATE_FILE_IN_CATALOG).into()
        }
        DatabaseError::InvalidReference(reason) => {
            ValidationErrors::single("subcategory", reason).into()
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::validation::REQUIRED;
    use crate::object_store::{LocalStore, ObjectStore, StagedObject};
    use crate::storage::Database;
    use crate::testutil::{subcategory_named, test_state, test_state_with_store};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Never reports an existing file, so only `promote` can catch a taken name.
    struct BlindStore {
        inner: LocalStore,
    }

    #[async_trait]
    impl ObjectStore for BlindStore {
        async fn stage(&self, data: Bytes) -> Result<StagedObject, ObjectStoreError> {
            self.inner.stage(data).await
        }
        async fn promote(&self, staged: StagedObject, key: &str) -> Result<(), ObjectStoreError> {
            self.inner.promote(staged, key).await
        }
        async fn discard(&self, staged: StagedObject) -> Result<(), ObjectStoreError> {
            self.inner.discard(staged).await
        }
        async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
            self.inner.get(key).await
        }
        async fn delete(&self, key: &str) -> Result<bool, ObjectStoreError> {
            self.inner.delete(key).await
        }
        async fn exists(&self, _key: &str) -> Result<bool, ObjectStoreError> {
            Ok(false)
        }
    }

    /// Deletes the "Nature" subcategory right after publishing a file, so the
    /// catalog insert that follows fails.
    struct RacingStore {
        inner: LocalStore,
        db: Database,
    }

    #[async_trait]
    impl ObjectStore for RacingStore {
        async fn stage(&self, data: Bytes) -> Result<StagedObject, ObjectStoreError> {
            self.inner.stage(data).await
        }
        async fn promote(&self, staged: StagedObject, key: &str) -> Result<(), ObjectStoreError> {
            self.inner.promote(staged, key).await?;
            let nature = self
                .db
                .list_subcategories()
                .unwrap()
                .into_iter()
                .find(|s| s.name == "Nature")
                .unwrap();
            self.db.delete_subcategory(nature.id).unwrap();
            Ok(())
        }
        async fn discard(&self, staged: StagedObject) -> Result<(), ObjectStoreError> {
            self.inner.discard(staged).await
        }
        async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
            self.inner.get(key).await
        }
        async fn delete(&self, key: &str) -> Result<bool, ObjectStoreError> {
            self.inner.delete(key).await
        }
        async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
            self.inner.exists(key).await
        }
    }

    fn staged_files(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path().join("uploads"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .count()
    }

    fn lake_view(state: &AppState) -> ImageUpload {
        let nature = subcategory_named(state, "Photography", "Nature");
        ImageUpload {
            metadata: ImageMetadata {
                name: "Lake View".to_string(),
                description: Some("Still water at dawn".to_string()),
                prompt: None,
                category_id: Some(nature.category_id),
                subcategory_id: Some(nature.id),
            },
            file: Some(UploadedFile {
                original_filename: "lake view.PNG".to_string(),
                data: Bytes::from_static(b"\x89PNG fake"),
            }),
        }
    }

    #[tokio::test]
    async fn upload_stores_file_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let image = upload_image(&state, lake_view(&state)).await.unwrap();

        assert_eq!(image.filename, "lake_view.PNG");
        assert_eq!(image.name, "Lake View");
        assert!(state.object_store.exists("lake_view.PNG").await.unwrap());
        let row = state.db.get_image(image.id).unwrap().unwrap();
        assert_eq!(row, image);
    }

    #[tokio::test]
    async fn reupload_of_same_filename_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        upload_image(&state, lake_view(&state)).await.unwrap();
        let err = upload_image(&state, lake_view(&state)).await.unwrap_err();

        match err {
            GalleryError::Validation(errors) => {
                assert_eq!(errors.messages("image"), [DUPLICATE_FILE_ON_DISK.to_string()]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(state.db.search_images(&Default::default()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn catalog_row_without_file_still_blocks_filename() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        upload_image(&state, lake_view(&state)).await.unwrap();
        state.object_store.delete("lake_view.PNG").await.unwrap();

        let err = upload_image(&state, lake_view(&state)).await.unwrap_err();
        match err {
            GalleryError::Validation(errors) => {
                assert_eq!(
                    errors.messages("image"),
                    [DUPLICATE_FILE_IN_CATALOG.to_string()]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(!state.object_store.exists("lake_view.PNG").await.unwrap());
    }

    #[tokio::test]
    async fn short_name_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let mut upload = lake_view(&state);
        upload.metadata.name = "ab".to_string();
        let err = upload_image(&state, upload).await.unwrap_err();

        assert!(matches!(err, GalleryError::Validation(ref e) if e.has("name")));
        assert!(!state.object_store.exists("lake_view.PNG").await.unwrap());
        assert!(!state.db.filename_exists("lake_view.PNG").unwrap());
    }

    #[tokio::test]
    async fn all_field_errors_are_reported_together() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let upload = ImageUpload {
            metadata: ImageMetadata {
                name: String::new(),
                description: Some("d".repeat(1001)),
                prompt: Some("p".repeat(501)),
                category_id: Some(0),
                subcategory_id: None,
            },
            file: None,
        };
        let err = upload_image(&state, upload).await.unwrap_err();

        let GalleryError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        for field in ["name", "description", "prompt", "category", "subcategory"] {
            assert!(errors.has(field), "missing error for {field}");
        }
        assert_eq!(errors.messages("image"), [REQUIRED.to_string()]);
    }

    #[tokio::test]
    async fn subcategory_from_other_category_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let mut upload = lake_view(&state);
        let logos = subcategory_named(&state, "Design", "Logos");
        upload.metadata.subcategory_id = Some(logos.id);

        let err = upload_image(&state, upload).await.unwrap_err();
        assert!(matches!(err, GalleryError::Validation(ref e) if e.has("subcategory")));
        assert!(!state.object_store.exists("lake_view.PNG").await.unwrap());
    }

    #[tokio::test]
    async fn overlong_filename_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let mut upload = lake_view(&state);
        let original = format!("{}.png", "a".repeat(300));
        if let Some(file) = upload.file.as_mut() {
            file.original_filename = original;
        }

        let err = upload_image(&state, upload).await.unwrap_err();
        assert!(matches!(err, GalleryError::Validation(ref e) if e.has("image")));
        assert!(state.db.search_images(&Default::default()).unwrap().is_empty());
        assert_eq!(staged_files(&dir), 0);
    }

    #[tokio::test]
    async fn name_taken_during_publish_is_a_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_with_store(&dir, |_, store| Arc::new(BlindStore { inner: store }));

        // Another upload already published this name
        let staged = state
            .object_store
            .stage(Bytes::from_static(b"first"))
            .await
            .unwrap();
        state
            .object_store
            .promote(staged, "lake_view.PNG")
            .await
            .unwrap();

        let err = upload_image(&state, lake_view(&state)).await.unwrap_err();
        let GalleryError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.messages("image"), [DUPLICATE_FILE_ON_DISK.to_string()]);

        // The existing file is untouched and no row or staged file remains
        let kept = state.object_store.get("lake_view.PNG").await.unwrap();
        assert_eq!(kept, Bytes::from_static(b"first"));
        assert!(!state.db.filename_exists("lake_view.PNG").unwrap());
        assert_eq!(staged_files(&dir), 0);
    }

    #[tokio::test]
    async fn failed_insert_removes_published_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_with_store(&dir, |db, store| {
            Arc::new(RacingStore {
                inner: store,
                db: db.clone(),
            })
        });

        let err = upload_image(&state, lake_view(&state)).await.unwrap_err();
        assert!(matches!(err, GalleryError::Validation(ref e) if e.has("subcategory")));

        assert!(!state.object_store.exists("lake_view.PNG").await.unwrap());
        assert!(!state.db.filename_exists("lake_view.PNG").unwrap());
        assert!(state.db.search_images(&Default::default()).unwrap().is_empty());
        assert_eq!(staged_files(&dir), 0);
    }
}
