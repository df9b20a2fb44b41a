//! Shared test helpers for image-gallery unit tests.

use std::sync::Arc;

use crate::config::{Config, GalleryConfig, ServerConfig, StorageConfig};
use crate::object_store::{LocalStore, ObjectStore};
use crate::storage::models::{Category, Subcategory};
use crate::storage::Database;
use crate::AppState;

/// Create a seeded test AppState with a temporary catalog and content directory.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with_store(temp_dir, |_, store| Arc::new(store))
}

/// Like [`test_state`], but lets the test wrap the content store.
pub fn test_state_with_store<F>(temp_dir: &tempfile::TempDir, make_store: F) -> Arc<AppState>
where
    F: FnOnce(&Database, LocalStore) -> Arc<dyn ObjectStore>,
{
    let database_path = temp_dir.path().join("data").join("gallery.redb");
    let upload_dir = temp_dir.path().join("uploads");

    let config = Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
        },
        storage: StorageConfig {
            database_path: database_path.clone(),
            upload_dir: upload_dir.clone(),
        },
        gallery: GalleryConfig {
            max_upload_size: 1024 * 1024, // 1MB for tests
            images_per_page: 2,
            ..Default::default()
        },
    };

    let db = Database::open(&database_path).expect("Failed to open test database");
    db.seed_defaults().expect("Failed to seed test database");
    let local = LocalStore::new(&upload_dir).expect("Failed to create test object store");
    let object_store = make_store(&db, local);

    Arc::new(AppState {
        config,
        db,
        object_store,
    })
}

/// Look up a category by name.
pub fn category_named(db: &Database, name: &str) -> Category {
    db.list_categories()
        .expect("Failed to read categories")
        .into_iter()
        .find(|c| c.name == name)
        .expect("category should be seeded")
}

/// Look up a seeded subcategory by its category and subcategory names.
pub fn subcategory_named(state: &AppState, category: &str, subcategory: &str) -> Subcategory {
    let category = category_named(&state.db, category);
    state
        .db
        .list_subcategories_for(category.id)
        .expect("Failed to read subcategories")
        .into_iter()
        .find(|s| s.name == subcategory)
        .expect("subcategory should be seeded")
}
