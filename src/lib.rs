//! image-gallery - An image gallery service with a two-level taxonomy
//!
//! This crate provides image upload, browsing and search with:
//! - A category/subcategory taxonomy guarded against orphaning images
//! - Uploaded files kept in a flat local directory under sanitized filenames
//! - redb embedded database for the catalog (ACID, MVCC, crash-safe)
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod gallery;
pub mod object_store;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn object_store::ObjectStore>,
}
