mod categories;
pub mod db;
mod images;
pub mod models;
mod tables;

pub use categories::{DeletedCategory, DEFAULT_TAXONOMY};
pub use db::{Database, DatabaseError};
pub use tables::*;
