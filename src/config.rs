use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Largest accepted `MAX_UPLOAD_SIZE`; uploads are buffered in memory.
pub const UPLOAD_SIZE_LIMIT: u64 = 1024 * 1024 * 1024;

/// Extensions accepted for uploads when `ALLOWED_EXTENSIONS` is unset.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "svg"];

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub gallery: GalleryConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Catalog database file
    pub database_path: PathBuf,
    /// Flat directory holding uploaded image files
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Lowercase extensions without the leading dot
    pub allowed_extensions: Vec<String>,
    /// Page size of the home listing
    pub images_per_page: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: Path::new("./data").join("gallery.redb"),
            upload_dir: PathBuf::from("./uploads"),
        }
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 16 * 1024 * 1024, // 16MB
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            images_per_page: 12,
        }
    }
}

impl GalleryConfig {
    /// Check an extension against the allow-list, ignoring case.
    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());
        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Path::new(&data_dir).join("gallery.redb"));

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let max_upload_size = parse_number(
            "MAX_UPLOAD_SIZE",
            std::env::var("MAX_UPLOAD_SIZE").ok(),
            GalleryConfig::default().max_upload_size,
        )?;

        let allowed_extensions = std::env::var("ALLOWED_EXTENSIONS")
            .map(|s| parse_extensions(&s))
            .unwrap_or_else(|_| GalleryConfig::default().allowed_extensions);

        let images_per_page = parse_number(
            "IMAGES_PER_PAGE",
            std::env::var("IMAGES_PER_PAGE").ok(),
            GalleryConfig::default().images_per_page,
        )?;

        let config = Config {
            server: ServerConfig { bind_address },
            storage: StorageConfig {
                database_path,
                upload_dir,
            },
            gallery: GalleryConfig {
                max_upload_size,
                allowed_extensions,
                images_per_page,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gallery.images_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "IMAGES_PER_PAGE must be greater than 0".to_string(),
            ));
        }

        if self.gallery.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.gallery.max_upload_size > UPLOAD_SIZE_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "MAX_UPLOAD_SIZE must not exceed {UPLOAD_SIZE_LIMIT} bytes"
            )));
        }

        if self.gallery.allowed_extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "ALLOWED_EXTENSIONS must list at least one extension".to_string(),
            ));
        }

        // Every file in the upload directory is treated as stored content
        if self.storage.database_path.starts_with(&self.storage.upload_dir) {
            return Err(ConfigError::ValidationError(format!(
                "DATABASE_PATH ({}) must not be inside UPLOAD_DIR ({})",
                self.storage.database_path.display(),
                self.storage.upload_dir.display()
            )));
        }

        Ok(())
    }
}

/// Parse an optional numeric setting, keeping the default only when unset.
fn parse_number<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "{name} must be a non-negative integer, got '{raw}'"
            ))
        }),
    }
}

/// Split a comma-separated extension list into lowercase entries without dots.
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
