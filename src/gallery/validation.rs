//! Field-level and cross-field checks that run before any mutation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::GalleryConfig;
use crate::storage::models::ImageChanges;
use crate::storage::{Database, DatabaseError};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Not a valid choice.";
pub const DUPLICATE_FILE_ON_DISK: &str =
    "A file with this name already exists. Please rename your file.";
pub const DUPLICATE_FILE_IN_CATALOG: &str =
    "This image has already been uploaded. Please choose a different file.";
pub const SUBCATEGORY_MISMATCH: &str = "Subcategory does not belong to the selected category.";

pub const IMAGE_NAME_LENGTH: (usize, usize) = (3, 200);
pub const DESCRIPTION_MAX: usize = 1000;
pub const PROMPT_MAX: usize = 500;
pub const TAXONOMY_NAME_LENGTH: (usize, usize) = (2, 100);
pub const SEARCH_TERM_MAX: usize = 200;
/// Longest filename common filesystems accept, in bytes.
pub const FILENAME_MAX: usize = 255;

/// Validation failures keyed by form field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Descriptive fields of an image as submitted by a client.
#[derive(Debug, Clone, Default)]
pub struct ImageMetadata {
    pub name: String,
    pub description: Option<String>,
    pub prompt: Option<String>,
    /// `None` or 0 means nothing was selected
    pub category_id: Option<u64>,
    pub subcategory_id: Option<u64>,
}

/// Derive a filesystem-safe name from a client-supplied filename.
///
/// Path separators become whitespace, non-ASCII characters are dropped,
/// whitespace runs collapse to `_`, anything outside `[A-Za-z0-9_.-]` is
/// removed and leading/trailing `.` and `_` are stripped. The result may be
/// empty.
pub fn sanitize_filename(original: &str) -> String {
    let spaced: String = original
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Lowercased extension of a sanitized filename
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub(crate) fn check_length(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    (min, max): (usize, usize),
    message: &str,
) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.add(field, message);
    }
}

/// Required, trimmed taxonomy name of 2 to 100 characters.
pub(crate) fn check_taxonomy_name(errors: &mut ValidationErrors, name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        errors.add("name", REQUIRED);
        return None;
    }
    let (min, max) = TAXONOMY_NAME_LENGTH;
    let len = name.chars().count();
    if len < min || len > max {
        errors.add("name", "Name must be between 2 and 100 characters");
        return None;
    }
    Some(name.to_string())
}

/// A selected id, treating 0 as "nothing selected".
pub(crate) fn selected(id: Option<u64>) -> Option<u64> {
    id.filter(|id| *id != 0)
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Check the descriptive fields of an image, including that both taxonomy
/// references exist and agree. Returns the normalised changes when no error
/// was recorded for them.
pub(crate) fn check_metadata(
    db: &Database,
    metadata: &ImageMetadata,
    errors: &mut ValidationErrors,
) -> Result<Option<ImageChanges>, DatabaseError> {
    let mut local = ValidationErrors::default();

    let name = metadata.name.trim();
    if name.is_empty() {
        local.add("name", REQUIRED);
    } else {
        check_length(
            &mut local,
            "name",
            name,
            IMAGE_NAME_LENGTH,
            "Name must be between 3 and 200 characters",
        );
    }

    let description = optional_text(metadata.description.as_deref());
    if let Some(ref description) = description {
        check_length(
            &mut local,
            "description",
            description,
            (0, DESCRIPTION_MAX),
            "Description cannot exceed 1000 characters",
        );
    }

    let prompt = optional_text(metadata.prompt.as_deref());
    if let Some(ref prompt) = prompt {
        check_length(
            &mut local,
            "prompt",
            prompt,
            (0, PROMPT_MAX),
            "Prompt cannot exceed 500 characters",
        );
    }

    let category = match selected(metadata.category_id) {
        None => {
            local.add("category", REQUIRED);
            None
        }
        Some(id) => {
            let category = db.get_category(id)?;
            if category.is_none() {
                local.add("category", INVALID_CHOICE);
            }
            category
        }
    };

    let subcategory = match selected(metadata.subcategory_id) {
        None => {
            local.add("subcategory", REQUIRED);
            None
        }
        Some(id) => {
            let subcategory = db.get_subcategory(id)?;
            if subcategory.is_none() {
                local.add("subcategory", INVALID_CHOICE);
            }
            subcategory
        }
    };

    if let (Some(category), Some(subcategory)) = (&category, &subcategory) {
        if subcategory.category_id != category.id {
            local.add("subcategory", SUBCATEGORY_MISMATCH);
        }
    }

    let changes = match (local.is_empty(), category, subcategory) {
        (true, Some(category), Some(subcategory)) => Some(ImageChanges {
            name: name.to_string(),
            description,
            prompt,
            category_id: category.id,
            subcategory_id: subcategory.id,
        }),
        _ => None,
    };

    for (field, messages) in local.fields {
        for message in messages {
            errors.add(&field, message);
        }
    }
    Ok(changes)
}

/// Check presence, name, type and size of an uploaded file. Returns the
/// sanitized filename when the file passes; uniqueness is checked separately.
pub(crate) fn check_file(
    config: &GalleryConfig,
    original_filename: Option<&str>,
    byte_size: u64,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let Some(original_filename) = original_filename.filter(|n| !n.is_empty()) else {
        errors.add("image", REQUIRED);
        return None;
    };

    let filename = sanitize_filename(original_filename);
    if filename.is_empty() {
        errors.add("image", "Invalid filename.");
        return None;
    }

    // Sanitized names are ASCII, so bytes and characters agree
    if filename.len() > FILENAME_MAX {
        errors.add(
            "image",
            format!("Filename is too long (at most {FILENAME_MAX} characters)."),
        );
        return None;
    }

    let allowed = extension_of(&filename).is_some_and(|e| config.is_allowed_extension(&e));
    if !allowed {
        errors.add(
            "image",
            format!(
                "Only image files ({}) are allowed!",
                config.allowed_extensions.join(", ")
            ),
        );
        return None;
    }

    if byte_size > config.max_upload_size {
        errors.add(
            "image",
            format!(
                "File exceeds maximum upload size of {} bytes",
                config.max_upload_size
            ),
        );
        return None;
    }

    Some(filename)
}
