use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three catalog entity kinds, used in error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Category,
    Image,
    Subcategory,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Category => "Category",
            Entity::Image => "Image",
            Entity::Subcategory => "Subcategory",
        };
        f.write_str(name)
    }
}

/// Top-level taxonomy node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
}

/// Second-level taxonomy node, child of exactly one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: u64,
    pub name: String,
    pub category_id: u64,
}

/// An image row in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: u64,
    pub name: String,
    /// Sanitized filename; also the key of the file in the content directory
    pub filename: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub category_id: u64,
    pub subcategory_id: u64,
}

/// Fields of an image row before an id is assigned
#[derive(Debug, Clone)]
pub struct NewImage {
    pub name: String,
    pub filename: String,
    pub description: Option<String>,
    pub prompt: Option<String>,
    pub upload_date: DateTime<Utc>,
    pub category_id: u64,
    pub subcategory_id: u64,
}

/// The descriptive fields an edit may replace
#[derive(Debug, Clone)]
pub struct ImageChanges {
    pub name: String,
    pub description: Option<String>,
    pub prompt: Option<String>,
    pub category_id: u64,
    pub subcategory_id: u64,
}

/// Conjunctive image filter. `None` disables a criterion.
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    pub term: Option<String>,
    pub category_id: Option<u64>,
    pub subcategory_id: Option<u64>,
}

impl ImageFilter {
    /// Build a filter from raw request values, where a taxonomy id of 0 means "all".
    pub fn from_raw(term: Option<&str>, category_id: u64, subcategory_id: u64) -> Self {
        Self {
            term: term
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| t.to_string()),
            category_id: (category_id != 0).then_some(category_id),
            subcategory_id: (subcategory_id != 0).then_some(subcategory_id),
        }
    }

    pub fn matches(&self, image: &ImageRecord) -> bool {
        if let Some(category_id) = self.category_id {
            if image.category_id != category_id {
                return false;
            }
        }
        if let Some(subcategory_id) = self.subcategory_id {
            if image.subcategory_id != subcategory_id {
                return false;
            }
        }
        match self.term {
            Some(ref term) => {
                let needle = term.to_lowercase();
                let contains = |s: &str| s.to_lowercase().contains(&needle);
                contains(&image.name)
                    || image.description.as_deref().is_some_and(contains)
                    || image.prompt.as_deref().is_some_and(contains)
            }
            None => true,
        }
    }
}

/// One page of the home listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    /// Number of pages; an empty listing still has zero pages.
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page))
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.pages()
    }
}
