use redb::{ReadableTable, WriteTransaction};

use super::db::{index_add, index_ids, index_remove, load, load_all, next_id, store};
use super::db::{Database, DatabaseError};
use super::models::{
    Category, Entity, ImageChanges, ImageFilter, ImageRecord, NewImage, Page, Subcategory,
};
use super::tables::*;

impl Database {
    // ========================================================================
    // Image operations
    // ========================================================================

    /// Insert an image row and its index entries in one transaction.
    ///
    /// The transaction re-checks filename uniqueness and that the subcategory
    /// belongs to the category, so a stale validation cannot slip a duplicate
    /// or a dangling reference into the catalog.
    pub fn insert_image(&self, image: NewImage) -> Result<ImageRecord, DatabaseError> {
        debug_assert!(!image.filename.is_empty(), "filename must not be empty");

        self.write(|txn| {
            {
                let filenames = txn.open_table(IMAGE_FILENAMES)?;
                if filenames.get(image.filename.as_str())?.is_some() {
                    return Err(DatabaseError::Duplicate(format!(
                        "Image file '{}'",
                        image.filename
                    )));
                }
            }
            check_taxonomy(txn, image.category_id, image.subcategory_id)?;

            let id = next_id(txn, "images")?;
            let record = ImageRecord {
                id,
                name: image.name,
                filename: image.filename,
                description: image.description,
                prompt: image.prompt,
                upload_date: image.upload_date,
                category_id: image.category_id,
                subcategory_id: image.subcategory_id,
            };

            store(txn, IMAGES, id, &record)?;
            txn.open_table(IMAGE_FILENAMES)?
                .insert(record.filename.as_str(), id)?;
            index_add(txn, CATEGORY_IMAGES, record.category_id, id)?;
            index_add(txn, SUBCATEGORY_IMAGES, record.subcategory_id, id)?;
            Ok(record)
        })
    }

    pub fn get_image(&self, id: u64) -> Result<Option<ImageRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(IMAGES)?;
        load(&table, id)
    }

    pub fn get_image_by_filename(
        &self,
        filename: &str,
    ) -> Result<Option<ImageRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let filenames = read_txn.open_table(IMAGE_FILENAMES)?;
        let id = match filenames.get(filename)? {
            Some(id) => id.value(),
            None => return Ok(None),
        };
        let table = read_txn.open_table(IMAGES)?;
        load(&table, id)
    }

    /// Check if a catalog row already uses this stored filename
    pub fn filename_exists(&self, filename: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(IMAGE_FILENAMES)?;
        Ok(table.get(filename)?.is_some())
    }

    /// Replace the descriptive fields of an image. The filename and upload
    /// date are never touched.
    pub fn update_image(
        &self,
        id: u64,
        changes: ImageChanges,
    ) -> Result<ImageRecord, DatabaseError> {
        self.write(|txn| {
            let mut image: ImageRecord = {
                let table = txn.open_table(IMAGES)?;
                load(&table, id)?.ok_or(DatabaseError::NotFound {
                    entity: Entity::Image,
                    id,
                })?
            };

            check_taxonomy(txn, changes.category_id, changes.subcategory_id)?;

            if image.category_id != changes.category_id {
                index_remove(txn, CATEGORY_IMAGES, image.category_id, id)?;
                index_add(txn, CATEGORY_IMAGES, changes.category_id, id)?;
            }
            if image.subcategory_id != changes.subcategory_id {
                index_remove(txn, SUBCATEGORY_IMAGES, image.subcategory_id, id)?;
                index_add(txn, SUBCATEGORY_IMAGES, changes.subcategory_id, id)?;
            }

            image.name = changes.name;
            image.description = changes.description;
            image.prompt = changes.prompt;
            image.category_id = changes.category_id;
            image.subcategory_id = changes.subcategory_id;

            store(txn, IMAGES, id, &image)?;
            Ok(image)
        })
    }

    /// Delete an image row and its index entries. Returns false when no row
    /// had this id.
    pub fn delete_image_row(&self, id: u64) -> Result<bool, DatabaseError> {
        self.write(|txn| {
            let image: Option<ImageRecord> = {
                let table = txn.open_table(IMAGES)?;
                load(&table, id)?
            };

            let Some(image) = image else {
                return Ok(false);
            };

            txn.open_table(IMAGES)?.remove(id)?;
            txn.open_table(IMAGE_FILENAMES)?
                .remove(image.filename.as_str())?;
            index_remove(txn, CATEGORY_IMAGES, image.category_id, id)?;
            index_remove(txn, SUBCATEGORY_IMAGES, image.subcategory_id, id)?;
            Ok(true)
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Every image matching the filter, newest first.
    ///
    /// A category or subcategory criterion is served from its ownership
    /// index; the remaining criteria are applied to the loaded rows.
    pub fn search_images(
        &self,
        filter: &ImageFilter,
    ) -> Result<Vec<ImageRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(IMAGES)?;

        let candidates: Vec<ImageRecord> = match (filter.subcategory_id, filter.category_id) {
            (Some(subcategory_id), _) => {
                let index = read_txn.open_table(SUBCATEGORY_IMAGES)?;
                load_ids(&table, index_ids(&index, subcategory_id)?)?
            }
            (None, Some(category_id)) => {
                let index = read_txn.open_table(CATEGORY_IMAGES)?;
                load_ids(&table, index_ids(&index, category_id)?)?
            }
            (None, None) => load_all(&table)?,
        };

        let mut images: Vec<ImageRecord> = candidates
            .into_iter()
            .filter(|image| filter.matches(image))
            .collect();
        sort_newest_first(&mut images);
        Ok(images)
    }

    /// One page of the unfiltered listing, newest first. Pages are 1-based;
    /// a page past the end comes back empty.
    pub fn recent_images(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Page<ImageRecord>, DatabaseError> {
        debug_assert!(page >= 1, "pages are 1-based");
        debug_assert!(per_page >= 1, "per_page must be positive");

        let images = self.search_images(&ImageFilter::default())?;
        let total = images.len() as u64;

        let start = (page.saturating_sub(1) as usize).saturating_mul(per_page as usize);
        let items = images
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();

        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }
}

fn load_ids<T>(table: &T, ids: Vec<u64>) -> Result<Vec<ImageRecord>, DatabaseError>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    let mut images = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(image) = load(table, id)? {
            images.push(image);
        }
    }
    Ok(images)
}

fn sort_newest_first(images: &mut [ImageRecord]) {
    images.sort_by(|a, b| {
        b.upload_date
            .cmp(&a.upload_date)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Both taxonomy references must exist and agree with each other.
fn check_taxonomy(
    txn: &WriteTransaction,
    category_id: u64,
    subcategory_id: u64,
) -> Result<(), DatabaseError> {
    let category: Option<Category> = {
        let table = txn.open_table(CATEGORIES)?;
        load(&table, category_id)?
    };
    if category.is_none() {
        return Err(DatabaseError::InvalidReference(format!(
            "category {category_id} does not exist"
        )));
    }

    let subcategory: Option<Subcategory> = {
        let table = txn.open_table(SUBCATEGORIES)?;
        load(&table, subcategory_id)?
    };
    match subcategory {
        None => Err(DatabaseError::InvalidReference(format!(
            "subcategory {subcategory_id} does not exist"
        ))),
        Some(subcategory) if subcategory.category_id != category_id => {
            Err(DatabaseError::InvalidReference(format!(
                "subcategory {subcategory_id} does not belong to category {category_id}"
            )))
        }
        Some(_) => Ok(()),
    }
}
