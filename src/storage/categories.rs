use std::collections::BTreeSet;

use redb::{ReadableTable, WriteTransaction};

use super::db::{index_add, index_ids, index_remove, load, load_all, next_id, store};
use super::db::{Database, DatabaseError};
use super::models::{Category, Entity, Subcategory};
use super::tables::*;

/// Categories created at every start when missing, with their subcategories.
pub const DEFAULT_TAXONOMY: [(&str, [&str; 4]); 5] = [
    ("Personal", ["Family", "Friends", "Events", "Travel"]),
    ("Work", ["Projects", "Meetings", "Documents", "Screenshots"]),
    ("Art", ["Digital", "Traditional", "Sketches", "Paintings"]),
    ("Photography", ["Landscape", "Portrait", "Street", "Nature"]),
    ("Design", ["UI/UX", "Graphics", "Logos", "Mockups"]),
];

/// Result of a successful category deletion
#[derive(Debug, Default)]
pub struct DeletedCategory {
    pub subcategories: usize,
}

impl Database {
    // ========================================================================
    // Seeding
    // ========================================================================

    /// Insert every default category whose name does not exist yet, together
    /// with its subcategories. Returns the number of categories created.
    pub fn seed_defaults(&self) -> Result<usize, DatabaseError> {
        self.write(|txn| {
            let mut created = 0;
            for (name, subcategories) in DEFAULT_TAXONOMY {
                if category_id_by_name(txn, name)?.is_some() {
                    continue;
                }
                let category = insert_category(txn, name)?;
                for subcategory in subcategories {
                    insert_subcategory(txn, subcategory, category.id)?;
                }
                created += 1;
            }
            Ok(created)
        })
    }

    // ========================================================================
    // Category operations
    // ========================================================================

    pub fn create_category(&self, name: &str) -> Result<Category, DatabaseError> {
        self.write(|txn| {
            if category_id_by_name(txn, name)?.is_some() {
                return Err(DatabaseError::Duplicate(format!("Category '{name}'")));
            }
            insert_category(txn, name)
        })
    }

    pub fn rename_category(&self, id: u64, name: &str) -> Result<Category, DatabaseError> {
        self.write(|txn| {
            let mut category: Category = {
                let table = txn.open_table(CATEGORIES)?;
                load(&table, id)?.ok_or(DatabaseError::NotFound {
                    entity: Entity::Category,
                    id,
                })?
            };

            if category.name == name {
                return Ok(category);
            }
            if category_id_by_name(txn, name)?.is_some() {
                return Err(DatabaseError::Duplicate(format!("Category '{name}'")));
            }

            {
                let mut names = txn.open_table(CATEGORY_NAMES)?;
                names.remove(category.name.as_str())?;
                names.insert(name, id)?;
            }
            category.name = name.to_string();
            store(txn, CATEGORIES, id, &category)?;
            Ok(category)
        })
    }

    pub fn get_category(&self, id: u64) -> Result<Option<Category>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CATEGORIES)?;
        load(&table, id)
    }

    /// All categories ordered by name
    pub fn list_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CATEGORIES)?;
        let mut categories: Vec<Category> = load_all(&table)?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    /// Delete a category and all of its subcategories.
    ///
    /// Refused with [`DatabaseError::InUse`] while any image is tagged with the
    /// category or with one of its subcategories; nothing is mutated then.
    pub fn delete_category(&self, id: u64) -> Result<DeletedCategory, DatabaseError> {
        self.write(|txn| {
            let category: Category = {
                let table = txn.open_table(CATEGORIES)?;
                load(&table, id)?.ok_or(DatabaseError::NotFound {
                    entity: Entity::Category,
                    id,
                })?
            };

            let subcategory_ids = {
                let index = txn.open_table(CATEGORY_SUBCATEGORIES)?;
                index_ids(&index, id)?
            };

            let mut images: BTreeSet<u64> = {
                let index = txn.open_table(CATEGORY_IMAGES)?;
                index_ids(&index, id)?.into_iter().collect()
            };
            {
                let index = txn.open_table(SUBCATEGORY_IMAGES)?;
                for subcategory_id in &subcategory_ids {
                    images.extend(index_ids(&index, *subcategory_id)?);
                }
            }
            if !images.is_empty() {
                return Err(DatabaseError::InUse {
                    entity: Entity::Category,
                    id,
                    images: images.len(),
                });
            }

            {
                let mut table = txn.open_table(SUBCATEGORIES)?;
                for subcategory_id in &subcategory_ids {
                    table.remove(*subcategory_id)?;
                }
            }
            {
                let mut index = txn.open_table(SUBCATEGORY_IMAGES)?;
                for subcategory_id in &subcategory_ids {
                    index.remove(*subcategory_id)?;
                }
            }
            txn.open_table(CATEGORY_SUBCATEGORIES)?.remove(id)?;
            txn.open_table(CATEGORY_IMAGES)?.remove(id)?;
            txn.open_table(CATEGORY_NAMES)?
                .remove(category.name.as_str())?;
            txn.open_table(CATEGORIES)?.remove(id)?;

            Ok(DeletedCategory {
                subcategories: subcategory_ids.len(),
            })
        })
    }

    // ========================================================================
    // Subcategory operations
    // ========================================================================

    pub fn create_subcategory(
        &self,
        name: &str,
        category_id: u64,
    ) -> Result<Subcategory, DatabaseError> {
        self.write(|txn| {
            require_category(txn, category_id)?;
            insert_subcategory(txn, name, category_id)
        })
    }

    /// Rename a subcategory and optionally move it under another category.
    ///
    /// Moving a subcategory that holds images is refused with
    /// [`DatabaseError::Pinned`], since its images would no longer agree with
    /// their category.
    pub fn update_subcategory(
        &self,
        id: u64,
        name: &str,
        category_id: u64,
    ) -> Result<Subcategory, DatabaseError> {
        self.write(|txn| {
            let mut subcategory: Subcategory = {
                let table = txn.open_table(SUBCATEGORIES)?;
                load(&table, id)?.ok_or(DatabaseError::NotFound {
                    entity: Entity::Subcategory,
                    id,
                })?
            };

            if subcategory.category_id != category_id {
                require_category(txn, category_id)?;

                let images = {
                    let index = txn.open_table(SUBCATEGORY_IMAGES)?;
                    index_ids(&index, id)?.len()
                };
                if images > 0 {
                    return Err(DatabaseError::Pinned {
                        entity: Entity::Subcategory,
                        id,
                        images,
                    });
                }

                index_remove(txn, CATEGORY_SUBCATEGORIES, subcategory.category_id, id)?;
                index_add(txn, CATEGORY_SUBCATEGORIES, category_id, id)?;
                subcategory.category_id = category_id;
            }

            subcategory.name = name.to_string();
            store(txn, SUBCATEGORIES, id, &subcategory)?;
            Ok(subcategory)
        })
    }

    pub fn get_subcategory(&self, id: u64) -> Result<Option<Subcategory>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBCATEGORIES)?;
        load(&table, id)
    }

    /// All subcategories ordered by name
    pub fn list_subcategories(&self) -> Result<Vec<Subcategory>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SUBCATEGORIES)?;
        let mut subcategories: Vec<Subcategory> = load_all(&table)?;
        subcategories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(subcategories)
    }

    /// Subcategories of one category ordered by name
    pub fn list_subcategories_for(
        &self,
        category_id: u64,
    ) -> Result<Vec<Subcategory>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(CATEGORY_SUBCATEGORIES)?;
        let table = read_txn.open_table(SUBCATEGORIES)?;

        let mut subcategories = Vec::new();
        for subcategory_id in index_ids(&index, category_id)? {
            if let Some(subcategory) = load::<Subcategory, _>(&table, subcategory_id)? {
                subcategories.push(subcategory);
            }
        }
        subcategories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(subcategories)
    }

    /// Delete a subcategory; refused with [`DatabaseError::InUse`] while it
    /// holds images.
    pub fn delete_subcategory(&self, id: u64) -> Result<Subcategory, DatabaseError> {
        self.write(|txn| {
            let subcategory: Subcategory = {
                let table = txn.open_table(SUBCATEGORIES)?;
                load(&table, id)?.ok_or(DatabaseError::NotFound {
                    entity: Entity::Subcategory,
                    id,
                })?
            };

            let images = {
                let index = txn.open_table(SUBCATEGORY_IMAGES)?;
                index_ids(&index, id)?.len()
            };
            if images > 0 {
                return Err(DatabaseError::InUse {
                    entity: Entity::Subcategory,
                    id,
                    images,
                });
            }

            index_remove(txn, CATEGORY_SUBCATEGORIES, subcategory.category_id, id)?;
            txn.open_table(SUBCATEGORY_IMAGES)?.remove(id)?;
            txn.open_table(SUBCATEGORIES)?.remove(id)?;
            Ok(subcategory)
        })
    }
}

// ============================================================================
// Transaction-scoped helpers
// ============================================================================

fn category_id_by_name(txn: &WriteTransaction, name: &str) -> Result<Option<u64>, DatabaseError> {
    let names = txn.open_table(CATEGORY_NAMES)?;
    let id = names.get(name)?.map(|v| v.value());
    Ok(id)
}

fn insert_category(txn: &WriteTransaction, name: &str) -> Result<Category, DatabaseError> {
    let id = next_id(txn, "categories")?;
    let category = Category {
        id,
        name: name.to_string(),
    };
    store(txn, CATEGORIES, id, &category)?;
    txn.open_table(CATEGORY_NAMES)?.insert(name, id)?;
    Ok(category)
}

fn insert_subcategory(
    txn: &WriteTransaction,
    name: &str,
    category_id: u64,
) -> Result<Subcategory, DatabaseError> {
    let id = next_id(txn, "subcategories")?;
    let subcategory = Subcategory {
        id,
        name: name.to_string(),
        category_id,
    };
    store(txn, SUBCATEGORIES, id, &subcategory)?;
    index_add(txn, CATEGORY_SUBCATEGORIES, category_id, id)?;
    Ok(subcategory)
}

fn require_category(txn: &WriteTransaction, category_id: u64) -> Result<Category, DatabaseError> {
    let table = txn.open_table(CATEGORIES)?;
    let category = load(&table, category_id)?;
    category.ok_or_else(|| {
        DatabaseError::InvalidReference(format!("category {category_id} does not exist"))
    })
}
