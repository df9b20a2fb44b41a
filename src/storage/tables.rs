use redb::TableDefinition;

/// Entity tables keyed by sequence id, values are msgpack records
pub const CATEGORIES: TableDefinition<u64, &[u8]> = TableDefinition::new("categories");
pub const SUBCATEGORIES: TableDefinition<u64, &[u8]> = TableDefinition::new("subcategories");
pub const IMAGES: TableDefinition<u64, &[u8]> = TableDefinition::new("images");

/// Unique index: category name -> category id
pub const CATEGORY_NAMES: TableDefinition<&str, u64> = TableDefinition::new("category_names");

/// Unique index: stored filename -> image id
pub const IMAGE_FILENAMES: TableDefinition<&str, u64> = TableDefinition::new("image_filenames");

/// Ownership indexes: parent id -> msgpack Vec of child ids
pub const CATEGORY_SUBCATEGORIES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("category_subcategories");
pub const CATEGORY_IMAGES: TableDefinition<u64, &[u8]> = TableDefinition::new("category_images");
pub const SUBCATEGORY_IMAGES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("subcategory_images");

/// Last assigned id per entity table
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
