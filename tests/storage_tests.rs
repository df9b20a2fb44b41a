use chrono::{Duration, TimeZone, Utc};
use image_gallery::storage::models::{
    Category, Entity, ImageChanges, ImageFilter, NewImage, Subcategory,
};
use image_gallery::storage::{Database, DatabaseError, DEFAULT_TAXONOMY};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data").join("gallery.redb")).unwrap();
    db.seed_defaults().unwrap();
    (dir, db)
}

fn find_category(db: &Database, name: &str) -> Option<Category> {
    db.list_categories()
        .unwrap()
        .into_iter()
        .find(|c| c.name == name)
}

fn subcategory(db: &Database, category: &str, name: &str) -> Subcategory {
    let category = find_category(db, category).unwrap();
    db.list_subcategories_for(category.id)
        .unwrap()
        .into_iter()
        .find(|s| s.name == name)
        .unwrap()
}

fn new_image(filename: &str, tag: &Subcategory, minutes: i64) -> NewImage {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    NewImage {
        name: format!("Image {filename}"),
        filename: filename.to_string(),
        description: None,
        prompt: None,
        upload_date: base + Duration::minutes(minutes),
        category_id: tag.category_id,
        subcategory_id: tag.id,
    }
}

// ============================================================================
// Seeding
// ============================================================================

#[test]
fn test_seed_creates_default_taxonomy() {
    let (_dir, db) = test_db();

    let categories = db.list_categories().unwrap();
    assert_eq!(categories.len(), DEFAULT_TAXONOMY.len());

    // Ordered by name
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Art", "Design", "Personal", "Photography", "Work"]);

    for category in &categories {
        assert_eq!(db.list_subcategories_for(category.id).unwrap().len(), 4);
    }
    assert_eq!(db.list_subcategories().unwrap().len(), 20);
}

#[test]
fn test_seed_is_idempotent() {
    let (_dir, db) = test_db();

    assert_eq!(db.seed_defaults().unwrap(), 0);
    assert_eq!(db.list_categories().unwrap().len(), 5);
    assert_eq!(db.list_subcategories().unwrap().len(), 20);
}

#[test]
fn test_seed_only_restores_missing_categories() {
    let (_dir, db) = test_db();
    let art = find_category(&db, "Art").unwrap();
    db.delete_category(art.id).unwrap();

    assert_eq!(db.seed_defaults().unwrap(), 1);
    let art = find_category(&db, "Art").unwrap();
    assert_eq!(db.list_subcategories_for(art.id).unwrap().len(), 4);
    assert_eq!(db.list_categories().unwrap().len(), 5);
}

#[test]
fn test_seed_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gallery.redb");
    {
        let db = Database::open(&path).unwrap();
        assert_eq!(db.seed_defaults().unwrap(), 5);
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(db.seed_defaults().unwrap(), 0);
}

// ============================================================================
// Categories
// ============================================================================

#[test]
fn test_category_names_are_unique() {
    let (_dir, db) = test_db();

    let err = db.create_category("Work").unwrap_err();
    assert!(matches!(err, DatabaseError::Duplicate(_)));

    let travel = db.create_category("Travel").unwrap();
    let err = db.rename_category(travel.id, "Art").unwrap_err();
    assert!(matches!(err, DatabaseError::Duplicate(_)));
}

#[test]
fn test_rename_category_frees_old_name() {
    let (_dir, db) = test_db();
    let work = find_category(&db, "Work").unwrap();

    let renamed = db.rename_category(work.id, "Office").unwrap();
    assert_eq!(renamed.id, work.id);
    assert!(find_category(&db, "Work").is_none());

    // The old name can be taken again
    db.create_category("Work").unwrap();
}

#[test]
fn test_delete_empty_category_cascades_subcategories() {
    let (_dir, db) = test_db();
    let work = find_category(&db, "Work").unwrap();
    let projects = subcategory(&db, "Work", "Projects");

    let deleted = db.delete_category(work.id).unwrap();
    assert_eq!(deleted.subcategories, 4);

    assert!(db.get_category(work.id).unwrap().is_none());
    assert!(db.get_subcategory(projects.id).unwrap().is_none());
    assert_eq!(db.list_subcategories().unwrap().len(), 16);
}

#[test]
fn test_delete_category_with_images_is_refused() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    db.insert_image(new_image("lake.png", &nature, 0)).unwrap();

    let err = db.delete_category(nature.category_id).unwrap_err();
    match err {
        DatabaseError::InUse { entity, id, images } => {
            assert_eq!(entity, Entity::Category);
            assert_eq!(id, nature.category_id);
            assert_eq!(images, 1);
        }
        other => panic!("expected InUse, got {other:?}"),
    }

    // Nothing was removed
    assert!(db.get_category(nature.category_id).unwrap().is_some());
    assert_eq!(db.list_subcategories_for(nature.category_id).unwrap().len(), 4);
}

#[test]
fn test_delete_missing_category_is_not_found() {
    let (_dir, db) = test_db();
    let err = db.delete_category(999).unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound { id: 999, .. }));
}

// ============================================================================
// Subcategories
// ============================================================================

#[test]
fn test_delete_subcategory_with_images_is_refused() {
    let (_dir, db) = test_db();
    let sketches = subcategory(&db, "Art", "Sketches");
    db.insert_image(new_image("cat.png", &sketches, 0)).unwrap();

    let err = db.delete_subcategory(sketches.id).unwrap_err();
    assert!(matches!(
        err,
        DatabaseError::InUse {
            entity: Entity::Subcategory,
            images: 1,
            ..
        }
    ));
    assert!(db.get_subcategory(sketches.id).unwrap().is_some());
}

#[test]
fn test_delete_empty_subcategory() {
    let (_dir, db) = test_db();
    let logos = subcategory(&db, "Design", "Logos");

    let deleted = db.delete_subcategory(logos.id).unwrap();
    assert_eq!(deleted.name, "Logos");
    assert!(db.get_subcategory(logos.id).unwrap().is_none());
    assert_eq!(db.list_subcategories_for(logos.category_id).unwrap().len(), 3);
}

#[test]
fn test_create_subcategory_requires_existing_category() {
    let (_dir, db) = test_db();
    let err = db.create_subcategory("Macro", 999).unwrap_err();
    assert!(matches!(err, DatabaseError::InvalidReference(_)));
}

#[test]
fn test_move_empty_subcategory() {
    let (_dir, db) = test_db();
    let mockups = subcategory(&db, "Design", "Mockups");
    let work = find_category(&db, "Work").unwrap();

    let moved = db.update_subcategory(mockups.id, "Wireframes", work.id).unwrap();
    assert_eq!(moved.category_id, work.id);
    assert_eq!(moved.name, "Wireframes");

    assert_eq!(db.list_subcategories_for(work.id).unwrap().len(), 5);
    assert_eq!(db.list_subcategories_for(mockups.category_id).unwrap().len(), 3);
}

#[test]
fn test_move_subcategory_with_images_is_refused() {
    let (_dir, db) = test_db();
    let street = subcategory(&db, "Photography", "Street");
    let art = find_category(&db, "Art").unwrap();
    db.insert_image(new_image("alley.jpg", &street, 0)).unwrap();

    let err = db.update_subcategory(street.id, "Street", art.id).unwrap_err();
    assert!(matches!(
        err,
        DatabaseError::Pinned {
            entity: Entity::Subcategory,
            images: 1,
            ..
        }
    ));
    assert_eq!(
        db.get_subcategory(street.id).unwrap().unwrap().category_id,
        street.category_id
    );

    // Renaming in place is still allowed
    let renamed = db
        .update_subcategory(street.id, "Urban", street.category_id)
        .unwrap();
    assert_eq!(renamed.name, "Urban");
}

// ============================================================================
// Images
// ============================================================================

#[test]
fn test_insert_and_get_image() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");

    let image = db.insert_image(new_image("lake.png", &nature, 0)).unwrap();
    assert!(image.id > 0);

    let by_id = db.get_image(image.id).unwrap().unwrap();
    assert_eq!(by_id, image);
    let by_filename = db.get_image_by_filename("lake.png").unwrap().unwrap();
    assert_eq!(by_filename.id, image.id);
    assert!(db.filename_exists("lake.png").unwrap());
    assert!(!db.filename_exists("river.png").unwrap());
}

#[test]
fn test_image_filenames_are_unique() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    db.insert_image(new_image("lake.png", &nature, 0)).unwrap();

    let err = db.insert_image(new_image("lake.png", &nature, 1)).unwrap_err();
    assert!(matches!(err, DatabaseError::Duplicate(_)));
    assert_eq!(db.search_images(&ImageFilter::default()).unwrap().len(), 1);
}

#[test]
fn test_insert_image_rejects_mismatched_taxonomy() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    let art = find_category(&db, "Art").unwrap();

    let mut image = new_image("lake.png", &nature, 0);
    image.category_id = art.id;
    let err = db.insert_image(image).unwrap_err();
    assert!(matches!(err, DatabaseError::InvalidReference(_)));

    let mut image = new_image("lake.png", &nature, 0);
    image.subcategory_id = 999;
    let err = db.insert_image(image).unwrap_err();
    assert!(matches!(err, DatabaseError::InvalidReference(_)));

    // Nothing was written, so the filename is still free
    assert!(!db.filename_exists("lake.png").unwrap());
}

#[test]
fn test_update_image_moves_index_entries() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    let digital = subcategory(&db, "Art", "Digital");
    let image = db.insert_image(new_image("lake.png", &nature, 0)).unwrap();

    let updated = db
        .update_image(
            image.id,
            ImageChanges {
                name: "Lake at Dusk".to_string(),
                description: Some("Edited".to_string()),
                prompt: Some("lake, dusk".to_string()),
                category_id: digital.category_id,
                subcategory_id: digital.id,
            },
        )
        .unwrap();
    assert_eq!(updated.filename, "lake.png");
    assert_eq!(updated.upload_date, image.upload_date);
    assert_eq!(updated.subcategory_id, digital.id);

    // The old tags no longer hold the image
    db.delete_subcategory(nature.id).unwrap();
    db.delete_category(nature.category_id).unwrap();

    let err = db.delete_subcategory(digital.id).unwrap_err();
    assert!(matches!(err, DatabaseError::InUse { .. }));
}

#[test]
fn test_update_missing_image_is_not_found() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    let err = db
        .update_image(
            42,
            ImageChanges {
                name: "Nothing".to_string(),
                description: None,
                prompt: None,
                category_id: nature.category_id,
                subcategory_id: nature.id,
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DatabaseError::NotFound {
            entity: Entity::Image,
            id: 42
        }
    ));
}

#[test]
fn test_delete_image_row_releases_taxonomy() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    let image = db.insert_image(new_image("lake.png", &nature, 0)).unwrap();

    assert!(db.delete_image_row(image.id).unwrap());
    assert!(!db.delete_image_row(image.id).unwrap());
    assert!(!db.filename_exists("lake.png").unwrap());

    db.delete_category(nature.category_id).unwrap();
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_search_filters_combine() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    let street = subcategory(&db, "Photography", "Street");
    let digital = subcategory(&db, "Art", "Digital");

    let mut sunset = new_image("sunset.png", &nature, 0);
    sunset.name = "Sunset Over Lake".to_string();
    db.insert_image(sunset).unwrap();

    let mut city = new_image("city.png", &street, 1);
    city.description = Some("Neon signs at SUNSET".to_string());
    db.insert_image(city).unwrap();

    let mut render = new_image("render.png", &digital, 2);
    render.prompt = Some("a sunset in pastel colors".to_string());
    db.insert_image(render).unwrap();

    db.insert_image(new_image("other.png", &nature, 3)).unwrap();

    // Term matches name, description and prompt case-insensitively
    let found = db
        .search_images(&ImageFilter::from_raw(Some("sunset"), 0, 0))
        .unwrap();
    let names: Vec<&str> = found.iter().map(|i| i.filename.as_str()).collect();
    assert_eq!(names, ["render.png", "city.png", "sunset.png"]);

    let found = db
        .search_images(&ImageFilter::from_raw(
            Some("sunset"),
            nature.category_id,
            0,
        ))
        .unwrap();
    assert_eq!(found.len(), 2);

    let found = db
        .search_images(&ImageFilter::from_raw(None, 0, nature.id))
        .unwrap();
    let names: Vec<&str> = found.iter().map(|i| i.filename.as_str()).collect();
    assert_eq!(names, ["other.png", "sunset.png"]);

    // A blank term is no criterion at all
    let found = db
        .search_images(&ImageFilter::from_raw(Some("   "), 0, 0))
        .unwrap();
    assert_eq!(found.len(), 4);
}

#[test]
fn test_search_with_disagreeing_filters_is_empty() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    let art = find_category(&db, "Art").unwrap();
    db.insert_image(new_image("lake.png", &nature, 0)).unwrap();

    let found = db
        .search_images(&ImageFilter::from_raw(None, art.id, nature.id))
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_recent_images_paginates_newest_first() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    for i in 0..5 {
        db.insert_image(new_image(&format!("img{i}.png"), &nature, i))
            .unwrap();
    }

    let first = db.recent_images(1, 2).unwrap();
    assert_eq!(first.total, 5);
    assert_eq!(first.pages(), 3);
    assert!(!first.has_prev());
    assert!(first.has_next());
    let names: Vec<&str> = first.items.iter().map(|i| i.filename.as_str()).collect();
    assert_eq!(names, ["img4.png", "img3.png"]);

    let last = db.recent_images(3, 2).unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].filename, "img0.png");
    assert!(last.has_prev());
    assert!(!last.has_next());

    let past_end = db.recent_images(4, 2).unwrap();
    assert!(past_end.items.is_empty());
}

#[test]
fn test_same_timestamp_orders_by_id() {
    let (_dir, db) = test_db();
    let nature = subcategory(&db, "Photography", "Nature");
    let a = db.insert_image(new_image("a.png", &nature, 0)).unwrap();
    let b = db.insert_image(new_image("b.png", &nature, 0)).unwrap();

    let found = db.search_images(&ImageFilter::default()).unwrap();
    assert_eq!(found[0].id, b.id);
    assert_eq!(found[1].id, a.id);
}
