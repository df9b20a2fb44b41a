mod admin;
mod categories;
mod content;
mod images;

pub use admin::{health, stats};
pub use categories::{
    create_category, create_subcategory, delete_category, delete_subcategory, get_category,
    get_subcategory, list_categories, list_category_subcategories, rename_category,
    update_subcategory,
};
pub use content::serve_upload;
pub use images::{
    delete_image, edit_image, get_image, list_images, search_images, upload_image,
};
