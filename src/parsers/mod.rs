pub mod chapter;
pub mod comic;

pub use chapter::parse_chapter_images;
pub use comic::{chapter_number, parse_comic_page};
