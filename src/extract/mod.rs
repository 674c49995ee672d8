pub mod faq;
pub mod metadata;
pub mod text;

pub use faq::extract_faqs;
pub use metadata::extract_metadata;
pub use text::{strip_markup, MIN_TEXT_CHARS};
