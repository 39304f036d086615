pub mod attachments;

pub use attachments::{sanitize_filename, ContentStore, StoredContent};
