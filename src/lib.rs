//! Local synchronization-and-search engine for a Zotero library:
//! mirrors the live database into a derived FTS5 index, keeps it
//! incrementally consistent and answers ranked free-text queries.

pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod utils;
pub mod zotero;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::SearchConfig;
pub use error::SearchError;
pub use index::{Index, IndexStats};
pub use models::{Attachment, Creator, LibraryRecord, SearchHit};
pub use zotero::Zotero;
