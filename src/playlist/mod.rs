//! Playlist catalog and cursor.
//!
//! - `catalog`: the ordered, session-fixed list of tracks, plus a directory
//!   scanner used by the daemon to build one
//! - `cursor`: wraparound navigation over the catalog

pub mod catalog;
pub mod cursor;
pub mod error;

pub use catalog::{scan_music_dir, Catalog, DEFAULT_EXTENSIONS};
pub use cursor::{next_index, previous_index, Cursor};
pub use error::CatalogError;
