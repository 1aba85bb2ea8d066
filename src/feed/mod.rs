//! Feed mapping: turn a podcast RSS feed into a title → audio URL mapping.
//!
//! The work happens in two submodules:
//!
//! - [`mapper`] - Streams the XML with `quick-xml` and extracts one
//!   title/URL pair per qualifying `<item>` of the `<channel>`
//! - [`writer`] - Serializes the mapping as pretty-printed JSON and
//!   writes it to disk atomically
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use soundon_export::feed::{extract_title_url_map, write_mapping};
//!
//! let mapping = extract_title_url_map(Path::new("soundon.xml"))?;
//! write_mapping(&mapping, Path::new("episodes.json"), 2)?;
//! # Ok::<(), soundon_export::feed::FeedError>(())
//! ```

mod mapper;
mod writer;

use std::path::PathBuf;

use indexmap::IndexMap;
use thiserror::Error;

pub use mapper::{extract_title_url_map, parse_feed_content};
pub use writer::{render_mapping, write_mapping};

/// Episode title → enclosure URL, in first-insertion order.
///
/// Re-inserting an existing title replaces the URL but keeps the
/// title's original position.
pub type Mapping = IndexMap<String, String>;

/// Errors that can occur while reading a feed or writing its mapping.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The input file could not be opened or read.
    #[error("Failed to read feed file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input is not well-formed XML.
    #[error("Malformed XML at byte {position}: {message}")]
    MalformedXml { position: u64, message: String },

    /// The root element has no `<channel>` child.
    #[error("XML does not contain a <channel> element")]
    MissingChannel,

    /// The mapping could not be encoded as JSON.
    #[error("Failed to serialize mapping: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The destination file could not be created or replaced.
    #[error("Failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
