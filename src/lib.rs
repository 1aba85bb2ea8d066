//! Export a JSON mapping of podcast episode titles to audio URLs from a
//! soundon RSS feed.
//!
//! - [`feed`] - Feed parsing and JSON output
//! - [`config`] - Optional TOML settings

pub mod config;
pub mod feed;
