use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use super::{FeedError, Mapping};

/// Renders the mapping exactly as [`write_mapping`] stores it.
///
/// Entries keep the mapping's order, each on its own line indented by
/// `indent` spaces. Non-ASCII text is written as-is rather than as `\u`
/// escapes, and the output ends with a single newline.
pub fn render_mapping(mapping: &Mapping, indent: usize) -> Result<String, FeedError> {
    let indent = vec![b' '; indent];
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
    mapping.serialize(&mut serializer)?;
    buf.push(b'\n');

    String::from_utf8(buf).map_err(|e| {
        FeedError::Serialize(serde_json::Error::io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e,
        )))
    })
}

/// Writes the mapping as JSON to `path`, replacing any existing file.
///
/// The JSON goes to a temporary file in the same directory, is synced to
/// disk, then renamed over `path`. The destination is never left holding a
/// partial document.
///
/// # Errors
///
/// Returns [`FeedError::Write`] if the parent directory does not exist or
/// is not writable, or if the rename fails.
pub fn write_mapping(mapping: &Mapping, path: &Path, indent: usize) -> Result<(), FeedError> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let content = render_mapping(mapping, indent)?;
    let write_err = |source| FeedError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Unpredictable temp name; create_new refuses to follow a planted file
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(write_err)?;

    let written = file
        .write_all(content.as_bytes())
        .and_then(|()| file.sync_all());
    drop(file);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(write_err(e));
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(write_err(e));
    }

    tracing::info!(path = %path.display(), entries = mapping.len(), "Wrote mapping");
    Ok(())
}
