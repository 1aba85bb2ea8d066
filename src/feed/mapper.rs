use std::borrow::Cow;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{FeedError, Mapping};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads a podcast feed from disk and extracts its title → URL mapping.
///
/// The whole file is read up front and handed to [`parse_feed_content`];
/// the file handle is released before parsing starts.
///
/// # Errors
///
/// - [`FeedError::Read`] if the file cannot be read
/// - [`FeedError::MalformedXml`] if the content is not well-formed XML
/// - [`FeedError::MissingChannel`] if the root element has no `<channel>` child
pub fn extract_title_url_map(path: &Path) -> Result<Mapping, FeedError> {
    let content = std::fs::read(path).map_err(|source| FeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "Read feed file");
    parse_feed_content(&content)
}

/// Extracts the title → URL mapping from an in-memory feed document.
///
/// Only the first `<channel>` directly under the root element is read.
/// Each of its `<item>` children contributes one entry when it has a
/// `<title>` child and an `<enclosure>` child whose `url` attribute is not
/// blank. Both values are whitespace-trimmed. A later item with the same
/// title replaces the earlier URL.
///
/// Elements are matched on their full name, so `<itunes:title>` is never
/// mistaken for `<title>`. The rest of the document is still scanned after
/// the channel closes so that trailing garbage is reported as malformed.
///
/// quick-xml (0.37) only resolves the five predefined XML entities and
/// character references. `<!ENTITY>` declarations are never expanded, and a
/// reference to an unknown entity fails with [`FeedError::MalformedXml`].
pub fn parse_feed_content(content: &[u8]) -> Result<Mapping, FeedError> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let mut reader = Reader::from_reader(content);
    reader.config_mut().check_end_names = true;

    let mut scan = FeedScan::default();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| malformed(&reader, e.to_string()))?;
        match event {
            Event::Start(e) => {
                scan.open(&e, &reader)?;
            }
            Event::Empty(e) => {
                // Self-closing: open and close in one step
                scan.open(&e, &reader)?;
                scan.close();
            }
            Event::End(_) => scan.close(),
            Event::Text(e) => {
                if scan.depth == 0 {
                    if !e.iter().all(u8::is_ascii_whitespace) {
                        return Err(malformed(&reader, "text outside the root element"));
                    }
                } else {
                    // Unescape everywhere so bad entities fail even outside titles
                    let text = e.unescape().map_err(|e| malformed(&reader, e.to_string()))?;
                    if scan.capturing_title() {
                        scan.push_title_text(&text);
                    }
                }
            }
            Event::CData(e) => {
                if scan.depth == 0 {
                    return Err(malformed(&reader, "CDATA outside the root element"));
                }
                let text =
                    std::str::from_utf8(&e).map_err(|e| malformed(&reader, e.to_string()))?;
                if scan.capturing_title() {
                    scan.push_title_text(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if scan.depth > 0 {
        return Err(malformed(&reader, "unexpected end of document, unclosed element"));
    }
    if !scan.root_seen {
        return Err(malformed(&reader, "no root element found"));
    }
    if scan.channel == ChannelState::NotFound {
        return Err(FeedError::MissingChannel);
    }

    tracing::debug!(
        items = scan.items_seen,
        entries = scan.mapping.len(),
        "Extracted title/URL mapping"
    );
    Ok(scan.mapping)
}

fn malformed<R>(reader: &Reader<R>, message: impl Into<String>) -> FeedError {
    FeedError::MalformedXml {
        position: reader.buffer_position() as u64,
        message: message.into(),
    }
}

// Element depths, counting the root element as depth 1.
const CHANNEL_DEPTH: usize = 2;
const ITEM_DEPTH: usize = 3;
const FIELD_DEPTH: usize = 4;

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
enum ChannelState {
    #[default]
    NotFound,
    Open,
    Closed,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
enum TitleText {
    #[default]
    Pending,
    Capturing,
    Done,
}

/// An `<item>` whose children are still being read.
#[derive(Debug, Default)]
struct ItemDraft {
    title: Option<String>,
    title_text: TitleText,
    /// `Some(None)` when the enclosure exists without a `url` attribute.
    enclosure_url: Option<Option<String>>,
}

#[derive(Debug, Default)]
struct FeedScan {
    depth: usize,
    root_seen: bool,
    channel: ChannelState,
    item: Option<ItemDraft>,
    items_seen: usize,
    mapping: Mapping,
}

impl FeedScan {
    fn open(&mut self, e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<(), FeedError> {
        self.depth += 1;
        let url = url_attribute(e, reader)?;
        let name = e.name();
        let name = name.as_ref();

        match self.depth {
            1 => {
                if self.root_seen {
                    return Err(malformed(reader, "more than one root element"));
                }
                self.root_seen = true;
            }
            CHANNEL_DEPTH if name == b"channel" && self.channel == ChannelState::NotFound => {
                self.channel = ChannelState::Open;
            }
            ITEM_DEPTH if name == b"item" && self.channel == ChannelState::Open => {
                self.items_seen += 1;
                self.item = Some(ItemDraft::default());
            }
            FIELD_DEPTH => {
                if let Some(item) = self.item.as_mut() {
                    match name {
                        b"title" if item.title.is_none() => {
                            item.title = Some(String::new());
                            item.title_text = TitleText::Capturing;
                        }
                        b"enclosure" if item.enclosure_url.is_none() => {
                            item.enclosure_url = Some(url);
                        }
                        _ => {}
                    }
                }
            }
            _ => {
                // Title text stops at the first nested element
                if self.depth == FIELD_DEPTH + 1 {
                    if let Some(item) = self.item.as_mut() {
                        if item.title_text == TitleText::Capturing {
                            item.title_text = TitleText::Done;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        match self.depth {
            FIELD_DEPTH => {
                if let Some(item) = self.item.as_mut() {
                    if item.title_text == TitleText::Capturing {
                        item.title_text = TitleText::Done;
                    }
                }
            }
            ITEM_DEPTH => {
                if let Some(item) = self.item.take() {
                    self.finish_item(item);
                }
            }
            CHANNEL_DEPTH if self.channel == ChannelState::Open => {
                self.channel = ChannelState::Closed;
            }
            _ => {}
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn capturing_title(&self) -> bool {
        self.depth == FIELD_DEPTH
            && self
                .item
                .as_ref()
                .is_some_and(|item| item.title_text == TitleText::Capturing)
    }

    fn push_title_text(&mut self, text: &str) {
        if let Some(title) = self.item.as_mut().and_then(|item| item.title.as_mut()) {
            title.push_str(text);
        }
    }

    fn finish_item(&mut self, item: ItemDraft) {
        let index = self.items_seen;
        let Some(title) = item.title else {
            tracing::debug!(item = index, "Skipping item without <title>");
            return;
        };
        let Some(url) = item.enclosure_url else {
            tracing::debug!(item = index, title = %title.trim(), "Skipping item without <enclosure>");
            return;
        };
        let url = url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            tracing::debug!(item = index, title = %title.trim(), "Skipping item with blank enclosure url");
            return;
        }

        let title = normalize_newlines(&title).trim().to_string();
        if let Some(previous) = self.mapping.insert(title, url.to_string()) {
            tracing::debug!(item = index, previous = %previous, url = %url, "Duplicate title, keeping later url");
        }
    }
}

/// Checks every attribute of an element and returns its unescaped `url`.
///
/// Syntax errors, duplicate names and unknown entities in any attribute are
/// malformed XML, whether or not the element is one the mapping reads.
fn url_attribute(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Option<String>, FeedError> {
    let mut url = None;
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| malformed(reader, e.to_string()))?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| malformed(reader, e.to_string()))?;
        if attr.key.as_ref() == b"url" {
            url = Some(value.into_owned());
        }
    }
    Ok(url)
}

/// XML end-of-line handling: `\r\n` and lone `\r` read as `\n`.
fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}
