//! Integration tests for the feed export lifecycle: read XML, extract, write JSON.
//!
//! Each test works in its own directory under the system temp dir. These
//! tests go through the public file-based API, the same path the binary takes.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use soundon_export::feed::{
    extract_title_url_map, parse_feed_content, render_mapping, write_mapping, FeedError, Mapping,
};

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("soundon_export_it_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_feed(dir: &Path, xml: &str) -> PathBuf {
    let path = dir.join("soundon.xml");
    std::fs::write(&path, xml).unwrap();
    path
}

fn export(input: &Path, output: &Path, indent: usize) -> Result<Mapping, FeedError> {
    let mapping = extract_title_url_map(input)?;
    write_mapping(&mapping, output, indent)?;
    Ok(mapping)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// Documented scenarios
// ============================================================================

#[test]
fn test_item_without_enclosure_is_skipped() {
    let dir = test_dir("scenario_a");
    let input = write_feed(
        &dir,
        r#"<rss><channel>
<item><title> Ep 1 </title><enclosure url=" http://x/1.mp3 "/></item>
<item><title>Ep 2</title></item>
</channel></rss>"#,
    );
    let output = dir.join("out.json");

    export(&input, &output, 2).unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    assert_eq!(content, "{\n  \"Ep 1\": \"http://x/1.mp3\"\n}\n");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_duplicate_title_last_write_wins() {
    let dir = test_dir("scenario_b");
    let input = write_feed(
        &dir,
        r#"<rss><channel>
<item><title>Ep 1</title><enclosure url="http://x/1.mp3"/></item>
<item><title>Ep 1</title><enclosure url="http://x/2.mp3"/></item>
</channel></rss>"#,
    );
    let output = dir.join("out.json");

    let mapping = export(&input, &output, 2).unwrap();
    assert_eq!(mapping.len(), 1);
    assert_eq!(mapping["Ep 1"], "http://x/2.mp3");

    let parsed: IndexMap<String, String> =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(parsed, mapping);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_channel_writes_nothing() {
    let dir = test_dir("scenario_c");
    let input = write_feed(&dir, "<rss><item><title>x</title></item></rss>");
    let output = dir.join("out.json");

    let result = export(&input, &output, 2);
    assert!(matches!(result, Err(FeedError::MissingChannel)));
    assert!(!output.exists());
    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Error paths
// ============================================================================

#[test]
fn test_malformed_input_writes_nothing() {
    let dir = test_dir("malformed");
    let input = write_feed(&dir, "<rss><channel><item></channel></rss>");
    let output = dir.join("out.json");

    let result = export(&input, &output, 2);
    assert!(matches!(result, Err(FeedError::MalformedXml { .. })));
    assert!(!output.exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_unreadable_input_is_read_error() {
    let dir = test_dir("unreadable");
    let result = extract_title_url_map(&dir.join("absent.xml"));

    let err = result.unwrap_err();
    assert!(matches!(err, FeedError::Read { .. }));
    assert!(err.to_string().contains("absent.xml"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_output_directory_is_write_error() {
    let dir = test_dir("no_output_dir");
    let input = write_feed(
        &dir,
        r#"<rss><channel><item><title>A</title><enclosure url="http://x/a"/></item></channel></rss>"#,
    );
    let output = dir.join("missing").join("out.json");

    let result = export(&input, &output, 2);
    assert!(matches!(result, Err(FeedError::Write { .. })));
    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Output properties
// ============================================================================

#[test]
fn test_export_is_idempotent() {
    let dir = test_dir("idempotent");
    let input = write_feed(
        &dir,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
<channel>
  <title>節目</title>
  <item>
    <title><![CDATA[EP1 開場]]></title>
    <enclosure url="https://file.soundon.fm/1.mp3" length="1" type="audio/mpeg"/>
  </item>
  <item>
    <title>EP2 café</title>
    <enclosure url="https://file.soundon.fm/2.mp3" length="2" type="audio/mpeg"/>
  </item>
</channel>
</rss>"#,
    );
    let first = dir.join("first.json");
    let second = dir.join("second.json");

    export(&input, &first, 2).unwrap();
    export(&input, &second, 2).unwrap();
    export(&input, &second, 2).unwrap();

    let first = std::fs::read(&first).unwrap();
    let second = std::fs::read(&second).unwrap();
    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    assert!(text.contains("EP1 開場"), "non-ASCII should be written literally: {text}");
    assert!(!text.contains("\\u"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_indent_width_applies() {
    let dir = test_dir("indent");
    let input = write_feed(
        &dir,
        r#"<rss><channel><item><title>A</title><enclosure url="http://x/a"/></item></channel></rss>"#,
    );
    let output = dir.join("out.json");

    export(&input, &output, 4).unwrap();
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "{\n    \"A\": \"http://x/a\"\n}\n"
    );
    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Property tests
// ============================================================================

#[derive(Debug, Clone)]
struct GenItem {
    title: Option<String>,
    url: Option<String>,
}

fn gen_item() -> impl Strategy<Value = GenItem> {
    (
        proptest::option::weighted(0.9, "[ a-zA-Z0-9&<>\"éü節目]{0,12}"),
        proptest::option::weighted(0.9, "[ ]{0,2}(http://x/[a-z0-9]{0,6})?[ ]{0,2}"),
    )
        .prop_map(|(title, url)| GenItem { title, url })
}

fn build_feed(items: &[GenItem]) -> String {
    let mut xml = String::from("<rss><channel>\n");
    for item in items {
        xml.push_str("<item>");
        if let Some(title) = &item.title {
            xml.push_str(&format!("<title>{}</title>", xml_escape(title)));
        }
        if let Some(url) = &item.url {
            xml.push_str(&format!("<enclosure url=\"{}\"/>", xml_escape(url)));
        }
        xml.push_str("</item>\n");
    }
    xml.push_str("</channel></rss>");
    xml
}

fn expected_mapping(items: &[GenItem]) -> Mapping {
    let mut mapping = Mapping::new();
    for item in items {
        if let (Some(title), Some(url)) = (&item.title, &item.url) {
            if !url.trim().is_empty() {
                mapping.insert(title.trim().to_string(), url.trim().to_string());
            }
        }
    }
    mapping
}

proptest! {
    #[test]
    fn prop_mapping_matches_reference(items in proptest::collection::vec(gen_item(), 0..20)) {
        let xml = build_feed(&items);
        let mapping = parse_feed_content(xml.as_bytes()).unwrap();
        prop_assert_eq!(mapping, expected_mapping(&items));
    }

    #[test]
    fn prop_json_round_trip(items in proptest::collection::vec(gen_item(), 0..20), indent in 0usize..6) {
        let mapping = expected_mapping(&items);
        let rendered = render_mapping(&mapping, indent).unwrap();
        prop_assert!(rendered.ends_with('\n'));

        let parsed: IndexMap<String, String> = serde_json::from_str(&rendered).unwrap();
        prop_assert_eq!(parsed, mapping);
    }
}
