//! Multi-status (RFC 4918) response parsing
//!
//! Every namespace quirk lives here: elements are matched by local name so
//! `d:`, `D:`, `lp1:` or unprefixed responses all parse the same way.

use super::{normalize_etag, DavEntry};
use crate::types::SyncError;
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Request body asking for the three properties the scanner needs
pub const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?><d:propfind xmlns:d="DAV:"><d:prop><d:getlastmodified/><d:getetag/><d:resourcetype/></d:prop></d:propfind>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Href,
    LastModified,
    Etag,
}

#[derive(Debug, Default)]
struct RawResponse {
    href: String,
    last_modified: Option<String>,
    etag: Option<String>,
    is_collection: bool,
}

/// Parse a multi-status body listing `base_path`.
///
/// `base_path` is the decoded URL path of the collection that was listed.
/// The collection's own entry is dropped and every other entry gets a path
/// relative to it.
pub fn parse_multistatus(xml: &str, base_path: &str) -> Result<Vec<DavEntry>, SyncError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut responses = Vec::new();
    let mut current: Option<RawResponse> = None;
    let mut field: Option<Field> = None;
    let mut in_resourcetype = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => current = Some(RawResponse::default()),
                b"href" => field = Some(Field::Href),
                b"getlastmodified" => field = Some(Field::LastModified),
                b"getetag" => field = Some(Field::Etag),
                b"resourcetype" => in_resourcetype = true,
                b"collection" if in_resourcetype => {
                    if let Some(resp) = current.as_mut() {
                        resp.is_collection = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_resourcetype && e.local_name().as_ref() == b"collection" {
                    if let Some(resp) = current.as_mut() {
                        resp.is_collection = true;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| SyncError::Xml(e.to_string()))?
                    .into_owned();
                store_text(current.as_mut(), field, text);
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                store_text(current.as_mut(), field, text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"response" => {
                    if let Some(resp) = current.take() {
                        responses.push(resp);
                    }
                }
                b"href" | b"getlastmodified" | b"getetag" => field = None,
                b"resourcetype" => in_resourcetype = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SyncError::Xml(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    let base = normalize_href_path(base_path);
    let base_lower = base.to_ascii_lowercase();

    let mut entries = Vec::with_capacity(responses.len());
    for resp in responses {
        if resp.href.trim().is_empty() {
            continue;
        }
        let is_dir = resp.is_collection || resp.href.trim_end().ends_with('/');
        let item = normalize_href_path(&href_path(resp.href.trim()));
        if item.to_ascii_lowercase() == base_lower {
            continue;
        }

        let Some(rel) = relative_path(&item, &base, &base_lower) else {
            continue;
        };

        entries.push(DavEntry {
            path: rel,
            is_dir,
            mtime_ms: resp.last_modified.as_deref().and_then(parse_http_date),
            etag: resp.etag.as_deref().and_then(normalize_etag),
        });
    }

    Ok(entries)
}

fn store_text(current: Option<&mut RawResponse>, field: Option<Field>, text: String) {
    let (Some(resp), Some(field)) = (current, field) else {
        return;
    };
    match field {
        Field::Href => resp.href.push_str(&text),
        Field::LastModified => resp.last_modified = Some(text),
        Field::Etag => resp.etag = Some(text),
    }
}

/// Decoded path component of an href, which may be a full URL
fn href_path(href: &str) -> String {
    let path = match href.find("://") {
        Some(idx) => {
            let after_scheme = &href[idx + 3..];
            after_scheme
                .find('/')
                .map(|slash| &after_scheme[slash..])
                .unwrap_or("/")
        }
        None => href,
    };
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

fn normalize_href_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn relative_path(item: &str, base: &str, base_lower: &str) -> Option<String> {
    let item_lower = item.to_ascii_lowercase();
    let prefix_len = if base == "/" { 0 } else { base.len() };
    let rel = if item_lower.starts_with(base_lower) && item[prefix_len..].starts_with('/') {
        &item[prefix_len + 1..]
    } else {
        // Server answered with hrefs outside the listed path (proxies,
        // rewritten prefixes): the last segment is all that is reliable.
        item.rsplit('/').next().unwrap_or("")
    };
    let rel = rel.trim_matches('/');
    (!rel.is_empty()).then(|| rel.to_string())
}

/// Parse `getlastmodified` (RFC 1123, occasionally RFC 3339) into epoch ms
pub fn parse_http_date(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    chrono::DateTime::parse_from_rfc2822(raw)
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.timestamp_millis())
}
