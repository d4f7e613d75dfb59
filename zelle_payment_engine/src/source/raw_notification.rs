//! Decoding of raw RFC 822 messages into [`RawNotification`]s.
//!
//! Bank notifications are simple messages, so this is deliberately not a complete MIME implementation. It handles
//! the subset that notification senders actually use:
//!
//! * folded header lines,
//! * RFC 2047 encoded words (`=?utf-8?B?...?=` and `=?utf-8?Q?...?=`) in headers,
//! * `multipart/*` bodies, nested to a small depth, preferring `text/plain` and falling back to `text/html` with the
//!   markup removed,
//! * `base64` and `quoted-printable` transfer encodings,
//! * `utf-8` and `iso-8859-1` character sets.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::SourceError;

/// Message bodies are truncated to this many characters.
pub const MAX_BODY_CHARS: usize = 5_000;
const MAX_MIME_DEPTH: usize = 5;

static ENCODED_WORD: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"=\?([^?\s]+)\?([bBqQ])\?([^?\s]*)\?=").ok());
static INVISIBLE_HTML: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?is)<(?:script|style|head)[^>]*>.*?</(?:script|style|head)\s*>").ok());
static BLOCK_TAG: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)<\s*(?:br|/p|/div|/tr|/li|/h[1-6]|/table)[^>]*>").ok());
static ANY_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<[^>]+>").ok());

/// A notification message, decoded into the handful of fields the pipeline cares about. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNotification {
    pub id: String,
    pub received_at: DateTime<Utc>,
    pub sender_address: String,
    pub subject: String,
    pub body: String,
}

impl RawNotification {
    pub fn new<S1, S2, S3, S4>(id: S1, received_at: DateTime<Utc>, sender_address: S2, subject: S3, body: S4) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self {
            id: id.into(),
            received_at,
            sender_address: sender_address.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Decodes the raw bytes of a message.
    ///
    /// Fails with [`SourceError::Decode`] only when the bytes do not start with a header block. Every other oddity
    /// (bad dates, broken encodings, unknown charsets) degrades to a best-effort value.
    pub fn from_rfc822(id: &str, bytes: &[u8]) -> Result<Self, SourceError> {
        let text = String::from_utf8_lossy(bytes).replace("\r\n", "\n");
        let message = Entity::parse(&text, true)
            .ok_or_else(|| SourceError::Decode(format!("Message {id} does not contain a valid header block")))?;
        let subject = message.header("subject").map(decode_encoded_words).unwrap_or_default();
        let sender_address =
            message.header("from").map(|from| extract_address(&decode_encoded_words(from))).unwrap_or_default();
        let received_at = match message.header("date").and_then(parse_date) {
            Some(date) => date,
            None => {
                debug!("Message {id} has no usable Date header. Using the current time instead.");
                Utc::now()
            },
        };
        let body = truncate(message.text_body(), MAX_BODY_CHARS);
        trace!("Decoded message {id}: '{subject}' from {sender_address}, {} body chars", body.chars().count());
        Ok(Self { id: id.to_string(), received_at, sender_address, subject: subject.trim().to_string(), body })
    }

    /// Renders the notification as a minimal single-part `text/plain` message that [`Self::from_rfc822`] can read
    /// back.
    pub fn to_rfc822(&self) -> Vec<u8> {
        format!(
            "From: <{}>\r\nSubject: {}\r\nDate: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; \
             charset=utf-8\r\n\r\n{}",
            self.sender_address,
            self.subject,
            self.received_at.to_rfc2822(),
            self.body.replace('\n', "\r\n")
        )
        .into_bytes()
    }
}

/// One MIME entity: a header block and the (still encoded) body that follows it.
struct Entity<'a> {
    headers: Vec<(String, String)>,
    body: &'a str,
}

impl<'a> Entity<'a> {
    /// Splits `text` at the first blank line. When `require_headers` is true, the text must begin with at least one
    /// well-formed header line. MIME parts are allowed to omit their headers entirely.
    fn parse(text: &'a str, require_headers: bool) -> Option<Self> {
        if let Some(body) = text.strip_prefix('\n') {
            return (!require_headers).then_some(Self { headers: Vec::new(), body });
        }
        let (header_block, body) = match text.find("\n\n") {
            Some(idx) => (&text[..idx], &text[idx + 2..]),
            None => (text, ""),
        };
        match parse_headers(header_block) {
            Some(headers) => Some(Self { headers, body }),
            None if require_headers => None,
            None => Some(Self { headers: Vec::new(), body: text }),
        }
    }

    /// The value of the first header called `name` (case-insensitive).
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    fn content_type(&self) -> ContentType {
        self.header("content-type").map(ContentType::parse).unwrap_or_default()
    }

    /// The readable text of this entity. Multipart messages yield their first `text/plain` part, or failing that,
    /// their first `text/html` part with the markup removed.
    fn text_body(&self) -> String {
        let content_type = self.content_type();
        if content_type.is_multipart() && content_type.boundary().is_some() {
            let mut found = FoundText::default();
            self.walk(0, &mut found);
            return found.plain.or(found.html).unwrap_or_default();
        }
        let text = self.decoded_content(&content_type);
        if content_type.mime == "text/html" {
            strip_html(&text)
        } else {
            text
        }
    }

    fn walk(&self, depth: usize, found: &mut FoundText) {
        if found.plain.is_some() || depth > MAX_MIME_DEPTH {
            return;
        }
        let content_type = self.content_type();
        if content_type.is_multipart() {
            let Some(boundary) = content_type.boundary() else {
                return;
            };
            for part in split_multipart(self.body, boundary) {
                if let Some(child) = Entity::parse(&part, false) {
                    child.walk(depth + 1, found);
                }
            }
            return;
        }
        match content_type.mime.as_str() {
            "text/plain" => found.plain = Some(self.decoded_content(&content_type)),
            "text/html" if found.html.is_none() => found.html = Some(strip_html(&self.decoded_content(&content_type))),
            _ => {},
        }
    }

    fn decoded_content(&self, content_type: &ContentType) -> String {
        let encoding = self.header("content-transfer-encoding").map(|e| e.trim().to_ascii_lowercase());
        let bytes = match encoding.as_deref() {
            Some("base64") => {
                let compact = self.body.chars().filter(|c| !c.is_whitespace()).collect::<String>();
                match base64::decode(compact) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        debug!("Invalid base64 content, using the raw body instead. {e}");
                        return self.body.to_string();
                    },
                }
            },
            Some("quoted-printable") => decode_quoted_printable(self.body),
            _ => return self.body.to_string(),
        };
        decode_charset(&bytes, content_type.params.get("charset").map(String::as_str))
    }
}

#[derive(Default)]
struct FoundText {
    plain: Option<String>,
    html: Option<String>,
}

struct ContentType {
    mime: String,
    params: HashMap<String, String>,
}

impl Default for ContentType {
    fn default() -> Self {
        Self { mime: "text/plain".to_string(), params: HashMap::new() }
    }
}

impl ContentType {
    fn parse(value: &str) -> Self {
        let mut pieces = value.split(';');
        let mime = pieces.next().map(|m| m.trim().to_ascii_lowercase()).unwrap_or_default();
        let params = pieces
            .filter_map(|p| p.split_once('='))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().trim_matches('"').to_string()))
            .collect();
        if mime.is_empty() {
            return Self { params, ..Self::default() };
        }
        Self { mime, params }
    }

    fn is_multipart(&self) -> bool {
        self.mime.starts_with("multipart/")
    }

    fn boundary(&self) -> Option<&str> {
        self.params.get("boundary").map(String::as_str).filter(|b| !b.is_empty())
    }
}

/// Parses an unfolded header block. Returns `None` if the first line is not a header.
fn parse_headers(block: &str) -> Option<Vec<(String, String)>> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in block.split('\n') {
        if line.starts_with([' ', '\t']) {
            match headers.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                },
                None => return None,
            }
            continue;
        }
        match line.split_once(':') {
            Some((name, value)) if is_header_name(name) => headers.push((name.to_string(), value.trim().to_string())),
            _ if headers.is_empty() => return None,
            // A malformed line in the middle of a header block is dropped
            _ => {},
        }
    }
    (!headers.is_empty()).then_some(headers)
}

fn is_header_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_graphic() && c != ':')
}

fn split_multipart(body: &str, boundary: &str) -> Vec<String> {
    let delimiter = format!("--{boundary}");
    let close = format!("{delimiter}--");
    let mut parts = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in body.split('\n') {
        let trimmed = line.trim_end();
        if trimmed == close {
            break;
        }
        if trimmed == delimiter {
            if let Some(lines) = current.take() {
                parts.push(lines.join("\n"));
            }
            current = Some(Vec::new());
            continue;
        }
        if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some(lines) = current.take() {
        parts.push(lines.join("\n"));
    }
    parts
}

/// Decodes any RFC 2047 encoded words in a header value. Whitespace between adjacent encoded words is dropped.
fn decode_encoded_words(value: &str) -> String {
    let Some(re) = ENCODED_WORD.as_ref() else {
        return value.to_string();
    };
    let mut result = String::with_capacity(value.len());
    let mut last = 0;
    for caps in re.captures_iter(value) {
        let Some(word) = caps.get(0) else {
            continue;
        };
        let gap = &value[last..word.start()];
        if !(last > 0 && gap.trim().is_empty()) {
            result.push_str(gap);
        }
        let charset = caps.get(1).map(|m| m.as_str());
        let encoding = caps.get(2).map(|m| m.as_str().to_ascii_lowercase());
        let text = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        let bytes = match encoding.as_deref() {
            Some("b") => base64::decode(text).ok(),
            _ => Some(decode_q_encoding(text)),
        };
        match bytes {
            Some(bytes) => result.push_str(&decode_charset(&bytes, charset)),
            None => result.push_str(word.as_str()),
        }
        last = word.end();
    }
    result.push_str(&value[last..]);
    result
}

fn decode_q_encoding(text: &str) -> Vec<u8> {
    decode_quoted_printable(&text.replace('_', " "))
}

fn decode_quoted_printable(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }
        // Soft line break
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        let hex = bytes.get(i + 1..i + 3).and_then(|h| std::str::from_utf8(h).ok());
        match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
            Some(b) => {
                result.push(b);
                i += 3;
            },
            None => {
                result.push(b'=');
                i += 1;
            },
        }
    }
    result
}

fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    match charset.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
        Some("iso-8859-1" | "latin1" | "latin-1" | "windows-1252" | "cp1252") => {
            bytes.iter().map(|b| char::from(*b)).collect()
        },
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// `Name <addr@example.com>` becomes `addr@example.com`. A bare address is returned unchanged.
fn extract_address(from: &str) -> String {
    match (from.rfind('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => from[start + 1..end].trim().to_string(),
        _ => from.trim().trim_matches('"').to_string(),
    }
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    // Strip trailing comments like "(UTC)", which the RFC 2822 parser does not accept
    let value = match value.find('(') {
        Some(idx) => &value[..idx],
        None => value,
    };
    DateTime::parse_from_rfc2822(value.trim()).ok().map(|d| d.with_timezone(&Utc))
}

fn strip_html(html: &str) -> String {
    let mut text = html.to_string();
    if let Some(re) = INVISIBLE_HTML.as_ref() {
        text = re.replace_all(&text, "").into_owned();
    }
    if let Some(re) = BLOCK_TAG.as_ref() {
        text = re.replace_all(&text, "\n").into_owned();
    }
    if let Some(re) = ANY_TAG.as_ref() {
        text = re.replace_all(&text, " ").into_owned();
    }
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}
