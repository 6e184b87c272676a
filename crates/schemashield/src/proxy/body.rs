//! Text views of raw exchange bytes for capture records.

use crate::capture::HeaderFields;
use hyper::HeaderMap;

/// Result of decoding a body as UTF-8 text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyText<'a> {
    /// No bytes at all
    Empty,
    /// Valid UTF-8
    Utf8(&'a str),
    /// Bytes that are not valid UTF-8
    Undecodable(&'a [u8]),
}

/// Decode `bytes` as UTF-8 without losing the undecodable case.
pub fn decode_text(bytes: &[u8]) -> BodyText<'_> {
    if bytes.is_empty() {
        return BodyText::Empty;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => BodyText::Utf8(text),
        Err(_) => BodyText::Undecodable(bytes),
    }
}

impl BodyText<'_> {
    /// Capture policy: empty bodies are absent, invalid sequences become U+FFFD.
    pub fn into_lossy(self) -> Option<String> {
        match self {
            BodyText::Empty => None,
            BodyText::Utf8(text) => Some(text.to_string()),
            BodyText::Undecodable(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Flatten a header map into ordered name/value fields.
///
/// Repeated names are joined with `", "`; values that are not visible ASCII
/// are decoded lossily.
pub fn header_fields(headers: &HeaderMap) -> HeaderFields {
    let mut fields = HeaderFields::with_capacity(headers.keys_len());
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| match value.to_str() {
                Ok(s) => s.to_string(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        fields.insert(name.as_str().to_string(), serde_json::Value::String(joined));
    }
    fields
}
