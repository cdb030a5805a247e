//! Pull a JSON object out of free-form model output.

use serde_json::{Deserializer, Map, Value};

/// Object starting at the beginning of `text`, with its byte length.
fn object_at(text: &str) -> Option<(Map<String, Value>, usize)> {
    let mut stream = Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Object(map))) => Some((map, stream.byte_offset())),
        _ => None,
    }
}

/// Last well-formed JSON object in `text`.
///
/// Every `{` is a candidate start. A candidate that parses consumes its
/// whole object, so braces nested inside it are not tried again; one that
/// does not parse (stray prose braces, a truncated tail) is skipped.
pub fn extract_latest_json_object(text: &str) -> Option<Map<String, Value>> {
    let mut latest = None;
    let mut pos = 0;
    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        match object_at(&text[start..]) {
            Some((map, len)) => {
                latest = Some(map);
                pos = start + len;
            }
            None => pos = start + 1,
        }
    }
    latest
}
