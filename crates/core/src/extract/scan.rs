//! Byte-level scanning over partially generated JSON.
//!
//! All structural characters (`{`, `}`, `[`, `]`, `"`, `\`) are ASCII, so
//! scanning bytes of a UTF-8 buffer never lands inside a multi-byte char.
//! A backslash inside a string escapes exactly the next byte; the hex
//! digits of a `\uXXXX` escape can never be structural, so no extra state
//! is needed for them.

#[derive(Debug, Default, Clone, Copy)]
struct StringState {
    in_string: bool,
    escaped: bool,
}

impl StringState {
    /// Feeds one byte and reports whether it is structural, i.e. outside
    /// any string literal and not a quote.
    fn structural(&mut self, byte: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return false;
        }
        if byte == b'"' {
            self.in_string = true;
            return false;
        }
        true
    }
}

/// Returns the index just past the `}` that closes the object opening at
/// `start`, or `None` if the object is not closed yet.
pub fn matching_brace(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut state = StringState::default();
    let mut depth = 0usize;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if !state.structural(byte) {
            continue;
        }
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locates the value of `key` among the direct members of the first
/// top-level object in `text`. Returns the index of the value's first
/// byte, or `None` if the key (or its value) has not been generated yet.
pub fn find_member_value(text: &str, key: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let root = text.find('{')?;

    let mut depth = 0usize;
    let mut string_start = 0usize;
    let mut state = StringState::default();

    for i in root..bytes.len() {
        let byte = bytes[i];
        let was_in_string = state.in_string;
        if !state.structural(byte) {
            if !was_in_string {
                string_start = i + 1;
            } else if !state.in_string && depth == 1 && &text[string_start..i] == key {
                let colon = skip_whitespace(bytes, i + 1);
                match bytes.get(colon) {
                    Some(b':') => {
                        let value = skip_whitespace(bytes, colon + 1);
                        return (value < bytes.len()).then_some(value);
                    }
                    None => return None,
                    Some(_) => {}
                }
            }
            continue;
        }
        match byte {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayItem {
    /// A complete object spanning `start..end`.
    Object { start: usize, end: usize },
    /// More text is needed before the next element can be read.
    Pending,
    /// The array is closed, or holds something other than objects.
    End,
}

/// Reads the next object element of an array, starting at `pos` (just
/// past the `[` or a previous element).
pub fn next_array_object(text: &str, pos: usize) -> ArrayItem {
    let bytes = text.as_bytes();
    let mut i = pos;
    while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
        i += 1;
    }
    match bytes.get(i) {
        None => ArrayItem::Pending,
        Some(b'{') => match matching_brace(text, i) {
            Some(end) => ArrayItem::Object { start: i, end },
            None => ArrayItem::Pending,
        },
        Some(_) => ArrayItem::End,
    }
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn braces_inside_strings_do_not_count() {
        let text = r#"{"content": "use a { here", "more": "and } there"} trailing"#;
        let end = matching_brace(text, 0).unwrap();
        assert_eq!(&text[end..], " trailing");
    }

    #[test]
    fn escaped_quotes_stay_inside_string() {
        let text = r#"{"a": "say \"}\" please"}"#;
        assert_eq!(matching_brace(text, 0), Some(text.len()));
    }

    #[test]
    fn escaped_backslash_ends_escape() {
        let text = r#"{"path": "C:\\"}"#;
        assert_eq!(matching_brace(text, 0), Some(text.len()));
    }

    #[test]
    fn unicode_escapes_are_inert() {
        let text = r#"{"a": "\u007B \u0022 \u007D"}"#;
        assert_eq!(matching_brace(text, 0), Some(text.len()));
    }

    #[test]
    fn unclosed_object_is_pending() {
        assert_eq!(matching_brace(r#"{"a": {"b": 1}"#, 0), None);
        assert_eq!(matching_brace("x{}", 0), None);
    }

    #[test]
    fn finds_only_top_level_members() {
        let text = r#"{"nested": {"sections": 1}, "note": "\"sections\": [", "sections": [ {"#;
        let value = find_member_value(text, "sections").unwrap();
        assert_eq!(&text[value..value + 1], "[");
        assert_eq!(value, text.rfind('[').unwrap());
    }

    #[test]
    fn member_without_value_is_pending() {
        assert_eq!(find_member_value(r#"{"summary""#, "summary"), None);
        assert_eq!(find_member_value(r#"{"summary": "#, "summary"), None);
        assert_eq!(find_member_value(r#"{"summary": {"#, "summary"), Some(12));
    }

    #[test]
    fn string_values_are_not_keys() {
        let text = r#"{"kind": "summary", "summary": {}}"#;
        let value = find_member_value(text, "summary").unwrap();
        assert_eq!(&text[value..], "{}}");
    }

    #[test]
    fn iterates_array_objects() {
        let text = r#"[ {"id": "a"}, {"id": "b"} , {"id"#;
        let first = next_array_object(text, 1);
        let ArrayItem::Object { start, end } = first else {
            panic!("expected object, got {first:?}");
        };
        assert_eq!(&text[start..end], r#"{"id": "a"}"#);
        let second = next_array_object(text, end);
        let ArrayItem::Object { end, .. } = second else {
            panic!("expected object, got {second:?}");
        };
        assert_eq!(next_array_object(text, end), ArrayItem::Pending);
        assert_eq!(next_array_object("[]", 1), ArrayItem::End);
    }
}
