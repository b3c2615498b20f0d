//! Byte splitting
//!
//! Splits raw payloads on configured delimiters. Nothing is buffered across
//! reads: each payload is split as it arrived.

/// Split `data` on every occurrence of `delimiter`.
///
/// Behaves like splitting a byte string: no occurrence yields the whole
/// input, adjacent delimiters yield empty parts, and a leading or trailing
/// delimiter yields an empty first or last part.
pub fn split_bytes<'a>(data: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    debug_assert!(!delimiter.is_empty(), "delimiter must not be empty");

    let mut parts = Vec::new();
    let mut rest = data;
    while let Some(pos) = find(rest, delimiter) {
        parts.push(&rest[..pos]);
        rest = &rest[pos + delimiter.len()..];
    }
    parts.push(rest);
    parts
}

/// Split a payload into command fragments.
///
/// The empty fragment left behind by a payload that ends with the
/// delimiter is dropped, so `b"A\nB\n"` gives two commands, not three.
/// Interior empty fragments are kept.
pub fn split_commands<'a>(data: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut fragments = split_bytes(data, delimiter);
    if fragments.len() > 1 && fragments.last().is_some_and(|last| last.is_empty()) {
        fragments.pop();
    }
    fragments
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
