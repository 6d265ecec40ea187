//! HTML entity decoding for feed text.

/// Replaces named and numeric character references. Unknown ones are kept.
#[must_use]
pub fn decode_entities(input: &str) -> String {
    html_escape::decode_html_entities(input).into_owned()
}
