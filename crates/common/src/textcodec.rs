// Wire-text codec: HTML escaping + literal line-break marker.
//
// Cue text crosses the wire HTML-escaped, with native newlines replaced
// by a literal `<br />` marker. Encoding escapes first and substitutes
// the marker second; decoding reverses in the opposite order. That
// ordering makes the round trip exact even for text that itself
// contains the literal marker (its angle brackets are escaped away
// before the marker substitution can see them).

/// Literal marker standing in for a newline in wire text.
pub const LINE_BREAK_MARKER: &str = "<br />";

/// Encode local cue text for the wire.
pub fn encode(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;");
    escaped.replace('\n', LINE_BREAK_MARKER)
}

/// Decode wire text back to local cue text. Inverse of [`encode`].
pub fn decode(text: &str) -> String {
    let unbroken = text.replace(LINE_BREAK_MARKER, "\n");
    // `&amp;` last, so escaped entities don't get double-decoded.
    unbroken
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
