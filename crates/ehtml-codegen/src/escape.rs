//! Escaping helpers.

/// HTML-escape `& < > " '`, the same transform `__e` applies at render time.
pub fn html(text: &str) -> String {
    ehtml_script::escape_html(text)
}

/// Escape text for a double-quoted script string literal.
pub fn script_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}
