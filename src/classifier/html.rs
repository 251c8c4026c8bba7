//! HTML-to-text stripping for email bodies.
//!
//! Booking emails frequently arrive as HTML. The field-extraction regexes
//! in [`super::patterns`] only work reliably on plain text, so bodies are
//! flattened first: tags dropped, `<br>`/`</p>` converted to newlines, basic
//! entities decoded, and runs of blank lines collapsed.

use regex::Regex;

/// Convert an email body to plain text suitable for pattern matching.
///
/// Bodies without any `<`/`>` pair are returned trimmed but otherwise
/// untouched, so already-plain bodies keep their exact line structure.
pub fn html_to_text(body: &str) -> String {
    if !(body.contains('<') && body.contains('>')) {
        return body.trim().to_owned();
    }

    let mut text = body.to_owned();
    text = replace_all(&text, r"(?i)<br\s*/?>", "\n");
    text = replace_all(&text, r"(?i)</p>", "\n");
    text = replace_all(&text, r"(?i)<p[^>]*>", "");
    text = replace_all(&text, r"<[^>]*>", "");

    text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");

    text = replace_all(&text, r"\n\s*\n", "\n\n");
    text.trim().to_owned()
}

fn replace_all(text: &str, pattern: &str, replacement: &str) -> String {
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(text, replacement).into_owned(),
        Err(_) => text.to_owned(),
    }
}
