// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

/// Strips NUL bytes entirely and replaces any other C0 control character
/// (everything below 0x20 except CR, LF, TAB) with a single space. Higher
/// codepoints are left untouched.
pub fn clean_control_chars(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| match c {
            '\0' => None,
            '\r' | '\n' | '\t' => Some(c),
            c if (c as u32) < 0x20 => Some(' '),
            c => Some(c),
        })
        .collect()
}

pub struct Capped {
    pub value: String,
    pub truncated: bool,
}

/// Truncates `input` to at most `cap` bytes, preferring to break on a word
/// boundary (whitespace) rather than mid-word, and appends a truncation
/// sentinel. Byte-safe with respect to UTF-8 char boundaries.
pub fn cap_plain_text(input: &str, cap: usize) -> Capped {
    if input.len() <= cap {
        return Capped {
            value: input.to_string(),
            truncated: false,
        };
    }

    let mut end = cap;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    // Prefer to cut at the last whitespace within the window so we don't
    // sever a word mid-token.
    if let Some(ws) = input[..end].rfind(char::is_whitespace) {
        if ws > 0 {
            end = ws;
        }
    }

    let mut value = input[..end].to_string();
    value.push_str("\n[content truncated]");
    Capped {
        value,
        truncated: true,
    }
}

/// Truncates HTML at the last complete tag boundary at or before `cap`,
/// which guarantees an `<img src="cid:...">` reference is never split in
/// two: we only ever cut immediately after a closing `>`. Closes the
/// `<body>`/`<html>` tags and appends a visible truncation notice.
pub fn cap_html(input: &str, cap: usize) -> Capped {
    if input.len() <= cap {
        return Capped {
            value: input.to_string(),
            truncated: false,
        };
    }

    let window = &input[..cap.min(input.len())];
    let cut = window.rfind('>').map(|i| i + 1).unwrap_or(0);
    let mut value = input[..cut].to_string();
    value.push_str("\n<div>[content truncated]</div>");

    let lower = value.to_ascii_lowercase();
    if !lower.contains("</body>") {
        value.push_str("</body>");
    }
    if !lower.contains("</html>") {
        value.push_str("</html>");
    }

    Capped {
        value,
        truncated: true,
    }
}

/// Strips tags from an HTML fragment to derive a plain-text rendition when
/// no text/plain part is present. Not a full HTML renderer: collapses tags
/// to nothing and decodes the handful of named entities mail bodies rely on.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if in_tag => {}
            c => out.push(c),
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_nul_and_replaces_control_chars() {
        let input = "hi\0there\x01world\r\nok\t.";
        let cleaned = clean_control_chars(input);
        assert_eq!(cleaned, "hi there world\r\nok\t.");
    }

    #[test]
    fn caps_plain_text_on_word_boundary() {
        let input = "the quick brown fox jumps over the lazy dog";
        let capped = cap_plain_text(input, 14);
        assert!(capped.truncated);
        assert!(capped.value.starts_with("the quick"));
        assert!(capped.value.ends_with("[content truncated]"));
    }

    #[test]
    fn caps_html_without_splitting_img_tag() {
        let html = format!(
            "<html><body><p>hello</p><img src=\"cid:{}\"></body></html>",
            "x".repeat(50)
        );
        let capped = cap_html(&html, 30);
        assert!(capped.truncated);
        // either the whole <img> tag is present, or it was cut before it entirely
        let has_full_img_open = !capped.value.contains("<img") || capped.value.contains("\">");
        assert!(has_full_img_open);
        assert!(capped.value.to_ascii_lowercase().contains("</html>"));
    }

    #[test]
    fn no_truncation_under_cap() {
        let capped = cap_plain_text("short", 500);
        assert!(!capped.truncated);
        assert_eq!(capped.value, "short");
    }
}
