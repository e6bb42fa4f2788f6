// Character escapes for the bookmark format: the five named ones, plus
// numeric references for whitespace that would otherwise be trimmed

const ESCAPES: [(char, &str); 5] = [
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('"', "&quot;"),
    ('\'', "&#39;"),
];

/// Escape `& < > " '` for markup text and attribute values
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match ESCAPES.iter().find(|(raw, _)| *raw == c) {
            Some((_, escaped)) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    out
}

/// Like [`escape`], but leading and trailing whitespace is written as
/// numeric references so a reader that trims the text gets it back intact
pub fn escape_text(s: &str) -> String {
    let body = s.trim();
    if body.is_empty() {
        return s.chars().map(numeric_ref).collect();
    }

    let start = s.len() - s.trim_start().len();
    let end = start + body.len();

    let mut out: String = s[..start].chars().map(numeric_ref).collect();
    out.push_str(&escape(body));
    out.extend(s[end..].chars().map(numeric_ref));
    out
}

fn numeric_ref(c: char) -> String {
    format!("&#{};", c as u32)
}

/// Undo [`escape`] and [`escape_text`]
///
/// Works in a single left-to-right pass so `&amp;lt;` decodes to `&lt;`
/// rather than `<`. Decimal and hex numeric references are decoded too.
/// Unknown entities are left alone.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some((raw, escaped)) = ESCAPES
            .iter()
            .find(|(_, escaped)| rest.starts_with(escaped))
        {
            out.push(*raw);
            rest = &rest[escaped.len()..];
        } else if let Some((c, len)) = numeric_reference(rest) {
            out.push(c);
            rest = &rest[len..];
        } else {
            out.push('&');
            rest = &rest[1..];
        }
    }

    out.push_str(rest);
    out
}

/// Decode `&#NN;` or `&#xHH;` at the start of `s`, returning the char and
/// how many bytes it used
fn numeric_reference(s: &str) -> Option<(char, usize)> {
    let body = s.strip_prefix("&#")?;
    let end = body.find(';')?;
    let digits = &body[..end];

    let code = match digits.strip_prefix(|c: char| c == 'x' || c == 'X') {
        Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            u32::from_str_radix(hex, 16).ok()?
        }
        None if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            digits.parse().ok()?
        }
        _ => return None,
    };

    Some((char::from_u32(code)?, 2 + end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_five() {
        assert_eq!(escape(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;");
    }

    #[test]
    fn test_unescape_all_five() {
        assert_eq!(unescape("&amp; &lt; &gt; &quot; &#39;"), "& < > \" '");
    }

    #[test]
    fn test_unescape_is_single_pass() {
        assert_eq!(unescape("&amp;lt;"), "&lt;");
        assert_eq!(unescape(&escape("&lt;")), "&lt;");
    }

    #[test]
    fn test_unknown_entities_pass_through() {
        assert_eq!(unescape("a &nbsp; b & c"), "a &nbsp; b & c");
        assert_eq!(unescape("trailing &"), "trailing &");
    }

    #[test]
    fn test_numeric_references_decode() {
        assert_eq!(unescape("a&#32;b&#x41;&#X42;"), "a bAB");
        assert_eq!(unescape("&#;&#x;&#12a;&#1114112;"), "&#;&#x;&#12a;&#1114112;");
    }

    #[test]
    fn test_escape_text_protects_edge_whitespace() {
        let escaped = escape_text("  padded & <b>\n");
        assert_eq!(escaped, "&#32;&#32;padded &amp; &lt;b&gt;&#10;");
        assert_eq!(unescape(escaped.trim()), "  padded & <b>\n");

        assert_eq!(escape_text(" "), "&#32;");
        assert_eq!(escape_text("inner\nline"), "inner\nline");
        assert_eq!(escape_text(""), "");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(escape("plain text"), "plain text");
        assert_eq!(unescape("plain text"), "plain text");
    }
}
