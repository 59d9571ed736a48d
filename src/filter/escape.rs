use crate::error::{QueryError, Result};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static XML_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9._-]*$").expect("valid xml name regex"));

/// Escape text for use inside a double-quoted attribute value.
///
/// Characters XML 1.0 cannot carry at all are rejected rather than dropped.
pub fn escape_attribute<'a>(value: &'a str, context: &str) -> Result<Cow<'a, str>> {
    if !value.chars().any(needs_escape) {
        return Ok(Cow::Borrowed(value));
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c if is_forbidden(c) => {
                return Err(QueryError::encoding(
                    context,
                    format!("character U+{:04X} is not allowed in XML", c as u32),
                ));
            }
            c => out.push(c),
        }
    }
    Ok(Cow::Owned(out))
}

/// Check that `name` can be used as an unprefixed XML element name.
pub fn check_xml_name(name: &str, context: &str) -> Result<()> {
    if XML_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(QueryError::encoding(
            context,
            format!("'{name}' is not a valid XML name"),
        ))
    }
}

fn needs_escape(c: char) -> bool {
    matches!(c, '&' | '<' | '>' | '"' | '\'') || (c as u32) < 0x20 || is_forbidden(c)
}

fn is_forbidden(c: char) -> bool {
    let code = c as u32;
    (code < 0x20 && !matches!(c, '\t' | '\n' | '\r')) || code == 0xFFFE || code == 0xFFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(
            escape_attribute("Apple Inc", "label").unwrap(),
            Cow::Borrowed("Apple Inc")
        ));
    }

    #[test]
    fn test_markup_characters_are_escaped() {
        assert_eq!(
            escape_attribute(r#"AT&T <"Ma" 'Bell'>"#, "label").unwrap(),
            "AT&amp;T &lt;&quot;Ma&quot; &apos;Bell&apos;&gt;"
        );
        assert_eq!(escape_attribute("a\tb\n", "label").unwrap(), "a&#9;b&#10;");
    }

    #[test]
    fn test_control_characters_are_rejected() {
        let err = escape_attribute("bad\u{1}", "label of 'x'").unwrap_err();
        assert_eq!(
            err,
            QueryError::EncodingError {
                context: "label of 'x'".to_string(),
                reason: "character U+0001 is not allowed in XML".to_string(),
            }
        );
        assert!(escape_attribute("\u{FFFF}", "label").is_err());
    }

    #[test]
    fn test_xml_names() {
        assert!(check_xml_name("req", "prefix").is_ok());
        assert!(check_xml_name("Expression_2", "root").is_ok());
        assert!(check_xml_name("2bad", "root").is_err());
        assert!(check_xml_name("a:b", "root").is_err());
        assert!(check_xml_name("", "prefix").is_err());
    }
}
