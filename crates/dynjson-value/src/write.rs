use std::fmt;

use crate::value::Repr;
use crate::Json;

/// Compact serialization, no insignificant whitespace.
///
/// Rendering an expanded schema graph that contains reference cycles does
/// not terminate; use [`Json::preview`] for such values.
impl fmt::Display for Json {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr() {
            Repr::Null => f.write_str("null"),
            Repr::Bool(true) => f.write_str("true"),
            Repr::Bool(false) => f.write_str("false"),
            Repr::Number(n) => write!(f, "{n}"),
            Repr::String(s) => {
                f.write_str("\"")?;
                let mut escaped = String::new();
                escape_into(s, &mut escaped);
                f.write_str(&escaped)?;
                f.write_str("\"")
            }
            Repr::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Repr::Object(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str("\"")?;
                    let mut escaped = String::new();
                    escape_into(key, &mut escaped);
                    f.write_str(&escaped)?;
                    f.write_str("\":")?;
                    write!(f, "{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Json {
    /// Serialize, truncating once the output would exceed `max_chars`.
    ///
    /// Containers stop emitting further elements when the budget runs out
    /// and append `...`; strings truncate to a prefix. Useful for error
    /// messages and previews of large documents, and bounded enough to
    /// terminate on cyclic graphs.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.repr() {
            Repr::String(s) => {
                let mut out = String::from("\"");
                if s.chars().count() <= max_chars {
                    escape_into(s, &mut out);
                    out.push('"');
                } else {
                    let prefix: String = s.chars().take(max_chars).collect();
                    escape_into(&prefix, &mut out);
                    out.push_str("...\"");
                }
                out
            }
            Repr::Array(items) => {
                let mut out = String::from("[");
                let items = items.borrow();
                let mut first = true;
                for item in items.iter() {
                    if out.len() >= max_chars {
                        out.push_str("...");
                        break;
                    }
                    if !first {
                        out.push(',');
                    }
                    first = false;
                    // Children render against the remaining budget; the
                    // budget shrinks with depth, which also bounds
                    // recursion on cyclic graphs.
                    let rendered = item.preview(max_chars.saturating_sub(out.len()));
                    out.push_str(&rendered);
                }
                out.push(']');
                out
            }
            Repr::Object(map) => {
                let mut out = String::from("{");
                let map = map.borrow();
                let mut first = true;
                for (key, value) in map.iter() {
                    if out.len() >= max_chars {
                        out.push_str("...");
                        break;
                    }
                    if !first {
                        out.push(',');
                    }
                    first = false;
                    out.push('"');
                    escape_into(key, &mut out);
                    out.push_str("\":");
                    let rendered = value.preview(max_chars.saturating_sub(out.len()));
                    out.push_str(&rendered);
                }
                out.push('}');
                out
            }
            _ => self.to_string(),
        }
    }
}

/// Escape a string for JSON output.
///
/// Escapes `"`, `\` and `/`, the short control forms, every code point
/// below `0x20`, `U+007F..=U+009F`, and the line/paragraph separators
/// `U+2028`/`U+2029`. Supplementary code points are written as explicit
/// surrogate pairs so the output survives consumers that treat text as
/// UTF-16 code units.
pub(crate) fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            _ => {
                let code = c as u32;
                if code < 0x20 || (0x7F..=0x9F).contains(&code) || code == 0x2028 || code == 0x2029
                {
                    push_hex_escape(out, code);
                } else if code > 0xFFFF {
                    let reduced = code - 0x10000;
                    push_hex_escape(out, 0xD800 + (reduced >> 10));
                    push_hex_escape(out, 0xDC00 + (reduced & 0x3FF));
                } else {
                    out.push(c);
                }
            }
        }
    }
}

fn push_hex_escape(out: &mut String, unit: u32) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    out.push_str("\\u");
    out.push(HEX[(unit as usize >> 12) & 0xF] as char);
    out.push(HEX[(unit as usize >> 8) & 0xF] as char);
    out.push(HEX[(unit as usize >> 4) & 0xF] as char);
    out.push(HEX[unit as usize & 0xF] as char);
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::read;

    #[test_case(json!(null), "null")]
    #[test_case(json!(true), "true")]
    #[test_case(json!(7), "7")]
    #[test_case(json!([1, 2]), "[1,2]")]
    #[test_case(json!("a b"), "\"a b\"")]
    fn compact_output(value: serde_json::Value, expected: &str) {
        assert_eq!(Json::make(value).to_string(), expected);
    }

    #[test]
    fn escapes_mandatory_set() {
        let value = Json::string("a\"b\\c/d\ne\u{2028}f\u{7f}");
        assert_eq!(
            value.to_string(),
            "\"a\\\"b\\\\c\\/d\\ne\\u2028f\\u007f\""
        );
    }

    #[test]
    fn supplementary_code_points_as_surrogates() {
        let value = Json::string("\u{1F600}");
        assert_eq!(value.to_string(), "\"\\ud83d\\ude00\"");
        // And back through the reader.
        assert_eq!(read(&value.to_string()).unwrap(), value);
    }

    #[test]
    fn preview_truncates_with_ellipsis() {
        let long = Json::make(json!({"k": "0123456789012345678901234567890123456789"}));
        let preview = long.preview(20);
        assert!(preview.contains("..."), "{preview}");
        assert!(preview.len() < long.to_string().len());

        let short = Json::make(json!([1, 2]));
        assert_eq!(short.preview(50), "[1,2]");
    }

    #[test]
    fn preview_truncates_long_strings() {
        let value = Json::string("abcdefghij");
        assert_eq!(value.preview(4), "\"abcd...\"");
    }
}
