use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::{factory, Error, Json, Number, Result};

/// Parse a JSON value from text.
///
/// The reader accepts RFC 7159 JSON plus two extensions that never appear
/// on output: `/* block */` and `// line` comments between tokens, and
/// numeric literals wider than the native 64-bit types, which are promoted
/// to arbitrary precision. Errors carry the character index at which the
/// problem was found.
///
/// Only the first value is consumed; trailing input is ignored.
pub fn read(input: &str) -> Result<Json> {
    let mut reader = Reader::new(input);
    reader.skip_whitespace()?;
    reader.parse_value()
}

/// Integer literals with at least this many digits are parsed as big
/// integers; shorter ones use `i64`.
const BIG_INT_DIGITS: usize = 20;
/// Floating-point literals with at least this many mantissa digits are
/// parsed as big decimals; shorter ones use `f64`.
const BIG_DEC_DIGITS: usize = 17;

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

impl Reader {
    fn new(input: &str) -> Reader {
        Reader {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, message: &str) -> Result<char> {
        self.bump()
            .ok_or_else(|| Error::syntax(self.pos, format!("unexpected end of input, {message}")))
    }

    /// Skip JSON whitespace plus block and line comments.
    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '/' {
                match self.chars.get(self.pos + 1) {
                    Some('*') => {
                        self.pos += 2;
                        loop {
                            match self.bump() {
                                Some('*') if self.peek() == Some('/') => {
                                    self.pos += 1;
                                    break;
                                }
                                Some(_) => {}
                                None => {
                                    return Err(Error::syntax(
                                        self.pos,
                                        "unterminated block comment",
                                    ))
                                }
                            }
                        }
                    }
                    Some('/') => {
                        self.pos += 2;
                        while let Some(c) = self.peek() {
                            self.pos += 1;
                            if c == '\n' {
                                break;
                            }
                        }
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn parse_value(&mut self) -> Result<Json> {
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some('"') => {
                let s = self.parse_string()?;
                Ok(factory().string(&s))
            }
            Some('t') => self.parse_keyword("true", Json::bool(true)),
            Some('f') => self.parse_keyword("false", Json::bool(false)),
            Some('n') => self.parse_keyword("null", Json::null()),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) => Err(Error::syntax(self.pos, format!("unexpected character `{c}`"))),
            None => Err(Error::syntax(self.pos, "unexpected end of input")),
        }
    }

    fn parse_keyword(&mut self, keyword: &str, value: Json) -> Result<Json> {
        let start = self.pos;
        for expected in keyword.chars() {
            match self.bump() {
                Some(c) if c == expected => {}
                _ => {
                    return Err(Error::syntax(
                        start,
                        format!("invalid token: expected `{keyword}` keyword"),
                    ))
                }
            }
        }
        Ok(value)
    }

    fn parse_object(&mut self) -> Result<Json> {
        self.pos += 1; // consume `{`
        let object = factory().object();
        self.skip_whitespace()?;
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(object);
        }
        loop {
            self.skip_whitespace()?;
            if self.peek() != Some('"') {
                return Err(Error::syntax(
                    self.pos,
                    "missing object key (don't forget to put quotes!)",
                ));
            }
            let key = self.parse_string()?;
            self.skip_whitespace()?;
            match self.bump() {
                Some(':') => {}
                _ => return Err(Error::syntax(self.pos, "expected `:` after object key")),
            }
            self.skip_whitespace()?;
            let value = self.parse_value()?;
            object.set(key, value)?;
            self.skip_whitespace()?;
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(object),
                _ => {
                    return Err(Error::syntax(
                        self.pos,
                        "expected `,` or `}` in object",
                    ))
                }
            }
        }
    }

    fn parse_array(&mut self) -> Result<Json> {
        self.pos += 1; // consume `[`
        let array = factory().array();
        self.skip_whitespace()?;
        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(array);
        }
        loop {
            self.skip_whitespace()?;
            let value = self.parse_value()?;
            array.push(value)?;
            self.skip_whitespace()?;
            match self.bump() {
                Some(',') => {}
                Some(']') => return Ok(array),
                _ => {
                    return Err(Error::syntax(
                        self.pos,
                        "expected `,` or `]` in array",
                    ))
                }
            }
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        self.pos += 1; // consume opening quote
        let mut buf = String::new();
        loop {
            match self.expect("inside string literal")? {
                '"' => return Ok(buf),
                '\\' => match self.expect("after escape character")? {
                    '"' => buf.push('"'),
                    '\\' => buf.push('\\'),
                    '/' => buf.push('/'),
                    'b' => buf.push('\u{8}'),
                    'f' => buf.push('\u{c}'),
                    'n' => buf.push('\n'),
                    'r' => buf.push('\r'),
                    't' => buf.push('\t'),
                    'u' => {
                        let unit = self.parse_hex_unit()?;
                        buf.push(self.combine_surrogates(unit)?);
                    }
                    // Unrecognized escapes are dropped.
                    _ => {}
                },
                c => buf.push(c),
            }
        }
    }

    fn parse_hex_unit(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..4 {
            let index = self.pos;
            let c = self.expect("inside unicode escape")?;
            let digit = c
                .to_digit(16)
                .ok_or_else(|| Error::syntax(index, "invalid hex digit in unicode escape"))?;
            value = (value << 4) | digit;
        }
        Ok(value)
    }

    /// Reconstitute a surrogate pair written as two consecutive `\uXXXX`
    /// escapes into a single code point. A lone surrogate is an error.
    fn combine_surrogates(&mut self, unit: u32) -> Result<char> {
        match unit {
            0xD800..=0xDBFF => {
                let start = self.pos;
                if self.peek() == Some('\\') && self.chars.get(self.pos + 1) == Some(&'u') {
                    self.pos += 2;
                    let low = self.parse_hex_unit()?;
                    if (0xDC00..=0xDFFF).contains(&low) {
                        let code =
                            0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                        return char::from_u32(code).ok_or_else(|| {
                            Error::syntax(start, "invalid surrogate pair")
                        });
                    }
                }
                Err(Error::syntax(start, "unpaired high surrogate in string"))
            }
            0xDC00..=0xDFFF => Err(Error::syntax(
                self.pos,
                "unpaired low surrogate in string",
            )),
            _ => char::from_u32(unit)
                .ok_or_else(|| Error::syntax(self.pos, "invalid unicode escape")),
        }
    }

    fn parse_number(&mut self) -> Result<Json> {
        let start = self.pos;
        let mut buf = String::new();
        let mut digits = 0usize;
        let mut floating = false;

        if self.peek() == Some('-') {
            buf.push('-');
            self.pos += 1;
        }
        digits += self.push_digits(&mut buf);
        if digits == 0 {
            return Err(Error::syntax(start, "malformed number literal"));
        }
        if self.peek() == Some('.') {
            buf.push('.');
            self.pos += 1;
            digits += self.push_digits(&mut buf);
            floating = true;
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            buf.push('e');
            self.pos += 1;
            if matches!(self.peek(), Some('+') | Some('-')) {
                buf.push(self.chars[self.pos]);
                self.pos += 1;
            }
            self.push_digits(&mut buf);
            floating = true;
        }

        let number = if floating {
            if digits < BIG_DEC_DIGITS {
                let value: f64 = buf
                    .parse()
                    .map_err(|_| Error::syntax(start, "malformed number literal"))?;
                Number::Float(value)
            } else {
                let value = BigDecimal::from_str(&buf)
                    .map_err(|_| Error::syntax(start, "malformed number literal"))?;
                Number::BigDec(value)
            }
        } else if digits < BIG_INT_DIGITS {
            // A 19-digit literal can still overflow i64; promote it too.
            match buf.parse::<i64>() {
                Ok(value) => Number::Int(value),
                Err(_) => Number::BigInt(
                    BigInt::from_str(&buf)
                        .map_err(|_| Error::syntax(start, "malformed number literal"))?,
                ),
            }
        } else {
            Number::BigInt(
                BigInt::from_str(&buf)
                    .map_err(|_| Error::syntax(start, "malformed number literal"))?,
            )
        };
        Ok(factory().number(number))
    }

    /// Append consecutive ASCII digits to `buf`, returning how many were
    /// consumed. Mantissa digit counts select the numeric representation.
    fn push_digits(&mut self, buf: &mut String) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                buf.push(c);
                self.pos += 1;
                count += 1;
            } else {
                break;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test]
    fn parses_all_kinds() {
        let doc = read(r#"{"a": [1, -2.5, "s", true, false, null], "b": {}}"#).unwrap();
        assert_eq!(
            doc,
            Json::make(json!({"a": [1, -2.5, "s", true, false, null], "b": {}}))
        );
    }

    #[test_case("/* before */ {\"a\": /* mid */ 1} // after"; "block and line comments")]
    #[test_case("// leading\n{\"a\": 1}"; "leading line comment")]
    #[test_case("{\"a\"\n\t: 1}"; "plain whitespace")]
    fn comments_are_whitespace(input: &str) {
        assert_eq!(read(input).unwrap(), Json::make(json!({"a": 1})));
    }

    #[test]
    fn unterminated_block_comment_fails() {
        assert!(matches!(
            read("/* no end"),
            Err(Error::Syntax { .. })
        ));
    }

    #[test_case("truth"; "broken true")]
    #[test_case("fals"; "broken false")]
    #[test_case("nul"; "broken null")]
    #[test_case("True"; "case sensitive")]
    fn keywords_are_exact(input: &str) {
        assert!(read(input).is_err());
    }

    #[test]
    fn missing_key_quote_has_specific_error() {
        let err = read("{a: 1}").unwrap_err();
        assert!(err.to_string().contains("quotes"), "{err}");
    }

    #[test]
    fn errors_carry_character_index() {
        match read("[1, @]") {
            Err(Error::Syntax { index, .. }) => assert_eq!(index, 4),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn string_escapes() {
        let doc = read(r#""\"\\\/\b\f\n\r\tA""#).unwrap();
        assert_eq!(doc.as_str().unwrap(), "\"\\/\u{8}\u{c}\n\r\tA");
    }

    #[test]
    fn surrogate_pair_becomes_one_code_point() {
        let doc = read("\"\\uD83D\\uDE00\"").unwrap();
        assert_eq!(doc.as_str().unwrap(), "\u{1F600}");
    }

    #[test_case(r#""\uD83D""#; "lone high surrogate")]
    #[test_case(r#""\uDE00""#; "lone low surrogate")]
    fn unpaired_surrogates_fail(input: &str) {
        assert!(read(input).is_err());
    }

    #[test]
    fn integer_tiers() {
        assert!(matches!(
            read("123").unwrap().as_number(),
            Some(Number::Int(123))
        ));
        // 19 digits within range: still native.
        assert!(matches!(
            read("1234567890123456789").unwrap().as_number(),
            Some(Number::Int(_))
        ));
        // 20 digits: big integer, digits preserved.
        let big = read("12345678901234567890").unwrap();
        assert!(matches!(big.as_number(), Some(Number::BigInt(_))));
        assert_eq!(big.as_number().unwrap().to_text(), "12345678901234567890");
    }

    #[test]
    fn float_tiers() {
        assert!(matches!(
            read("1.5").unwrap().as_number(),
            Some(Number::Float(_))
        ));
        let wide = read("3.14159265358979323846").unwrap();
        assert!(matches!(wide.as_number(), Some(Number::BigDec(_))));
        assert_eq!(
            wide.as_number().unwrap().to_text(),
            "3.14159265358979323846"
        );
    }

    #[test]
    fn exponents_parse_as_floats() {
        assert_eq!(read("1e3").unwrap(), Json::number(1000.0));
        assert_eq!(read("-2E-2").unwrap(), Json::number(-0.02));
    }

    #[test]
    fn round_trip_preserves_structure() {
        let inputs = [
            r#"{"a": [1, 2.5, "x"], "b": null}"#,
            r#"[[], {}, [""]]"#,
            r#""plain""#,
            "12345678901234567890123",
        ];
        for input in inputs {
            let first = read(input).unwrap();
            let second = read(&first.to_string()).unwrap();
            assert_eq!(first, second, "{input}");
        }
    }
}
