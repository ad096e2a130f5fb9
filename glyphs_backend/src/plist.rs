//! OpenStep property lists, in the dialect Glyphs reads and writes.
//!
//! Parsing and writing are symmetric: a file that is parsed and written again
//! without edits comes out byte-for-byte identical, provided the writer is
//! given the same [`TuplePaths`] the file was written with.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum Plist {
    Dictionary(BTreeMap<String, Plist>),
    Array(Vec<Plist>),
    String(String),
    Integer(i64),
    Float(f64),
    Data(Vec<u8>),
}

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("unexpected end of input")]
    Eof,
    #[error("unexpected character {ch:?} on line {line}")]
    UnexpectedChar { ch: char, line: usize },
    #[error("unterminated string starting on line {0}")]
    UnterminatedString(usize),
    #[error("invalid escape sequence on line {0}")]
    BadEscape(usize),
    #[error("dictionary key must be a string on line {0}")]
    NotAKey(usize),
    #[error("invalid data literal on line {0}")]
    BadData(usize),
    #[error("unexpected content after the root object on line {0}")]
    TrailingContent(usize),
    #[error("arrays or dictionaries nested too deeply on line {0}")]
    TooDeep(usize),
}

/// Arrays and dictionaries nested past this are rejected.
const MAX_DEPTH: usize = 512;

impl Plist {
    pub fn parse(source: &str) -> Result<Plist, Error> {
        let mut parser = Parser {
            src: source,
            pos: 0,
            depth: 0,
        };
        let value = parser.parse_value()?;
        parser.skip_whitespace()?;
        if parser.pos < source.len() {
            return Err(Error::TrailingContent(parser.line()));
        }
        Ok(value)
    }

    pub fn get(&self, key: &str) -> Option<&Plist> {
        match self {
            Plist::Dictionary(dict) => dict.get(key),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Plist> {
        match self {
            Plist::Dictionary(dict) => dict.get_mut(key),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, Plist>> {
        match self {
            Plist::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut BTreeMap<String, Plist>> {
        match self {
            Plist::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Plist]> {
        match self {
            Plist::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Plist::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Plist::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats; Glyphs writes integral coordinates without
    /// a decimal point.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Plist::Integer(i) => Some(*i as f64),
            Plist::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn into_dictionary(self) -> Option<BTreeMap<String, Plist>> {
        match self {
            Plist::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Plist>> {
        match self {
            Plist::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Serialise the way Glyphs writes files: one entry per line, arrays at
    /// `tuples` on a single line, and a trailing newline.
    pub fn to_glyphs_string(&self, tuples: &TuplePaths) -> String {
        let mut out = String::new();
        write_value(&mut out, self, Some(tuples));
        out.push('\n');
        out
    }
}

impl fmt::Display for Plist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_value(&mut out, self, None);
        f.write_str(&out)
    }
}

impl From<String> for Plist {
    fn from(s: String) -> Plist {
        Plist::String(s)
    }
}

impl From<&str> for Plist {
    fn from(s: &str) -> Plist {
        Plist::String(s.to_string())
    }
}

impl From<i64> for Plist {
    fn from(i: i64) -> Plist {
        Plist::Integer(i)
    }
}

impl From<u8> for Plist {
    fn from(i: u8) -> Plist {
        Plist::Integer(i.into())
    }
}

impl From<f64> for Plist {
    fn from(f: f64) -> Plist {
        Plist::Float(f)
    }
}

impl From<Vec<Plist>> for Plist {
    fn from(array: Vec<Plist>) -> Plist {
        Plist::Array(array)
    }
}

impl From<BTreeMap<String, Plist>> for Plist {
    fn from(dict: BTreeMap<String, Plist>) -> Plist {
        Plist::Dictionary(dict)
    }
}

/// Key paths whose arrays are written as single-line tuples, e.g.
/// `(354,183,l)` for nodes. `*` matches any dictionary key or array index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TuplePaths {
    keys: BTreeMap<String, TuplePaths>,
    any: Option<Box<TuplePaths>>,
    is_tuple: bool,
}

impl TuplePaths {
    pub fn new<'a, P>(patterns: impl IntoIterator<Item = P>) -> Self
    where
        P: AsRef<[&'a str]>,
    {
        let mut root = TuplePaths::default();
        for pattern in patterns {
            let mut node = &mut root;
            for segment in pattern.as_ref() {
                node = if *segment == "*" {
                    node.any.get_or_insert_with(Default::default)
                } else {
                    node.keys.entry(segment.to_string()).or_default()
                };
            }
            node.is_tuple = true;
        }
        root
    }

    /// The paths below `path`, for writing a fragment of a bigger document
    /// on its own (a `.glyph` file inside a package, say).
    pub fn subtree(&self, path: &[&str]) -> TuplePaths {
        let mut node = Some(self);
        for segment in path {
            node = node.and_then(|n| n.child(Some(segment)));
        }
        node.cloned().unwrap_or_default()
    }

    fn child(&self, key: Option<&str>) -> Option<&TuplePaths> {
        key.and_then(|key| self.keys.get(key))
            .or(self.any.as_deref())
    }
}

fn write_value(out: &mut String, value: &Plist, paths: Option<&TuplePaths>) {
    match value {
        Plist::Dictionary(dict) => {
            out.push_str("{\n");
            for (key, value) in dict {
                out.push_str(&quote_if_needed(key));
                out.push_str(" = ");
                write_value(out, value, paths.and_then(|p| p.child(Some(key))));
                out.push_str(";\n");
            }
            out.push('}');
        }
        Plist::Array(array) => {
            let item_paths = paths.and_then(|p| p.child(None));
            if paths.is_some_and(|p| p.is_tuple) {
                out.push('(');
                for (i, item) in array.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_value(out, item, item_paths);
                }
                out.push(')');
            } else {
                out.push_str("(\n");
                for (i, item) in array.iter().enumerate() {
                    if i > 0 {
                        out.push_str(",\n");
                    }
                    write_value(out, item, item_paths);
                }
                if !array.is_empty() {
                    out.push('\n');
                }
                out.push(')');
            }
        }
        Plist::String(s) => out.push_str(&quote_if_needed(s)),
        Plist::Integer(i) => {
            let _ = write!(out, "{i}");
        }
        // Integral floats come out as integers, as Glyphs writes them, and
        // read back through `as_f64` unchanged. Non-finite values have no
        // plist spelling and never come out of the parser.
        Plist::Float(f) => {
            let _ = write!(out, "{f}");
        }
        Plist::Data(data) => {
            out.push('<');
            out.push_str(&hex::encode_upper(data));
            out.push('>');
        }
    }
}

fn is_unquoted_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '+' | '/' | ':' | '.' | '-')
}

fn quote_if_needed(s: &str) -> Cow<'_, str> {
    let needs_quotes = s.is_empty()
        || !s.chars().all(is_unquoted_char)
        || !matches!(classify_token(s), Plist::String(_));
    if !needs_quotes {
        return Cow::Borrowed(s);
    }
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    Cow::Owned(quoted)
}

/// Interpret an unquoted token. Integers with a leading zero (`0041`, the
/// Glyphs 2 code point notation) stay strings so they survive a round trip.
fn classify_token(token: &str) -> Plist {
    let digits = token.strip_prefix('-').unwrap_or(token);
    let bytes = digits.as_bytes();
    if bytes.is_empty() {
        return Plist::String(token.to_string());
    }

    if bytes.iter().all(u8::is_ascii_digit) {
        if bytes.len() > 1 && bytes[0] == b'0' {
            return Plist::String(token.to_string());
        }
        return match token.parse::<i64>() {
            Ok(i) => Plist::Integer(i),
            Err(_) => Plist::String(token.to_string()),
        };
    }

    if looks_like_float(digits) {
        if let Ok(f) = token.parse::<f64>() {
            return Plist::Float(f);
        }
    }
    Plist::String(token.to_string())
}

// Decimal notation only: exponent forms such as `1E00` are hex code points
// in Glyphs 2 files and must stay strings.
fn looks_like_float(digits: &str) -> bool {
    let Some((int_part, frac_part)) = digits.split_once('.') else {
        return false;
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return false;
    }
    if int_part.len() > 1 && int_part.starts_with('0') {
        return false;
    }
    !(int_part.is_empty() && frac_part.is_empty())
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn line(&self) -> usize {
        self.src[..self.pos].matches('\n').count() + 1
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), Error> {
        self.skip_whitespace()?;
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(ch) => Err(Error::UnexpectedChar {
                ch,
                line: self.line(),
            }),
            None => Err(Error::Eof),
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), Error> {
        loop {
            let rest = &self.src[self.pos..];
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("//") {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if trimmed.starts_with("/*") {
                let end = trimmed[2..].find("*/").ok_or(Error::Eof)?;
                self.pos += end + 4;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_value(&mut self) -> Result<Plist, Error> {
        self.skip_whitespace()?;
        match self.peek() {
            None => Err(Error::Eof),
            Some('{') => self.nested(Self::parse_dict),
            Some('(') => self.nested(Self::parse_array),
            Some('"') => self.parse_quoted().map(Plist::String),
            Some('<') => self.parse_data(),
            Some(c) if is_unquoted_char(c) => Ok(classify_token(self.parse_unquoted())),
            Some(ch) => Err(Error::UnexpectedChar {
                ch,
                line: self.line(),
            }),
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> Result<Plist, Error>) -> Result<Plist, Error> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::TooDeep(self.line()));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn parse_dict(&mut self) -> Result<Plist, Error> {
        self.expect('{')?;
        let mut dict = BTreeMap::new();
        loop {
            self.skip_whitespace()?;
            match self.peek() {
                None => return Err(Error::Eof),
                Some('}') => {
                    self.bump();
                    return Ok(Plist::Dictionary(dict));
                }
                Some(_) => {}
            }
            let key = self.parse_key()?;
            self.expect('=')?;
            let value = self.parse_value()?;
            dict.insert(key, value);
            self.skip_whitespace()?;
            match self.peek() {
                Some(';') => {
                    self.bump();
                }
                Some('}') => {}
                Some(ch) => {
                    return Err(Error::UnexpectedChar {
                        ch,
                        line: self.line(),
                    })
                }
                None => return Err(Error::Eof),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String, Error> {
        match self.peek() {
            Some('"') => self.parse_quoted(),
            Some(c) if is_unquoted_char(c) => Ok(self.parse_unquoted().to_string()),
            _ => Err(Error::NotAKey(self.line())),
        }
    }

    fn parse_array(&mut self) -> Result<Plist, Error> {
        self.expect('(')?;
        let mut array = Vec::new();
        loop {
            self.skip_whitespace()?;
            match self.peek() {
                None => return Err(Error::Eof),
                Some(')') => {
                    self.bump();
                    return Ok(Plist::Array(array));
                }
                Some(_) => {}
            }
            array.push(self.parse_value()?);
            self.skip_whitespace()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => {}
                Some(ch) => {
                    return Err(Error::UnexpectedChar {
                        ch,
                        line: self.line(),
                    })
                }
                None => return Err(Error::Eof),
            }
        }
    }

    fn parse_unquoted(&mut self) -> &str {
        let start = self.pos;
        while self.peek().is_some_and(is_unquoted_char) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn parse_quoted(&mut self) -> Result<String, Error> {
        let start_line = self.line();
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(Error::UnterminatedString(start_line)),
                Some('"') => return Ok(s),
                Some('\\') => self.parse_escape(&mut s)?,
                Some(c) => s.push(c),
            }
        }
    }

    fn parse_escape(&mut self, s: &mut String) -> Result<(), Error> {
        let c = self.bump().ok_or(Error::BadEscape(self.line()))?;
        match c {
            'n' => s.push('\n'),
            't' => s.push('\t'),
            'r' => s.push('\r'),
            'a' => s.push('\u{07}'),
            'b' => s.push('\u{08}'),
            'f' => s.push('\u{0C}'),
            'v' => s.push('\u{0B}'),
            'U' | 'u' => {
                let mut code = self.parse_hex4()?;
                let rest = &self.src[self.pos..];
                if (0xD800..0xDC00).contains(&code)
                    && (rest.starts_with("\\U") || rest.starts_with("\\u"))
                {
                    let saved = self.pos;
                    self.pos += 2;
                    let low = self.parse_hex4()?;
                    if (0xDC00..0xE000).contains(&low) {
                        code = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                    } else {
                        self.pos = saved;
                    }
                }
                s.push(char::from_u32(code).ok_or(Error::BadEscape(self.line()))?);
            }
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or_default();
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            self.bump();
                        }
                        None => break,
                    }
                }
                s.push(char::from_u32(code).ok_or(Error::BadEscape(self.line()))?);
            }
            other => s.push(other),
        }
        Ok(())
    }

    fn parse_hex4(&mut self) -> Result<u32, Error> {
        let digits = self
            .src
            .get(self.pos..self.pos + 4)
            .ok_or(Error::BadEscape(self.line()))?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| Error::BadEscape(self.line()))?;
        self.pos += 4;
        Ok(code)
    }

    fn parse_data(&mut self) -> Result<Plist, Error> {
        let line = self.line();
        self.bump();
        let end = self.src[self.pos..].find('>').ok_or(Error::BadData(line))?;
        let digits: String = self.src[self.pos..self.pos + end]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        self.pos += end + 1;
        hex::decode(digits)
            .map(Plist::Data)
            .map_err(|_| Error::BadData(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_scalars() {
        assert_eq!(Plist::parse("42").unwrap(), Plist::Integer(42));
        assert_eq!(Plist::parse("-42").unwrap(), Plist::Integer(-42));
        assert_eq!(Plist::parse("0.5").unwrap(), Plist::Float(0.5));
        assert_eq!(Plist::parse("-.5").unwrap(), Plist::Float(-0.5));
        assert_eq!(Plist::parse("\"42\"").unwrap(), Plist::String("42".into()));
        assert_eq!(Plist::parse("a.sc").unwrap(), Plist::String("a.sc".into()));
        assert_eq!(Plist::parse("0041").unwrap(), Plist::String("0041".into()));
        assert_eq!(Plist::parse("1E00").unwrap(), Plist::String("1E00".into()));
        assert_eq!(
            Plist::parse("infinity").unwrap(),
            Plist::String("infinity".into())
        );
        assert_eq!(Plist::parse("<0A ff>").unwrap(), Plist::Data(vec![10, 255]));
    }

    #[test]
    fn parse_escapes() {
        let plist = Plist::parse(r#""a\"b\\c\n\012\U00e9""#).unwrap();
        assert_eq!(plist, Plist::String("a\"b\\c\n\né".into()));
    }

    #[test]
    fn parse_nested() {
        let plist = Plist::parse("{a = (1,2,l); b = {c = \"x y\";}; // comment\n}").unwrap();
        let a = plist.get("a").unwrap().as_array().unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(a[2].as_str(), Some("l"));
        assert_eq!(
            plist.get("b").and_then(|b| b.get("c")).and_then(Plist::as_str),
            Some("x y")
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Plist::parse("{a = 1;"), Err(Error::Eof));
        assert_eq!(Plist::parse("\"abc"), Err(Error::UnterminatedString(1)));
        assert!(matches!(
            Plist::parse("{a = 1;}\n}"),
            Err(Error::TrailingContent(2))
        ));
        assert!(matches!(
            Plist::parse("{a = 1 b = 2;}"),
            Err(Error::UnexpectedChar { ch: 'b', .. })
        ));
    }

    #[test]
    fn integral_floats_write_as_integers() {
        let plist = Plist::parse("{a = 5.0; b = 0.25;}").unwrap();
        let written = plist.to_glyphs_string(&TuplePaths::default());
        assert_eq!(written, "{\na = 5;\nb = 0.25;\n}\n");
        let reread = Plist::parse(&written).unwrap();
        assert_eq!(reread.get("a"), Some(&Plist::Integer(5)));
        assert_eq!(reread.get("a").and_then(Plist::as_f64), Some(5.0));
        assert_eq!(reread.get("b"), Some(&Plist::Float(0.25)));
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let source = format!("{{x = {}", "(".repeat(5000));
        assert_eq!(Plist::parse(&source), Err(Error::TooDeep(1)));

        let ok = format!("{}{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(Plist::parse(&ok).is_ok());
        let too_deep = format!("({ok})");
        assert_eq!(Plist::parse(&too_deep), Err(Error::TooDeep(1)));
    }

    #[test]
    fn writes_glyphs_dialect() {
        let source = "{\n.appVersion = \"3151\";\nglyphs = (\n{\nglyphname = A;\nlayers = (\n{\nshapes = (\n{\nclosed = 1;\nnodes = (\n(10,0,l),\n(20.5,700,o)\n);\n}\n);\nwidth = 600;\n}\n);\nnote = \"two words\";\nunicode = 0041;\n}\n);\nuserData = {\n};\n}\n";
        let plist = Plist::parse(source).unwrap();
        let tuples = TuplePaths::new([["glyphs", "*", "layers", "*", "shapes", "*", "nodes", "*"]]);
        assert_eq!(plist.to_glyphs_string(&tuples), source);
    }

    #[test]
    fn subtree_drops_prefix() {
        let tuples = TuplePaths::new([["glyphs", "*", "color"]]);
        let glyph = Plist::parse("{color = (1,2,3,4);}").unwrap();
        assert_eq!(
            glyph.to_glyphs_string(&tuples.subtree(&["glyphs", "*"])),
            "{\ncolor = (1,2,3,4);\n}\n"
        );
    }

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(quote_if_needed("Regular"), "Regular");
        assert_eq!(quote_if_needed("@MMK_L_A"), "\"@MMK_L_A\"");
        assert_eq!(quote_if_needed("1.5"), "\"1.5\"");
        assert_eq!(quote_if_needed(""), "\"\"");
        assert_eq!(quote_if_needed("say \"hi\""), "\"say \\\"hi\\\"\"");
    }
}
