//! Glyphs feature code <-> a single feature file text.
//!
//! The text has the classes first, then the prefixes, then the features,
//! separated by blank lines. Prefix names and the `automatic`, `disabled` and
//! `notes` flags travel as comments.

use std::collections::BTreeMap;

use crate::classes::OpenTypeFeatures;
use crate::error::BackendError;
use crate::font::{Feature, FeatureClass, FeaturePrefix, Font, FormatVersion};
use crate::plist::Plist;
use crate::to_plist::ToPlist;

const ANONYMOUS_PREFIX: &str = "<anonymous>";
const PREFIX_MARKER: &str = "# Prefix: ";
const AUTOMATIC_MARKER: &str = "# automatic";
const DISABLED_MARKER: &str = "# disabled";
const NOTES_MARKER: &str = "# notes:";

/// The feature code of a font as one text. Empty when the font has none.
pub fn features_to_fea(font: &Font) -> String {
    let automatic = |flag: bool| if flag { "# automatic\n" } else { "" };

    let classes: Vec<String> = font
        .classes
        .iter()
        .map(|class| {
            let at = if class.name.starts_with('@') { "" } else { "@" };
            format!(
                "{}{at}{} = [ {}\n];",
                automatic(class.automatic),
                class.name,
                class.code
            )
        })
        .collect();

    let prefixes: Vec<String> = font
        .feature_prefixes
        .iter()
        .map(|prefix| {
            let mut text = String::new();
            if prefix.name != ANONYMOUS_PREFIX {
                text.push_str(PREFIX_MARKER);
                text.push_str(&prefix.name);
                text.push('\n');
            }
            text.push_str(automatic(prefix.automatic));
            text.push_str(&prefix.code);
            text
        })
        .collect();

    let features: Vec<String> = font
        .features
        .iter()
        .map(|feature| {
            let mut lines = vec![format!("feature {} {{", feature.tag)];
            if !feature.notes.is_empty() {
                lines.push(NOTES_MARKER.to_string());
                lines.extend(feature.notes.lines().map(|line| format!("# {line}")));
            }
            if feature.automatic {
                lines.push(AUTOMATIC_MARKER.to_string());
            }
            if feature.disabled {
                lines.push(DISABLED_MARKER.to_string());
                lines.extend(feature.code.lines().map(|line| format!("#{line}")));
            } else {
                lines.push(feature.code.clone());
            }
            lines.push(format!("}} {};", feature.tag));
            lines.join("\n")
        })
        .collect();

    let sections: Vec<String> = [classes, prefixes, features]
        .into_iter()
        .map(|section| section.join("\n\n"))
        .filter(|section| !section.is_empty())
        .collect();
    let text = sections.join("\n\n") + "\n";
    if text.trim().is_empty() {
        String::new()
    } else {
        text
    }
}

/// Feature code split the way Glyphs stores it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphsFeatures {
    pub classes: Vec<FeatureClass>,
    pub prefixes: Vec<FeaturePrefix>,
    pub features: Vec<Feature>,
}

/// Split a feature file text into classes, prefixes and features.
pub fn parse_fea(text: &str) -> Result<GlyphsFeatures, BackendError> {
    let mut parsed = GlyphsFeatures::default();
    let mut prefix: Option<PendingPrefix> = None;
    let mut automatic = false;

    for chunk in Lexer::new(text).chunks()? {
        let raw = &text[chunk.start..chunk.end];
        match chunk.kind {
            ChunkKind::PrefixMarker(name) => {
                finish_prefix(&mut parsed, prefix.take(), text);
                prefix = Some(PendingPrefix::new(name, automatic));
                automatic = false;
            }
            ChunkKind::Automatic if prefix.as_ref().map_or(true, |p| p.start.is_none()) => {
                match &mut prefix {
                    Some(prefix) => prefix.automatic = true,
                    None => automatic = true,
                }
            }
            ChunkKind::Class => {
                finish_prefix(&mut parsed, prefix.take(), text);
                parsed.classes.push(parse_class(raw, automatic)?);
                automatic = false;
            }
            ChunkKind::Feature => {
                finish_prefix(&mut parsed, prefix.take(), text);
                parsed.features.push(parse_feature(raw)?);
                automatic = false;
            }
            ChunkKind::Automatic | ChunkKind::Other => {
                let prefix = prefix.get_or_insert_with(|| {
                    PendingPrefix::new(ANONYMOUS_PREFIX.to_string(), std::mem::take(&mut automatic))
                });
                prefix.start.get_or_insert(chunk.start);
                prefix.end = chunk.end;
            }
        }
    }
    finish_prefix(&mut parsed, prefix, text);
    Ok(parsed)
}

/// Replace the feature code of a raw font dictionary.
pub fn write_features(
    font: &mut BTreeMap<String, Plist>,
    format: FormatVersion,
    features: &OpenTypeFeatures,
) -> Result<(), BackendError> {
    if features.language != "fea" {
        return Err(BackendError::NotImplemented(
            "writing features in a language other than fea",
        ));
    }
    let parsed = parse_fea(&features.text)?;

    let mut set = |key: &str, items: Vec<Plist>| {
        if items.is_empty() {
            font.remove(key);
        } else {
            font.insert(key.to_string(), Plist::Array(items));
        }
    };
    set(
        "classes",
        parsed.classes.into_iter().map(ToPlist::to_plist).collect(),
    );
    set(
        "featurePrefixes",
        parsed.prefixes.into_iter().map(ToPlist::to_plist).collect(),
    );
    set(
        "features",
        parsed
            .features
            .into_iter()
            .map(|feature| {
                let mut plist = feature.to_plist();
                // Glyphs 2 calls the tag the feature's name.
                if format == FormatVersion::V2 {
                    if let Some(dict) = plist.as_dict_mut() {
                        if let Some(tag) = dict.remove("tag") {
                            dict.insert("name".to_string(), tag);
                        }
                    }
                }
                plist
            })
            .collect(),
    );
    Ok(())
}

struct PendingPrefix {
    name: String,
    automatic: bool,
    start: Option<usize>,
    end: usize,
}

impl PendingPrefix {
    fn new(name: String, automatic: bool) -> Self {
        Self {
            name,
            automatic,
            start: None,
            end: 0,
        }
    }
}

fn finish_prefix(parsed: &mut GlyphsFeatures, prefix: Option<PendingPrefix>, text: &str) {
    let Some(prefix) = prefix else {
        return;
    };
    let code = match prefix.start {
        Some(start) => text[start..prefix.end].to_string(),
        None => String::new(),
    };
    parsed.prefixes.push(FeaturePrefix {
        automatic: prefix.automatic,
        code,
        disabled: false,
        name: prefix.name,
        other_stuff: Default::default(),
    });
}

fn parse_class(raw: &str, automatic: bool) -> Result<FeatureClass, BackendError> {
    let bad = || BackendError::Features(format!("bad class definition: {raw}"));
    let (name, rest) = raw.split_once('=').ok_or_else(bad)?;
    let open = rest.find('[').ok_or_else(bad)?;
    let close = rest.rfind(']').ok_or_else(bad)?;
    if close < open {
        return Err(bad());
    }
    Ok(FeatureClass {
        automatic,
        code: rest[open + 1..close].trim().to_string(),
        disabled: false,
        name: name.trim().trim_start_matches('@').to_string(),
        other_stuff: Default::default(),
    })
}

fn parse_feature(raw: &str) -> Result<Feature, BackendError> {
    let bad = || BackendError::Features(format!("bad feature block: {raw}"));
    let open = raw.find('{').ok_or_else(bad)?;
    let close = raw.rfind('}').ok_or_else(bad)?;
    let tag = raw["feature".len()..open].trim();
    let closing_tag = raw[close + 1..].trim().trim_end_matches(';').trim();
    if tag.is_empty() || tag != closing_tag {
        return Err(BackendError::Features(format!(
            "feature '{tag}' is closed as '{closing_tag}'"
        )));
    }

    let body = &raw[open + 1..close];
    let body = body.strip_prefix('\n').unwrap_or(body);
    let body = body.strip_suffix('\n').unwrap_or(body);
    let mut lines = body.split('\n').peekable();

    let mut notes = Vec::new();
    if lines.peek() == Some(&NOTES_MARKER) {
        lines.next();
        while let Some(note) = lines.peek().and_then(|line| line.strip_prefix("# ")) {
            if note == "automatic" || note == "disabled" {
                break;
            }
            notes.push(note);
            lines.next();
        }
    }
    let automatic = lines.next_if_eq(&AUTOMATIC_MARKER).is_some();
    let disabled = lines.next_if_eq(&DISABLED_MARKER).is_some();
    let code: Vec<&str> = if disabled {
        lines.map(|line| line.strip_prefix('#').unwrap_or(line)).collect()
    } else {
        lines.collect()
    };

    Ok(Feature {
        automatic,
        code: code.join("\n"),
        disabled,
        notes: notes.join("\n"),
        tag: tag.to_string(),
        other_stuff: Default::default(),
    })
}

#[derive(Debug, PartialEq)]
enum ChunkKind {
    PrefixMarker(String),
    Automatic,
    Class,
    Feature,
    Other,
}

struct Chunk {
    kind: ChunkKind,
    start: usize,
    end: usize,
}

/// Splits feature code into top-level statements and comment lines.
struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer { text, pos: 0 }
    }

    fn chunks(mut self) -> Result<Vec<Chunk>, BackendError> {
        let mut chunks = Vec::new();
        loop {
            let rest = &self.text[self.pos..];
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                return Ok(chunks);
            }
            let start = self.pos + (rest.len() - trimmed.len());
            self.pos = start;
            let chunk = if trimmed.starts_with('#') {
                self.comment(start)
            } else {
                self.statement(start)?
            };
            chunks.push(chunk);
        }
    }

    fn line_end(&self, from: usize) -> usize {
        self.text[from..]
            .find('\n')
            .map_or(self.text.len(), |i| from + i)
    }

    fn comment(&mut self, start: usize) -> Chunk {
        let end = self.line_end(start);
        let line = self.text[start..end].trim_end();
        let kind = if let Some(name) = line.strip_prefix(PREFIX_MARKER) {
            ChunkKind::PrefixMarker(name.trim().to_string())
        } else if line == AUTOMATIC_MARKER {
            ChunkKind::Automatic
        } else {
            ChunkKind::Other
        };
        self.pos = end;
        Chunk { kind, start, end }
    }

    /// A statement runs to the first `;` outside braces, brackets, strings
    /// and comments.
    fn statement(&mut self, start: usize) -> Result<Chunk, BackendError> {
        let bytes = self.text.as_bytes();
        let mut depth = 0i32;
        let mut i = start;
        while i < bytes.len() {
            match bytes[i] {
                b'#' => {
                    i = self.line_end(i);
                    continue;
                }
                b'"' => {
                    let close = self.text[i + 1..].find('"').ok_or_else(|| {
                        BackendError::Features("unterminated string".to_string())
                    })?;
                    i += close + 2;
                    continue;
                }
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(BackendError::Features(format!(
                            "unbalanced '{}'",
                            bytes[i] as char
                        )));
                    }
                }
                b';' if depth == 0 => {
                    let end = i + 1;
                    self.pos = end;
                    let raw = &self.text[start..end];
                    return Ok(Chunk {
                        kind: classify(raw),
                        start,
                        end,
                    });
                }
                _ => {}
            }
            i += 1;
        }
        Err(BackendError::Features(format!(
            "unterminated statement: {}",
            self.text[start..].lines().next().unwrap_or_default()
        )))
    }
}

fn classify(statement: &str) -> ChunkKind {
    let mut words = statement.split_whitespace();
    match words.next() {
        Some("feature") if statement.contains('{') => ChunkKind::Feature,
        Some(word) if word.starts_with('@') => {
            let is_definition = statement
                .split_once('=')
                .is_some_and(|(name, value)| {
                    !name.trim().contains(char::is_whitespace) && value.trim_start().starts_with('[')
                });
            if is_definition {
                ChunkKind::Class
            } else {
                ChunkKind::Other
            }
        }
        _ => ChunkKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::from_plist::FromPlist;

    const FONT: &str = r#"{
.formatVersion = 3;
classes = (
{automatic = 1; code = "A B C"; name = Uppercase;}
);
featurePrefixes = (
{code = "languagesystem DFLT dflt;"; name = Languagesystems;}
);
features = (
{code = "sub a by a.alt;"; notes = "Stylistic set"; tag = ss01;},
{code = "sub b by b.alt;\nsub c by c.alt;"; disabled = 1; tag = ss02;}
);
}"#;

    const FEA: &str = "# automatic
@Uppercase = [ A B C
];

# Prefix: Languagesystems
languagesystem DFLT dflt;

feature ss01 {
# notes:
# Stylistic set
sub a by a.alt;
} ss01;

feature ss02 {
# disabled
#sub b by b.alt;
#sub c by c.alt;
} ss02;
";

    fn font() -> Font {
        Font::from_plist(Plist::parse(FONT).unwrap()).unwrap()
    }

    #[test]
    fn font_features_as_text() {
        assert_eq!(features_to_fea(&font()), FEA);
        assert_eq!(features_to_fea(&Font::from_plist(Plist::parse("{}").unwrap()).unwrap()), "");
    }

    #[test]
    fn text_back_to_font_features() {
        let font = font();
        let parsed = parse_fea(FEA).unwrap();
        assert_eq!(parsed.classes, font.classes);
        assert_eq!(parsed.prefixes, font.feature_prefixes);
        assert_eq!(parsed.features, font.features);
    }

    #[test]
    fn anonymous_prefix_and_lookups() {
        let text = "languagesystem DFLT dflt;\nlookup foo {\n  sub a by b;\n} foo;\n\nfeature liga {\nlookup foo;\n} liga;\n";
        let parsed = parse_fea(text).unwrap();
        assert_eq!(parsed.prefixes.len(), 1);
        assert_eq!(parsed.prefixes[0].name, ANONYMOUS_PREFIX);
        assert_eq!(
            parsed.prefixes[0].code,
            "languagesystem DFLT dflt;\nlookup foo {\n  sub a by b;\n} foo;"
        );
        assert_eq!(parsed.features[0].tag, "liga");
        assert_eq!(parsed.features[0].code, "lookup foo;");
    }

    #[test]
    fn unbalanced_blocks_are_errors() {
        assert!(matches!(
            parse_fea("feature liga {\nsub f i by f_i;\n"),
            Err(BackendError::Features(_))
        ));
        assert!(matches!(
            parse_fea("feature liga {\n} kern;"),
            Err(BackendError::Features(_))
        ));
        assert!(parse_fea("} liga;").is_err());
    }

    #[test]
    fn write_by_format() {
        let mut font = Plist::parse(FONT).unwrap().into_dictionary().unwrap();
        let features = OpenTypeFeatures {
            text: "feature liga {\nsub f i by f_i;\n} liga;\n".into(),
            ..Default::default()
        };
        write_features(&mut font, FormatVersion::V2, &features).unwrap();
        assert!(!font.contains_key("classes"));
        assert!(!font.contains_key("featurePrefixes"));
        assert_eq!(
            font["features"].to_string(),
            "(\n{\ncode = \"sub f i by f_i;\";\nname = liga;\n}\n)"
        );

        let other = OpenTypeFeatures {
            language: "xyz".into(),
            ..Default::default()
        };
        assert!(matches!(
            write_features(&mut font, FormatVersion::V3, &other),
            Err(BackendError::NotImplemented(_))
        ));
    }
}
