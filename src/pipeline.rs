//! Decode/encode pipeline
//!
//! Decoders turn literal runs into placeholders (variables, markup, glossary terms)
//! and run left to right, each followed by consolidation. Encoders render parts back
//! to text. A [`Flags`] accumulator is threaded through both directions so a decoder
//! can leave state for a later encoder.
//!
//! # Example
//!
//! ```ignore
//! let vars = RegexDecoder::brace_variables();
//! let tags = RegexDecoder::xml_tags();
//! let mut flags = Flags::for_target("fr");
//! let nstr = get_normalized_string("Hi <b>{name}</b>", &[&tags, &vars], &mut flags);
//! assert_eq!(nstr.placeholder_count(), 3);
//! ```

use crate::nstr::{DecodedPart, Flags, NormalizedString, Part, Placeholder, PlaceholderKind};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static BRACE_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[A-Za-z_][0-9A-Za-z_.]*\}").unwrap());
static XML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").unwrap());

/// A transform over decoder output
pub trait Decoder: Send + Sync {
    fn decode(&self, parts: Vec<DecodedPart>) -> Vec<DecodedPart>;
}

impl<F> Decoder for F
where
    F: Fn(Vec<DecodedPart>) -> Vec<DecodedPart> + Send + Sync,
{
    fn decode(&self, parts: Vec<DecodedPart>) -> Vec<DecodedPart> {
        self(parts)
    }
}

/// Renders a literal run or a placeholder value back to text
pub trait Encoder: Send + Sync {
    fn encode(&self, text: &str, flags: &Flags) -> String;
}

impl<F> Encoder for F
where
    F: Fn(&str, &Flags) -> String + Send + Sync,
{
    fn encode(&self, text: &str, flags: &Flags) -> String {
        self(text, flags)
    }
}

/// Run `decoders` over a normalized string, consolidating after each one
pub fn decode_normalized_string(
    nstr: NormalizedString,
    decoders: &[&dyn Decoder],
    flags: &mut Flags,
) -> NormalizedString {
    let mut parts: Vec<DecodedPart> = nstr.into_parts().into_iter().map(Into::into).collect();
    for decoder in decoders {
        parts = crate::nstr::consolidate(decoder.decode(parts), flags);
    }
    NormalizedString::from_decoded(parts, flags)
}

/// Decode a raw string into a normalized string
pub fn get_normalized_string(
    text: &str,
    decoders: &[&dyn Decoder],
    flags: &mut Flags,
) -> NormalizedString {
    decode_normalized_string(NormalizedString::from_text(text), decoders, flags)
}

/// Two encoder chains, one for literal runs and one for placeholder values
#[derive(Default)]
pub struct PartEncoder {
    text_encoders: Vec<Box<dyn Encoder>>,
    code_encoders: Vec<Box<dyn Encoder>>,
}

impl PartEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text_encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.text_encoders.push(Box::new(encoder));
        self
    }

    pub fn with_code_encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.code_encoders.push(Box::new(encoder));
        self
    }

    /// Fold the matching encoder chain over one part
    pub fn encode_part(&self, part: &Part, flags: &Flags) -> String {
        let (encoders, text) = match part {
            Part::Text(text) => (&self.text_encoders, text.as_str()),
            Part::Placeholder(ph) => (&self.code_encoders, ph.value.as_str()),
        };
        encoders
            .iter()
            .fold(text.to_string(), |acc, encoder| encoder.encode(&acc, flags))
    }

    pub fn encode(&self, nstr: &NormalizedString, flags: &Flags) -> String {
        nstr.iter()
            .map(|part| self.encode_part(part, flags))
            .collect()
    }
}

/// Split every literal run at the matches of `regex`, replacing each match with the
/// part built by `on_match`. Unmatched fragments keep the flag of their run.
fn split_matches(
    parts: Vec<DecodedPart>,
    regex: &Regex,
    on_match: impl Fn(&str) -> DecodedPart,
) -> Vec<DecodedPart> {
    let mut decoded = Vec::with_capacity(parts.len());
    for part in parts {
        let (value, flag) = match part {
            DecodedPart::Text { value, flag } => (value, flag),
            placeholder => {
                decoded.push(placeholder);
                continue;
            }
        };
        let fragment = |text: &str| DecodedPart::Text {
            value: text.to_string(),
            flag: flag.clone(),
        };
        let mut pos = 0;
        for m in regex.find_iter(&value) {
            if m.start() > pos {
                decoded.push(fragment(&value[pos..m.start()]));
            }
            decoded.push(on_match(m.as_str()));
            pos = m.end();
        }
        if pos < value.len() {
            decoded.push(fragment(&value[pos..]));
        }
    }
    decoded
}

/// Turns regex matches inside literal runs into placeholders
#[derive(Clone)]
pub struct RegexDecoder {
    regex: Regex,
    classify: fn(&str) -> PlaceholderKind,
}

impl RegexDecoder {
    pub fn new(regex: Regex, classify: fn(&str) -> PlaceholderKind) -> Self {
        RegexDecoder { regex, classify }
    }

    /// `{name}` style variables, as standalone placeholders
    pub fn brace_variables() -> Self {
        Self::new(BRACE_VARIABLE.clone(), |_| PlaceholderKind::Standalone)
    }

    /// HTML/XML tags: `</..>` close, `<../>` standalone, anything else opens
    pub fn xml_tags() -> Self {
        Self::new(XML_TAG.clone(), |tag| {
            if tag.starts_with("</") {
                PlaceholderKind::Close
            } else if tag.ends_with("/>") {
                PlaceholderKind::Standalone
            } else {
                PlaceholderKind::Open
            }
        })
    }
}

impl Decoder for RegexDecoder {
    fn decode(&self, parts: Vec<DecodedPart>) -> Vec<DecodedPart> {
        split_matches(parts, &self.regex, |matched| {
            DecodedPart::Placeholder(Placeholder::new((self.classify)(matched), matched))
        })
    }
}

/// Escape sequences decoded to their literal characters
///
/// Decoding raises `flag`; encoding re-escapes only when the flag is raised, so a
/// string that never contained escapes round-trips untouched.
#[derive(Debug, Clone)]
pub struct Escapes {
    flag: String,
    to_raw: BTreeMap<String, String>,
    to_escaped: BTreeMap<String, String>,
    escaped_matcher: Regex,
    raw_matcher: Regex,
}

impl Escapes {
    /// `table` pairs an escape sequence with the text it stands for
    pub fn new(flag: &str, table: &[(&str, &str)]) -> Result<Self, regex::Error> {
        let to_raw: BTreeMap<String, String> = table
            .iter()
            .map(|(escaped, raw)| (escaped.to_string(), raw.to_string()))
            .collect();
        let to_escaped: BTreeMap<String, String> = table
            .iter()
            .map(|(escaped, raw)| (raw.to_string(), escaped.to_string()))
            .collect();
        Ok(Escapes {
            flag: flag.to_string(),
            escaped_matcher: alternation(to_raw.keys())?,
            raw_matcher: alternation(to_escaped.keys())?,
            to_raw,
            to_escaped,
        })
    }

    /// Backslash escapes of JavaScript/Java-style string literals
    pub fn backslash() -> Result<Self, regex::Error> {
        Self::new(
            "backslashEscapes",
            &[
                (r"\\", "\\"),
                (r"\n", "\n"),
                (r"\t", "\t"),
                (r#"\""#, "\""),
                (r"\'", "'"),
            ],
        )
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }
}

impl Decoder for Escapes {
    fn decode(&self, parts: Vec<DecodedPart>) -> Vec<DecodedPart> {
        split_matches(parts, &self.escaped_matcher, |matched| {
            let raw = self.to_raw.get(matched).map_or(matched, String::as_str);
            DecodedPart::flagged(raw, self.flag.as_str())
        })
    }
}

impl Encoder for Escapes {
    fn encode(&self, text: &str, flags: &Flags) -> String {
        if !flags.is_raised(&self.flag) {
            return text.to_string();
        }
        self.raw_matcher
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let raw = &caps[0];
                self.to_escaped.get(raw).cloned().unwrap_or_else(|| raw.to_string())
            })
            .into_owned()
    }
}

/// Longest-first alternation of literal strings
fn alternation<'a>(literals: impl Iterator<Item = &'a String>) -> Result<Regex, regex::Error> {
    let mut literals: Vec<&String> = literals.filter(|s| !s.is_empty()).collect();
    literals.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let pattern = literals
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    // an empty alternation would match everywhere
    Regex::new(if pattern.is_empty() { "[^\\s\\S]" } else { &pattern })
}

/// Glossary keyword → target language → term
pub type Glossary = BTreeMap<String, BTreeMap<String, String>>;

/// Protects glossary keywords from machine translation
///
/// The decoder replaces each keyword occurrence with a standalone placeholder whose
/// value is `glossary:<keyword>` and whose sample is the keyword itself. The encoder
/// (and [`GlossaryTranslator::restore`]) renders those placeholders as the term for
/// the flags' target language, falling back to the keyword.
#[derive(Debug, Clone)]
pub struct GlossaryTranslator {
    glossary: Glossary,
    matcher: Option<Regex>,
}

impl GlossaryTranslator {
    pub const PREFIX: &'static str = "glossary:";

    pub fn new(glossary: Glossary) -> Result<Self, regex::Error> {
        let mut keywords: Vec<&String> = glossary.keys().filter(|k| !k.is_empty()).collect();
        keywords.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let matcher = if keywords.is_empty() {
            None
        } else {
            let pattern = keywords
                .iter()
                .map(|keyword| word_bounded(keyword))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&pattern)?)
        };
        Ok(GlossaryTranslator { glossary, matcher })
    }

    pub fn is_empty(&self) -> bool {
        self.glossary.is_empty()
    }

    /// The rendering of `keyword` in `lang`, or the keyword itself
    pub fn term<'a>(&'a self, keyword: &'a str, lang: Option<&str>) -> &'a str {
        lang.and_then(|lang| self.glossary.get(keyword)?.get(lang))
            .map_or(keyword, String::as_str)
    }

    /// Replace glossary placeholders in a translated string with their terms
    pub fn restore(&self, ntgt: NormalizedString, flags: &Flags) -> NormalizedString {
        ntgt.into_parts()
            .into_iter()
            .map(|part| match part {
                Part::Placeholder(ph) if ph.value.starts_with(Self::PREFIX) => {
                    Part::Text(self.encode(&ph.value, flags))
                }
                part => part,
            })
            .collect()
    }
}

fn word_bounded(keyword: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    format!(
        "{}{}{}",
        if is_word(keyword.chars().next()) { r"\b" } else { "" },
        regex::escape(keyword),
        if is_word(keyword.chars().last()) { r"\b" } else { "" },
    )
}

impl Decoder for GlossaryTranslator {
    fn decode(&self, parts: Vec<DecodedPart>) -> Vec<DecodedPart> {
        match &self.matcher {
            Some(matcher) => split_matches(parts, matcher, |keyword| {
                DecodedPart::Placeholder(
                    Placeholder::standalone(format!("{}{}", Self::PREFIX, keyword))
                        .with_sample(keyword),
                )
            }),
            None => parts,
        }
    }
}

impl Encoder for GlossaryTranslator {
    fn encode(&self, text: &str, flags: &Flags) -> String {
        match text.strip_prefix(Self::PREFIX) {
            Some(keyword) => self.term(keyword, flags.target_lang()).to_string(),
            None => text.to_string(),
        }
    }
}
