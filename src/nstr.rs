//! Normalized string model
//!
//! A normalized string is the part-sequence form of a translatable string: literal
//! text runs interleaved with typed placeholders. On the wire (TM files, job payloads)
//! it is a JSON array whose elements are either plain strings or placeholder objects:
//!
//! ```json
//! ["Hello ", {"t": "bx", "v": "<b>"}, "world", {"t": "ex", "v": "</b>"}]
//! ```
//!
//! Canonical form never has two literal runs next to each other. Every constructor
//! in this module goes through [`consolidate`], so a `NormalizedString` is always
//! canonical.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Inline-tag semantics of a placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceholderKind {
    /// Self-closing placeholder (a variable, `<br/>`, ...)
    #[serde(rename = "x")]
    Standalone,
    /// Opening half of a paired tag
    #[serde(rename = "bx")]
    Open,
    /// Closing half of a paired tag
    #[serde(rename = "ex")]
    Close,
}

impl PlaceholderKind {
    /// Short code used on the wire and inside mangled tokens
    pub fn code(self) -> &'static str {
        match self {
            PlaceholderKind::Standalone => "x",
            PlaceholderKind::Open => "bx",
            PlaceholderKind::Close => "ex",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "x" => Some(PlaceholderKind::Standalone),
            "bx" => Some(PlaceholderKind::Open),
            "ex" => Some(PlaceholderKind::Close),
            _ => None,
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A non-literal part of a normalized string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placeholder {
    #[serde(rename = "t")]
    pub kind: PlaceholderKind,
    /// Opaque identifier supplied by the producer (the original tag, a variable expression)
    #[serde(rename = "v")]
    pub value: String,
    /// Human-readable rendering of the placeholder
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    /// Mangled token assigned by the codec; equal `v1` means same placeholder instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v1: Option<String>,
}

impl Placeholder {
    pub fn new(kind: PlaceholderKind, value: impl Into<String>) -> Self {
        Placeholder {
            kind,
            value: value.into(),
            sample: None,
            v1: None,
        }
    }

    pub fn standalone(value: impl Into<String>) -> Self {
        Self::new(PlaceholderKind::Standalone, value)
    }

    pub fn open(value: impl Into<String>) -> Self {
        Self::new(PlaceholderKind::Open, value)
    }

    pub fn close(value: impl Into<String>) -> Self {
        Self::new(PlaceholderKind::Close, value)
    }

    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = Some(sample.into());
        self
    }

    pub fn with_v1(mut self, v1: impl Into<String>) -> Self {
        self.v1 = Some(v1.into());
        self
    }
}

/// One element of a normalized string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text(String),
    Placeholder(Placeholder),
}

impl Part {
    pub fn as_placeholder(&self) -> Option<&Placeholder> {
        match self {
            Part::Placeholder(ph) => Some(ph),
            Part::Text(_) => None,
        }
    }
}

impl From<&str> for Part {
    fn from(text: &str) -> Self {
        Part::Text(text.to_string())
    }
}

impl From<Placeholder> for Part {
    fn from(ph: Placeholder) -> Self {
        Part::Placeholder(ph)
    }
}

/// A canonical (consolidated) sequence of parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedString(Vec<Part>);

impl NormalizedString {
    /// Build a normalized string, merging adjacent literal runs and dropping empty ones
    pub fn new(parts: impl IntoIterator<Item = Part>) -> Self {
        Self::from_decoded(
            parts.into_iter().map(DecodedPart::from),
            &mut Flags::default(),
        )
    }

    /// A normalized string holding a single literal run
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new([Part::Text(text.into())])
    }

    /// Consolidate decoder output into canonical form, collecting raised flags
    pub fn from_decoded(parts: impl IntoIterator<Item = DecodedPart>, flags: &mut Flags) -> Self {
        NormalizedString(consolidate_with(parts, flags, Part::Text, Part::Placeholder))
    }

    pub fn parts(&self) -> &[Part] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Part> {
        self.0.iter()
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.0.iter().filter_map(Part::as_placeholder)
    }

    pub fn placeholders_mut(&mut self) -> impl Iterator<Item = &mut Placeholder> {
        self.0.iter_mut().filter_map(|part| match part {
            Part::Placeholder(ph) => Some(ph),
            Part::Text(_) => None,
        })
    }

    pub fn placeholder_count(&self) -> usize {
        self.placeholders().count()
    }

    /// Concatenation of the literal runs only
    pub fn text_only(&self) -> String {
        self.0
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::Placeholder(_) => None,
            })
            .collect()
    }
}

impl<'de> Deserialize<'de> for NormalizedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Part>::deserialize(deserializer).map(NormalizedString::new)
    }
}

impl<'a> IntoIterator for &'a NormalizedString {
    type Item = &'a Part;
    type IntoIter = std::slice::Iter<'a, Part>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Part> for NormalizedString {
    fn from_iter<I: IntoIterator<Item = Part>>(iter: I) -> Self {
        NormalizedString::new(iter)
    }
}

/// Renders literal text and placeholder values back to back
impl fmt::Display for NormalizedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.0 {
            match part {
                Part::Text(text) => f.write_str(text)?,
                Part::Placeholder(ph) => f.write_str(&ph.value)?,
            }
        }
        Ok(())
    }
}

/// Intermediate part produced by decoders, before consolidation
///
/// A literal fragment may carry a flag: consolidation records the flag in the
/// [`Flags`] accumulator and keeps the text in the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedPart {
    Text { value: String, flag: Option<String> },
    Placeholder(Placeholder),
}

impl DecodedPart {
    pub fn text(value: impl Into<String>) -> Self {
        DecodedPart::Text {
            value: value.into(),
            flag: None,
        }
    }

    pub fn flagged(value: impl Into<String>, flag: impl Into<String>) -> Self {
        DecodedPart::Text {
            value: value.into(),
            flag: Some(flag.into()),
        }
    }
}

impl From<Part> for DecodedPart {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(value) => DecodedPart::Text { value, flag: None },
            Part::Placeholder(ph) => DecodedPart::Placeholder(ph),
        }
    }
}

impl From<Placeholder> for DecodedPart {
    fn from(ph: Placeholder) -> Self {
        DecodedPart::Placeholder(ph)
    }
}

/// Side-channel values threaded through decode, consolidate and encode
///
/// Writing a flag that is already present overwrites it: last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    values: BTreeMap<String, String>,
}

impl Flags {
    const RAISED: &'static str = "true";
    const TARGET_LANG: &'static str = "targetLang";

    pub fn new() -> Self {
        Self::default()
    }

    /// Flags pre-seeded with the target language encoders should render for
    pub fn for_target(lang: &str) -> Self {
        let mut flags = Self::default();
        flags.set(Self::TARGET_LANG, lang);
        flags
    }

    pub fn raise(&mut self, name: &str) {
        self.set(name, Self::RAISED);
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_raised(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn target_lang(&self) -> Option<&str> {
        self.get(Self::TARGET_LANG)
    }

    /// Fold `other` into `self`; values from `other` win
    pub fn merge(&mut self, other: &Flags) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }
}

/// Merge adjacent literal runs of decoder output, keeping parts typed
///
/// Idempotent: consolidating already consolidated parts returns them unchanged.
pub fn consolidate(
    parts: impl IntoIterator<Item = DecodedPart>,
    flags: &mut Flags,
) -> Vec<DecodedPart> {
    consolidate_with(parts, flags, DecodedPart::text, DecodedPart::Placeholder)
}

/// Scan left to right accumulating literal runs; flush on placeholders and at the end.
/// `text` and `placeholder` choose the output representation.
fn consolidate_with<T>(
    parts: impl IntoIterator<Item = DecodedPart>,
    flags: &mut Flags,
    text: impl Fn(String) -> T,
    placeholder: impl Fn(Placeholder) -> T,
) -> Vec<T> {
    let mut consolidated = Vec::new();
    let mut accumulated = String::new();
    for part in parts {
        match part {
            DecodedPart::Text { value, flag } => {
                accumulated.push_str(&value);
                if let Some(flag) = flag {
                    flags.raise(&flag);
                }
            }
            DecodedPart::Placeholder(ph) => {
                if !accumulated.is_empty() {
                    consolidated.push(text(std::mem::take(&mut accumulated)));
                }
                consolidated.push(placeholder(ph));
            }
        }
    }
    if !accumulated.is_empty() {
        consolidated.push(text(accumulated));
    }
    consolidated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_nstr() -> NormalizedString {
        NormalizedString::new([
            Part::from("Hello "),
            Part::from(Placeholder::open("<b>")),
            Part::from("world"),
            Part::from(Placeholder::close("</b>")),
            Part::from("!"),
        ])
    }

    // ========== Consolidation Tests ==========

    #[test]
    fn test_adjacent_text_is_merged() {
        let nstr = NormalizedString::new([
            Part::from("a"),
            Part::from("b"),
            Part::from(Placeholder::standalone("{x}")),
            Part::from("c"),
            Part::from("d"),
        ]);
        assert_eq!(
            nstr.parts(),
            &[
                Part::from("ab"),
                Part::from(Placeholder::standalone("{x}")),
                Part::from("cd"),
            ]
        );
    }

    #[test]
    fn test_empty_text_is_dropped() {
        let nstr = NormalizedString::new([
            Part::from(""),
            Part::from(Placeholder::standalone("{x}")),
            Part::from(""),
        ]);
        assert_eq!(nstr.len(), 1);
        assert!(NormalizedString::from_text("").is_empty());
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let mut flags = Flags::new();
        let once = consolidate(
            vec![
                DecodedPart::text("a"),
                DecodedPart::flagged("b", "quotes"),
                DecodedPart::Placeholder(Placeholder::standalone("%s")),
                DecodedPart::text("c"),
            ],
            &mut flags,
        );
        let twice = consolidate(once.clone(), &mut flags);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_flags_are_collected_without_removing_text() {
        let mut flags = Flags::new();
        let nstr = NormalizedString::from_decoded(
            vec![DecodedPart::text("it"), DecodedPart::flagged("'s", "apostrophe")],
            &mut flags,
        );
        assert_eq!(nstr.parts(), &[Part::from("it's")]);
        assert!(flags.is_raised("apostrophe"));
        assert!(!flags.is_raised("other"));
    }

    #[test]
    fn test_flags_last_write_wins() {
        let mut flags = Flags::for_target("fr");
        flags.set("targetLang", "de");
        assert_eq!(flags.target_lang(), Some("de"));

        let mut other = Flags::new();
        other.set("targetLang", "it");
        flags.merge(&other);
        assert_eq!(flags.target_lang(), Some("it"));
    }

    // ========== Wire Format Tests ==========

    #[test]
    fn test_json_wire_format() {
        let json = serde_json::to_string(&sample_nstr()).unwrap();
        assert_eq!(
            json,
            r#"["Hello ",{"t":"bx","v":"<b>"},"world",{"t":"ex","v":"</b>"},"!"]"#
        );
    }

    #[test]
    fn test_deserialize_consolidates() {
        let nstr: NormalizedString =
            serde_json::from_str(r#"["a","b",{"t":"x","v":"{n}","s":"3","v1":"a_x_n"}]"#)
                .unwrap();
        assert_eq!(nstr.len(), 2);
        assert_eq!(nstr.parts()[0], Part::from("ab"));
        let ph = nstr.placeholders().next().unwrap();
        assert_eq!(ph.sample.as_deref(), Some("3"));
        assert_eq!(ph.v1.as_deref(), Some("a_x_n"));
    }

    #[test]
    fn test_display_and_text_only() {
        let nstr = sample_nstr();
        assert_eq!(nstr.to_string(), "Hello <b>world</b>!");
        assert_eq!(nstr.text_only(), "Hello world!");
        assert_eq!(nstr.placeholder_count(), 2);
    }

    #[test]
    fn test_kind_codes() {
        for kind in [
            PlaceholderKind::Standalone,
            PlaceholderKind::Open,
            PlaceholderKind::Close,
        ] {
            assert_eq!(PlaceholderKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(PlaceholderKind::from_code("s"), None);
    }
}
