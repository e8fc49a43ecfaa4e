//! XML tag form for markup-tolerant MT engines
//!
//! Placeholders are rendered as short numbered tags so that an engine translating
//! HTML can move them around with the words they belong to:
//!
//! - standalone placeholders (and close placeholders with no open partner) become
//!   `<xN />`, or `<xN>sample</xN>` when they carry a sample
//! - open/close placeholders become `<xN>` ... `</xN>`, paired by nesting depth
//!
//! Map keys are `xN` for standalone tags, `bxN` and `exN` for the halves of a pair.

use super::{CodecError, CodecResult, PlaceholderMap, Token, mangle};
use crate::nstr::{NormalizedString, Part, Placeholder, PlaceholderKind};

/// Flatten a normalized string to the XML tag form
///
/// Literal text is entity-escaped (`&`, `<`) so it cannot clash with tag syntax.
pub fn flatten_xml_v1(nstr: &NormalizedString) -> (String, PlaceholderMap) {
    let mut flattened = String::new();
    let mut map = PlaceholderMap::new();
    let mut open_tags: Vec<String> = Vec::new();
    let mut index = 0;
    for part in nstr {
        let ph = match part {
            Part::Text(text) => {
                flattened.push_str(&escape(text));
                continue;
            }
            Part::Placeholder(ph) => ph,
        };
        index += 1;
        let v1 = mangle(index, ph);
        let shorthand = format!("x{}", index);
        let closing = match ph.kind {
            PlaceholderKind::Close => open_tags.pop(),
            _ => None,
        };
        let key = match (ph.kind, closing) {
            (PlaceholderKind::Open, _) => {
                flattened.push_str(&format!("<{}>", shorthand));
                let key = format!("b{}", shorthand);
                open_tags.push(shorthand);
                key
            }
            (PlaceholderKind::Close, Some(open)) => {
                flattened.push_str(&format!("</{}>", open));
                format!("e{}", open)
            }
            // standalone, or a close that arrives before any open
            _ => {
                match &ph.sample {
                    Some(sample) => flattened.push_str(&format!(
                        "<{0}>{1}</{0}>",
                        shorthand,
                        escape(sample)
                    )),
                    None => flattened.push_str(&format!("<{} />", shorthand)),
                }
                shorthand
            }
        };
        map.insert(key, ph.clone().with_v1(v1));
    }
    (flattened, map)
}

/// Split a string into literal runs and `<xN />`, `<xN>`, `</xN>` tags
pub fn tokenize_xml(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;
    while let Some(offset) = input[pos..].find('<') {
        let start = pos + offset;
        match scan_tag(&input[start..]) {
            Some((token, len)) => {
                if start > literal_start {
                    tokens.push(Token::Literal(&input[literal_start..start]));
                }
                tokens.push(token);
                pos = start + len;
                literal_start = pos;
            }
            None => pos = start + 1,
        }
    }
    if literal_start < input.len() {
        tokens.push(Token::Literal(&input[literal_start..]));
    }
    tokens
}

fn scan_tag(s: &str) -> Option<(Token<'_>, usize)> {
    let bytes = s.as_bytes();
    let closing = bytes.get(1) == Some(&b'/');
    let name_start = if closing { 2 } else { 1 };
    if bytes.get(name_start) != Some(&b'x') {
        return None;
    }
    let digits = bytes[name_start + 1..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    let name_end = name_start + 1 + digits;
    let name = &s[name_start..name_end];
    let rest = &bytes[name_end..];
    if closing {
        rest.starts_with(b">")
            .then_some((Token::Close(name), name_end + 1))
    } else if rest.starts_with(b" />") {
        Some((Token::Standalone(name), name_end + 3))
    } else if rest.starts_with(b">") {
        Some((Token::Open(name), name_end + 1))
    } else {
        None
    }
}

/// Rebuild a normalized string from an XML-form translation
///
/// Text enclosed by a sample-bearing tag pair is the (possibly translated) sample and
/// is dropped; the placeholder already carries its meaning. A space at either edge of
/// that enclosed text is kept as a single space outside the placeholder, unless the
/// neighbouring text already supplies one.
///
/// # Errors
///
/// [`CodecError::UnresolvedTag`] if a well-formed tag has no entry in `map`.
pub fn extract_xml_v1(input: &str, map: &PlaceholderMap) -> CodecResult<NormalizedString> {
    let mut builder = PartBuilder::default();
    let mut pending: Option<&str> = None;
    for token in tokenize_xml(input) {
        match token {
            Token::Literal(text) => pending = Some(text),
            Token::Close(name) if map.contains_key(name) => {
                let ph = lookup(map, name, || format!("</{}>", name))?;
                match pending.take() {
                    Some(sample) => {
                        if sample.starts_with(' ') {
                            builder.space();
                        }
                        builder.placeholder(ph);
                        builder.space_after = !sample.trim().is_empty() && sample.ends_with(' ');
                    }
                    None => builder.placeholder(ph),
                }
            }
            Token::Open(name) if map.contains_key(name) => {
                // opening half of a sample pair: the close tag emits the placeholder
                builder.flush(pending.take());
            }
            Token::Open(name) => {
                builder.flush(pending.take());
                let key = format!("b{}", name);
                builder.placeholder(lookup(map, &key, || format!("<{}>", name))?);
            }
            Token::Close(name) => {
                builder.flush(pending.take());
                let key = format!("e{}", name);
                builder.placeholder(lookup(map, &key, || format!("</{}>", name))?);
            }
            Token::Standalone(name) => {
                builder.flush(pending.take());
                builder.placeholder(lookup(map, name, || format!("<{} />", name))?);
            }
        }
    }
    builder.flush(pending);
    if builder.space_after {
        builder.space();
    }
    Ok(NormalizedString::new(builder.parts))
}

fn lookup(
    map: &PlaceholderMap,
    key: &str,
    tag: impl FnOnce() -> String,
) -> CodecResult<Placeholder> {
    map.get(key)
        .cloned()
        .ok_or_else(|| CodecError::UnresolvedTag(tag()))
}

#[derive(Default)]
struct PartBuilder {
    parts: Vec<Part>,
    /// a space is owed after the last sample-bearing placeholder
    space_after: bool,
}

impl PartBuilder {
    fn ends_with_space(&self) -> bool {
        matches!(self.parts.last(), Some(Part::Text(text)) if text.ends_with(' '))
    }

    fn space(&mut self) {
        self.space_after = false;
        if !self.ends_with_space() {
            self.parts.push(Part::Text(" ".to_string()));
        }
    }

    fn flush(&mut self, text: Option<&str>) {
        let Some(text) = text else { return };
        if std::mem::take(&mut self.space_after) && !text.starts_with(' ') {
            self.parts.push(Part::Text(" ".to_string()));
        }
        self.parts.push(Part::Text(unescape(text)));
    }

    fn placeholder(&mut self, ph: Placeholder) {
        if self.space_after {
            self.space();
        }
        self.parts.push(Part::Placeholder(ph));
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;")
}

/// `&amp;` goes last so that escaped entities survive one level of decoding
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn nested() -> NormalizedString {
        NormalizedString::new([
            Part::from("Click "),
            Part::from(Placeholder::open("<a href=\"/x\">")),
            Part::from("here "),
            Part::from(Placeholder::open("<b>")),
            Part::from("now"),
            Part::from(Placeholder::close("</b>")),
            Part::from(Placeholder::close("</a>")),
            Part::from(" to continue"),
            Part::from(Placeholder::standalone("<br/>")),
        ])
    }

    fn kinds(nstr: &NormalizedString) -> Vec<PlaceholderKind> {
        nstr.placeholders().map(|ph| ph.kind).collect()
    }

    // ========== Flatten Tests ==========

    #[test]
    fn test_flatten_nested_tags() {
        let (xml, map) = flatten_xml_v1(&nested());
        assert_eq!(
            xml,
            "Click <x1>here <x2>now</x2></x1> to continue<x5 />"
        );
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            vec!["bx1", "bx2", "ex2", "ex1", "x5"]
        );
        assert_eq!(map["bx1"].v1.as_deref(), Some("a_bx_a"));
        assert_eq!(map["ex1"].v1.as_deref(), Some("d_ex_a"));
        assert_eq!(map["x5"].v1.as_deref(), Some("e_x_br"));
    }

    #[test]
    fn test_flatten_sample_pair() {
        let nstr = NormalizedString::new([
            Part::from("Hi "),
            Part::from(Placeholder::standalone("{user}").with_sample("Jane")),
            Part::from("!"),
        ]);
        let (xml, map) = flatten_xml_v1(&nstr);
        assert_eq!(xml, "Hi <x1>Jane</x1>!");
        assert!(map.contains_key("x1"));
    }

    #[test]
    fn test_flatten_close_before_open_is_standalone() {
        let nstr = NormalizedString::new([
            Part::from(Placeholder::close("</i>")),
            Part::from("tail"),
        ]);
        let (xml, map) = flatten_xml_v1(&nstr);
        assert_eq!(xml, "<x1 />tail");
        assert_eq!(map["x1"].kind, PlaceholderKind::Close);
    }

    #[test]
    fn test_flatten_escapes_text() {
        let (xml, _) = flatten_xml_v1(&NormalizedString::from_text("a < b & c"));
        assert_eq!(xml, "a &lt; b &amp; c");
    }

    // ========== Tokenizer Tests ==========

    #[rstest]
    #[case("<x1 />", vec![Token::Standalone("x1")])]
    #[case("<x12>a</x12>", vec![Token::Open("x12"), Token::Literal("a"), Token::Close("x12")])]
    #[case("<x1/>", vec![Token::Literal("<x1/>")])]
    #[case("<x>", vec![Token::Literal("<x>")])]
    #[case("<b>bold</b>", vec![Token::Literal("<b>bold</b>")])]
    #[case("a <<x2 /> b", vec![Token::Literal("a <"), Token::Standalone("x2"), Token::Literal(" b")])]
    fn test_tokenize(#[case] input: &str, #[case] expected: Vec<Token<'_>>) {
        assert_eq!(tokenize_xml(input), expected);
    }

    // ========== Extract Tests ==========

    #[test]
    fn test_round_trip_preserves_placeholders() {
        let source = nested();
        let (xml, map) = flatten_xml_v1(&source);
        let extracted = extract_xml_v1(&xml, &map).unwrap();
        assert_eq!(kinds(&extracted), kinds(&source));
        assert_eq!(extracted.text_only(), source.text_only());
        assert_eq!(
            extracted.placeholders().map(|ph| ph.value.as_str()).collect::<Vec<_>>(),
            vec!["<a href=\"/x\">", "<b>", "</b>", "</a>", "<br/>"]
        );
    }

    #[test]
    fn test_round_trip_escaped_text() {
        let source = NormalizedString::new([
            Part::from("1 < 2 & "),
            Part::from(Placeholder::standalone("{n}")),
            Part::from(" &amp; more"),
        ]);
        let (xml, map) = flatten_xml_v1(&source);
        let extracted = extract_xml_v1(&xml, &map).unwrap();
        assert_eq!(extracted.text_only(), source.text_only());
    }

    #[test]
    fn test_translated_sample_is_discarded() {
        let nstr = NormalizedString::new([
            Part::from("Hi "),
            Part::from(Placeholder::standalone("{user}").with_sample("Jane")),
            Part::from("!"),
        ]);
        let (_, map) = flatten_xml_v1(&nstr);
        let ntgt = extract_xml_v1("Ciao <x1>Giovanna</x1>!", &map).unwrap();
        assert_eq!(
            ntgt.parts(),
            &[
                Part::from("Ciao "),
                Part::from(map["x1"].clone()),
                Part::from("!"),
            ]
        );
    }

    #[test]
    fn test_sample_spaces_are_clamped() {
        let nstr = NormalizedString::new([
            Part::from("Hi "),
            Part::from(Placeholder::standalone("{user}").with_sample("Jane")),
            Part::from("!"),
        ]);
        let (_, map) = flatten_xml_v1(&nstr);

        // engine moved the space inside the pair
        let ntgt = extract_xml_v1("Ciao<x1> Giovanna</x1>!", &map).unwrap();
        assert_eq!(ntgt.parts()[0], Part::from("Ciao "));

        // spaces on both sides, with neighbouring spaces already present
        let ntgt = extract_xml_v1("Ciao <x1> Giovanna </x1> !", &map).unwrap();
        assert_eq!(
            ntgt.parts(),
            &[
                Part::from("Ciao "),
                Part::from(map["x1"].clone()),
                Part::from(" !"),
            ]
        );

        // trailing space owed at the end of the string
        let ntgt = extract_xml_v1("<x1>Giovanna </x1>", &map).unwrap();
        assert_eq!(ntgt.parts().last(), Some(&Part::from(" ")));
    }

    #[test]
    fn test_unescape_entities() {
        let ntgt = extract_xml_v1("l&#39;&lt;a&gt;&nbsp;&amp;", &PlaceholderMap::new()).unwrap();
        assert_eq!(ntgt.text_only(), "l'<a>\u{a0}&");
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        let (_, map) = flatten_xml_v1(&nested());
        assert_eq!(
            extract_xml_v1("oops <x9 />", &map),
            Err(CodecError::UnresolvedTag("<x9 />".to_string()))
        );
        assert_eq!(
            extract_xml_v1("oops </x7>", &map),
            Err(CodecError::UnresolvedTag("</x7>".to_string()))
        );
    }

    #[test]
    fn test_engine_reordering_tags() {
        let (_, map) = flatten_xml_v1(&nested());
        let ntgt =
            extract_xml_v1("<x5 />Per continuare <x1>clicca <x2>ora</x2></x1>", &map).unwrap();
        assert_eq!(
            kinds(&ntgt),
            vec![
                PlaceholderKind::Standalone,
                PlaceholderKind::Open,
                PlaceholderKind::Open,
                PlaceholderKind::Close,
                PlaceholderKind::Close,
            ]
        );
    }
}
