//! Mangled token form
//!
//! Each placeholder becomes `{{<prefix>_<kind>_<name>}}`, where `prefix` encodes the
//! placeholder's position (`a`..`y`, then `z26`, `z27`, ...), `kind` is `x`, `bx` or
//! `ex`, and `name` is the first alphanumeric run of the placeholder value.
//!
//! ```ignore
//! ["Hi ", {t: x, v: "{user}"}, "!"]  <->  "Hi {{a_x_user}}!"
//! ```

use super::{CodecError, CodecResult, PlaceholderMap, Token, mangle};
use crate::nstr::{NormalizedString, Part, PlaceholderKind};

/// Flatten a normalized string to its mangled-token form
///
/// Literal text that would read back as a token is escaped with a backslash, and
/// backslash runs ahead of a token are doubled, so [`extract_v1`] restores the
/// literal runs exactly.
///
/// # Returns
///
/// The flattened string and a map from each token (without braces) to the
/// placeholder, enriched with its `v1`.
pub fn flatten_v1(nstr: &NormalizedString) -> (String, PlaceholderMap) {
    let mut flattened = String::new();
    let mut map = PlaceholderMap::new();
    let mut index = 0;
    let mut parts = nstr.iter().peekable();
    while let Some(part) = parts.next() {
        match part {
            Part::Text(text) => {
                let before_token = matches!(parts.peek(), Some(Part::Placeholder(_)));
                escape_literal(text, before_token, &mut flattened);
            }
            Part::Placeholder(ph) => {
                index += 1;
                let token = mangle(index, ph);
                flattened.push_str("{{");
                flattened.push_str(&token);
                flattened.push_str("}}");
                map.insert(token.clone(), ph.clone().with_v1(token));
            }
        }
    }
    (flattened, map)
}

fn escape_literal(text: &str, before_token: bool, out: &mut String) {
    let mut backslashes = 0;
    for (i, c) in text.char_indices() {
        if c == '\\' {
            backslashes += 1;
            out.push(c);
            continue;
        }
        if c == '{' && scan_token(&text[i..]).is_some() {
            out.extend(std::iter::repeat_n('\\', backslashes + 1));
        }
        backslashes = 0;
        out.push(c);
    }
    if before_token {
        out.extend(std::iter::repeat_n('\\', backslashes));
    }
}

/// Split a string into literal runs and mangled placeholder tokens
///
/// Anything that does not match the token grammar exactly stays literal, including
/// stray `{{`. A backslash run ahead of a token is halved; an odd run escapes the
/// token, which is then kept as literal text.
pub fn tokenize_v1(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;
    while let Some(offset) = input[pos..].find("{{") {
        let start = pos + offset;
        let Some((kind, len)) = scan_token(&input[start..]) else {
            pos = start + 1;
            continue;
        };
        let backslashes = input[literal_start..start]
            .bytes()
            .rev()
            .take_while(|b| *b == b'\\')
            .count();
        let run_start = start - backslashes;
        if run_start > literal_start {
            tokens.push(Token::Literal(&input[literal_start..run_start]));
        }
        if backslashes >= 2 {
            tokens.push(Token::Literal(&input[run_start..run_start + backslashes / 2]));
        }
        let end = start + len;
        if backslashes % 2 == 1 {
            tokens.push(Token::Literal(&input[start..end]));
        } else {
            let token = &input[start + 2..end - 2];
            tokens.push(match kind {
                PlaceholderKind::Standalone => Token::Standalone(token),
                PlaceholderKind::Open => Token::Open(token),
                PlaceholderKind::Close => Token::Close(token),
            });
        }
        pos = end;
        literal_start = end;
    }
    if literal_start < input.len() {
        tokens.push(Token::Literal(&input[literal_start..]));
    }
    tokens
}

/// Match `{{(?:[a-y]|z\d+)_(?:x|bx|ex)_[0-9A-Za-z_]*}}` at the start of `s`.
/// Returns the placeholder kind and the byte length of the whole token.
fn scan_token(s: &str) -> Option<(PlaceholderKind, usize)> {
    let bytes = s.as_bytes();
    let mut i = 2;
    match bytes.get(i)? {
        b'a'..=b'y' => i += 1,
        b'z' => {
            i += 1;
            let digits = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 {
                return None;
            }
            i += digits;
        }
        _ => return None,
    }
    if bytes.get(i) != Some(&b'_') {
        return None;
    }
    i += 1;
    let rest = &bytes[i..];
    let kind = if rest.starts_with(b"bx_") {
        i += 3;
        PlaceholderKind::Open
    } else if rest.starts_with(b"ex_") {
        i += 3;
        PlaceholderKind::Close
    } else if rest.starts_with(b"x_") {
        i += 2;
        PlaceholderKind::Standalone
    } else {
        return None;
    };
    i += bytes[i..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    if bytes[i..].starts_with(b"}}") {
        Some((kind, i + 2))
    } else {
        None
    }
}

/// Rebuild a normalized string from its mangled form
///
/// Every token is looked up in `map` by its exact text and the placeholder is
/// attached with `v1` set to that token.
///
/// # Errors
///
/// [`CodecError::UnresolvedToken`] if a token is not present in `map`.
pub fn extract_v1(input: &str, map: &PlaceholderMap) -> CodecResult<NormalizedString> {
    tokenize_v1(input)
        .into_iter()
        .map(|token| match token {
            Token::Literal(text) => Ok(Part::Text(text.to_string())),
            Token::Standalone(key) | Token::Open(key) | Token::Close(key) => map
                .get(key)
                .map(|ph| Part::Placeholder(ph.clone().with_v1(key)))
                .ok_or_else(|| CodecError::UnresolvedToken(key.to_string())),
        })
        .collect::<CodecResult<Vec<Part>>>()
        .map(NormalizedString::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nstr::Placeholder;
    use rstest::rstest;

    fn greeting() -> NormalizedString {
        NormalizedString::new([
            Part::from("Hello "),
            Part::from(Placeholder::open("<b>")),
            Part::from(Placeholder::standalone("{userName}").with_sample("Jane")),
            Part::from(Placeholder::close("</b>")),
            Part::from(", you have "),
            Part::from(Placeholder::standalone("%d")),
            Part::from(" messages"),
        ])
    }

    // ========== Flatten Tests ==========

    #[test]
    fn test_flatten_tokens() {
        let (flat, map) = flatten_v1(&greeting());
        assert_eq!(
            flat,
            "Hello {{a_bx_b}}{{b_x_userName}}{{c_ex_b}}, you have {{d_x_d}} messages"
        );
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            vec!["a_bx_b", "b_x_userName", "c_ex_b", "d_x_d"]
        );
        assert_eq!(map["b_x_userName"].v1.as_deref(), Some("b_x_userName"));
        assert_eq!(map["b_x_userName"].sample.as_deref(), Some("Jane"));
    }

    #[test]
    fn test_flatten_without_placeholders() {
        let (flat, map) = flatten_v1(&NormalizedString::from_text("plain"));
        assert_eq!(flat, "plain");
        assert!(map.is_empty());
    }

    #[test]
    fn test_flatten_many_placeholders_switches_prefix() {
        let nstr: NormalizedString = (0..27)
            .map(|i| Part::from(Placeholder::standalone(format!("{{v{}}}", i))))
            .collect();
        let (flat, map) = flatten_v1(&nstr);
        assert!(flat.ends_with("{{y_x_v24}}{{z26_x_v25}}{{z27_x_v26}}"));
        assert_eq!(map.len(), 27);
    }

    // ========== Tokenizer Tests ==========

    #[rstest]
    #[case("{{a_x_}}", vec![Token::Standalone("a_x_")])]
    #[case("{{z12_bx_tag}}", vec![Token::Open("z12_bx_tag")])]
    #[case("a{{b_ex_x_y}}c", vec![Token::Literal("a"), Token::Close("b_ex_x_y"), Token::Literal("c")])]
    #[case("{{{a_x_n}}", vec![Token::Literal("{"), Token::Standalone("a_x_n")])]
    #[case("{{z_x_n}}", vec![Token::Literal("{{z_x_n}}")])]
    #[case("{{a_y_n}}", vec![Token::Literal("{{a_y_n}}")])]
    #[case("{{a_x_n-1}}", vec![Token::Literal("{{a_x_n-1}}")])]
    #[case("{{A_x_n}}", vec![Token::Literal("{{A_x_n}}")])]
    #[case("ünï {{a_x_n}} ✓", vec![Token::Literal("ünï "), Token::Standalone("a_x_n"), Token::Literal(" ✓")])]
    fn test_tokenize(#[case] input: &str, #[case] expected: Vec<Token<'_>>) {
        assert_eq!(tokenize_v1(input), expected);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize_v1("").is_empty());
    }

    // ========== Extract Tests ==========

    #[test]
    fn test_round_trip() {
        let source = greeting();
        let (flat, map) = flatten_v1(&source);
        let extracted = extract_v1(&flat, &map).unwrap();

        assert_eq!(extracted.len(), source.len());
        for (a, b) in extracted.iter().zip(source.iter()) {
            match (a, b) {
                (Part::Text(x), Part::Text(y)) => assert_eq!(x, y),
                (Part::Placeholder(x), Part::Placeholder(y)) => {
                    assert_eq!(x.kind, y.kind);
                    assert_eq!(x.value, y.value);
                    assert!(x.v1.is_some());
                }
                _ => panic!("part types differ"),
            }
        }
        // A second pass over the extracted string reproduces the same tokens
        assert_eq!(flatten_v1(&extracted).0, flat);
    }

    #[test]
    fn test_extract_reordered_translation() {
        let (_, map) = flatten_v1(&greeting());
        let translated = "Ciao {{a_bx_b}}{{b_x_userName}}{{c_ex_b}}, hai {{d_x_d}} messaggi";
        let ntgt = extract_v1(translated, &map).unwrap();
        assert_eq!(ntgt.placeholder_count(), 4);
        assert_eq!(ntgt.parts()[0], Part::from("Ciao "));

        let reordered = "{{d_x_d}} messaggi per {{a_bx_b}}{{b_x_userName}}{{c_ex_b}}";
        let ntgt = extract_v1(reordered, &map).unwrap();
        assert_eq!(
            ntgt.placeholders().map(|p| p.v1.as_deref().unwrap()).collect::<Vec<_>>(),
            vec!["d_x_d", "a_bx_b", "b_x_userName", "c_ex_b"]
        );
    }

    #[test]
    fn test_extract_unknown_token_is_an_error() {
        let (_, map) = flatten_v1(&greeting());
        let result = extract_v1("Ciao {{e_x_ghost}}", &map);
        assert_eq!(
            result,
            Err(CodecError::UnresolvedToken("e_x_ghost".to_string()))
        );
    }

    #[rstest]
    #[case::plain_text(NormalizedString::from_text("Type {{b_x_}} to insert"))]
    #[case::beside_placeholder(NormalizedString::new([
        Part::from("literal {{a_x_n}} then "),
        Part::from(Placeholder::standalone("{n}")),
    ]))]
    #[case::escaped_backslash(NormalizedString::new([
        Part::from("path \\{{a_x_n}} and C:\\"),
        Part::from(Placeholder::standalone("{file}")),
        Part::from(" \\\\"),
    ]))]
    #[case::brace_before_token(NormalizedString::new([
        Part::from("{"),
        Part::from(Placeholder::standalone("{n}")),
        Part::from("{{{c_bx_b}}"),
    ]))]
    fn test_round_trip_of_token_like_text(#[case] source: NormalizedString) {
        let (flat, map) = flatten_v1(&source);
        let extracted = extract_v1(&flat, &map).unwrap();
        assert_eq!(extracted.placeholder_count(), source.placeholder_count());
        let without_v1: NormalizedString = extracted
            .iter()
            .cloned()
            .map(|part| match part {
                Part::Placeholder(ph) => Part::Placeholder(Placeholder { v1: None, ..ph }),
                text => text,
            })
            .collect();
        assert_eq!(without_v1, source);
    }

    #[test]
    fn test_flatten_escapes_token_like_text() {
        let (flat, map) = flatten_v1(&NormalizedString::new([
            Part::from("Type {{b_x_}} or a\\"),
            Part::from(Placeholder::standalone("{n}")),
        ]));
        assert_eq!(flat, "Type \\{{b_x_}} or a\\\\{{a_x_n}}");
        assert_eq!(map.len(), 1);
        assert_eq!(
            tokenize_v1(&flat),
            vec![
                Token::Literal("Type "),
                Token::Literal("{{b_x_}}"),
                Token::Literal(" or a"),
                Token::Literal("\\"),
                Token::Standalone("a_x_n"),
            ]
        );
    }

    #[test]
    fn test_extract_keeps_malformed_tokens_as_text() {
        let map = PlaceholderMap::new();
        let ntgt = extract_v1("{{not a token}}", &map).unwrap();
        assert_eq!(ntgt.parts(), &[Part::from("{{not a token}}")]);
    }
}
