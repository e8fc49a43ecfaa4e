//! Placeholder codecs
//!
//! Converts normalized strings to and from the two wire forms handed to translation
//! vendors and used for matching:
//!
//! - [`mangled`]: placeholders become `{{a_x_name}}` tokens. Used for diffing, storage
//!   and vendors that pass opaque tokens through untouched.
//! - [`xml`]: placeholders become `<x1 />`, `<x2>...</x2>` tags. Used for MT engines
//!   that translate around basic markup.
//!
//! Both forms return a [`PlaceholderMap`] from the emitted key to the enriched
//! placeholder (with its `v1` token set), which is the only thing needed to map a
//! translated wire string back to placeholders.

pub mod compat;
pub mod mangled;
pub mod xml;

pub use compat::{
    PlaceholderMatcher, flatten_to_mini_v1, flatten_to_ordinal, minify_v1,
    source_and_target_are_compatible,
};
pub use mangled::{extract_v1, flatten_v1, tokenize_v1};
pub use xml::{extract_xml_v1, flatten_xml_v1, tokenize_xml};

use crate::nstr::Placeholder;
use indexmap::IndexMap;
use thiserror::Error;

/// Emitted key → enriched placeholder, in emission order
pub type PlaceholderMap = IndexMap<String, Placeholder>;

/// Errors raised while mapping wire strings back to placeholders
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A well-formed `{{...}}` token that the placeholder map does not know
    #[error("unresolved placeholder token `{{{{{0}}}}}`")]
    UnresolvedToken(String),
    /// A well-formed `<xN>` tag that the placeholder map does not know
    #[error("unresolved placeholder tag `{0}`")]
    UnresolvedTag(String),
    /// A target placeholder with no counterpart in the source
    #[error("target placeholder `{0}` has no matching source placeholder")]
    PlaceholderMismatch(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// One lexical unit of a wire string
///
/// Placeholder variants carry the raw token text: the mangled token without its
/// braces, or the XML tag name (`x3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Literal(&'a str),
    Standalone(&'a str),
    Open(&'a str),
    Close(&'a str),
}

/// Positional prefix: `a`..`y` for indices 1 to 25, `z<n>` beyond
pub(crate) fn index_prefix(index: usize) -> String {
    match index {
        1..=25 => char::from(b'a' + (index as u8 - 1)).to_string(),
        _ => format!("z{}", index),
    }
}

/// First ASCII alphanumeric/underscore run of a placeholder value, or ""
pub(crate) fn value_name(value: &str) -> &str {
    let is_name = |c: char| c.is_ascii_alphanumeric() || c == '_';
    match value.find(is_name) {
        Some(start) => {
            let rest = &value[start..];
            let end = rest.find(|c: char| !is_name(c)).unwrap_or(rest.len());
            &rest[..end]
        }
        None => "",
    }
}

/// The `v1` token of the placeholder at 1-based position `index`
pub fn mangle(index: usize, ph: &Placeholder) -> String {
    format!(
        "{}_{}_{}",
        index_prefix(index),
        ph.kind.code(),
        value_name(&ph.value)
    )
}
