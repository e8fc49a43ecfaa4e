//! Placeholder-identity-free flattenings and source/target compatibility
//!
//! Two looser views of a normalized string, used where exact placeholder identity
//! should not matter:
//!
//! - the *ordinal* form replaces each placeholder with its kind only (`{{x}}`), so
//!   sources with the same shape share a content-index key
//! - the *mini-v1* form keeps the positional prefix and kind of each `v1` token but
//!   drops the value name, so a retranslated string still compares equal when a vendor
//!   rewrote a variable name

use super::flatten_v1;
use crate::nstr::{NormalizedString, Part, Placeholder};
use std::collections::{HashMap, HashSet};

/// Literal text with every placeholder replaced by `{{<kind>}}`
pub fn flatten_to_ordinal(nstr: &NormalizedString) -> String {
    nstr.iter()
        .map(|part| match part {
            Part::Text(text) => text.clone(),
            Part::Placeholder(ph) => format!("{{{{{}}}}}", ph.kind.code()),
        })
        .collect()
}

/// `a_x_name` → `a_x`
pub fn minify_v1(v1: &str) -> &str {
    match v1.match_indices('_').nth(1) {
        Some((end, _)) => &v1[..end],
        None => v1,
    }
}

/// Literal text with every placeholder replaced by its minified `v1`, or its value
/// when it has no `v1`
pub fn flatten_to_mini_v1(nstr: &NormalizedString) -> String {
    nstr.iter()
        .map(|part| match part {
            Part::Text(text) => text.clone(),
            Part::Placeholder(ph) => match &ph.v1 {
                Some(v1) => format!("{{{{{}}}}}", minify_v1(v1)),
                None => format!("{{{{{}}}}}", ph.value),
            },
        })
        .collect()
}

/// Resolves target placeholders against the placeholders of a source string
#[derive(Debug, Clone)]
pub struct PlaceholderMatcher {
    by_v1: HashMap<String, Placeholder>,
    values: HashSet<String>,
}

impl PlaceholderMatcher {
    pub fn new(nsrc: &NormalizedString) -> Self {
        let (_, map) = flatten_v1(nsrc);
        let values = map.values().map(|ph| ph.value.clone()).collect();
        let by_v1 = map
            .into_iter()
            .map(|(token, ph)| (minify_v1(&token).to_string(), ph))
            .collect();
        PlaceholderMatcher { by_v1, values }
    }

    /// The source placeholder with the same minified `v1`; failing that, `ph` itself
    /// when the source has a placeholder with the same value
    pub fn find<'a>(&'a self, ph: &'a Placeholder) -> Option<&'a Placeholder> {
        ph.v1
            .as_deref()
            .and_then(|v1| self.by_v1.get(minify_v1(v1)))
            .or_else(|| self.values.contains(&ph.value).then_some(ph))
    }

    pub fn matches(&self, ph: &Placeholder) -> bool {
        self.find(ph).is_some()
    }
}

/// Whether a translation can be trusted to carry the same placeholders as its source
///
/// Every target placeholder must resolve to a source placeholder and both sides must
/// hold the same number of placeholders.
pub fn source_and_target_are_compatible(nsrc: &NormalizedString, ntgt: &NormalizedString) -> bool {
    let matcher = PlaceholderMatcher::new(nsrc);
    ntgt.placeholders().all(|ph| matcher.matches(ph))
        && nsrc.placeholder_count() == ntgt.placeholder_count()
}
