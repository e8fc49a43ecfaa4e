//! Structured translator notes
//!
//! Free-text notes may embed annotations that are pulled out into a structured record:
//!
//! - `PH(name|sample)` or `PH(name|sample|description)` documents a placeholder
//! - `MAXWIDTH(n)` declares a display width limit
//! - `SCREENSHOT(ref)` attaches a visual reference
//!
//! Annotations are removed from the visible description.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"PH\((?P<ph_name>[^)|]+)\|(?P<ph_sample>[^)|]+)(?:\|(?P<ph_desc>[^)|]+))?\)|MAXWIDTH\((?P<max_width>\d+)\)|SCREENSHOT\((?P<screenshot>[^)]+)\)",
    )
    .unwrap()
});

/// Sample and description of one named placeholder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhNote {
    pub sample: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// Notes attached to a translation unit
///
/// Deserializes from either a plain note string (annotations are extracted) or the
/// structured object form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "NotesRepr")]
pub struct Notes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ph: BTreeMap<String, PhNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NotesRepr {
    Text(String),
    Structured {
        #[serde(default)]
        desc: Option<String>,
        #[serde(default)]
        ph: BTreeMap<String, PhNote>,
        #[serde(default, rename = "maxWidth")]
        max_width: Option<u32>,
        #[serde(default)]
        screenshot: Option<String>,
    },
}

impl From<NotesRepr> for Notes {
    fn from(repr: NotesRepr) -> Self {
        match repr {
            NotesRepr::Text(text) => extract_structured_notes(&text),
            NotesRepr::Structured {
                desc,
                ph,
                max_width,
                screenshot,
            } => Notes {
                desc,
                ph,
                max_width,
                screenshot,
            },
        }
    }
}

impl From<&str> for Notes {
    fn from(text: &str) -> Self {
        extract_structured_notes(text)
    }
}

/// Strip annotations from a free-text note and collect them
///
/// A repeated `MAXWIDTH` or `SCREENSHOT` keeps the last one; a repeated `PH` name keeps
/// the last declaration.
pub fn extract_structured_notes(text: &str) -> Notes {
    let mut notes = Notes::default();
    let desc = ANNOTATION.replace_all(text, |caps: &Captures<'_>| {
        if let Some(width) = caps.name("max_width") {
            // out-of-range widths are dropped, the annotation is still stripped
            notes.max_width = width.as_str().parse().ok();
        } else if let (Some(name), Some(sample)) = (caps.name("ph_name"), caps.name("ph_sample")) {
            notes.ph.insert(
                name.as_str().to_string(),
                PhNote {
                    sample: sample.as_str().to_string(),
                    desc: caps.name("ph_desc").map(|d| d.as_str().to_string()),
                },
            );
        } else if let Some(screenshot) = caps.name("screenshot") {
            notes.screenshot = Some(screenshot.as_str().to_string());
        }
        ""
    });
    notes.desc = Some(desc.into_owned());
    notes
}
