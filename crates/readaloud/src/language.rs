//! Language tags reported by speech engines.
//!
//! Engines report their synthesis inventory as raw `language[-REGION]`
//! strings; this module parses them into a typed form and folds the raw
//! list into a sorted, deduplicated set suitable for a language picker.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A parsed `language[-REGION[-variant]]` tag.
///
/// Ordering follows the canonical display form, so sorted collections of
/// languages read alphabetically ("de" < "en" < "en-US").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Language {
    language: String,
    region: Option<String>,
    variant: Option<String>,
}

impl Language {
    /// Parse a tag of the form `en`, `en-US`, or `en-US-posix`.
    ///
    /// Both `-` and `_` separators are accepted since engines are not
    /// consistent about which they report. Returns `None` for an empty
    /// tag, a tag with more than three subtags, or a tag with an empty
    /// subtag.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        let parts: Vec<&str> = tag.trim().split(['-', '_']).collect();
        if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        Some(Self {
            language: parts[0].to_ascii_lowercase(),
            region: parts.get(1).map(|r| r.to_ascii_uppercase()),
            variant: parts.get(2).map(|v| (*v).to_string()),
        })
    }

    /// The primary language subtag, lowercased (e.g. `"en"`).
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The region subtag, uppercased (e.g. `"US"`), if present.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// The variant subtag, if present.
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.language)?;
        if let Some(region) = &self.region {
            write!(f, "-{region}")?;
        }
        if let Some(variant) = &self.variant {
            write!(f, "-{variant}")?;
        }
        Ok(())
    }
}

/// Fold an engine-reported tag list into a sorted, deduplicated set.
///
/// Unparseable entries are skipped — engine inventories routinely contain
/// malformed or internal identifiers, and one bad tag must not hide the
/// rest of the list.
pub fn supported_languages<I, S>(tags: I) -> Vec<Language>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: BTreeSet<Language> = tags
        .into_iter()
        .filter_map(|tag| Language::parse(tag.as_ref()))
        .collect();

    set.into_iter().collect()
}
