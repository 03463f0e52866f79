use serde::{Deserialize, Serialize};

/// A tag stored in the shared `tag` table.
///
/// Tags are deduplicated on `(key, value)` and shared across annotations.
/// An empty `value` means the tag has no value (e.g. `outage` rather than
/// `type:outage`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub key: String,
    pub value: String,
}

/// A parsed `key[:value]` tag that has not necessarily been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagPair {
    pub key: String,
    pub value: String,
}

impl TagPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse a single tag string. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        match raw.split_once(':') {
            Some((key, value)) => Some(Self::new(key.trim(), value.trim())),
            None => Some(Self::new(raw, "")),
        }
    }
}

impl std::fmt::Display for TagPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}:{}", self.key, self.value)
        }
    }
}

/// Parse raw tag strings into an ordered, duplicate-free list of pairs.
///
/// Blank entries are skipped and the first occurrence of a pair wins.
pub fn parse_tag_pairs<S: AsRef<str>>(tags: &[S]) -> Vec<TagPair> {
    let mut pairs: Vec<TagPair> = Vec::with_capacity(tags.len());
    for tag in tags {
        if let Some(pair) = TagPair::parse(tag.as_ref())
            && !pairs.contains(&pair)
        {
            pairs.push(pair);
        }
    }
    pairs
}

/// Render tag pairs back into their string form, preserving order.
pub fn join_tag_pairs(pairs: &[TagPair]) -> Vec<String> {
    pairs.iter().map(ToString::to_string).collect()
}
