//! Tag model for cost and ownership metadata
//!
//! Tags are the only persistence mechanism this crate has: everything the
//! registry later reconstructs must be encoded here at launch time.

use serde::{Deserialize, Serialize};

/// Marks an instance as subject to cost accounting.
pub const PRICE_TRACKING_KEY: &str = "PriceTracking";
pub const PRICE_TRACKING_VALUE: &str = "On";

/// Declared runtime bound in minutes, stringified.
pub const TIMEOUT_KEY: &str = "Timeout";

/// Timeout recorded when the caller supplies no duration.
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 20;

pub const GROUP_KEY: &str = "group";
pub const ANALYSIS_KEY: &str = "analysis";
pub const JOB_KEY: &str = "job";

/// A single key/value label on a cloud resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An ordered set of tags, assembled once at launch and never mutated after
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the tag set for a job launch.
    ///
    /// Order is fixed: `PriceTracking`, `Timeout`, then `group`, `analysis`,
    /// `job` — the optional keys appended only when the input is non-empty.
    /// An absent input omits the key entirely rather than writing an empty
    /// value; tag presence itself is meaningful to the registry.
    pub fn for_job(
        duration: Option<u32>,
        group: Option<&str>,
        analysis: Option<&str>,
        job: Option<&str>,
    ) -> Self {
        let timeout = duration.unwrap_or(DEFAULT_TIMEOUT_MINUTES);

        let mut set = Self::new();
        set.push(PRICE_TRACKING_KEY, PRICE_TRACKING_VALUE);
        set.push(TIMEOUT_KEY, timeout.to_string());
        set.push_opt(GROUP_KEY, group);
        set.push_opt(ANALYSIS_KEY, analysis);
        set.push_opt(JOB_KEY, job);
        set
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.push(Tag::new(key, value));
    }

    /// Append the pair only when the value is present and non-empty
    pub fn push_opt(&mut self, key: &str, value: Option<&str>) {
        if let Some(v) = value {
            if !v.is_empty() {
                self.push(key, v);
            }
        }
    }

    /// Overwrite the value under `key`, or append the pair.
    ///
    /// Concurrent taggers race last-write-wins per key; overwriting keeps
    /// the key's original position.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        match self.tags.iter().position(|t| t.key == key) {
            Some(i) => self.tags[i].value = value.into(),
            None => self.push(key, value),
        }
    }

    /// First value recorded under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.tags
    }
}

impl From<Vec<Tag>> for TagSet {
    fn from(tags: Vec<Tag>) -> Self {
        Self { tags }
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}
