use std::fmt;

/// A single key/value label attached to a metric observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    /// Create a new tag
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Ordered set of tags with unique keys.
///
/// Tags are kept sorted by key so that two sets with the same content compare
/// (and hash) equal regardless of insertion order. Adding a tag whose key is
/// already present replaces the previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tags {
    tags: Vec<Tag>,
}

impl Tags {
    /// Create an empty tag set
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a tag set from key/value pairs
    #[must_use]
    pub fn of<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .fold(Self::empty(), |tags, (key, value)| tags.and(key, value))
    }

    /// Return a tag set with `key=value` added (or replaced)
    #[must_use]
    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(Tag::new(key, value));
        self
    }

    fn insert(&mut self, tag: Tag) {
        match self
            .tags
            .binary_search_by(|probe| probe.key.as_str().cmp(tag.key.as_str()))
        {
            Ok(pos) => self.tags[pos] = tag,
            Err(pos) => self.tags.insert(pos, tag),
        }
    }

    /// Value for `key`, if present
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|probe| probe.key.as_str().cmp(key))
            .ok()
            .map(|pos| self.tags[pos].value.as_str())
    }

    /// True if every `(key, value)` pair in `expected` is present
    #[must_use]
    pub fn contains_all(&self, expected: &[(&str, &str)]) -> bool {
        expected
            .iter()
            .all(|(key, value)| self.get(key) == Some(*value))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<'a> IntoIterator for &'a Tags {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut tags = Self::empty();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}
