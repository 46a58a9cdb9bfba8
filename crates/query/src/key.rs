//! Cache keys: ordered, hashable tuples of segments.
//!
//! A key reads like `["movies","list",{"limit":"10","page":"1"}]`. Parameter segments are
//! stored in a `BTreeMap`, so the order fields were supplied in never affects equality, and
//! fields with empty values are dropped.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Name(String),
    Id(i64),
    Params(BTreeMap<String, String>),
}

impl KeySegment {
    /// Builds a normalized parameter segment. Empty values are skipped; a repeated field
    /// keeps its last value.
    pub fn params<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v): &(String, String)| !v.is_empty())
            .collect();
        Self::Params(map)
    }
}

impl From<&str> for KeySegment {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<i64> for KeySegment {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<KeySegment>);

impl CacheKey {
    pub fn new<S: Into<KeySegment>>(root: S) -> Self {
        Self(vec![root.into()])
    }

    /// Returns this key extended by one segment.
    pub fn with<S: Into<KeySegment>>(mut self, segment: S) -> Self {
        self.0.push(segment.into());
        self
    }

    /// True when `prefix`'s segments are a leading run of this key's segments. Every key
    /// starts with itself.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name:?}"),
            Self::Id(id) => write!(f, "{id}"),
            Self::Params(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k:?}:{v:?}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]")
    }
}
