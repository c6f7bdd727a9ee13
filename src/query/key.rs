//! Cache keys: ordered tuples of strings and integers.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// One element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum KeySegment {
  Str(String),
  Int(i64),
}

impl From<&str> for KeySegment {
  fn from(s: &str) -> Self {
    KeySegment::Str(s.to_string())
  }
}

impl From<String> for KeySegment {
  fn from(s: String) -> Self {
    KeySegment::Str(s)
  }
}

impl From<i64> for KeySegment {
  fn from(n: i64) -> Self {
    KeySegment::Int(n)
  }
}

impl From<i32> for KeySegment {
  fn from(n: i32) -> Self {
    KeySegment::Int(n.into())
  }
}

impl From<u32> for KeySegment {
  fn from(n: u32) -> Self {
    KeySegment::Int(n.into())
  }
}

impl From<&KeySegment> for Value {
  fn from(segment: &KeySegment) -> Self {
    match segment {
      KeySegment::Str(s) => Value::String(s.clone()),
      KeySegment::Int(n) => Value::from(*n),
    }
  }
}

/// Identifies one logical resource and its parameters,
/// e.g. `["stock", "data", 6]`.
///
/// Two keys address the same cache entry when their serialized forms are
/// equal, so `["orders", 6]` and `["orders", "6"]` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
  pub fn from_segments(segments: Vec<KeySegment>) -> Self {
    Self(segments)
  }

  /// Append a segment, returning the extended key.
  pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
    self.0.push(segment.into());
    self
  }

  pub fn segments(&self) -> &[KeySegment] {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Serialized form used as the store's lookup key.
  pub fn hash(&self) -> String {
    Value::Array(self.0.iter().map(Value::from).collect()).to_string()
  }

  /// True when `prefix`'s segments are the leading segments of this key.
  /// The empty key is a prefix of every key.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.hash())
  }
}

/// Build a [`QueryKey`] from a list of strings and integers.
///
/// ```
/// use abattoir_dash::query_key;
///
/// let key = query_key!["stock", "data", 6];
/// assert_eq!(key.hash(), r#"["stock","data",6]"#);
/// ```
#[macro_export]
macro_rules! query_key {
  ($($segment:expr),* $(,)?) => {
    $crate::query::QueryKey::from_segments(vec![
      $($crate::query::KeySegment::from($segment)),*
    ])
  };
}
