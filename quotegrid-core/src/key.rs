//! Compound keys: ordered tuples of string parts identifying a column group.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StoreError};

/// Delimiter used when a key is flattened into a single string.
pub const KEY_DELIMITER: char = '|';

/// An ordered tuple of key parts, e.g. `(account, symbol)`.
///
/// Equality, ordering and hashing are structural over the parts, so the key
/// is used directly as a map key and never re-parsed at lookup time.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompoundKey(Vec<Arc<str>>);

impl CompoundKey {
    /// Build a key from its parts. Parts must not contain [`KEY_DELIMITER`].
    pub fn new<I, S>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts = parts
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                if p.contains(KEY_DELIMITER) {
                    Err(StoreError::InvalidKeyPart {
                        part: p.to_string(),
                        delimiter: KEY_DELIMITER,
                    })
                } else {
                    Ok(Arc::from(p))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(parts))
    }

    /// Single-part key, the common case for price and FX series.
    pub fn single(part: &str) -> Result<Self> {
        Self::new([part])
    }

    /// Split a joined key back into parts.
    pub fn parse(joined: &str) -> Self {
        Self(joined.split(KEY_DELIMITER).map(Arc::from).collect())
    }

    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.as_ref())
    }

    pub fn part(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The flattened single-string form used as a lookup key in the sheet.
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(KEY_DELIMITER);
            }
            out.push_str(part);
        }
        out
    }
}

impl fmt::Display for CompoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl fmt::Debug for CompoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompoundKey({})", self.joined())
    }
}

impl Serialize for CompoundKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.joined())
    }
}

impl<'de> Deserialize<'de> for CompoundKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let joined = String::deserialize(deserializer)?;
        Ok(Self::parse(&joined))
    }
}
