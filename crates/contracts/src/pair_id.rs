//! PairId - Cheap-to-clone currency-pair identifier
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Currency-pair identifier with cheap cloning.
///
/// Pairs are created once (at the feed boundary or in configuration) and then
/// cloned on every fan-out leg and every conflation slot, so the identifier is
/// an `Arc<str>` newtype: cloning only bumps a reference count.
///
/// # Examples
/// ```
/// use contracts::PairId;
///
/// let pair: PairId = "EURUSD".into();
/// let leg = pair.clone();  // O(1)
/// assert_eq!(pair, leg);
/// assert_eq!(pair.as_str(), "EURUSD");
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PairId(Arc<str>);

impl PairId {
    /// Create a new PairId from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for PairId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PairId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets a HashMap<PairId, _> be probed with a plain &str.
impl Borrow<str> for PairId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PairId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for PairId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairId({:?})", self.0)
    }
}

impl PartialEq<str> for PairId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for PairId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

// Must hash identically to str so Borrow<str> lookups work.
impl Hash for PairId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for PairId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PairId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
