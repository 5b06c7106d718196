//! Domain types for groups and policies.
//!
//! Tag maps are `BTreeMap`s so that log output and test assertions see
//! keys in a stable order.

use std::collections::BTreeMap;
use std::fmt;

/// Tag key → tag value attached to a group by its provider.
pub type Metadata = BTreeMap<String, String>;

/// Tag key → required value. Every entry must be present in a group's
/// [`Metadata`] for a policy to apply to it.
pub type Filters = BTreeMap<String, String>;

/// Which provider family a group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// The provider runs scaling policies natively.
    Delegated,
    /// The provider only offers raw scale-up/scale-down primitives.
    SelfManaged,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Delegated => f.write_str("delegated"),
            ProviderKind::SelfManaged => f.write_str("self_managed"),
        }
    }
}

/// Min/desired/max instance counts of a group as last reported by the
/// provider.
///
/// `min <= desired <= max` is expected but not enforced: providers may
/// report inconsistent values while a change is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

impl Capacity {
    pub fn new(min: u32, desired: u32, max: u32) -> Self {
        Self { min, desired, max }
    }

    pub fn is_at_max(&self) -> bool {
        self.desired == self.max
    }

    pub fn is_at_min(&self) -> bool {
        self.desired == self.min
    }
}

/// Build a tag map from string pairs. Later duplicates win.
pub fn tag_map<I, K, V>(pairs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// True iff every filter entry is present with an equal value in
/// `metadata`. Extra metadata keys are ignored; an empty filter set
/// matches every group.
pub fn filters_match(filters: &Filters, metadata: &Metadata) -> bool {
    filters
        .iter()
        .all(|(key, value)| metadata.get(key) == Some(value))
}
