//! Canonical metric values and the per-cycle output map.

use std::collections::btree_map::{self, BTreeMap};

use serde::Serialize;

use crate::classify::{ClassifiedMetric, KeySlot};

/// A published value: integer readings or free-form text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Text(String),
}

impl MetricValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Truncate toward zero. NaN maps to 0 and infinities saturate.
pub fn truncate(value: f32) -> i64 {
    value.trunc() as i64
}

/// Output of one decode cycle, keyed by canonical metric name.
///
/// Ordered so that published payloads and log lines are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetricMap(BTreeMap<String, MetricValue>);

impl MetricMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.0.get(key)
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(MetricValue::as_integer)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MetricValue> {
        self.0.iter()
    }

    /// Insert, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Insert only if the key is not present yet. Returns whether it was.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> bool {
        match self.0.entry(key.into()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Merge a classifier result.
    ///
    /// Per-device keys are replaced by later entries. Aggregate aliases and
    /// raw fallback keys keep the first value seen in the cycle.
    pub fn apply(&mut self, metric: ClassifiedMetric) {
        match metric.slot {
            KeySlot::Device => self.set(metric.key, metric.value),
            KeySlot::Aggregate | KeySlot::Fallback => {
                self.set_if_absent(metric.key, metric.value);
            }
        }
    }

    /// Merge another map into this one; `other` wins on conflicts.
    pub fn merge(&mut self, other: MetricMap) {
        self.0.extend(other.0);
    }
}

impl IntoIterator for MetricMap {
    type Item = (String, MetricValue);
    type IntoIter = btree_map::IntoIter<String, MetricValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MetricMap {
    type Item = (&'a String, &'a MetricValue);
    type IntoIter = btree_map::Iter<'a, String, MetricValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, MetricValue)> for MetricMap {
    fn from_iter<I: IntoIterator<Item = (String, MetricValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
