//! Destinations for decoded metrics.
//!
//! The poller hands every non-empty [`MetricMap`] to a [`MetricSink`].
//! [`VariableStore`] is the in-process key/value store: each key holds a
//! typed variable that is replaced on every publish and never written to
//! disk. [`TracingSink`] writes every published metric to the log.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use gputap_core::metrics::{MetricMap, MetricValue};
use serde::Serialize;

/// Receives one map per producer per poll cycle.
pub trait MetricSink: Send + Sync {
    fn publish(&self, metrics: &MetricMap);
}

impl<S: MetricSink + ?Sized> MetricSink for Arc<S> {
    fn publish(&self, metrics: &MetricMap) {
        (**self).publish(metrics)
    }
}

/// Publish to both sinks, left first.
impl<A: MetricSink, B: MetricSink> MetricSink for (A, B) {
    fn publish(&self, metrics: &MetricMap) {
        self.0.publish(metrics);
        self.1.publish(metrics);
    }
}

/// Logs each published metric as a structured `trace` event, plus one
/// `debug` summary per map.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricSink for TracingSink {
    fn publish(&self, metrics: &MetricMap) {
        for (name, value) in metrics {
            match value {
                MetricValue::Integer(v) => tracing::trace!(metric = %name, value = *v, "Metric"),
                MetricValue::Text(v) => tracing::trace!(metric = %name, value = %v, "Metric"),
            }
        }
        tracing::debug!(count = metrics.len(), "Metrics published");
    }
}

/// Type tag of a stored variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Integer,
    String,
}

impl VariableType {
    pub fn of(value: &MetricValue) -> Self {
        match value {
            MetricValue::Integer(_) => Self::Integer,
            MetricValue::Text(_) => Self::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    pub value: MetricValue,
    pub variable_type: VariableType,
}

/// Shared, cloneable variable table.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    inner: Arc<RwLock<HashMap<String, Variable>>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing any previous value and type.
    pub fn set_value(&self, name: &str, value: MetricValue) {
        let variable = Variable {
            variable_type: VariableType::of(&value),
            value,
        };
        let mut vars = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        vars.insert(name.to_owned(), variable);
    }

    pub fn get(&self, name: &str) -> Option<Variable> {
        let vars = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        vars.get(name).cloned()
    }

    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.value.as_integer())
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every current value.
    pub fn snapshot(&self) -> MetricMap {
        let vars = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        vars.iter()
            .map(|(name, var)| (name.clone(), var.value.clone()))
            .collect()
    }
}

impl MetricSink for VariableStore {
    fn publish(&self, metrics: &MetricMap) {
        for (name, value) in metrics {
            tracing::trace!(variable = %name, ?value, "Set variable");
            self.set_value(name, value.clone());
        }
    }
}
