//! Metrics collection for sampling runs.
//!
//! A [`MetricsCollector`] is a thread-safe registry of named values. The
//! [`Runner`](crate::runner::Runner) publishes each stage's
//! [`SampleStats`](crate::stats::SampleStats) into it at the end of a run;
//! callers can register their own [`Metric`]s alongside and export everything
//! as JSON.
//!
//! # Example
//!
//! ```no_run
//! use ironsample::metrics::{Metric, MetricsCollector};
//! use serde_json::Value;
//!
//! struct ShardCount(usize);
//!
//! impl Metric for ShardCount {
//!     fn name(&self) -> &str {
//!         "shard_count"
//!     }
//!
//!     fn value(&self) -> Value {
//!         serde_json::json!(self.0)
//!     }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = MetricsCollector::new();
//! metrics.register(Box::new(ShardCount(3)));
//! metrics.increment_counter("samples_produced", 10);
//! metrics.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A named value that can be reported.
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    fn value(&self) -> Value;

    fn description(&self) -> Option<&str> {
        None
    }
}

/// Thread-safe container for sampling metrics.
///
/// Clones share the same underlying registry.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    custom: HashMap<String, Box<dyn Metric>>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom metric, replacing any with the same name.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn register(&self, metric: Box<dyn Metric>) {
        let mut inner = self.inner.lock().unwrap();
        inner.custom.insert(metric.name().to_string(), metric);
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn record_start(&self) {
        self.inner.lock().unwrap().start_time = Some(Instant::now());
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn record_end(&self) {
        self.inner.lock().unwrap().end_time = Some(Instant::now());
    }

    /// Time between [`record_start`](Self::record_start) and
    /// [`record_end`](Self::record_end), if both were called.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.inner.lock().unwrap();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Add `value` to a counter, creating it at zero first if needed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn increment_counter(&self, name: &str, value: u64) {
        let mut inner = self.inner.lock().unwrap();
        *inner.counters.entry(name.to_string()).or_default() += value;
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_counter(&self, name: &str, value: u64) {
        self.inner
            .lock()
            .unwrap()
            .counters
            .insert(name.to_string(), value);
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.inner.lock().unwrap().counters.get(name).copied()
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.inner
            .lock()
            .unwrap()
            .gauges
            .insert(name.to_string(), value);
    }

    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.inner.lock().unwrap().gauges.get(name).copied()
    }

    /// Every metric name mapped to its current value.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        let inner = self.inner.lock().unwrap();
        let mut out: HashMap<String, Value> = inner
            .counters
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        out.extend(inner.gauges.iter().map(|(k, v)| (k.clone(), json!(v))));
        out.extend(inner.custom.iter().map(|(k, m)| (k.clone(), m.value())));
        out
    }

    /// All metrics as one JSON object, plus `execution_time_ms` when timed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut obj: Map<String, Value> = self.snapshot().into_iter().collect();
        if let Some(elapsed) = self.elapsed() {
            obj.insert("execution_time_ms".to_string(), json!(elapsed.as_millis()));
        }
        let inner = self.inner.lock().unwrap();
        for (name, metric) in &inner.custom {
            if let Some(desc) = metric.description() {
                obj.insert(
                    name.clone(),
                    json!({ "value": metric.value(), "description": desc }),
                );
            }
        }
        Value::Object(obj)
    }

    /// Emit every metric as one `info` event, sorted by name.
    pub fn log_summary(&self) {
        let mut entries: Vec<_> = self.snapshot().into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in entries {
            tracing::info!(metric = %name, %value, "sampling metric");
        }
    }

    /// Write [`to_json`](Self::to_json) to `path`, pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}

/// A fixed counter value, for registering alongside the built-in metrics.
pub struct CounterMetric {
    name: String,
    count: u64,
}

impl CounterMetric {
    pub fn with_value(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

impl Metric for CounterMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        json!(self.count)
    }
}

/// A single numeric reading with an optional description.
pub struct GaugeMetric {
    name: String,
    value: f64,
    description: Option<String>,
}

impl GaugeMetric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Metric for GaugeMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        json!(self.value)
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
