//! Meter registry seam and timer samples
//!
//! The interceptor does not own a metrics backend. It talks to a
//! [`MeterRegistry`], which receives one finished observation per exchange:
//! the timer identity, the derived tags and the elapsed wall-clock time.
//!
//! [`SimpleMeterRegistry`] keeps aggregated timers in memory and is what tests
//! and exporter-less hosts use. With the `otel` feature,
//! [`crate::otel::OtelMeterRegistry`] forwards observations to an
//! OpenTelemetry histogram.

use crate::error::MetricsError;
use crate::tags::Tags;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identity of a timer metric: name plus human-readable description
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerId {
    name: String,
    description: Option<String>,
}

impl TimerId {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Destination for timer observations.
///
/// Implementations must be thread-safe: one registry is shared by every
/// exchange going through an interceptor, from any number of threads.
pub trait MeterRegistry: Send + Sync {
    /// Clock used to start and stop timer samples
    fn now(&self) -> Instant {
        Instant::now()
    }

    /// Record one observation of `timer` with the given tags.
    ///
    /// # Errors
    /// Returns `MetricsError::Registry` if the backend refuses the observation.
    fn record(&self, timer: &TimerId, tags: &Tags, elapsed: Duration) -> Result<(), MetricsError>;
}

/// A started-but-not-yet-recorded measurement.
///
/// Dropping a sample without calling [`TimerSample::stop`] records nothing.
pub struct TimerSample {
    registry: Arc<dyn MeterRegistry>,
    started: Instant,
}

impl TimerSample {
    /// Start a sample using the registry's clock
    #[must_use]
    pub fn start(registry: Arc<dyn MeterRegistry>) -> Self {
        let started = registry.now();
        Self { registry, started }
    }

    /// Stop the sample and record one observation.
    ///
    /// Returns the recorded duration.
    ///
    /// # Errors
    /// Propagates the registry's error if the observation could not be recorded.
    pub fn stop(self, timer: &TimerId, tags: &Tags) -> Result<Duration, MetricsError> {
        let elapsed = self.registry.now().saturating_duration_since(self.started);
        self.registry.record(timer, tags, elapsed)?;
        Ok(elapsed)
    }
}

/// Aggregated view of one timer series (name + tag set)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub name: String,
    pub description: Option<String>,
    pub tags: Tags,
    /// Number of recorded observations
    pub count: u64,
    /// Sum of all recorded durations
    pub total_time: Duration,
    /// Longest recorded duration
    pub max: Duration,
}

#[derive(Debug, Clone, Default)]
struct TimerStats {
    description: Option<String>,
    count: u64,
    total_time: Duration,
    max: Duration,
}

/// In-memory meter registry.
///
/// Each distinct `(name, tags)` pair is its own series. Recording never fails.
#[derive(Debug, Default)]
pub struct SimpleMeterRegistry {
    timers: DashMap<(String, Tags), TimerStats>,
}

impl SimpleMeterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All series recorded under `name`
    #[must_use]
    pub fn find(&self, name: &str) -> Vec<TimerSnapshot> {
        self.timers
            .iter()
            .filter(|entry| entry.key().0 == name)
            .map(|entry| {
                let ((name, tags), stats) = entry.pair();
                TimerSnapshot {
                    name: name.clone(),
                    description: stats.description.clone(),
                    tags: tags.clone(),
                    count: stats.count,
                    total_time: stats.total_time,
                    max: stats.max,
                }
            })
            .collect()
    }

    /// First series under `name` whose tags include every pair in `tags`
    #[must_use]
    pub fn timer(&self, name: &str, tags: &[(&str, &str)]) -> Option<TimerSnapshot> {
        self.find(name)
            .into_iter()
            .find(|snapshot| snapshot.tags.contains_all(tags))
    }

    /// Total observation count across every series under `name`
    #[must_use]
    pub fn count(&self, name: &str) -> u64 {
        self.find(name).iter().map(|snapshot| snapshot.count).sum()
    }

    pub fn clear(&self) {
        self.timers.clear();
    }
}

impl MeterRegistry for SimpleMeterRegistry {
    fn record(&self, timer: &TimerId, tags: &Tags, elapsed: Duration) -> Result<(), MetricsError> {
        let mut stats = self
            .timers
            .entry((timer.name().to_owned(), tags.clone()))
            .or_insert_with(|| TimerStats {
                description: timer.description.clone(),
                ..TimerStats::default()
            });
        stats.count += 1;
        stats.total_time = stats.total_time.saturating_add(elapsed);
        stats.max = stats.max.max(elapsed);
        Ok(())
    }
}
