//! Configuration types for the render core.
//!
//! This module defines the service-wide [`RenderConfig`] (every tunable
//! constant lives here) and the per-call [`RenderOptions`] and
//! [`ContainerOptions`].
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;

/// Service-wide configuration.
///
/// Durations are (de)serialized as whole milliseconds, and missing fields fall
/// back to their defaults so a host can supply only what it wants to change.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use mathrender::RenderConfig;
///
/// let config = RenderConfig::new()
///     .with_batch_size(8)
///     .with_batch_delay(Duration::from_millis(16))
///     .with_max_attempts(2);
/// assert_eq!(config.batch_size, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Elements dispatched together before yielding
    pub batch_size: usize,
    /// Pause between two batches
    #[serde(with = "duration_ms")]
    pub batch_delay: Duration,
    /// Attempts for a single `render_element` call
    pub max_attempts: u32,
    /// Attempts for each element rendered as part of a container
    pub container_max_attempts: u32,
    /// Backoff unit; attempt `n` waits `retry_base_delay * n`
    #[serde(with = "duration_ms")]
    pub retry_base_delay: Duration,
    /// How long to wait for an element to join a live tree
    #[serde(with = "duration_ms")]
    pub attach_timeout: Duration,
    /// How long a single typesetting call may take
    #[serde(with = "duration_ms")]
    pub backend_timeout: Duration,
    /// How long a backend may take to load its resources
    #[serde(with = "duration_ms")]
    pub load_timeout: Duration,
    /// Distance around the viewport at which lazily observed elements render
    pub lazy_margin: f64,
    /// Global switch for the render cache
    pub cache_enabled: bool,
    /// Degraded rendering used once every attempt failed
    pub fallback_strategy: FallbackStrategy,
    /// Class names that make an element renderable with its text as source
    pub render_classes: Vec<String>,
    /// Performance monitor thresholds
    pub monitor: MonitorConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(50),
            max_attempts: 3,
            container_max_attempts: 2,
            retry_base_delay: Duration::from_millis(100),
            attach_timeout: Duration::from_secs(2),
            backend_timeout: Duration::from_secs(5),
            load_timeout: Duration::from_secs(10),
            lazy_margin: 200.0,
            cache_enabled: true,
            fallback_strategy: FallbackStrategy::PlainText,
            render_classes: vec!["math-content".to_string()],
            monitor: MonitorConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Create a new `RenderConfig` with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of elements dispatched per batch (minimum 1).
    #[inline]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the pause between batches.
    #[inline]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Set the attempt budget of `render_element` (minimum 1).
    #[inline]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the attempt budget of elements rendered through a container (minimum 1).
    #[inline]
    pub fn with_container_max_attempts(mut self, attempts: u32) -> Self {
        self.container_max_attempts = attempts.max(1);
        self
    }

    /// Set the retry backoff unit.
    #[inline]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the attachment wait deadline.
    #[inline]
    pub fn with_attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }

    /// Set the per-call typesetting deadline.
    #[inline]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Set the backend load deadline.
    #[inline]
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Set the lazy-visibility margin.
    #[inline]
    pub fn with_lazy_margin(mut self, margin: f64) -> Self {
        self.lazy_margin = margin.max(0.0);
        self
    }

    /// Enable or disable the render cache.
    #[inline]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the default fallback strategy.
    #[inline]
    pub fn with_fallback_strategy(mut self, strategy: FallbackStrategy) -> Self {
        self.fallback_strategy = strategy;
        self
    }

    /// Replace the class names that mark renderable elements.
    #[inline]
    pub fn with_render_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.render_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the monitor thresholds.
    #[inline]
    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }
}

/// Thresholds and window sizes of the performance monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Render duration samples kept
    pub duration_window: usize,
    /// Memory samples kept
    pub memory_window: usize,
    /// Frame-rate samples kept
    pub fps_window: usize,
    /// Renders slower than this raise a slow-render alert
    #[serde(with = "duration_ms")]
    pub slow_render: Duration,
    /// Extra slow-render allowance granted per complexity point
    #[serde(with = "duration_ms")]
    pub complexity_allowance: Duration,
    /// Renders slower than this trigger emergency degradation
    #[serde(with = "duration_ms")]
    pub critical_render: Duration,
    /// Memory usage above this raises an alert
    pub memory_cap_bytes: u64,
    /// Frame rates below this raise an alert
    pub fps_floor: f64,
    /// Failure ratio above this (within `error_window`) raises an alert
    pub error_rate_cap: f64,
    /// Trailing window for the error ratio
    #[serde(with = "duration_ms")]
    pub error_window: Duration,
    /// Outcomes required in the trailing window before the error ratio is judged
    pub error_min_samples: usize,
    /// Consecutive fast renders needed to leave degraded mode
    pub recovery_streak: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            duration_window: 100,
            memory_window: 60,
            fps_window: 60,
            slow_render: Duration::from_millis(500),
            complexity_allowance: Duration::from_millis(25),
            critical_render: Duration::from_millis(3000),
            memory_cap_bytes: 200 * 1024 * 1024,
            fps_floor: 30.0,
            error_rate_cap: 0.25,
            error_window: Duration::from_secs(30),
            error_min_samples: 4,
            recovery_streak: 10,
        }
    }
}

impl MonitorConfig {
    /// Create a new `MonitorConfig` with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slow and critical render cutoffs.
    #[inline]
    pub fn with_render_cutoffs(mut self, slow: Duration, critical: Duration) -> Self {
        self.slow_render = slow;
        self.critical_render = critical.max(slow);
        self
    }

    /// Set the memory cap in bytes.
    #[inline]
    pub fn with_memory_cap(mut self, bytes: u64) -> Self {
        self.memory_cap_bytes = bytes;
        self
    }

    /// Set the frame-rate floor.
    #[inline]
    pub fn with_fps_floor(mut self, fps: f64) -> Self {
        self.fps_floor = fps;
        self
    }

    /// Set the error-rate cap and its trailing window.
    #[inline]
    pub fn with_error_rate(mut self, cap: f64, window: Duration) -> Self {
        self.error_rate_cap = cap;
        self.error_window = window;
        self
    }

    /// Set how many consecutive fast renders end degraded mode.
    #[inline]
    pub fn with_recovery_streak(mut self, streak: usize) -> Self {
        self.recovery_streak = streak.max(1);
        self
    }
}

/// Degraded rendering applied once every backend attempt has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackStrategy {
    /// Stripped, escaped text with Unicode super/subscripts.
    #[default]
    PlainText,
    /// `<sup>`/`<sub>` markup with fractions written as a slash.
    SimplifiedHtml,
}

/// Options of a single render request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    /// Block (display) layout instead of inline
    pub display_mode: bool,
    /// Backend to use instead of the classifier's choice
    pub preferred_backend: Option<BackendKind>,
    /// Skip cache lookup and population
    pub no_cache: bool,
    /// Override of the configured fallback strategy
    pub fallback_strategy: Option<FallbackStrategy>,
    /// Override of the configured attempt budget
    pub max_attempts: Option<u32>,
    /// Override of the configured per-call typesetting deadline
    pub deadline: Option<Duration>,
}

impl RenderOptions {
    /// Create a new `RenderOptions` with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Render in display (block) mode.
    #[inline]
    pub fn with_display_mode(mut self, display: bool) -> Self {
        self.display_mode = display;
        self
    }

    /// Prefer a specific backend.
    #[inline]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.preferred_backend = Some(backend);
        self
    }

    /// Opt out of the render cache.
    #[inline]
    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    /// Choose the fallback strategy.
    #[inline]
    pub fn with_fallback(mut self, strategy: FallbackStrategy) -> Self {
        self.fallback_strategy = Some(strategy);
        self
    }

    /// Choose the attempt budget (minimum 1).
    #[inline]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Choose the per-call typesetting deadline.
    #[inline]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Options folded into the cache fingerprint.
    ///
    /// Only fields that change the produced markup take part.
    pub(crate) fn fingerprint_key(&self) -> String {
        let backend = self.preferred_backend.map(BackendKind::name).unwrap_or("auto");
        format!("display={};backend={}", self.display_mode, backend)
    }
}

/// Progress callback invoked after each batch with `(processed, total)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Options of a container render.
#[derive(Clone, Default)]
pub struct ContainerOptions {
    /// Options applied to every element of the container
    pub render: RenderOptions,
    /// Override of the configured batch size
    pub batch_size: Option<usize>,
    /// Called after every batch
    pub on_progress: Option<ProgressCallback>,
    /// Defer off-screen elements to the visibility gate
    pub lazy_load: bool,
}

impl fmt::Debug for ContainerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerOptions")
            .field("render", &self.render)
            .field("batch_size", &self.batch_size)
            .field("on_progress", &self.on_progress.is_some())
            .field("lazy_load", &self.lazy_load)
            .finish()
    }
}

impl ContainerOptions {
    /// Create a new `ContainerOptions` with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-element render options.
    #[inline]
    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    /// Set the batch size (minimum 1).
    #[inline]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size.max(1));
        self
    }

    /// Set the per-element attempt budget.
    #[inline]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.render.max_attempts = Some(attempts.max(1));
        self
    }

    /// Register a progress callback.
    #[inline]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Defer rendering through the visibility gate.
    #[inline]
    pub fn with_lazy_load(mut self, lazy: bool) -> Self {
        self.lazy_load = lazy;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_builder() {
        let config = RenderConfig::new()
            .with_batch_size(0)
            .with_max_attempts(4)
            .with_cache(false)
            .with_render_classes(["step-notation", "math-content"]);

        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_attempts, 4);
        assert!(!config.cache_enabled);
        assert_eq!(config.render_classes, vec!["step-notation", "math-content"]);
    }

    #[test]
    fn test_render_config_default() {
        let config = RenderConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.batch_delay, Duration::from_millis(50));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.container_max_attempts, 2);
        assert_eq!(config.fallback_strategy, FallbackStrategy::PlainText);
    }

    #[test]
    fn test_render_config_partial_json() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"batch_size": 7, "batch_delay": 20, "fallback_strategy": "simplified-html"}"#)
                .unwrap();
        assert_eq!(config.batch_size, 7);
        assert_eq!(config.batch_delay, Duration::from_millis(20));
        assert_eq!(config.fallback_strategy, FallbackStrategy::SimplifiedHtml);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.monitor, MonitorConfig::default());
    }

    #[test]
    fn test_fingerprint_key_ignores_retry_settings() {
        let a = RenderOptions::new().with_max_attempts(1);
        let b = RenderOptions::new().with_max_attempts(5);
        assert_eq!(a.fingerprint_key(), b.fingerprint_key());
        let c = RenderOptions::new().with_display_mode(true);
        assert_ne!(a.fingerprint_key(), c.fingerprint_key());
    }

    #[test]
    fn test_container_options_builder() {
        let options = ContainerOptions::new()
            .with_batch_size(3)
            .with_max_attempts(2)
            .with_lazy_load(true)
            .with_progress(|_, _| {});
        assert_eq!(options.batch_size, Some(3));
        assert_eq!(options.render.max_attempts, Some(2));
        assert!(options.lazy_load);
        assert!(options.on_progress.is_some());
    }
}
