//! Render performance monitoring.
//!
//! The monitor keeps counters and rolling windows of render durations,
//! memory samples and frame-rate samples, and raises an [`Alert`] whenever a
//! configured threshold is crossed. A critical render additionally switches
//! the monitor into degraded mode and notifies the emergency listeners; the
//! mode is left again after a streak of healthy renders.
//!
//! Monitoring is advisory: recording never blocks or fails a render.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::common::Error;
use crate::config::MonitorConfig;
use crate::events::{Observers, SubscriptionId};

mod alert;
mod metrics;
pub mod window;

pub use alert::{Alert, AlertKind, Severity};
pub use metrics::MetricsSnapshot;
use metrics::Counters;
use window::RollingWindow;

/// Something worth counting.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A backend rendered the element
    Success { duration: Duration, complexity: u32 },
    /// The element needed the fallback
    Failure { error: Option<Error> },
    CacheHit,
    CacheMiss,
}

type Raised = SmallVec<[Alert; 2]>;

struct State {
    counters: Counters,
    memory: RollingWindow<f64>,
    fps: RollingWindow<f64>,
    outcomes: VecDeque<(Instant, bool)>,
    error_alerting: bool,
    memory_alerting: bool,
    fps_alerting: bool,
    healthy_streak: usize,
}

impl State {
    fn new(config: &MonitorConfig) -> Self {
        Self {
            counters: Counters::new(config.duration_window),
            memory: RollingWindow::new(config.memory_window),
            fps: RollingWindow::new(config.fps_window),
            outcomes: VecDeque::new(),
            error_alerting: false,
            memory_alerting: false,
            fps_alerting: false,
            healthy_streak: 0,
        }
    }
}

/// Performance monitor shared by every render of a service.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    state: Mutex<State>,
    degraded: AtomicBool,
    alerts: Observers<Alert>,
    emergency: Observers<Alert>,
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("degraded", &self.is_degraded())
            .field("metrics", &self.snapshot())
            .finish()
    }
}

/// Keeps a render counted as active while alive.
pub struct ActiveRender<'a> {
    monitor: &'a PerformanceMonitor,
}

impl Drop for ActiveRender<'_> {
    fn drop(&mut self) {
        let mut state = self.monitor.state.lock();
        state.counters.active = state.counters.active.saturating_sub(1);
    }
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            state: Mutex::new(State::new(&config)),
            config,
            degraded: AtomicBool::new(false),
            alerts: Observers::new(),
            emergency: Observers::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Count one render event, raising alerts for crossed thresholds.
    ///
    /// Returns the alerts raised by this event, after they were delivered.
    pub fn record(&self, event: MonitorEvent) -> Vec<Alert> {
        let raised = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let mut raised = Raised::new();
            match event {
                MonitorEvent::Success {
                    duration,
                    complexity,
                } => {
                    state.counters.total += 1;
                    state.counters.successes += 1;
                    state.counters.durations.push(duration.as_secs_f64() * 1000.0);
                    self.push_outcome(&mut state, now, true, &mut raised);
                    if let Some(alert) = self.duration_alert(duration, complexity) {
                        raised.push(alert);
                    }
                    self.track_recovery(&mut state, raised.is_empty());
                },
                MonitorEvent::Failure { .. } => {
                    state.counters.total += 1;
                    state.counters.failures += 1;
                    self.push_outcome(&mut state, now, false, &mut raised);
                    state.healthy_streak = 0;
                },
                MonitorEvent::CacheHit => {
                    state.counters.total += 1;
                    state.counters.successes += 1;
                    state.counters.cache_hits += 1;
                },
                MonitorEvent::CacheMiss => state.counters.cache_misses += 1,
            }
            raised
        };
        self.dispatch(raised)
    }

    /// Count retries made by one render.
    pub fn record_retries(&self, retries: u32) {
        self.state.lock().counters.retries += u64::from(retries);
    }

    /// Record a heap usage sample in bytes.
    pub fn record_memory_sample(&self, bytes: u64) -> Vec<Alert> {
        let raised = {
            let mut state = self.state.lock();
            state.memory.push(bytes as f64);
            let over = bytes > self.config.memory_cap_bytes;
            let mut raised = Raised::new();
            if over && !state.memory_alerting {
                raised.push(Alert::new(
                    AlertKind::HighMemory,
                    bytes as f64,
                    self.config.memory_cap_bytes as f64,
                ));
            }
            state.memory_alerting = over;
            raised
        };
        self.dispatch(raised)
    }

    /// Record a frames-per-second sample.
    pub fn record_frame_sample(&self, fps: f64) -> Vec<Alert> {
        let raised = {
            let mut state = self.state.lock();
            state.fps.push(fps);
            let under = fps < self.config.fps_floor;
            let mut raised = Raised::new();
            if under && !state.fps_alerting {
                raised.push(Alert::new(AlertKind::LowFrameRate, fps, self.config.fps_floor));
            }
            state.fps_alerting = under;
            raised
        };
        self.dispatch(raised)
    }

    /// Mark a render as started; it stays active until the guard drops.
    pub fn track_active(&self) -> ActiveRender<'_> {
        self.state.lock().counters.active += 1;
        ActiveRender { monitor: self }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().counters.snapshot()
    }

    /// Mean of the recorded memory and frame-rate windows.
    pub fn resource_averages(&self) -> (f64, f64) {
        let state = self.state.lock();
        (state.memory.average(), state.fps.average())
    }

    /// Whether renders should be forced onto the cheapest backend.
    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn subscribe_alerts<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        self.alerts.subscribe(listener)
    }

    pub fn unsubscribe_alerts(&self, id: SubscriptionId) -> bool {
        self.alerts.unsubscribe(id)
    }

    /// Register the action run when a critical alert is raised.
    pub fn on_emergency<F>(&self, action: F) -> SubscriptionId
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        self.emergency.subscribe(action)
    }

    /// Zero every counter and window and leave degraded mode.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            let active = state.counters.active;
            *state = State::new(&self.config);
            state.counters.active = active;
        }
        self.degraded.store(false, Ordering::Release);
    }

    fn duration_alert(&self, duration: Duration, complexity: u32) -> Option<Alert> {
        let millis = duration.as_secs_f64() * 1000.0;
        let critical = self.config.critical_render;
        if duration > critical {
            return Some(Alert::new(
                AlertKind::CriticalRender,
                millis,
                critical.as_secs_f64() * 1000.0,
            ));
        }
        let slow = self.config.slow_render + self.config.complexity_allowance * complexity;
        (duration > slow).then(|| Alert::new(AlertKind::SlowRender, millis, slow.as_secs_f64() * 1000.0))
    }

    fn push_outcome(&self, state: &mut State, now: Instant, success: bool, raised: &mut Raised) {
        state.outcomes.push_back((now, success));
        while let Some(&(at, _)) = state.outcomes.front() {
            if now.duration_since(at) <= self.config.error_window {
                break;
            }
            state.outcomes.pop_front();
        }

        let samples = state.outcomes.len();
        if samples < self.config.error_min_samples {
            return;
        }
        let failures = state.outcomes.iter().filter(|(_, ok)| !ok).count();
        let rate = failures as f64 / samples as f64;
        let over = rate > self.config.error_rate_cap;
        if over && !state.error_alerting {
            raised.push(Alert::new(AlertKind::HighErrorRate, rate, self.config.error_rate_cap));
        }
        state.error_alerting = over;
    }

    fn track_recovery(&self, state: &mut State, healthy: bool) {
        if !healthy {
            state.healthy_streak = 0;
            return;
        }
        if !self.is_degraded() {
            return;
        }
        state.healthy_streak += 1;
        if state.healthy_streak >= self.config.recovery_streak {
            state.healthy_streak = 0;
            self.degraded.store(false, Ordering::Release);
            info!(streak = self.config.recovery_streak, "render performance recovered");
        }
    }

    fn dispatch(&self, raised: Raised) -> Vec<Alert> {
        for alert in &raised {
            if alert.is_critical() {
                error!(kind = ?alert.kind, value = alert.value, threshold = alert.threshold, "{}", alert.message);
                self.degraded.store(true, Ordering::Release);
            } else {
                warn!(kind = ?alert.kind, value = alert.value, threshold = alert.threshold, "{}", alert.message);
            }
            self.alerts.emit(alert);
            if alert.is_critical() {
                self.emergency.emit(alert);
            }
        }
        raised.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn monitor() -> PerformanceMonitor {
        PerformanceMonitor::new(
            MonitorConfig::new()
                .with_render_cutoffs(Duration::from_millis(500), Duration::from_millis(3000))
                .with_recovery_streak(3),
        )
    }

    fn success(ms: u64, complexity: u32) -> MonitorEvent {
        MonitorEvent::Success {
            duration: Duration::from_millis(ms),
            complexity,
        }
    }

    #[test]
    fn test_metrics_counters() {
        let monitor = monitor();
        monitor.record(success(10, 0));
        monitor.record(success(30, 0));
        monitor.record(MonitorEvent::Failure { error: None });
        monitor.record(MonitorEvent::CacheMiss);
        monitor.record(MonitorEvent::CacheHit);

        let metrics = monitor.snapshot();
        assert_eq!(metrics.total_renders, 4);
        assert_eq!(metrics.success_rate, 0.75);
        assert_eq!(metrics.cache_hit_rate, 0.5);
        assert_eq!(metrics.average_duration, 20.0);
        assert_eq!(metrics.fallbacks, 1);
    }

    #[test]
    fn test_slow_threshold_scales_with_complexity() {
        let monitor = monitor();
        let alerts = monitor.record(success(600, 0));
        assert_eq!(alerts[0].kind, AlertKind::SlowRender);
        // 500ms + 25ms * 6
        assert!(monitor.record(success(600, 6)).is_empty());
    }

    #[test]
    fn test_critical_render_degrades_and_recovers() {
        let monitor = monitor();
        let emergencies = Arc::new(AtomicUsize::new(0));
        let counter = emergencies.clone();
        monitor.on_emergency(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let alerts = monitor.record(success(3500, 0));
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert!(monitor.is_degraded());
        assert_eq!(emergencies.load(Ordering::SeqCst), 1);

        monitor.record(success(10, 0));
        monitor.record(success(10, 0));
        assert!(monitor.is_degraded());
        monitor.record(success(10, 0));
        assert!(!monitor.is_degraded());
    }

    #[test]
    fn test_memory_and_fps_alerts_are_edge_triggered() {
        let monitor = PerformanceMonitor::new(MonitorConfig::new().with_memory_cap(1000).with_fps_floor(30.0));
        assert_eq!(monitor.record_memory_sample(2000).len(), 1);
        assert!(monitor.record_memory_sample(3000).is_empty());
        assert!(monitor.record_memory_sample(500).is_empty());
        assert_eq!(monitor.record_memory_sample(1500).len(), 1);

        assert_eq!(monitor.record_frame_sample(12.0)[0].kind, AlertKind::LowFrameRate);
        assert!(monitor.record_frame_sample(60.0).is_empty());
        let (memory, fps) = monitor.resource_averages();
        assert_eq!(memory, 1750.0);
        assert_eq!(fps, 36.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_rate_over_trailing_window() {
        let monitor = PerformanceMonitor::new(MonitorConfig::new().with_error_rate(0.5, Duration::from_secs(10)));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        monitor.subscribe_alerts(move |alert| {
            if alert.kind == AlertKind::HighErrorRate {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        for _ in 0..3 {
            monitor.record(MonitorEvent::Failure { error: None });
        }
        monitor.record(success(5, 0));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // Old failures leave the window.
        tokio::time::advance(Duration::from_secs(11)).await;
        for _ in 0..4 {
            monitor.record(success(5, 0));
        }
        monitor.record(MonitorEvent::Failure { error: None });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_active_guard_and_reset() {
        let monitor = monitor();
        let guard = monitor.track_active();
        assert_eq!(monitor.snapshot().active_renders, 1);
        monitor.record(success(5, 0));
        monitor.reset();
        assert_eq!(monitor.snapshot().total_renders, 0);
        assert_eq!(monitor.snapshot().active_renders, 1);
        drop(guard);
        assert_eq!(monitor.snapshot().active_renders, 0);
    }
}
