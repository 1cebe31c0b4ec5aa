//! The render service.
//!
//! [`RenderService`] owns one instance of every shared component (backend
//! registry, render cache, lock table, batch scheduler, visibility gate,
//! performance monitor, notification bus) and exposes the operations the UI
//! layer calls. It is constructed explicitly and passed around; clones share
//! the same state.
//!
//! # Examples
//!
//! ```rust
//! use mathrender::{Element, RenderConfig, RenderOptions, RenderService};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = RenderService::new(RenderConfig::default());
//! let element = Element::new("span");
//! element.attach();
//!
//! let ok = service.render_element(&element, "$x^2 + 1$", &RenderOptions::new()).await;
//! assert!(ok);
//! assert!(element.html().contains("<sup>"));
//! # }
//! ```
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::backend::{FastEngine, Registry, RenderFunction, RobustEngine, Route, TypesetEngine};
use crate::cache::RenderCache;
use crate::common::{Error, Result};
use crate::config::{ContainerOptions, ProgressCallback, RenderConfig, RenderOptions};
use crate::content::{Fingerprint, classify, normalize};
use crate::dom::{DISPLAY_ATTR, Element, MATH_SOURCE_ATTR, RENDERED_CLASS};
use crate::events::{Observers, RenderEvent, SubscriptionId};
use crate::lazy::{Viewport, VisibilityGate};
use crate::lock::LockTable;
use crate::monitor::{Alert, MetricsSnapshot, MonitorEvent, PerformanceMonitor};
use crate::retry::{self, RetryPolicy};
use crate::scheduler::{BatchScheduler, ScheduleReport};
use crate::solution::{SolutionDocument, SolutionSource, build_solution_view};
use crate::state::{RenderPhase, RenderState};

struct Inner {
    config: RenderConfig,
    registry: Registry,
    cache: RenderCache,
    locks: LockTable<bool>,
    scheduler: BatchScheduler,
    /// Deferred elements with the options of the container call that
    /// observed them
    gate: VisibilityGate<RenderOptions>,
    monitor: PerformanceMonitor,
    events: Observers<RenderEvent>,
    disposed: AtomicBool,
}

/// Entry point of the render core.
#[derive(Clone)]
pub struct RenderService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RenderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderService")
            .field("registry", &self.inner.registry)
            .field("cache", &self.inner.cache)
            .field("locks", &self.inner.locks)
            .field("gate", &self.inner.gate)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Default for RenderService {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl RenderService {
    /// Create a service over the built-in engines.
    pub fn new(config: RenderConfig) -> Self {
        Self::with_engines(config, Arc::new(FastEngine), Arc::new(RobustEngine))
    }

    /// Create a service over the given primary and fallback engines.
    pub fn with_engines(config: RenderConfig, fast: Arc<dyn TypesetEngine>, robust: Arc<dyn TypesetEngine>) -> Self {
        let inner = Arc::new(Inner {
            registry: Registry::new(fast, robust, config.load_timeout),
            cache: RenderCache::new(),
            locks: LockTable::new(),
            scheduler: BatchScheduler::new(),
            gate: VisibilityGate::new(config.lazy_margin),
            monitor: PerformanceMonitor::new(config.monitor.clone()),
            events: Observers::new(),
            disposed: AtomicBool::new(false),
            config,
        });

        let weak = Arc::downgrade(&inner);
        inner.monitor.on_emergency(move |alert| {
            if let Some(inner) = weak.upgrade() {
                debug!(alert = %alert, "emergency degradation: clearing cache and pending batches");
                inner.cache.clear();
                inner.scheduler.cancel_pending();
            }
        });

        Self { inner }
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.inner.config
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    #[inline]
    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.inner.monitor
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Render `content` into `element`.
    ///
    /// Concurrent calls for the same element join the render already in
    /// flight. Returns `true` when the element shows rendered or degraded
    /// content, `false` when no backend could be loaded (the fallback is shown
    /// anyway), when the content is empty, or after [`dispose`](Self::dispose).
    #[instrument(level = "debug", skip_all, fields(len = content.len(), display = options.display_mode))]
    pub async fn render_element(&self, element: &Element, content: &str, options: &RenderOptions) -> bool {
        if self.is_disposed() {
            return false;
        }
        let id = element.ensure_id();
        let key = id.clone();
        let inner = Arc::clone(&self.inner);
        let element = element.clone();
        let content = content.to_string();
        let options = options.clone();
        self.inner
            .locks
            .with_lock(&id, move || inner.render_locked(key, element, content, options))
            .await
    }

    /// Render every pending element under `container` in batches.
    ///
    /// With `lazy_load`, elements are handed to the visibility gate instead
    /// and only those of this container already inside the last reported
    /// viewport render now. The rest keep this call's options until they
    /// become visible. Returns the number of elements that rendered
    /// successfully.
    #[instrument(level = "debug", skip_all, fields(lazy = options.lazy_load))]
    pub async fn render_container(&self, container: &Element, options: ContainerOptions) -> usize {
        if self.is_disposed() {
            return 0;
        }
        let started = Instant::now();
        let config = &self.inner.config;

        let mut render = options.render.clone();
        render.max_attempts.get_or_insert(config.container_max_attempts);

        let elements = BatchScheduler::collect(container, &config.render_classes);
        let work = if options.lazy_load {
            let observed = self.inner.gate.observe(elements.iter(), render.clone());
            debug!(observed, "deferred elements to the visibility gate");
            self.inner.gate.take_visible(&elements)
        } else {
            elements.into_iter().map(|element| (element, render.clone())).collect()
        };

        let batch_size = options.batch_size.unwrap_or(config.batch_size);
        let report = self
            .run_batches(work, batch_size, config.batch_delay, options.on_progress.as_ref())
            .await;

        self.inner.events.emit(&RenderEvent::ContainerCompleted {
            total: report.total,
            successes: report.successes,
            duration: started.elapsed(),
        });
        report.successes
    }

    /// Report the host viewport and render the observed elements that
    /// entered it. Returns how many rendered successfully.
    pub async fn set_viewport(&self, viewport: Viewport) -> usize {
        if self.is_disposed() {
            return 0;
        }
        let mut entering = self.inner.gate.update(viewport);
        entering.retain(|(element, _)| !element.is_marked_rendered());
        if entering.is_empty() {
            return 0;
        }
        self.run_batches(entering, 1, Duration::ZERO, None).await.successes
    }

    /// Drop the rendered marker and cache entry of `element`, then render its
    /// source again.
    pub async fn force_rerender(&self, element: &Element, options: &RenderOptions) -> bool {
        if self.is_disposed() {
            return false;
        }
        element.remove_class(RENDERED_CLASS);
        self.inner.cache.remove(element);
        match element.math_source(&self.inner.config.render_classes) {
            Some(source) => self.render_element(element, &source, options).await,
            None => false,
        }
    }

    /// Build the view of a solution and render it.
    ///
    /// The view is attached before rendering; the caller inserts it into its
    /// own tree afterwards.
    pub async fn render_solution(&self, doc: &SolutionDocument, options: ContainerOptions) -> Result<(Element, usize)> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        let view = build_solution_view(doc);
        view.attach();
        let rendered = self.render_container(&view, options).await;
        Ok((view, rendered))
    }

    /// Ask `source` for a solution and render it. `Ok(None)` when the source
    /// had no answer.
    pub async fn solve_and_render(
        &self,
        source: &dyn SolutionSource,
        problem: &str,
        image: Option<&[u8]>,
        options: ContainerOptions,
    ) -> Result<Option<(Element, usize)>> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        match source.get_solution(problem, image).await? {
            Some(doc) => self.render_solution(&doc, options).await.map(Some),
            None => Ok(None),
        }
    }

    pub fn render_state(&self, element: &Element) -> RenderState {
        element.render_state()
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.inner.monitor.snapshot()
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Subscribe to render notifications.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&RenderEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub fn subscribe_alerts<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        self.inner.monitor.subscribe_alerts(listener)
    }

    pub fn record_memory_sample(&self, bytes: u64) -> Vec<Alert> {
        self.inner.monitor.record_memory_sample(bytes)
    }

    pub fn record_frame_sample(&self, fps: f64) -> Vec<Alert> {
        self.inner.monitor.record_frame_sample(fps)
    }

    /// Whether renders are currently forced onto the fast backend.
    pub fn is_degraded(&self) -> bool {
        self.inner.monitor.is_degraded()
    }

    /// Forget cached markup, pending locks, observed elements and metrics.
    ///
    /// Loaded backends stay loaded.
    pub fn reset(&self) {
        let inner = &self.inner;
        inner.scheduler.cancel_pending();
        inner.gate.cleanup();
        inner.cache.clear();
        inner.locks.clear();
        inner.monitor.reset();
    }

    /// Reset and refuse all further work.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.reset();
        self.inner.events.clear();
        debug!("render service disposed");
    }

    async fn run_batches(
        &self,
        work: Vec<(Element, RenderOptions)>,
        batch_size: usize,
        delay: Duration,
        on_progress: Option<&ProgressCallback>,
    ) -> ScheduleReport {
        let inner = &self.inner;
        inner
            .scheduler
            .run(
                work,
                batch_size,
                delay,
                |progress| {
                    if let Some(callback) = on_progress {
                        callback(progress.processed, progress.total);
                    }
                    inner.events.emit(&RenderEvent::BatchCompleted {
                        processed: progress.processed,
                        total: progress.total,
                        successes: progress.successes,
                    });
                },
                |(element, mut options): (Element, RenderOptions)| {
                    if element.has_attr(DISPLAY_ATTR) {
                        options.display_mode = true;
                    }
                    async move {
                        match element.math_source(&self.inner.config.render_classes) {
                            Some(source) => self.render_element(&element, &source, &options).await,
                            None => false,
                        }
                    }
                },
            )
            .await
    }
}

impl Inner {
    fn retry_policy(&self, options: &RenderOptions) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(options.max_attempts.unwrap_or(self.config.max_attempts))
            .with_base_delay(self.config.retry_base_delay)
            .with_deadline(options.deadline.unwrap_or(self.config.backend_timeout))
            .with_attach_timeout(self.config.attach_timeout)
            .with_fallback(options.fallback_strategy.unwrap_or(self.config.fallback_strategy))
            .with_display_mode(options.display_mode)
    }

    async fn render_locked(self: Arc<Self>, id: String, element: Element, content: String, options: RenderOptions) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }
        let normalized = normalize(&content);
        if normalized.trim().is_empty() {
            debug!(element = %id, "nothing to render");
            return false;
        }
        if element.attr(MATH_SOURCE_ATTR).as_deref() != Some(content.as_str()) {
            element.set_attr(MATH_SOURCE_ATTR, content.as_str());
        }

        let started = Instant::now();
        let fingerprint = Fingerprint::new(&normalized, &options.fingerprint_key());
        let use_cache = self.config.cache_enabled && !options.no_cache && !element.is_cache_opted_out();

        if use_cache {
            if let Some(markup) = self.cache.get(&element, &fingerprint) {
                element.set_html(markup);
                self.finish(&element, RenderPhase::Completed, None);
                self.monitor.record(MonitorEvent::CacheHit);
                self.events.emit(&RenderEvent::RenderCompleted {
                    element_id: id,
                    duration: started.elapsed(),
                    backend: "cache",
                    from_cache: true,
                    degraded: false,
                });
                return true;
            }
            self.monitor.record(MonitorEvent::CacheMiss);
        }

        element.update_render_state(|state| state.transition(RenderPhase::Rendering, None));
        let classification = classify(&normalized);
        let route = Route::select(
            &self.registry,
            &normalized,
            classification.kind,
            options.preferred_backend,
            self.monitor.is_degraded(),
        );
        debug!(
            element = %id,
            kind = ?classification.kind,
            complexity = classification.complexity,
            backend = route.name(),
            %fingerprint,
            "rendering"
        );

        let policy = self.retry_policy(&options);
        let outcome = {
            let _active = self.monitor.track_active();
            retry::run(&element, &normalized, &route, &policy).await
        };
        let duration = started.elapsed();
        self.monitor.record_retries(outcome.attempts.saturating_sub(1));

        if !outcome.degraded {
            if use_cache {
                self.cache.put(&element, fingerprint, element.html());
            }
            self.monitor.record(MonitorEvent::Success {
                duration,
                complexity: classification.complexity,
            });
            self.finish(&element, RenderPhase::Completed, None);
            self.events.emit(&RenderEvent::RenderCompleted {
                element_id: id,
                duration,
                backend: route.name(),
                from_cache: false,
                degraded: false,
            });
            return true;
        }

        self.monitor.record(MonitorEvent::Failure {
            error: outcome.last_error.clone(),
        });
        if outcome.succeeded() {
            self.finish(&element, RenderPhase::Completed, outcome.last_error);
            self.events.emit(&RenderEvent::RenderCompleted {
                element_id: id,
                duration,
                backend: route.name(),
                from_cache: false,
                degraded: true,
            });
            true
        } else {
            let error = outcome
                .last_error
                .unwrap_or_else(|| Error::Other("no render attempt was made".to_string()));
            element.update_render_state(|state| state.transition(RenderPhase::Failed, Some(error.clone())));
            self.events.emit(&RenderEvent::RenderFailed {
                element_id: id,
                duration,
                error,
            });
            false
        }
    }

    fn finish(&self, element: &Element, phase: RenderPhase, error: Option<Error>) {
        element.update_render_state(|state| state.transition(phase, error));
        element.add_class(RENDERED_CLASS);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures::FutureExt;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;

    use super::*;
    use crate::backend::BackendKind;

    struct Broken;

    impl TypesetEngine for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn load(&self) -> BoxFuture<'_, Result<()>> {
            async {
                Err(Error::BackendNotReady {
                    backend: "broken",
                    reason: "script failed to load".to_string(),
                })
            }
            .boxed()
        }

        fn typeset<'a>(&'a self, _tex: &'a str, _display: bool) -> BoxFuture<'a, Result<String>> {
            async { Ok(String::new()) }.boxed()
        }
    }

    fn attached(tag: &str) -> Element {
        let element = Element::new(tag);
        element.attach();
        element
    }

    #[tokio::test]
    async fn test_render_marks_element_and_caches() {
        let service = RenderService::default();
        let element = attached("span");

        assert!(service.render_element(&element, "$x^2$", &RenderOptions::new()).await);
        assert!(element.is_marked_rendered());
        assert_eq!(element.attr(MATH_SOURCE_ATTR).as_deref(), Some("$x^2$"));
        assert_eq!(service.render_state(&element).phase, RenderPhase::Completed);

        let first = element.html();
        element.set_html("stale");
        assert!(service.render_element(&element, "$x^2$", &RenderOptions::new()).await);
        assert_eq!(element.html(), first);

        let metrics = service.get_metrics();
        assert_eq!(metrics.total_renders, 2);
        assert_eq!(metrics.cache_hit_rate, 0.5);
    }

    #[tokio::test]
    async fn test_empty_content_is_skipped() {
        let service = RenderService::default();
        let element = attached("span");
        assert!(!service.render_element(&element, "$$   $$", &RenderOptions::new()).await);
        assert!(!element.is_marked_rendered());
        assert_eq!(service.get_metrics().total_renders, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_engines_fail_after_fallback() {
        let service = RenderService::with_engines(RenderConfig::default(), Arc::new(Broken), Arc::new(Broken));
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        service.subscribe(move |event| {
            if let RenderEvent::RenderFailed { error, .. } = event {
                assert_eq!(error.reason_tag(), "not-ready");
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let element = attached("span");
        assert!(!service.render_element(&element, "$x^2$", &RenderOptions::new()).await);
        assert_eq!(element.text_content(), "x²");
        assert_eq!(service.render_state(&element).phase, RenderPhase::Failed);
        assert!(!element.is_marked_rendered());
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_degraded_mode_forces_fast_backend() {
        let service = RenderService::new(
            RenderConfig::default().with_monitor(
                crate::config::MonitorConfig::new().with_render_cutoffs(Duration::ZERO, Duration::ZERO),
            ),
        );
        let backends = Arc::new(Mutex::new(Vec::new()));
        let seen = backends.clone();
        service.subscribe(move |event| {
            if let RenderEvent::RenderCompleted { backend, .. } = event {
                seen.lock().push(*backend);
            }
        });

        let element = attached("span");
        let options = RenderOptions::new().with_backend(BackendKind::Robust).with_no_cache(true);
        service.render_element(&element, "$x$", &options).await;
        assert!(service.is_degraded());
        service.force_rerender(&element, &options).await;

        assert_eq!(*backends.lock(), vec!["robust", "fast"]);
    }

    #[tokio::test]
    async fn test_disposed_service_does_nothing() {
        let service = RenderService::default();
        service.dispose();
        let element = attached("span").with_math("$x$");
        assert!(!service.render_element(&element, "$x$", &RenderOptions::new()).await);
        assert_eq!(service.render_container(&element, ContainerOptions::new()).await, 0);
        assert_eq!(
            service.render_solution(&SolutionDocument::default(), ContainerOptions::new()).await.unwrap_err(),
            Error::Disposed
        );
        assert_eq!(element.html(), "");
    }
}
