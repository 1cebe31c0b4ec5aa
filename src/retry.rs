//! Bounded retries with a guaranteed fallback.
//!
//! Each attempt waits for the element to be attached, then runs the render
//! function on its own task under a deadline. Results are committed through
//! an [`AttemptToken`]: once an attempt has timed out its token is
//! superseded, and a late result is discarded instead of overwriting what was
//! committed since. After the last failed attempt the fallback renders a
//! degraded approximation, which cannot fail.
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::backend::RenderFunction;
use crate::common::{Error, Result};
use crate::config::FallbackStrategy;
use crate::dom::Element;
use crate::tex::{to_plain_text, to_simplified_html};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    Pending,
    Committed,
    Superseded,
}

/// Commit right of one render attempt.
#[derive(Debug, Clone)]
pub struct AttemptToken {
    state: Arc<Mutex<TokenState>>,
}

impl Default for AttemptToken {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(TokenState::Pending)),
        }
    }
}

impl AttemptToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` unless the attempt was superseded or already committed.
    ///
    /// The state is held locked while `apply` runs, so a concurrent
    /// [`supersede`](Self::supersede) either happens before (and `apply`
    /// never runs) or after (and sees the commit).
    pub fn commit<F: FnOnce()>(&self, apply: F) -> Result<()> {
        let mut state = self.state.lock();
        if *state != TokenState::Pending {
            return Err(Error::Superseded);
        }
        apply();
        *state = TokenState::Committed;
        Ok(())
    }

    /// Revoke the commit right. Returns `false` if the attempt already
    /// committed.
    pub fn supersede(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            TokenState::Committed => false,
            _ => {
                *state = TokenState::Superseded;
                true
            },
        }
    }

    pub fn is_superseded(&self) -> bool {
        *self.state.lock() == TokenState::Superseded
    }
}

/// Settings of one retrying render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Attempt `n` is followed by a pause of `base_delay * n`
    pub base_delay: Duration,
    pub deadline: Duration,
    pub attach_timeout: Duration,
    pub fallback: FallbackStrategy,
    pub display: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            deadline: Duration::from_secs(5),
            attach_timeout: Duration::from_secs(2),
            fallback: FallbackStrategy::PlainText,
            display: false,
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[inline]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[inline]
    pub fn with_attach_timeout(mut self, timeout: Duration) -> Self {
        self.attach_timeout = timeout;
        self
    }

    #[inline]
    pub fn with_fallback(mut self, strategy: FallbackStrategy) -> Self {
        self.fallback = strategy;
        self
    }

    #[inline]
    pub fn with_display_mode(mut self, display: bool) -> Self {
        self.display = display;
        self
    }
}

/// How a retrying render ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome {
    /// Attempts made, at most `max_attempts`
    pub attempts: u32,
    /// The fallback rendered the element
    pub degraded: bool,
    /// Error of the last failed attempt
    pub last_error: Option<Error>,
    /// Every attempt failed because no engine could be loaded
    pub unavailable: bool,
}

impl RetryOutcome {
    /// Whether the caller should see success.
    ///
    /// Fallback renders count, except when no engine was ever available.
    #[inline]
    pub fn succeeded(&self) -> bool {
        !self.unavailable
    }
}

/// Render `content` into `element`, retrying and finally falling back.
///
/// Returns `true` unless every attempt failed because the backend could not
/// be loaded; the fallback has been applied in that case too.
pub async fn render_with_retry(
    element: &Element,
    content: &str,
    backend: &dyn RenderFunction,
    policy: &RetryPolicy,
) -> bool {
    run(element, content, backend, policy).await.succeeded()
}

/// Like [`render_with_retry`], reporting the full outcome.
pub async fn run(
    element: &Element,
    content: &str,
    backend: &dyn RenderFunction,
    policy: &RetryPolicy,
) -> RetryOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut unavailable = true;
    let mut last_error = None;
    let mut attempts = 0;

    for attempt in 1..=max_attempts {
        attempts = attempt;
        match attempt_once(element, content, backend, policy).await {
            Ok(()) => {
                return RetryOutcome {
                    attempts: attempt,
                    degraded: false,
                    last_error: None,
                    unavailable: false,
                };
            },
            Err(err) => {
                debug!(
                    backend = backend.name(),
                    attempt,
                    reason = err.reason_tag(),
                    error = %err,
                    "render attempt failed"
                );
                unavailable &= err.is_unavailable();
                let retryable = err.is_retryable();
                last_error = Some(err);
                if !retryable {
                    break;
                }
            },
        }
        if attempt < max_attempts {
            tokio::time::sleep(policy.base_delay * attempt).await;
        }
    }

    warn!(
        backend = backend.name(),
        strategy = ?policy.fallback,
        error = ?last_error,
        "render attempts exhausted, applying fallback"
    );
    apply_fallback(element, content, policy.fallback);

    RetryOutcome {
        attempts,
        degraded: true,
        last_error,
        unavailable,
    }
}

async fn attempt_once(
    element: &Element,
    content: &str,
    backend: &dyn RenderFunction,
    policy: &RetryPolicy,
) -> Result<()> {
    element.wait_attached(policy.attach_timeout).await?;

    let token = AttemptToken::new();
    let markup = backend.render(content, policy.display);
    let target = element.clone();
    let commit_token = token.clone();
    let task = tokio::spawn(async move {
        let markup = markup.await?;
        let scratch = target.scratch();
        scratch.set_html(markup);
        commit_token.commit(|| target.swap_content_from(&scratch))
    });

    match tokio::time::timeout(policy.deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(Error::BackendFailed {
            backend: backend.name(),
            reason: join.to_string(),
        }),
        Err(_) => {
            // The task keeps running; its result must not land any more.
            if token.supersede() {
                Err(Error::Timeout {
                    backend: backend.name(),
                    timeout: policy.deadline,
                })
            } else {
                Ok(())
            }
        },
    }
}

/// Replace the element's content with the degraded rendering.
pub fn apply_fallback(element: &Element, content: &str, strategy: FallbackStrategy) {
    match strategy {
        FallbackStrategy::PlainText => element.set_text(&to_plain_text(content)),
        FallbackStrategy::SimplifiedHtml => element.set_html(to_simplified_html(content)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::FutureExt;
    use futures::future::BoxFuture;

    use super::*;

    struct Stub {
        calls: Arc<AtomicU32>,
        fail_first: u32,
        error: Error,
        delay: Duration,
    }

    impl Stub {
        fn failing(error: Error) -> Self {
            Self {
                calls: Arc::new(AtomicU32::new(0)),
                fail_first: u32::MAX,
                error,
                delay: Duration::ZERO,
            }
        }
    }

    impl RenderFunction for Stub {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn render(&self, content: &str, _display: bool) -> BoxFuture<'static, Result<String>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let fail = call <= self.fail_first;
            let error = self.error.clone();
            let delay = self.delay;
            let content = content.to_string();
            async move {
                tokio::time::sleep(delay).await;
                if fail { Err(error) } else { Ok(format!("<b>{content}</b>")) }
            }
            .boxed()
        }
    }

    fn attached() -> Element {
        let element = Element::new("span");
        element.attach();
        element
    }

    fn thrown() -> Error {
        Error::BackendFailed {
            backend: "stub",
            reason: "boom".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_throwing_backend_falls_back() {
        let element = attached();
        let stub = Stub::failing(thrown());

        let ok = render_with_retry(&element, "x^2", &stub, &RetryPolicy::default()).await;

        assert!(ok);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
        let text = element.text_content();
        assert_eq!(text, "x²");
        assert!(!text.contains('\\'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_linear() {
        let element = attached();
        let stub = Stub::failing(thrown());
        let started = tokio::time::Instant::now();

        run(&element, "x", &stub, &RetryPolicy::default()).await;

        // 100ms after the first attempt, 200ms after the second.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry() {
        let element = attached();
        let stub = Stub {
            fail_first: 1,
            ..Stub::failing(thrown())
        };

        let outcome = run(&element, "y", &stub, &RetryPolicy::default()).await;

        assert_eq!(outcome.attempts, 2);
        assert!(!outcome.degraded);
        assert_eq!(element.html(), "<b>y</b>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_backend_returns_false_after_fallback() {
        let element = attached();
        let stub = Stub::failing(Error::BackendNotReady {
            backend: "stub",
            reason: "script missing".to_string(),
        });

        let ok = render_with_retry(&element, r"$\alpha$", &stub, &RetryPolicy::default()).await;

        assert!(!ok);
        assert_eq!(element.text_content(), "α");
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_counts_only_attempts_made() {
        let element = attached();
        let stub = Stub::failing(Error::Disposed);

        let outcome = run(&element, "x^2", &stub, &RetryPolicy::default()).await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.degraded);
        assert_eq!(element.text_content(), "x²");
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_element_fails_with_not_attached() {
        let element = Element::new("span");
        let stub = Stub::failing(thrown());

        let outcome = run(&element, "x", &stub, &RetryPolicy::default().with_max_attempts(1)).await;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.last_error.map(|e| e.reason_tag()), Some("not-attached"));
        assert!(outcome.degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_attempt_never_overwrites_fallback() {
        let element = attached();
        let stub = Stub {
            fail_first: 0,
            delay: Duration::from_secs(10),
            ..Stub::failing(thrown())
        };
        let policy = RetryPolicy::default()
            .with_max_attempts(1)
            .with_deadline(Duration::from_secs(1))
            .with_fallback(FallbackStrategy::SimplifiedHtml);

        let outcome = run(&element, "$x^2$", &stub, &policy).await;
        assert_eq!(outcome.last_error.as_ref().map(Error::reason_tag), Some("timeout"));
        let fallback = element.html();
        assert!(fallback.contains("<sup>2</sup>"));

        // Let the abandoned call finish.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(element.html(), fallback);
    }

    #[test]
    fn test_token_commit_and_supersede() {
        let token = AttemptToken::new();
        assert!(token.supersede());
        assert!(token.is_superseded());
        assert_eq!(token.commit(|| {}), Err(Error::Superseded));

        let token = AttemptToken::new();
        assert!(token.commit(|| {}).is_ok());
        assert!(!token.supersede());
        assert_eq!(token.commit(|| {}), Err(Error::Superseded));
    }
}
