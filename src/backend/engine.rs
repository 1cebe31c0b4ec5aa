//! Typesetting engines.
//!
//! An engine turns one piece of TeX into markup. Engines know nothing about
//! elements, caching or retries; the [`Backend`](super::Backend) built on top
//! of them does.
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::common::Result;
use crate::tex::{Strictness, render_math};

/// A typesetting engine.
///
/// `load` runs at most once per registry before the first `typeset` call and
/// may fetch or initialize whatever the engine needs. Implementations must be
/// shareable across tasks.
pub trait TypesetEngine: Send + Sync {
    /// Stable engine name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Prepare the engine for use.
    fn load(&self) -> BoxFuture<'_, Result<()>> {
        async { Ok(()) }.boxed()
    }

    /// Typeset `tex` (without delimiters) in inline or display style.
    fn typeset<'a>(&'a self, tex: &'a str, display: bool) -> BoxFuture<'a, Result<String>>;
}

/// Strict translator: inline constructs only, environments rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastEngine;

impl TypesetEngine for FastEngine {
    fn name(&self) -> &'static str {
        "fast"
    }

    fn typeset<'a>(&'a self, tex: &'a str, display: bool) -> BoxFuture<'a, Result<String>> {
        async move { render_math(tex, display, Strictness::Strict) }.boxed()
    }
}

/// Lenient translator: environments as tables, unknown commands as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RobustEngine;

impl TypesetEngine for RobustEngine {
    fn name(&self) -> &'static str {
        "robust"
    }

    fn typeset<'a>(&'a self, tex: &'a str, display: bool) -> BoxFuture<'a, Result<String>> {
        async move {
            tokio::task::yield_now().await;
            render_math(tex, display, Strictness::Lenient)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;

    #[tokio::test]
    async fn test_fast_engine_rejects_environments() {
        let fast = FastEngine;
        assert!(fast.load().await.is_ok());
        assert!(fast.typeset("x^2", false).await.unwrap().contains("<sup>2</sup>"));
        let err = fast
            .typeset(r"\begin{cases} 1 \end{cases}", true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_robust_engine_accepts_environments() {
        let robust = RobustEngine;
        let html = robust
            .typeset(r"\begin{bmatrix} a & b \end{bmatrix}", true)
            .await
            .unwrap();
        assert!(html.starts_with(r#"<span class="mr-math mr-display">"#));
        assert!(html.contains("<table>"));
    }
}
