//! Typesetting backends and their selection.
//!
//! Three backends form a closed set ([`BackendKind`]): `Fast` wraps the
//! primary engine, `Robust` the capable one, and `Smart` tries the primary and
//! falls through to the capable engine on any failure. The [`Registry`] loads
//! engines lazily, once each; a [`Route`] picks backends for one piece of
//! content from its classification.
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::common::{Error, Result, escape_html};
use crate::content::{ContentKind, Segment, has_math, looks_like_tex, segments};

mod engine;
mod registry;
mod route;

pub use engine::{FastEngine, RobustEngine, TypesetEngine};
pub use registry::Registry;
pub use route::Route;

/// Backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Fast,
    Robust,
    Smart,
}

impl BackendKind {
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Fast => "fast",
            BackendKind::Robust => "robust",
            BackendKind::Smart => "smart",
        }
    }

    /// Backend for a classification when the caller has no preference.
    ///
    /// Mixed content has no single backend; its parts are routed one by one.
    pub fn for_content(kind: ContentKind) -> Option<Self> {
        match kind {
            ContentKind::SimpleMath => Some(BackendKind::Fast),
            ContentKind::ComplexMath => Some(BackendKind::Robust),
            ContentKind::Text => Some(BackendKind::Smart),
            ContentKind::Mixed => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that turns a content string into markup.
///
/// The returned future owns everything it needs, so it can run on its own
/// task and outlive the caller's wait.
pub trait RenderFunction: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, content: &str, display: bool) -> BoxFuture<'static, Result<String>>;
}

/// A loaded backend: one or more engines tried in order.
#[derive(Clone)]
pub struct Backend {
    kind: BackendKind,
    engines: SmallVec<[Arc<dyn TypesetEngine>; 2]>,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.engines.iter().map(|e| e.name()).collect();
        f.debug_struct("Backend")
            .field("kind", &self.kind)
            .field("engines", &names)
            .finish()
    }
}

impl Backend {
    /// Build a backend over already-loaded engines.
    pub fn new<I>(kind: BackendKind, engines: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TypesetEngine>>,
    {
        Self {
            kind,
            engines: engines.into_iter().collect(),
        }
    }

    #[inline]
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Typeset bare TeX, falling through the engines in order.
    ///
    /// Blank markup counts as a refusal and moves on to the next engine.
    ///
    /// # Errors
    ///
    /// The last engine's error when every engine failed, or
    /// [`Error::BackendNotReady`] when there is no engine at all.
    pub async fn typeset(&self, tex: &str, display: bool) -> Result<String> {
        let mut last = None;
        for engine in &self.engines {
            match engine.typeset(tex, display).await {
                Ok(markup) if markup.trim().is_empty() => {
                    debug!(engine = engine.name(), backend = %self.kind, "engine rejected the content");
                    last = Some(Error::BackendRejected { backend: engine.name() });
                },
                Ok(markup) => return Ok(markup),
                Err(err) => {
                    debug!(engine = engine.name(), backend = %self.kind, error = %err, "engine failed");
                    last = Some(err);
                },
            }
        }
        Err(last.unwrap_or_else(|| Error::BackendNotReady {
            backend: self.kind.name(),
            reason: "no engine loaded".to_string(),
        }))
    }

    /// Markup for a content string.
    ///
    /// Delimited notation is typeset span by span with escaped prose between.
    /// Undelimited content is typeset whole, except that the smart backend
    /// passes through content with no TeX syntax at all as text.
    pub async fn markup(&self, content: &str, display: bool) -> Result<String> {
        let segments = segments(content);
        if has_math(&segments) {
            let mut out = String::with_capacity(content.len() * 4);
            for segment in segments {
                match segment {
                    Segment::Text(text) => out.push_str(&escape_html(text)),
                    Segment::Math { inner, display, .. } => {
                        let tex = inner.trim();
                        if !tex.is_empty() {
                            out.push_str(&self.typeset(tex, display).await?);
                        }
                    },
                }
            }
            return Ok(out);
        }

        if self.kind == BackendKind::Smart && !looks_like_tex(content) {
            return Ok(escape_html(content));
        }
        self.typeset(content.trim(), display).await
    }
}

impl RenderFunction for Backend {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn render(&self, content: &str, display: bool) -> BoxFuture<'static, Result<String>> {
        let backend = self.clone();
        let content = content.to_string();
        async move { backend.markup(&content, display).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Backend {
        Backend::new(BackendKind::Fast, [Arc::new(FastEngine) as Arc<dyn TypesetEngine>])
    }

    fn smart() -> Backend {
        Backend::new(
            BackendKind::Smart,
            [
                Arc::new(FastEngine) as Arc<dyn TypesetEngine>,
                Arc::new(RobustEngine) as Arc<dyn TypesetEngine>,
            ],
        )
    }

    #[test]
    fn test_selection_policy() {
        assert_eq!(BackendKind::for_content(ContentKind::SimpleMath), Some(BackendKind::Fast));
        assert_eq!(BackendKind::for_content(ContentKind::ComplexMath), Some(BackendKind::Robust));
        assert_eq!(BackendKind::for_content(ContentKind::Text), Some(BackendKind::Smart));
        assert_eq!(BackendKind::for_content(ContentKind::Mixed), None);
        assert_eq!(BackendKind::Smart.to_string(), "smart");
    }

    #[tokio::test]
    async fn test_smart_falls_through_to_robust() {
        let tex = r"\begin{cases} x & y \end{cases}";
        assert!(fast().typeset(tex, true).await.is_err());
        assert!(smart().typeset(tex, true).await.unwrap().contains("mr-cases"));
    }

    #[tokio::test]
    async fn test_markup_splits_delimited_content() {
        let html = fast().markup("Alan $a^2$ < 5", false).await.unwrap();
        assert!(html.starts_with("Alan <span class=\"mr-math mr-inline\">"));
        assert!(html.ends_with(" &lt; 5"));
    }

    #[tokio::test]
    async fn test_smart_passes_plain_text_through() {
        assert_eq!(smart().markup("Merhaba dünya", false).await.unwrap(), "Merhaba dünya");
        assert!(smart().markup("x^2", false).await.unwrap().contains("<sup>"));
    }

    #[tokio::test]
    async fn test_markup_of_undelimited_content() {
        assert!(fast().markup(r"\unknown", false).await.is_err());
        assert_eq!(
            fast().markup("x", false).await.unwrap(),
            r#"<span class="mr-math mr-inline"><i>x</i></span>"#
        );
    }

    struct Declining;

    impl TypesetEngine for Declining {
        fn name(&self) -> &'static str {
            "declining"
        }

        fn typeset<'a>(&'a self, _tex: &'a str, _display: bool) -> BoxFuture<'a, Result<String>> {
            async { Ok(String::new()) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_blank_markup_is_a_rejection() {
        let alone = Backend::new(BackendKind::Fast, [Arc::new(Declining) as Arc<dyn TypesetEngine>]);
        assert_eq!(
            alone.typeset("x", false).await.unwrap_err(),
            Error::BackendRejected { backend: "declining" }
        );

        let smart = Backend::new(
            BackendKind::Smart,
            [
                Arc::new(Declining) as Arc<dyn TypesetEngine>,
                Arc::new(RobustEngine) as Arc<dyn TypesetEngine>,
            ],
        );
        assert!(smart.typeset("x", false).await.unwrap().contains("<i>x</i>"));
    }

    #[tokio::test]
    async fn test_empty_backend_is_not_ready() {
        let backend = Backend::new(BackendKind::Robust, Vec::<Arc<dyn TypesetEngine>>::new());
        assert!(backend.typeset("x", false).await.unwrap_err().is_unavailable());
    }
}
