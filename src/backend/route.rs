//! Backend choice for one piece of content.
use futures::FutureExt;
use futures::future::BoxFuture;

use super::{BackendKind, Registry, RenderFunction};
use crate::common::{Result, escape_html};
use crate::content::{ContentKind, Segment, classify, segments};

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Text(String),
    Math {
        tex: String,
        display: bool,
        backend: BackendKind,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Plan {
    Whole(BackendKind),
    Parts(Vec<Part>),
}

/// The backends chosen for a content string, ready to run.
///
/// Whole-string routes load their backend from the registry on each attempt,
/// so a backend that failed to load is retried along with the render.
#[derive(Debug, Clone)]
pub struct Route {
    registry: Registry,
    plan: Plan,
}

impl Route {
    /// Route everything through one backend.
    pub fn fixed(registry: &Registry, kind: BackendKind) -> Self {
        Self {
            registry: registry.clone(),
            plan: Plan::Whole(kind),
        }
    }

    /// Choose backends for `content` of the given shape.
    ///
    /// Degraded mode forces the fast backend; otherwise an explicit
    /// preference wins, then the classification decides. Mixed content is
    /// split and every math part gets its own backend.
    pub fn select(
        registry: &Registry,
        content: &str,
        kind: ContentKind,
        preferred: Option<BackendKind>,
        degraded: bool,
    ) -> Self {
        if degraded {
            return Self::fixed(registry, BackendKind::Fast);
        }
        if let Some(preferred) = preferred {
            return Self::fixed(registry, preferred);
        }
        if let Some(backend) = BackendKind::for_content(kind) {
            return Self::fixed(registry, backend);
        }

        let parts = segments(content)
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) => Some(Part::Text(text.to_string())),
                Segment::Math { inner, display, .. } => {
                    let tex = inner.trim();
                    if tex.is_empty() {
                        return None;
                    }
                    let backend = match classify(tex).kind {
                        ContentKind::SimpleMath => BackendKind::Fast,
                        ContentKind::ComplexMath => BackendKind::Robust,
                        ContentKind::Text | ContentKind::Mixed => BackendKind::Smart,
                    };
                    Some(Part::Math {
                        tex: tex.to_string(),
                        display,
                        backend,
                    })
                },
            })
            .collect();
        Self {
            registry: registry.clone(),
            plan: Plan::Parts(parts),
        }
    }
}

impl RenderFunction for Route {
    fn name(&self) -> &'static str {
        match self.plan {
            Plan::Whole(kind) => kind.name(),
            Plan::Parts(_) => "mixed",
        }
    }

    fn render(&self, content: &str, display: bool) -> BoxFuture<'static, Result<String>> {
        let registry = self.registry.clone();
        match &self.plan {
            Plan::Whole(kind) => {
                let kind = *kind;
                let content = content.to_string();
                async move { registry.get(kind).await?.markup(&content, display).await }.boxed()
            },
            Plan::Parts(parts) => {
                let parts = parts.clone();
                async move {
                    let mut out = String::new();
                    for part in parts {
                        match part {
                            Part::Text(text) => out.push_str(&escape_html(&text)),
                            Part::Math {
                                tex,
                                display,
                                backend,
                            } => {
                                let markup = registry.get(backend).await?.typeset(&tex, display).await?;
                                out.push_str(&markup);
                            },
                        }
                    }
                    Ok(out)
                }
                .boxed()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = r"Bir karenin alanı $a^2$'dir ve $$\int_0^1 x\,dx$$ olur.";

    #[test]
    fn test_select_by_classification() {
        let registry = Registry::default();
        let route = Route::select(&registry, "$x+1$", ContentKind::SimpleMath, None, false);
        assert_eq!(route.name(), "fast");
        let route = Route::select(&registry, "x", ContentKind::ComplexMath, None, false);
        assert_eq!(route.name(), "robust");
        let route = Route::select(&registry, "x", ContentKind::Text, None, false);
        assert_eq!(route.name(), "smart");
    }

    #[test]
    fn test_preference_and_degradation() {
        let registry = Registry::default();
        let route = Route::select(&registry, "x", ContentKind::SimpleMath, Some(BackendKind::Robust), false);
        assert_eq!(route.name(), "robust");
        let route = Route::select(&registry, "x", ContentKind::ComplexMath, Some(BackendKind::Robust), true);
        assert_eq!(route.name(), "fast");
    }

    #[test]
    fn test_mixed_parts_get_their_own_backend() {
        let route = Route::select(&Registry::default(), MIXED, ContentKind::Mixed, None, false);
        assert_eq!(route.name(), "mixed");
        let Plan::Parts(parts) = &route.plan else {
            panic!("mixed content must be split");
        };
        let backends: Vec<_> = parts
            .iter()
            .filter_map(|part| match part {
                Part::Math { backend, .. } => Some(*backend),
                Part::Text(_) => None,
            })
            .collect();
        assert_eq!(backends, vec![BackendKind::Smart, BackendKind::Robust]);
    }

    #[tokio::test]
    async fn test_mixed_render_keeps_order_and_escapes_text() {
        let route = Route::select(&Registry::default(), "a < $x$ b $$y$$", ContentKind::Mixed, None, false);
        let html = route.render("ignored", false).await.unwrap();
        assert_eq!(
            html,
            concat!(
                "a &lt; ",
                r#"<span class="mr-math mr-inline"><i>x</i></span>"#,
                " b ",
                r#"<span class="mr-math mr-display"><i>y</i></span>"#
            )
        );
    }
}
