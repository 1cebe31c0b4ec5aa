#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use mathrender::common::escape_html;
use mathrender::{Element, Error, RenderConfig, RenderService, Result, TypesetEngine};

/// Engine that counts typesetting calls, optionally slow or always failing.
pub struct CountingEngine {
    pub calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl CountingEngine {
    pub fn new() -> Arc<Self> {
        Self::with(Duration::ZERO, false)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::with(delay, false)
    }

    pub fn throwing() -> Arc<Self> {
        Self::with(Duration::ZERO, true)
    }

    fn with(delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            fail,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TypesetEngine for CountingEngine {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn typeset<'a>(&'a self, tex: &'a str, _display: bool) -> BoxFuture<'a, Result<String>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(Error::BackendFailed {
                    backend: "counting",
                    reason: "engine threw".to_string(),
                });
            }
            Ok(format!("<b>{}</b>", escape_html(tex)))
        }
        .boxed()
    }
}

/// Service whose fast and robust backends both use `engine`.
pub fn service_over(config: RenderConfig, engine: &Arc<CountingEngine>) -> RenderService {
    RenderService::with_engines(config, engine.clone(), engine.clone())
}

pub fn attached(tag: &str) -> Element {
    let element = Element::new(tag);
    element.attach();
    element
}

/// Attached container holding one pending element per content string.
pub fn container_with<I, S>(contents: I) -> Element
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let container = Element::new("div");
    for content in contents {
        container.append_child(Element::new("p").with_math(content));
    }
    container.attach();
    container
}
