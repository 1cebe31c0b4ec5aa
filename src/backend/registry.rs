//! Lazily loaded, shared backend instances.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{Backend, BackendKind, FastEngine, RobustEngine, TypesetEngine};
use crate::common::{Error, Result};

struct Slot {
    engine: Arc<dyn TypesetEngine>,
    ready: OnceCell<()>,
}

impl Slot {
    fn new(engine: Arc<dyn TypesetEngine>) -> Self {
        Self {
            engine,
            ready: OnceCell::new(),
        }
    }

    /// Load the engine once; concurrent callers share the same load.
    ///
    /// A failed load is not remembered, so a later call tries again.
    async fn ensure(&self, backend: &'static str, timeout: Duration) -> Result<Arc<dyn TypesetEngine>> {
        self.ready
            .get_or_try_init(|| async {
                debug!(engine = self.engine.name(), "loading engine");
                match tokio::time::timeout(timeout, self.engine.load()).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(Error::BackendNotReady {
                        backend,
                        reason: err.to_string(),
                    }),
                    Err(_) => Err(Error::BackendNotReady {
                        backend,
                        reason: format!("load did not finish within {timeout:?}"),
                    }),
                }
            })
            .await
            .map(|_| Arc::clone(&self.engine))
    }

    fn is_loaded(&self) -> bool {
        self.ready.initialized()
    }
}

struct Inner {
    fast: Slot,
    robust: Slot,
    load_timeout: Duration,
}

/// Registry of the three backends over a primary and a capable engine.
///
/// Cloning is cheap and clones share loaded engines.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("fast", &self.inner.fast.engine.name())
            .field("fast_loaded", &self.inner.fast.is_loaded())
            .field("robust", &self.inner.robust.engine.name())
            .field("robust_loaded", &self.inner.robust.is_loaded())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Arc::new(FastEngine), Arc::new(RobustEngine), Duration::from_secs(10))
    }
}

impl Registry {
    pub fn new(fast: Arc<dyn TypesetEngine>, robust: Arc<dyn TypesetEngine>, load_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                fast: Slot::new(fast),
                robust: Slot::new(robust),
                load_timeout,
            }),
        }
    }

    /// Get a backend, loading its engines first if needed.
    ///
    /// `Smart` is usable as long as one of its two engines loads.
    ///
    /// # Errors
    ///
    /// [`Error::BackendNotReady`] when no engine the backend needs could be
    /// loaded within the load timeout.
    pub async fn get(&self, kind: BackendKind) -> Result<Backend> {
        let timeout = self.inner.load_timeout;
        let name = kind.name();
        match kind {
            BackendKind::Fast => {
                let engine = self.inner.fast.ensure(name, timeout).await?;
                Ok(Backend::new(kind, [engine]))
            },
            BackendKind::Robust => {
                let engine = self.inner.robust.ensure(name, timeout).await?;
                Ok(Backend::new(kind, [engine]))
            },
            BackendKind::Smart => {
                let (fast, robust) = tokio::join!(
                    self.inner.fast.ensure(name, timeout),
                    self.inner.robust.ensure(name, timeout)
                );
                match (fast, robust) {
                    (Ok(fast), Ok(robust)) => Ok(Backend::new(kind, [fast, robust])),
                    (Ok(only), Err(err)) | (Err(err), Ok(only)) => {
                        warn!(error = %err, "smart backend running on a single engine");
                        Ok(Backend::new(kind, [only]))
                    },
                    (Err(err), Err(_)) => Err(err),
                }
            },
        }
    }

    /// Whether the engine behind `kind` has finished loading.
    pub fn is_loaded(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Fast => self.inner.fast.is_loaded(),
            BackendKind::Robust => self.inner.robust.is_loaded(),
            BackendKind::Smart => self.inner.fast.is_loaded() && self.inner.robust.is_loaded(),
        }
    }
}
