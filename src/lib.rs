//! Mathrender - rendering orchestration for mixed prose and math notation
//!
//! This library turns arbitrary, often malformed strings of prose and TeX
//! notation into typeset markup on an in-memory element tree. It decides what
//! a string is, repairs it, picks a typesetting backend, deduplicates
//! concurrent renders of the same element, caches results, retries failed
//! attempts and, when everything fails, degrades to a readable fallback.
//!
//! # Features
//!
//! - **Classification**: text, simple math, complex math or mixed prose
//! - **Normalization**: duplicated delimiters, stray whitespace, markdown artifacts
//! - **Backends**: a fast strict engine, a robust lenient engine and a smart
//!   composite, loaded lazily and at most once
//! - **Retry and fallback**: bounded linear backoff, then plain text or
//!   simplified HTML that never fails
//! - **Batching**: containers render in fixed-size batches with a pause between them
//! - **Lazy rendering**: off-screen elements wait for the viewport
//! - **Monitoring**: metrics, threshold alerts and emergency degradation
//!
//! # Example - Rendering a container
//!
//! ```rust
//! use mathrender::{ContainerOptions, Element, RenderConfig, RenderService};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = RenderService::new(RenderConfig::default());
//!
//! let container = Element::new("div");
//! container.append_child(Element::new("p").with_math("Area: $a^2$"));
//! container.append_child(Element::new("p").with_math(r"$$\frac{1}{2}bh$$"));
//! container.attach();
//!
//! let rendered = service
//!     .render_container(&container, ContainerOptions::new().with_progress(|done, total| {
//!         println!("{done}/{total}");
//!     }))
//!     .await;
//! assert_eq!(rendered, 2);
//! # }
//! ```
//!
//! # Example - Classifying content
//!
//! ```rust
//! use mathrender::content::{classify, split, ContentKind};
//!
//! let input = "Çözüm: $x=2$ olduğundan $$y=4$$ bulunur.";
//! assert_eq!(split(input).len(), 5);
//! assert_eq!(classify("$x+1$").kind, ContentKind::SimpleMath);
//! ```

pub mod backend;
pub mod cache;
pub mod common;
pub mod config;
pub mod content;
pub mod dom;
pub mod events;
pub mod lazy;
pub mod lock;
pub mod monitor;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod solution;
pub mod state;
pub mod tex;

pub use backend::{BackendKind, RenderFunction, TypesetEngine};
pub use common::{Error, Result};
pub use config::{ContainerOptions, FallbackStrategy, MonitorConfig, RenderConfig, RenderOptions};
pub use dom::Element;
pub use events::{RenderEvent, SubscriptionId};
pub use lazy::Viewport;
pub use monitor::{Alert, AlertKind, MetricsSnapshot};
pub use service::RenderService;
pub use solution::SolutionDocument;
pub use state::{RenderPhase, RenderState};
