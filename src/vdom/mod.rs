//! Minimal synchronous virtual-DOM engine.
//!
//! This is the embedding runtime the reconciler adapter piggybacks on. The
//! adapter consumes nothing of it beyond the published boundary:
//!
//! - [`Element`] descriptors, produced per render pass and discarded
//! - the [`DomElement`] trait plus the process tag registry, so custom
//!   element implementations can stand in for platform elements
//! - the [`options`] extension points (ordered before-diff / after-diff /
//!   unmount observer lists)
//! - the [`render`] entrypoint
//!
//! The engine performs keyed child reconciliation over retained fiber
//! nodes and drives every structural effect through [`DomElement`]
//! methods, which is exactly where custom elements intercept. It owns no
//! scheduling: rendering is synchronous and single-threaded, and all
//! engine state is thread-local.

pub mod diff;
pub mod dom;
pub mod element;
pub mod options;

pub use diff::{render, reset_engine, Fiber, FiberFlags, FiberId};
pub use dom::{create_element, define_element, is_defined, DomElement, DomNode, NodeRef, PlainElement};
pub use element::{Element, ElementKind};

use thiserror::Error;

use crate::host::HostError;

/// Errors surfaced from a render commit.
///
/// The engine itself does not fail; everything here originates in a host
/// configuration reached through a custom element or an observer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Host(#[from] HostError),
}
