//! Reconciler adapter.
//!
//! Makes an externally supplied host configuration reachable from the
//! virtual-DOM engine, which has no native concept of a pluggable
//! renderer. The adapter fabricates one proxy element per managed node and
//! redirects every structural mutation the engine performs on it to the
//! host configuration; see [`adapter`] for the hook-level state machine
//! and [`proxy`] for the structural overrides.
//!
//! The public surface mirrors the conventional renderer shape, so
//! existing component trees can be mounted without modification:
//! [`Reconciler::create_container`], [`Reconciler::update_container`],
//! [`Reconciler::create_portal`], [`Reconciler::inject_into_devtools`].

pub mod adapter;
pub mod proxy;

pub use proxy::ProxyElement;

use std::any::Any;
use std::rc::Rc;

use crate::host::HostConfig;
use crate::types::{Cleanup, Props};
use crate::vdom::element::{Element, ElementKind};
use crate::vdom::{self, DomNode, RenderError};

// =============================================================================
// Reconciler
// =============================================================================

/// A container root: the mount target binding one host configuration to
/// one foreign graph.
pub type ContainerHandle = DomNode;

/// One renderer over one host configuration.
///
/// Constructing several renderers in a process is fine; the underlying
/// interception installs once and containers carry their own host
/// configuration, so independent renderers never interfere.
pub struct Reconciler {
    host: Rc<dyn HostConfig>,
    proxy_tag: String,
}

impl Reconciler {
    pub fn new(host: Rc<dyn HostConfig>) -> Self {
        let proxy_tag = adapter::ensure_installed();
        Self { host, proxy_tag }
    }

    /// Allocate a container root over `container_info` (e.g. a scene).
    ///
    /// The container holds the host configuration and the info for its
    /// whole lifetime; release it by unmounting.
    pub fn create_container(&self, container_info: Rc<dyn Any>) -> ContainerHandle {
        log::debug!("create container");
        ProxyElement::create_container(&self.proxy_tag, self.host.clone(), container_info)
    }

    /// Mount, update, or (with `None`) unmount a tree in `container`.
    ///
    /// `callback` runs after the commit completes.
    pub fn update_container(
        &self,
        element: Option<Element>,
        container: &ContainerHandle,
        callback: Option<Cleanup>,
    ) -> Result<(), RenderError> {
        vdom::render(element, container)?;
        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }

    /// An element whose children mount against `container` instead of the
    /// position in the tree it occupies.
    pub fn create_portal(&self, children: Vec<Element>, container: &ContainerHandle) -> Element {
        Element {
            kind: ElementKind::Portal(container.clone()),
            props: Props::new(),
            reference: None,
            children,
        }
    }

    /// Extension point retained for interface parity with tooling.
    pub fn inject_into_devtools<T>(&self, _config: T) {}
}
