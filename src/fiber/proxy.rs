//! Proxy elements.
//!
//! A proxy element is the synthetic stand-in inserted wherever the engine
//! expects a platform element, so the engine's built-in structural
//! operations have something DOM-shaped to call. Each override forwards
//! the effect to the owning container's host configuration, then still
//! performs the underlying operation so the element tree the engine
//! tracks stays consistent for future passes.
//!
//! The container root is itself a proxy element with no fiber; the
//! instance-vs-container dichotomy in each override comes from that.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::host::{HostConfig, HostError};
use crate::types::{Instance, Value, NODE_BACKREF_PROP};
use crate::vdom::diff::{fiber_exists, with_fiber, with_fiber_mut};
use crate::vdom::dom::{DomElement, DomNode, PlainElement};
use crate::vdom::FiberId;

// =============================================================================
// Container State
// =============================================================================

/// Host configuration and embedder container info stamped onto a container
/// root. Immutable for the container's lifetime.
#[derive(Clone)]
pub(crate) struct ContainerState {
    pub host: Rc<dyn HostConfig>,
    pub info: Rc<dyn Any>,
}

// =============================================================================
// Proxy Element
// =============================================================================

/// Synthetic element backing one managed virtual node, or a container root.
pub struct ProxyElement {
    base: PlainElement,
    /// Back-reference to the owning fiber; absent on container roots.
    fiber: Cell<Option<FiberId>>,
    /// Present iff this proxy is a container root.
    container: Option<ContainerState>,
    /// Mirror of the fiber's backing instance, so structural overrides and
    /// the disposal walk need no live fiber.
    instance: RefCell<Option<Instance>>,
}

impl ProxyElement {
    /// Element for a managed node; the fiber back-reference arrives via
    /// the reserved prop during the attribute pass.
    pub fn create(tag: &str) -> DomNode {
        Rc::new(RefCell::new(Self {
            base: PlainElement::new(tag),
            fiber: Cell::new(None),
            container: None,
            instance: RefCell::new(None),
        }))
    }

    /// Container root bound to a host configuration.
    pub(crate) fn create_container(
        tag: &str,
        host: Rc<dyn HostConfig>,
        info: Rc<dyn Any>,
    ) -> DomNode {
        Rc::new(RefCell::new(Self {
            base: PlainElement::new(tag),
            fiber: Cell::new(None),
            container: Some(ContainerState { host, info }),
            instance: RefCell::new(None),
        }))
    }

    pub(crate) fn is_container(&self) -> bool {
        self.container.is_some()
    }

    pub(crate) fn container_state(&self) -> Option<ContainerState> {
        self.container.clone()
    }

    pub(crate) fn fiber_id(&self) -> Option<FiberId> {
        self.fiber.get()
    }

    pub(crate) fn instance(&self) -> Option<Instance> {
        self.instance.borrow().clone()
    }

    pub(crate) fn set_instance(&self, instance: Option<Instance>) {
        *self.instance.borrow_mut() = instance;
    }

    fn take_instance(&self) -> Option<Instance> {
        self.instance.borrow_mut().take()
    }

    /// Host configuration reaching this proxy: its own when it is the
    /// container root, otherwise the one on the container its fiber links
    /// to.
    fn host_state(&self) -> Option<ContainerState> {
        if let Some(state) = &self.container {
            return Some(state.clone());
        }
        let fiber = self.fiber.get()?;
        let container = with_fiber(fiber, |f| f.container.clone())?;
        container_state_of_node(&container)
    }
}

/// Container state carried by a node, if it is a container-root proxy.
pub(crate) fn container_state_of_node(node: &DomNode) -> Option<ContainerState> {
    node.borrow()
        .as_any()
        .downcast_ref::<ProxyElement>()
        .and_then(|proxy| proxy.container_state())
}

/// Backing instance of a node, if it is a managed proxy.
pub(crate) fn instance_of_node(node: &DomNode) -> Option<Instance> {
    node.borrow()
        .as_any()
        .downcast_ref::<ProxyElement>()
        .and_then(|proxy| proxy.instance())
}

/// Mirror `instance` into the proxy behind `node`.
pub(crate) fn set_node_instance(node: &DomNode, instance: Option<Instance>) {
    if let Some(proxy) = node.borrow().as_any().downcast_ref::<ProxyElement>() {
        proxy.set_instance(instance);
    }
}

// =============================================================================
// Disposal
// =============================================================================

/// Depth-first disposal of every instance under `node`, children before
/// parents. The first error aborts the walk; deeper siblings that were
/// already disposed stay disposed.
fn dispose_subtree(host: &Rc<dyn HostConfig>, node: &DomNode) -> Result<(), HostError> {
    let children = node.borrow().child_nodes();
    for child in &children {
        dispose_subtree(host, child)?;
    }

    let borrowed = node.borrow();
    if let Some(proxy) = borrowed.as_any().downcast_ref::<ProxyElement>() {
        if let Some(instance) = proxy.take_instance() {
            host.dispose(&instance)?;
            if let Some(fiber) = proxy.fiber_id() {
                if fiber_exists(fiber) {
                    with_fiber_mut(fiber, |f| f.state_node = None);
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// DomElement Overrides
// =============================================================================

impl DomElement for ProxyElement {
    fn tag(&self) -> &str {
        self.base.tag()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        if name == NODE_BACKREF_PROP {
            if let Value::Handle(id) = value {
                self.fiber.set(Some(id));
            }
            return;
        }
        self.base.set_attribute(name, value);
    }

    fn remove_attribute(&mut self, name: &str) {
        if name == NODE_BACKREF_PROP {
            return;
        }
        self.base.remove_attribute(name);
    }

    fn append_child(&mut self, child: &DomNode) -> Result<(), HostError> {
        if let Some(child_instance) = instance_of_node(child) {
            if self.fiber.get().is_some() {
                if let (Some(state), Some(parent_instance)) = (self.host_state(), self.instance())
                {
                    state.host.append_child(&parent_instance, &child_instance)?;
                }
            } else if let Some(state) = &self.container {
                state
                    .host
                    .append_child_to_container(&state.info, &child_instance)?;
            }
        }
        self.base.append_child(child)
    }

    fn insert_before(
        &mut self,
        child: &DomNode,
        before: Option<&DomNode>,
    ) -> Result<(), HostError> {
        let Some(before) = before else {
            return self.append_child(child);
        };

        if let Some(child_instance) = instance_of_node(child) {
            let before_instance = instance_of_node(before);
            if self.fiber.get().is_some() {
                if let (Some(state), Some(parent_instance)) = (self.host_state(), self.instance())
                {
                    match &before_instance {
                        Some(before_instance) => state.host.insert_before(
                            &parent_instance,
                            &child_instance,
                            before_instance,
                        )?,
                        None => state.host.append_child(&parent_instance, &child_instance)?,
                    }
                }
            } else if let Some(state) = &self.container {
                match &before_instance {
                    Some(before_instance) => state.host.insert_in_container_before(
                        &state.info,
                        &child_instance,
                        before_instance,
                    )?,
                    None => state
                        .host
                        .append_child_to_container(&state.info, &child_instance)?,
                }
            }
        }
        self.base.insert_before(child, Some(before))
    }

    fn remove_child(&mut self, child: &DomNode) -> Result<(), HostError> {
        if let Some(child_instance) = instance_of_node(child) {
            let state = if self.fiber.get().is_some() {
                let state = self.host_state();
                if let (Some(state), Some(parent_instance)) = (&state, self.instance()) {
                    state.host.remove_child(&parent_instance, &child_instance)?;
                }
                state
            } else if let Some(state) = self.container.clone() {
                state
                    .host
                    .remove_child_from_container(&state.info, &child_instance)?;
                Some(state)
            } else {
                None
            };

            if let Some(state) = state {
                dispose_subtree(&state.host, child)?;
            }
        }
        self.base.remove_child(child)
    }

    fn child_nodes(&self) -> Vec<DomNode> {
        self.base.child_nodes()
    }

    fn index_of(&self, child: &DomNode) -> Option<usize> {
        self.base.index_of(child)
    }
}
