//! Hook installation and the per-node commit state machine.
//!
//! The adapter never initiates work. It registers two observers on the
//! engine's extension points and reacts to the traversal:
//!
//! - before-diff: decide whether the node is container-managed; if so,
//!   rewrite its reported tag to the proxy tag and stash a back-reference
//!   in its props so the proxy's structural overrides can reach back here.
//!   Nodes outside any container are left untouched, which is the escape
//!   hatch for mixing managed and unmanaged subtrees.
//! - after-diff: first visit creates the backing instance (back-filling
//!   ancestors so parents have instances before any child is placed),
//!   wraps the ref so it observes public instances, and runs the
//!   finalize/commit-mount handshake; later visits run the
//!   prepare-update/commit-update handshake and refresh the committed
//!   snapshot.
//!
//! Installation happens once per process, keyed by a monotonically
//! generated proxy tag, so any number of independently constructed
//! renderers share one interception and coexist without collision.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::host::HostConfig;
use crate::types::{Cleanup, Instance, Ref, RefCallback, Value, NODE_BACKREF_PROP};
use crate::vdom::diff::{fiber_exists, with_fiber, with_fiber_mut};
use crate::vdom::dom::DomNode;
use crate::vdom::element::ElementKind;
use crate::vdom::{self, options, FiberFlags, FiberId, RenderError};

use super::proxy::{container_state_of_node, set_node_instance, ContainerState, ProxyElement};

// =============================================================================
// Installation
// =============================================================================

thread_local! {
    /// Proxy tag once installed. One interception per process.
    static INSTALLED: RefCell<Option<String>> = const { RefCell::new(None) };

    /// Monotonic source for generated proxy tags.
    static PROXY_SEQ: Cell<usize> = const { Cell::new(0) };
}

/// Install the proxy tag and the diff observers, once. Returns the tag in
/// use; repeated calls (further renderer constructions) reuse it.
pub(crate) fn ensure_installed() -> String {
    if let Some(tag) = INSTALLED.with(|installed| installed.borrow().clone()) {
        return tag;
    }

    let tag = loop {
        let n = PROXY_SEQ.with(|seq| {
            let n = seq.get();
            seq.set(n + 1);
            n
        });
        let candidate = format!("fiber-proxy-{n}");
        if vdom::define_element(&candidate, Rc::new(ProxyElement::create)) {
            break candidate;
        }
    };

    options::on_before_diff(Rc::new(before_diff));
    options::on_diffed(Rc::new(diffed));
    INSTALLED.with(|installed| *installed.borrow_mut() = Some(tag.clone()));
    log::debug!("installed reconciler proxy tag `{tag}`");
    tag
}

// =============================================================================
// Before-Diff: Container Linking
// =============================================================================

fn before_diff(id: FiberId) -> Result<(), RenderError> {
    let (is_tag, linked) = with_fiber(id, |f| {
        (
            matches!(f.kind, ElementKind::Tag(_)),
            f.flags.contains(FiberFlags::LINKED),
        )
    });
    if !is_tag {
        return Ok(());
    }

    if !linked {
        let container = find_container(id);
        let managed = container
            .as_ref()
            .map(|node| container_state_of_node(node).is_some())
            .unwrap_or(false);

        let proxy_tag = INSTALLED.with(|installed| installed.borrow().clone());
        with_fiber_mut(id, |f| {
            f.flags.insert(FiberFlags::LINKED);
            if managed {
                if let (Some(proxy_tag), ElementKind::Tag(tag)) = (proxy_tag, f.kind.clone()) {
                    f.container = container;
                    f.intrinsic = Some(tag);
                    f.kind = ElementKind::Tag(proxy_tag);
                    f.flags.insert(FiberFlags::MANAGED);
                }
            }
        });
    }

    // Prop maps are rebuilt every pass; re-stash the back-reference so the
    // attribute pass always delivers it to the proxy.
    with_fiber_mut(id, |f| {
        if f.flags.contains(FiberFlags::MANAGED) {
            f.props
                .values
                .insert(NODE_BACKREF_PROP.to_string(), Value::Handle(id));
        }
    });
    Ok(())
}

/// Walk the ancestor chain to the nearest container: a portal boundary
/// redirects to its target, otherwise the root element the tree was
/// mounted into.
fn find_container(id: FiberId) -> Option<DomNode> {
    let mut current = id;
    loop {
        if let Some(cached) = with_fiber(current, |f| f.container.clone()) {
            return Some(cached);
        }
        if current != id {
            if let Some(target) = with_fiber(current, |f| match &f.kind {
                ElementKind::Portal(target) => Some(target.clone()),
                _ => None,
            }) {
                return Some(target);
            }
        }
        match with_fiber(current, |f| (f.parent, f.root_dom.clone())) {
            (Some(parent), _) => current = parent,
            (None, root) => return root,
        }
    }
}

// =============================================================================
// After-Diff: Commit and Update
// =============================================================================

fn diffed(id: FiberId) -> Result<(), RenderError> {
    // Back-fill up the ancestor chain: by the time this node is placed
    // into its parent element, the parent must already have an instance.
    let mut next = Some(id);
    while let Some(current) = next {
        let pending = with_fiber(current, |f| {
            f.flags.contains(FiberFlags::MANAGED) && f.state_node.is_none()
        });
        if pending {
            create_instance_for(current)?;
        }
        next = with_fiber(current, |f| f.parent);
    }

    if !with_fiber(id, |f| f.flags.contains(FiberFlags::MANAGED)) {
        return Ok(());
    }
    let Some(state) = container_state_of(id) else {
        return Ok(());
    };

    wrap_ref_if_needed(id, &state.host);

    let (instance, tag, props, memoized) = with_fiber(id, |f| {
        (
            f.state_node.clone(),
            f.intrinsic.clone().unwrap_or_default(),
            f.props.clone(),
            f.memoized_props.clone(),
        )
    });
    let Some(instance) = instance else {
        return Ok(());
    };

    match memoized {
        None => {
            // First commit.
            if state
                .host
                .finalize_initial_children(&instance, &tag, &props, &state.info)
            {
                state.host.commit_mount(&instance, &tag, &props, id);
            }
        }
        Some(old) => {
            if let Some(payload) = state.host.prepare_update(&instance, &tag, &old, &props) {
                let replacement = state
                    .host
                    .commit_update(&instance, payload, &tag, &old, &props)
                    .map_err(RenderError::Host)?;
                if let Some(replacement) = replacement {
                    log::debug!("recreated instance for <{tag}>");
                    install_instance(id, replacement);
                    refire_ref(id);
                }
            }
        }
    }

    // Committed snapshot refreshes on every visit, update or not.
    with_fiber_mut(id, |f| f.memoized_props = Some(f.props.clone()));
    Ok(())
}

fn container_state_of(id: FiberId) -> Option<ContainerState> {
    let container = with_fiber(id, |f| f.container.clone())?;
    container_state_of_node(&container)
}

fn create_instance_for(id: FiberId) -> Result<(), RenderError> {
    let Some(state) = container_state_of(id) else {
        return Ok(());
    };
    let (tag, props) = with_fiber(id, |f| (f.intrinsic.clone().unwrap_or_default(), f.props.clone()));

    let instance = state
        .host
        .create_instance(&tag, &props, &state.info, id)
        .map_err(RenderError::Host)?;
    log::debug!("created instance for <{tag}>");

    install_instance(id, instance);
    wrap_ref_if_needed(id, &state.host);
    Ok(())
}

/// Install `instance` on the fiber and mirror it into the proxy element.
fn install_instance(id: FiberId, instance: Instance) {
    let dom = with_fiber_mut(id, |f| {
        f.state_node = Some(instance.clone());
        f.dom.clone()
    });
    if let Some(dom) = dom {
        set_node_instance(&dom, Some(instance));
    }
}

// =============================================================================
// Ref Indirection
// =============================================================================

/// Substitute the user's ref with a wrapper that observes the host
/// configuration's public instance instead of the proxy element. The
/// wrapper reads the live instance at fire time, so instance swaps are
/// picked up by simply firing it again.
fn wrap_ref_if_needed(id: FiberId, host: &Rc<dyn HostConfig>) {
    let needs = with_fiber(id, |f| {
        f.user_ref.is_some() && !f.flags.contains(FiberFlags::REF_WRAPPED)
    });
    if !needs {
        return;
    }
    let Some(user) = with_fiber(id, |f| f.user_ref.clone()) else {
        return;
    };

    let host = host.clone();
    let user_cleanup: Rc<RefCell<Option<Cleanup>>> = Rc::new(RefCell::new(None));
    let wrapped: RefCallback = Rc::new(move |value| {
        let public = match value {
            Some(_) if fiber_exists(id) => with_fiber(id, |f| f.state_node.clone())
                .map(|instance| host.get_public_instance(&instance)),
            _ => None,
        };
        match &user {
            Ref::Object(slot) => {
                *slot.borrow_mut() = public;
            }
            Ref::Callback(callback) => {
                if public.is_some() {
                    *user_cleanup.borrow_mut() = callback(public);
                } else {
                    let pending = user_cleanup.borrow_mut().take();
                    match pending {
                        Some(cleanup) => cleanup(),
                        None => {
                            callback(None);
                        }
                    }
                }
            }
        }
        None
    });

    with_fiber_mut(id, |f| {
        f.reference = Some(Ref::Callback(wrapped));
        f.flags.insert(FiberFlags::REF_WRAPPED);
    });
}

/// Re-fire the wrapped ref after an instance swap.
fn refire_ref(id: FiberId) {
    if let Some(Ref::Callback(callback)) = with_fiber(id, |f| f.reference.clone()) {
        callback(Some(Rc::new(())));
    }
}
