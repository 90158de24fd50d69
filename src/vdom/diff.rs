//! Fiber tree and reconciliation.
//!
//! The engine retains one fiber per mounted element and diffs each render
//! pass's descriptor tree against it:
//!
//! ```text
//! Element tree ── reconcile ──> Fiber tree ── placement ──> DomElement tree
//! ```
//!
//! Visit protocol per node: before-diff observers, attribute pass,
//! children, after-diff observers, ref. Placement of a node into its
//! parent element happens after the node's own subtree has been processed,
//! so observers that install backing state during the after-diff visit see
//! it in place before any structural call touches it.
//!
//! Fibers live in a thread-local slab with index reuse; ids are plain
//! indices and must not be held across an unmount.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;

use crate::types::{Cleanup, Instance, Props, Ref, Value};

use super::dom::{self, DomNode, NodeRef};
use super::element::{Element, ElementKind};
use super::{options, RenderError};

// =============================================================================
// Fiber
// =============================================================================

/// Index of a fiber in the engine slab.
pub type FiberId = usize;

bitflags! {
    /// Per-fiber lifecycle flags. `LINKED`/`MANAGED`/`REF_WRAPPED` are
    /// written by renderers observing the traversal, not by the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FiberFlags: u8 {
        /// Container lookup has been performed for this fiber.
        const LINKED = 1 << 0;
        /// The fiber belongs to a managed container subtree.
        const MANAGED = 1 << 1;
        /// The user ref has been substituted with a renderer wrapper.
        const REF_WRAPPED = 1 << 2;
    }
}

/// Retained per-element record.
///
/// The engine owns structure (`kind`, `dom`, `parent`, `children`) and the
/// attribute bookkeeping; renderers attach `intrinsic`, `state_node`,
/// `memoized_props` and `container` through the observer hooks and the
/// accessors below.
pub struct Fiber {
    pub id: FiberId,
    pub kind: ElementKind,
    /// True intrinsic tag before any proxy rewrite.
    pub intrinsic: Option<String>,
    /// Props of the current render pass.
    pub props: Props,
    /// Props as committed last pass. Present iff the node committed once.
    pub memoized_props: Option<Props>,
    /// Backing host instance, installed during the after-diff visit.
    pub state_node: Option<Instance>,
    /// Nearest container root element, cached after the first lookup.
    pub container: Option<DomNode>,
    pub dom: Option<DomNode>,
    pub parent: Option<FiberId>,
    pub children: Vec<FiberId>,
    /// Ref the engine fires; renderers may substitute a wrapper.
    pub reference: Option<Ref>,
    /// Ref as supplied by the user, for identity comparison.
    pub user_ref: Option<Ref>,
    ref_cleanup: Option<Cleanup>,
    /// Root element this fiber was mounted directly under, if any.
    pub root_dom: Option<DomNode>,
    /// Attributes last applied to the backing element.
    prev_attrs: HashMap<String, Value>,
    pub flags: FiberFlags,
}

// =============================================================================
// Slab
// =============================================================================

struct RootEntry {
    dom: DomNode,
    child: Option<FiberId>,
}

thread_local! {
    static FIBERS: RefCell<Vec<Option<Rc<RefCell<Fiber>>>>> = RefCell::new(Vec::new());
    static FREE_FIBERS: RefCell<Vec<usize>> = RefCell::new(Vec::new());
    static ROOTS: RefCell<Vec<RootEntry>> = RefCell::new(Vec::new());
}

fn alloc_fiber(element: &Element, parent: Option<FiberId>, root_dom: Option<DomNode>) -> FiberId {
    let make = |id: FiberId| Fiber {
        id,
        kind: element.kind.clone(),
        intrinsic: None,
        props: element.props.clone(),
        memoized_props: None,
        state_node: None,
        container: None,
        dom: None,
        parent,
        children: Vec::new(),
        reference: element.reference.clone(),
        user_ref: element.reference.clone(),
        ref_cleanup: None,
        root_dom,
        prev_attrs: HashMap::new(),
        flags: FiberFlags::empty(),
    };

    FIBERS.with(|fibers| {
        let mut fibers = fibers.borrow_mut();
        if let Some(id) = FREE_FIBERS.with(|free| free.borrow_mut().pop()) {
            fibers[id] = Some(Rc::new(RefCell::new(make(id))));
            id
        } else {
            let id = fibers.len();
            fibers.push(Some(Rc::new(RefCell::new(make(id)))));
            id
        }
    })
}

fn free_fiber(id: FiberId) {
    FIBERS.with(|fibers| fibers.borrow_mut()[id] = None);
    FREE_FIBERS.with(|free| free.borrow_mut().push(id));
}

fn fiber_cell(id: FiberId) -> Rc<RefCell<Fiber>> {
    FIBERS.with(|fibers| {
        fibers.borrow()[id]
            .clone()
            .unwrap_or_else(|| panic!("fiber {id} accessed after free"))
    })
}

/// Whether `id` currently names a live fiber.
pub fn fiber_exists(id: FiberId) -> bool {
    FIBERS.with(|fibers| {
        let fibers = fibers.borrow();
        id < fibers.len() && fibers[id].is_some()
    })
}

/// Read access to a fiber. Panics if the id is stale.
pub fn with_fiber<R>(id: FiberId, f: impl FnOnce(&Fiber) -> R) -> R {
    let cell = fiber_cell(id);
    let fiber = cell.borrow();
    f(&fiber)
}

/// Write access to a fiber. Panics if the id is stale.
pub fn with_fiber_mut<R>(id: FiberId, f: impl FnOnce(&mut Fiber) -> R) -> R {
    let cell = fiber_cell(id);
    let mut fiber = cell.borrow_mut();
    f(&mut fiber)
}

/// Drop all fibers and roots. Test support.
pub fn reset_engine() {
    FIBERS.with(|fibers| fibers.borrow_mut().clear());
    FREE_FIBERS.with(|free| free.borrow_mut().clear());
    ROOTS.with(|roots| roots.borrow_mut().clear());
}

// =============================================================================
// Render Entrypoint
// =============================================================================

/// Reconcile `element` into `root`.
///
/// `None` unmounts whatever the previous pass left there. Synchronous: all
/// observer and element effects have run by the time this returns.
pub fn render(element: Option<Element>, root: &DomNode) -> Result<(), RenderError> {
    let entry = ROOTS.with(|roots| {
        let mut roots = roots.borrow_mut();
        if let Some(at) = roots.iter().position(|e| Rc::ptr_eq(&e.dom, root)) {
            at
        } else {
            roots.push(RootEntry {
                dom: root.clone(),
                child: None,
            });
            roots.len() - 1
        }
    });
    let existing = ROOTS.with(|roots| roots.borrow()[entry].child);

    match (existing, element) {
        (None, Some(el)) => {
            let id = mount(el, None, root, Some(root.clone()))?;
            ROOTS.with(|roots| roots.borrow_mut()[entry].child = Some(id));
            place_children(root, &[id])?;
        }
        (Some(fid), Some(el)) => {
            if same_type(fid, &el) {
                update(fid, el, root)?;
                place_children(root, &[fid])?;
            } else {
                unmount(fid, root, true)?;
                let id = mount(el, None, root, Some(root.clone()))?;
                ROOTS.with(|roots| roots.borrow_mut()[entry].child = Some(id));
                place_children(root, &[id])?;
            }
        }
        (Some(fid), None) => {
            unmount(fid, root, true)?;
            ROOTS.with(|roots| roots.borrow_mut()[entry].child = None);
        }
        (None, None) => {}
    }
    Ok(())
}

// =============================================================================
// Mount / Update
// =============================================================================

fn mount(
    element: Element,
    parent: Option<FiberId>,
    inherited_dom: &DomNode,
    root_dom: Option<DomNode>,
) -> Result<FiberId, RenderError> {
    let id = alloc_fiber(&element, parent, root_dom);
    log::trace!("mount fiber {id}");

    options::run_before_diff(id)?;

    // Create the backing element for the (possibly rewritten) tag and run
    // the attribute pass.
    let kind = with_fiber(id, |f| f.kind.clone());
    if let ElementKind::Tag(tag) = &kind {
        let node = dom::create_element(tag);
        let values = with_fiber(id, |f| f.props.values.clone());
        {
            let mut node_mut = node.borrow_mut();
            for (name, value) in &values {
                node_mut.set_attribute(name, value.clone());
            }
        }
        with_fiber_mut(id, |f| {
            f.dom = Some(node.clone());
            f.prev_attrs = values;
        });
    }

    let children_dom = child_target(id, &kind, inherited_dom);
    reconcile_children(id, &children_dom, element.children)?;

    options::run_diffed(id)?;
    fire_ref_attach(id);
    Ok(id)
}

fn update(id: FiberId, element: Element, inherited_dom: &DomNode) -> Result<(), RenderError> {
    let ref_changed = with_fiber(id, |f| {
        !Ref::same(f.user_ref.as_ref(), element.reference.as_ref())
    });
    if ref_changed {
        fire_ref_detach(id);
        with_fiber_mut(id, |f| {
            f.user_ref = element.reference.clone();
            f.reference = element.reference.clone();
            f.flags.remove(FiberFlags::REF_WRAPPED);
        });
    }

    with_fiber_mut(id, |f| f.props = element.props);
    options::run_before_diff(id)?;

    // Attribute diff against what the element last saw.
    let kind = with_fiber(id, |f| f.kind.clone());
    if matches!(kind, ElementKind::Tag(_)) {
        let (node, prev, next) = with_fiber(id, |f| {
            (
                f.dom.clone().expect("tag fiber without element"),
                f.prev_attrs.clone(),
                f.props.values.clone(),
            )
        });
        {
            let mut node_mut = node.borrow_mut();
            for (name, value) in &next {
                if prev.get(name) != Some(value) {
                    node_mut.set_attribute(name, value.clone());
                }
            }
            for name in prev.keys() {
                if !next.contains_key(name) {
                    node_mut.remove_attribute(name);
                }
            }
        }
        with_fiber_mut(id, |f| f.prev_attrs = next);
    }

    let children_dom = child_target(id, &kind, inherited_dom);
    reconcile_children(id, &children_dom, element.children)?;

    options::run_diffed(id)?;
    if ref_changed {
        fire_ref_attach(id);
    }
    Ok(())
}

/// Element into which this fiber's children are placed.
fn child_target(id: FiberId, kind: &ElementKind, inherited_dom: &DomNode) -> DomNode {
    match kind {
        ElementKind::Tag(_) => with_fiber(id, |f| f.dom.clone().expect("tag fiber without element")),
        ElementKind::Fragment => inherited_dom.clone(),
        ElementKind::Portal(target) => target.clone(),
    }
}

// =============================================================================
// Child Reconciliation
// =============================================================================

fn same_type(id: FiberId, element: &Element) -> bool {
    with_fiber(id, |f| match (&element.kind, &f.kind) {
        (ElementKind::Tag(tag), _) => {
            f.intrinsic.as_deref() == Some(tag.as_str())
                || matches!(&f.kind, ElementKind::Tag(t) if t == tag)
        }
        (ElementKind::Fragment, ElementKind::Fragment) => true,
        (ElementKind::Portal(a), ElementKind::Portal(b)) => Rc::ptr_eq(a, b),
        _ => false,
    })
}

fn find_match(old: &[FiberId], used: &[bool], element: &Element) -> Option<usize> {
    for (at, fid) in old.iter().enumerate() {
        if used[at] || !same_type(*fid, element) {
            continue;
        }
        let old_key = with_fiber(*fid, |f| f.props.key.clone());
        match (&element.props.key, old_key) {
            (Some(key), Some(old_key)) if *key == old_key => return Some(at),
            (None, None) => return Some(at),
            _ => continue,
        }
    }
    None
}

fn reconcile_children(
    owner: FiberId,
    parent_dom: &DomNode,
    elements: Vec<Element>,
) -> Result<(), RenderError> {
    let old = with_fiber(owner, |f| f.children.clone());
    let mut used = vec![false; old.len()];
    let mut next = Vec::with_capacity(elements.len());

    for element in elements {
        match find_match(&old, &used, &element) {
            Some(at) => {
                used[at] = true;
                update(old[at], element, parent_dom)?;
                next.push(old[at]);
            }
            None => {
                next.push(mount(element, Some(owner), parent_dom, None)?);
            }
        }
    }

    for (at, fid) in old.iter().enumerate() {
        if !used[at] {
            unmount(*fid, parent_dom, true)?;
        }
    }

    with_fiber_mut(owner, |f| f.children = next.clone());
    place_children(parent_dom, &next)
}

// =============================================================================
// Placement
// =============================================================================

/// Element nodes contributed by a fiber, in tree order. Fragments flatten;
/// portal content lives elsewhere and contributes nothing here.
fn collect_doms(id: FiberId, out: &mut Vec<DomNode>) {
    let (kind, dom, children) =
        with_fiber(id, |f| (f.kind.clone(), f.dom.clone(), f.children.clone()));
    match kind {
        ElementKind::Tag(_) => {
            if let Some(dom) = dom {
                out.push(dom);
            }
        }
        ElementKind::Fragment => {
            for child in children {
                collect_doms(child, out);
            }
        }
        ElementKind::Portal(_) => {}
    }
}

/// Bring `parent_dom`'s child order in line with `child_ids`.
///
/// Nodes already in relative order stay put; everything else is inserted
/// before the next settled sibling, in declared order. Appends therefore
/// surface as `append_child` and reorders as `insert_before`.
fn place_children(parent_dom: &DomNode, child_ids: &[FiberId]) -> Result<(), RenderError> {
    let mut desired: Vec<DomNode> = Vec::new();
    for id in child_ids {
        collect_doms(*id, &mut desired);
    }
    if desired.is_empty() {
        return Ok(());
    }

    let current: Vec<DomNode> = parent_dom
        .borrow()
        .child_nodes()
        .into_iter()
        .filter(|c| desired.iter().any(|d| Rc::ptr_eq(c, d)))
        .collect();

    // Greedy common subsequence: these keep their positions.
    let mut stable = vec![false; desired.len()];
    let mut from = 0;
    for node in &current {
        if let Some(offset) = desired[from..].iter().position(|d| Rc::ptr_eq(node, d)) {
            stable[from + offset] = true;
            from += offset + 1;
        }
    }

    for at in 0..desired.len() {
        if stable[at] {
            continue;
        }
        let anchor = desired[at + 1..]
            .iter()
            .zip(&stable[at + 1..])
            .find(|(_, settled)| **settled)
            .map(|(node, _)| node.clone());
        let mut parent = parent_dom.borrow_mut();
        match anchor {
            Some(anchor) => parent.insert_before(&desired[at], Some(&anchor))?,
            None => parent.append_child(&desired[at])?,
        }
        stable[at] = true;
    }
    Ok(())
}

// =============================================================================
// Unmount
// =============================================================================

fn unmount(id: FiberId, parent_dom: &DomNode, remove_dom: bool) -> Result<(), RenderError> {
    log::trace!("unmount fiber {id}");
    options::run_unmount(id);
    fire_ref_detach(id);

    let (kind, dom, children) =
        with_fiber(id, |f| (f.kind.clone(), f.dom.clone(), f.children.clone()));

    match &kind {
        ElementKind::Portal(target) => {
            // Portal content lives in another tree and is removed there.
            for child in children {
                unmount(child, target, true)?;
            }
        }
        _ => {
            let child_dom = dom.clone().unwrap_or_else(|| parent_dom.clone());
            // Once an element is removed, its subtree goes with it; only
            // fibers without an element of their own pass removal down.
            let child_remove = dom.is_none() && remove_dom;
            for child in children {
                unmount(child, &child_dom, child_remove)?;
            }
        }
    }

    if remove_dom {
        if let Some(dom) = dom {
            parent_dom.borrow_mut().remove_child(&dom)?;
        }
    }
    free_fiber(id);
    Ok(())
}

// =============================================================================
// Refs
// =============================================================================

fn public_value(id: FiberId) -> Instance {
    match with_fiber(id, |f| f.dom.clone()) {
        Some(dom) => Rc::new(NodeRef(dom)),
        None => Rc::new(()),
    }
}

fn fire_ref_attach(id: FiberId) {
    let reference = with_fiber(id, |f| f.reference.clone());
    match reference {
        None => {}
        Some(Ref::Object(slot)) => {
            *slot.borrow_mut() = Some(public_value(id));
        }
        Some(Ref::Callback(callback)) => {
            let cleanup = callback(Some(public_value(id)));
            with_fiber_mut(id, |f| f.ref_cleanup = cleanup);
        }
    }
}

fn fire_ref_detach(id: FiberId) {
    let (reference, cleanup) =
        with_fiber_mut(id, |f| (f.reference.clone(), f.ref_cleanup.take()));
    match reference {
        None => {}
        Some(Ref::Object(slot)) => {
            *slot.borrow_mut() = None;
        }
        Some(Ref::Callback(callback)) => match cleanup {
            Some(cleanup) => cleanup(),
            None => {
                callback(None);
            }
        },
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdom::dom::PlainElement;

    fn setup() -> DomNode {
        reset_engine();
        options::reset_observers();
        PlainElement::create("root")
    }

    fn child_tags(node: &DomNode) -> Vec<String> {
        node.borrow()
            .child_nodes()
            .iter()
            .map(|n| n.borrow().tag().to_string())
            .collect()
    }

    #[test]
    fn test_mount_update_unmount() {
        let root = setup();

        render(Some(Element::tag("a").prop("x", 1.0)), &root).unwrap();
        assert_eq!(child_tags(&root), ["a"]);

        // Same type updates in place.
        render(Some(Element::tag("a").prop("x", 2.0)), &root).unwrap();
        assert_eq!(child_tags(&root), ["a"]);

        // Different type remounts.
        render(Some(Element::tag("b")), &root).unwrap();
        assert_eq!(child_tags(&root), ["b"]);

        render(None, &root).unwrap();
        assert!(child_tags(&root).is_empty());
    }

    #[test]
    fn test_keyed_reorder() {
        let root = setup();
        let list = |keys: &[&str]| {
            Element::tag("list").children(
                keys.iter()
                    .map(|k| Element::tag("item").key(*k).prop("label", *k))
                    .collect::<Vec<_>>(),
            )
        };

        render(Some(list(&["a", "b", "c"])), &root).unwrap();
        let list_dom = root.borrow().child_nodes()[0].clone();
        let order_before = list_dom.borrow().child_nodes();

        render(Some(list(&["c", "a", "b"])), &root).unwrap();
        let order_after = list_dom.borrow().child_nodes();

        // Same three elements, rotated.
        assert_eq!(order_after.len(), 3);
        assert!(Rc::ptr_eq(&order_after[0], &order_before[2]));
        assert!(Rc::ptr_eq(&order_after[1], &order_before[0]));
        assert!(Rc::ptr_eq(&order_after[2], &order_before[1]));
    }

    #[test]
    fn test_fragment_flattens() {
        let root = setup();
        let tree = Element::fragment(vec![
            Element::tag("a"),
            Element::fragment(vec![Element::tag("b"), Element::tag("c")]),
        ]);
        render(Some(tree), &root).unwrap();
        assert_eq!(child_tags(&root), ["a", "b", "c"]);

        render(None, &root).unwrap();
        assert!(child_tags(&root).is_empty());
    }

    #[test]
    fn test_slot_ref_lifecycle() {
        let root = setup();
        let (reference, slot) = Ref::slot();

        render(Some(Element::tag("a").reference(reference)), &root).unwrap();
        assert!(slot.borrow().is_some());

        render(None, &root).unwrap();
        assert!(slot.borrow().is_none());
    }

    #[test]
    fn test_observer_order_per_visit() {
        let root = setup();
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        options::on_before_diff(Rc::new(move |id| {
            log.borrow_mut().push(format!("before:{}", with_fiber(id, |f| f.kind.tag_name().unwrap_or("?").to_string())));
            Ok(())
        }));
        let log = seen.clone();
        options::on_diffed(Rc::new(move |id| {
            log.borrow_mut().push(format!("after:{}", with_fiber(id, |f| f.kind.tag_name().unwrap_or("?").to_string())));
            Ok(())
        }));

        render(
            Some(Element::tag("parent").child(Element::tag("child"))),
            &root,
        )
        .unwrap();

        // Children commit before their parent.
        assert_eq!(
            *seen.borrow(),
            vec!["before:parent", "before:child", "after:child", "after:parent"]
        );
    }
}
