//! DOM-shaped elements and the process tag registry.
//!
//! The engine never mutates trees directly; every structural effect goes
//! through a [`DomElement`] method. Registering a factory for a tag makes
//! the engine back elements of that tag with a custom implementation,
//! which is the whole interception surface custom renderers need.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::host::HostError;
use crate::types::Value;

// =============================================================================
// Element Trait
// =============================================================================

/// Shared handle to a DOM-shaped element.
pub type DomNode = Rc<RefCell<dyn DomElement>>;

/// A platform element as the engine sees it.
///
/// Structural methods are fallible because implementations may forward to
/// a host configuration; the plain element never fails.
pub trait DomElement: Any {
    fn tag(&self) -> &str;

    /// Downcast support for implementations that carry extra state.
    fn as_any(&self) -> &dyn Any;

    fn set_attribute(&mut self, name: &str, value: Value);

    fn remove_attribute(&mut self, name: &str);

    fn append_child(&mut self, child: &DomNode) -> Result<(), HostError>;

    /// Ordered insert. `None` for `before` degrades to append.
    fn insert_before(&mut self, child: &DomNode, before: Option<&DomNode>)
        -> Result<(), HostError>;

    fn remove_child(&mut self, child: &DomNode) -> Result<(), HostError>;

    /// Snapshot of the current children, in order.
    fn child_nodes(&self) -> Vec<DomNode>;

    fn index_of(&self, child: &DomNode) -> Option<usize>;
}

/// Public handle exposed through refs of elements no renderer manages.
pub struct NodeRef(pub DomNode);

// =============================================================================
// Plain Element
// =============================================================================

/// Default element implementation: an attribute map and an ordered child
/// list. Used for every tag without a registered factory.
pub struct PlainElement {
    tag: String,
    attributes: HashMap<String, Value>,
    children: Vec<DomNode>,
}

impl PlainElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// Allocate as a shared node.
    pub fn create(tag: impl Into<String>) -> DomNode {
        Rc::new(RefCell::new(Self::new(tag)))
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn position(&self, child: &DomNode) -> Option<usize> {
        self.children.iter().position(|c| Rc::ptr_eq(c, child))
    }
}

impl DomElement for PlainElement {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    fn remove_attribute(&mut self, name: &str) {
        self.attributes.remove(name);
    }

    fn append_child(&mut self, child: &DomNode) -> Result<(), HostError> {
        if let Some(at) = self.position(child) {
            self.children.remove(at);
        }
        self.children.push(child.clone());
        Ok(())
    }

    fn insert_before(
        &mut self,
        child: &DomNode,
        before: Option<&DomNode>,
    ) -> Result<(), HostError> {
        if let Some(at) = self.position(child) {
            self.children.remove(at);
        }
        match before.and_then(|b| self.position(b)) {
            Some(at) => self.children.insert(at, child.clone()),
            None => self.children.push(child.clone()),
        }
        Ok(())
    }

    fn remove_child(&mut self, child: &DomNode) -> Result<(), HostError> {
        if let Some(at) = self.position(child) {
            self.children.remove(at);
        }
        Ok(())
    }

    fn child_nodes(&self) -> Vec<DomNode> {
        self.children.clone()
    }

    fn index_of(&self, child: &DomNode) -> Option<usize> {
        self.position(child)
    }
}

// =============================================================================
// Tag Registry
// =============================================================================

/// Factory producing a backing element for a registered tag.
pub type ElementFactory = Rc<dyn Fn(&str) -> DomNode>;

thread_local! {
    /// Tag name to factory. Checked on every element creation.
    static REGISTRY: RefCell<HashMap<String, ElementFactory>> = RefCell::new(HashMap::new());
}

/// Register a factory for `tag`.
///
/// Check-and-set: returns `false` without replacing anything when the tag
/// is already defined, so repeated installation is harmless.
pub fn define_element(tag: &str, factory: ElementFactory) -> bool {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        if registry.contains_key(tag) {
            return false;
        }
        registry.insert(tag.to_string(), factory);
        true
    })
}

/// Whether `tag` has a registered factory.
pub fn is_defined(tag: &str) -> bool {
    REGISTRY.with(|registry| registry.borrow().contains_key(tag))
}

/// Create the backing element for `tag`: registered factory if present,
/// otherwise a [`PlainElement`].
pub fn create_element(tag: &str) -> DomNode {
    let factory = REGISTRY.with(|registry| registry.borrow().get(tag).cloned());
    match factory {
        Some(factory) => factory(tag),
        None => PlainElement::create(tag),
    }
}

/// Drop all registered factories. Test support.
pub fn reset_registry() {
    REGISTRY.with(|registry| registry.borrow_mut().clear());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_element_order() {
        let parent = PlainElement::create("group");
        let a = PlainElement::create("a");
        let b = PlainElement::create("b");
        let c = PlainElement::create("c");

        {
            let mut p = parent.borrow_mut();
            p.append_child(&a).unwrap();
            p.append_child(&b).unwrap();
            p.insert_before(&c, Some(&b)).unwrap();
        }
        let tags: Vec<String> = parent
            .borrow()
            .child_nodes()
            .iter()
            .map(|n| n.borrow().tag().to_string())
            .collect();
        assert_eq!(tags, ["a", "c", "b"]);

        // Re-inserting an existing child moves it.
        parent.borrow_mut().insert_before(&b, Some(&a)).unwrap();
        let tags: Vec<String> = parent
            .borrow()
            .child_nodes()
            .iter()
            .map(|n| n.borrow().tag().to_string())
            .collect();
        assert_eq!(tags, ["b", "a", "c"]);

        parent.borrow_mut().remove_child(&a).unwrap();
        assert_eq!(parent.borrow().child_nodes().len(), 2);
    }

    #[test]
    fn test_define_element_check_and_set() {
        reset_registry();
        let factory: ElementFactory = Rc::new(|tag| PlainElement::create(tag));
        assert!(define_element("custom-tag", factory.clone()));
        assert!(!define_element("custom-tag", factory));
        assert!(is_defined("custom-tag"));
        assert!(!is_defined("other-tag"));
        reset_registry();
    }
}
