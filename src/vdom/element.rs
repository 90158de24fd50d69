//! Element descriptors.
//!
//! An [`Element`] is the transient record a render pass produces: what to
//! mount, with which props, above which children. The engine diffs it
//! against the retained fiber from the previous pass and throws it away.

use crate::types::{Attach, Instance, Props, Ref, Value};

use super::dom::DomNode;

// =============================================================================
// Element Kind
// =============================================================================

/// What an element renders as.
#[derive(Clone)]
pub enum ElementKind {
    /// An intrinsic element, by lower-case tag name.
    Tag(String),
    /// A grouping node with no backing element of its own.
    Fragment,
    /// Children mount against another container's element tree.
    Portal(DomNode),
}

impl ElementKind {
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            ElementKind::Tag(t) => Some(t),
            _ => None,
        }
    }
}

// =============================================================================
// Element
// =============================================================================

/// A node of the declarative tree for one render pass.
#[derive(Clone)]
pub struct Element {
    pub kind: ElementKind,
    pub props: Props,
    pub reference: Option<Ref>,
    pub children: Vec<Element>,
}

impl Element {
    /// An intrinsic element, e.g. `Element::tag("mesh")`.
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Tag(name.into()),
            props: Props::new(),
            reference: None,
            children: Vec::new(),
        }
    }

    /// A fragment holding `children` with no element of its own.
    pub fn fragment(children: Vec<Element>) -> Self {
        Self {
            kind: ElementKind::Fragment,
            props: Props::new(),
            reference: None,
            children,
        }
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.set(name, value);
        self
    }

    /// Positional constructor arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.props.args = args.into_iter().collect();
        self
    }

    pub fn attach(mut self, attach: Attach) -> Self {
        self.props.attach = Some(attach);
        self
    }

    /// Adopt a preexisting foreign object instead of constructing one.
    pub fn object(mut self, object: Instance) -> Self {
        self.props.object = Some(object);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.props.key = Some(key.into());
        self
    }

    pub fn reference(mut self, reference: Ref) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }
}
