//! Core types for spark-scene.
//!
//! These types define the foundation that everything builds on.
//! They flow between the virtual-DOM engine, the reconciler adapter,
//! and host configurations, and define what a prop value can be.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

// =============================================================================
// Shared Aliases
// =============================================================================

/// An instance in the foreign retained graph.
///
/// Host configurations own the concrete type behind this; everyone else
/// (the engine, the adapter) carries it opaquely and hands it back on the
/// next contract call.
pub type Instance = Rc<dyn Any>;

/// Cleanup function returned by subscriptions and callback refs.
///
/// Call it to release whatever the producing call set up.
pub type Cleanup = Box<dyn FnOnce()>;

/// Prop key under which the adapter stashes a back-reference to the owning
/// virtual node. Host configurations must treat it as reserved.
pub const NODE_BACKREF_PROP: &str = "fiber";

// =============================================================================
// Prop Value
// =============================================================================

/// A dynamically typed prop value.
///
/// Declarative trees address foreign objects without a schema, so prop
/// values travel as a small closed set of shapes. `Seq` covers tuples
/// (positions, colors, constructor arguments); `Object` carries a
/// preexisting foreign instance by reference.
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
    /// Numeric sequence, spread positionally onto multi-component setters.
    Seq(Vec<f64>),
    /// A foreign-graph object, compared by identity.
    Object(Instance),
    /// Opaque node handle used by renderer integrations.
    Handle(usize),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Handle(a), Value::Handle(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Num(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Seq(v) => write!(f, "{v:?}"),
            Value::Object(_) => write!(f, "<object>"),
            Value::Handle(id) => write!(f, "<node {id}>"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Num(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Num(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<[f64; 2]> for Value {
    fn from(value: [f64; 2]) -> Self {
        Value::Seq(value.to_vec())
    }
}

impl From<[f64; 3]> for Value {
    fn from(value: [f64; 3]) -> Self {
        Value::Seq(value.to_vec())
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Value::Seq(value)
    }
}

// =============================================================================
// Attach
// =============================================================================

/// Callback attach: receives `(parent_instance, child_instance)` and returns
/// the matching detach callback.
pub type AttachFn = Rc<dyn Fn(&Instance, &Instance) -> DetachFn>;

/// Detach callback produced by [`AttachFn`].
pub type DetachFn = Rc<dyn Fn(&Instance, &Instance)>;

/// How a child splices into a named slot of its parent instead of
/// scene-graph parenting.
///
/// A path names a dotted/hyphenated slot (`"material"`, `"material-0"`);
/// an index suffix auto-creates a sequence at that slot. A callback form
/// performs the splice itself and hands back the undo.
#[derive(Clone)]
pub enum Attach {
    Path(String),
    Callback(AttachFn),
}

impl Attach {
    pub fn path(p: impl Into<String>) -> Self {
        Attach::Path(p.into())
    }
}

impl PartialEq for Attach {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Attach::Path(a), Attach::Path(b)) => a == b,
            (Attach::Callback(a), Attach::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// =============================================================================
// Refs
// =============================================================================

/// Mutable slot form of a ref: `current` is filled with the public instance
/// on mount and cleared on unmount.
pub type RefSlot = Rc<RefCell<Option<Instance>>>;

/// Callback form of a ref. Receives `Some(public_instance)` on mount and
/// `None` on unmount, unless the mount call returned a cleanup, in which
/// case the cleanup runs instead of the `None` call.
pub type RefCallback = Rc<dyn Fn(Option<Instance>) -> Option<Cleanup>>;

/// A user-supplied reference to the node's public instance.
#[derive(Clone)]
pub enum Ref {
    Object(RefSlot),
    Callback(RefCallback),
}

impl Ref {
    /// Create an empty slot ref. Read the slot after mount.
    pub fn slot() -> (Ref, RefSlot) {
        let slot: RefSlot = Rc::new(RefCell::new(None));
        (Ref::Object(slot.clone()), slot)
    }

    /// Create a callback ref without a cleanup.
    pub fn callback(f: impl Fn(Option<Instance>) + 'static) -> Ref {
        Ref::Callback(Rc::new(move |value| {
            f(value);
            None
        }))
    }

    pub(crate) fn same(a: Option<&Ref>, b: Option<&Ref>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(Ref::Object(x)), Some(Ref::Object(y))) => Rc::ptr_eq(x, y),
            (Some(Ref::Callback(x)), Some(Ref::Callback(y))) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }
}

// =============================================================================
// Props
// =============================================================================

/// Props of a single element.
///
/// Non-reserved values live in `values`; the reserved keys (`args`,
/// `attach`, `object`, `key`) have dedicated fields so host configurations
/// never have to fish them out of the map. `ref` and `children` are carried
/// on the element descriptor, not here.
#[derive(Clone, Default)]
pub struct Props {
    pub values: HashMap<String, Value>,
    /// Constructor arguments, positional.
    pub args: Vec<Value>,
    /// Slot attachment instead of graph parenting.
    pub attach: Option<Attach>,
    /// Adopt this preexisting object instead of constructing one.
    pub object: Option<Instance>,
    /// Reconciliation key for keyed child matching.
    pub key: Option<String>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Whether `args` differ from `other`'s, by length or any element.
    pub fn args_changed(&self, other: &Props) -> bool {
        self.args.len() != other.args.len()
            || self.args.iter().zip(other.args.iter()).any(|(a, b)| a != b)
    }

    /// Whether the adopted `object` identity differs from `other`'s.
    pub fn object_changed(&self, other: &Props) -> bool {
        match (&self.object, &other.object) {
            (None, None) => false,
            (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
            _ => true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
