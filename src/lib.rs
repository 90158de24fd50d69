//! # spark-scene
//!
//! Declarative scene-graph renderer adapter for Rust.
//!
//! spark-scene lets a retained scene graph be driven by a virtual-DOM
//! component model. The engine diffs element trees the way a UI runtime
//! diffs documents; the reconciler adapter intercepts its traversal,
//! fabricates proxy elements for managed nodes, and redirects every
//! structural mutation to an embedder-supplied host configuration that
//! knows how to build and splice the foreign graph.
//!
//! ## Architecture
//!
//! ```text
//! Element tree → vdom diff → proxy elements → HostConfig → scene graph
//!                    │                            ▲
//!                    └── before-diff / after-diff hooks (fiber adapter)
//! ```
//!
//! The adapter never initiates work: it reacts to the engine's traversal
//! through the extension points in [`vdom::options`]. Everything runs
//! synchronously on one thread.
//!
//! ## Modules
//!
//! - [`types`] - prop values, props, attach, refs
//! - [`vdom`] - the embedding virtual-DOM engine and its boundary
//! - [`host`] - the host configuration contract
//! - [`fiber`] - the reconciler adapter and its public surface
//! - [`scene`] - reference scene graph and host configuration
//! - [`root`] - container setup and frame loop glue

pub mod fiber;
pub mod host;
pub mod root;
pub mod scene;
pub mod types;
pub mod vdom;

// Re-export commonly used items
pub use types::{Attach, Cleanup, Instance, Props, Ref, RefSlot, Value};

pub use host::{HostConfig, HostError, UpdatePayload};

pub use vdom::{
    define_element, is_defined, render, DomElement, DomNode, Element, ElementKind, Fiber,
    FiberId, PlainElement, RenderError,
};

pub use fiber::{ContainerHandle, ProxyElement, Reconciler};

pub use scene::{
    extend, format_tree, handle_to_instance, instance_to_handle, ColorValue, GeometryShape,
    MaterialFlavor, MaterialSlot, ObjectKind, SceneHandle, SceneHostConfig, SceneObject, Vec3,
};

pub use root::{create_root, FrameCallback, FrameState, Root};
