//! Reference scene graph and its host configuration.
//!
//! The adapter works against any host configuration; this module supplies
//! the one the crate ships with, targeting a small retained scene graph:
//!
//! - [`object`] - the graph itself (meshes, geometries, materials, ...)
//! - [`catalogue`] - intrinsic tag to constructor registry, extendable
//! - [`props`] - hyphenated prop paths onto typed setters, attach/detach
//! - [`config`] - the [`HostConfig`](crate::host::HostConfig) impl tying
//!   the three together

pub mod catalogue;
pub mod config;
pub mod object;
pub mod props;

pub use catalogue::{extend, Constructor};
pub use config::{SceneHostConfig, SceneInstance};
pub use object::{
    add_child, format_tree, handle_to_instance, instance_to_handle, ColorValue, GeometryShape,
    MaterialFlavor, MaterialSlot, ObjectKind, SceneHandle, SceneObject, Vec3,
};
