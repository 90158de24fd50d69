//! Host Configuration contract.
//!
//! A host configuration describes, in the embedder's terms, how to realize
//! a declarative intrinsic element as an instance of a foreign retained
//! graph, and how to splice instances into parent-child relationships.
//! The reconciler adapter calls nothing else to mutate the foreign graph.
//!
//! Every operation that a structural type may not need has a no-op default,
//! so partial configurations are simply never invoked where absent.
//! `dispose` is part of the contract rather than a probed optional method:
//! the adapter's depth-first disposal walk makes exactly one non-optional
//! call per instance.

use std::any::Any;
use std::rc::Rc;

use thiserror::Error;

use crate::types::{Instance, Props};
use crate::vdom::FiberId;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised by a host configuration.
///
/// These propagate out of the commit phase to whatever called
/// `update_container`; the adapter performs no recovery.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The intrinsic tag has no registered constructor.
    #[error("unknown element type `{0}`")]
    UnknownType(String),

    /// A prop value does not fit the target it resolved to.
    #[error("invalid value for prop `{key}`: {message}")]
    Prop { key: String, message: String },

    /// An attach path names a slot the parent does not have.
    #[error("cannot attach at `{0}`")]
    Attach(String),

    /// Embedder-defined failure.
    #[error("{0}")]
    Other(String),
}

// =============================================================================
// Update Payload
// =============================================================================

/// Result of [`HostConfig::prepare_update`] when work is required.
///
/// `Recreate` is a named variant distinct from any payload shape: it means
/// the instance's identity is stale (adopted object or constructor
/// arguments changed) and `commit_update` must construct a replacement.
/// `Patch` carries an opaque diff forwarded verbatim to `commit_update`.
pub enum UpdatePayload {
    Recreate,
    Patch(Rc<dyn Any>),
}

// =============================================================================
// Contract
// =============================================================================

/// Embedder-supplied operation set for one foreign retained graph.
///
/// Instances are exclusively owned by the foreign graph once created; the
/// adapter holds references only long enough to pass them to the next call
/// here and to service refs. All calls happen synchronously inside the
/// engine's commit, on one thread.
pub trait HostConfig {
    /// Allocate an instance for `tag` and apply its initial props.
    ///
    /// Must not assume children exist yet. Unrecognized tags are an error,
    /// surfaced out of the commit phase.
    fn create_instance(
        &self,
        tag: &str,
        props: &Props,
        container_info: &Rc<dyn Any>,
        handle: FiberId,
    ) -> Result<Instance, HostError>;

    /// Whether post-mount commit work is required. If `true`,
    /// [`HostConfig::commit_mount`] is invoked once after the first commit.
    fn finalize_initial_children(
        &self,
        _instance: &Instance,
        _tag: &str,
        _props: &Props,
        _container_info: &Rc<dyn Any>,
    ) -> bool {
        false
    }

    /// Compute a diff between committed and incoming props.
    ///
    /// `None` means no-op; see [`UpdatePayload`] for the rest.
    fn prepare_update(
        &self,
        _instance: &Instance,
        _tag: &str,
        _old_props: &Props,
        _new_props: &Props,
    ) -> Option<UpdatePayload> {
        None
    }

    /// Apply a payload produced by [`HostConfig::prepare_update`].
    ///
    /// On `Recreate` this must construct the replacement instance and
    /// return it so the adapter can swap references.
    fn commit_update(
        &self,
        _instance: &Instance,
        _payload: UpdatePayload,
        _tag: &str,
        _old_props: &Props,
        _new_props: &Props,
    ) -> Result<Option<Instance>, HostError> {
        Ok(None)
    }

    /// Value exposed through refs. Defaults to the instance itself.
    fn get_public_instance(&self, instance: &Instance) -> Instance {
        instance.clone()
    }

    /// Post-attach hook, called only if `finalize_initial_children`
    /// returned `true`.
    fn commit_mount(&self, _instance: &Instance, _tag: &str, _props: &Props, _handle: FiberId) {}

    // --- structural mutation, instance to instance ---

    fn append_child(&self, _parent: &Instance, _child: &Instance) -> Result<(), HostError> {
        Ok(())
    }

    fn insert_before(
        &self,
        _parent: &Instance,
        _child: &Instance,
        _before: &Instance,
    ) -> Result<(), HostError> {
        Ok(())
    }

    fn remove_child(&self, _parent: &Instance, _child: &Instance) -> Result<(), HostError> {
        Ok(())
    }

    // --- structural mutation, instance to container ---
    //
    // The container is not itself an instance, hence the split.

    fn append_child_to_container(
        &self,
        _container_info: &Rc<dyn Any>,
        _child: &Instance,
    ) -> Result<(), HostError> {
        Ok(())
    }

    fn insert_in_container_before(
        &self,
        _container_info: &Rc<dyn Any>,
        _child: &Instance,
        _before: &Instance,
    ) -> Result<(), HostError> {
        Ok(())
    }

    fn remove_child_from_container(
        &self,
        _container_info: &Rc<dyn Any>,
        _child: &Instance,
    ) -> Result<(), HostError> {
        Ok(())
    }

    /// Release foreign resources held by `instance`.
    ///
    /// Called once per instance during the adapter's depth-first unmount
    /// walk, children before parents. Errors abort the remainder of the
    /// unmount commit.
    fn dispose(&self, _instance: &Instance) -> Result<(), HostError> {
        Ok(())
    }
}
