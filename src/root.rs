//! Root API - container setup and the frame loop glue.
//!
//! This is the application-facing layer over the reconciler: one call to
//! [`create_root`] binds the reference host configuration to a scene, and
//! the returned [`Root`] mounts element trees into it. Two ways to drive
//! it:
//!
//! - [`Root::render`] commits one tree explicitly
//! - [`Root::bind`] installs a render effect: the builder runs inside a
//!   reactive effect, so any signal it reads re-renders the tree on write
//!
//! Frame subscribers registered with [`Root::on_frame`] run per
//! [`Root::tick`] in priority order; a positive priority claims the frame
//! the way render-takeover subscribers conventionally do.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_signals::effect;

use crate::fiber::{ContainerHandle, Reconciler};
use crate::scene::{SceneHandle, SceneHostConfig, SceneObject};
use crate::types::Cleanup;
use crate::vdom::{self, Element, RenderError};

// =============================================================================
// Frame Subscriptions
// =============================================================================

/// State handed to every frame subscriber.
pub struct FrameState {
    pub scene: SceneHandle,
    /// Seconds since the previous tick.
    pub delta: f64,
    /// Seconds since the root was created.
    pub elapsed: f64,
}

/// Frame subscriber callback.
pub type FrameCallback = Rc<dyn Fn(&FrameState)>;

struct FrameSub {
    id: usize,
    priority: i32,
    callback: FrameCallback,
}

// =============================================================================
// Root
// =============================================================================

/// A mounted scene root.
///
/// Holds the container for its whole lifetime; dropping the root stops
/// any bound render effect but leaves the mounted tree in place - call
/// [`Root::unmount`] to tear the tree down.
pub struct Root {
    reconciler: Reconciler,
    container: ContainerHandle,
    scene: SceneHandle,
    subscriptions: Rc<RefCell<Vec<FrameSub>>>,
    next_sub: Cell<usize>,
    elapsed: Cell<f64>,
    stop_bound: RefCell<Option<Box<dyn FnOnce()>>>,
}

/// Create a root over `scene`, or over a fresh scene when `None`.
pub fn create_root(scene: Option<SceneHandle>) -> Root {
    let scene = scene.unwrap_or_else(SceneObject::scene);
    let reconciler = Reconciler::new(Rc::new(SceneHostConfig::new()));
    let container = reconciler.create_container(scene.clone() as Rc<dyn Any>);
    Root {
        reconciler,
        container,
        scene,
        subscriptions: Rc::new(RefCell::new(Vec::new())),
        next_sub: Cell::new(0),
        elapsed: Cell::new(0.0),
        stop_bound: RefCell::new(None),
    }
}

impl Root {
    pub fn scene(&self) -> SceneHandle {
        self.scene.clone()
    }

    pub fn container(&self) -> ContainerHandle {
        self.container.clone()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Commit one element tree into the scene.
    pub fn render(&self, element: Element) -> Result<(), RenderError> {
        self.reconciler
            .update_container(Some(element), &self.container, None)
    }

    /// Install a render effect over `builder`.
    ///
    /// The builder runs immediately and again whenever a signal it read
    /// changes. Render errors inside the effect are logged; they cannot
    /// propagate out of the signal graph. A previously bound builder is
    /// stopped first.
    pub fn bind(&self, builder: impl Fn() -> Element + 'static) {
        self.unbind();
        let container = self.container.clone();
        let stop = effect(move || {
            if let Err(error) = vdom::render(Some(builder()), &container) {
                log::error!("bound render failed: {error}");
            }
        });
        *self.stop_bound.borrow_mut() = Some(Box::new(stop));
    }

    /// Stop the bound render effect, if any.
    pub fn unbind(&self) {
        if let Some(stop) = self.stop_bound.borrow_mut().take() {
            stop();
        }
    }

    /// Subscribe to frame ticks. Lower priorities run first; a positive
    /// priority claims the frame. Returns a cleanup that unsubscribes.
    pub fn on_frame(&self, callback: FrameCallback, priority: i32) -> Cleanup {
        let id = self.next_sub.get();
        self.next_sub.set(id + 1);
        {
            let mut subscriptions = self.subscriptions.borrow_mut();
            subscriptions.push(FrameSub {
                id,
                priority,
                callback,
            });
            subscriptions.sort_by_key(|sub| sub.priority);
        }
        let subscriptions = self.subscriptions.clone();
        Box::new(move || {
            subscriptions.borrow_mut().retain(|sub| sub.id != id);
        })
    }

    /// Advance the frame loop by `delta` seconds.
    ///
    /// Returns whether any subscriber claimed the frame; callers with a
    /// default presentation step skip it when this is true.
    pub fn tick(&self, delta: f64) -> bool {
        self.elapsed.set(self.elapsed.get() + delta);
        let state = FrameState {
            scene: self.scene.clone(),
            delta,
            elapsed: self.elapsed.get(),
        };
        let subscribers: Vec<(i32, FrameCallback)> = self
            .subscriptions
            .borrow()
            .iter()
            .map(|sub| (sub.priority, sub.callback.clone()))
            .collect();
        let mut claimed = false;
        for (priority, callback) in subscribers {
            callback(&state);
            claimed |= priority > 0;
        }
        claimed
    }

    /// Unmount the tree and stop the bound effect.
    pub fn unmount(&self) -> Result<(), RenderError> {
        self.unbind();
        self.reconciler
            .update_container(None, &self.container, None)
    }
}

impl Drop for Root {
    fn drop(&mut self) {
        self.unbind();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{format_tree, ObjectKind};
    use spark_signals::signal;

    #[test]
    fn test_render_into_scene() {
        let root = create_root(None);
        root.render(
            Element::tag("mesh")
                .prop("name", "cube")
                .child(Element::tag("boxGeometry"))
                .child(Element::tag("meshNormalMaterial")),
        )
        .unwrap();

        let scene = root.scene();
        assert_eq!(scene.borrow().children.len(), 1);
        let mesh = scene.borrow().children[0].clone();
        assert_eq!(mesh.borrow().name, "cube");
        match &mesh.borrow().kind {
            ObjectKind::Mesh { geometry, .. } => assert!(geometry.is_some()),
            _ => panic!("expected a mesh"),
        }

        root.unmount().unwrap();
        assert!(scene.borrow().children.is_empty());
    }

    #[test]
    fn test_bound_render_reacts_to_signals() {
        let root = create_root(None);
        let x = signal(0.0f64);

        let position = x.clone();
        root.bind(move || {
            Element::tag("mesh").prop("position", vec![position.get(), 0.0, 0.0])
        });

        let scene = root.scene();
        let mesh = scene.borrow().children[0].clone();
        assert_eq!(mesh.borrow().position.x, 0.0);

        x.set(4.0);
        assert_eq!(mesh.borrow().position.x, 4.0);

        root.unmount().unwrap();
    }

    #[test]
    fn test_frame_priority_and_claim() {
        let root = create_root(None);
        let order: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));

        let seen = order.clone();
        let _a = root.on_frame(Rc::new(move |_| seen.borrow_mut().push(5)), 5);
        let seen = order.clone();
        let _b = root.on_frame(Rc::new(move |_| seen.borrow_mut().push(0)), 0);

        assert!(root.tick(0.016));
        assert_eq!(*order.borrow(), vec![0, 5]);
    }

    #[test]
    fn test_frame_unsubscribe() {
        let root = create_root(None);
        let count = Rc::new(Cell::new(0));

        let seen = count.clone();
        let cancel = root.on_frame(
            Rc::new(move |state| {
                assert!(state.delta > 0.0);
                seen.set(seen.get() + 1);
            }),
            0,
        );
        assert!(!root.tick(0.016));
        cancel();
        root.tick(0.016);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_tree_formatting() {
        let root = create_root(None);
        root.render(
            Element::tag("mesh")
                .prop("position", [0.0, 1.0, 0.0])
                .child(Element::tag("boxGeometry")),
        )
        .unwrap();
        let text = format_tree(&root.scene());
        assert!(text.contains("mesh"));
        assert!(text.contains("boxGeometry"));
    }
}
