//! Reference host configuration over the retained scene graph.
//!
//! Instances wrap one scene object together with its effective attach,
//! mirroring how the declarative layer thinks about the node. Structural
//! calls either splice through an attachment slot or fall back to graph
//! parenting when both ends are spatial; everything else is prop
//! application through the path interpreter.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::host::{HostConfig, HostError, UpdatePayload};
use crate::types::{Attach, Instance, Props};
use crate::vdom::FiberId;

use super::catalogue;
use super::object::{
    add_child, handle_to_instance, insert_child_before, instance_to_handle, remove_child_object,
    SceneHandle,
};
use super::props::{
    apply_props, apply_resolved, attach_at_path, diff_props, resolve, restore_slot, PrevAttach,
};

// =============================================================================
// Scene Instance
// =============================================================================

/// Host instance managed by [`SceneHostConfig`]: the scene object plus the
/// attachment bookkeeping the structural calls need.
pub struct SceneInstance {
    pub tag: String,
    pub object: SceneHandle,
    /// Effective attach, including the auto-attach convention.
    pub attach: RefCell<Option<Attach>>,
    /// Restore record while attached into a parent slot.
    prev_attach: RefCell<Option<PrevAttach>>,
}

impl SceneInstance {
    pub fn object(&self) -> SceneHandle {
        self.object.clone()
    }
}

fn as_instance(instance: &Instance) -> Result<Rc<SceneInstance>, HostError> {
    instance
        .clone()
        .downcast::<SceneInstance>()
        .map_err(|_| HostError::Other("foreign instance reached the scene host".to_string()))
}

fn container_scene(container_info: &Rc<dyn Any>) -> Result<SceneHandle, HostError> {
    container_info
        .clone()
        .downcast::<RefCell<super::object::SceneObject>>()
        .map_err(|_| HostError::Other("container info is not a scene".to_string()))
}

// =============================================================================
// Host Configuration
// =============================================================================

/// The reference host configuration. Stateless: the catalogue and the
/// scene are reached through arguments.
#[derive(Default)]
pub struct SceneHostConfig;

impl SceneHostConfig {
    pub fn new() -> Self {
        Self
    }

    fn build(&self, tag: &str, props: &Props) -> Result<Instance, HostError> {
        let object = match &props.object {
            Some(instance) => instance_to_handle(instance).ok_or_else(|| {
                HostError::Prop {
                    key: "object".to_string(),
                    message: "not a scene object".to_string(),
                }
            })?,
            None => catalogue::construct(tag, &props.args)?,
        };

        apply_props(&object, props)?;

        // Auto-attach convention: geometries and materials go to their
        // mesh slots unless an explicit attach says otherwise.
        let attach = props.attach.clone().or_else(|| {
            let object = object.borrow();
            if object.is_material() {
                Some(Attach::path("material"))
            } else if object.is_geometry() {
                Some(Attach::path("geometry"))
            } else {
                None
            }
        });

        Ok(Rc::new(SceneInstance {
            tag: tag.to_string(),
            object,
            attach: RefCell::new(attach),
            prev_attach: RefCell::new(None),
        }))
    }

    fn attach_child(
        &self,
        parent: &SceneHandle,
        child: &Rc<SceneInstance>,
        attach: &Attach,
    ) -> Result<(), HostError> {
        let prev = match attach {
            Attach::Path(path) => {
                PrevAttach::Slot(attach_at_path(parent, &child.object, path)?)
            }
            Attach::Callback(callback) => {
                let detach = callback(
                    &handle_to_instance(parent),
                    &handle_to_instance(&child.object),
                );
                PrevAttach::Callback(detach)
            }
        };
        *child.prev_attach.borrow_mut() = Some(prev);
        Ok(())
    }

    fn detach_child(&self, parent: &SceneHandle, child: &Rc<SceneInstance>) {
        match child.prev_attach.borrow_mut().take() {
            Some(PrevAttach::Slot(prev)) => restore_slot(parent, prev),
            Some(PrevAttach::Callback(detach)) => {
                detach(&handle_to_instance(parent), &handle_to_instance(&child.object));
            }
            None => {}
        }
    }

    /// Structural append against an arbitrary parent object.
    fn append_to(&self, parent: &SceneHandle, child: &Rc<SceneInstance>) -> Result<(), HostError> {
        let attach = child.attach.borrow().clone();
        if let Some(attach) = attach {
            self.attach_child(parent, child, &attach)
        } else if parent.borrow().is_spatial() && child.object.borrow().is_spatial() {
            add_child(parent, &child.object);
            Ok(())
        } else {
            Ok(())
        }
    }

    fn insert_into(
        &self,
        parent: &SceneHandle,
        child: &Rc<SceneInstance>,
        before: &Rc<SceneInstance>,
    ) -> Result<(), HostError> {
        let attach = child.attach.borrow().clone();
        if let Some(attach) = attach {
            self.attach_child(parent, child, &attach)
        } else if parent.borrow().is_spatial() && child.object.borrow().is_spatial() {
            insert_child_before(parent, &child.object, &before.object);
            Ok(())
        } else {
            Ok(())
        }
    }

    fn remove_from(&self, parent: &SceneHandle, child: &Rc<SceneInstance>) {
        if child.prev_attach.borrow().is_some() {
            self.detach_child(parent, child);
        } else {
            remove_child_object(parent, &child.object);
        }
    }
}

impl HostConfig for SceneHostConfig {
    fn create_instance(
        &self,
        tag: &str,
        props: &Props,
        _container_info: &Rc<dyn Any>,
        _handle: FiberId,
    ) -> Result<Instance, HostError> {
        self.build(tag, props)
    }

    fn prepare_update(
        &self,
        _instance: &Instance,
        _tag: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<UpdatePayload> {
        if new_props.object_changed(old_props) || new_props.args_changed(old_props) {
            return Some(UpdatePayload::Recreate);
        }
        let changed = diff_props(old_props, new_props);
        if changed.is_empty() {
            None
        } else {
            Some(UpdatePayload::Patch(Rc::new(changed)))
        }
    }

    fn commit_update(
        &self,
        instance: &Instance,
        payload: UpdatePayload,
        tag: &str,
        _old_props: &Props,
        new_props: &Props,
    ) -> Result<Option<Instance>, HostError> {
        match payload {
            UpdatePayload::Recreate => self.build(tag, new_props).map(Some),
            UpdatePayload::Patch(patch) => {
                let instance = as_instance(instance)?;
                let changed = patch
                    .downcast_ref::<Vec<(String, crate::types::Value)>>()
                    .ok_or_else(|| HostError::Other("unexpected update payload".to_string()))?;
                for (key, value) in changed {
                    let resolved = resolve(&instance.object, key)?;
                    apply_resolved(&resolved, key, value)?;
                }
                Ok(None)
            }
        }
    }

    fn get_public_instance(&self, instance: &Instance) -> Instance {
        match as_instance(instance) {
            Ok(instance) => handle_to_instance(&instance.object),
            Err(_) => instance.clone(),
        }
    }

    fn append_child(&self, parent: &Instance, child: &Instance) -> Result<(), HostError> {
        let parent = as_instance(parent)?;
        let child = as_instance(child)?;
        self.append_to(&parent.object, &child)
    }

    fn insert_before(
        &self,
        parent: &Instance,
        child: &Instance,
        before: &Instance,
    ) -> Result<(), HostError> {
        let parent = as_instance(parent)?;
        let child = as_instance(child)?;
        let before = as_instance(before)?;
        self.insert_into(&parent.object, &child, &before)
    }

    fn remove_child(&self, parent: &Instance, child: &Instance) -> Result<(), HostError> {
        let parent = as_instance(parent)?;
        let child = as_instance(child)?;
        self.remove_from(&parent.object, &child);
        Ok(())
    }

    fn append_child_to_container(
        &self,
        container_info: &Rc<dyn Any>,
        child: &Instance,
    ) -> Result<(), HostError> {
        let scene = container_scene(container_info)?;
        let child = as_instance(child)?;
        self.append_to(&scene, &child)
    }

    fn insert_in_container_before(
        &self,
        container_info: &Rc<dyn Any>,
        child: &Instance,
        before: &Instance,
    ) -> Result<(), HostError> {
        let scene = container_scene(container_info)?;
        let child = as_instance(child)?;
        let before = as_instance(before)?;
        self.insert_into(&scene, &child, &before)
    }

    fn remove_child_from_container(
        &self,
        container_info: &Rc<dyn Any>,
        child: &Instance,
    ) -> Result<(), HostError> {
        let scene = container_scene(container_info)?;
        let child = as_instance(child)?;
        self.remove_from(&scene, &child);
        Ok(())
    }

    fn dispose(&self, instance: &Instance) -> Result<(), HostError> {
        let instance = as_instance(instance)?;
        log::trace!("dispose <{}>", instance.tag);
        instance.object.borrow_mut().dispose();
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::object::{MaterialSlot, ObjectKind, SceneObject, Vec3};
    use crate::types::Value;

    fn config() -> SceneHostConfig {
        SceneHostConfig::new()
    }

    fn info() -> Rc<dyn Any> {
        SceneObject::scene() as Rc<dyn Any>
    }

    fn make(tag: &str, props: Props) -> Instance {
        config()
            .create_instance(tag, &props, &info(), 0)
            .unwrap()
    }

    #[test]
    fn test_create_applies_props() {
        let mut props = Props::new();
        props.set("position", [1.0, 2.0, 3.0]);
        props.set("name", "cube");
        let instance = make("mesh", props);
        let object = as_instance(&instance).unwrap().object();
        assert_eq!(object.borrow().position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(object.borrow().name, "cube");
    }

    #[test]
    fn test_unknown_tag_errors() {
        let err = config()
            .create_instance("torusKnot", &Props::new(), &info(), 0)
            .unwrap_err();
        assert!(matches!(err, HostError::UnknownType(_)));
    }

    #[test]
    fn test_auto_attach_convention() {
        let geometry = as_instance(&make("boxGeometry", Props::new())).unwrap();
        assert!(matches!(
            geometry.attach.borrow().as_ref(),
            Some(Attach::Path(path)) if path == "geometry"
        ));

        let material = as_instance(&make("meshNormalMaterial", Props::new())).unwrap();
        assert!(matches!(
            material.attach.borrow().as_ref(),
            Some(Attach::Path(path)) if path == "material"
        ));

        let mesh = as_instance(&make("mesh", Props::new())).unwrap();
        assert!(mesh.attach.borrow().is_none());
    }

    #[test]
    fn test_append_attaches_and_detaches() {
        let host = config();
        let mesh = make("mesh", Props::new());
        let geometry = make("boxGeometry", Props::new());

        host.append_child(&mesh, &geometry).unwrap();
        let mesh_object = as_instance(&mesh).unwrap().object();
        match &mesh_object.borrow().kind {
            ObjectKind::Mesh { geometry, .. } => assert!(geometry.is_some()),
            _ => unreachable!(),
        }

        host.remove_child(&mesh, &geometry).unwrap();
        match &mesh_object.borrow().kind {
            ObjectKind::Mesh { geometry, .. } => assert!(geometry.is_none()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_unchanged_props_produce_no_payload() {
        let host = config();
        let mut props = Props::new();
        props.set("position", [1.0, 0.0, 0.0]);
        let instance = make("mesh", props.clone());
        assert!(host
            .prepare_update(&instance, "mesh", &props, &props)
            .is_none());
    }

    #[test]
    fn test_args_change_requests_recreate() {
        let host = config();
        let mut old = Props::new();
        old.args = vec![Value::Num(1.0)];
        let mut new = Props::new();
        new.args = vec![Value::Num(2.0)];
        let instance = make("boxGeometry", old.clone());
        assert!(matches!(
            host.prepare_update(&instance, "boxGeometry", &old, &new),
            Some(UpdatePayload::Recreate)
        ));
    }

    #[test]
    fn test_patch_applies_changes_only() {
        let host = config();
        let mut old = Props::new();
        old.set("position", [0.0, 0.0, 0.0]);
        old.set("name", "a");
        let instance = make("mesh", old.clone());

        let mut new = old.clone();
        new.set("position", [9.0, 0.0, 0.0]);

        let Some(payload) = host.prepare_update(&instance, "mesh", &old, &new) else {
            panic!("expected a payload");
        };
        let replacement = host
            .commit_update(&instance, payload, "mesh", &old, &new)
            .unwrap();
        assert!(replacement.is_none());

        let object = as_instance(&instance).unwrap().object();
        assert_eq!(object.borrow().position.x, 9.0);
        assert_eq!(object.borrow().name, "a");
    }

    #[test]
    fn test_callback_attach_round_trip() {
        use std::cell::Cell;

        let host = config();
        let mesh = make("mesh", Props::new());

        let attached = Rc::new(Cell::new(false));
        let flag = attached.clone();
        let mut props = Props::new();
        props.attach = Some(Attach::Callback(Rc::new(move |_, _| {
            flag.set(true);
            let flag = flag.clone();
            Rc::new(move |_, _| flag.set(false))
        })));
        let group = make("group", props);

        host.append_child(&mesh, &group).unwrap();
        assert!(attached.get());
        host.remove_child(&mesh, &group).unwrap();
        assert!(!attached.get());
    }

    #[test]
    fn test_multi_material_slots() {
        let host = config();
        let mesh = make("mesh", Props::new());

        let mut first = Props::new();
        first.attach = Some(Attach::path("material-0"));
        let first = make("meshBasicMaterial", first);

        let mut second = Props::new();
        second.attach = Some(Attach::path("material-1"));
        let second = make("meshStandardMaterial", second);

        host.append_child(&mesh, &first).unwrap();
        host.append_child(&mesh, &second).unwrap();

        let object = as_instance(&mesh).unwrap().object();
        match &object.borrow().kind {
            ObjectKind::Mesh { material, .. } => match material {
                MaterialSlot::Multi(slots) => {
                    assert_eq!(slots.len(), 2);
                    assert!(slots.iter().all(|slot| slot.is_some()));
                }
                _ => panic!("expected indexed materials"),
            },
            _ => unreachable!(),
        }
    }
}
