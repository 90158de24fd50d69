//! Scene semantics through the full stack: declarative elements in,
//! retained scene graph out.

use std::rc::Rc;

use spark_scene::{
    create_root, Attach, ColorValue, Element, HostError, MaterialSlot, ObjectKind, Ref,
    RenderError, SceneHandle, Value, Vec3,
};

fn mesh_of(scene: &SceneHandle, at: usize) -> SceneHandle {
    scene.borrow().children[at].clone()
}

#[test]
fn geometry_and_material_auto_attach() {
    let root = create_root(None);
    root.render(
        Element::tag("mesh")
            .child(Element::tag("boxGeometry").args([Value::Num(2.0)]))
            .child(Element::tag("meshNormalMaterial")),
    )
    .unwrap();

    let mesh = mesh_of(&root.scene(), 0);
    match &mesh.borrow().kind {
        ObjectKind::Mesh { geometry, material } => {
            assert!(geometry.is_some());
            assert!(matches!(material, MaterialSlot::Single(Some(_))));
        }
        _ => panic!("expected a mesh"),
    }
    // Slot children do not become graph children.
    assert!(mesh.borrow().children.is_empty());
}

#[test]
fn indexed_attach_creates_sequence_and_detach_restores() {
    let root = create_root(None);
    let multi = || {
        Element::tag("mesh")
            .child(
                Element::tag("meshBasicMaterial")
                    .key("m0")
                    .attach(Attach::path("material-0")),
            )
            .child(
                Element::tag("meshStandardMaterial")
                    .key("m1")
                    .attach(Attach::path("material-1")),
            )
    };
    root.render(multi()).unwrap();

    let mesh = mesh_of(&root.scene(), 0);
    match &mesh.borrow().kind {
        ObjectKind::Mesh { material, .. } => match material {
            MaterialSlot::Multi(slots) => {
                assert_eq!(slots.len(), 2);
                assert!(slots.iter().all(|slot| slot.is_some()));
            }
            _ => panic!("expected indexed materials"),
        },
        _ => unreachable!(),
    }

    // Dropping the second material restores its entry.
    root.render(
        Element::tag("mesh").child(
            Element::tag("meshBasicMaterial")
                .key("m0")
                .attach(Attach::path("material-0")),
        ),
    )
    .unwrap();
    match &mesh.borrow().kind {
        ObjectKind::Mesh { material, .. } => match material {
            MaterialSlot::Multi(slots) => {
                assert!(slots[0].is_some());
                assert!(slots[1].is_none());
            }
            _ => panic!("expected indexed materials"),
        },
        _ => unreachable!(),
    }
}

#[test]
fn tuple_prop_updates_in_place() {
    let root = create_root(None);
    root.render(Element::tag("mesh").prop("position", [0.0, 0.0, 0.0])).unwrap();
    let mesh = mesh_of(&root.scene(), 0);

    root.render(Element::tag("mesh").prop("position", [1.0, 2.0, 3.0])).unwrap();

    // Same object, mutated through its component setter.
    let after = mesh_of(&root.scene(), 0);
    assert!(Rc::ptr_eq(&mesh, &after));
    assert_eq!(mesh.borrow().position, Vec3::new(1.0, 2.0, 3.0));
}

#[test]
fn nested_paths_reach_attached_objects() {
    let root = create_root(None);
    root.render(
        Element::tag("mesh")
            .prop("rotation-x", 0.5)
            .child(Element::tag("meshBasicMaterial")),
    )
    .unwrap();

    // Nested paths work once the material is attached, so they arrive on
    // an update pass.
    root.render(
        Element::tag("mesh")
            .prop("material-color", "red")
            .prop("rotation-x", 0.5)
            .child(Element::tag("meshBasicMaterial")),
    )
    .unwrap();

    let mesh = mesh_of(&root.scene(), 0);
    assert_eq!(mesh.borrow().rotation.x, 0.5);
    match &mesh.borrow().kind {
        ObjectKind::Mesh { material, .. } => match material {
            MaterialSlot::Single(Some(material)) => match &material.borrow().kind {
                ObjectKind::Material { color, .. } => {
                    assert_eq!(*color, ColorValue::from_hex(0xff0000));
                }
                _ => unreachable!(),
            },
            _ => panic!("expected a material"),
        },
        _ => unreachable!(),
    }
}

#[test]
fn args_change_recreates_geometry() {
    use spark_scene::GeometryShape;

    let root = create_root(None);
    let (reference, slot) = Ref::slot();
    let tree = |size: f64, reference: Ref| {
        Element::tag("mesh").child(
            Element::tag("boxGeometry")
                .args([Value::Num(size)])
                .reference(reference),
        )
    };
    root.render(tree(1.0, reference.clone())).unwrap();
    let first =
        spark_scene::instance_to_handle(&slot.borrow().clone().unwrap()).unwrap();

    root.render(tree(2.0, reference)).unwrap();
    let second =
        spark_scene::instance_to_handle(&slot.borrow().clone().unwrap()).unwrap();

    // The ref follows the replacement instance; the old object is gone
    // from the adapter's view.
    assert!(!Rc::ptr_eq(&first, &second));
    match second.borrow().kind {
        ObjectKind::Geometry(GeometryShape::Box { width, .. }) => assert_eq!(width, 2.0),
        _ => panic!("expected a box geometry"),
    }
}

#[test]
fn ref_receives_scene_object_not_proxy() {
    let root = create_root(None);
    let (reference, slot) = Ref::slot();
    root.render(
        Element::tag("mesh")
            .prop("name", "target")
            .reference(reference),
    )
    .unwrap();

    let held = slot.borrow().clone().expect("ref not attached");
    let object = spark_scene::instance_to_handle(&held).expect("public instance is the object");
    assert_eq!(object.borrow().name, "target");

    root.unmount().unwrap();
    assert!(slot.borrow().is_none());
}

#[test]
fn unmount_disposes_whole_subtree() {
    let root = create_root(None);
    root.render(
        Element::tag("group").child(
            Element::tag("mesh")
                .child(Element::tag("boxGeometry"))
                .child(Element::tag("meshNormalMaterial")),
        ),
    )
    .unwrap();

    let group = mesh_of(&root.scene(), 0);
    let mesh = group.borrow().children[0].clone();
    let (geometry, material) = match &mesh.borrow().kind {
        ObjectKind::Mesh { geometry, material } => (
            geometry.clone().unwrap(),
            match material {
                MaterialSlot::Single(Some(m)) => m.clone(),
                _ => panic!("expected a material"),
            },
        ),
        _ => unreachable!(),
    };

    root.unmount().unwrap();

    assert!(root.scene().borrow().children.is_empty());
    for object in [&group, &mesh, &geometry, &material] {
        assert!(object.borrow().disposed);
    }
}

#[test]
fn reorder_moves_scene_children() {
    let root = create_root(None);
    let tree = |names: &[&str]| {
        Element::tag("group").children(
            names
                .iter()
                .map(|n| Element::tag("mesh").key(*n).prop("name", *n))
                .collect::<Vec<_>>(),
        )
    };
    root.render(tree(&["a", "b", "c"])).unwrap();
    root.render(tree(&["c", "a", "b"])).unwrap();

    let group = mesh_of(&root.scene(), 0);
    let names: Vec<String> = group
        .borrow()
        .children
        .iter()
        .map(|c| c.borrow().name.clone())
        .collect();
    assert_eq!(names, ["c", "a", "b"]);
}

#[test]
fn adopted_object_is_used_verbatim() {
    let root = create_root(None);
    let ready = spark_scene::SceneObject::mesh();
    ready.borrow_mut().name = "adopted".to_string();

    root.render(
        Element::tag("mesh").object(spark_scene::handle_to_instance(&ready)),
    )
    .unwrap();

    let mounted = mesh_of(&root.scene(), 0);
    assert!(Rc::ptr_eq(&mounted, &ready));
}

#[test]
fn unknown_tag_fails_the_commit() {
    let root = create_root(None);
    let err = root
        .render(Element::tag("mesh").child(Element::tag("torusKnot")))
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Host(HostError::UnknownType(tag)) if tag == "torusKnot"
    ));
}

#[test]
fn extend_registers_new_intrinsics() {
    use spark_scene::SceneObject;

    spark_scene::extend(
        "rig",
        Rc::new(|_args: &[Value]| Ok(SceneObject::group())),
    );

    let root = create_root(None);
    root.render(Element::tag("rig").prop("name", "custom")).unwrap();
    let rig = mesh_of(&root.scene(), 0);
    assert!(matches!(rig.borrow().kind, ObjectKind::Group));
    assert_eq!(rig.borrow().name, "custom");
}

#[test]
fn lights_and_cameras_take_args_and_props() {
    let root = create_root(None);
    root.render(
        Element::fragment(vec![
            Element::tag("pointLight")
                .args([Value::Num(2.0)])
                .prop("color", "yellow")
                .prop("position", [0.0, 5.0, 0.0]),
            Element::tag("perspectiveCamera")
                .args([Value::Num(75.0)])
                .prop("position-z", 5.0),
        ]),
    )
    .unwrap();

    let scene = root.scene();
    let light = scene.borrow().children[0].clone();
    match &light.borrow().kind {
        ObjectKind::PointLight { color, intensity } => {
            assert_eq!(*intensity, 2.0);
            assert_eq!(*color, ColorValue::from_hex(0xffff00));
        }
        _ => panic!("expected a light"),
    }

    let camera = scene.borrow().children[1].clone();
    match &camera.borrow().kind {
        ObjectKind::PerspectiveCamera { fov, .. } => assert_eq!(*fov, 75.0),
        _ => panic!("expected a camera"),
    }
    assert_eq!(camera.borrow().position.z, 5.0);
}

#[test]
fn container_info_is_shared_scene() {
    let scene = spark_scene::SceneObject::scene();
    let root = create_root(Some(scene.clone()));
    root.render(Element::tag("group")).unwrap();

    // The handle passed in is the handle mutated.
    assert_eq!(scene.borrow().children.len(), 1);
    assert!(Rc::ptr_eq(&scene, &root.scene()));
}
