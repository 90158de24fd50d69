//! Multi Material - indexed attachment slots and keyed reordering.
//!
//! Shows the slot side of the host configuration: materials attached at
//! indexed slots, a light and camera living alongside, and keyed children
//! reordering without remounting.
//!
//! Run with: cargo run --example multi_material

use spark_scene::{create_root, format_tree, Attach, Element, Value};

fn scene_tree(order: &[&str]) -> Element {
    Element::fragment(vec![
        Element::tag("pointLight")
            .args([Value::Num(2.0)])
            .prop("position", [0.0, 4.0, 2.0])
            .prop("color", "yellow"),
        Element::tag("group").prop("name", "stage").children(
            order
                .iter()
                .enumerate()
                .map(|(at, name)| {
                    Element::tag("mesh")
                        .key(*name)
                        .prop("name", *name)
                        .prop("position", vec![at as f64 * 2.0, 0.0, 0.0])
                        .child(Element::tag("sphereGeometry").args([Value::Num(0.5)]))
                        .child(
                            Element::tag("meshBasicMaterial")
                                .attach(Attach::path("material-0"))
                                .prop("color", "red"),
                        )
                        .child(
                            Element::tag("meshStandardMaterial")
                                .attach(Attach::path("material-1"))
                                .prop("color", "#336699"),
                        )
                })
                .collect::<Vec<_>>(),
        ),
    ])
}

fn main() {
    env_logger::init();

    println!("=== spark-scene Multi Material ===\n");

    let root = create_root(None);
    root.render(scene_tree(&["left", "middle", "right"])).expect("mount failed");
    println!("Mounted:\n{}", format_tree(&root.scene()));

    root.render(scene_tree(&["right", "left", "middle"])).expect("reorder failed");
    println!("Reordered (same meshes, moved in place):\n{}", format_tree(&root.scene()));

    root.unmount().expect("unmount failed");
    println!("Unmounted:\n{}", format_tree(&root.scene()));
}
