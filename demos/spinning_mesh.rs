//! Spinning Mesh - declarative scene driven by a signal.
//!
//! Demonstrates the core loop:
//! - mount a mesh with geometry and material through the reconciler
//! - bind the element tree to a rotation signal
//! - advance the rotation from a frame subscriber and watch the retained
//!   scene update without remounting anything
//!
//! Run with: cargo run --example spinning_mesh

use std::rc::Rc;

use spark_signals::signal;
use spark_scene::{create_root, format_tree, Element, Value};

fn main() {
    env_logger::init();

    println!("=== spark-scene Spinning Mesh ===\n");

    let root = create_root(None);
    let angle = signal(0.0f64);

    // The builder re-runs whenever `angle` changes.
    let rotation = angle.clone();
    root.bind(move || {
        Element::tag("mesh")
            .prop("name", "cube")
            .prop("rotation", vec![0.0, rotation.get(), 0.0])
            .child(Element::tag("boxGeometry").args([Value::Num(1.0)]))
            .child(Element::tag("meshNormalMaterial"))
    });

    println!("Initial scene:\n{}", format_tree(&root.scene()));

    // A frame subscriber advances the angle; the bound render effect picks
    // the change up and commits it as a prop update.
    let rotation = angle.clone();
    let _cancel = root.on_frame(
        Rc::new(move |state| {
            rotation.set(rotation.get() + state.delta);
        }),
        0,
    );

    for frame in 1..=3 {
        root.tick(0.5);
        println!(
            "After frame {frame} (angle {:.2}):",
            angle.get()
        );
        println!("{}", format_tree(&root.scene()));
    }

    root.unmount().expect("unmount failed");
    println!("Scene after unmount:\n{}", format_tree(&root.scene()));
}
