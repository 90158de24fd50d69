//! Intrinsic tag catalogue.
//!
//! Maps lower-case intrinsic tags to constructors over positional `args`.
//! The built-in scene vocabulary is preregistered on first use; embedders
//! add their own object types with [`extend`]. Unregistered tags fail at
//! instance creation.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::host::HostError;
use crate::types::Value;

use super::object::{MaterialFlavor, SceneHandle, SceneObject};

/// Constructor for one intrinsic tag.
pub type Constructor = Rc<dyn Fn(&[Value]) -> Result<SceneHandle, HostError>>;

thread_local! {
    static CATALOGUE: RefCell<HashMap<String, Constructor>> = RefCell::new(HashMap::new());
    static BUILTINS_READY: Cell<bool> = const { Cell::new(false) };
}

// =============================================================================
// Registration
// =============================================================================

/// Register (or replace) a constructor for `tag`.
pub fn extend(tag: impl Into<String>, constructor: Constructor) {
    CATALOGUE.with(|catalogue| {
        catalogue.borrow_mut().insert(tag.into(), constructor);
    });
}

/// Construct an object for `tag` from positional `args`.
pub fn construct(tag: &str, args: &[Value]) -> Result<SceneHandle, HostError> {
    ensure_builtins();
    let constructor = CATALOGUE.with(|catalogue| catalogue.borrow().get(tag).cloned());
    match constructor {
        Some(constructor) => constructor(args),
        None => Err(HostError::UnknownType(tag.to_string())),
    }
}

/// Drop every registration, builtins included. Test support.
pub fn reset_catalogue() {
    CATALOGUE.with(|catalogue| catalogue.borrow_mut().clear());
    BUILTINS_READY.with(|ready| ready.set(false));
}

// =============================================================================
// Builtins
// =============================================================================

fn num_arg(args: &[Value], at: usize, default: f64) -> f64 {
    match args.get(at) {
        Some(Value::Num(n)) => *n,
        _ => default,
    }
}

fn ensure_builtins() {
    if BUILTINS_READY.with(|ready| ready.get()) {
        return;
    }
    BUILTINS_READY.with(|ready| ready.set(true));

    extend("group", Rc::new(|_| Ok(SceneObject::group())));
    extend("scene", Rc::new(|_| Ok(SceneObject::scene())));
    extend("mesh", Rc::new(|_| Ok(SceneObject::mesh())));

    extend(
        "boxGeometry",
        Rc::new(|args| {
            Ok(SceneObject::box_geometry(
                num_arg(args, 0, 1.0),
                num_arg(args, 1, 1.0),
                num_arg(args, 2, 1.0),
            ))
        }),
    );
    extend(
        "sphereGeometry",
        Rc::new(|args| {
            Ok(SceneObject::sphere_geometry(
                num_arg(args, 0, 1.0),
                num_arg(args, 1, 32.0) as u32,
                num_arg(args, 2, 16.0) as u32,
            ))
        }),
    );
    extend(
        "planeGeometry",
        Rc::new(|args| {
            Ok(SceneObject::plane_geometry(
                num_arg(args, 0, 1.0),
                num_arg(args, 1, 1.0),
            ))
        }),
    );

    extend(
        "meshNormalMaterial",
        Rc::new(|_| Ok(SceneObject::material(MaterialFlavor::Normal))),
    );
    extend(
        "meshBasicMaterial",
        Rc::new(|_| Ok(SceneObject::material(MaterialFlavor::Basic))),
    );
    extend(
        "meshStandardMaterial",
        Rc::new(|_| Ok(SceneObject::material(MaterialFlavor::Standard))),
    );

    extend(
        "pointLight",
        Rc::new(|args| Ok(SceneObject::point_light(num_arg(args, 0, 1.0)))),
    );
    extend(
        "perspectiveCamera",
        Rc::new(|args| Ok(SceneObject::perspective_camera(num_arg(args, 0, 50.0)))),
    );
}

// =============================================================================
// Tests
// =============================================================================
