//! Retained scene objects.
//!
//! A deliberately small retained-mode graph in the shape renderers expect:
//! spatial nodes (groups, meshes, lights, cameras) parent each other,
//! while geometries and materials live in named slots on their mesh. All
//! handles are shared single-threaded references; nothing here knows about
//! elements, fibers, or host configurations.

use std::any::Any;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::types::Instance;

/// Shared handle to a scene object.
pub type SceneHandle = Rc<RefCell<SceneObject>>;

// =============================================================================
// Vec3
// =============================================================================

/// Three-component vector used for position, rotation, and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Set from components.
    pub fn set(&mut self, x: f64, y: f64, z: f64) {
        self.x = x;
        self.y = y;
        self.z = z;
    }

    /// Fill all components with one value.
    pub fn set_scalar(&mut self, value: f64) {
        self.set(value, value, value);
    }

    pub fn copy(&mut self, other: &Vec3) {
        *self = *other;
    }

    pub fn component_mut(&mut self, at: usize) -> Option<&mut f64> {
        match at {
            0 => Some(&mut self.x),
            1 => Some(&mut self.y),
            2 => Some(&mut self.z),
            _ => None,
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

// =============================================================================
// Color
// =============================================================================

/// RGB color with 0.0–1.0 channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorValue {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl ColorValue {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Decode a packed `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        Self::new(
            ((hex >> 16) & 0xff) as f64 / 255.0,
            ((hex >> 8) & 0xff) as f64 / 255.0,
            (hex & 0xff) as f64 / 255.0,
        )
    }

    /// Parse a color name or `#rrggbb` string.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(hex) = text.strip_prefix('#') {
            return u32::from_str_radix(hex, 16).ok().map(Self::from_hex);
        }
        match text {
            "white" => Some(Self::WHITE),
            "black" => Some(Self::BLACK),
            "red" => Some(Self::from_hex(0xff0000)),
            "green" => Some(Self::from_hex(0x00ff00)),
            "blue" => Some(Self::from_hex(0x0000ff)),
            "yellow" => Some(Self::from_hex(0xffff00)),
            "cyan" => Some(Self::from_hex(0x00ffff)),
            "magenta" => Some(Self::from_hex(0xff00ff)),
            "orange" => Some(Self::from_hex(0xffa500)),
            "hotpink" => Some(Self::from_hex(0xff69b4)),
            _ => None,
        }
    }

    pub fn set_rgb(&mut self, r: f64, g: f64, b: f64) {
        self.r = r;
        self.g = g;
        self.b = b;
    }

    pub fn copy(&mut self, other: &ColorValue) {
        *self = *other;
    }
}

impl Default for ColorValue {
    fn default() -> Self {
        Self::WHITE
    }
}

// =============================================================================
// Object Kinds
// =============================================================================

/// Geometry parameters, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryShape {
    Box {
        width: f64,
        height: f64,
        depth: f64,
    },
    Sphere {
        radius: f64,
        width_segments: u32,
        height_segments: u32,
    },
    Plane {
        width: f64,
        height: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialFlavor {
    Normal,
    Basic,
    Standard,
}

/// The mesh material slot: a single material, or an indexed set once an
/// indexed attach touched it.
#[derive(Debug, Clone)]
pub enum MaterialSlot {
    Single(Option<SceneHandle>),
    Multi(Vec<Option<SceneHandle>>),
}

/// What a scene object is, with the state specific to that kind.
#[derive(Debug)]
pub enum ObjectKind {
    Group,
    Scene,
    Mesh {
        geometry: Option<SceneHandle>,
        material: MaterialSlot,
    },
    Geometry(GeometryShape),
    Material {
        flavor: MaterialFlavor,
        color: ColorValue,
        opacity: f64,
        wireframe: bool,
    },
    PointLight {
        color: ColorValue,
        intensity: f64,
    },
    PerspectiveCamera {
        fov: f64,
        aspect: f64,
        near: f64,
        far: f64,
    },
}

// =============================================================================
// Scene Object
// =============================================================================

/// One node of the retained graph.
#[derive(Debug)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub visible: bool,
    pub children: Vec<SceneHandle>,
    pub disposed: bool,
}

impl SceneObject {
    fn with_kind(kind: ObjectKind) -> SceneHandle {
        Rc::new(RefCell::new(Self {
            name: String::new(),
            kind,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            visible: true,
            children: Vec::new(),
            disposed: false,
        }))
    }

    pub fn group() -> SceneHandle {
        Self::with_kind(ObjectKind::Group)
    }

    pub fn scene() -> SceneHandle {
        Self::with_kind(ObjectKind::Scene)
    }

    pub fn mesh() -> SceneHandle {
        Self::with_kind(ObjectKind::Mesh {
            geometry: None,
            material: MaterialSlot::Single(None),
        })
    }

    pub fn box_geometry(width: f64, height: f64, depth: f64) -> SceneHandle {
        Self::with_kind(ObjectKind::Geometry(GeometryShape::Box {
            width,
            height,
            depth,
        }))
    }

    pub fn sphere_geometry(radius: f64, width_segments: u32, height_segments: u32) -> SceneHandle {
        Self::with_kind(ObjectKind::Geometry(GeometryShape::Sphere {
            radius,
            width_segments,
            height_segments,
        }))
    }

    pub fn plane_geometry(width: f64, height: f64) -> SceneHandle {
        Self::with_kind(ObjectKind::Geometry(GeometryShape::Plane { width, height }))
    }

    pub fn material(flavor: MaterialFlavor) -> SceneHandle {
        Self::with_kind(ObjectKind::Material {
            flavor,
            color: ColorValue::WHITE,
            opacity: 1.0,
            wireframe: false,
        })
    }

    pub fn point_light(intensity: f64) -> SceneHandle {
        Self::with_kind(ObjectKind::PointLight {
            color: ColorValue::WHITE,
            intensity,
        })
    }

    pub fn perspective_camera(fov: f64) -> SceneHandle {
        Self::with_kind(ObjectKind::PerspectiveCamera {
            fov,
            aspect: 1.0,
            near: 0.1,
            far: 2000.0,
        })
    }

    /// Whether this object participates in graph parenting.
    pub fn is_spatial(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Group
                | ObjectKind::Scene
                | ObjectKind::Mesh { .. }
                | ObjectKind::PointLight { .. }
                | ObjectKind::PerspectiveCamera { .. }
        )
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self.kind, ObjectKind::Geometry(_))
    }

    pub fn is_material(&self) -> bool {
        matches!(self.kind, ObjectKind::Material { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Group => "group",
            ObjectKind::Scene => "scene",
            ObjectKind::Mesh { .. } => "mesh",
            ObjectKind::Geometry(GeometryShape::Box { .. }) => "boxGeometry",
            ObjectKind::Geometry(GeometryShape::Sphere { .. }) => "sphereGeometry",
            ObjectKind::Geometry(GeometryShape::Plane { .. }) => "planeGeometry",
            ObjectKind::Material { .. } => "material",
            ObjectKind::PointLight { .. } => "pointLight",
            ObjectKind::PerspectiveCamera { .. } => "perspectiveCamera",
        }
    }

    /// Release foreign resources. The graph keeps its shape; consumers
    /// check the flag.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }
}

// =============================================================================
// Graph Edits
// =============================================================================

fn position_of(parent: &SceneObject, child: &SceneHandle) -> Option<usize> {
    parent.children.iter().position(|c| Rc::ptr_eq(c, child))
}

/// Append `child` to `parent`'s children, moving it if already present.
pub fn add_child(parent: &SceneHandle, child: &SceneHandle) {
    let mut parent = parent.borrow_mut();
    if let Some(at) = position_of(&parent, child) {
        parent.children.remove(at);
    }
    parent.children.push(child.clone());
}

/// Insert `child` before `before`; appends when `before` is absent.
pub fn insert_child_before(parent: &SceneHandle, child: &SceneHandle, before: &SceneHandle) {
    let mut parent = parent.borrow_mut();
    if let Some(at) = position_of(&parent, child) {
        parent.children.remove(at);
    }
    match position_of(&parent, before) {
        Some(at) => parent.children.insert(at, child.clone()),
        None => parent.children.push(child.clone()),
    }
}

pub fn remove_child_object(parent: &SceneHandle, child: &SceneHandle) {
    let mut parent = parent.borrow_mut();
    if let Some(at) = position_of(&parent, child) {
        parent.children.remove(at);
    }
}

// =============================================================================
// Instance Conversions
// =============================================================================

/// View a scene handle as an opaque instance.
pub fn handle_to_instance(handle: &SceneHandle) -> Instance {
    handle.clone() as Rc<dyn Any>
}

/// Recover a scene handle from an opaque instance.
pub fn instance_to_handle(instance: &Instance) -> Option<SceneHandle> {
    instance.clone().downcast::<RefCell<SceneObject>>().ok()
}

// =============================================================================
// Tree Formatting
// =============================================================================

/// Indented text rendering of the graph under `handle`, for demos and
/// debugging.
pub fn format_tree(handle: &SceneHandle) -> String {
    let mut out = String::new();
    format_into(handle, 0, &mut out);
    out
}

fn format_into(handle: &SceneHandle, depth: usize, out: &mut String) {
    let object = handle.borrow();
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{indent}{}", object.kind_name());
    if !object.name.is_empty() {
        let _ = write!(out, " \"{}\"", object.name);
    }
    if object.position != Vec3::ZERO {
        let p = object.position;
        let _ = write!(out, " @({}, {}, {})", p.x, p.y, p.z);
    }
    if object.disposed {
        let _ = write!(out, " (disposed)");
    }
    out.push('\n');

    if let ObjectKind::Mesh { geometry, material } = &object.kind {
        if let Some(geometry) = geometry {
            format_into(geometry, depth + 1, out);
        }
        match material {
            MaterialSlot::Single(Some(material)) => format_into(material, depth + 1, out),
            MaterialSlot::Multi(materials) => {
                for material in materials.iter().flatten() {
                    format_into(material, depth + 1, out);
                }
            }
            MaterialSlot::Single(None) => {}
        }
    }
    for child in &object.children {
        format_into(child, depth + 1, out);
    }
}

// =============================================================================
// Tests
// =============================================================================
