//! Prop path resolution and application.
//!
//! Declarative prop names address nested mutable state on scene objects
//! without a schema: a hyphenated path resolves to an owner object plus a
//! capability-tagged leaf, and application dispatches on (leaf, value)
//! rather than probing the target:
//!
//! - same concrete type       -> copy into the existing target
//! - numeric sequence         -> spread onto the set-from-components form
//! - plain number on a vector -> uniform scalar fill
//! - color name / hex / packed number -> the generic color setter
//! - everything else          -> direct assignment
//!
//! Attachment slots (`geometry`, `material`, `material-N`) resolve through
//! the same paths; attaching records the previous slot content so detach
//! can restore it exactly.

use crate::host::HostError;
use crate::types::{DetachFn, Props, Value, NODE_BACKREF_PROP};

use super::object::{
    ColorValue, MaterialSlot, ObjectKind, SceneHandle, Vec3,
};

// =============================================================================
// Resolution
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VectorField {
    Position,
    Rotation,
    Scale,
}

/// Attachment slot addressed by a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotKey {
    Geometry,
    Material,
    MaterialIndex(usize),
}

/// Leaf a path resolved to, tagged with the capabilities it supports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LeafField {
    Vector(VectorField),
    Axis(VectorField, usize),
    Color,
    Opacity,
    Wireframe,
    Intensity,
    Visible,
    Name,
    Fov,
    Aspect,
    Near,
    Far,
    Slot(SlotKey),
}

pub(crate) struct Resolved {
    pub owner: SceneHandle,
    pub field: LeafField,
}

fn prop_error(key: &str, message: &str) -> HostError {
    HostError::Prop {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn vector_field(segment: &str) -> Option<VectorField> {
    match segment {
        "position" => Some(VectorField::Position),
        "rotation" => Some(VectorField::Rotation),
        "scale" => Some(VectorField::Scale),
        _ => None,
    }
}

fn axis_index(segment: &str) -> Option<usize> {
    match segment {
        "x" => Some(0),
        "y" => Some(1),
        "z" => Some(2),
        _ => None,
    }
}

fn geometry_of(owner: &SceneHandle) -> Option<SceneHandle> {
    match &owner.borrow().kind {
        ObjectKind::Mesh { geometry, .. } => geometry.clone(),
        _ => None,
    }
}

fn material_of(owner: &SceneHandle, index: Option<usize>) -> Option<SceneHandle> {
    match &owner.borrow().kind {
        ObjectKind::Mesh { material, .. } => match (material, index) {
            (MaterialSlot::Single(slot), None) => slot.clone(),
            (MaterialSlot::Multi(slots), Some(at)) => slots.get(at).cloned().flatten(),
            _ => None,
        },
        _ => None,
    }
}

/// Resolve a hyphenated path on `object` to its owner and leaf.
///
/// Non-terminal `geometry`/`material` segments descend into the attached
/// object, so `"material-color"` addresses the material's color.
pub(crate) fn resolve(object: &SceneHandle, path: &str) -> Result<Resolved, HostError> {
    let segments: Vec<&str> = path.split('-').collect();
    let mut owner = object.clone();
    let mut at = 0;

    loop {
        let segment = segments[at];
        let remaining = segments.len() - at - 1;

        if let Some(field) = vector_field(segment) {
            return match remaining {
                0 => Ok(Resolved {
                    owner,
                    field: LeafField::Vector(field),
                }),
                1 => match axis_index(segments[at + 1]) {
                    Some(axis) => Ok(Resolved {
                        owner,
                        field: LeafField::Axis(field, axis),
                    }),
                    None => Err(prop_error(path, "expected an axis component")),
                },
                _ => Err(prop_error(path, "path continues past a vector")),
            };
        }

        match segment {
            "geometry" => {
                if remaining == 0 {
                    return Ok(Resolved {
                        owner,
                        field: LeafField::Slot(SlotKey::Geometry),
                    });
                }
                owner = geometry_of(&owner)
                    .ok_or_else(|| prop_error(path, "no geometry attached"))?;
                at += 1;
            }
            "material" => {
                let index = segments
                    .get(at + 1)
                    .and_then(|segment| segment.parse::<usize>().ok());
                match (remaining, index) {
                    (0, _) => {
                        return Ok(Resolved {
                            owner,
                            field: LeafField::Slot(SlotKey::Material),
                        });
                    }
                    (1, Some(index)) => {
                        return Ok(Resolved {
                            owner,
                            field: LeafField::Slot(SlotKey::MaterialIndex(index)),
                        });
                    }
                    (_, Some(index)) => {
                        owner = material_of(&owner, Some(index))
                            .ok_or_else(|| prop_error(path, "no material at index"))?;
                        at += 2;
                    }
                    (_, None) => {
                        owner = material_of(&owner, None)
                            .ok_or_else(|| prop_error(path, "no material attached"))?;
                        at += 1;
                    }
                }
            }
            _ if remaining == 0 => {
                let field = match segment {
                    "color" => LeafField::Color,
                    "opacity" => LeafField::Opacity,
                    "wireframe" => LeafField::Wireframe,
                    "intensity" => LeafField::Intensity,
                    "visible" => LeafField::Visible,
                    "name" => LeafField::Name,
                    "fov" => LeafField::Fov,
                    "aspect" => LeafField::Aspect,
                    "near" => LeafField::Near,
                    "far" => LeafField::Far,
                    _ => return Err(prop_error(path, "unknown property")),
                };
                return Ok(Resolved { owner, field });
            }
            _ => return Err(prop_error(path, "unknown path segment")),
        }
    }
}

// =============================================================================
// Application
// =============================================================================

fn apply_vector(vector: &mut Vec3, key: &str, value: &Value) -> Result<(), HostError> {
    match value {
        Value::Object(instance) => match instance.downcast_ref::<Vec3>() {
            Some(other) => {
                vector.copy(other);
                Ok(())
            }
            None => Err(prop_error(key, "object is not a vector")),
        },
        Value::Seq(parts) if parts.len() == 3 => {
            vector.set(parts[0], parts[1], parts[2]);
            Ok(())
        }
        Value::Seq(_) => Err(prop_error(key, "expected three components")),
        Value::Num(scalar) => {
            vector.set_scalar(*scalar);
            Ok(())
        }
        _ => Err(prop_error(key, "cannot assign to a vector")),
    }
}

fn apply_color(color: &mut ColorValue, key: &str, value: &Value) -> Result<(), HostError> {
    match value {
        Value::Object(instance) => match instance.downcast_ref::<ColorValue>() {
            Some(other) => {
                color.copy(other);
                Ok(())
            }
            None => Err(prop_error(key, "object is not a color")),
        },
        Value::Seq(parts) if parts.len() == 3 => {
            color.set_rgb(parts[0], parts[1], parts[2]);
            Ok(())
        }
        Value::Num(packed) => {
            *color = ColorValue::from_hex(*packed as u32);
            Ok(())
        }
        Value::Str(text) => match ColorValue::parse(text) {
            Some(parsed) => {
                *color = parsed;
                Ok(())
            }
            None => Err(prop_error(key, "unrecognized color")),
        },
        _ => Err(prop_error(key, "cannot assign to a color")),
    }
}

fn expect_num(key: &str, value: &Value) -> Result<f64, HostError> {
    match value {
        Value::Num(n) => Ok(*n),
        _ => Err(prop_error(key, "expected a number")),
    }
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, HostError> {
    match value {
        Value::Bool(b) => Ok(*b),
        _ => Err(prop_error(key, "expected a boolean")),
    }
}

/// Apply one prop value at an already-resolved leaf.
pub(crate) fn apply_resolved(
    resolved: &Resolved,
    key: &str,
    value: &Value,
) -> Result<(), HostError> {
    let mut owner = resolved.owner.borrow_mut();
    match resolved.field {
        LeafField::Vector(field) => {
            let vector = match field {
                VectorField::Position => &mut owner.position,
                VectorField::Rotation => &mut owner.rotation,
                VectorField::Scale => &mut owner.scale,
            };
            apply_vector(vector, key, value)
        }
        LeafField::Axis(field, axis) => {
            let vector = match field {
                VectorField::Position => &mut owner.position,
                VectorField::Rotation => &mut owner.rotation,
                VectorField::Scale => &mut owner.scale,
            };
            let component = vector
                .component_mut(axis)
                .ok_or_else(|| prop_error(key, "axis out of range"))?;
            *component = expect_num(key, value)?;
            Ok(())
        }
        LeafField::Color => match &mut owner.kind {
            ObjectKind::Material { color, .. } | ObjectKind::PointLight { color, .. } => {
                apply_color(color, key, value)
            }
            _ => Err(prop_error(key, "object has no color")),
        },
        LeafField::Opacity => match &mut owner.kind {
            ObjectKind::Material { opacity, .. } => {
                *opacity = expect_num(key, value)?;
                Ok(())
            }
            _ => Err(prop_error(key, "object has no opacity")),
        },
        LeafField::Wireframe => match &mut owner.kind {
            ObjectKind::Material { wireframe, .. } => {
                *wireframe = expect_bool(key, value)?;
                Ok(())
            }
            _ => Err(prop_error(key, "object has no wireframe mode")),
        },
        LeafField::Intensity => match &mut owner.kind {
            ObjectKind::PointLight { intensity, .. } => {
                *intensity = expect_num(key, value)?;
                Ok(())
            }
            _ => Err(prop_error(key, "object has no intensity")),
        },
        LeafField::Visible => {
            owner.visible = expect_bool(key, value)?;
            Ok(())
        }
        LeafField::Name => match value {
            Value::Str(name) => {
                owner.name = name.clone();
                Ok(())
            }
            _ => Err(prop_error(key, "expected a string")),
        },
        LeafField::Fov | LeafField::Aspect | LeafField::Near | LeafField::Far => {
            match &mut owner.kind {
                ObjectKind::PerspectiveCamera {
                    fov,
                    aspect,
                    near,
                    far,
                } => {
                    let target = match resolved.field {
                        LeafField::Fov => fov,
                        LeafField::Aspect => aspect,
                        LeafField::Near => near,
                        _ => far,
                    };
                    *target = expect_num(key, value)?;
                    Ok(())
                }
                _ => Err(prop_error(key, "object is not a camera")),
            }
        }
        LeafField::Slot(slot) => {
            let handle = match value {
                Value::Object(instance) => super::object::instance_to_handle(instance)
                    .ok_or_else(|| prop_error(key, "object is not a scene object"))?,
                _ => return Err(prop_error(key, "expected a scene object")),
            };
            drop(owner);
            set_slot(&resolved.owner, slot, Some(handle)).map(|_| ())
        }
    }
}

/// Apply every non-reserved prop in `props` to `object`.
pub(crate) fn apply_props(object: &SceneHandle, props: &Props) -> Result<(), HostError> {
    for (key, value) in &props.values {
        if key == NODE_BACKREF_PROP {
            continue;
        }
        let resolved = resolve(object, key)?;
        apply_resolved(&resolved, key, value)?;
    }
    Ok(())
}

/// Changed pairs from `old` to `new`, skipping reserved keys. Removed keys
/// keep their last applied value.
pub(crate) fn diff_props(old: &Props, new: &Props) -> Vec<(String, Value)> {
    let mut changed = Vec::new();
    for (key, value) in &new.values {
        if key == NODE_BACKREF_PROP {
            continue;
        }
        if old.values.get(key) != Some(value) {
            changed.push((key.clone(), value.clone()));
        }
    }
    changed
}

// =============================================================================
// Attachment Slots
// =============================================================================

/// Previous content of a slot, captured before an attach.
#[derive(Debug)]
pub(crate) enum PrevSlot {
    Geometry(Option<SceneHandle>),
    Material(MaterialSlot),
    MaterialEntry(usize, Option<SceneHandle>),
}

/// What detaching a child must undo.
pub(crate) enum PrevAttach {
    Slot(PrevSlot),
    Callback(DetachFn),
}

/// Assign `content` into `slot` of the owner, returning the previous
/// content. An indexed material slot auto-initializes the sequence.
fn set_slot(
    owner: &SceneHandle,
    slot: SlotKey,
    content: Option<SceneHandle>,
) -> Result<PrevSlot, HostError> {
    let mut object = owner.borrow_mut();
    let ObjectKind::Mesh { geometry, material } = &mut object.kind else {
        return Err(HostError::Attach(match slot {
            SlotKey::Geometry => "geometry".to_string(),
            SlotKey::Material => "material".to_string(),
            SlotKey::MaterialIndex(at) => format!("material-{at}"),
        }));
    };
    match slot {
        SlotKey::Geometry => {
            let prev = geometry.clone();
            *geometry = content;
            Ok(PrevSlot::Geometry(prev))
        }
        SlotKey::Material => {
            let prev = material.clone();
            *material = MaterialSlot::Single(content);
            Ok(PrevSlot::Material(prev))
        }
        SlotKey::MaterialIndex(at) => {
            if !matches!(material, MaterialSlot::Multi(_)) {
                *material = MaterialSlot::Multi(Vec::new());
            }
            let MaterialSlot::Multi(slots) = material else {
                unreachable!()
            };
            if slots.len() <= at {
                slots.resize(at + 1, None);
            }
            let prev = slots[at].clone();
            slots[at] = content;
            Ok(PrevSlot::MaterialEntry(at, prev))
        }
    }
}

/// Attach `child` into the slot `path` names on `parent`, returning the
/// restore record.
pub(crate) fn attach_at_path(
    parent: &SceneHandle,
    child: &SceneHandle,
    path: &str,
) -> Result<PrevSlot, HostError> {
    let resolved = resolve(parent, path)
        .map_err(|_| HostError::Attach(path.to_string()))?;
    let LeafField::Slot(slot) = resolved.field else {
        return Err(HostError::Attach(path.to_string()));
    };
    set_slot(&resolved.owner, slot, Some(child.clone()))
}

/// Restore a slot to its content from before the matching attach.
pub(crate) fn restore_slot(owner: &SceneHandle, prev: PrevSlot) {
    let mut object = owner.borrow_mut();
    let ObjectKind::Mesh { geometry, material } = &mut object.kind else {
        return;
    };
    match prev {
        PrevSlot::Geometry(content) => *geometry = content,
        PrevSlot::Material(slot) => *material = slot,
        PrevSlot::MaterialEntry(at, content) => {
            if let MaterialSlot::Multi(slots) = material {
                if at < slots.len() {
                    slots[at] = content;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
