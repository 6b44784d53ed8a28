//! Actors and the data the semantic layer reads from them.
//!
//! An [`Actor`] is anything placed in a scene. The semantic layer only cares
//! about a handful of actor kinds (static meshes, skeletal meshes, physics
//! constraints); everything else is carried as [`ActorKind::Other`] so that
//! callers can still ask whether it supports an individual.

use serde::{Deserialize, Serialize};

use crate::handle::ActorId;

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Location plus rotation (unit quaternion `[x, y, z, w]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub location: [f64; 3],
    pub rotation: [f64; 4],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        location: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    /// Transform at `location` with identity rotation.
    pub fn from_location(x: f64, y: f64, z: f64) -> Self {
        Self {
            location: [x, y, z],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Returns `true` if both location and rotation components differ from
    /// `other` by no more than `tolerance`.
    pub fn equals(&self, other: &Transform, tolerance: f64) -> bool {
        self.location
            .iter()
            .zip(other.location.iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
            && self
                .rotation
                .iter()
                .zip(other.rotation.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Mobility
// ---------------------------------------------------------------------------

/// How an actor is allowed to move during simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mobility {
    #[default]
    Static,
    Stationary,
    Movable,
}

// ---------------------------------------------------------------------------
// Skeleton
// ---------------------------------------------------------------------------

/// One bone of a skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneDesc {
    pub name: String,
    /// Index of the parent bone; `None` for the root.
    pub parent: Option<usize>,
}

/// A physics constraint between two bones of the same skeleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneConstraintDesc {
    pub name: String,
    /// Constrained (child) bone.
    pub bone1: String,
    /// Reference (parent) bone.
    pub bone2: String,
    pub linear: AxisLocks,
    pub angular: AxisLocks,
}

/// An animation skeleton: bones stored parent-before-child, plus the
/// physics constraints joining them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub bones: Vec<BoneDesc>,
    #[serde(default)]
    pub constraints: Vec<BoneConstraintDesc>,
}

impl Skeleton {
    /// Build a skeleton from `(name, parent)` pairs.
    pub fn from_bones<S: Into<String>>(bones: impl IntoIterator<Item = (S, Option<usize>)>) -> Self {
        Self {
            bones: bones
                .into_iter()
                .map(|(name, parent)| BoneDesc {
                    name: name.into(),
                    parent,
                })
                .collect(),
            constraints: Vec::new(),
        }
    }

    /// Add a constraint between the bones named `bone1` and `bone2`.
    pub fn with_constraint(
        mut self,
        name: impl Into<String>,
        bone1: impl Into<String>,
        bone2: impl Into<String>,
        linear: AxisLocks,
        angular: AxisLocks,
    ) -> Self {
        self.constraints.push(BoneConstraintDesc {
            name: name.into(),
            bone1: bone1.into(),
            bone2: bone2.into(),
            linear,
            angular,
        });
        self
    }

    /// A single chain `bone_0 -> bone_1 -> ... -> bone_{n-1}`.
    pub fn chain(num_bones: usize) -> Self {
        Self::from_bones((0..num_bones).map(|i| (format!("bone_{i}"), i.checked_sub(1))))
    }

    pub fn num_bones(&self) -> usize {
        self.bones.len()
    }

    pub fn bone_name(&self, index: usize) -> Option<&str> {
        self.bones.get(index).map(|b| b.name.as_str())
    }

    pub fn parent_index(&self, index: usize) -> Option<usize> {
        self.bones.get(index).and_then(|b| b.parent)
    }

    /// Indices of the direct children of `index`, in skeleton order.
    pub fn child_indices(&self, index: usize) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent == Some(index))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraint(&self, index: usize) -> Option<&BoneConstraintDesc> {
        self.constraints.get(index)
    }
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

/// A mesh material slot.
///
/// `mask_color` is `Some` while a mask material overrides the original one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSlot {
    pub name: String,
    pub original_material: String,
    #[serde(default)]
    pub mask_color: Option<String>,
}

impl MaterialSlot {
    pub fn new(name: impl Into<String>, original_material: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            original_material: original_material.into(),
            mask_color: None,
        }
    }

    /// Name of the material currently rendered in this slot.
    pub fn active_material(&self) -> String {
        match &self.mask_color {
            Some(color) => format!("MaskMaterial#{color}"),
            None => self.original_material.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActorKind
// ---------------------------------------------------------------------------

/// Whether each axis of a constraint is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AxisLocks {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisLocks {
    pub const ALL: AxisLocks = AxisLocks {
        x: true,
        y: true,
        z: true,
    };
    pub const NONE: AxisLocks = AxisLocks {
        x: false,
        y: false,
        z: false,
    };

    pub fn all_locked(&self) -> bool {
        self.x && self.y && self.z
    }
}

/// What an actor is, as far as the semantic layer is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActorKind {
    /// Rigid mesh with material slots.
    StaticMesh {
        mesh_name: String,
        materials: Vec<MaterialSlot>,
    },
    /// Articulated mesh driven by a skeleton.
    SkeletalMesh {
        mesh_name: String,
        skeleton: Skeleton,
        materials: Vec<MaterialSlot>,
        /// Current component-space pose per bone (same order as the skeleton).
        #[serde(default)]
        bone_poses: Vec<Transform>,
    },
    /// Physics constraint joining two actors.
    PhysicsConstraint {
        actor1: Option<ActorId>,
        actor2: Option<ActorId>,
        linear: AxisLocks,
        /// Swing1, swing2, twist.
        angular: AxisLocks,
    },
    /// Any actor type the semantic layer does not describe.
    Other { type_name: String },
}

impl ActorKind {
    /// Engine-style class name of the actor kind.
    pub fn type_name(&self) -> &str {
        match self {
            ActorKind::StaticMesh { .. } => "StaticMeshActor",
            ActorKind::SkeletalMesh { .. } => "SkeletalMeshActor",
            ActorKind::PhysicsConstraint { .. } => "PhysicsConstraintActor",
            ActorKind::Other { type_name } => type_name.as_str(),
        }
    }

    pub fn mesh_name(&self) -> Option<&str> {
        match self {
            ActorKind::StaticMesh { mesh_name, .. } | ActorKind::SkeletalMesh { mesh_name, .. } => {
                Some(mesh_name.as_str())
            }
            _ => None,
        }
    }

    pub fn materials(&self) -> &[MaterialSlot] {
        match self {
            ActorKind::StaticMesh { materials, .. } | ActorKind::SkeletalMesh { materials, .. } => {
                materials.as_slice()
            }
            _ => &[],
        }
    }

    pub(crate) fn materials_mut(&mut self) -> Option<&mut Vec<MaterialSlot>> {
        match self {
            ActorKind::StaticMesh { materials, .. } | ActorKind::SkeletalMesh { materials, .. } => {
                Some(materials)
            }
            _ => None,
        }
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        match self {
            ActorKind::SkeletalMesh { skeleton, .. } => Some(skeleton),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// A scene actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub kind: ActorKind,
    #[serde(default)]
    pub mobility: Mobility,
    #[serde(default)]
    pub transform: Transform,
    /// Actor this one is attached to, if any.
    #[serde(default)]
    pub attach_parent: Option<ActorId>,
    /// Socket or bone name on the attach parent.
    #[serde(default)]
    pub attach_socket: Option<String>,
    /// Marks skeletal actors that are robots.
    #[serde(default)]
    pub is_robot: bool,
    /// Persisted tags, see [`crate::tags`].
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Actor {
    pub fn new(name: impl Into<String>, kind: ActorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            mobility: Mobility::Static,
            transform: Transform::IDENTITY,
            attach_parent: None,
            attach_socket: None,
            is_robot: false,
            tags: Vec::new(),
        }
    }

    /// Static mesh actor with one material slot per `slots` entry.
    pub fn static_mesh(name: impl Into<String>, mesh_name: impl Into<String>, slots: &[&str]) -> Self {
        let materials = slots
            .iter()
            .map(|s| MaterialSlot::new(*s, format!("M_{s}")))
            .collect();
        Self::new(
            name,
            ActorKind::StaticMesh {
                mesh_name: mesh_name.into(),
                materials,
            },
        )
    }

    /// Skeletal mesh actor with the given skeleton and material slots.
    pub fn skeletal_mesh(
        name: impl Into<String>,
        mesh_name: impl Into<String>,
        skeleton: Skeleton,
        slots: &[&str],
    ) -> Self {
        let materials = slots
            .iter()
            .map(|s| MaterialSlot::new(*s, format!("M_{s}")))
            .collect();
        let bone_poses = vec![Transform::IDENTITY; skeleton.num_bones()];
        Self::new(
            name,
            ActorKind::SkeletalMesh {
                mesh_name: mesh_name.into(),
                skeleton,
                materials,
                bone_poses,
            },
        )
    }

    /// Physics constraint between two actors.
    pub fn constraint(
        name: impl Into<String>,
        actor1: Option<ActorId>,
        actor2: Option<ActorId>,
        linear: AxisLocks,
        angular: AxisLocks,
    ) -> Self {
        Self::new(
            name,
            ActorKind::PhysicsConstraint {
                actor1,
                actor2,
                linear,
                angular,
            },
        )
    }

    pub fn with_mobility(mut self, mobility: Mobility) -> Self {
        self.mobility = mobility;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn as_robot(mut self) -> Self {
        self.is_robot = true;
        self
    }

    pub fn is_movable(&self) -> bool {
        self.mobility == Mobility::Movable
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
