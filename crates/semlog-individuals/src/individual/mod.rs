//! Semantic individuals.
//!
//! An [`Individual`] is the semantic record of one thing in the scene: a
//! persistent unique id, a semantic class, and for perceivable variants a
//! visual mask color. Individuals are stored in an [`IndividualArena`] and
//! addressed by generational [`IndividualId`] handles; every reference between
//! individuals (and from an individual to its actor) is a handle, so a
//! destroyed individual can never be reached through a stale reference.
//!
//! The variant set is closed and modelled by [`IndividualKind`]:
//!
//! | kind          | describes                        | perceivable |
//! |---------------|----------------------------------|-------------|
//! | `Base`        | any actor, no extra data         | no          |
//! | `Visible`     | static mesh actor                | yes         |
//! | `Skeletal`    | skeletal mesh actor, owns bones  | yes         |
//! | `Bone`        | skeleton bone with material slot | yes         |
//! | `VirtualBone` | skeleton bone without material   | no          |
//! | `BoneConstraint` | constraint between two bones  | no          |
//! | `Constraint`  | physics constraint between actors| no          |
//!
//! Lifecycle operations live on the arena (see `base.rs`, `visual.rs`,
//! `skeletal.rs`, `bone.rs`, `bone_constraint.rs` and `constraint.rs`) because they need to reach
//! other individuals and the scene.

mod arena;
mod base;
mod bone;
mod bone_constraint;
mod constraint;
mod skeletal;
mod visual;

use std::fmt;

use semlog_scene::actor::{AxisLocks, Transform};
use semlog_scene::handle::ActorId;
use semlog_scene::scene::BoneClassMap;
use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::observer::Observers;

pub use arena::{IndividualArena, IndividualEvent, IndividualNotification};

semlog_scene::define_handle!(
    /// Handle to an individual stored in an [`IndividualArena`].
    IndividualId
);

// ---------------------------------------------------------------------------
// ValueKey
// ---------------------------------------------------------------------------

/// Name of a persisted semantic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKey {
    Id,
    Class,
    VisualMask,
    CalibratedVisualMask,
}

impl ValueKey {
    /// Key used in the persisted store.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKey::Id => "Id",
            ValueKey::Class => "Class",
            ValueKey::VisualMask => "VisualMask",
            ValueKey::CalibratedVisualMask => "CalibratedVisualMask",
        }
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// IndividualType
// ---------------------------------------------------------------------------

/// Fieldless discriminant of [`IndividualKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndividualType {
    Base,
    Visible,
    Skeletal,
    Bone,
    VirtualBone,
    BoneConstraint,
    Constraint,
}

impl IndividualType {
    /// Type name, also the fallback semantic class.
    pub fn type_name(self) -> &'static str {
        match self {
            IndividualType::Base => "BaseIndividual",
            IndividualType::Visible => "VisibleIndividual",
            IndividualType::Skeletal => "SkeletalIndividual",
            IndividualType::Bone => "BoneIndividual",
            IndividualType::VirtualBone => "VirtualBoneIndividual",
            IndividualType::BoneConstraint => "BoneConstraintIndividual",
            IndividualType::Constraint => "ConstraintIndividual",
        }
    }

    /// Perceivable individuals carry a visual mask.
    pub fn is_perceivable(self) -> bool {
        matches!(
            self,
            IndividualType::Visible | IndividualType::Skeletal | IndividualType::Bone
        )
    }
}

// ---------------------------------------------------------------------------
// Variant data
// ---------------------------------------------------------------------------

/// Visual mask state of a perceivable individual.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualData {
    pub(crate) visual_mask: String,
    pub(crate) calibrated_visual_mask: String,
    /// Color of the dynamic mask material, created on first use.
    pub(crate) mask_material: Option<String>,
    pub(crate) mask_material_on: bool,
}

impl VisualData {
    pub fn visual_mask(&self) -> &str {
        &self.visual_mask
    }

    pub fn calibrated_visual_mask(&self) -> &str {
        &self.calibrated_visual_mask
    }

    /// Color the dynamic mask material currently renders.
    pub fn mask_material(&self) -> Option<&str> {
        self.mask_material.as_deref()
    }

    pub fn is_mask_material_on(&self) -> bool {
        self.mask_material_on
    }
}

/// Bone decomposition owned by a skeletal individual.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletalData {
    pub(crate) visual: VisualData,
    pub(crate) bone_classes: Option<BoneClassMap>,
    pub(crate) bones: Vec<IndividualId>,
    pub(crate) virtual_bones: Vec<IndividualId>,
    pub(crate) bone_constraints: Vec<IndividualId>,
}

impl SkeletalData {
    /// Bones with a material slot, in skeleton order.
    pub fn bones(&self) -> &[IndividualId] {
        &self.bones
    }

    /// Structural bones without a material slot, in skeleton order.
    pub fn virtual_bones(&self) -> &[IndividualId] {
        &self.virtual_bones
    }

    /// One constraint individual per skeleton constraint, in skeleton order.
    pub fn bone_constraints(&self) -> &[IndividualId] {
        &self.bone_constraints
    }

    pub fn bone_classes(&self) -> Option<&BoneClassMap> {
        self.bone_classes.as_ref()
    }

    pub fn has_children(&self) -> bool {
        !self.bones.is_empty() || !self.virtual_bones.is_empty() || !self.bone_constraints.is_empty()
    }

    /// Bones, then virtual bones, then bone constraints.
    pub fn children(&self) -> impl Iterator<Item = IndividualId> + '_ {
        self.bones
            .iter()
            .chain(&self.virtual_bones)
            .chain(&self.bone_constraints)
            .copied()
    }
}

/// Position of a bone individual in its skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneLink {
    /// Owning skeletal individual.
    pub(crate) skeletal: IndividualId,
    pub(crate) bone_index: usize,
    pub(crate) is_pre_init: bool,
    /// Individual of the skeleton parent bone.
    pub(crate) parent: Option<IndividualId>,
    /// Individuals of the skeleton child bones.
    pub(crate) children: Vec<IndividualId>,
}

impl BoneLink {
    pub(crate) fn new(skeletal: IndividualId) -> Self {
        Self {
            skeletal,
            bone_index: 0,
            is_pre_init: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn skeletal(&self) -> IndividualId {
        self.skeletal
    }

    pub fn bone_index(&self) -> usize {
        self.bone_index
    }

    pub fn is_pre_init(&self) -> bool {
        self.is_pre_init
    }

    pub fn parent(&self) -> Option<IndividualId> {
        self.parent
    }

    pub fn children(&self) -> &[IndividualId] {
        &self.children
    }
}

/// A bone that renders through one material slot of the skeletal mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneData {
    pub(crate) link: BoneLink,
    pub(crate) visual: VisualData,
    pub(crate) material_index: Option<usize>,
}

impl BoneData {
    pub fn link(&self) -> &BoneLink {
        &self.link
    }

    pub fn material_index(&self) -> Option<usize> {
        self.material_index
    }
}

/// A skeleton constraint and the two bone individuals it joins.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneConstraintData {
    /// Owning skeletal individual.
    pub(crate) skeletal: IndividualId,
    pub(crate) constraint_index: usize,
    pub(crate) is_pre_init: bool,
    /// Individual of the constrained (child) bone.
    pub(crate) individual1: Option<IndividualId>,
    /// Individual of the reference (parent) bone.
    pub(crate) individual2: Option<IndividualId>,
}

impl BoneConstraintData {
    pub(crate) fn new(skeletal: IndividualId) -> Self {
        Self {
            skeletal,
            constraint_index: 0,
            is_pre_init: false,
            individual1: None,
            individual2: None,
        }
    }

    pub fn skeletal(&self) -> IndividualId {
        self.skeletal
    }

    pub fn constraint_index(&self) -> usize {
        self.constraint_index
    }

    pub fn is_pre_init(&self) -> bool {
        self.is_pre_init
    }

    pub fn individuals(&self) -> (Option<IndividualId>, Option<IndividualId>) {
        (self.individual1, self.individual2)
    }
}

/// The two constrained entities of a physics constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintData {
    pub(crate) actor1: Option<ActorId>,
    pub(crate) actor2: Option<ActorId>,
    pub(crate) individual1: Option<IndividualId>,
    pub(crate) individual2: Option<IndividualId>,
    pub(crate) linear: AxisLocks,
    pub(crate) angular: AxisLocks,
}

impl ConstraintData {
    pub fn actors(&self) -> (Option<ActorId>, Option<ActorId>) {
        (self.actor1, self.actor2)
    }

    pub fn individuals(&self) -> (Option<IndividualId>, Option<IndividualId>) {
        (self.individual1, self.individual2)
    }
}

/// Variant-specific data of an individual.
#[derive(Debug, Clone, PartialEq)]
pub enum IndividualKind {
    Base,
    Visible(VisualData),
    Skeletal(SkeletalData),
    Bone(BoneData),
    VirtualBone(BoneLink),
    BoneConstraint(BoneConstraintData),
    Constraint(ConstraintData),
}

impl IndividualKind {
    pub fn individual_type(&self) -> IndividualType {
        match self {
            IndividualKind::Base => IndividualType::Base,
            IndividualKind::Visible(_) => IndividualType::Visible,
            IndividualKind::Skeletal(_) => IndividualType::Skeletal,
            IndividualKind::Bone(_) => IndividualType::Bone,
            IndividualKind::VirtualBone(_) => IndividualType::VirtualBone,
            IndividualKind::BoneConstraint(_) => IndividualType::BoneConstraint,
            IndividualKind::Constraint(_) => IndividualType::Constraint,
        }
    }

    pub fn visual(&self) -> Option<&VisualData> {
        match self {
            IndividualKind::Visible(v) => Some(v),
            IndividualKind::Skeletal(s) => Some(&s.visual),
            IndividualKind::Bone(b) => Some(&b.visual),
            _ => None,
        }
    }

    pub(crate) fn visual_mut(&mut self) -> Option<&mut VisualData> {
        match self {
            IndividualKind::Visible(v) => Some(v),
            IndividualKind::Skeletal(s) => Some(&mut s.visual),
            IndividualKind::Bone(b) => Some(&mut b.visual),
            _ => None,
        }
    }

    pub fn bone_link(&self) -> Option<&BoneLink> {
        match self {
            IndividualKind::Bone(b) => Some(&b.link),
            IndividualKind::VirtualBone(l) => Some(l),
            _ => None,
        }
    }

    pub(crate) fn bone_link_mut(&mut self) -> Option<&mut BoneLink> {
        match self {
            IndividualKind::Bone(b) => Some(&mut b.link),
            IndividualKind::VirtualBone(l) => Some(l),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Individual
// ---------------------------------------------------------------------------

/// Semantic record of one scene entity.
#[derive(Debug, Clone)]
pub struct Individual {
    pub(crate) handle: IndividualId,
    pub(crate) kind: IndividualKind,
    /// Actor this individual describes (the skeletal actor for bones).
    pub(crate) parent_actor: ActorId,
    pub(crate) tag_type: String,
    pub(crate) id: String,
    pub(crate) class: String,
    pub(crate) attached_to_actor: Option<ActorId>,
    pub(crate) attached_to_individual: Option<IndividualId>,
    pub(crate) is_init: bool,
    pub(crate) is_loaded: bool,
    /// Set while `load` runs, so value setters do not re-enter it.
    pub(crate) loading: bool,
    pub(crate) is_movable: bool,
    pub(crate) cached_pose: Transform,
    pub(crate) observers: Observers<ComponentId>,
}

impl Individual {
    pub(crate) fn new(
        handle: IndividualId,
        kind: IndividualKind,
        parent_actor: ActorId,
        tag_type: String,
    ) -> Self {
        Self {
            handle,
            kind,
            parent_actor,
            tag_type,
            id: String::new(),
            class: String::new(),
            attached_to_actor: None,
            attached_to_individual: None,
            is_init: false,
            is_loaded: false,
            loading: false,
            is_movable: false,
            cached_pose: Transform::IDENTITY,
            observers: Observers::new(),
        }
    }

    pub fn handle(&self) -> IndividualId {
        self.handle
    }

    pub fn kind(&self) -> &IndividualKind {
        &self.kind
    }

    pub fn individual_type(&self) -> IndividualType {
        self.kind.individual_type()
    }

    pub fn type_name(&self) -> &'static str {
        self.individual_type().type_name()
    }

    pub fn parent_actor(&self) -> ActorId {
        self.parent_actor
    }

    /// Tag type the values are persisted under.
    pub fn tag_type(&self) -> &str {
        &self.tag_type
    }

    pub fn id_value(&self) -> &str {
        &self.id
    }

    pub fn class_value(&self) -> &str {
        &self.class
    }

    pub fn is_id_value_set(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn is_class_value_set(&self) -> bool {
        !self.class.is_empty()
    }

    /// Visual mask; `None` for non-perceivable individuals.
    pub fn visual_mask_value(&self) -> Option<&str> {
        self.kind.visual().map(VisualData::visual_mask)
    }

    pub fn calibrated_visual_mask_value(&self) -> Option<&str> {
        self.kind.visual().map(VisualData::calibrated_visual_mask)
    }

    pub fn is_visual_mask_value_set(&self) -> bool {
        self.visual_mask_value().is_some_and(|m| !m.is_empty())
    }

    pub fn is_perceivable(&self) -> bool {
        self.kind.visual().is_some()
    }

    /// Bones, virtual bones and bone constraints live inside a skeletal
    /// individual's actor.
    pub fn is_skeletal_part(&self) -> bool {
        matches!(
            self.kind,
            IndividualKind::Bone(_) | IndividualKind::VirtualBone(_) | IndividualKind::BoneConstraint(_)
        )
    }

    pub fn as_visual(&self) -> Option<&VisualData> {
        self.kind.visual()
    }

    pub fn as_skeletal(&self) -> Option<&SkeletalData> {
        match &self.kind {
            IndividualKind::Skeletal(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bone(&self) -> Option<&BoneData> {
        match &self.kind {
            IndividualKind::Bone(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bone_link(&self) -> Option<&BoneLink> {
        self.kind.bone_link()
    }

    pub fn as_bone_constraint(&self) -> Option<&BoneConstraintData> {
        match &self.kind {
            IndividualKind::BoneConstraint(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_constraint(&self) -> Option<&ConstraintData> {
        match &self.kind {
            IndividualKind::Constraint(c) => Some(c),
            _ => None,
        }
    }

    /// Bones, virtual bones and bone constraints (skeletal individuals only).
    pub fn children(&self) -> Vec<IndividualId> {
        match &self.kind {
            IndividualKind::Skeletal(s) => s.children().collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_init(&self) -> bool {
        self.is_init
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn is_movable(&self) -> bool {
        self.is_movable
    }

    pub fn cached_pose(&self) -> Transform {
        self.cached_pose
    }

    pub fn attached_to_actor(&self) -> Option<ActorId> {
        self.attached_to_actor
    }

    pub fn attached_to_individual(&self) -> Option<IndividualId> {
        self.attached_to_individual
    }

    pub fn observers(&self) -> &Observers<ComponentId> {
        &self.observers
    }

    /// One-line human readable summary.
    pub fn info(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] id={} class={} init={} loaded={}",
            self.type_name(),
            self.handle,
            if self.id.is_empty() { "-" } else { self.id.as_str() },
            if self.class.is_empty() { "-" } else { self.class.as_str() },
            self.is_init,
            self.is_loaded,
        )?;
        if let Some(mask) = self.visual_mask_value() {
            write!(f, " mask={}", if mask.is_empty() { "-" } else { mask })?;
        }
        Ok(())
    }
}
