//! The scene: actor storage plus the rendering and asset collaborators the
//! semantic layer talks to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::actor::{Actor, ActorKind, Transform};
use crate::handle::{ActorId, HandleAllocator};
use crate::tags::{self, ValueStore};
use crate::SceneError;

// ---------------------------------------------------------------------------
// BoneClassMap
// ---------------------------------------------------------------------------

/// Skeletal data asset: semantic class per bone index of one skeletal mesh.
///
/// Bones missing from the map (or mapped to an empty class) have no semantic
/// class of their own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneClassMap {
    pub mesh_name: String,
    pub bone_classes: BTreeMap<usize, String>,
}

impl BoneClassMap {
    pub fn new(mesh_name: impl Into<String>) -> Self {
        Self {
            mesh_name: mesh_name.into(),
            bone_classes: BTreeMap::new(),
        }
    }

    pub fn with_class(mut self, bone_index: usize, class: impl Into<String>) -> Self {
        self.bone_classes.insert(bone_index, class.into());
        self
    }

    /// Non-empty class for `bone_index`.
    pub fn class_of(&self, bone_index: usize) -> Option<&str> {
        self.bone_classes
            .get(&bone_index)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// Actor container with generational handles.
///
/// ```
/// use semlog_scene::prelude::*;
///
/// let mut scene = Scene::new();
/// let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]));
/// assert!(scene.is_alive(cup));
/// assert_eq!(scene.get(cup).map(|a| a.name.as_str()), Some("Cup"));
/// ```
#[derive(Debug, Default)]
pub struct Scene {
    pub(crate) allocator: HandleAllocator<ActorId>,
    pub(crate) actors: Vec<Option<Actor>>,
    pub(crate) skeletal_data_assets: BTreeMap<String, BoneClassMap>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    // -- actors -------------------------------------------------------------

    /// Place an actor in the scene.
    pub fn spawn(&mut self, actor: Actor) -> ActorId {
        let id = self.allocator.allocate();
        let idx = id.index() as usize;
        if idx >= self.actors.len() {
            self.actors.resize_with(idx + 1, || None);
        }
        debug!(actor = %id, name = %actor.name, kind = actor.kind.type_name(), "actor spawned");
        self.actors[idx] = Some(actor);
        id
    }

    /// Remove an actor. Actors attached to it are detached.
    pub fn destroy(&mut self, id: ActorId) -> Result<Actor, SceneError> {
        if !self.allocator.deallocate(id) {
            return Err(SceneError::StaleActor { actor: id });
        }
        let actor = self.actors[id.index() as usize]
            .take()
            .ok_or(SceneError::StaleActor { actor: id })?;
        for other in self.actors.iter_mut().flatten() {
            if other.attach_parent == Some(id) {
                other.attach_parent = None;
                other.attach_socket = None;
            }
        }
        debug!(actor = %id, name = %actor.name, "actor destroyed");
        Ok(actor)
    }

    pub fn is_alive(&self, id: ActorId) -> bool {
        self.allocator.is_alive(id)
    }

    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.actors.get(id.index() as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.actors.get_mut(id.index() as usize)?.as_mut()
    }

    fn get_result(&self, id: ActorId) -> Result<&Actor, SceneError> {
        self.get(id).ok_or(SceneError::StaleActor { actor: id })
    }

    fn get_mut_result(&mut self, id: ActorId) -> Result<&mut Actor, SceneError> {
        self.get_mut(id).ok_or(SceneError::StaleActor { actor: id })
    }

    pub fn actor_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Live actors in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ActorId, &Actor)> + '_ {
        self.actors.iter().enumerate().filter_map(|(i, slot)| {
            let actor = slot.as_ref()?;
            self.allocator.handle_at(i as u32).map(|id| (id, actor))
        })
    }

    /// Handles of all live actors in slot order.
    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ActorId> {
        self.iter().find(|(_, a)| a.name == name).map(|(id, _)| id)
    }

    /// Attach `child` to `parent`, optionally at a named socket or bone.
    pub fn attach(
        &mut self,
        child: ActorId,
        parent: ActorId,
        socket: Option<&str>,
    ) -> Result<(), SceneError> {
        if child == parent {
            return Err(SceneError::InvalidAttachment { child, parent });
        }
        self.get_result(parent)?;
        let actor = self.get_mut_result(child)?;
        actor.attach_parent = Some(parent);
        actor.attach_socket = socket.map(str::to_owned);
        Ok(())
    }

    pub fn detach(&mut self, child: ActorId) -> Result<(), SceneError> {
        let actor = self.get_mut_result(child)?;
        actor.attach_parent = None;
        actor.attach_socket = None;
        Ok(())
    }

    /// Actors directly attached to `parent`.
    pub fn attached_children(&self, parent: ActorId) -> Vec<ActorId> {
        self.iter()
            .filter(|(_, a)| a.attach_parent == Some(parent))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn set_transform(&mut self, id: ActorId, transform: Transform) -> Result<(), SceneError> {
        self.get_mut_result(id)?.transform = transform;
        Ok(())
    }

    /// Current pose of bone `bone_index` of a skeletal actor.
    pub fn bone_pose(&self, id: ActorId, bone_index: usize) -> Option<Transform> {
        match &self.get(id)?.kind {
            ActorKind::SkeletalMesh { bone_poses, .. } => bone_poses.get(bone_index).copied(),
            _ => None,
        }
    }

    pub fn set_bone_pose(
        &mut self,
        id: ActorId,
        bone_index: usize,
        pose: Transform,
    ) -> Result<(), SceneError> {
        match &mut self.get_mut_result(id)?.kind {
            ActorKind::SkeletalMesh {
                skeleton,
                bone_poses,
                ..
            } if bone_index < skeleton.num_bones() => {
                if bone_poses.len() < skeleton.num_bones() {
                    bone_poses.resize(skeleton.num_bones(), Transform::IDENTITY);
                }
                bone_poses[bone_index] = pose;
                Ok(())
            }
            _ => Err(SceneError::MissingBone {
                actor: id,
                bone_index,
            }),
        }
    }

    // -- materials ----------------------------------------------------------

    pub fn material_slot_count(&self, id: ActorId) -> usize {
        self.get(id).map_or(0, |a| a.kind.materials().len())
    }

    /// Index of the material slot called `name`.
    pub fn material_slot_index(&self, id: ActorId, name: &str) -> Option<usize> {
        self.get(id)?
            .kind
            .materials()
            .iter()
            .position(|m| m.name == name)
    }

    /// Replace the material in `slot` with a mask material of `color`.
    pub fn apply_mask_material(
        &mut self,
        id: ActorId,
        slot: usize,
        color: &str,
    ) -> Result<(), SceneError> {
        let materials = self
            .get_mut_result(id)?
            .kind
            .materials_mut()
            .ok_or(SceneError::NotAMesh { actor: id })?;
        let entry = materials
            .get_mut(slot)
            .ok_or(SceneError::MissingMaterialSlot { actor: id, slot })?;
        entry.mask_color = Some(color.to_owned());
        Ok(())
    }

    /// Put the original material back into `slot`.
    pub fn restore_original_material(&mut self, id: ActorId, slot: usize) -> Result<(), SceneError> {
        let materials = self
            .get_mut_result(id)?
            .kind
            .materials_mut()
            .ok_or(SceneError::NotAMesh { actor: id })?;
        let entry = materials
            .get_mut(slot)
            .ok_or(SceneError::MissingMaterialSlot { actor: id, slot })?;
        entry.mask_color = None;
        Ok(())
    }

    /// Apply a mask material of `color` to every slot. Returns the slot count.
    pub fn apply_mask_material_all(&mut self, id: ActorId, color: &str) -> Result<usize, SceneError> {
        let materials = self
            .get_mut_result(id)?
            .kind
            .materials_mut()
            .ok_or(SceneError::NotAMesh { actor: id })?;
        for slot in materials.iter_mut() {
            slot.mask_color = Some(color.to_owned());
        }
        Ok(materials.len())
    }

    /// Restore the original material of every slot. Returns the slot count.
    pub fn restore_original_materials(&mut self, id: ActorId) -> Result<usize, SceneError> {
        let materials = self
            .get_mut_result(id)?
            .kind
            .materials_mut()
            .ok_or(SceneError::NotAMesh { actor: id })?;
        for slot in materials.iter_mut() {
            slot.mask_color = None;
        }
        Ok(materials.len())
    }

    // -- skeletal data assets -----------------------------------------------

    /// Register (or replace) the bone class asset of a skeletal mesh.
    pub fn register_skeletal_data_asset(&mut self, asset: BoneClassMap) {
        if self.skeletal_data_assets.contains_key(&asset.mesh_name) {
            warn!(mesh = %asset.mesh_name, "replacing skeletal data asset");
        }
        self.skeletal_data_assets
            .insert(asset.mesh_name.clone(), asset);
    }

    pub fn find_skeletal_data_asset(&self, mesh_name: &str) -> Option<&BoneClassMap> {
        self.skeletal_data_assets.get(mesh_name)
    }
}

// ---------------------------------------------------------------------------
// ValueStore over actor tags
// ---------------------------------------------------------------------------

impl ValueStore for Scene {
    fn get_value(&self, owner: ActorId, tag_type: &str, key: &str) -> Option<String> {
        tags::get_value(&self.get(owner)?.tags, tag_type, key)
    }

    fn add_kv_pair(
        &mut self,
        owner: ActorId,
        tag_type: &str,
        key: &str,
        value: &str,
        overwrite: bool,
    ) -> bool {
        match self.get_mut(owner) {
            Some(actor) => tags::add_kv_pair(&mut actor.tags, tag_type, key, value, overwrite),
            None => {
                warn!(actor = %owner, tag_type, key, "cannot write tag on a stale actor");
                false
            }
        }
    }

    fn remove_tag_type(&mut self, owner: ActorId, tag_type: &str) -> bool {
        self.get_mut(owner)
            .is_some_and(|actor| tags::remove_type(&mut actor.tags, tag_type))
    }

    fn has_tag_type(&self, owner: ActorId, tag_type: &str) -> bool {
        self.get(owner)
            .is_some_and(|actor| tags::has_type(&actor.tags, tag_type))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
