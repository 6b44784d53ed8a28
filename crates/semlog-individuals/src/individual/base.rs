//! Lifecycle shared by every individual kind.
//!
//! `init` resolves references, `load` resolves values. Both are idempotent
//! and both can be forced to start over with their `reset` flag. Losing init
//! always loses loaded first, and an individual is loaded exactly when its
//! id, class and (for perceivable kinds) visual mask are all set.

use semlog_scene::scene::Scene;
use semlog_scene::tags::ValueStore;
use tracing::{debug, trace, warn};

use super::arena::IndividualEvent;
use super::{IndividualArena, IndividualId, IndividualKind, IndividualType, ValueKey};

impl IndividualArena {
    // -- init ---------------------------------------------------------------

    /// Resolve the references `id` needs.
    ///
    /// Returns `true` immediately if already init and `reset` is not set.
    pub fn init(&mut self, scene: &mut Scene, id: IndividualId, reset: bool) -> bool {
        if !self.contains(id) {
            warn!(individual = %id, "init on a stale individual");
            return false;
        }
        if reset {
            self.init_reset(scene, id);
        }
        if self.get(id).is_some_and(|ind| ind.is_init) {
            return true;
        }

        let ok = self.init_base(scene, id) && self.init_kind(scene, id);
        self.set_is_init(id, ok);
        if !ok {
            debug!(individual = %id, "init failed");
        }
        ok
    }

    fn init_kind(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        match self.individual_type(id) {
            Some(IndividualType::Base) => true,
            Some(IndividualType::Visible) => self.init_visible(scene, id),
            Some(IndividualType::Skeletal) => self.init_skeletal(scene, id),
            Some(IndividualType::Bone) | Some(IndividualType::VirtualBone) => self.init_bone(scene, id),
            Some(IndividualType::BoneConstraint) => self.init_bone_constraint(scene, id),
            Some(IndividualType::Constraint) => self.init_constraint(scene, id),
            None => false,
        }
    }

    /// Owning actor, attachment relation, mobility and pose.
    fn init_base(&mut self, scene: &Scene, id: IndividualId) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let actor_id = ind.parent_actor;
        let is_part = ind.is_skeletal_part();
        let Some(actor) = scene.get(actor_id) else {
            warn!(individual = %id, actor = %actor_id, "owning actor cannot be resolved");
            return false;
        };
        let is_movable = actor.is_movable();
        let pose = actor.transform;

        let Some(ind) = self.get_mut(id) else {
            return false;
        };
        ind.is_movable = is_movable;
        if !is_part {
            ind.cached_pose = pose;
        }
        self.update_attachment(scene, id);
        true
    }

    /// Look up the actor `id`'s actor is attached to and that actor's
    /// individual. Parts of a skeleton are never attached.
    ///
    /// The parent's individual may not exist yet when `id` is init, so load
    /// looks it up again.
    fn update_attachment(&mut self, scene: &Scene, id: IndividualId) {
        let Some(ind) = self.get(id) else {
            return;
        };
        let parent = if ind.is_skeletal_part() {
            None
        } else {
            scene
                .get(ind.parent_actor)
                .and_then(|a| a.attach_parent)
                .filter(|p| scene.is_alive(*p))
        };
        let parent_individual = parent.and_then(|p| self.individual_for_actor(p));
        if let Some(ind) = self.get_mut(id) {
            ind.attached_to_actor = parent;
            ind.attached_to_individual = parent_individual;
        }
    }

    /// Tear down everything `init` resolved.
    ///
    /// Values are cleared, original materials restored, skeletal children
    /// reset and destroyed, subscribers notified and dropped, and finally the
    /// individual is marked not init.
    pub fn init_reset(&mut self, scene: &mut Scene, id: IndividualId) {
        if !self.contains(id) {
            return;
        }
        self.load_reset(scene, id);
        self.apply_original_materials(scene, id);

        for child in self.children(id) {
            self.init_reset(scene, child);
            self.destroy(scene, child);
        }

        if let Some(ind) = self.get_mut(id) {
            ind.attached_to_actor = None;
            ind.attached_to_individual = None;
            match &mut ind.kind {
                IndividualKind::Skeletal(s) => {
                    s.bones.clear();
                    s.virtual_bones.clear();
                    s.bone_constraints.clear();
                    s.visual.mask_material = None;
                }
                IndividualKind::Visible(v) => v.mask_material = None,
                IndividualKind::Bone(b) => {
                    b.link.parent = None;
                    b.link.children.clear();
                    b.visual.mask_material = None;
                }
                IndividualKind::VirtualBone(l) => {
                    l.parent = None;
                    l.children.clear();
                }
                IndividualKind::BoneConstraint(c) => {
                    c.individual1 = None;
                    c.individual2 = None;
                }
                IndividualKind::Constraint(c) => {
                    c.actor1 = None;
                    c.actor2 = None;
                    c.individual1 = None;
                    c.individual2 = None;
                }
                IndividualKind::Base => {}
            }
        }

        self.clear_delegates(id);
        self.set_is_init(id, false);
        trace!(individual = %id, "init reset");
    }

    // -- load ---------------------------------------------------------------

    /// Resolve the semantic values of `id`, initializing it first if needed.
    ///
    /// With `try_import`, unset values are first read from the persisted
    /// store; anything still unset is generated.
    pub fn load(&mut self, scene: &mut Scene, id: IndividualId, reset: bool, try_import: bool) -> bool {
        if !self.contains(id) {
            warn!(individual = %id, "load on a stale individual");
            return false;
        }
        if reset {
            self.load_reset(scene, id);
        }
        if self.get(id).is_some_and(|ind| ind.is_loaded) {
            return true;
        }
        if !self.get(id).is_some_and(|ind| ind.is_init) && !self.init(scene, id, reset) {
            return false;
        }

        let was_loading = self.set_loading(id, true);
        let ok = self.load_base(scene, id, try_import) && self.load_kind(scene, id, try_import);
        self.set_loading(id, was_loading);
        self.set_is_loaded(id, ok);
        if !ok {
            debug!(individual = %id, "load failed");
        }
        ok
    }

    fn load_kind(&mut self, scene: &mut Scene, id: IndividualId, try_import: bool) -> bool {
        match self.individual_type(id) {
            Some(IndividualType::Base) | Some(IndividualType::VirtualBone) | Some(IndividualType::BoneConstraint) => {
                true
            }
            Some(IndividualType::Visible) | Some(IndividualType::Bone) => {
                self.load_visual(scene, id, try_import)
            }
            Some(IndividualType::Skeletal) => self.load_skeletal(scene, id, try_import),
            Some(IndividualType::Constraint) => self.load_constraint(scene, id),
            None => false,
        }
    }

    fn load_base(&mut self, scene: &mut Scene, id: IndividualId, try_import: bool) -> bool {
        self.update_attachment(scene, id);
        if !self.is_value_set(id, ValueKey::Id) {
            if try_import {
                self.import_value(scene, id, ValueKey::Id, false);
            }
            if !self.is_value_set(id, ValueKey::Id) {
                self.generate_new_id_value(scene, id);
            }
        }
        if !self.is_value_set(id, ValueKey::Class) {
            if try_import {
                self.import_value(scene, id, ValueKey::Class, false);
            }
            if !self.is_value_set(id, ValueKey::Class) {
                self.set_default_class_value(scene, id);
            }
        }
        self.is_value_set(id, ValueKey::Id) && self.is_value_set(id, ValueKey::Class)
    }

    /// Clear the semantic values and mark not loaded. Init state is kept.
    pub fn load_reset(&mut self, scene: &mut Scene, id: IndividualId) {
        let Some(perceivable) = self.get(id).map(|ind| ind.is_perceivable()) else {
            return;
        };
        let was_loading = self.set_loading(id, true);
        self.set_value(scene, id, ValueKey::Id, String::new());
        self.set_value(scene, id, ValueKey::Class, String::new());
        if perceivable {
            self.set_value(scene, id, ValueKey::VisualMask, String::new());
            self.set_value(scene, id, ValueKey::CalibratedVisualMask, String::new());
        }
        self.set_loading(id, was_loading);
        self.set_is_loaded(id, false);

        for child in self.children(id) {
            self.load_reset(scene, child);
        }
    }

    // -- state flags --------------------------------------------------------

    /// Set the init flag, notifying subscribers on change. Clearing it clears
    /// the loaded flag first.
    pub(crate) fn set_is_init(&mut self, id: IndividualId, value: bool) {
        if !value {
            self.set_is_loaded(id, false);
        }
        let changed = match self.get_mut(id) {
            Some(ind) if ind.is_init != value => {
                ind.is_init = value;
                true
            }
            _ => false,
        };
        if changed {
            self.emit(id, IndividualEvent::InitChanged(value));
        }
    }

    pub(crate) fn set_is_loaded(&mut self, id: IndividualId, value: bool) {
        let changed = match self.get_mut(id) {
            Some(ind) if ind.is_loaded != value => {
                ind.is_loaded = value;
                true
            }
            _ => false,
        };
        if changed {
            self.emit(id, IndividualEvent::LoadedChanged(value));
        }
    }

    /// Returns the previous value.
    fn set_loading(&mut self, id: IndividualId, value: bool) -> bool {
        match self.get_mut(id) {
            Some(ind) => std::mem::replace(&mut ind.loading, value),
            None => false,
        }
    }

    // -- values -------------------------------------------------------------

    pub(crate) fn value(&self, id: IndividualId, key: ValueKey) -> Option<&str> {
        let ind = self.get(id)?;
        match key {
            ValueKey::Id => Some(ind.id.as_str()),
            ValueKey::Class => Some(ind.class.as_str()),
            ValueKey::VisualMask => ind.visual_mask_value(),
            ValueKey::CalibratedVisualMask => ind.calibrated_visual_mask_value(),
        }
    }

    pub(crate) fn is_value_set(&self, id: IndividualId, key: ValueKey) -> bool {
        self.value(id, key).is_some_and(|v| !v.is_empty())
    }

    /// Assign a value.
    ///
    /// On change, subscribers get [`IndividualEvent::NewValue`]. An empty id,
    /// class or mask demotes a loaded individual; a non-empty one retries
    /// `load(false, false)` on an individual that is not loaded, unless a
    /// load of it is already running. Returns `true` if the value changed.
    pub(crate) fn set_value(&mut self, scene: &mut Scene, id: IndividualId, key: ValueKey, value: String) -> bool {
        let Some(ind) = self.get_mut(id) else {
            return false;
        };
        let (is_loaded, loading) = (ind.is_loaded, ind.loading);
        let slot = match key {
            ValueKey::Id => &mut ind.id,
            ValueKey::Class => &mut ind.class,
            ValueKey::VisualMask => match ind.kind.visual_mut() {
                Some(v) => &mut v.visual_mask,
                None => return false,
            },
            ValueKey::CalibratedVisualMask => match ind.kind.visual_mut() {
                Some(v) => &mut v.calibrated_visual_mask,
                None => return false,
            },
        };
        if *slot == value {
            return false;
        }
        slot.clone_from(&value);
        let is_empty = value.is_empty();
        trace!(individual = %id, key = %key, value = %value, "value changed");
        self.emit(id, IndividualEvent::NewValue { key, value });

        if key == ValueKey::VisualMask {
            self.on_visual_mask_changed(scene, id);
        }
        if key != ValueKey::CalibratedVisualMask {
            if is_empty && is_loaded {
                self.set_is_loaded(id, false);
            } else if !is_empty && !is_loaded && !loading {
                self.load(scene, id, false, false);
            }
        }
        true
    }

    pub fn set_id_value(&mut self, scene: &mut Scene, id: IndividualId, value: impl Into<String>) -> bool {
        self.set_value(scene, id, ValueKey::Id, value.into())
    }

    pub fn set_class_value(&mut self, scene: &mut Scene, id: IndividualId, value: impl Into<String>) -> bool {
        self.set_value(scene, id, ValueKey::Class, value.into())
    }

    pub fn clear_id_value(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        self.set_value(scene, id, ValueKey::Id, String::new())
    }

    pub fn clear_class_value(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        self.set_value(scene, id, ValueKey::Class, String::new())
    }

    /// Assign a fresh unique id.
    pub fn generate_new_id_value(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        let new_id = self.ids.new_id();
        self.set_value(scene, id, ValueKey::Id, new_id)
    }

    /// Class an individual gets when none was assigned or imported.
    ///
    /// Static meshes use their mesh name without the `SM_` prefix, skeletal
    /// meshes without `SK_`; bones use their bone class asset entry;
    /// constraints and bone constraints are named after their free axes;
    /// anything else falls back to the type name.
    pub fn calc_default_class_value(&self, scene: &Scene, id: IndividualId) -> String {
        let Some(ind) = self.get(id) else {
            return String::new();
        };
        let type_name = ind.type_name();
        let mesh_name = || scene.get(ind.parent_actor).and_then(|a| a.kind.mesh_name());
        let class = match ind.individual_type() {
            IndividualType::Visible => mesh_name().map(|m| m.strip_prefix("SM_").unwrap_or(m).to_owned()),
            IndividualType::Skeletal => mesh_name().map(|m| m.strip_prefix("SK_").unwrap_or(m).to_owned()),
            IndividualType::Bone | IndividualType::VirtualBone => self.bone_class(id),
            IndividualType::BoneConstraint => self.bone_constraint_class(scene, id),
            IndividualType::Constraint => Self::constraint_class(scene, ind.parent_actor),
            IndividualType::Base => None,
        };
        class
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| type_name.to_owned())
    }

    pub fn set_default_class_value(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        let class = self.calc_default_class_value(scene, id);
        self.set_value(scene, id, ValueKey::Class, class)
    }

    /// Re-send the set values to subscribers.
    pub fn trigger_values_broadcast(&mut self, id: IndividualId) {
        for key in [
            ValueKey::Id,
            ValueKey::Class,
            ValueKey::VisualMask,
            ValueKey::CalibratedVisualMask,
        ] {
            if let Some(value) = self.value(id, key).filter(|v| !v.is_empty()).map(str::to_owned) {
                self.emit(id, IndividualEvent::NewValue { key, value });
            }
        }
    }

    // -- persisted values ---------------------------------------------------

    fn persisted_keys(&self, id: IndividualId) -> &'static [ValueKey] {
        if self.get(id).is_some_and(|ind| ind.is_perceivable()) {
            &[
                ValueKey::Id,
                ValueKey::Class,
                ValueKey::VisualMask,
                ValueKey::CalibratedVisualMask,
            ]
        } else {
            &[ValueKey::Id, ValueKey::Class]
        }
    }

    /// Read one value from the store. Only replaces a set value when
    /// `overwrite` is given. Returns `true` if the value changed.
    fn import_value(&mut self, scene: &mut Scene, id: IndividualId, key: ValueKey, overwrite: bool) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        if self.is_value_set(id, key) && !overwrite {
            return false;
        }
        let stored = scene.get_value(ind.parent_actor, &ind.tag_type, key.as_str());
        match stored {
            Some(stored) if !stored.is_empty() => self.set_value(scene, id, key, stored),
            _ => false,
        }
    }

    /// Write the set values to the persisted store, children included.
    /// Returns `true` if the store changed.
    pub fn export_values(&mut self, scene: &mut Scene, id: IndividualId, overwrite: bool) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let (owner, tag_type) = (ind.parent_actor, ind.tag_type.clone());
        let mut changed = false;
        for &key in self.persisted_keys(id) {
            if let Some(value) = self.value(id, key).filter(|v| !v.is_empty()) {
                changed |= scene.add_kv_pair(owner, &tag_type, key.as_str(), value, overwrite);
            }
        }
        for child in self.children(id) {
            changed |= self.export_values(scene, child, overwrite);
        }
        changed
    }

    /// Read values from the persisted store, children included.
    ///
    /// Load retries are held back until every value has been read; the
    /// individual is then loaded if the imported values allow it. Returns
    /// `true` if any value changed.
    pub fn import_values(&mut self, scene: &mut Scene, id: IndividualId, overwrite: bool) -> bool {
        if !self.contains(id) {
            return false;
        }
        let was_loading = self.set_loading(id, true);
        let mut changed = false;
        for &key in self.persisted_keys(id) {
            changed |= self.import_value(scene, id, key, overwrite);
        }
        for child in self.children(id) {
            changed |= self.import_values(scene, child, overwrite);
        }
        self.set_loading(id, was_loading);

        let ready = self.get(id).is_some_and(|ind| !ind.is_loaded)
            && self.persisted_keys(id)
                .iter()
                .filter(|k| **k != ValueKey::CalibratedVisualMask)
                .all(|k| self.is_value_set(id, *k));
        if changed && ready && !was_loading {
            self.load(scene, id, false, false);
        }
        changed
    }

    /// Remove this individual's tag type (and its children's) from the store.
    pub fn clear_exported_values(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let mut changed = scene.remove_tag_type(ind.parent_actor, &ind.tag_type);
        for child in self.children(id) {
            changed |= self.clear_exported_values(scene, child);
        }
        changed
    }

    // -- pose ---------------------------------------------------------------

    /// Refresh the cached pose if it moved by more than `tolerance`.
    /// Returns `true` if the cache changed.
    pub fn update_cached_pose(&mut self, scene: &Scene, id: IndividualId, tolerance: f64) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let current = if let Some(link) = ind.as_bone_link() {
            scene.bone_pose(ind.parent_actor, link.bone_index)
        } else if let Some(c) = ind.as_bone_constraint() {
            Some(self.bone_constraint_pose(scene, (c.individual1, c.individual2)))
        } else {
            scene.get(ind.parent_actor).map(|a| a.transform)
        };
        let Some(current) = current else {
            return false;
        };
        if ind.cached_pose.equals(&current, tolerance) {
            return false;
        }
        if let Some(ind) = self.get_mut(id) {
            ind.cached_pose = current;
        }
        true
    }
}
