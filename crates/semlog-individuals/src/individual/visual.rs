//! Visual mask handling of perceivable individuals.

use semlog_scene::actor::ActorKind;
use semlog_scene::scene::Scene;
use semlog_scene::tags::ValueStore;
use tracing::{trace, warn};

use super::{IndividualArena, IndividualId, IndividualKind, IndividualType, ValueKey};

impl IndividualArena {
    /// A visible individual needs a static mesh actor.
    pub(super) fn init_visible(&mut self, scene: &Scene, id: IndividualId) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        match scene.get(ind.parent_actor).map(|a| &a.kind) {
            Some(ActorKind::StaticMesh { .. }) => {}
            _ => {
                warn!(individual = %id, actor = %ind.parent_actor, "visible individual needs a static mesh actor");
                return false;
            }
        }
        self.sync_mask_material(id);
        true
    }

    /// Resolve the visual mask: import it when asked, otherwise pick a random
    /// non-reserved color.
    pub(super) fn load_visual(&mut self, scene: &mut Scene, id: IndividualId, try_import: bool) -> bool {
        if self.is_value_set(id, ValueKey::VisualMask) {
            return true;
        }
        if try_import {
            self.import_visual_values(scene, id);
        }
        if !self.is_value_set(id, ValueKey::VisualMask) {
            let color = self.colors.random_color();
            self.set_value(scene, id, ValueKey::VisualMask, color.to_hex());
        }
        self.is_value_set(id, ValueKey::VisualMask)
    }

    fn import_visual_values(&mut self, scene: &mut Scene, id: IndividualId) {
        let Some(ind) = self.get(id) else {
            return;
        };
        let (owner, tag_type) = (ind.parent_actor, ind.tag_type.clone());
        let stored = |key: ValueKey| {
            scene
                .get_value(owner, &tag_type, key.as_str())
                .filter(|v| !v.is_empty())
        };
        let (mask, calibrated) = (stored(ValueKey::VisualMask), stored(ValueKey::CalibratedVisualMask));
        if let Some(mask) = mask {
            self.set_value(scene, id, ValueKey::VisualMask, mask);
        }
        // The mask setter clears the calibrated mask, so it goes second.
        if let Some(calibrated) = calibrated {
            self.set_value(scene, id, ValueKey::CalibratedVisualMask, calibrated);
        }
    }

    pub fn set_visual_mask_value(&mut self, scene: &mut Scene, id: IndividualId, value: impl Into<String>) -> bool {
        self.set_value(scene, id, ValueKey::VisualMask, value.into())
    }

    pub fn set_calibrated_visual_mask_value(
        &mut self,
        scene: &mut Scene,
        id: IndividualId,
        value: impl Into<String>,
    ) -> bool {
        self.set_value(scene, id, ValueKey::CalibratedVisualMask, value.into())
    }

    pub fn clear_visual_mask_value(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        self.set_value(scene, id, ValueKey::VisualMask, String::new())
    }

    /// Keep the dynamic material in step with a new mask.
    pub(super) fn on_visual_mask_changed(&mut self, scene: &mut Scene, id: IndividualId) {
        self.set_value(scene, id, ValueKey::CalibratedVisualMask, String::new());
        self.sync_mask_material(id);

        let Some(visual) = self.get(id).and_then(|ind| ind.kind.visual()) else {
            return;
        };
        if !visual.mask_material_on {
            return;
        }
        if visual.visual_mask.is_empty() {
            self.apply_original_materials(scene, id);
        } else {
            let include_children = self.any_bone_mask_on(id);
            self.apply_mask_materials(scene, id, include_children);
        }
    }

    pub(super) fn sync_mask_material(&mut self, id: IndividualId) {
        if let Some(visual) = self.get_mut(id).and_then(|ind| ind.kind.visual_mut()) {
            visual.mask_material = (!visual.visual_mask.is_empty()).then(|| visual.visual_mask.clone());
        }
    }

    fn any_bone_mask_on(&self, id: IndividualId) -> bool {
        self.get(id)
            .and_then(|ind| ind.as_skeletal())
            .is_some_and(|s| {
                s.bones.iter().any(|b| {
                    self.get(*b)
                        .and_then(|bone| bone.kind.visual())
                        .is_some_and(|v| v.mask_material_on)
                })
            })
    }

    fn set_mask_material_on(&mut self, id: IndividualId, on: bool) {
        if let Some(visual) = self.get_mut(id).and_then(|ind| ind.kind.visual_mut()) {
            visual.mask_material_on = on;
        }
    }

    // -- materials ----------------------------------------------------------

    /// Render the visual mask instead of the original materials.
    ///
    /// A skeletal individual paints every slot with its own mask, and with
    /// `include_children` then paints each bone's slot with the bone's mask.
    /// Returns `false` if the mask is unset or a material slot is missing.
    pub fn apply_mask_materials(&mut self, scene: &mut Scene, id: IndividualId, include_children: bool) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let actor = ind.parent_actor;
        let Some(mask) = ind.visual_mask_value().filter(|m| !m.is_empty()).map(str::to_owned) else {
            trace!(individual = %id, "no visual mask to apply");
            return false;
        };

        let result = match &ind.kind {
            IndividualKind::Visible(_) | IndividualKind::Skeletal(_) => {
                scene.apply_mask_material_all(actor, &mask).map(|_| ())
            }
            IndividualKind::Bone(bone) => match bone.material_index {
                Some(slot) => scene.apply_mask_material(actor, slot, &mask),
                None => return false,
            },
            _ => return false,
        };
        if let Err(err) = result {
            warn!(individual = %id, error = %err, "could not apply mask material");
            return false;
        }
        self.sync_mask_material(id);
        self.set_mask_material_on(id, true);

        if include_children && self.individual_type(id) == Some(IndividualType::Skeletal) {
            let bones = self.get(id).and_then(|i| i.as_skeletal()).map(|s| s.bones.clone()).unwrap_or_default();
            for bone in bones {
                self.apply_mask_materials(scene, bone, false);
            }
        }
        true
    }

    /// Put the original materials back. Returns `false` if the mask was not
    /// applied.
    pub fn apply_original_materials(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let actor = ind.parent_actor;
        let bones = ind.as_skeletal().map(|s| s.bones.clone()).unwrap_or_default();
        let is_on = ind.kind.visual().is_some_and(|v| v.mask_material_on);
        let any_bone_on = self.any_bone_mask_on(id);
        if !is_on && !any_bone_on {
            return false;
        }

        let result = match &ind.kind {
            IndividualKind::Visible(_) | IndividualKind::Skeletal(_) => {
                scene.restore_original_materials(actor).map(|_| ())
            }
            IndividualKind::Bone(bone) => match bone.material_index {
                Some(slot) => scene.restore_original_material(actor, slot),
                None => Ok(()),
            },
            _ => Ok(()),
        };
        // A destroyed actor has nothing left to restore; the flags still reset.
        if let Err(err) = result {
            trace!(individual = %id, error = %err, "original materials not restored");
        }
        self.set_mask_material_on(id, false);
        for bone in bones {
            self.set_mask_material_on(bone, false);
        }
        true
    }

    /// Switch between mask and original materials.
    pub fn toggle_materials(&mut self, scene: &mut Scene, id: IndividualId, include_children: bool) -> bool {
        let on = self
            .get(id)
            .and_then(|ind| ind.kind.visual())
            .is_some_and(|v| v.mask_material_on)
            || self.any_bone_mask_on(id);
        if on {
            self.apply_original_materials(scene, id)
        } else {
            self.apply_mask_materials(scene, id, include_children)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::individual::VisualData;
    use semlog_scene::actor::Actor;

    fn loaded_cup() -> (Scene, IndividualArena, IndividualId) {
        let mut scene = Scene::new();
        let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body", "Handle"]));
        let mut arena = IndividualArena::new(RegistryConfig::default());
        let id = arena.create(cup, IndividualKind::Visible(VisualData::default())).unwrap();
        assert!(arena.load(&mut scene, id, false, false));
        (scene, arena, id)
    }

    fn active_materials(scene: &Scene, arena: &IndividualArena, id: IndividualId) -> Vec<String> {
        let actor = arena.get(id).unwrap().parent_actor();
        scene.get(actor).unwrap().kind.materials().iter().map(|m| m.active_material()).collect()
    }

    #[test]
    fn toggle_swaps_materials() {
        let (mut scene, mut arena, id) = loaded_cup();
        let mask = arena.get(id).unwrap().visual_mask_value().unwrap().to_owned();
        assert!(arena.toggle_materials(&mut scene, id, false));
        assert_eq!(
            active_materials(&scene, &arena, id),
            vec![format!("MaskMaterial#{mask}"), format!("MaskMaterial#{mask}")]
        );
        assert!(arena.toggle_materials(&mut scene, id, false));
        assert_eq!(active_materials(&scene, &arena, id), vec!["M_Body", "M_Handle"]);
    }

    #[test]
    fn new_mask_is_reapplied_and_clears_calibration() {
        let (mut scene, mut arena, id) = loaded_cup();
        arena.set_calibrated_visual_mask_value(&mut scene, id, "101010");
        arena.apply_mask_materials(&mut scene, id, false);
        arena.set_visual_mask_value(&mut scene, id, "3366CC");
        let ind = arena.get(id).unwrap();
        assert_eq!(ind.calibrated_visual_mask_value(), Some(""));
        assert_eq!(ind.as_visual().unwrap().mask_material(), Some("3366CC"));
        assert_eq!(active_materials(&scene, &arena, id)[0], "MaskMaterial#3366CC");
    }

    #[test]
    fn clearing_mask_restores_originals_and_unloads() {
        let (mut scene, mut arena, id) = loaded_cup();
        arena.apply_mask_materials(&mut scene, id, false);
        assert!(arena.clear_visual_mask_value(&mut scene, id));
        assert!(!arena.get(id).unwrap().is_loaded());
        assert_eq!(active_materials(&scene, &arena, id), vec!["M_Body", "M_Handle"]);
        assert!(!arena.apply_mask_materials(&mut scene, id, false));
    }

    #[test]
    fn visible_needs_static_mesh() {
        let mut scene = Scene::new();
        let joint = scene.spawn(Actor::constraint("J", None, None, Default::default(), Default::default()));
        let mut arena = IndividualArena::new(RegistryConfig::default());
        let id = arena.create(joint, IndividualKind::Visible(VisualData::default())).unwrap();
        assert!(!arena.init(&mut scene, id, false));
        assert!(!arena.get(id).unwrap().is_init());
    }
}
