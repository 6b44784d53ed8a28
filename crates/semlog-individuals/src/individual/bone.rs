//! Bone and virtual bone individuals.

use semlog_scene::scene::Scene;
use tracing::warn;

use super::{IndividualArena, IndividualId, IndividualKind, IndividualType};

impl IndividualArena {
    /// Bind a bone individual to its skeleton bone and, for a renderable
    /// bone, to a material slot. Must run before `init`.
    pub fn pre_init(&mut self, id: IndividualId, bone_index: usize, material_index: Option<usize>) -> bool {
        let Some(ind) = self.get_mut(id) else {
            return false;
        };
        match &mut ind.kind {
            IndividualKind::Bone(bone) => {
                let Some(slot) = material_index else {
                    warn!(individual = %id, bone_index, "bone needs a material slot");
                    return false;
                };
                bone.material_index = Some(slot);
                bone.link.bone_index = bone_index;
                bone.link.is_pre_init = true;
                true
            }
            IndividualKind::VirtualBone(link) => {
                link.bone_index = bone_index;
                link.is_pre_init = true;
                true
            }
            _ => false,
        }
    }

    pub(super) fn init_bone(&mut self, scene: &Scene, id: IndividualId) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let actor = ind.parent_actor;
        let material_index = ind.as_bone().and_then(|b| b.material_index);
        let is_bone = ind.individual_type() == IndividualType::Bone;
        let Some(link) = ind.as_bone_link() else {
            return false;
        };
        if !link.is_pre_init {
            warn!(individual = %id, "bone initialized before pre-init");
            return false;
        }
        let (skeletal, bone_index) = (link.skeletal, link.bone_index);
        if self.individual_type(skeletal) != Some(IndividualType::Skeletal) {
            warn!(individual = %id, skeletal = %skeletal, "bone owner is not a skeletal individual");
            return false;
        }
        let Some(skeleton) = scene.get(actor).and_then(|a| a.kind.skeleton()) else {
            return false;
        };
        if bone_index >= skeleton.num_bones() {
            warn!(individual = %id, bone_index, num_bones = skeleton.num_bones(), "bone index out of range");
            return false;
        }
        if is_bone && !material_index.is_some_and(|slot| slot < scene.material_slot_count(actor)) {
            warn!(individual = %id, bone_index, ?material_index, "bone material slot out of range");
            return false;
        }

        let parent = skeleton
            .parent_index(bone_index)
            .and_then(|p| self.get_bone_individual(skeletal, p));
        let children: Vec<IndividualId> = skeleton
            .child_indices(bone_index)
            .into_iter()
            .filter_map(|c| self.get_bone_individual(skeletal, c))
            .collect();
        let pose = scene.bone_pose(actor, bone_index);

        if let Some(ind) = self.get_mut(id) {
            if let Some(pose) = pose {
                ind.cached_pose = pose;
            }
            if let Some(link) = ind.kind.bone_link_mut() {
                link.parent = parent;
                link.children = children;
            }
        }
        if is_bone {
            self.sync_mask_material(id);
        }
        true
    }

    /// Class of a bone from its skeleton's bone class asset.
    pub(super) fn bone_class(&self, id: IndividualId) -> Option<String> {
        let link = self.get(id)?.as_bone_link()?;
        self.get(link.skeletal)?
            .as_skeletal()?
            .bone_classes
            .as_ref()?
            .class_of(link.bone_index)
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::individual::{BoneLink, SkeletalData, ValueKey};
    use semlog_scene::actor::{Actor, Skeleton};
    use semlog_scene::scene::BoneClassMap;

    #[test]
    fn bone_without_pre_init_fails() {
        let mut scene = Scene::new();
        let actor = scene.spawn(Actor::skeletal_mesh("Arm", "SK_Arm", Skeleton::chain(2), &[]));
        let mut arena = IndividualArena::new(RegistryConfig::default());
        let skeletal = arena.create(actor, IndividualKind::Skeletal(SkeletalData::default())).unwrap();
        let bone = arena.insert(actor, IndividualKind::VirtualBone(BoneLink::new(skeletal)), "SemLogBone0".into());
        assert!(!arena.init(&mut scene, bone, false));
        assert!(arena.pre_init(bone, 0, None));
        assert!(arena.init(&mut scene, bone, false));
    }

    #[test]
    fn bone_links_mirror_skeleton() {
        let mut scene = Scene::new();
        let actor = scene.spawn(Actor::skeletal_mesh("Arm", "SK_Arm", Skeleton::chain(3), &[]));
        let mut arena = IndividualArena::new(RegistryConfig::default());
        let skeletal = arena.create(actor, IndividualKind::Skeletal(SkeletalData::default())).unwrap();
        assert!(arena.init(&mut scene, skeletal, false));

        let b0 = arena.get_bone_individual(skeletal, 0).unwrap();
        let b1 = arena.get_bone_individual(skeletal, 1).unwrap();
        let b2 = arena.get_bone_individual(skeletal, 2).unwrap();
        let link1 = arena.get(b1).unwrap().as_bone_link().unwrap();
        assert_eq!(link1.parent(), Some(b0));
        assert_eq!(link1.children(), &[b2]);
        assert_eq!(arena.get(b0).unwrap().as_bone_link().unwrap().parent(), None);
    }

    #[test]
    fn bone_class_comes_from_asset() {
        let mut scene = Scene::new();
        let actor = scene.spawn(Actor::skeletal_mesh("Arm", "SK_Arm", Skeleton::chain(2), &["Upper"]));
        let mut arena = IndividualArena::new(RegistryConfig::default());
        let skeletal = arena.create(actor, IndividualKind::Skeletal(SkeletalData::default())).unwrap();
        arena.set_bone_classes(skeletal, Some(BoneClassMap::new("SK_Arm").with_class(0, "Upper")));
        assert!(arena.load(&mut scene, skeletal, false, false));

        let upper = arena.get_bone_individual(skeletal, 0).unwrap();
        let lower = arena.get_bone_individual(skeletal, 1).unwrap();
        assert_eq!(arena.value(upper, ValueKey::Class), Some("Upper"));
        assert_eq!(arena.value(lower, ValueKey::Class), Some("VirtualBoneIndividual"));
        assert!(arena.get(upper).unwrap().is_visual_mask_value_set());
    }
}
