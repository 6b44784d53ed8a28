//! Skeletal individuals and their bone decomposition.

use semlog_scene::actor::ActorKind;
use semlog_scene::scene::{BoneClassMap, Scene};
use tracing::{debug, warn};

use super::{BoneConstraintData, BoneData, BoneLink, IndividualArena, IndividualId, IndividualKind, VisualData};

impl IndividualArena {
    /// Hand the bone class asset to a skeletal individual. Takes effect the
    /// next time its children are created.
    pub fn set_bone_classes(&mut self, id: IndividualId, asset: Option<BoneClassMap>) -> bool {
        match self.get_mut(id).map(|ind| &mut ind.kind) {
            Some(IndividualKind::Skeletal(s)) => {
                s.bone_classes = asset;
                true
            }
            _ => false,
        }
    }

    pub(super) fn init_skeletal(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        if !matches!(
            scene.get(ind.parent_actor).map(|a| &a.kind),
            Some(ActorKind::SkeletalMesh { .. })
        ) {
            warn!(individual = %id, actor = %ind.parent_actor, "skeletal individual needs a skeletal mesh actor");
            return false;
        }
        let has_children = ind.as_skeletal().is_some_and(|s| s.has_children());
        if !has_children && !self.create_children_individuals(scene, id) {
            return false;
        }

        let mut all_init = true;
        for child in self.children(id) {
            all_init &= self.init(scene, child, false);
        }
        all_init
    }

    /// Create one bone or virtual bone individual per skeleton bone, then one
    /// bone constraint individual per skeleton constraint.
    ///
    /// A bone becomes a [`BoneData`] individual bound to a material slot when
    /// its bone class names a slot of the mesh, otherwise a virtual bone.
    pub fn create_children_individuals(&mut self, scene: &Scene, id: IndividualId) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let actor_id = ind.parent_actor;
        let bone_classes = ind.as_skeletal().and_then(|s| s.bone_classes.clone());
        let Some(skeleton) = scene.get(actor_id).and_then(|a| a.kind.skeleton()) else {
            return false;
        };
        if skeleton.num_bones() == 0 {
            warn!(individual = %id, actor = %actor_id, "skeletal mesh has no bones");
            return false;
        }

        let mut bones = Vec::new();
        let mut virtual_bones = Vec::new();
        for bone_index in 0..skeleton.num_bones() {
            let class = bone_classes.as_ref().and_then(|m| m.class_of(bone_index));
            let slot = class.and_then(|c| scene.material_slot_index(actor_id, c));
            if let (Some(class), None) = (class, slot) {
                warn!(individual = %id, bone_index, class, "bone class has no material slot, using a virtual bone");
            }
            let tag_type = self.config.bone_tag_type(bone_index);
            let link = BoneLink::new(id);
            let child = match slot {
                Some(_) => self.insert(
                    actor_id,
                    IndividualKind::Bone(BoneData {
                        link,
                        visual: VisualData::default(),
                        material_index: None,
                    }),
                    tag_type,
                ),
                None => self.insert(actor_id, IndividualKind::VirtualBone(link), tag_type),
            };
            self.pre_init(child, bone_index, slot);
            match slot {
                Some(_) => bones.push(child),
                None => virtual_bones.push(child),
            }
        }

        let mut bone_constraints = Vec::new();
        for constraint_index in 0..skeleton.num_constraints() {
            let tag_type = self.config.bone_constraint_tag_type(constraint_index);
            let child = self.insert(
                actor_id,
                IndividualKind::BoneConstraint(BoneConstraintData::new(id)),
                tag_type,
            );
            self.pre_init_bone_constraint(child, constraint_index);
            bone_constraints.push(child);
        }

        debug!(
            individual = %id,
            bones = bones.len(),
            virtual_bones = virtual_bones.len(),
            bone_constraints = bone_constraints.len(),
            "bone individuals created"
        );
        if let Some(IndividualKind::Skeletal(s)) = self.get_mut(id).map(|ind| &mut ind.kind) {
            s.bones = bones;
            s.virtual_bones = virtual_bones;
            s.bone_constraints = bone_constraints;
        }
        true
    }

    pub(super) fn load_skeletal(&mut self, scene: &mut Scene, id: IndividualId, try_import: bool) -> bool {
        let mask_set = self.load_visual(scene, id, try_import);
        // Bones load on their own; a bone without values does not block the skeleton.
        for child in self.children(id) {
            self.load(scene, child, false, true);
        }
        mask_set
    }

    /// Bone or virtual bone individual for `bone_index`.
    pub fn get_bone_individual(&self, skeletal: IndividualId, bone_index: usize) -> Option<IndividualId> {
        self.children(skeletal).into_iter().find(|child| {
            self.get(*child)
                .and_then(|ind| ind.as_bone_link())
                .is_some_and(|link| link.bone_index == bone_index)
        })
    }

    /// Name of the bone `child` represents, if it is a bone of `skeletal`.
    /// Other actors can be attached at that location.
    pub fn is_child_attachable(&self, scene: &Scene, skeletal: IndividualId, child: IndividualId) -> Option<String> {
        let link = self.get(child)?.as_bone_link()?;
        if link.skeletal != skeletal {
            return None;
        }
        let actor = self.get(skeletal)?.parent_actor;
        scene
            .get(actor)?
            .kind
            .skeleton()?
            .bone_name(link.bone_index)
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::individual::{IndividualType, SkeletalData};
    use semlog_scene::actor::{Actor, AxisLocks, Skeleton};

    fn hand(scene: &mut Scene) -> semlog_scene::handle::ActorId {
        let skeleton = Skeleton::from_bones([("root", None), ("palm", Some(0)), ("thumb", Some(1))]);
        scene.spawn(Actor::skeletal_mesh("Hand", "SK_Hand", skeleton, &["Palm", "Skin"]))
    }

    #[test]
    fn bones_with_slot_classes_get_materials() {
        let mut scene = Scene::new();
        let actor = hand(&mut scene);
        let mut arena = IndividualArena::new(RegistryConfig::default());
        let id = arena.create(actor, IndividualKind::Skeletal(SkeletalData::default())).unwrap();
        let asset = BoneClassMap::new("SK_Hand").with_class(1, "Palm").with_class(2, "Thumb");
        arena.set_bone_classes(id, Some(asset));
        assert!(arena.init(&mut scene, id, false));

        let skeletal = arena.get(id).unwrap().as_skeletal().unwrap();
        assert_eq!(skeletal.bones().len(), 1);
        assert_eq!(skeletal.virtual_bones().len(), 2);

        let palm = arena.get_bone_individual(id, 1).unwrap();
        assert_eq!(arena.get(palm).unwrap().individual_type(), IndividualType::Bone);
        assert_eq!(arena.get(palm).unwrap().as_bone().unwrap().material_index(), Some(0));
        assert_eq!(arena.get(palm).unwrap().tag_type(), "SemLogBone1");
        let thumb = arena.get_bone_individual(id, 2).unwrap();
        assert_eq!(arena.get(thumb).unwrap().individual_type(), IndividualType::VirtualBone);
        assert_eq!(arena.is_child_attachable(&scene, id, thumb).as_deref(), Some("thumb"));
    }

    #[test]
    fn skeleton_without_bones_fails_init() {
        let mut scene = Scene::new();
        let actor = scene.spawn(Actor::skeletal_mesh("Empty", "SK_Empty", Skeleton::default(), &[]));
        let mut arena = IndividualArena::new(RegistryConfig::default());
        let id = arena.create(actor, IndividualKind::Skeletal(SkeletalData::default())).unwrap();
        assert!(!arena.init(&mut scene, id, false));
    }

    #[test]
    fn init_reset_destroys_bones() {
        let mut scene = Scene::new();
        let actor = hand(&mut scene);
        let mut arena = IndividualArena::new(RegistryConfig::default());
        let id = arena.create(actor, IndividualKind::Skeletal(SkeletalData::default())).unwrap();
        assert!(arena.init(&mut scene, id, false));
        let old_children = arena.children(id);
        assert_eq!(arena.len(), 4);

        assert!(arena.init(&mut scene, id, true));
        assert_eq!(arena.len(), 4);
        assert!(old_children.iter().all(|c| !arena.contains(*c)));
    }

    #[test]
    fn skeleton_constraints_become_children() {
        let mut scene = Scene::new();
        let skeleton = Skeleton::from_bones([("root", None), ("palm", Some(0)), ("thumb", Some(1))])
            .with_constraint("knuckle", "thumb", "palm", AxisLocks::ALL, AxisLocks::ALL);
        let actor = scene.spawn(Actor::skeletal_mesh("Hand", "SK_Hand", skeleton, &["Palm"]));
        let mut arena = IndividualArena::new(RegistryConfig::default());
        let id = arena.create(actor, IndividualKind::Skeletal(SkeletalData::default())).unwrap();
        assert!(arena.init(&mut scene, id, false));
        assert_eq!(arena.len(), 5);

        let knuckle = arena.get(id).unwrap().as_skeletal().unwrap().bone_constraints()[0];
        assert_eq!(arena.children(id).last(), Some(&knuckle));
        assert!(arena.get(knuckle).unwrap().is_init());
        assert!(arena.get_bone_individual(id, 0).is_some());
        assert_eq!(arena.is_child_attachable(&scene, id, knuckle), None);

        assert!(arena.init(&mut scene, id, true));
        assert!(!arena.contains(knuckle));
        assert_eq!(arena.len(), 5);

        assert!(arena.destroy(&mut scene, id));
        assert_eq!(arena.len(), 0);
    }
}
