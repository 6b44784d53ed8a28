//! Constraints between two bones of a skeletal individual.

use semlog_scene::actor::Transform;
use semlog_scene::scene::Scene;
use tracing::warn;

use super::{IndividualArena, IndividualId, IndividualKind, IndividualType};

impl IndividualArena {
    /// Bind a bone constraint individual to its skeleton constraint. Must run
    /// before `init`.
    pub fn pre_init_bone_constraint(&mut self, id: IndividualId, constraint_index: usize) -> bool {
        match self.get_mut(id).map(|ind| &mut ind.kind) {
            Some(IndividualKind::BoneConstraint(c)) => {
                c.constraint_index = constraint_index;
                c.is_pre_init = true;
                true
            }
            _ => false,
        }
    }

    /// Resolve the two constrained bone individuals. Both bones must exist in
    /// the owning skeletal individual.
    pub(super) fn init_bone_constraint(&mut self, scene: &Scene, id: IndividualId) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let actor = ind.parent_actor;
        let Some(c) = ind.as_bone_constraint() else {
            return false;
        };
        if !c.is_pre_init {
            warn!(individual = %id, "bone constraint initialized before pre-init");
            return false;
        }
        let (skeletal, constraint_index) = (c.skeletal, c.constraint_index);
        if self.individual_type(skeletal) != Some(IndividualType::Skeletal) {
            warn!(individual = %id, skeletal = %skeletal, "bone constraint owner is not a skeletal individual");
            return false;
        }
        let Some(skeleton) = scene.get(actor).and_then(|a| a.kind.skeleton()) else {
            return false;
        };
        let Some(desc) = skeleton.constraint(constraint_index) else {
            warn!(
                individual = %id,
                constraint_index,
                num_constraints = skeleton.num_constraints(),
                "bone constraint index out of range"
            );
            return false;
        };

        let bone = |name: &str| {
            let found = skeleton
                .find_bone(name)
                .and_then(|index| self.get_bone_individual(skeletal, index));
            if found.is_none() {
                warn!(individual = %id, bone = name, "constrained bone cannot be resolved");
            }
            found
        };
        let bones = (bone(&desc.bone1), bone(&desc.bone2));
        let pose = self.bone_constraint_pose(scene, bones);

        if let Some(ind) = self.get_mut(id) {
            ind.cached_pose = pose;
            if let IndividualKind::BoneConstraint(c) = &mut ind.kind {
                (c.individual1, c.individual2) = bones;
            }
        }
        bones.0.is_some() && bones.1.is_some()
    }

    /// Pose of the constrained bone, else of the reference bone, else identity.
    pub(super) fn bone_constraint_pose(
        &self,
        scene: &Scene,
        (bone1, bone2): (Option<IndividualId>, Option<IndividualId>),
    ) -> Transform {
        [bone1, bone2]
            .into_iter()
            .flatten()
            .find_map(|bone| {
                let ind = self.get(bone)?;
                scene.bone_pose(ind.parent_actor, ind.as_bone_link()?.bone_index)
            })
            .unwrap_or(Transform::IDENTITY)
    }

    /// `BoneLinearJoint`, `BoneRevoluteJoint` or `BoneFixedJoint` from the
    /// skeleton constraint's locks.
    pub(super) fn bone_constraint_class(&self, scene: &Scene, id: IndividualId) -> Option<String> {
        let ind = self.get(id)?;
        let c = ind.as_bone_constraint()?;
        let desc = scene
            .get(ind.parent_actor)?
            .kind
            .skeleton()?
            .constraint(c.constraint_index)?;
        Some(format!("Bone{}", Self::joint_class(&desc.linear, &desc.angular)))
    }
}
