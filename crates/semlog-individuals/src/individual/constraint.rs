//! Physics constraint individuals.

use semlog_scene::actor::{ActorKind, AxisLocks};
use semlog_scene::handle::ActorId;
use semlog_scene::scene::Scene;
use tracing::warn;

use super::{IndividualArena, IndividualId, IndividualKind};

impl IndividualArena {
    /// Read the constrained actors and lock flags. Both actors must be alive;
    /// their individuals are resolved when they exist.
    pub(super) fn init_constraint(&mut self, scene: &Scene, id: IndividualId) -> bool {
        let Some(actor) = self.get(id).map(|ind| ind.parent_actor) else {
            return false;
        };
        let Some(ActorKind::PhysicsConstraint {
            actor1,
            actor2,
            linear,
            angular,
        }) = scene.get(actor).map(|a| &a.kind)
        else {
            warn!(individual = %id, actor = %actor, "constraint individual needs a physics constraint actor");
            return false;
        };
        let alive = |a: &Option<ActorId>| a.filter(|a| scene.is_alive(*a));
        let (Some(actor1), Some(actor2)) = (alive(actor1), alive(actor2)) else {
            warn!(individual = %id, ?actor1, ?actor2, "constrained actors cannot be resolved");
            return false;
        };
        let (linear, angular) = (*linear, *angular);
        let (individual1, individual2) = (self.individual_for_actor(actor1), self.individual_for_actor(actor2));

        if let Some(IndividualKind::Constraint(c)) = self.get_mut(id).map(|ind| &mut ind.kind) {
            c.actor1 = Some(actor1);
            c.actor2 = Some(actor2);
            c.individual1 = individual1;
            c.individual2 = individual2;
            c.linear = linear;
            c.angular = angular;
        }
        true
    }

    /// Constrained individuals may have been created after this one was
    /// initialized, so they are looked up again.
    pub(super) fn load_constraint(&mut self, _scene: &Scene, id: IndividualId) -> bool {
        let Some(c) = self.get(id).and_then(|ind| ind.as_constraint()) else {
            return false;
        };
        let individual1 = c.actor1.and_then(|a| self.individual_for_actor(a));
        let individual2 = c.actor2.and_then(|a| self.individual_for_actor(a));
        if let Some(IndividualKind::Constraint(c)) = self.get_mut(id).map(|ind| &mut ind.kind) {
            c.individual1 = individual1;
            c.individual2 = individual2;
        }
        true
    }

    /// `LinearJoint` if any linear axis moves, `RevoluteJoint` if only angular
    /// axes move, `FixedJoint` otherwise.
    pub(super) fn constraint_class(scene: &Scene, actor: ActorId) -> Option<String> {
        match &scene.get(actor)?.kind {
            ActorKind::PhysicsConstraint { linear, angular, .. } => {
                Some(Self::joint_class(linear, angular).to_owned())
            }
            _ => None,
        }
    }

    pub(super) fn joint_class(linear: &AxisLocks, angular: &AxisLocks) -> &'static str {
        if !linear.all_locked() {
            "LinearJoint"
        } else if !angular.all_locked() {
            "RevoluteJoint"
        } else {
            "FixedJoint"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::individual::{ConstraintData, ValueKey, VisualData};
    use semlog_scene::actor::{Actor, AxisLocks};

    fn setup(linear: AxisLocks, angular: AxisLocks) -> (Scene, IndividualArena, ActorId, ActorId, ActorId) {
        let mut scene = Scene::new();
        let door = scene.spawn(Actor::static_mesh("Door", "SM_Door", &["Body"]));
        let frame = scene.spawn(Actor::static_mesh("Frame", "SM_Frame", &["Body"]));
        let hinge = scene.spawn(Actor::constraint("Hinge", Some(door), Some(frame), linear, angular));
        (scene, IndividualArena::new(RegistryConfig::default()), door, frame, hinge)
    }

    #[test]
    fn joint_class_follows_locks() {
        let (mut scene, mut arena, _, _, hinge) = setup(AxisLocks::ALL, AxisLocks { x: true, y: true, z: false });
        let id = arena.create(hinge, IndividualKind::Constraint(ConstraintData::default())).unwrap();
        assert!(arena.load(&mut scene, id, false, false));
        assert_eq!(arena.value(id, ValueKey::Class), Some("RevoluteJoint"));

        let (scene, _, _, _, hinge) = setup(AxisLocks::NONE, AxisLocks::ALL);
        assert_eq!(IndividualArena::constraint_class(&scene, hinge).as_deref(), Some("LinearJoint"));
        let (scene, _, _, _, hinge) = setup(AxisLocks::ALL, AxisLocks::ALL);
        assert_eq!(IndividualArena::constraint_class(&scene, hinge).as_deref(), Some("FixedJoint"));
    }

    #[test]
    fn constrained_individuals_resolve_on_load() {
        let (mut scene, mut arena, door, frame, hinge) = setup(AxisLocks::ALL, AxisLocks::ALL);
        let id = arena.create(hinge, IndividualKind::Constraint(ConstraintData::default())).unwrap();
        assert!(arena.init(&mut scene, id, false));
        assert_eq!(arena.get(id).unwrap().as_constraint().unwrap().individuals(), (None, None));

        let door_ind = arena.create(door, IndividualKind::Visible(VisualData::default())).unwrap();
        assert!(arena.load(&mut scene, id, false, false));
        let c = arena.get(id).unwrap().as_constraint().unwrap();
        assert_eq!(c.actors(), (Some(door), Some(frame)));
        assert_eq!(c.individuals(), (Some(door_ind), None));
    }

    #[test]
    fn missing_constrained_actor_fails_init() {
        let (mut scene, mut arena, door, _, hinge) = setup(AxisLocks::ALL, AxisLocks::ALL);
        scene.destroy(door).unwrap();
        let id = arena.create(hinge, IndividualKind::Constraint(ConstraintData::default())).unwrap();
        assert!(!arena.init(&mut scene, id, false));
    }
}
