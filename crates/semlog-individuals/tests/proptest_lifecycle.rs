//! Property-based tests for individual lifecycles using proptest.
//!
//! Random sequences of component and manager operations are applied to a
//! small scene; after every step the registry invariants must hold.

use proptest::prelude::*;
use semlog_individuals::prelude::*;

/// Operation applied to one of the scene's actors (by index).
#[derive(Debug, Clone)]
enum LifeOp {
    Init { actor: usize, reset: bool },
    Load { actor: usize, reset: bool, try_import: bool },
    InitReset { actor: usize },
    WriteIds { overwrite: bool },
    ClearIds,
    WriteClasses { overwrite: bool },
    ClearClasses,
    UniqueMasks { overwrite: bool },
    ClearMasks,
    Export { overwrite: bool },
    Import { overwrite: bool },
    ClearExported,
    Toggle { include_children: bool },
    ManagerInit { reset: bool },
    Destroy { actor: usize },
    Sync,
}

const NUM_ACTORS: usize = 4;

/// Operations on single components and on the manager.
fn component_op_strategy() -> impl Strategy<Value = LifeOp> {
    let actor = 0..NUM_ACTORS;
    prop_oneof![
        (actor.clone(), any::<bool>()).prop_map(|(actor, reset)| LifeOp::Init { actor, reset }),
        (actor.clone(), any::<bool>(), any::<bool>())
            .prop_map(|(actor, reset, try_import)| LifeOp::Load { actor, reset, try_import }),
        actor.clone().prop_map(|actor| LifeOp::InitReset { actor }),
        actor.prop_map(|actor| LifeOp::Destroy { actor }),
        any::<bool>().prop_map(|reset| LifeOp::ManagerInit { reset }),
        Just(LifeOp::Sync),
    ]
}

/// Bulk value operations over the whole world.
fn bulk_op_strategy() -> impl Strategy<Value = LifeOp> {
    prop_oneof![
        any::<bool>().prop_map(|overwrite| LifeOp::WriteIds { overwrite }),
        Just(LifeOp::ClearIds),
        any::<bool>().prop_map(|overwrite| LifeOp::WriteClasses { overwrite }),
        Just(LifeOp::ClearClasses),
        any::<bool>().prop_map(|overwrite| LifeOp::UniqueMasks { overwrite }),
        Just(LifeOp::ClearMasks),
        any::<bool>().prop_map(|overwrite| LifeOp::Export { overwrite }),
        any::<bool>().prop_map(|overwrite| LifeOp::Import { overwrite }),
        Just(LifeOp::ClearExported),
        any::<bool>().prop_map(|include_children| LifeOp::Toggle { include_children }),
    ]
}

fn life_op_strategy() -> impl Strategy<Value = LifeOp> {
    prop_oneof![component_op_strategy(), bulk_op_strategy()]
}

fn setup() -> (SemanticWorld, Vec<ActorId>) {
    let mut scene = Scene::new();
    let table = scene.spawn(Actor::static_mesh("Table", "SM_Table", &["Top"]));
    let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]).with_mobility(Mobility::Movable));
    let hand = scene.spawn(Actor::skeletal_mesh(
        "Hand",
        "SK_Hand",
        Skeleton::from_bones([("root", None), ("palm", Some(0)), ("thumb", Some(1)), ("index", Some(1))]),
        &["Palm", "Thumb"],
    ));
    let hinge = scene.spawn(Actor::constraint("Hinge", Some(table), Some(cup), AxisLocks::NONE, AxisLocks::ALL));
    scene.register_skeletal_data_asset(
        BoneClassMap::new("SK_Hand")
            .with_class(1, "Palm")
            .with_class(2, "Thumb"),
    );
    let mut world = SemanticWorld::new(scene, RegistryConfig::with_seed(3));
    utils::create_individual_components(&mut world, Selection::World);
    (world, vec![table, cup, hand, hinge])
}

fn apply(world: &mut SemanticWorld, manager: &mut IndividualManager, actors: &[ActorId], op: &LifeOp) {
    let component = |world: &SemanticWorld, actor: usize| world.component_for_actor(actors[actor]);
    match *op {
        LifeOp::Init { actor, reset } => {
            if let Some(cid) = component(&*world, actor) {
                world.component_mut(cid).unwrap().init(reset);
            }
        }
        LifeOp::Load { actor, reset, try_import } => {
            if let Some(cid) = component(&*world, actor) {
                world.component_mut(cid).unwrap().load(reset, try_import);
            }
        }
        LifeOp::InitReset { actor } => {
            if let Some(cid) = component(&*world, actor) {
                world.component_mut(cid).unwrap().init_reset();
            }
        }
        LifeOp::WriteIds { overwrite } => {
            utils::write_ids(world, Selection::World, overwrite);
        }
        LifeOp::ClearIds => {
            utils::clear_ids(world, Selection::World);
        }
        LifeOp::WriteClasses { overwrite } => {
            utils::write_classes(world, Selection::World, overwrite);
        }
        LifeOp::ClearClasses => {
            utils::clear_classes(world, Selection::World);
        }
        LifeOp::UniqueMasks { overwrite } => {
            utils::write_unique_visual_masks(world, Selection::World, overwrite);
        }
        LifeOp::ClearMasks => {
            utils::clear_visual_masks(world, Selection::World);
        }
        LifeOp::Export { overwrite } => {
            utils::export_values(world, Selection::World, overwrite);
        }
        LifeOp::Import { overwrite } => {
            utils::import_values(world, Selection::World, overwrite);
        }
        LifeOp::ClearExported => {
            utils::clear_exported_values(world, Selection::World);
        }
        LifeOp::Toggle { include_children } => {
            utils::toggle_visual_mask_visibility(world, Selection::World, include_children);
        }
        LifeOp::ManagerInit { reset } => {
            manager.init(world, reset);
        }
        LifeOp::Destroy { actor } => {
            utils::destroy_individual_components(world, Selection::Actors(&actors[actor..=actor]));
        }
        LifeOp::Sync => {
            manager.sync(world);
        }
    }
}

fn check_invariants(world: &SemanticWorld, manager: &IndividualManager) -> Result<(), TestCaseError> {
    for ind in world.individuals().iter() {
        // Loaded implies init and all required values.
        if ind.is_loaded() {
            prop_assert!(ind.is_init(), "{}", ind.info());
            prop_assert!(ind.is_id_value_set(), "{}", ind.info());
            prop_assert!(ind.is_class_value_set(), "{}", ind.info());
            if ind.is_perceivable() {
                prop_assert!(ind.is_visual_mask_value_set(), "{}", ind.info());
            }
        }
        // Every bone's skeleton and parent bone exist.
        if let Some(link) = ind.as_bone_link() {
            prop_assert!(world.individuals().contains(link.skeletal()));
            if let Some(parent) = link.parent() {
                prop_assert!(world.individuals().contains(parent));
            }
        }
    }

    for component in world.components().iter() {
        if let Some(ind) = component.individual().and_then(|id| world.individuals().get(id)) {
            prop_assert_eq!(component.is_init(), ind.is_init());
            prop_assert_eq!(component.is_loaded(), ind.is_loaded());
        }
    }

    // Everything the manager hands out is alive.
    for &root in manager.individuals() {
        prop_assert!(world.individuals().contains(root));
    }
    for cid in manager.registered_components() {
        prop_assert!(world.component(cid).is_some());
    }
    prop_assert!(manager.thread_safe_to_read());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Random operation sequences keep the registry consistent.
    ///
    /// Invariants checked after every step:
    /// - A loaded individual is init and has its id, class and (when
    ///   perceivable) visual mask.
    /// - Component flags mirror their individual.
    /// - Bone links only point at live individuals.
    /// - After a sync the manager only refers to live components.
    #[test]
    fn lifecycle_sequences_preserve_invariants(ops in prop::collection::vec(life_op_strategy(), 1..40)) {
        let (mut world, actors) = setup();
        let mut manager = IndividualManager::new();
        for op in &ops {
            apply(&mut world, &mut manager, &actors, op);
            manager.sync(&mut world);
            check_invariants(&world, &manager)?;
        }
    }

    /// The same operations on two worlds with the same seed give the same
    /// registry fingerprint.
    #[test]
    fn lifecycle_is_deterministic(ops in prop::collection::vec(life_op_strategy(), 1..25)) {
        fn run_once(ops: &[LifeOp]) -> String {
            let (mut world, actors) = setup();
            let mut manager = IndividualManager::new();
            for op in ops {
                apply(&mut world, &mut manager, &actors, op);
            }
            manager.sync(&mut world);
            manager.snapshot(&world).hash
        }

        prop_assert_eq!(run_once(&ops), run_once(&ops));
    }

    /// Unique masks stay pairwise distinct whatever came before.
    #[test]
    fn unique_masks_stay_distinct(ops in prop::collection::vec(life_op_strategy(), 0..20)) {
        let (mut world, actors) = setup();
        let mut manager = IndividualManager::new();
        for op in &ops {
            apply(&mut world, &mut manager, &actors, op);
        }
        utils::load_individual_components(&mut world, Selection::World, false, true);
        utils::write_unique_visual_masks(&mut world, Selection::World, true);

        let masks: Vec<MaskColor> = world
            .individuals()
            .iter()
            .filter_map(|ind| ind.visual_mask_value())
            .filter(|m| !m.is_empty())
            .map(|m| MaskColor::from_hex(m).unwrap())
            .collect();
        for (i, a) in masks.iter().enumerate() {
            for b in &masks[i + 1..] {
                prop_assert!(a.manhattan_distance(*b) >= 29, "{} and {} are too close", a, b);
            }
        }
    }
}
