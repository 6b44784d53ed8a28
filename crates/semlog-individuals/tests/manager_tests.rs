//! End-to-end tests of the individual manager over a small scene.
//!
//! The scene mirrors a tabletop setup: a static table with a cup attached, a
//! movable plate, a robot arm with bones and a hinge constraint. Registry
//! snapshots are compared by their blake3 fingerprint to check that the same
//! seed produces the same registry.

use std::sync::atomic::Ordering;

use semlog_individuals::prelude::*;

// -- Scene ------------------------------------------------------------------

struct Tabletop {
    world: SemanticWorld,
    table: ActorId,
    cup: ActorId,
    plate: ActorId,
    arm: ActorId,
    hinge: ActorId,
}

fn tabletop(seed: u64) -> Tabletop {
    let mut scene = Scene::new();
    let table = scene.spawn(Actor::static_mesh("Table", "SM_Table", &["Top", "Legs"]));
    let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]).with_mobility(Mobility::Movable));
    let plate = scene.spawn(Actor::static_mesh("Plate", "SM_Plate", &["Body"]).with_mobility(Mobility::Movable));
    let arm = scene.spawn(
        Actor::skeletal_mesh("Arm", "SK_Arm", Skeleton::chain(3), &["Upper", "Lower"])
            .with_mobility(Mobility::Movable)
            .as_robot(),
    );
    let hinge = scene.spawn(Actor::constraint(
        "Hinge",
        Some(table),
        Some(plate),
        AxisLocks::ALL,
        AxisLocks::NONE,
    ));
    scene.spawn(Actor::new("Sun", ActorKind::Other { type_name: "DirectionalLight".into() }));
    scene.attach(cup, table, None).unwrap();
    scene.register_skeletal_data_asset(
        BoneClassMap::new("SK_Arm")
            .with_class(0, "Upper")
            .with_class(1, "Lower"),
    );

    Tabletop {
        world: SemanticWorld::new(scene, RegistryConfig::with_seed(seed)),
        table,
        cup,
        plate,
        arm,
        hinge,
    }
}

fn populated(seed: u64) -> (Tabletop, IndividualManager) {
    let mut t = tabletop(seed);
    let mut manager = IndividualManager::new();
    let order = [t.table, t.cup, t.plate, t.arm, t.hinge];
    assert_eq!(manager.add_individual_components(&mut t.world, Selection::Actors(&order)), 5);
    (t, manager)
}

// -- Registry ---------------------------------------------------------------

#[test]
fn single_static_mesh_end_to_end() {
    let mut scene = Scene::new();
    let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]));
    let mut world = SemanticWorld::new(scene, RegistryConfig::default());
    let mut manager = IndividualManager::new();

    assert_eq!(manager.add_individual_components(&mut world, Selection::World), 1);
    let cid = world.component_for_actor(cup).unwrap();
    let ind = world.individual_of(cid).unwrap();
    assert_eq!(ind.type_name(), "VisibleIndividual");
    assert_eq!(ind.class_value(), "Cup");
    assert!(ind.is_loaded());

    let id = ind.id_value().to_owned();
    assert_eq!(manager.get_individual_actor(&id), Some(cup));
    assert_eq!(manager.get_individual_component(&id), Some(cid));
    assert_eq!(manager.get_individual(&id), Some(ind.handle()));

    let mask = MaskColor::from_hex(ind.visual_mask_value().unwrap()).unwrap();
    assert_ne!(mask, MaskColor::BLACK);
}

#[test]
fn unsupported_actors_are_skipped() {
    let (t, manager) = populated(1);
    let sun = t.world.scene().find_by_name("Sun").unwrap();
    assert!(t.world.component_for_actor(sun).is_none());
    assert_eq!(manager.registered_components().count(), 5);
}

#[test]
fn views_classify_tabletop() {
    let (t, manager) = populated(2);
    let root = |actor| t.world.individuals().individual_for_actor(actor).unwrap();

    assert_eq!(manager.individuals().len(), 5);
    assert_eq!(manager.movable_individuals(), &[root(t.cup), root(t.plate), root(t.arm)]);
    assert_eq!(manager.skeletal_individuals(), &[root(t.arm)]);
    assert_eq!(manager.robot_individuals(), &[root(t.arm)]);

    // The table has the cup attached; the cup is attached to the table.
    let childless = manager.childless_root_individuals();
    assert!(!childless.contains(&root(t.table)));
    assert!(!childless.contains(&root(t.cup)));
    assert!(childless.contains(&root(t.plate)));
    assert!(childless.contains(&root(t.arm)));
}

#[test]
fn attachment_resolves_when_child_is_added_first() {
    let mut t = tabletop(7);
    let mut manager = IndividualManager::new();
    let order = [t.cup, t.table];
    assert_eq!(manager.add_individual_components(&mut t.world, Selection::Actors(&order)), 2);

    let table = t.world.individuals().individual_for_actor(t.table).unwrap();
    let cup = t.world.individuals().individual_for_actor(t.cup).unwrap();
    let cup_ind = t.world.individual(cup).unwrap();
    assert_eq!(cup_ind.attached_to_actor(), Some(t.table));
    assert_eq!(cup_ind.attached_to_individual(), Some(table));
    assert!(manager.childless_root_individuals().is_empty());
}

#[test]
fn bone_ids_resolve_to_skeletal_actor() {
    let (t, manager) = populated(3);
    let arm_c = t.world.component_for_actor(t.arm).unwrap();
    for child in t.world.component(arm_c).unwrap().children() {
        let id = t.world.individual(*child).unwrap().id_value();
        assert_eq!(manager.get_individual(id), Some(*child));
        assert_eq!(manager.get_individual_actor(id), Some(t.arm));
        assert_eq!(manager.get_individual_component(id), Some(arm_c));
    }
}

#[test]
fn registration_is_symmetric() {
    let (mut t, mut manager) = populated(4);
    let cid = t.world.component_for_actor(t.plate).unwrap();
    let subscriber = manager.subscriber();

    assert!(manager.unregister_individual_component(&mut t.world, cid));
    assert!(!manager.is_registered(cid));
    assert!(!t.world.component(cid).unwrap().is_subscribed(Channel::Destroyed, subscriber));
    assert!(!manager.unregister_individual_component(&mut t.world, cid));

    assert!(manager.register_individual_component(&mut t.world, cid));
    assert!(manager.is_registered(cid));
    assert!(t.world.component(cid).unwrap().is_subscribed(Channel::Destroyed, subscriber));
    assert!(!manager.register_individual_component(&mut t.world, cid));
}

#[test]
fn externally_destroyed_component_leaves_registry() {
    let (mut t, mut manager) = populated(5);
    let cid = t.world.component_for_actor(t.cup).unwrap();
    let id = t.world.individual_of(cid).unwrap().id_value().to_owned();

    assert!(t.world.destroy_component(cid));
    assert_eq!(manager.sync(&mut t.world), 1);
    assert!(!manager.is_registered(cid));
    assert!(manager.get_individual(&id).is_none());
    assert_eq!(manager.individuals().len(), 4);
    assert_eq!(manager.sync(&mut t.world), 0);
}

#[test]
fn manager_destroy_removes_components() {
    let (mut t, mut manager) = populated(6);
    let arm_c = t.world.component_for_actor(t.arm).unwrap();
    let before = t.world.individuals().len();

    assert_eq!(manager.destroy_individual_components(&mut t.world, Selection::Actors(&[t.arm])), 1);
    assert!(t.world.component(arm_c).is_none());
    assert!(manager.skeletal_individuals().is_empty());
    // Arm plus its three bones.
    assert_eq!(t.world.individuals().len(), before - 4);
}

#[test]
fn world_init_reuses_existing_components() {
    let mut t = tabletop(7);
    assert_eq!(utils::create_individual_components(&mut t.world, Selection::World), 5);

    let mut manager = IndividualManager::new();
    assert_eq!(manager.init(&mut t.world, false), 5);
    assert!(manager.is_init());
    assert_eq!(manager.init(&mut t.world, false), 0);
    assert_eq!(manager.init(&mut t.world, true), 5);
    assert_eq!(manager.individuals().len(), 5);
}

#[test]
fn incremental_init_registers_given_actors() {
    let mut t = tabletop(11);
    utils::create_individual_components(&mut t.world, Selection::World);

    let mut manager = IndividualManager::new();
    assert_eq!(manager.init_with(&mut t.world, &[t.table, t.cup]), 2);
    assert_eq!(manager.individuals().len(), 2);
    assert_eq!(manager.init_with(&mut t.world, &[t.cup, t.arm]), 1);
    assert_eq!(manager.skeletal_individuals().len(), 1);
    assert_eq!(manager.component_for_owner(t.cup), t.world.component_for_actor(t.cup));
}

#[test]
fn reload_imports_exported_values() {
    let (mut t, mut manager) = populated(8);
    utils::export_values(&mut t.world, Selection::World, true);
    let cid = t.world.component_for_actor(t.cup).unwrap();
    let id = t.world.individual_of(cid).unwrap().id_value().to_owned();

    assert_eq!(manager.reload_individual_components(&mut t.world, Selection::Actors(&[t.cup])), 1);
    assert_eq!(t.world.individual_of(cid).unwrap().id_value(), id);
    assert_eq!(manager.get_individual_actor(&id), Some(t.cup));
}

// -- Thread safety flag -----------------------------------------------------

#[test]
fn thread_safe_flag_is_raised_between_operations() {
    let (mut t, mut manager) = populated(9);
    let flag = manager.thread_safe_flag();
    assert!(flag.load(Ordering::Acquire));

    manager.destroy_individual_components(&mut t.world, Selection::Actors(&[t.plate]));
    assert!(manager.thread_safe_to_read());

    // A reader thread sees the flag through its own handle.
    let reader = std::thread::spawn(move || flag.load(Ordering::Acquire));
    assert!(reader.join().unwrap());
}

// -- Snapshots --------------------------------------------------------------

#[test]
fn same_seed_same_fingerprint() {
    let (a, manager_a) = populated(42);
    let (b, manager_b) = populated(42);
    let snap_a = manager_a.snapshot(&a.world);
    let snap_b = manager_b.snapshot(&b.world);

    // Five roots and three bones.
    assert_eq!(snap_a.len(), 8);
    assert_eq!(snap_a.fingerprint(), snap_b.fingerprint());

    let (c, manager_c) = populated(43);
    assert_ne!(snap_a.fingerprint(), manager_c.snapshot(&c.world).fingerprint());
}

#[test]
fn snapshot_records_bone_parents() {
    let (mut t, manager) = populated(10);
    utils::write_unique_visual_masks(&mut t.world, Selection::World, true);
    let snapshot = manager.snapshot(&t.world);

    let arm_id = t.world.individual(t.world.individuals().individual_for_actor(t.arm).unwrap()).unwrap().id_value();
    let bones: Vec<&IndividualRecord> = snapshot
        .individuals
        .iter()
        .filter(|r| r.parent_id.as_deref() == Some(arm_id))
        .collect();
    assert_eq!(bones.len(), 3);
    assert!(bones.iter().all(|r| r.actor == "Arm"));

    let json = snapshot.to_json().unwrap();
    let restored = RegistrySnapshot::from_json(&json).unwrap();
    assert_eq!(restored.fingerprint(), snapshot.fingerprint());
}
