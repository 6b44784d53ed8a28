//! Scene snapshot round-trip tests.

use semlog_scene::prelude::*;

fn sample_scene() -> (Scene, ActorId, ActorId) {
    let mut scene = Scene::new();
    let table = scene.spawn(Actor::static_mesh("Table", "SM_Table", &["Top"]));
    let gone = scene.spawn(Actor::static_mesh("Gone", "SM_Gone", &[]));
    let arm = scene.spawn(
        Actor::skeletal_mesh("Arm", "SK_Arm", Skeleton::chain(3), &["Upper"])
            .with_mobility(Mobility::Movable)
            .as_robot(),
    );
    scene.destroy(gone).unwrap();
    scene.register_skeletal_data_asset(BoneClassMap::new("SK_Arm").with_class(0, "Upper"));
    scene.add_kv_pair(table, "SemLog", "Id", "t-1", false);
    scene.add_kv_pair(arm, "SemLogBone0", "Class", "Upper", false);
    (scene, table, arm)
}

#[test]
fn snapshot_json_round_trip_preserves_tags_and_handles() {
    let (scene, table, arm) = sample_scene();
    let json = scene.capture_snapshot().to_json().unwrap();

    let restored = Scene::restore_from_snapshot(SceneSnapshot::from_json(&json).unwrap()).unwrap();

    assert_eq!(restored.actor_count(), 2);
    assert_eq!(restored.get_value(table, "SemLog", "Id").as_deref(), Some("t-1"));
    assert_eq!(restored.get_value(arm, "SemLogBone0", "Class").as_deref(), Some("Upper"));
    assert!(restored.get(arm).unwrap().is_robot);
    assert_eq!(
        restored.find_skeletal_data_asset("SK_Arm").and_then(|a| a.class_of(0)),
        Some("Upper")
    );
}

#[test]
fn restored_scene_recycles_slots_like_the_original() {
    let (mut scene, _, _) = sample_scene();
    let snapshot = scene.capture_snapshot();
    let mut restored = Scene::restore_from_snapshot(snapshot).unwrap();

    let a = scene.spawn(Actor::static_mesh("New", "SM_New", &[]));
    let b = restored.spawn(Actor::static_mesh("New", "SM_New", &[]));
    assert_eq!(a, b);
}

#[test]
fn snapshot_with_dead_actor_handle_is_rejected() {
    let (scene, _, _) = sample_scene();
    let mut snapshot = scene.capture_snapshot();
    snapshot.actors[0].actor_id = ActorId::new(1, 0);
    assert!(matches!(
        Scene::restore_from_snapshot(snapshot),
        Err(SceneError::SnapshotError { .. })
    ));
}

#[test]
fn malformed_json_is_an_error() {
    assert!(SceneSnapshot::from_json("{ not json").is_err());
}
