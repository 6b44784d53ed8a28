//! Annotate a scene with semantic individuals and write it back.
//!
//! Every supported actor gets an individual with a unique id, a class and a
//! unique visual mask. The values are exported into the actors' tags, so a
//! second run over the written scene imports them instead of generating new
//! ones.
//!
//! Run with:
//!   cargo run --example annotate_scene -p semlog-individuals -- [IN.json] [OUT.json]
//!
//! Without an input a small demo scene is annotated. Without an output the
//! annotated scene is printed to stdout.

use std::fs;

use anyhow::Context;
use semlog_individuals::prelude::*;
use tracing::info;

// ---------------------------------------------------------------------------
// Scene setup
// ---------------------------------------------------------------------------

fn demo_scene() -> anyhow::Result<Scene> {
    let mut scene = Scene::new();
    let table = scene.spawn(Actor::static_mesh("Table", "SM_Table", &["Top", "Legs"]));
    let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]).with_mobility(Mobility::Movable));
    let drawer = scene.spawn(Actor::static_mesh("Drawer", "SM_Drawer", &["Front"]).with_mobility(Mobility::Movable));
    scene.spawn(Actor::constraint(
        "DrawerSlide",
        Some(table),
        Some(drawer),
        AxisLocks { x: false, y: true, z: true },
        AxisLocks::ALL,
    ));
    scene.spawn(
        Actor::skeletal_mesh(
            "Pr2",
            "SK_Pr2",
            Skeleton::from_bones([
                ("base", None),
                ("torso", Some(0)),
                ("l_gripper", Some(1)),
                ("r_gripper", Some(1)),
            ]),
            &["Base", "Gripper"],
        )
        .with_mobility(Mobility::Movable)
        .as_robot(),
    );
    scene.register_skeletal_data_asset(
        BoneClassMap::new("SK_Pr2")
            .with_class(0, "Base")
            .with_class(2, "Gripper")
            .with_class(3, "Gripper"),
    );
    scene.attach(cup, table, None)?;
    Ok(scene)
}

fn load_scene(path: Option<&str>) -> anyhow::Result<Scene> {
    let Some(path) = path else {
        return demo_scene();
    };
    let json = fs::read_to_string(path).with_context(|| format!("reading scene {path}"))?;
    let snapshot = SceneSnapshot::from_json(&json)?;
    Ok(Scene::restore_from_snapshot(snapshot)?)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let scene = load_scene(args.first().map(String::as_str))?;

    let mut world = SemanticWorld::new(scene, RegistryConfig::default());
    utils::create_individual_components(&mut world, Selection::World);

    let mut manager = IndividualManager::new();
    let registered = manager.init(&mut world, false);
    let masks = utils::write_unique_visual_masks(&mut world, Selection::World, false);
    let exported = utils::export_values(&mut world, Selection::World, false);
    manager.sync(&mut world);

    let snapshot = manager.snapshot(&world);
    info!(
        registered,
        masks,
        exported,
        individuals = snapshot.len(),
        movable = manager.movable_individuals().len(),
        robots = manager.robot_individuals().len(),
        fingerprint = %snapshot.fingerprint(),
        "scene annotated"
    );
    for record in &snapshot.individuals {
        info!(
            id = %record.id,
            class = %record.class,
            kind = %record.type_name,
            actor = %record.actor,
            mask = record.visual_mask.as_deref().unwrap_or("-"),
            "individual"
        );
    }

    let json = world.into_scene().capture_snapshot().to_json()?;
    match args.get(1) {
        Some(out) => fs::write(out, json).with_context(|| format!("writing scene {out}"))?,
        None => println!("{json}"),
    }
    Ok(())
}
