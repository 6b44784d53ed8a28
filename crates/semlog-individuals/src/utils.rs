//! Bulk operations over actors.
//!
//! Each function acts on a [`Selection`] of actors and returns how many of
//! them it changed. Components are created and destroyed here; the
//! [`IndividualManager`](crate::manager::IndividualManager) only registers
//! them.

use semlog_scene::actor::ActorKind;
use semlog_scene::handle::ActorId;
use semlog_scene::scene::Scene;
use tracing::{debug, error};

use crate::color::MaskColor;
use crate::component::ComponentId;
use crate::individual::IndividualId;
use crate::world::{ComponentMut, SemanticWorld};

/// Actors a bulk operation applies to.
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    /// Every actor in the scene.
    World,
    Actors(&'a [ActorId]),
}

impl Selection<'_> {
    /// Live selected actors, in scene order for [`Selection::World`].
    pub fn actors(&self, world: &SemanticWorld) -> Vec<ActorId> {
        match self {
            Selection::World => world.scene().actor_ids(),
            Selection::Actors(actors) => actors.iter().copied().filter(|a| world.scene().is_alive(*a)).collect(),
        }
    }
}

/// Static meshes, skeletal meshes and physics constraints can carry an
/// individual component.
pub fn can_have_individual_component(scene: &Scene, actor: ActorId) -> bool {
    matches!(
        scene.get(actor).map(|a| &a.kind),
        Some(ActorKind::StaticMesh { .. } | ActorKind::SkeletalMesh { .. } | ActorKind::PhysicsConstraint { .. })
    )
}

fn components(world: &SemanticWorld, selection: Selection<'_>) -> Vec<ComponentId> {
    selection
        .actors(world)
        .into_iter()
        .filter_map(|a| world.component_for_actor(a))
        .collect()
}

fn count_components(
    world: &mut SemanticWorld,
    selection: Selection<'_>,
    mut op: impl FnMut(&mut ComponentMut<'_>) -> bool,
) -> usize {
    let mut count = 0;
    for cid in components(world, selection) {
        if let Ok(mut view) = world.component_mut(cid) {
            if op(&mut view) {
                count += 1;
            }
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Attach a component to every selected actor that can have one and has none.
pub fn create_individual_components(world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
    let mut created = 0;
    for actor in selection.actors(world) {
        if can_have_individual_component(world.scene(), actor)
            && world.component_for_actor(actor).is_none()
            && world.create_component(actor).is_some()
        {
            created += 1;
        }
    }
    debug!(created, "individual components created");
    created
}

/// Destroy the components (and individuals) of the selected actors.
///
/// Registered components reach their manager through its next `sync`.
pub fn destroy_individual_components(world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
    components(world, selection)
        .into_iter()
        .filter(|cid| world.destroy_component(*cid))
        .count()
}

pub fn init_individual_components(world: &mut SemanticWorld, selection: Selection<'_>, reset: bool) -> usize {
    count_components(world, selection, |view| view.init(reset))
}

pub fn load_individual_components(
    world: &mut SemanticWorld,
    selection: Selection<'_>,
    reset: bool,
    try_import: bool,
) -> usize {
    count_components(world, selection, |view| view.load(reset, try_import))
}

pub fn connect_individual_components(world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
    count_components(world, selection, |view| view.connect())
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

pub fn write_ids(world: &mut SemanticWorld, selection: Selection<'_>, overwrite: bool) -> usize {
    count_components(world, selection, |view| view.write_id(overwrite))
}

pub fn clear_ids(world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
    count_components(world, selection, |view| view.clear_id())
}

pub fn write_classes(world: &mut SemanticWorld, selection: Selection<'_>, overwrite: bool) -> usize {
    count_components(world, selection, |view| view.write_class(overwrite))
}

pub fn clear_classes(world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
    count_components(world, selection, |view| view.clear_class())
}

/// Give the selected perceivable individuals, and the bones of skeletal
/// ones, visual masks that are unique across the whole world.
///
/// Without `overwrite` only unset masks are written. With it, every mask in
/// the selection is replaced and its old color is released first. Returns the
/// number of masks written.
pub fn write_unique_visual_masks(world: &mut SemanticWorld, selection: Selection<'_>, overwrite: bool) -> usize {
    let mut consumed: Vec<MaskColor> = world
        .individuals()
        .iter()
        .filter_map(|ind| ind.visual_mask_value())
        .filter_map(|mask| MaskColor::from_hex(mask).ok())
        .collect();

    let mut written = 0;
    for cid in components(world, selection) {
        let Some(root) = world.component(cid).and_then(|c| c.individual()) else {
            continue;
        };
        let bones: Vec<IndividualId> = world
            .individuals()
            .get(root)
            .and_then(|ind| ind.as_skeletal())
            .map(|s| s.bones().to_vec())
            .unwrap_or_default();

        let mut colors = Vec::with_capacity(bones.len() + 1);
        for individual in std::iter::once(root).chain(bones.iter().copied()) {
            let Some(current) = world.individuals().get(individual).and_then(|ind| ind.visual_mask_value().map(str::to_owned)) else {
                colors.push(None);
                continue;
            };
            if !current.is_empty() && !overwrite {
                colors.push(Some(current.to_owned()));
                continue;
            }
            let old = MaskColor::from_hex(&current).ok();
            if let Some(old) = old {
                if let Some(pos) = consumed.iter().position(|c| *c == old) {
                    consumed.remove(pos);
                }
            }
            let color = world.individuals.colors.generate_unique(&mut consumed);
            if color == MaskColor::BLACK {
                // Black is never a mask; the individual keeps its current value.
                error!(individual = %individual, "no unique visual mask left, mask left unchanged");
                consumed.extend(old);
                colors.push(Some(current.to_owned()));
                continue;
            }
            colors.push(Some(color.to_hex()));
            written += 1;
        }

        let Some(Some(root_color)) = colors.first().cloned() else {
            continue;
        };
        let bone_colors: Vec<String> = colors.into_iter().skip(1).flatten().collect();
        if let Ok(mut view) = world.component_mut(cid) {
            view.write_visual_mask(&root_color, overwrite, &bone_colors);
        }
    }
    debug!(written, "unique visual masks written");
    written
}

pub fn clear_visual_masks(world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
    count_components(world, selection, |view| view.clear_visual_mask())
}

// ---------------------------------------------------------------------------
// Persisted values
// ---------------------------------------------------------------------------

pub fn export_values(world: &mut SemanticWorld, selection: Selection<'_>, overwrite: bool) -> usize {
    count_components(world, selection, |view| view.export_values(overwrite))
}

pub fn import_values(world: &mut SemanticWorld, selection: Selection<'_>, overwrite: bool) -> usize {
    count_components(world, selection, |view| view.import_values(overwrite))
}

pub fn clear_exported_values(world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
    count_components(world, selection, |view| view.clear_exported_values())
}

pub fn toggle_visual_mask_visibility(
    world: &mut SemanticWorld,
    selection: Selection<'_>,
    include_children: bool,
) -> usize {
    count_components(world, selection, |view| view.toggle_visual_mask_visibility(include_children))
}
