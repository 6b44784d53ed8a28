//! Scene snapshot and restore support.
//!
//! [`SceneSnapshot`] captures every live actor (tags included), the handle
//! allocator state, and the registered skeletal data assets. Restoring it
//! yields a scene whose actor handles are identical to the captured ones, so
//! values persisted in tags can be imported again after a process restart.

use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::handle::{ActorId, HandleAllocator};
use crate::scene::{BoneClassMap, Scene};
use crate::SceneError;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Serializable allocator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorSnapshot {
    pub generations: Vec<u32>,
    pub alive: Vec<bool>,
    pub free_indices: Vec<u32>,
}

/// One live actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub actor_id: ActorId,
    pub actor: Actor,
}

/// A complete, serializable snapshot of a [`Scene`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub allocator: AllocatorSnapshot,
    pub actors: Vec<ActorSnapshot>,
    #[serde(default)]
    pub skeletal_data_assets: Vec<BoneClassMap>,
}

impl SceneSnapshot {
    pub fn to_json(&self) -> Result<String, SceneError> {
        serde_json::to_string_pretty(self).map_err(|e| SceneError::SnapshotError {
            details: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        serde_json::from_str(json).map_err(|e| SceneError::SnapshotError {
            details: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Scene snapshot/restore impl
// ---------------------------------------------------------------------------

impl Scene {
    /// Capture the scene state.
    pub fn capture_snapshot(&self) -> SceneSnapshot {
        let (generations, alive, free_indices) = self.allocator.snapshot_state();
        SceneSnapshot {
            allocator: AllocatorSnapshot {
                generations,
                alive,
                free_indices,
            },
            actors: self
                .iter()
                .map(|(actor_id, actor)| ActorSnapshot {
                    actor_id,
                    actor: actor.clone(),
                })
                .collect(),
            skeletal_data_assets: self.skeletal_data_assets.values().cloned().collect(),
        }
    }

    /// Rebuild a scene from a snapshot.
    ///
    /// Fails if an actor's handle disagrees with the allocator state.
    pub fn restore_from_snapshot(snapshot: SceneSnapshot) -> Result<Self, SceneError> {
        let AllocatorSnapshot {
            generations,
            alive,
            free_indices,
        } = snapshot.allocator;
        if generations.len() != alive.len() {
            return Err(SceneError::SnapshotError {
                details: format!(
                    "allocator has {} generations but {} alive flags",
                    generations.len(),
                    alive.len()
                ),
            });
        }
        let mut scene = Scene {
            allocator: HandleAllocator::restore_from_snapshot(generations, alive, free_indices),
            actors: Vec::new(),
            skeletal_data_assets: Default::default(),
        };
        scene.actors.resize_with(scene.allocator.capacity(), || None);

        for ActorSnapshot { actor_id, actor } in snapshot.actors {
            if !scene.allocator.is_alive(actor_id) {
                return Err(SceneError::SnapshotError {
                    details: format!("actor {actor_id:?} is not alive in the allocator snapshot"),
                });
            }
            scene.actors[actor_id.index() as usize] = Some(actor);
        }
        for asset in snapshot.skeletal_data_assets {
            scene
                .skeletal_data_assets
                .insert(asset.mesh_name.clone(), asset);
        }
        Ok(scene)
    }
}
