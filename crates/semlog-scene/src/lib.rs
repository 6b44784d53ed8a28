//! SemLog Scene -- the in-memory scene the semantic individual layer annotates.
//!
//! This crate models the collaborators the semantic layer depends on without
//! implementing them: actors and their kinds (static meshes, skeletal meshes,
//! physics constraints), the attachment graph, mesh material slots, animation
//! skeletons and bone poses, skeletal data assets, and the tag-based
//! key/value store values are persisted in.
//!
//! # Quick Start
//!
//! ```
//! use semlog_scene::prelude::*;
//!
//! let mut scene = Scene::new();
//! let table = scene.spawn(Actor::static_mesh("Table", "SM_Table", &["Top", "Legs"]));
//! let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]).with_mobility(Mobility::Movable));
//! scene.attach(cup, table, None).unwrap();
//!
//! assert!(scene.add_kv_pair(cup, "SemLog", "Class", "Cup", false));
//! assert_eq!(scene.get_value(cup, "SemLog", "Class").as_deref(), Some("Cup"));
//! ```

#![deny(unsafe_code)]

pub mod actor;
pub mod handle;
pub mod scene;
pub mod snapshot;
pub mod tags;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by scene operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The actor does not exist (stale generation or never spawned).
    #[error("actor {actor:?} does not exist (stale or never spawned)")]
    StaleActor { actor: handle::ActorId },

    /// The actor has no mesh, so it has no material slots.
    #[error("actor {actor:?} has no mesh material slots")]
    NotAMesh { actor: handle::ActorId },

    /// A material slot index is out of range.
    #[error("actor {actor:?} has no material slot {slot}")]
    MissingMaterialSlot { actor: handle::ActorId, slot: usize },

    /// A bone index is out of range or the actor is not skeletal.
    #[error("actor {actor:?} has no bone {bone_index}")]
    MissingBone {
        actor: handle::ActorId,
        bone_index: usize,
    },

    /// An actor cannot be attached to itself.
    #[error("cannot attach actor {child:?} to {parent:?}")]
    InvalidAttachment {
        child: handle::ActorId,
        parent: handle::ActorId,
    },

    /// Snapshot (de)serialization or validation failed.
    #[error("scene snapshot error: {details}")]
    SnapshotError { details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::actor::{Actor, ActorKind, AxisLocks, BoneConstraintDesc, BoneDesc, MaterialSlot, Mobility, Skeleton, Transform};
    pub use crate::handle::{ActorId, GenerationalHandle, HandleAllocator};
    pub use crate::scene::{BoneClassMap, Scene};
    pub use crate::snapshot::{ActorSnapshot, AllocatorSnapshot, SceneSnapshot};
    pub use crate::tags::ValueStore;
    pub use crate::SceneError;
}
