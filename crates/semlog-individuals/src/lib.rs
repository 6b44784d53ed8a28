//! SemLog Individuals -- the semantic registry layered over a scene.
//!
//! Every relevant scene actor gets an *individual*: a persistent unique id, a
//! semantic class and, for things a camera can see, a visual mask color that
//! identifies it in segmentation images. Skeletal meshes are decomposed into
//! one bone individual per skeleton bone.
//!
//! The crate is organized in three layers:
//!
//! - [`individual`]: the individuals themselves, stored in an
//!   [`IndividualArena`](individual::IndividualArena), with their
//!   `Init -> Load` lifecycle and value persistence.
//! - [`component`] and [`world`]: one component per actor owning its
//!   individual and mirroring its state, all held by a [`SemanticWorld`](world::SemanticWorld).
//! - [`manager`] and [`utils`]: the world registry with its lookup tables
//!   and filtered views, and bulk operations such as unique mask assignment.
//!
//! # Quick Start
//!
//! ```
//! use semlog_individuals::prelude::*;
//!
//! let mut scene = Scene::new();
//! let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]));
//! let mut world = SemanticWorld::new(scene, RegistryConfig::with_seed(7));
//!
//! let mut manager = IndividualManager::new();
//! assert_eq!(manager.add_individual_components(&mut world, Selection::World), 1);
//! utils::write_unique_visual_masks(&mut world, Selection::World, true);
//! utils::export_values(&mut world, Selection::World, true);
//!
//! let id = world.scene().get_value(cup, "SemLog", "Id").unwrap();
//! assert_eq!(manager.get_individual_actor(&id), Some(cup));
//! ```

#![deny(unsafe_code)]

pub mod color;
pub mod component;
pub mod config;
pub mod ids;
pub mod individual;
pub mod manager;
pub mod observer;
pub mod snapshot;
pub mod utils;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the semantic layer's data-plane helpers.
///
/// Lifecycle operations report failure through their `bool` return and a
/// log event instead.
#[derive(Debug, thiserror::Error)]
pub enum IndividualError {
    /// A visual mask is not a 6 digit hex color.
    #[error("invalid mask color '{value}', expected RRGGBB hex")]
    InvalidColor { value: String },

    /// Configuration could not be parsed.
    #[error("invalid registry configuration: {details}")]
    InvalidConfig { details: String },

    /// The individual does not exist (stale generation or never created).
    #[error("individual {individual:?} does not exist (stale or never created)")]
    StaleIndividual {
        individual: individual::IndividualId,
    },

    /// The component does not exist (destroyed or never created).
    #[error("component {component:?} does not exist (destroyed or never created)")]
    StaleComponent { component: component::ComponentId },

    /// Registry snapshot (de)serialization or verification failed.
    #[error("registry snapshot error: {details}")]
    SnapshotError { details: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use semlog_scene::prelude::*;

    pub use crate::color::{ColorGenerator, MaskColor};
    pub use crate::component::{
        Channel, ComponentEvent, ComponentId, ComponentNotification, ComponentStore, IndividualComponent,
        SubscriberId,
    };
    pub use crate::config::{MaskConfig, RegistryConfig};
    pub use crate::individual::{
        Individual, IndividualArena, IndividualEvent, IndividualId, IndividualKind, IndividualType, ValueKey,
    };
    pub use crate::manager::IndividualManager;
    pub use crate::snapshot::{IndividualRecord, RegistrySnapshot};
    pub use crate::utils::{self, Selection};
    pub use crate::world::{ComponentMut, SemanticWorld};
    pub use crate::IndividualError;
}
