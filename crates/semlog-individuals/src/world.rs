//! The semantic world: a scene plus its individuals and components.
//!
//! [`SemanticWorld`] owns the three stores and is the one place that moves
//! notifications from individuals to components. Every mutating call made
//! through [`ComponentMut`] dispatches the queued notifications before it
//! returns, so component flags always mirror their individuals by the time
//! control is back with the caller.
//!
//! # Example
//!
//! ```
//! use semlog_individuals::prelude::*;
//!
//! let mut scene = Scene::new();
//! let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]));
//! let mut world = SemanticWorld::new(scene, RegistryConfig::default());
//!
//! let component = world.create_component(cup).unwrap();
//! let mut view = world.component_mut(component).unwrap();
//! assert!(view.init(false));
//! assert!(view.load(false, false));
//!
//! let individual = world.individual_of(component).unwrap();
//! assert_eq!(individual.type_name(), "VisibleIndividual");
//! assert_eq!(individual.class_value(), "Cup");
//! ```

use semlog_scene::actor::ActorKind;
use semlog_scene::handle::ActorId;
use semlog_scene::scene::Scene;
use tracing::{debug, error, warn};

use crate::component::{ComponentEvent, ComponentId, ComponentStore, IndividualComponent};
use crate::config::RegistryConfig;
use crate::IndividualError;
use crate::individual::{
    ConstraintData, Individual, IndividualArena, IndividualId, IndividualKind, SkeletalData, ValueKey, VisualData,
};

// ---------------------------------------------------------------------------
// SemanticWorld
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SemanticWorld {
    pub(crate) scene: Scene,
    pub(crate) individuals: IndividualArena,
    pub(crate) components: ComponentStore,
}

impl SemanticWorld {
    pub fn new(scene: Scene, config: RegistryConfig) -> Self {
        Self {
            scene,
            individuals: IndividualArena::new(config),
            components: ComponentStore::new(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Direct scene access, e.g. to move actors or edit tags.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn individuals(&self) -> &IndividualArena {
        &self.individuals
    }

    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    /// Subscriptions and queued notifications of components.
    pub fn components_mut(&mut self) -> &mut ComponentStore {
        &mut self.components
    }

    pub fn config(&self) -> &RegistryConfig {
        self.individuals.config()
    }

    /// Give the scene back, dropping all individuals and components.
    pub fn into_scene(self) -> Scene {
        self.scene
    }

    /// Deliver queued individual notifications to their components.
    pub fn dispatch(&mut self) {
        while let Some(notification) = self.individuals.pop_notification() {
            self.components
                .handle_individual_notification(notification, &self.individuals);
        }
    }

    // -- components ---------------------------------------------------------

    pub fn create_component(&mut self, actor: ActorId) -> Option<ComponentId> {
        self.components.create(&self.scene, actor)
    }

    pub fn component(&self, id: ComponentId) -> Option<&IndividualComponent> {
        self.components.get(id)
    }

    pub fn component_for_actor(&self, actor: ActorId) -> Option<ComponentId> {
        self.components.component_for_actor(actor)
    }

    /// Mutable view used to drive a component's lifecycle.
    pub fn component_mut(&mut self, id: ComponentId) -> Result<ComponentMut<'_>, IndividualError> {
        if !self.components.contains(id) {
            return Err(IndividualError::StaleComponent { component: id });
        }
        Ok(ComponentMut { world: self, id })
    }

    pub fn individual(&self, id: IndividualId) -> Result<&Individual, IndividualError> {
        self.individuals
            .get(id)
            .ok_or(IndividualError::StaleIndividual { individual: id })
    }

    /// Root individual of a component.
    pub fn individual_of(&self, id: ComponentId) -> Option<&Individual> {
        self.individuals.get(self.components.get(id)?.individual?)
    }

    /// Destroy a component and the individual it owns.
    ///
    /// Its flags drop to false, `Destroyed` is queued for its subscribers and
    /// the individual (with any bones) is destroyed.
    pub fn destroy_component(&mut self, id: ComponentId) -> bool {
        let Some(component) = self.components.get(id) else {
            return false;
        };
        let (owner, individual, children) = (component.owner, component.individual, component.children.clone());

        self.components.set_is_connected(id, false);
        self.components.set_is_init(id, false);
        self.components.emit(id, ComponentEvent::Destroyed { owner });
        if let Some(individual) = individual {
            self.individuals.unsubscribe(individual, id);
            for child in children {
                self.individuals.unsubscribe(child, id);
            }
            self.individuals.destroy(&mut self.scene, individual);
        }
        self.components.remove(id);
        self.dispatch();
        debug!(component = %id, actor = %owner, "component destroyed");
        true
    }

    /// Refresh the cached pose of every individual that moved by more than
    /// the configured tolerance. Returns how many changed.
    pub fn update_cached_poses(&mut self) -> usize {
        let tolerance = self.config().pose_tolerance;
        let ids: Vec<IndividualId> = self.individuals.iter().map(Individual::handle).collect();
        let mut moved = 0;
        for id in ids {
            if self.individuals.update_cached_pose(&self.scene, id, tolerance) {
                moved += 1;
            }
        }
        moved
    }
}

// ---------------------------------------------------------------------------
// ComponentMut
// ---------------------------------------------------------------------------

/// Lifecycle operations of one component.
///
/// Obtained from [`SemanticWorld::component_mut`]. If an operation makes the
/// component destroy itself, later calls on the view return `false`.
pub struct ComponentMut<'w> {
    world: &'w mut SemanticWorld,
    id: ComponentId,
}

impl<'w> ComponentMut<'w> {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn component(&self) -> Option<&IndividualComponent> {
        self.world.components.get(self.id)
    }

    fn individual(&self) -> Option<IndividualId> {
        self.component()?.individual
    }

    fn children(&self) -> Vec<IndividualId> {
        self.component().map(|c| c.children.clone()).unwrap_or_default()
    }

    /// Bone individuals with a material slot, in skeleton order.
    fn bones(&self) -> Vec<IndividualId> {
        self.individual()
            .and_then(|i| self.world.individuals.get(i))
            .and_then(|ind| ind.as_skeletal())
            .map(|s| s.bones().to_vec())
            .unwrap_or_default()
    }

    fn finish<T>(&mut self, value: T) -> T {
        self.world.dispatch();
        value
    }

    // -- lifecycle ----------------------------------------------------------

    /// Create (on first use), connect and initialize the individual.
    ///
    /// An actor kind with no individual variant makes the component destroy
    /// itself.
    pub fn init(&mut self, reset: bool) -> bool {
        let Some(is_init) = self.component().map(|c| c.is_init) else {
            return false;
        };
        if reset {
            self.init_reset();
        } else if is_init {
            return true;
        }

        let individual = match self.individual() {
            Some(individual) => individual,
            None => match self.create_individual() {
                Some(individual) => individual,
                None => {
                    self.world.destroy_component(self.id);
                    return false;
                }
            },
        };
        self.connect();

        let ok = self.world.individuals.init(&mut self.world.scene, individual, false);
        if ok {
            self.cache_children(individual);
        }
        self.world.dispatch();
        self.world.components.set_is_init(self.id, ok);
        self.finish(ok)
    }

    fn create_individual(&mut self) -> Option<IndividualId> {
        let owner = self.component()?.owner;
        let Some(actor) = self.world.scene.get(owner) else {
            error!(component = %self.id, actor = %owner, "owner actor is gone, self-destruction");
            return None;
        };
        let (kind, asset) = match &actor.kind {
            ActorKind::StaticMesh { .. } => (IndividualKind::Visible(VisualData::default()), None),
            ActorKind::SkeletalMesh { mesh_name, .. } => {
                let asset = self.world.scene.find_skeletal_data_asset(mesh_name).cloned();
                if asset.is_none() {
                    warn!(component = %self.id, mesh = %mesh_name, "no skeletal data asset, bones get no classes");
                }
                (IndividualKind::Skeletal(SkeletalData::default()), asset)
            }
            ActorKind::PhysicsConstraint { .. } => (IndividualKind::Constraint(ConstraintData::default()), None),
            ActorKind::Other { type_name } => {
                error!(component = %self.id, actor = %owner, type_name = %type_name, "unsupported actor type, self-destruction");
                return None;
            }
        };

        let individual = self.world.individuals.create(owner, kind)?;
        if asset.is_some() {
            self.world.individuals.set_bone_classes(individual, asset.clone());
        }
        let component = self.world.components.get_mut(self.id)?;
        component.individual = Some(individual);
        component.bone_class_asset = asset;
        Some(individual)
    }

    fn cache_children(&mut self, individual: IndividualId) {
        let children = self.world.individuals.children(individual);
        let attachable: Vec<(IndividualId, String)> = children
            .iter()
            .filter_map(|child| {
                self.world
                    .individuals
                    .is_child_attachable(&self.world.scene, individual, *child)
                    .map(|name| (*child, name))
            })
            .collect();
        for child in &children {
            self.world.individuals.subscribe(*child, self.id);
        }
        if let Some(component) = self.world.components.get_mut(self.id) {
            component.children = children;
            component.attachable_children = attachable.into_iter().collect();
        }
    }

    /// Tear the individual down to not-init and drop the cached children.
    /// Subscriptions to the component itself are kept.
    pub fn init_reset(&mut self) {
        if let Some(individual) = self.individual() {
            self.world.individuals.init_reset(&mut self.world.scene, individual);
        }
        if let Some(component) = self.world.components.get_mut(self.id) {
            component.children.clear();
            component.attachable_children.clear();
        }
        self.world.dispatch();
        self.world.components.set_is_connected(self.id, false);
        self.world.components.set_is_init(self.id, false);
    }

    /// Load the individual's values, initializing first if needed.
    pub fn load(&mut self, reset: bool, try_import: bool) -> bool {
        let initialized = self.component().is_some_and(|c| c.is_init);
        if !initialized && !self.init(reset) {
            return false;
        }
        let Some(individual) = self.individual() else {
            return false;
        };
        let ok = self
            .world
            .individuals
            .load(&mut self.world.scene, individual, reset, try_import);
        self.world.dispatch();
        self.world.components.set_is_loaded(self.id, ok);
        self.finish(ok)
    }

    /// Subscribe to the individual's notifications. A current subscription
    /// is left alone.
    pub fn connect(&mut self) -> bool {
        let Some(component) = self.component() else {
            return false;
        };
        let Some(individual) = component.individual else {
            return false;
        };
        let generation = component.subscription_generation;
        if component.is_connected
            && self
                .world
                .individuals
                .is_subscription_current(individual, self.id, generation)
        {
            return true;
        }
        let Some(generation) = self.world.individuals.subscribe(individual, self.id) else {
            return false;
        };
        if let Some(component) = self.world.components.get_mut(self.id) {
            component.subscription_generation = generation;
        }
        self.world.components.set_is_connected(self.id, true);
        self.finish(true)
    }

    // -- values -------------------------------------------------------------

    fn for_self_and_children(&mut self, mut f: impl FnMut(&mut SemanticWorld, IndividualId) -> bool) -> bool {
        let Some(individual) = self.individual() else {
            return false;
        };
        let mut changed = f(&mut *self.world, individual);
        for child in self.children() {
            changed |= f(&mut *self.world, child);
        }
        self.finish(changed)
    }

    /// Give the individual and its bones fresh ids. Set ids are kept unless
    /// `overwrite` is given.
    pub fn write_id(&mut self, overwrite: bool) -> bool {
        self.for_self_and_children(|world, id| {
            if !overwrite && world.individuals.is_value_set(id, ValueKey::Id) {
                return false;
            }
            world.individuals.generate_new_id_value(&mut world.scene, id)
        })
    }

    pub fn clear_id(&mut self) -> bool {
        self.for_self_and_children(|world, id| world.individuals.clear_id_value(&mut world.scene, id))
    }

    /// Set default classes on the individual and its bones.
    pub fn write_class(&mut self, overwrite: bool) -> bool {
        self.for_self_and_children(|world, id| {
            if !overwrite && world.individuals.is_value_set(id, ValueKey::Class) {
                return false;
            }
            world.individuals.set_default_class_value(&mut world.scene, id)
        })
    }

    pub fn clear_class(&mut self) -> bool {
        self.for_self_and_children(|world, id| world.individuals.clear_class_value(&mut world.scene, id))
    }

    /// Set the visual mask, and for a skeletal individual one mask per bone.
    ///
    /// `children_values` must hold one color per bone with a material slot;
    /// otherwise the bones are left untouched.
    pub fn write_visual_mask(&mut self, value: &str, overwrite: bool, children_values: &[String]) -> bool {
        let Some(individual) = self.individual() else {
            return false;
        };
        let mut changed = false;

        // Bones first: a new skeletal mask may load the skeleton, and loading
        // gives bones without a mask a random one.
        let bones = self.bones();
        if children_values.len() == bones.len() {
            for (bone, color) in bones.into_iter().zip(children_values) {
                let arena = &mut self.world.individuals;
                if overwrite || !arena.is_value_set(bone, ValueKey::VisualMask) {
                    changed |= arena.set_visual_mask_value(&mut self.world.scene, bone, color.as_str());
                }
            }
        } else {
            warn!(
                component = %self.id,
                bones = bones.len(),
                values = children_values.len(),
                "bone mask count does not match, bones left unchanged"
            );
        }

        let arena = &mut self.world.individuals;
        if overwrite || !arena.is_value_set(individual, ValueKey::VisualMask) {
            changed |= arena.set_visual_mask_value(&mut self.world.scene, individual, value);
        }
        self.finish(changed)
    }

    pub fn clear_visual_mask(&mut self) -> bool {
        self.for_self_and_children(|world, id| world.individuals.clear_visual_mask_value(&mut world.scene, id))
    }

    // -- persisted values ---------------------------------------------------

    pub fn export_values(&mut self, overwrite: bool) -> bool {
        let Some(individual) = self.individual() else {
            return false;
        };
        let changed = self
            .world
            .individuals
            .export_values(&mut self.world.scene, individual, overwrite);
        self.finish(changed)
    }

    pub fn import_values(&mut self, overwrite: bool) -> bool {
        let Some(individual) = self.individual() else {
            return false;
        };
        let changed = self
            .world
            .individuals
            .import_values(&mut self.world.scene, individual, overwrite);
        self.finish(changed)
    }

    pub fn clear_exported_values(&mut self) -> bool {
        let Some(individual) = self.individual() else {
            return false;
        };
        let changed = self
            .world
            .individuals
            .clear_exported_values(&mut self.world.scene, individual);
        self.finish(changed)
    }

    /// Switch the actor between its visual mask and its original materials.
    pub fn toggle_visual_mask_visibility(&mut self, include_children: bool) -> bool {
        let Some(individual) = self.individual() else {
            return false;
        };
        let toggled = self
            .world
            .individuals
            .toggle_materials(&mut self.world.scene, individual, include_children);
        self.finish(toggled)
    }

    /// Re-send the current values of the individual and its bones to
    /// subscribers of the component's changes.
    pub fn trigger_values_broadcast(&mut self) -> bool {
        self.for_self_and_children(|world, id| {
            world.individuals.trigger_values_broadcast(id);
            true
        })
    }
}
