//! World-level registry of individual components.
//!
//! The [`IndividualManager`] never creates or destroys components. It drives
//! their bulk lifecycle, keeps a registry of the ones it manages, and builds
//! lookup tables (id to individual, component and actor) plus filtered views
//! consumed by loggers. Components destroyed behind its back are reconciled
//! through their `Destroyed` notification, which the manager drains at the
//! start of every operation and in [`IndividualManager::sync`].
//!
//! While any of these caches is being rebuilt the shared
//! [`thread_safe_flag`](IndividualManager::thread_safe_flag) reads `false`.
//! Reader threads are expected to check it before iterating a copy of a view;
//! it is advisory and does not lock anything.
//!
//! # Example
//!
//! ```
//! use semlog_individuals::prelude::*;
//!
//! let mut scene = Scene::new();
//! scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]).with_mobility(Mobility::Movable));
//! scene.spawn(Actor::static_mesh("Table", "SM_Table", &["Top"]));
//! let mut world = SemanticWorld::new(scene, RegistryConfig::default());
//!
//! let mut manager = IndividualManager::new();
//! assert_eq!(manager.add_individual_components(&mut world, Selection::World), 2);
//! assert_eq!(manager.individuals().len(), 2);
//! assert_eq!(manager.movable_individuals().len(), 1);
//! assert!(manager.thread_safe_to_read());
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use semlog_scene::handle::ActorId;
use tracing::{debug, info, warn};

use crate::component::{Channel, ComponentEvent, ComponentId, SubscriberId};
use crate::individual::{IndividualId, IndividualType};
use crate::snapshot::{IndividualRecord, RegistrySnapshot};
use crate::utils::{self, Selection};
use crate::world::SemanticWorld;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(0);

/// Holds the thread-safe flag low for as long as it lives.
struct MutationGuard {
    flag: Arc<AtomicBool>,
}

impl MutationGuard {
    fn new(flag: &Arc<AtomicBool>) -> Self {
        flag.store(false, Ordering::Release);
        Self {
            flag: Arc::clone(flag),
        }
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// IndividualManager
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct IndividualManager {
    subscriber: SubscriberId,
    components: BTreeSet<ComponentId>,
    owners: HashMap<ActorId, ComponentId>,
    individuals_by_id: HashMap<String, IndividualId>,
    components_by_id: HashMap<String, ComponentId>,
    actors_by_id: HashMap<String, ActorId>,
    individuals: Vec<IndividualId>,
    movable: Vec<IndividualId>,
    childless_roots: Vec<IndividualId>,
    skeletal: Vec<IndividualId>,
    robots: Vec<IndividualId>,
    thread_safe: Arc<AtomicBool>,
    is_init: bool,
}

impl Default for IndividualManager {
    fn default() -> Self {
        Self::new()
    }
}

impl IndividualManager {
    pub fn new() -> Self {
        Self {
            subscriber: SubscriberId::Manager(NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed)),
            components: BTreeSet::new(),
            owners: HashMap::new(),
            individuals_by_id: HashMap::new(),
            components_by_id: HashMap::new(),
            actors_by_id: HashMap::new(),
            individuals: Vec::new(),
            movable: Vec::new(),
            childless_roots: Vec::new(),
            skeletal: Vec::new(),
            robots: Vec::new(),
            thread_safe: Arc::new(AtomicBool::new(true)),
            is_init: false,
        }
    }

    /// Subscriber id the manager's `Destroyed` bindings use.
    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    pub fn is_init(&self) -> bool {
        self.is_init
    }

    fn guard(&self) -> MutationGuard {
        MutationGuard::new(&self.thread_safe)
    }

    // -- init ---------------------------------------------------------------

    /// Register every component in the world.
    ///
    /// Each component is initialized and loaded (importing persisted values)
    /// and registered even if it only got partially loaded. Returns the number
    /// of newly registered components; `0` if already init and `reset` is not
    /// set. `reset` unregisters everything first.
    pub fn init(&mut self, world: &mut SemanticWorld, reset: bool) -> usize {
        let _guard = self.guard();
        self.drain_destroyed(world);
        if reset {
            self.clear(world);
        } else if self.is_init {
            return 0;
        }
        let actors = world.scene().actor_ids();
        let registered = self.init_actors(world, &actors);
        self.is_init = true;
        self.rebuild(world);
        info!(registered, total = self.components.len(), "individual manager initialized");
        registered
    }

    /// Incremental [`init`](Self::init) over `actors` only.
    pub fn init_with(&mut self, world: &mut SemanticWorld, actors: &[ActorId]) -> usize {
        let _guard = self.guard();
        self.drain_destroyed(world);
        let registered = self.init_actors(world, actors);
        self.rebuild(world);
        registered
    }

    fn init_actors(&mut self, world: &mut SemanticWorld, actors: &[ActorId]) -> usize {
        let pending: Vec<ComponentId> = actors
            .iter()
            .filter_map(|actor| world.component_for_actor(*actor))
            .filter(|cid| !self.components.contains(cid))
            .collect();
        let initialized: Vec<bool> = pending
            .iter()
            .map(|cid| world.component_mut(*cid).is_ok_and(|mut view| view.init(false)))
            .collect();

        let mut registered = 0;
        for (cid, is_init) in pending.into_iter().zip(initialized) {
            if is_init {
                if let Ok(mut view) = world.component_mut(cid) {
                    view.load(false, true);
                }
            }
            if world.component(cid).is_some() && self.register(world, cid) {
                registered += 1;
            }
        }
        registered
    }

    fn clear(&mut self, world: &mut SemanticWorld) {
        let registered: Vec<ComponentId> = self.components.iter().copied().collect();
        for cid in registered {
            self.unregister(world, cid);
        }
        self.is_init = false;
    }

    // -- bulk operations ----------------------------------------------------

    /// Create (or reuse) components on the selected actors, then init and
    /// load them. Only components that initialized are registered. Returns the
    /// number registered.
    pub fn add_individual_components(&mut self, world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
        let _guard = self.guard();
        self.drain_destroyed(world);
        // Init everything before loading anything, so loads see the individuals
        // of actors later in the selection.
        let mut initialized = Vec::new();
        for actor in selection.actors(world) {
            if !utils::can_have_individual_component(world.scene(), actor) {
                continue;
            }
            let Some(cid) = world
                .component_for_actor(actor)
                .or_else(|| world.create_component(actor))
            else {
                continue;
            };
            let Ok(mut view) = world.component_mut(cid) else {
                continue;
            };
            if view.init(false) {
                initialized.push(cid);
            } else {
                debug!(component = %cid, actor = %actor, "component did not initialize, not registered");
            }
        }

        let mut registered = 0;
        for cid in initialized {
            if let Ok(mut view) = world.component_mut(cid) {
                view.load(false, true);
            }
            if !self.components.contains(&cid) && self.register(world, cid) {
                registered += 1;
            }
        }
        self.rebuild(world);
        registered
    }

    /// Unregister and destroy the components of the selected actors. Returns
    /// the number destroyed.
    pub fn destroy_individual_components(&mut self, world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
        let _guard = self.guard();
        self.drain_destroyed(world);
        let mut destroyed = 0;
        for actor in selection.actors(world) {
            let Some(cid) = world.component_for_actor(actor) else {
                continue;
            };
            if self.components.contains(&cid) {
                self.unregister(world, cid);
            }
            if world.destroy_component(cid) {
                destroyed += 1;
            }
        }
        self.rebuild(world);
        destroyed
    }

    /// Reset and reload the selected registered components, importing
    /// persisted values. Returns the number that loaded.
    pub fn reload_individual_components(&mut self, world: &mut SemanticWorld, selection: Selection<'_>) -> usize {
        let _guard = self.guard();
        self.drain_destroyed(world);
        let mut loaded = 0;
        for actor in selection.actors(world) {
            let Some(cid) = self.owners.get(&actor).copied() else {
                continue;
            };
            if let Ok(mut view) = world.component_mut(cid) {
                if view.load(true, true) {
                    loaded += 1;
                }
            }
        }
        self.rebuild(world);
        loaded
    }

    // -- registration -------------------------------------------------------

    /// Add a component to the registry and bind its `Destroyed` notification.
    pub fn register_individual_component(&mut self, world: &mut SemanticWorld, cid: ComponentId) -> bool {
        let _guard = self.guard();
        self.drain_destroyed(world);
        let registered = self.register(world, cid);
        if registered {
            self.rebuild(world);
        }
        registered
    }

    /// Remove a component from the registry and unbind its `Destroyed`
    /// notification. The component itself is left alone.
    pub fn unregister_individual_component(&mut self, world: &mut SemanticWorld, cid: ComponentId) -> bool {
        let _guard = self.guard();
        self.drain_destroyed(world);
        let unregistered = self.unregister(world, cid);
        if unregistered {
            self.rebuild(world);
        }
        unregistered
    }

    fn register(&mut self, world: &mut SemanticWorld, cid: ComponentId) -> bool {
        let Some(owner) = world.component(cid).map(|c| c.owner()) else {
            warn!(component = %cid, "cannot register a destroyed component");
            return false;
        };
        if self.components.contains(&cid) {
            warn!(component = %cid, "component is already registered");
            return false;
        }
        if let Some(other) = self.owners.get(&owner) {
            warn!(component = %cid, actor = %owner, registered = %other, "actor already has a registered component");
            return false;
        }
        self.components.insert(cid);
        self.owners.insert(owner, cid);
        world.components_mut().subscribe(cid, Channel::Destroyed, self.subscriber);
        true
    }

    fn unregister(&mut self, world: &mut SemanticWorld, cid: ComponentId) -> bool {
        if !self.components.remove(&cid) {
            warn!(component = %cid, "component is not registered");
            return false;
        }
        self.owners.retain(|_, c| *c != cid);
        world.components_mut().unsubscribe(cid, Channel::Destroyed, self.subscriber);
        true
    }

    // -- destruction reconciliation -----------------------------------------

    /// Drop components that were destroyed since the last operation. Returns
    /// how many were dropped.
    pub fn sync(&mut self, world: &mut SemanticWorld) -> usize {
        let _guard = self.guard();
        let dropped = self.drain_destroyed(world);
        if dropped > 0 {
            self.rebuild(world);
        }
        dropped
    }

    fn drain_destroyed(&mut self, world: &mut SemanticWorld) -> usize {
        let mut dropped = 0;
        for notification in world.components_mut().drain_for(self.subscriber) {
            if let ComponentEvent::Destroyed { owner } = notification.event {
                if self.components.remove(&notification.source) {
                    if self.owners.get(&owner) == Some(&notification.source) {
                        self.owners.remove(&owner);
                    }
                    debug!(component = %notification.source, actor = %owner, "destroyed component unregistered");
                    dropped += 1;
                }
            }
        }
        dropped
    }

    // -- caches -------------------------------------------------------------

    fn rebuild(&mut self, world: &SemanticWorld) {
        self.individuals_by_id.clear();
        self.components_by_id.clear();
        self.actors_by_id.clear();
        self.individuals.clear();
        self.movable.clear();
        self.childless_roots.clear();
        self.skeletal.clear();
        self.robots.clear();

        let arena = world.individuals();
        for &cid in &self.components {
            let Some(component) = world.component(cid) else {
                continue;
            };
            let Some(root) = component.individual().and_then(|id| arena.get(id)) else {
                continue;
            };
            let owner = component.owner();
            self.individuals.push(root.handle());

            for ind in std::iter::once(root).chain(component.children().iter().filter_map(|c| arena.get(*c))) {
                if ind.is_id_value_set() {
                    let id = ind.id_value().to_owned();
                    self.individuals_by_id.insert(id.clone(), ind.handle());
                    self.components_by_id.insert(id.clone(), cid);
                    self.actors_by_id.insert(id, owner);
                }
            }

            if root.is_movable() {
                self.movable.push(root.handle());
            }
            if root.individual_type() == IndividualType::Skeletal {
                self.skeletal.push(root.handle());
                if world.scene().get(owner).is_some_and(|a| a.is_robot) {
                    self.robots.push(root.handle());
                }
            }
        }

        let attach_targets: HashSet<IndividualId> = self
            .individuals
            .iter()
            .filter_map(|root| arena.get(*root)?.attached_to_individual())
            .collect();
        for &root in &self.individuals {
            let Some(ind) = arena.get(root) else {
                continue;
            };
            if ind.attached_to_individual().is_none() && !attach_targets.contains(&root) {
                self.childless_roots.push(root);
            }
        }
    }

    // -- lookups ------------------------------------------------------------

    /// Individual with unique id `id`, bones included.
    pub fn get_individual(&self, id: &str) -> Option<IndividualId> {
        self.individuals_by_id.get(id).copied()
    }

    /// Component owning the individual with unique id `id`.
    pub fn get_individual_component(&self, id: &str) -> Option<ComponentId> {
        self.components_by_id.get(id).copied()
    }

    /// Actor described by the individual with unique id `id`.
    pub fn get_individual_actor(&self, id: &str) -> Option<ActorId> {
        self.actors_by_id.get(id).copied()
    }

    pub fn is_registered(&self, cid: ComponentId) -> bool {
        self.components.contains(&cid)
    }

    pub fn registered_components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.iter().copied()
    }

    pub fn component_for_owner(&self, actor: ActorId) -> Option<ComponentId> {
        self.owners.get(&actor).copied()
    }

    // -- views --------------------------------------------------------------

    /// Root individuals of all registered components.
    pub fn individuals(&self) -> &[IndividualId] {
        &self.individuals
    }

    pub fn movable_individuals(&self) -> &[IndividualId] {
        &self.movable
    }

    /// Individuals not attached to another individual and with nothing
    /// attached to them.
    pub fn childless_root_individuals(&self) -> &[IndividualId] {
        &self.childless_roots
    }

    pub fn skeletal_individuals(&self) -> &[IndividualId] {
        &self.skeletal
    }

    /// Skeletal individuals of robot actors.
    pub fn robot_individuals(&self) -> &[IndividualId] {
        &self.robots
    }

    /// `false` while the registry caches are being mutated.
    pub fn thread_safe_to_read(&self) -> bool {
        self.thread_safe.load(Ordering::Acquire)
    }

    /// Shared flag for reader threads.
    pub fn thread_safe_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.thread_safe)
    }

    // -- snapshot -----------------------------------------------------------

    /// Serializable view of every registered individual and its bones.
    pub fn snapshot(&self, world: &SemanticWorld) -> RegistrySnapshot {
        let arena = world.individuals();
        let mut records = Vec::new();
        for &cid in &self.components {
            let Some(component) = world.component(cid) else {
                continue;
            };
            let actor_name = world
                .scene()
                .get(component.owner())
                .map(|a| a.name.clone())
                .unwrap_or_default();
            let Some(root) = component.individual().and_then(|id| arena.get(id)) else {
                continue;
            };
            records.push(IndividualRecord::new(root, &actor_name, None));
            for child in component.children().iter().filter_map(|c| arena.get(*c)) {
                records.push(IndividualRecord::new(child, &actor_name, Some(root.id_value())));
            }
        }
        RegistrySnapshot::new(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use semlog_scene::actor::{Actor, Mobility, Skeleton};
    use semlog_scene::scene::Scene;

    fn world() -> (SemanticWorld, ActorId, ActorId) {
        let mut scene = Scene::new();
        let table = scene.spawn(Actor::static_mesh("Table", "SM_Table", &["Top"]));
        let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]).with_mobility(Mobility::Movable));
        scene.attach(cup, table, None).unwrap();
        (SemanticWorld::new(scene, RegistryConfig::default()), table, cup)
    }

    #[test]
    fn register_is_symmetric() {
        let (mut world, _, cup) = world();
        let cid = world.create_component(cup).unwrap();
        let mut manager = IndividualManager::new();

        assert!(manager.register_individual_component(&mut world, cid));
        assert_eq!(manager.component_for_owner(cup), Some(cid));
        assert!(world.component(cid).unwrap().is_subscribed(Channel::Destroyed, manager.subscriber()));
        assert!(!manager.register_individual_component(&mut world, cid));

        assert!(manager.unregister_individual_component(&mut world, cid));
        assert!(!manager.is_registered(cid));
        assert_eq!(manager.component_for_owner(cup), None);
        assert!(!world.component(cid).unwrap().is_subscribed(Channel::Destroyed, manager.subscriber()));
        assert!(!manager.unregister_individual_component(&mut world, cid));
    }

    #[test]
    fn destroyed_component_is_dropped_on_sync() {
        let (mut world, _, cup) = world();
        let mut manager = IndividualManager::new();
        assert_eq!(manager.add_individual_components(&mut world, Selection::World), 2);
        let cid = world.component_for_actor(cup).unwrap();

        assert!(world.destroy_component(cid));
        assert!(manager.is_registered(cid));
        assert_eq!(manager.sync(&mut world), 1);
        assert!(!manager.is_registered(cid));
        assert_eq!(manager.individuals().len(), 1);
    }

    #[test]
    fn views_classify_individuals() {
        let mut scene = Scene::new();
        let table = scene.spawn(Actor::static_mesh("Table", "SM_Table", &["Top"]));
        let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]).with_mobility(Mobility::Movable));
        let pr2 = scene.spawn(Actor::skeletal_mesh("PR2", "SK_PR2", Skeleton::chain(3), &[]).as_robot());
        let hand = scene.spawn(Actor::skeletal_mesh("Hand", "SK_Hand", Skeleton::chain(2), &[]));
        scene.attach(cup, table, None).unwrap();
        let mut world = SemanticWorld::new(scene, RegistryConfig::default());

        let mut manager = IndividualManager::new();
        assert_eq!(manager.add_individual_components(&mut world, Selection::World), 4);
        let root = |actor| world.individuals().individual_for_actor(actor).unwrap();

        assert_eq!(manager.movable_individuals(), &[root(cup)]);
        assert_eq!(manager.skeletal_individuals(), &[root(pr2), root(hand)]);
        assert_eq!(manager.robot_individuals(), &[root(pr2)]);
        assert_eq!(manager.childless_root_individuals(), &[root(pr2), root(hand)]);
    }

    #[test]
    fn lookups_cover_bones() {
        let mut scene = Scene::new();
        let arm = scene.spawn(Actor::skeletal_mesh("Arm", "SK_Arm", Skeleton::chain(2), &[]));
        let mut world = SemanticWorld::new(scene, RegistryConfig::default());
        let mut manager = IndividualManager::new();
        manager.add_individual_components(&mut world, Selection::World);

        let cid = world.component_for_actor(arm).unwrap();
        let bone = world.component(cid).unwrap().children()[1];
        let bone_id = world.individuals().get(bone).unwrap().id_value().to_owned();
        assert_eq!(manager.get_individual(&bone_id), Some(bone));
        assert_eq!(manager.get_individual_component(&bone_id), Some(cid));
        assert_eq!(manager.get_individual_actor(&bone_id), Some(arm));
    }

    #[test]
    fn init_is_idempotent_until_reset() {
        let (mut world, table, cup) = world();
        world.create_component(table).unwrap();
        world.create_component(cup).unwrap();
        let mut manager = IndividualManager::new();
        assert_eq!(manager.init(&mut world, false), 2);
        assert_eq!(manager.init(&mut world, false), 0);
        assert_eq!(manager.init(&mut world, true), 2);
        assert!(manager.thread_safe_to_read());
    }

    #[test]
    fn guard_lowers_flag_while_alive() {
        let manager = IndividualManager::new();
        let flag = manager.thread_safe_flag();
        {
            let _guard = manager.guard();
            assert!(!flag.load(Ordering::Acquire));
            assert!(!manager.thread_safe_to_read());
        }
        assert!(flag.load(Ordering::Acquire));
    }
}
