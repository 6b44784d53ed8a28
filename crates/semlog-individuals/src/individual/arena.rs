//! Individual storage and notification outbox.

use std::collections::{HashMap, VecDeque};

use semlog_scene::handle::{ActorId, HandleAllocator};
use semlog_scene::scene::Scene;
use tracing::{debug, warn};

use super::{Individual, IndividualId, IndividualKind, IndividualType, ValueKey};
use crate::color::ColorGenerator;
use crate::component::ComponentId;
use crate::config::RegistryConfig;
use crate::ids::IdGenerator;

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Something that happened to an individual.
#[derive(Debug, Clone, PartialEq)]
pub enum IndividualEvent {
    InitChanged(bool),
    LoadedChanged(bool),
    NewValue { key: ValueKey, value: String },
    /// The subscriber list is about to be cleared.
    DelegatesCleared,
}

/// An event addressed to one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct IndividualNotification {
    pub source: IndividualId,
    pub subscriber: ComponentId,
    pub event: IndividualEvent,
}

// ---------------------------------------------------------------------------
// IndividualArena
// ---------------------------------------------------------------------------

/// Owns every individual.
///
/// Root individuals (those created for an actor) are indexed by actor. Bone
/// and virtual bone individuals are owned by their skeletal individual and
/// destroyed with it.
#[derive(Debug)]
pub struct IndividualArena {
    allocator: HandleAllocator<IndividualId>,
    slots: Vec<Option<Individual>>,
    by_actor: HashMap<ActorId, IndividualId>,
    outbox: VecDeque<IndividualNotification>,
    pub(crate) ids: IdGenerator,
    pub(crate) colors: ColorGenerator,
    pub(crate) config: RegistryConfig,
}

impl IndividualArena {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            allocator: HandleAllocator::new(),
            slots: Vec::new(),
            by_actor: HashMap::new(),
            outbox: VecDeque::new(),
            ids: IdGenerator::new(config.seed),
            colors: ColorGenerator::new(config.seed.rotate_left(32) ^ 0xC010_5EED, config.mask.clone()),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn color_generator_mut(&mut self) -> &mut ColorGenerator {
        &mut self.colors
    }

    // -- storage ------------------------------------------------------------

    pub fn contains(&self, id: IndividualId) -> bool {
        self.allocator.is_alive(id)
    }

    pub fn get(&self, id: IndividualId) -> Option<&Individual> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get(id.index() as usize)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: IndividualId) -> Option<&mut Individual> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get_mut(id.index() as usize)?.as_mut()
    }

    pub(crate) fn individual_type(&self, id: IndividualId) -> Option<IndividualType> {
        self.get(id).map(Individual::individual_type)
    }

    /// Number of live individuals, bones included.
    pub fn len(&self) -> usize {
        self.allocator.alive_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Individual> + '_ {
        self.slots.iter().flatten()
    }

    /// Root individual describing `actor`.
    pub fn individual_for_actor(&self, actor: ActorId) -> Option<IndividualId> {
        self.by_actor
            .get(&actor)
            .copied()
            .filter(|id| self.contains(*id))
    }

    /// Children of a skeletal individual (bones first, then virtual bones).
    pub fn children(&self, id: IndividualId) -> Vec<IndividualId> {
        self.get(id).map(Individual::children).unwrap_or_default()
    }

    /// Create the root individual of `actor`.
    ///
    /// Returns `None` if the actor already has one.
    pub fn create(&mut self, actor: ActorId, kind: IndividualKind) -> Option<IndividualId> {
        if let Some(existing) = self.individual_for_actor(actor) {
            warn!(actor = %actor, individual = %existing, "actor already has an individual");
            return None;
        }
        let tag_type = self.config.tag_type.clone();
        let id = self.insert(actor, kind, tag_type);
        self.by_actor.insert(actor, id);
        Some(id)
    }

    pub(crate) fn insert(&mut self, actor: ActorId, kind: IndividualKind, tag_type: String) -> IndividualId {
        let id = self.allocator.allocate();
        let idx = id.index() as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        debug!(individual = %id, actor = %actor, kind = kind.individual_type().type_name(), "individual created");
        self.slots[idx] = Some(Individual::new(id, kind, actor, tag_type));
        id
    }

    /// Destroy an individual and, for skeletal individuals, all of its bones.
    ///
    /// Mask materials are restored and the individual is marked not init
    /// before it is removed.
    pub fn destroy(&mut self, scene: &mut Scene, id: IndividualId) -> bool {
        let Some(ind) = self.get(id) else {
            return false;
        };
        let actor = ind.parent_actor;
        for child in ind.children() {
            self.destroy(scene, child);
        }
        self.apply_original_materials(scene, id);
        self.set_is_init(id, false);
        if self.by_actor.get(&actor) == Some(&id) {
            self.by_actor.remove(&actor);
        }
        self.slots[id.index() as usize] = None;
        self.allocator.deallocate(id);
        debug!(individual = %id, "individual destroyed");
        true
    }

    // -- subscriptions ------------------------------------------------------

    /// Subscribe a component. Returns the observer generation the subscription
    /// is valid for, or `None` if the individual does not exist.
    pub fn subscribe(&mut self, id: IndividualId, subscriber: ComponentId) -> Option<u64> {
        let ind = self.get_mut(id)?;
        ind.observers.subscribe(subscriber);
        Some(ind.observers.generation())
    }

    pub fn unsubscribe(&mut self, id: IndividualId, subscriber: ComponentId) -> bool {
        self.get_mut(id)
            .is_some_and(|ind| ind.observers.unsubscribe(subscriber))
    }

    /// `true` if `subscriber` subscribed at `generation` and is still subscribed.
    pub fn is_subscription_current(&self, id: IndividualId, subscriber: ComponentId, generation: u64) -> bool {
        self.get(id)
            .is_some_and(|ind| ind.observers.is_current(subscriber, generation))
    }

    /// Queue `event` for every current subscriber of `id`.
    pub(crate) fn emit(&mut self, id: IndividualId, event: IndividualEvent) {
        let Some(subscribers) = self.get(id).map(|ind| ind.observers.subscribers().to_vec()) else {
            return;
        };
        for subscriber in subscribers {
            self.outbox.push_back(IndividualNotification {
                source: id,
                subscriber,
                event: event.clone(),
            });
        }
    }

    /// Broadcast [`IndividualEvent::DelegatesCleared`] and drop all subscribers.
    pub(crate) fn clear_delegates(&mut self, id: IndividualId) {
        self.emit(id, IndividualEvent::DelegatesCleared);
        if let Some(ind) = self.get_mut(id) {
            ind.observers.clear();
        }
    }

    /// Next queued notification, oldest first.
    pub fn pop_notification(&mut self) -> Option<IndividualNotification> {
        self.outbox.pop_front()
    }

    pub fn pending_notifications(&self) -> usize {
        self.outbox.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::VisualData;
    use semlog_scene::actor::Actor;

    fn setup() -> (Scene, IndividualArena, ActorId) {
        let mut scene = Scene::new();
        let cup = scene.spawn(Actor::static_mesh("Cup", "SM_Cup", &["Body"]));
        (scene, IndividualArena::new(RegistryConfig::default()), cup)
    }

    #[test]
    fn one_root_individual_per_actor() {
        let (_, mut arena, cup) = setup();
        let id = arena.create(cup, IndividualKind::Visible(VisualData::default())).unwrap();
        assert_eq!(arena.individual_for_actor(cup), Some(id));
        assert!(arena.create(cup, IndividualKind::Base).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn destroy_frees_actor_slot() {
        let (mut scene, mut arena, cup) = setup();
        let id = arena.create(cup, IndividualKind::Base).unwrap();
        assert!(arena.destroy(&mut scene, id));
        assert!(!arena.contains(id));
        assert_eq!(arena.individual_for_actor(cup), None);
        assert!(!arena.destroy(&mut scene, id));
        assert!(arena.create(cup, IndividualKind::Base).is_some());
    }

    #[test]
    fn emit_reaches_each_subscriber_once() {
        let (_, mut arena, cup) = setup();
        let id = arena.create(cup, IndividualKind::Base).unwrap();
        let (c1, c2) = (ComponentId::new(0, 0), ComponentId::new(1, 0));
        arena.subscribe(id, c1);
        arena.subscribe(id, c1);
        arena.subscribe(id, c2);
        arena.emit(id, IndividualEvent::InitChanged(true));
        assert_eq!(arena.pending_notifications(), 2);
        assert_eq!(arena.pop_notification().unwrap().subscriber, c1);
        assert_eq!(arena.pop_notification().unwrap().subscriber, c2);
        assert!(arena.pop_notification().is_none());
    }

    #[test]
    fn clear_delegates_notifies_then_drops() {
        let (_, mut arena, cup) = setup();
        let id = arena.create(cup, IndividualKind::Base).unwrap();
        let c = ComponentId::new(0, 0);
        let gen = arena.subscribe(id, c).unwrap();
        arena.clear_delegates(id);
        assert!(!arena.is_subscription_current(id, c, gen));
        let n = arena.pop_notification().unwrap();
        assert_eq!(n.event, IndividualEvent::DelegatesCleared);
        arena.emit(id, IndividualEvent::InitChanged(true));
        assert_eq!(arena.pending_notifications(), 0);
    }
}
