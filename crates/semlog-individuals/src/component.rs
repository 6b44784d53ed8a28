//! Per-actor individual components.
//!
//! An [`IndividualComponent`] is attached to one actor and exclusively owns
//! that actor's root individual. It mirrors the individual's init and loaded
//! state, tracks whether it is still connected to the individual's
//! notifications, and re-broadcasts value changes (its own and those of
//! cached bone children) to its own subscribers.
//!
//! Components live in a [`ComponentStore`] keyed by owning actor; at most one
//! component exists per actor. Lifecycle operations that need the scene and
//! the individuals go through [`ComponentMut`](crate::world::ComponentMut).

use std::collections::{BTreeMap, HashMap, VecDeque};

use semlog_scene::handle::{ActorId, HandleAllocator};
use semlog_scene::scene::{BoneClassMap, Scene};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::individual::{IndividualArena, IndividualEvent, IndividualId, IndividualNotification, ValueKey};
use crate::observer::Observers;

semlog_scene::define_handle!(
    /// Handle to an [`IndividualComponent`] in a [`ComponentStore`].
    ComponentId
);

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Who listens to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriberId {
    /// An [`IndividualManager`](crate::manager::IndividualManager).
    Manager(u64),
    /// Any other listener, e.g. a logger.
    External(u64),
}

/// Which notifications a subscription covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Only [`ComponentEvent::Destroyed`].
    Destroyed,
    /// State and value changes.
    Changes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentEvent {
    Destroyed { owner: ActorId },
    InitChanged(bool),
    LoadedChanged(bool),
    ConnectedChanged(bool),
    /// A value of the component's individual or one of its children changed.
    ValueChanged {
        individual: IndividualId,
        key: ValueKey,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentNotification {
    pub source: ComponentId,
    pub event: ComponentEvent,
}

// ---------------------------------------------------------------------------
// IndividualComponent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IndividualComponent {
    pub(crate) handle: ComponentId,
    pub(crate) owner: ActorId,
    pub(crate) individual: Option<IndividualId>,
    pub(crate) is_init: bool,
    pub(crate) is_loaded: bool,
    pub(crate) is_connected: bool,
    /// Observer generation of the individual when this component subscribed.
    pub(crate) subscription_generation: u64,
    /// Bone and virtual bone individuals, skeletal owners only.
    pub(crate) children: Vec<IndividualId>,
    /// Children other actors can attach to, with the bone name.
    pub(crate) attachable_children: BTreeMap<IndividualId, String>,
    pub(crate) bone_class_asset: Option<BoneClassMap>,
    pub(crate) on_destroyed: Observers<SubscriberId>,
    pub(crate) on_changed: Observers<SubscriberId>,
}

impl IndividualComponent {
    fn new(handle: ComponentId, owner: ActorId) -> Self {
        Self {
            handle,
            owner,
            individual: None,
            is_init: false,
            is_loaded: false,
            is_connected: false,
            subscription_generation: 0,
            children: Vec::new(),
            attachable_children: BTreeMap::new(),
            bone_class_asset: None,
            on_destroyed: Observers::new(),
            on_changed: Observers::new(),
        }
    }

    pub fn handle(&self) -> ComponentId {
        self.handle
    }

    /// Actor the component is attached to.
    pub fn owner(&self) -> ActorId {
        self.owner
    }

    /// Root individual, once the component has been initialized.
    pub fn individual(&self) -> Option<IndividualId> {
        self.individual
    }

    pub fn is_init(&self) -> bool {
        self.is_init
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn children(&self) -> &[IndividualId] {
        &self.children
    }

    pub fn attachable_children(&self) -> &BTreeMap<IndividualId, String> {
        &self.attachable_children
    }

    pub fn bone_class_asset(&self) -> Option<&BoneClassMap> {
        self.bone_class_asset.as_ref()
    }

    fn observers(&self, channel: Channel) -> &Observers<SubscriberId> {
        match channel {
            Channel::Destroyed => &self.on_destroyed,
            Channel::Changes => &self.on_changed,
        }
    }

    fn observers_mut(&mut self, channel: Channel) -> &mut Observers<SubscriberId> {
        match channel {
            Channel::Destroyed => &mut self.on_destroyed,
            Channel::Changes => &mut self.on_changed,
        }
    }

    pub fn is_subscribed(&self, channel: Channel, subscriber: SubscriberId) -> bool {
        self.observers(channel).contains(subscriber)
    }
}

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// Owns every component, at most one per actor.
#[derive(Debug, Default)]
pub struct ComponentStore {
    allocator: HandleAllocator<ComponentId>,
    slots: Vec<Option<IndividualComponent>>,
    by_owner: HashMap<ActorId, ComponentId>,
    outbox: VecDeque<(SubscriberId, ComponentNotification)>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a component to `actor`.
    ///
    /// Returns `None` (and the new component destroys itself) if the actor is
    /// gone or already has a component.
    pub fn create(&mut self, scene: &Scene, actor: ActorId) -> Option<ComponentId> {
        if !scene.is_alive(actor) {
            error!(actor = %actor, "owner actor is not alive, self-destruction");
            return None;
        }
        if let Some(existing) = self.component_for_actor(actor) {
            error!(actor = %actor, component = %existing, "actor already has an individual component, self-destruction");
            return None;
        }
        let id = self.allocator.allocate();
        let idx = id.index() as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(IndividualComponent::new(id, actor));
        self.by_owner.insert(actor, id);
        debug!(component = %id, actor = %actor, "component created");
        Some(id)
    }

    /// Remove a component from the store. Owned individuals are not touched.
    pub(crate) fn remove(&mut self, id: ComponentId) -> Option<IndividualComponent> {
        if !self.allocator.deallocate(id) {
            return None;
        }
        let component = self.slots[id.index() as usize].take()?;
        if self.by_owner.get(&component.owner) == Some(&id) {
            self.by_owner.remove(&component.owner);
        }
        debug!(component = %id, actor = %component.owner, "component removed");
        Some(component)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.allocator.is_alive(id)
    }

    pub fn get(&self, id: ComponentId) -> Option<&IndividualComponent> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get(id.index() as usize)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: ComponentId) -> Option<&mut IndividualComponent> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get_mut(id.index() as usize)?.as_mut()
    }

    pub fn component_for_actor(&self, actor: ActorId) -> Option<ComponentId> {
        self.by_owner.get(&actor).copied().filter(|id| self.contains(*id))
    }

    pub fn len(&self) -> usize {
        self.allocator.alive_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndividualComponent> + '_ {
        self.slots.iter().flatten()
    }

    // -- subscriptions ------------------------------------------------------

    pub fn subscribe(&mut self, id: ComponentId, channel: Channel, subscriber: SubscriberId) -> bool {
        self.get_mut(id)
            .is_some_and(|c| c.observers_mut(channel).subscribe(subscriber))
    }

    pub fn unsubscribe(&mut self, id: ComponentId, channel: Channel, subscriber: SubscriberId) -> bool {
        self.get_mut(id)
            .is_some_and(|c| c.observers_mut(channel).unsubscribe(subscriber))
    }

    pub(crate) fn emit(&mut self, id: ComponentId, event: ComponentEvent) {
        let channel = match event {
            ComponentEvent::Destroyed { .. } => Channel::Destroyed,
            _ => Channel::Changes,
        };
        let Some(subscribers) = self.get(id).map(|c| c.observers(channel).subscribers().to_vec()) else {
            return;
        };
        for subscriber in subscribers {
            self.outbox.push_back((
                subscriber,
                ComponentNotification {
                    source: id,
                    event: event.clone(),
                },
            ));
        }
    }

    /// Next queued notification and its addressee, oldest first.
    pub fn pop_notification(&mut self) -> Option<(SubscriberId, ComponentNotification)> {
        self.outbox.pop_front()
    }

    /// Remove and return every queued notification addressed to `subscriber`,
    /// oldest first.
    pub fn drain_for(&mut self, subscriber: SubscriberId) -> Vec<ComponentNotification> {
        let mut drained = Vec::new();
        self.outbox.retain(|(to, notification)| {
            if *to == subscriber {
                drained.push(notification.clone());
                false
            } else {
                true
            }
        });
        drained
    }

    pub fn pending_notifications(&self) -> usize {
        self.outbox.len()
    }

    // -- state --------------------------------------------------------------

    /// Clearing init clears loaded first.
    pub(crate) fn set_is_init(&mut self, id: ComponentId, value: bool) {
        if !value {
            self.set_is_loaded(id, false);
        }
        if self.replace_flag(id, |c| &mut c.is_init, value) {
            self.emit(id, ComponentEvent::InitChanged(value));
        }
    }

    pub(crate) fn set_is_loaded(&mut self, id: ComponentId, value: bool) {
        if self.replace_flag(id, |c| &mut c.is_loaded, value) {
            self.emit(id, ComponentEvent::LoadedChanged(value));
        }
    }

    pub(crate) fn set_is_connected(&mut self, id: ComponentId, value: bool) {
        if self.replace_flag(id, |c| &mut c.is_connected, value) {
            self.emit(id, ComponentEvent::ConnectedChanged(value));
        }
    }

    /// Returns `true` if the flag changed.
    fn replace_flag(
        &mut self,
        id: ComponentId,
        flag: impl FnOnce(&mut IndividualComponent) -> &mut bool,
        value: bool,
    ) -> bool {
        match self.get_mut(id) {
            Some(c) => std::mem::replace(flag(c), value) != value,
            None => false,
        }
    }

    /// React to a notification of a subscribed individual.
    ///
    /// State changes of the component's own individual are mirrored; value
    /// changes of it or of a cached child are re-broadcast. When the
    /// individual drops its subscribers the component is disconnected and
    /// its flags are resynchronized from the individual.
    pub(crate) fn handle_individual_notification(
        &mut self,
        notification: IndividualNotification,
        individuals: &IndividualArena,
    ) {
        let IndividualNotification {
            source,
            subscriber: id,
            event,
        } = notification;
        let Some(component) = self.get(id) else {
            trace!(component = %id, "notification for a destroyed component dropped");
            return;
        };
        let is_own = component.individual == Some(source);
        let is_child = component.children.contains(&source);
        if !is_own && !is_child {
            return;
        }

        match event {
            IndividualEvent::NewValue { key, value } => self.emit(
                id,
                ComponentEvent::ValueChanged {
                    individual: source,
                    key,
                    value,
                },
            ),
            IndividualEvent::InitChanged(value) if is_own => self.set_is_init(id, value),
            IndividualEvent::LoadedChanged(value) if is_own => self.set_is_loaded(id, value),
            IndividualEvent::DelegatesCleared if is_own => {
                self.set_is_connected(id, false);
                let (init, loaded) = individuals
                    .get(source)
                    .map_or((false, false), |ind| (ind.is_init(), ind.is_loaded()));
                self.set_is_init(id, init);
                self.set_is_loaded(id, loaded);
            }
            _ => {}
        }
    }
}
