//! # Scene
//!
//! The coordinator. Owns entity identity, component storage and the
//! registered caches, and applies queued lifecycle transitions once per tick.
//!
//! ## Tick pass
//!
//! ```text
//! update()
//!   ├─ rotate the transition ring (pending -> applied)
//!   ├─ 1. activations (+ changed masks): set active, re-evaluate caches
//!   ├─ 2. re-sort caches whose membership grew
//!   ├─ 3. deactivations: clear active, evict from every cache
//!   └─ 4. kills: release components, bump generation, free the index
//! ```
//!
//! Component add/remove is synchronous. On an active entity it also queues a
//! re-evaluation, so cache membership is never stale past the next tick.

use std::collections::VecDeque;

use tracing::{debug, info, trace, warn};

use super::cache::{CacheFilter, CacheId, EntityCache};
use super::component::{Component, EventComponent, EVENT_COMPONENT_ID};
use super::entity::{EntityAttributes, EntityFlags, EntityId, EntityState};
use super::events::{EventSink, NullSink, SceneEvent};
use super::mask::{ComponentMask, EventMask, MembershipSet, MAX_CACHES};
use super::storage::{ComponentRegistry, ComponentStorage};
use super::transition::{TransitionBatch, TransitionRing};
use crate::config::SceneConfig;
use crate::error::{CoreError, CoreResult};

/// Entity registry, component storage and cache coordinator.
///
/// # Example
///
/// ```rust,ignore
/// let mut scene = Scene::new(SceneConfig::default())?;
/// scene.register_component::<Transform>()?;
/// let visible = scene.register_cache(CacheFilter::new().require::<Transform>())?;
///
/// let e = scene.create_entity(0);
/// scene.add_component(e, Transform::default());
/// scene.activate_entity(e);
/// scene.update();
///
/// assert_eq!(scene.cache(visible).entities(), &[e]);
/// ```
pub struct Scene {
    config: SceneConfig,
    /// Current generation per index. Never shrinks.
    generations: Vec<u32>,
    /// Bookkeeping per index.
    attributes: Vec<EntityAttributes>,
    /// Indices waiting for reuse, oldest first.
    free: VecDeque<u32>,
    registry: ComponentRegistry,
    caches: Vec<EntityCache>,
    ring: TransitionRing,
    /// Indices deactivated in the tick being applied. Scratch, empty between
    /// ticks.
    leaving: MembershipSet,
    sink: Box<dyn EventSink>,
    /// `false` between `disable()` and `enable()`.
    caches_enabled: bool,
    alive_count: usize,
}

impl Scene {
    /// Creates an empty scene that discards lifecycle events.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: SceneConfig) -> CoreResult<Self> {
        Self::with_sink(config, Box::new(NullSink))
    }

    /// Creates an empty scene that reports lifecycle events to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the configuration is invalid.
    pub fn with_sink(config: SceneConfig, sink: Box<dyn EventSink>) -> CoreResult<Self> {
        let registry = ComponentRegistry::new(config.pool_chunk_size);
        Self::with_parts(config, registry, sink)
    }

    /// Creates an empty scene from its collaborators: the component registry
    /// (which owns every pool allocator) and the event sink.
    ///
    /// Types already registered in `registry` are kept, so a caller may set
    /// its own pool chunk size and pre-register components.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidConfig`] if the configuration is invalid
    /// - [`CoreError::ComponentIdTaken`] if `registry` holds another type
    ///   under the event marker's id
    pub fn with_parts(
        config: SceneConfig,
        mut registry: ComponentRegistry,
        sink: Box<dyn EventSink>,
    ) -> CoreResult<Self> {
        config.validate()?;
        registry.register::<EventComponent>()?;

        let capacity = config.initial_entity_capacity;
        info!(
            reuse_threshold = config.reuse_threshold,
            pool_chunk_size = registry.chunk_size(),
            capacity,
            "scene created"
        );

        Ok(Self {
            generations: Vec::with_capacity(capacity),
            attributes: Vec::with_capacity(capacity),
            free: VecDeque::new(),
            registry,
            caches: Vec::new(),
            ring: TransitionRing::new(),
            leaving: MembershipSet::new(),
            sink,
            caches_enabled: true,
            alive_count: 0,
            config,
        })
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Registers component type `T` and creates its storage.
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::register`].
    pub fn register_component<T: Component>(&mut self) -> CoreResult<()> {
        self.registry.register::<T>()
    }

    /// Registers a cache for `filter`, populated from the active entities.
    ///
    /// # Errors
    ///
    /// - [`CoreError::UnregisteredFilterComponent`] if the filter requires an
    ///   unregistered component type
    /// - [`CoreError::CacheLimitReached`] if `MAX_CACHES` caches exist
    pub fn register_cache(&mut self, filter: CacheFilter) -> CoreResult<CacheId> {
        self.register_cache_with(EntityCache::new(filter))
    }

    /// Registers a prepared cache, e.g. one with observers already installed.
    ///
    /// Existing members of `cache` are dropped; it is populated from the
    /// scene's active entities, calling its add observer for each.
    ///
    /// # Errors
    ///
    /// Same as [`Scene::register_cache`].
    pub fn register_cache_with(&mut self, mut cache: EntityCache) -> CoreResult<CacheId> {
        if self.caches.len() >= MAX_CACHES {
            return Err(CoreError::CacheLimitReached(self.caches.len()));
        }
        let required = cache.filter().components();
        let registered = self.registry.registered();
        if let Some(missing) = required.iter().find(|&id| !registered.has(id)) {
            return Err(CoreError::UnregisteredFilterComponent(missing));
        }

        let id = CacheId(self.caches.len());
        cache.reset();
        cache.begin_pass(self.ring.tick());

        for slot in 0..self.attributes.len() {
            let attrs = self.attributes[slot];
            if !attrs.alive || !attrs.is_active() {
                continue;
            }
            let entity = self.id_at(slot);
            let event = self.event_mask(entity);
            if cache.evaluate(attrs.component_mask, event) {
                self.attributes[slot].caches.insert(id.slot());
                if self.caches_enabled {
                    cache.add_entity(entity);
                }
            }
        }
        cache.sort_if_dirty();

        info!(
            cache = id.slot(),
            required = required.bits(),
            events = cache.filter().events().bits(),
            members = cache.len(),
            "registered entity cache"
        );
        self.caches.push(cache);
        Ok(id)
    }

    /// A registered cache.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not returned by this scene.
    #[inline]
    #[must_use]
    pub fn cache(&self, id: CacheId) -> &EntityCache {
        &self.caches[id.slot()]
    }

    /// Mutable access to a registered cache, for installing observers.
    ///
    /// Adding or removing members by hand desynchronizes the cache from the
    /// scene's membership bits.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not returned by this scene.
    #[inline]
    pub fn cache_mut(&mut self, id: CacheId) -> &mut EntityCache {
        &mut self.caches[id.slot()]
    }

    /// Number of registered caches.
    #[inline]
    #[must_use]
    pub fn cache_count(&self) -> usize {
        self.caches.len()
    }

    // =========================================================================
    // LIFECYCLE INTENTS
    // =========================================================================

    /// Creates an inactive entity on `layer`.
    ///
    /// A freed index is reused only when more than `reuse_threshold` indices
    /// wait in the free queue; otherwise a new index is allocated.
    ///
    /// # Panics
    ///
    /// Panics if the `u32` index space is exhausted.
    pub fn create_entity(&mut self, layer: u8) -> EntityId {
        let recycled = if self.free.len() > self.config.reuse_threshold {
            self.free.pop_front()
        } else {
            None
        };

        let entity = match recycled {
            Some(index) => EntityId::new(index, self.generations[index as usize]),
            None => {
                let Ok(index) = u32::try_from(self.generations.len()) else {
                    panic!("entity index space exhausted");
                };
                self.generations.push(0);
                self.attributes.push(EntityAttributes::default());
                EntityId::new(index, 0)
            }
        };

        self.attributes[entity.slot()] = EntityAttributes::spawned(layer);
        self.alive_count += 1;

        trace!(%entity, layer, recycled = recycled.is_some(), "entity created");
        self.sink.emit(SceneEvent::Created { entity, layer });
        entity
    }

    /// Queues `entity` for destruction at the next tick.
    ///
    /// Returns `false` (and queues nothing) if the id is stale or the entity
    /// is already queued for destruction.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if !self.is_alive(entity) {
            warn!(%entity, "destroy of a stale entity id ignored");
            return false;
        }
        let attrs = &mut self.attributes[entity.slot()];
        if attrs.is_pending_kill() {
            warn!(%entity, "entity already queued for destruction");
            return false;
        }

        attrs.flags.insert(EntityFlags::PENDING_KILL);
        self.ring.pending_mut().kill(entity);
        trace!(%entity, "destroy queued");
        true
    }

    /// Queues `entity` for activation at the next tick.
    ///
    /// Returns `false` if the id is stale or the entity is being destroyed.
    pub fn activate_entity(&mut self, entity: EntityId) -> bool {
        if !self.accepts_intent(entity, "activate") {
            return false;
        }
        self.ring.pending_mut().activate(entity);
        trace!(%entity, "activation queued");
        true
    }

    /// Queues `entity` for deactivation at the next tick.
    ///
    /// Returns `false` if the id is stale or the entity is being destroyed.
    pub fn deactivate_entity(&mut self, entity: EntityId) -> bool {
        if !self.accepts_intent(entity, "deactivate") {
            return false;
        }
        self.ring.pending_mut().deactivate(entity);
        trace!(%entity, "deactivation queued");
        true
    }

    fn accepts_intent(&self, entity: EntityId, intent: &'static str) -> bool {
        if !self.is_alive(entity) {
            warn!(%entity, intent, "intent on a stale entity id ignored");
            return false;
        }
        if self.attributes[entity.slot()].is_pending_kill() {
            warn!(%entity, intent, "intent on an entity queued for destruction ignored");
            return false;
        }
        true
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Applies every transition queued since the last tick.
    ///
    /// Activations are applied before deactivations, deactivations before
    /// kills. Pending-kill entities are never activated.
    pub fn update(&mut self) {
        let tick = self.ring.rotate();
        let batch = std::mem::take(self.ring.applied_mut());

        debug!(
            tick,
            activated = batch.activated().len(),
            deactivated = batch.deactivated().len(),
            killed = batch.killed().len(),
            changed = batch.changed().len(),
            "applying transitions"
        );

        for cache in &mut self.caches {
            cache.begin_pass(tick);
        }

        // 1. Activations, then mask changes on already-active entities.
        for &entity in batch.activated() {
            if !self.is_alive(entity) {
                continue;
            }
            let attrs = &mut self.attributes[entity.slot()];
            if attrs.is_pending_kill() {
                continue;
            }
            let was_active = attrs.is_active();
            attrs.flags.insert(EntityFlags::ACTIVE);
            self.refresh_membership(entity);
            if !was_active {
                trace!(%entity, "entity activated");
                self.sink.emit(SceneEvent::Activated(entity));
            }
        }
        // Entities leaving this tick are not re-added just to be evicted.
        if !batch.changed().is_empty() {
            for &entity in batch.deactivated() {
                if self.is_alive(entity) {
                    self.leaving.insert(entity.slot());
                }
            }
        }
        for &entity in batch.changed() {
            if !self.is_alive(entity) || self.leaving.contains(entity.slot()) {
                continue;
            }
            let attrs = self.attributes[entity.slot()];
            if attrs.is_active() && !attrs.is_pending_kill() {
                self.refresh_membership(entity);
            }
        }
        if !self.leaving.is_empty() {
            for &entity in batch.deactivated() {
                self.leaving.remove(entity.slot());
            }
        }

        // 2. Sort caches that gained members.
        if self.caches_enabled {
            for cache in &mut self.caches {
                cache.sort_if_dirty();
            }
        }

        // 3. Deactivations evict from every cache, whatever the filter says.
        for &entity in batch.deactivated() {
            if !self.is_alive(entity) {
                continue;
            }
            let attrs = &mut self.attributes[entity.slot()];
            let was_active = attrs.is_active();
            attrs.flags.remove(EntityFlags::ACTIVE);
            for (slot, cache) in self.caches.iter_mut().enumerate() {
                if attrs.caches.has(slot) {
                    attrs.caches.remove(slot);
                    if self.caches_enabled {
                        cache.remove_entity(entity);
                    }
                }
            }
            if was_active {
                trace!(%entity, "entity deactivated");
                self.sink.emit(SceneEvent::Deactivated(entity));
            }
        }

        // 4. Kills.
        for &entity in batch.killed() {
            if self.is_alive(entity) {
                self.reclaim(entity);
            }
        }

        *self.ring.applied_mut() = batch;
    }

    /// Re-evaluates every cache filter for an active entity and fixes its
    /// membership bits and, while enabled, the cache lists.
    fn refresh_membership(&mut self, entity: EntityId) {
        let slot = entity.slot();
        let mask = self.attributes[slot].component_mask;
        let event = self.event_mask(entity);
        let enabled = self.caches_enabled;
        let attrs = &mut self.attributes[slot];

        for (cache_slot, cache) in self.caches.iter_mut().enumerate() {
            let matches = cache.evaluate(mask, event);
            let member = attrs.caches.has(cache_slot);
            if matches && !member {
                attrs.caches.insert(cache_slot);
                if enabled {
                    cache.add_entity(entity);
                }
            } else if !matches && member {
                attrs.caches.remove(cache_slot);
                if enabled {
                    cache.remove_entity(entity);
                }
            }
        }
    }

    /// Tears an entity down and frees its index.
    fn reclaim(&mut self, entity: EntityId) {
        let slot = entity.slot();
        self.registry.release_all(entity);
        self.attributes[slot] = EntityAttributes::default();
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push_back(entity.index);
        self.alive_count -= 1;

        trace!(%entity, "entity destroyed");
        self.sink.emit(SceneEvent::Destroyed(entity));
    }

    /// Re-adds every active entity to the caches its membership bits name,
    /// then sorts. No-op if already enabled.
    pub fn enable(&mut self) {
        if self.caches_enabled {
            return;
        }
        self.caches_enabled = true;

        for slot in 0..self.attributes.len() {
            let attrs = self.attributes[slot];
            if !attrs.alive || !attrs.is_active() || attrs.caches.is_empty() {
                continue;
            }
            let entity = self.id_at(slot);
            for (cache_slot, cache) in self.caches.iter_mut().enumerate() {
                if attrs.caches.has(cache_slot) {
                    cache.add_entity(entity);
                }
            }
        }
        for cache in &mut self.caches {
            cache.sort_if_dirty();
        }
        info!("scene caches enabled");
    }

    /// Empties every cache list while keeping each entity's membership bits
    /// and active flag. No-op if already disabled.
    pub fn disable(&mut self) {
        if !self.caches_enabled {
            return;
        }
        self.caches_enabled = false;

        for cache in &mut self.caches {
            let members = cache.entities().to_vec();
            for entity in members {
                cache.remove_entity(entity);
            }
        }
        info!("scene caches disabled");
    }

    /// Returns `true` unless the caches are disabled.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.caches_enabled
    }

    /// Destroys every entity immediately and resets identity state.
    ///
    /// Generations and the free queue start over, so ids handed out before
    /// the clear must not be kept. Registered types and caches stay
    /// registered, with empty membership. Standalone caches start over at
    /// their next [`EntityCache::update`].
    pub fn clear(&mut self) {
        for slot in 0..self.attributes.len() {
            if self.attributes[slot].alive {
                let entity = self.id_at(slot);
                self.registry.release_all(entity);
            }
        }
        self.generations.clear();
        self.attributes.clear();
        self.free.clear();
        self.ring.clear();
        for cache in &mut self.caches {
            cache.reset();
        }
        info!(destroyed = self.alive_count, "scene cleared");
        self.alive_count = 0;
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Returns `true` if `entity` names a live entity (including one queued
    /// for destruction this tick).
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.generations.get(entity.slot()) == Some(&entity.generation)
            && self.attributes[entity.slot()].alive
    }

    /// Returns `true` if `entity` is live and active.
    #[inline]
    #[must_use]
    pub fn is_entity_active(&self, entity: EntityId) -> bool {
        self.is_alive(entity) && self.attributes[entity.slot()].is_active()
    }

    /// Lifecycle state of `entity`. Stale ids are [`EntityState::Free`].
    #[must_use]
    pub fn entity_state(&self, entity: EntityId) -> EntityState {
        if self.is_alive(entity) {
            self.attributes[entity.slot()].state()
        } else {
            EntityState::Free
        }
    }

    /// Layer `entity` was created on, if it is live.
    #[must_use]
    pub fn entity_layer(&self, entity: EntityId) -> Option<u8> {
        self.is_alive(entity)
            .then(|| self.attributes[entity.slot()].layer)
    }

    /// Bookkeeping of a live entity.
    #[must_use]
    pub fn attributes(&self, entity: EntityId) -> Option<&EntityAttributes> {
        self.is_alive(entity)
            .then(|| &self.attributes[entity.slot()])
    }

    /// Component presence mask of `entity`; empty for stale ids.
    #[inline]
    #[must_use]
    pub fn component_mask(&self, entity: EntityId) -> ComponentMask {
        if self.is_alive(entity) {
            self.attributes[entity.slot()].component_mask
        } else {
            ComponentMask::empty()
        }
    }

    /// Event kinds of `entity`, if it carries an [`EventComponent`].
    #[must_use]
    pub fn event_mask(&self, entity: EntityId) -> Option<EventMask> {
        if !self.component_mask(entity).has(EVENT_COMPONENT_ID) {
            return None;
        }
        self.registry
            .storage::<EventComponent>()
            .and_then(|storage| storage.get(entity))
            .map(|marker| marker.filter)
    }

    /// Iterates every live, active entity in ascending index order.
    pub fn active_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(_, attrs)| attrs.alive && attrs.is_active())
            .map(|(slot, _)| self.id_at(slot))
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Number of freed indices waiting for reuse.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of ticks applied so far.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.ring.tick()
    }

    /// Number of [`Scene::clear`] calls so far.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.ring.epoch()
    }

    /// The batch the last [`Scene::update`] applied.
    #[inline]
    #[must_use]
    pub fn applied_transitions(&self) -> &TransitionBatch {
        self.ring.applied()
    }

    /// Transitions queued for the next [`Scene::update`].
    #[inline]
    #[must_use]
    pub fn pending_transitions(&self) -> &TransitionBatch {
        self.ring.pending()
    }

    /// The component registry.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Looks up a registered component type id by name.
    #[must_use]
    pub fn component_id_by_name(&self, name: &str) -> Option<u8> {
        self.registry.id_by_name(name)
    }

    /// The scene configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SceneConfig {
        &self.config
    }

    // =========================================================================
    // COMPONENTS
    // =========================================================================

    /// Attaches `value` to `entity`. Takes effect immediately.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not alive, already has `T`, or `T` is not
    /// registered.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, value: T) -> &mut T {
        self.assert_alive(entity);
        assert!(
            self.registry.storage::<T>().is_some(),
            "component `{}` is not registered",
            T::NAME
        );
        let attrs = &mut self.attributes[entity.slot()];
        assert!(
            !attrs.component_mask.has(T::ID),
            "{entity} already has component `{}`",
            T::NAME
        );
        attrs.component_mask.insert(T::ID);
        self.mark_changed(entity);

        self.typed_storage_mut::<T>().add_with(entity, value)
    }

    /// Attaches a default-constructed `T` to `entity`.
    ///
    /// # Panics
    ///
    /// Same as [`Scene::add_component`].
    #[inline]
    pub fn add_default_component<T: Component>(&mut self, entity: EntityId) -> &mut T {
        self.add_component(entity, T::default())
    }

    /// Attaches a copy of `source` to `entity`.
    ///
    /// # Panics
    ///
    /// Same as [`Scene::add_component`].
    #[inline]
    pub fn add_component_copy<T: Component>(&mut self, entity: EntityId, source: &T) -> &mut T {
        self.add_component(entity, source.clone())
    }

    /// Detaches `T` from `entity` and returns it. The storage block is kept
    /// for a later re-add.
    ///
    /// Returns `None` if the id is stale or the entity has no `T`.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Option<T> {
        if !self.is_alive(entity) {
            warn!(%entity, component = T::NAME, "remove on a stale entity id ignored");
            return None;
        }
        let attrs = &mut self.attributes[entity.slot()];
        if !attrs.component_mask.has(T::ID) {
            return None;
        }
        attrs.component_mask.remove(T::ID);
        self.mark_changed(entity);

        self.typed_storage_mut::<T>().remove(entity)
    }

    /// Copy-constructs component `component_id` of `dst` from `src`.
    ///
    /// # Panics
    ///
    /// Panics if either entity is not alive, `src` lacks the component or
    /// `dst` already has it.
    pub fn copy_component(&mut self, component_id: u8, src: EntityId, dst: EntityId) {
        self.assert_alive(src);
        self.assert_alive(dst);
        assert!(
            self.attributes[src.slot()].component_mask.has(component_id),
            "{src} has no component {component_id} to copy"
        );
        assert!(
            !self.attributes[dst.slot()].component_mask.has(component_id),
            "{dst} already has component {component_id}"
        );

        self.registry.construct_from(component_id, dst, src);
        self.attributes[dst.slot()].component_mask.insert(component_id);
        self.mark_changed(dst);
    }

    /// Default-constructs component `component_id` on `entity`, for callers
    /// that only know the type by id (see [`Scene::component_id_by_name`]).
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not alive, no type is registered under
    /// `component_id`, or the entity already has it.
    pub fn add_component_by_id(&mut self, component_id: u8, entity: EntityId) {
        self.assert_alive(entity);
        assert!(
            !self.attributes[entity.slot()].component_mask.has(component_id),
            "{entity} already has component {component_id}"
        );

        self.registry.construct(component_id, entity);
        self.attributes[entity.slot()].component_mask.insert(component_id);
        self.mark_changed(entity);
    }

    /// Destructs component `component_id` of `entity` in place. The storage
    /// block is kept for a later re-add.
    ///
    /// Returns `false` if the id is stale or the entity has no such
    /// component.
    pub fn remove_component_by_id(&mut self, component_id: u8, entity: EntityId) -> bool {
        if !self.is_alive(entity) {
            warn!(%entity, component_id, "remove on a stale entity id ignored");
            return false;
        }
        let attrs = &mut self.attributes[entity.slot()];
        if !attrs.component_mask.has(component_id) {
            return false;
        }
        attrs.component_mask.remove(component_id);
        self.registry.destruct(component_id, entity);
        self.mark_changed(entity);
        true
    }

    /// Creates an inactive entity on `layer` carrying a copy of every
    /// component of `src`.
    ///
    /// # Panics
    ///
    /// Panics if `src` is not alive.
    pub fn clone_entity(&mut self, src: EntityId, layer: u8) -> EntityId {
        self.assert_alive(src);
        let mask = self.attributes[src.slot()].component_mask;
        let dst = self.create_entity(layer);
        for component_id in mask.iter() {
            self.copy_component(component_id, src, dst);
        }
        dst
    }

    /// Gets the `T` of `entity`, if present.
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        if !self.has_component::<T>(entity) {
            return None;
        }
        self.registry.storage::<T>()?.get(entity)
    }

    /// Gets the `T` of `entity` mutably, if present.
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        if !self.has_component::<T>(entity) {
            return None;
        }
        self.registry.storage_mut::<T>()?.get_mut(entity)
    }

    /// Returns `true` if `entity` is alive and has `T`.
    #[inline]
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.component_mask(entity).has(T::ID)
    }

    /// Typed storage of `T`, if registered.
    ///
    /// The storage does not know about generations or presence; check
    /// [`Scene::has_component`] before trusting a slot.
    #[must_use]
    pub fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.registry.storage::<T>()
    }

    /// Queues a cache re-evaluation if `entity` is active and staying alive.
    fn mark_changed(&mut self, entity: EntityId) {
        let attrs = self.attributes[entity.slot()];
        if attrs.is_active() && !attrs.is_pending_kill() {
            self.ring.pending_mut().mark_changed(entity);
        }
    }

    fn typed_storage_mut<T: Component>(&mut self) -> &mut ComponentStorage<T> {
        match self.registry.storage_mut::<T>() {
            Some(storage) => storage,
            None => panic!("component `{}` is not registered", T::NAME),
        }
    }

    fn assert_alive(&self, entity: EntityId) {
        assert!(self.is_alive(entity), "{entity} is not alive");
    }

    /// Current id of the entity at `slot`.
    #[allow(clippy::cast_possible_truncation)]
    fn id_at(&self, slot: usize) -> EntityId {
        // slots are created from u32 indices
        EntityId::new(slot as u32, self.generations[slot])
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("tick", &self.ring.tick())
            .field("alive", &self.alive_count)
            .field("free", &self.free.len())
            .field("caches", &self.caches.len())
            .field("enabled", &self.caches_enabled)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
