//! # Entity Caches
//!
//! A cache is a persistent, sorted list of the active entities whose
//! component mask (and event marker, if any) satisfies its filter.
//!
//! Caches are maintained from lifecycle transitions only: each tick they
//! look at the entities of the applied transition batch and nothing else.
//! The cost of keeping a cache current is proportional to the batch size,
//! not to the number of live entities.
//!
//! A cache is used in one of two ways:
//! - registered with the scene, which updates it during its own tick pass
//! - standalone, owned by a system that calls [`EntityCache::update`] once
//!   per tick before iterating

use tracing::{debug, warn};

use super::component::Component;
use super::entity::EntityId;
use super::mask::{ComponentMask, EventMask, MembershipSet};
use super::scene::Scene;

/// Handle of a cache registered with a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheId(pub(crate) usize);

impl CacheId {
    /// Registration slot, also the entity's membership bit for this cache.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> usize {
        self.0
    }
}

/// What an entity must carry to be a member of a cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CacheFilter {
    /// Required components.
    components: ComponentMask,
    /// Required event kinds, checked only on entities carrying an event marker.
    events: EventMask,
}

impl CacheFilter {
    /// A filter matching every active entity.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            components: ComponentMask::empty(),
            events: EventMask::empty(),
        }
    }

    /// Requires component `T`.
    #[must_use]
    pub const fn require<T: Component>(self) -> Self {
        self.require_id(T::ID)
    }

    /// Requires the component type with id `id`.
    #[must_use]
    pub const fn require_id(mut self, id: u8) -> Self {
        self.components = self.components.with(id);
        self
    }

    /// Requires event kind `kind` on entities carrying an event marker.
    #[must_use]
    pub const fn require_event(mut self, kind: u8) -> Self {
        self.events = self.events.with(kind);
        self
    }

    /// Required component mask.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> ComponentMask {
        self.components
    }

    /// Required event mask.
    #[inline]
    #[must_use]
    pub const fn events(&self) -> EventMask {
        self.events
    }

    /// Evaluates the filter.
    ///
    /// # Arguments
    ///
    /// * `mask` - The entity's component presence mask
    /// * `event` - The entity's event kinds, if it carries an event marker
    #[inline]
    #[must_use]
    pub const fn matches(&self, mask: ComponentMask, event: Option<EventMask>) -> bool {
        if !mask.contains_all(self.components) {
            return false;
        }
        match event {
            Some(kinds) => kinds.contains_all(self.events),
            None => true,
        }
    }
}

/// Counters describing the work a cache has done.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Filter evaluations during the most recent update.
    pub evaluated: u64,
    /// Filter evaluations since creation.
    pub evaluated_total: u64,
    /// Entities added since creation.
    pub added: u64,
    /// Entities removed since creation.
    pub removed: u64,
    /// Re-sorts performed since creation.
    pub sorts: u64,
    /// Full rebuilds performed since creation.
    pub rebuilds: u64,
}

/// Membership observer.
type Observer = Box<dyn FnMut(EntityId) + Send>;

/// A live, sorted view of the active entities matching a [`CacheFilter`].
pub struct EntityCache {
    filter: CacheFilter,
    /// Members, sorted by index at the end of every update.
    entities: Vec<EntityId>,
    /// Membership by entity index, in agreement with `entities` after an update.
    contains: MembershipSet,
    on_add: Option<Observer>,
    on_remove: Option<Observer>,
    /// Last scene tick this cache consumed.
    last_tick: u64,
    /// Scene clear epoch the members belong to.
    epoch: u64,
    /// Membership changed since the last sort.
    dirty: bool,
    stats: CacheStats,
}

impl EntityCache {
    /// Creates an empty cache for `filter`.
    #[must_use]
    pub fn new(filter: CacheFilter) -> Self {
        Self {
            filter,
            entities: Vec::new(),
            contains: MembershipSet::new(),
            on_add: None,
            on_remove: None,
            last_tick: 0,
            epoch: 0,
            dirty: false,
            stats: CacheStats::default(),
        }
    }

    /// The cache's filter.
    #[inline]
    #[must_use]
    pub const fn filter(&self) -> &CacheFilter {
        &self.filter
    }

    /// Members in ascending index order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Members as raw bytes, for handing to a batch renderer.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entities)
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the cache has no member.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns `true` if `entity` (index and generation) is a member.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        if !self.contains.contains(entity.slot()) {
            return false;
        }
        if self.dirty {
            self.entities.contains(&entity)
        } else {
            self.entities
                .binary_search_by_key(&entity.index, |e| e.index)
                .is_ok_and(|pos| self.entities[pos] == entity)
        }
    }

    /// Work counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Last scene tick this cache consumed.
    #[inline]
    #[must_use]
    pub const fn last_tick(&self) -> u64 {
        self.last_tick
    }

    /// Sets the observer called after an entity joins the cache.
    pub fn set_on_add(&mut self, observer: impl FnMut(EntityId) + Send + 'static) {
        self.on_add = Some(Box::new(observer));
    }

    /// Sets the observer called before an entity leaves the cache.
    pub fn set_on_remove(&mut self, observer: impl FnMut(EntityId) + Send + 'static) {
        self.on_remove = Some(Box::new(observer));
    }

    /// Catches up with the transitions the scene applied in its last tick.
    ///
    /// Only the entities of that batch are evaluated. If this cache missed a
    /// tick (or never ran against this scene) it rebuilds from a full scan
    /// instead. If the scene was cleared since the last update, every member
    /// is dropped without observers before the rebuild.
    pub fn update(&mut self, scene: &Scene) {
        let batch = scene.applied_transitions();
        let tick = batch.tick();
        if tick == 0 {
            return;
        }
        if batch.epoch() != self.epoch {
            debug!(
                epoch = batch.epoch(),
                dropped = self.entities.len(),
                "scene was cleared, rebuilding entity cache"
            );
            self.reset();
            self.rebuild(scene);
            return;
        }
        if tick <= self.last_tick {
            return;
        }
        if tick != self.last_tick + 1 {
            if self.last_tick != 0 {
                warn!(
                    last = self.last_tick,
                    now = tick,
                    "entity cache missed scene ticks, rebuilding"
                );
            }
            self.rebuild(scene);
            return;
        }

        self.last_tick = tick;
        self.stats.evaluated = 0;

        for &entity in batch.activated().iter().chain(batch.changed()) {
            if !scene.is_entity_active(entity) {
                continue;
            }
            self.contains.ensure_index(entity.slot());
            let matches = self.evaluate(scene.component_mask(entity), scene.event_mask(entity));
            if matches {
                self.add_entity(entity);
            } else {
                self.remove_entity(entity);
            }
        }

        for &entity in batch.deactivated() {
            self.contains.ensure_index(entity.slot());
            self.remove_entity(entity);
        }

        self.sort_if_dirty();
    }

    /// Recomputes membership from every active entity of `scene`.
    pub fn rebuild(&mut self, scene: &Scene) {
        self.stats.evaluated = 0;
        self.stats.rebuilds += 1;

        let stale: Vec<EntityId> = self
            .entities
            .iter()
            .copied()
            .filter(|&e| {
                !scene.is_entity_active(e)
                    || !self.filter.matches(scene.component_mask(e), scene.event_mask(e))
            })
            .collect();
        for entity in stale {
            self.remove_entity(entity);
        }

        for entity in scene.active_entities() {
            if self.evaluate(scene.component_mask(entity), scene.event_mask(entity)) {
                self.add_entity(entity);
            }
        }

        self.last_tick = scene.tick();
        self.epoch = scene.epoch();
        self.sort_if_dirty();
        debug!(members = self.entities.len(), "entity cache rebuilt");
    }

    /// Adds `entity` if its index is not already a member.
    ///
    /// The add observer runs after membership is recorded. Returns `true` if
    /// the entity was added.
    pub fn add_entity(&mut self, entity: EntityId) -> bool {
        if !self.contains.insert(entity.slot()) {
            return false;
        }
        self.entities.push(entity);
        self.dirty = true;
        self.stats.added += 1;

        if let Some(on_add) = self.on_add.as_mut() {
            on_add(entity);
        }
        true
    }

    /// Removes the member at `entity`'s index, if any. Order of the other
    /// members is kept.
    ///
    /// The remove observer runs before membership is cleared. Returns `true`
    /// if an entity was removed.
    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        if !self.contains.contains(entity.slot()) {
            return false;
        }

        if let Some(on_remove) = self.on_remove.as_mut() {
            on_remove(entity);
        }

        if let Some(pos) = self.entities.iter().position(|e| e.index == entity.index) {
            self.entities.remove(pos);
        }
        self.contains.remove(entity.slot());
        self.stats.removed += 1;
        true
    }

    /// Sorts members by ascending index.
    pub fn sort(&mut self) {
        self.entities.sort_unstable_by_key(|e| e.index);
        self.dirty = false;
        self.stats.sorts += 1;
    }

    /// Sorts if membership changed since the last sort.
    pub(crate) fn sort_if_dirty(&mut self) {
        if self.dirty {
            self.sort();
        }
    }

    /// Evaluates the filter and counts the evaluation.
    pub(crate) fn evaluate(&mut self, mask: ComponentMask, event: Option<EventMask>) -> bool {
        self.stats.evaluated += 1;
        self.stats.evaluated_total += 1;
        self.filter.matches(mask, event)
    }

    /// Starts a new counting window for a scene-driven pass.
    pub(crate) fn begin_pass(&mut self, tick: u64) {
        self.stats.evaluated = 0;
        self.last_tick = tick;
    }

    /// Drops every member without calling observers.
    pub(crate) fn reset(&mut self) {
        self.entities.clear();
        self.contains.clear();
        self.dirty = false;
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("filter", &self.filter)
            .field("len", &self.entities.len())
            .field("last_tick", &self.last_tick)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
