//! # Component Storage
//!
//! One storage per component type, backed by its own [`PoolAllocator`].
//!
//! The storage uses a lazy slot strategy:
//! - The slot array is index-aligned with entity index and grows on demand
//! - A slot gets a pool block the first time its entity adds the component
//! - Removing the component destructs in place but keeps the block, so a
//!   later re-add reuses the same memory
//! - Destroying the entity releases the block back to the pool
//!
//! The storage does not track generations. Whether a component is present
//! for a given [`EntityId`] is the scene's presence mask to answer.

use std::any::Any;

use tracing::info;

use super::component::{Component, ComponentVTable};
use super::entity::EntityId;
use super::mask::{ComponentMask, MAX_COMPONENTS};
use crate::error::{CoreError, CoreResult};
use crate::memory::{PoolAllocator, PoolHandle};

/// Pool-backed storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut storage: ComponentStorage<Transform> = ComponentStorage::new(256);
/// storage.add_with(entity, Transform::default());
/// storage.remove(entity); // block kept for the next add
/// ```
pub struct ComponentStorage<C: Component> {
    /// Pool block per entity index. `None` until the index first adds `C`.
    slots: Vec<Option<PoolHandle>>,
    /// Owner of every block and every constructed value.
    pool: PoolAllocator<C>,
}

impl<C: Component> ComponentStorage<C> {
    /// Creates an empty storage.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - Blocks reserved each time the pool grows
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            slots: Vec::new(),
            pool: PoolAllocator::new(chunk_size),
        }
    }

    /// Default-constructs the component for `entity`.
    ///
    /// # Panics
    ///
    /// Panics if the component is already constructed for this index.
    #[inline]
    pub fn add(&mut self, entity: EntityId) -> &mut C {
        self.add_with(entity, C::default())
    }

    /// Constructs the component for `entity` from `value`.
    ///
    /// # Panics
    ///
    /// Panics if the component is already constructed for this index.
    #[inline]
    pub fn add_with(&mut self, entity: EntityId, value: C) -> &mut C {
        let handle = self.make_valid(entity);
        self.pool.construct(handle, value)
    }

    /// Copy-constructs the component for `dst` from the one held by `src`.
    ///
    /// # Panics
    ///
    /// Panics if `src` holds no constructed component, or `dst` already does.
    pub fn add_from_entity(&mut self, dst: EntityId, src: EntityId) -> &mut C {
        let Some(value) = self.get(src).cloned() else {
            panic!("copy of `{}` from {src}, which does not have it", C::NAME);
        };
        self.add_with(dst, value)
    }

    /// Destructs the component of `entity` in place. The block is kept.
    ///
    /// Returns the destructed value, if one was constructed.
    #[inline]
    pub fn remove(&mut self, entity: EntityId) -> Option<C> {
        let handle = self.slot(entity)?;
        self.pool.destruct(handle)
    }

    /// Destructs (if needed) and hands the block of `entity` back to the pool.
    pub fn release(&mut self, entity: EntityId) -> Option<C> {
        let handle = self.slots.get_mut(entity.slot())?.take()?;
        self.pool.free(handle)
    }

    /// Gets the component of `entity`, if constructed.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&C> {
        self.pool.get(self.slot(entity)?)
    }

    /// Gets the component of `entity` mutably, if constructed.
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        let handle = self.slot(entity)?;
        self.pool.get_mut(handle)
    }

    /// Returns `true` if a value is constructed in the slot of `entity`.
    #[inline]
    #[must_use]
    pub fn is_constructed(&self, entity: EntityId) -> bool {
        self.slot(entity).is_some_and(|handle| self.pool.is_constructed(handle))
    }

    /// Returns the pool block bound to the slot of `entity`, if any.
    ///
    /// A block stays bound after [`ComponentStorage::remove`].
    #[inline]
    #[must_use]
    pub fn slot(&self, entity: EntityId) -> Option<PoolHandle> {
        self.slots.get(entity.slot()).copied().flatten()
    }

    /// Number of entity indices the slot array covers.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of constructed components.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pool.live_count()
    }

    /// Returns `true` if no component is constructed.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pool.live_count() == 0
    }

    /// Read access to the backing pool.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &PoolAllocator<C> {
        &self.pool
    }

    /// Drops every component and unbinds every slot. Pool chunks are kept.
    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.pool.clear();
    }

    /// Grows the slot array to cover `entity` and binds a block if needed.
    fn make_valid(&mut self, entity: EntityId) -> PoolHandle {
        let index = entity.slot();
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        match self.slots[index] {
            Some(handle) => handle,
            None => {
                let handle = self.pool.allocate();
                self.slots[index] = Some(handle);
                handle
            }
        }
    }
}

/// Downcasts an erased storage to `ComponentStorage<T>`.
///
/// # Panics
///
/// Panics if the storage holds another component type.
pub(crate) fn downcast_mut<T: Component>(any: &mut dyn Any) -> &mut ComponentStorage<T> {
    match any.downcast_mut::<ComponentStorage<T>>() {
        Some(storage) => storage,
        None => panic!("storage registered under id {} is not `{}`", T::ID, T::NAME),
    }
}

/// Shared-reference counterpart of [`downcast_mut`].
pub(crate) fn downcast_ref<T: Component>(any: &dyn Any) -> &ComponentStorage<T> {
    match any.downcast_ref::<ComponentStorage<T>>() {
        Some(storage) => storage,
        None => panic!("storage registered under id {} is not `{}`", T::ID, T::NAME),
    }
}

/// A registered component type: its capability record and its storage.
struct StorageEntry {
    vtable: ComponentVTable,
    storage: Box<dyn Any + Send + Sync>,
}

/// Maps dense component type ids to their capability record and storage.
pub struct ComponentRegistry {
    /// One entry per id in `0..MAX_COMPONENTS`.
    entries: Vec<Option<StorageEntry>>,
    /// Bits of every registered id.
    registered: ComponentMask,
    /// Pool chunk size handed to new storages.
    chunk_size: usize,
}

impl ComponentRegistry {
    /// Creates an empty registry whose storages grow by `chunk_size` blocks.
    ///
    /// A zero `chunk_size` makes every later registration panic.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            entries: (0..MAX_COMPONENTS).map(|_| None).collect(),
            registered: ComponentMask::empty(),
            chunk_size,
        }
    }

    /// Registers `T` under `T::ID` and creates its storage.
    ///
    /// Registering the same type twice is a no-op.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ComponentIdOutOfRange`] if `T::ID >= MAX_COMPONENTS`
    /// - [`CoreError::ComponentIdTaken`] if another type holds the id
    pub fn register<T: Component>(&mut self) -> CoreResult<()> {
        let id = usize::from(T::ID);
        if id >= MAX_COMPONENTS {
            return Err(CoreError::ComponentIdOutOfRange {
                id: T::ID,
                name: T::NAME,
            });
        }

        if let Some(existing) = &self.entries[id] {
            if existing.storage.is::<ComponentStorage<T>>() {
                return Ok(());
            }
            return Err(CoreError::ComponentIdTaken {
                id: T::ID,
                existing: existing.vtable.name,
                requested: T::NAME,
            });
        }

        let vtable = ComponentVTable::of::<T>();
        let storage = (vtable.new_storage)(self.chunk_size);
        self.entries[id] = Some(StorageEntry { vtable, storage });
        self.registered.insert(T::ID);

        info!(id = T::ID, name = T::NAME, size = vtable.size, "registered component type");
        Ok(())
    }

    /// Returns `true` if a type is registered under `id`.
    #[inline]
    #[must_use]
    pub fn is_registered(&self, id: u8) -> bool {
        self.registered.has(id)
    }

    /// Mask of every registered id.
    #[inline]
    #[must_use]
    pub const fn registered(&self) -> ComponentMask {
        self.registered
    }

    /// Blocks reserved each time a storage's pool grows.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Looks up a registered type id by its name.
    #[must_use]
    pub fn id_by_name(&self, name: &str) -> Option<u8> {
        self.entries
            .iter()
            .flatten()
            .find(|entry| entry.vtable.name == name)
            .map(|entry| entry.vtable.id)
    }

    /// Typed storage of `T`, if registered.
    #[must_use]
    pub fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        let entry = self.entries.get(usize::from(T::ID))?.as_ref()?;
        Some(downcast_ref::<T>(entry.storage.as_ref()))
    }

    /// Typed mutable storage of `T`, if registered.
    pub fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        let entry = self.entries.get_mut(usize::from(T::ID))?.as_mut()?;
        Some(downcast_mut::<T>(entry.storage.as_mut()))
    }

    /// Default-constructs component `id` for `entity` through the vtable.
    pub fn construct(&mut self, id: u8, entity: EntityId) {
        let entry = self.entry_mut(id);
        (entry.vtable.construct)(entry.storage.as_mut(), entity);
    }

    /// Copy-constructs component `id` of `dst` from `src` through the vtable.
    pub fn construct_from(&mut self, id: u8, dst: EntityId, src: EntityId) {
        let entry = self.entry_mut(id);
        (entry.vtable.construct_from)(entry.storage.as_mut(), dst, src);
    }

    /// Destructs component `id` of `entity` in place through the vtable.
    pub fn destruct(&mut self, id: u8, entity: EntityId) {
        let entry = self.entry_mut(id);
        (entry.vtable.destruct)(entry.storage.as_mut(), entity);
    }

    /// Destructs and releases every block bound to `entity`, in every storage.
    ///
    /// Covers blocks kept alive by a previous remove, not only present
    /// components.
    pub fn release_all(&mut self, entity: EntityId) {
        for entry in self.entries.iter_mut().flatten() {
            (entry.vtable.release)(entry.storage.as_mut(), entity);
        }
    }

    /// Iterates the capability records of every registered type.
    pub fn vtables(&self) -> impl Iterator<Item = &ComponentVTable> {
        self.entries.iter().flatten().map(|entry| &entry.vtable)
    }

    /// Entry for `id`.
    ///
    /// # Panics
    ///
    /// Panics if no type is registered under `id`.
    fn entry_mut(&mut self, id: u8) -> &mut StorageEntry {
        match self.entries.get_mut(usize::from(id)).and_then(Option::as_mut) {
            Some(entry) => entry,
            None => panic!("component id {id} is not registered"),
        }
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("registered", &self.vtables().map(|v| v.name).collect::<Vec<_>>())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
