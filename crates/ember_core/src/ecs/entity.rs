//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into every per-entity array
//! - A generation counter for safe reuse
//!
//! Per-index bookkeeping lives in [`EntityAttributes`], which is indexed by
//! `index` only: the generation is checked against the scene's generation
//! table before any attribute is trusted.

use bytemuck::{Pod, Zeroable};

use super::mask::{CacheMask, ComponentMask};

/// Unique identifier for an entity.
///
/// Two ids are equal iff both index and generation match. Holding an id
/// after its entity is destroyed is harmless: once the index is recycled
/// the generation differs and every lookup rejects the stale value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct EntityId {
    /// Dense slot into all per-entity arrays.
    pub index: u32,
    /// Generation of `index` at creation time.
    pub generation: u32,
}

impl EntityId {
    /// Creates a new entity ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the index as a `usize` for array access.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> usize {
        self.index as usize
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

/// Activity flags of one entity slot.
///
/// Bit 0 is the active flag. Bit 1 marks an entity queued for destruction
/// during the current tick. The remaining bits are reserved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EntityFlags(u8);

impl EntityFlags {
    /// The entity participates in caches.
    pub const ACTIVE: Self = Self(1 << 0);
    /// The entity is queued for destruction this tick.
    pub const PENDING_KILL: Self = Self(1 << 1);

    /// No flags set.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the bits of `other`.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears the bits of `other`.
    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// Lifecycle state of an entity id, as observed between ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// The id does not name a live entity (never created, or recycled).
    Free,
    /// Created or deactivated; not in any cache.
    Inactive,
    /// Activated; eligible for cache membership.
    Active,
    /// Destruction queued; reclaimed at the next tick.
    Dead,
}

/// Per-slot bookkeeping for one entity index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityAttributes {
    /// Whether the slot currently holds a live entity.
    pub alive: bool,
    /// Activity flags.
    pub flags: EntityFlags,
    /// Layer passed at creation, for render/view routing.
    pub layer: u8,
    /// Component presence bitmask.
    pub component_mask: ComponentMask,
    /// Which registered scene caches currently contain the entity.
    pub caches: CacheMask,
}

impl EntityAttributes {
    /// Attributes for a freshly created entity on `layer`.
    #[inline]
    #[must_use]
    pub const fn spawned(layer: u8) -> Self {
        Self {
            alive: true,
            flags: EntityFlags::empty(),
            layer,
            component_mask: ComponentMask::empty(),
            caches: CacheMask::empty(),
        }
    }

    /// Returns `true` if the entity is flagged active.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.flags.contains(EntityFlags::ACTIVE)
    }

    /// Returns `true` if the entity is queued for destruction.
    #[inline]
    #[must_use]
    pub const fn is_pending_kill(&self) -> bool {
        self.flags.contains(EntityFlags::PENDING_KILL)
    }

    /// Derives the lifecycle state of a live slot.
    #[must_use]
    pub const fn state(&self) -> EntityState {
        if !self.alive {
            EntityState::Free
        } else if self.is_pending_kill() {
            EntityState::Dead
        } else if self.is_active() {
            EntityState::Active
        } else {
            EntityState::Inactive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_equality_needs_both_fields() {
        let a = EntityId::new(3, 0);
        assert_eq!(a, EntityId::new(3, 0));
        assert_ne!(a, EntityId::new(3, 1));
        assert_ne!(a, EntityId::new(4, 0));
    }

    #[test]
    fn test_entity_id_is_plain_data() {
        let ids = [EntityId::new(1, 2), EntityId::new(3, 4)];
        let bytes: &[u8] = bytemuck::cast_slice(&ids);
        assert_eq!(bytes.len(), 16);
        let back: &[EntityId] = bytemuck::cast_slice(bytes);
        assert_eq!(back, &ids);
    }

    #[test]
    fn test_flags() {
        let mut flags = EntityFlags::empty();
        assert!(!flags.contains(EntityFlags::ACTIVE));

        flags.insert(EntityFlags::ACTIVE);
        flags.insert(EntityFlags::PENDING_KILL);
        assert!(flags.contains(EntityFlags::ACTIVE));
        assert_eq!(flags.bits(), 0b11);

        flags.remove(EntityFlags::ACTIVE);
        assert!(!flags.contains(EntityFlags::ACTIVE));
        assert!(flags.contains(EntityFlags::PENDING_KILL));
    }

    #[test]
    fn test_attribute_state() {
        let mut attr = EntityAttributes::spawned(2);
        assert_eq!(attr.layer, 2);
        assert_eq!(attr.state(), EntityState::Inactive);

        attr.flags.insert(EntityFlags::ACTIVE);
        assert_eq!(attr.state(), EntityState::Active);

        attr.flags.insert(EntityFlags::PENDING_KILL);
        assert_eq!(attr.state(), EntityState::Dead);

        assert_eq!(EntityAttributes::default().state(), EntityState::Free);
    }
}
