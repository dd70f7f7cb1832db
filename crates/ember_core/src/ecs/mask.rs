//! # Fixed-Width Masks
//!
//! Bit-sets used for filter evaluation. Every containment test is a single
//! `(mask & required) == required`, independent of how many component types
//! exist.

use bytemuck::{Pod, Zeroable};

/// Number of component types a scene can register. Bounds every
/// [`ComponentMask`].
pub const MAX_COMPONENTS: usize = 64;

/// Number of caches a scene can register. Bounds every [`CacheMask`].
pub const MAX_CACHES: usize = 64;

/// Component presence bitmask (one bit per component type id).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// A mask with no component set.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a mask from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns a copy of this mask with `component_id` set.
    ///
    /// # Panics
    ///
    /// Panics if `component_id >= MAX_COMPONENTS`.
    #[inline]
    #[must_use]
    pub const fn with(self, component_id: u8) -> Self {
        assert!((component_id as usize) < MAX_COMPONENTS, "component id out of range");
        Self(self.0 | (1 << component_id))
    }

    /// Checks if the mask has a specific component.
    #[inline]
    #[must_use]
    pub const fn has(self, component_id: u8) -> bool {
        (component_id as usize) < MAX_COMPONENTS && (self.0 & (1 << component_id)) != 0
    }

    /// Sets a component bit.
    #[inline]
    pub fn insert(&mut self, component_id: u8) {
        *self = self.with(component_id);
    }

    /// Clears a component bit.
    #[inline]
    pub fn remove(&mut self, component_id: u8) {
        if (component_id as usize) < MAX_COMPONENTS {
            self.0 &= !(1 << component_id);
        }
    }

    /// Returns `true` if every bit of `required` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Returns `true` if no bit is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of components set.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates the set component ids in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            // trailing_zeros of a non-zero u64 is at most 63
            let id = bits.trailing_zeros() as u8;
            bits &= bits - 1;
            Some(id)
        })
    }
}

/// Event-kind bitmask carried by [`super::EventComponent`] and required by
/// event-filtered caches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct EventMask(u64);

impl EventMask {
    /// A mask with no event kind set.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a mask from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns a copy of this mask with event kind `kind` (0-63) set.
    #[inline]
    #[must_use]
    pub const fn with(self, kind: u8) -> Self {
        assert!(kind < 64, "event kind out of range");
        Self(self.0 | (1 << kind))
    }

    /// Returns `true` if every bit of `required` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Returns `true` if no bit is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Membership bitmask of one entity over the scene's registered caches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CacheMask(u64);

impl CacheMask {
    /// No cache membership.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if the entity is recorded in cache `slot`.
    #[inline]
    #[must_use]
    pub const fn has(self, slot: usize) -> bool {
        slot < MAX_CACHES && self.0 & (1 << slot) != 0
    }

    /// Records membership in cache `slot`.
    #[inline]
    pub fn insert(&mut self, slot: usize) {
        debug_assert!(slot < MAX_CACHES);
        self.0 |= 1 << slot;
    }

    /// Clears membership in cache `slot`.
    #[inline]
    pub fn remove(&mut self, slot: usize) {
        debug_assert!(slot < MAX_CACHES);
        self.0 &= !(1 << slot);
    }

    /// Returns `true` if the entity is in no cache.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Growable bitset indexed by entity index.
///
/// Gives O(1) "already a member" checks for an entity cache. 64 entity
/// indices per word, so tracking 1M entities costs about 122KB.
#[derive(Clone, Debug, Default)]
pub struct MembershipSet {
    /// 1 = member. 64 indices per u64.
    bits: Vec<u64>,
    /// Number of members.
    len: usize,
}

impl MembershipSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indices the set can address without growing.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bits.len() * 64
    }

    /// Grows the set so that `index` is addressable. Never shrinks.
    #[inline]
    pub fn ensure_index(&mut self, index: usize) {
        let words = index / 64 + 1;
        if self.bits.len() < words {
            self.bits.resize(words, 0);
        }
    }

    /// Marks `index` as a member. Returns `false` if it already was.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        self.ensure_index(index);
        let word = &mut self.bits[index / 64];
        let bit = 1u64 << (index % 64);
        if *word & bit != 0 {
            return false;
        }
        *word |= bit;
        self.len += 1;
        true
    }

    /// Clears `index`. Returns `false` if it was not a member.
    #[inline]
    pub fn remove(&mut self, index: usize) -> bool {
        let Some(word) = self.bits.get_mut(index / 64) else {
            return false;
        };
        let bit = 1u64 << (index % 64);
        if *word & bit == 0 {
            return false;
        }
        *word &= !bit;
        self.len -= 1;
        true
    }

    /// Returns `true` if `index` is a member.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.bits
            .get(index / 64)
            .is_some_and(|word| word & (1u64 << (index % 64)) != 0)
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the set has no member.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every member. Capacity is kept.
    pub fn clear(&mut self) {
        self.bits.fill(0);
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_mask_containment() {
        let entity = ComponentMask::empty().with(0).with(3).with(63);
        let filter = ComponentMask::empty().with(0).with(63);

        assert!(entity.contains_all(filter));
        assert!(!filter.contains_all(entity));
        assert!(entity.contains_all(ComponentMask::empty()));
        assert_eq!(entity.count(), 3);
    }

    #[test]
    fn test_component_mask_iter_ascending() {
        let mask = ComponentMask::empty().with(9).with(1).with(40);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![1, 9, 40]);
    }

    #[test]
    fn test_component_mask_insert_remove() {
        let mut mask = ComponentMask::empty();
        mask.insert(5);
        assert!(mask.has(5));
        mask.remove(5);
        assert!(!mask.has(5));
        assert!(mask.is_empty());
        assert!(!mask.has(200));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_component_mask_rejects_wide_id() {
        let _ = ComponentMask::empty().with(64);
    }

    #[test]
    fn test_event_mask_containment() {
        let carried = EventMask::empty().with(1).with(2);
        assert!(carried.contains_all(EventMask::empty().with(2)));
        assert!(!carried.contains_all(EventMask::empty().with(7)));
    }

    #[test]
    fn test_cache_mask() {
        let mut mask = CacheMask::empty();
        mask.insert(4);
        assert!(mask.has(4));
        assert!(!mask.has(3));
        mask.remove(4);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_membership_set_grows_on_demand() {
        let mut set = MembershipSet::new();
        assert!(!set.contains(1000));

        assert!(set.insert(1000));
        assert!(!set.insert(1000));
        assert!(set.contains(1000));
        assert!(set.capacity() > 1000);
        assert_eq!(set.len(), 1);

        assert!(set.remove(1000));
        assert!(!set.remove(1000));
        assert!(!set.remove(1_000_000));
        assert!(set.is_empty());
    }
}
