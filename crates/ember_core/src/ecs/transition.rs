//! # Lifecycle Transitions
//!
//! Lifecycle intents are not applied when they are requested. They are
//! collected into a [`TransitionBatch`] and applied together once per tick.
//!
//! ```text
//!  create/destroy/activate ──> pending batch
//!                                   │  rotate() at tick start
//!                                   ▼
//!                              applied batch ──> scene pass, cache updates
//!                                   │  rotate() at next tick clears it
//!                                   ▼
//!                              pending batch (reused)
//! ```

use super::entity::EntityId;

/// Lifecycle transitions collected during one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionBatch {
    /// Tick this batch was applied in. `0` while still pending.
    tick: u64,
    /// Number of scene clears before this batch was applied.
    epoch: u64,
    /// Entities to activate.
    activated: Vec<EntityId>,
    /// Entities to deactivate. Every killed entity is listed here too.
    deactivated: Vec<EntityId>,
    /// Entities to destroy.
    killed: Vec<EntityId>,
    /// Active entities whose component mask changed.
    changed: Vec<EntityId>,
}

impl TransitionBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an activation.
    #[inline]
    pub fn activate(&mut self, entity: EntityId) {
        self.activated.push(entity);
    }

    /// Queues a deactivation.
    #[inline]
    pub fn deactivate(&mut self, entity: EntityId) {
        self.deactivated.push(entity);
    }

    /// Queues a destruction. The entity is deactivated first, so caches drop
    /// it before its components are torn down.
    #[inline]
    pub fn kill(&mut self, entity: EntityId) {
        self.deactivated.push(entity);
        self.killed.push(entity);
    }

    /// Queues a cache re-evaluation after a component mask change.
    #[inline]
    pub fn mark_changed(&mut self, entity: EntityId) {
        self.changed.push(entity);
    }

    /// Tick this batch was applied in, `0` if it has not been applied.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of scene clears before this batch was applied.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Queued activations, in request order.
    #[inline]
    #[must_use]
    pub fn activated(&self) -> &[EntityId] {
        &self.activated
    }

    /// Queued deactivations, in request order.
    #[inline]
    #[must_use]
    pub fn deactivated(&self) -> &[EntityId] {
        &self.deactivated
    }

    /// Queued destructions, in request order.
    #[inline]
    #[must_use]
    pub fn killed(&self) -> &[EntityId] {
        &self.killed
    }

    /// Entities queued for re-evaluation, in request order.
    #[inline]
    #[must_use]
    pub fn changed(&self) -> &[EntityId] {
        &self.changed
    }

    /// Total number of queued transitions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.activated.len() + self.deactivated.len() + self.killed.len() + self.changed.len()
    }

    /// Returns `true` if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties every list and resets the tick. Allocations are kept.
    pub fn clear(&mut self) {
        self.tick = 0;
        self.activated.clear();
        self.deactivated.clear();
        self.killed.clear();
        self.changed.clear();
    }
}

/// Two-slot ring of transition batches: one filling, one applied.
#[derive(Clone, Debug, Default)]
pub struct TransitionRing {
    /// The two batches.
    batches: [TransitionBatch; 2],
    /// Slot of the batch currently collecting intents.
    pending: usize,
    /// Number of rotations so far.
    tick: u64,
    /// Number of clears so far.
    epoch: u64,
}

impl TransitionRing {
    /// Creates a ring with two empty batches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The batch collecting this tick's intents.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &TransitionBatch {
        &self.batches[self.pending]
    }

    /// Mutable access to the batch collecting this tick's intents.
    #[inline]
    pub fn pending_mut(&mut self) -> &mut TransitionBatch {
        &mut self.batches[self.pending]
    }

    /// The batch consumed by the last rotation.
    #[inline]
    #[must_use]
    pub fn applied(&self) -> &TransitionBatch {
        &self.batches[self.pending ^ 1]
    }

    /// Mutable access to the applied batch.
    #[inline]
    pub fn applied_mut(&mut self) -> &mut TransitionBatch {
        &mut self.batches[self.pending ^ 1]
    }

    /// Number of rotations so far.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of clears so far.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Hands the pending batch over for application and starts a fresh one.
    ///
    /// The previously applied batch is cleared and becomes the new pending
    /// batch. Returns the tick number stamped on the newly applied batch.
    pub fn rotate(&mut self) -> u64 {
        self.tick += 1;
        self.batches[self.pending].tick = self.tick;
        self.batches[self.pending].epoch = self.epoch;
        self.pending ^= 1;
        self.batches[self.pending].clear();
        self.tick
    }

    /// Clears both batches and starts a new epoch. The tick counter keeps
    /// running.
    pub fn clear(&mut self) {
        for batch in &mut self.batches {
            batch.clear();
        }
        self.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_also_deactivates() {
        let mut batch = TransitionBatch::new();
        let e = EntityId::new(4, 1);
        batch.kill(e);

        assert_eq!(batch.deactivated(), &[e]);
        assert_eq!(batch.killed(), &[e]);
        assert!(batch.activated().is_empty());
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_rotate_hands_over_and_clears() {
        let mut ring = TransitionRing::new();
        let a = EntityId::new(0, 0);
        let b = EntityId::new(1, 0);

        ring.pending_mut().activate(a);
        assert_eq!(ring.rotate(), 1);
        assert_eq!(ring.applied().activated(), &[a]);
        assert_eq!(ring.applied().tick(), 1);
        assert!(ring.pending().is_empty());

        ring.pending_mut().deactivate(b);
        assert_eq!(ring.rotate(), 2);
        assert_eq!(ring.applied().deactivated(), &[b]);
        assert!(ring.applied().activated().is_empty());
        assert!(ring.pending().is_empty());
        assert_eq!(ring.pending().tick(), 0);
    }

    #[test]
    fn test_clear_stamps_new_epoch() {
        let mut ring = TransitionRing::new();
        ring.pending_mut().activate(EntityId::new(0, 0));
        ring.rotate();
        assert_eq!(ring.applied().epoch(), 0);

        ring.clear();
        assert!(ring.applied().is_empty());
        assert_eq!(ring.applied().tick(), 0);
        assert_eq!(ring.rotate(), 2);
        assert_eq!(ring.applied().epoch(), 1);
    }

    #[test]
    fn test_rotate_with_nothing_queued() {
        let mut ring = TransitionRing::new();
        ring.rotate();
        ring.rotate();
        assert!(ring.applied().is_empty());
        assert_eq!(ring.tick(), 2);
    }
}
