//! # Entity Component System
//!
//! Generational entities, pool-backed component storage and incrementally
//! maintained entity caches, coordinated by [`Scene`].
//!
//! ## Memory Layout
//!
//! ```text
//! generations:  [g0, g1, g2, ...]            one u32 per index, never shrinks
//! attributes:   [a0, a1, a2, ...]            flags + masks per index
//! storage<T>:   [Some(h0), None, Some(h2)]   index-aligned pool handles
//! cache:        [e0, e2, e7, ...]            sorted by index
//! ```

mod cache;
mod component;
mod entity;
mod events;
mod mask;
mod scene;
mod storage;
mod transition;

pub use cache::{CacheFilter, CacheId, CacheStats, EntityCache};
pub use component::{Component, ComponentVTable, EventComponent, EVENT_COMPONENT_ID};
pub use entity::{EntityAttributes, EntityFlags, EntityId, EntityState};
pub use events::{ChannelSink, EventSink, NullSink, SceneEvent, SceneEventReceiver, SharedEventLog};
pub use mask::{CacheMask, ComponentMask, EventMask, MembershipSet, MAX_CACHES, MAX_COMPONENTS};
pub use scene::Scene;
pub use storage::{ComponentRegistry, ComponentStorage};
pub use transition::{TransitionBatch, TransitionRing};
