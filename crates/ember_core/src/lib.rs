//! # Ember Core
//!
//! Entity/component core of the Ember simulation engine:
//! - Stable generational entity ids under heavy churn
//! - Pool-backed component storage that never moves live components
//! - Entity caches kept consistent frame-to-frame without full rescans
//!
//! ## Architecture Rules
//!
//! 1. **Deferred lifecycle** - create/destroy/activate are batched per tick
//! 2. **Synchronous components** - add/remove land immediately
//! 3. **Batch-proportional cost** - caches only look at what changed
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_core::{Scene, SceneConfig, EntityCache, CacheFilter};
//!
//! let mut scene = Scene::new(SceneConfig::default())?;
//! scene.register_component::<Transform>()?;
//!
//! let cache = scene.register_cache(CacheFilter::new().require::<Transform>())?;
//! let e = scene.create_entity(0);
//! scene.add_component(e, Transform::default());
//! scene.activate_entity(e);
//! scene.update();
//!
//! for entity in scene.cache(cache).entities() {
//!     // ...
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::SceneConfig;
pub use ecs::{
    CacheFilter, CacheId, CacheMask, CacheStats, ChannelSink, Component, ComponentMask,
    ComponentRegistry, ComponentStorage, ComponentVTable, EntityAttributes, EntityCache,
    EntityFlags, EntityId, EntityState, EventComponent, EventMask, EventSink, MembershipSet,
    NullSink, Scene, SceneEvent, SceneEventReceiver, SharedEventLog, TransitionBatch,
    TransitionRing, EVENT_COMPONENT_ID, MAX_CACHES, MAX_COMPONENTS,
};
pub use error::{CoreError, CoreResult};
pub use memory::{PoolAllocator, PoolHandle};
