//! # Component System
//!
//! Components are plain data records attached to entities through per-type
//! storage. Each component type gets a dense id in `[0, MAX_COMPONENTS)`,
//! fixed by the type itself and checked when the type is registered with a
//! scene.
//!
//! Storage is type-erased through [`ComponentVTable`]: a small capability
//! record of function pointers, held as data in the registry.

use std::any::Any;

use super::entity::EntityId;
use super::mask::{EventMask, MAX_COMPONENTS};
use super::storage::{self, ComponentStorage};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Default`: the value constructed by a plain add
/// - `Clone`: the copy-construct path (prefabs, entity cloning)
/// - `Send + Sync`: scenes may be handed between threads between ticks
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Default)]
/// struct Transform {
///     position: [f32; 3],
/// }
///
/// impl Component for Transform {
///     const ID: u8 = 0;
///     const NAME: &'static str = "transform";
/// }
/// ```
pub trait Component: Clone + Default + Send + Sync + 'static {
    /// Dense identifier for this component type (`0..MAX_COMPONENTS`).
    ///
    /// This ID is the component's bit in every presence and filter mask.
    const ID: u8;

    /// Short name used by binding layers to look the type up.
    const NAME: &'static str;
}

/// Id reserved for [`EventComponent`].
pub const EVENT_COMPONENT_ID: u8 = (MAX_COMPONENTS - 1) as u8;

/// Event-style marker component.
///
/// An entity carrying it only enters caches whose required event kinds are
/// a subset of `filter`, in addition to the usual component requirement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventComponent {
    /// Event kinds this entity represents.
    pub filter: EventMask,
}

impl EventComponent {
    /// Creates an event marker carrying `filter`.
    #[inline]
    #[must_use]
    pub const fn new(filter: EventMask) -> Self {
        Self { filter }
    }
}

impl Component for EventComponent {
    const ID: u8 = EVENT_COMPONENT_ID;
    const NAME: &'static str = "event";
}

/// Type-erased capability record for one component type.
///
/// Every function takes the type's storage as `dyn Any` and downcasts it to
/// `ComponentStorage<T>`; handing a storage of another type is a contract
/// violation and panics.
#[derive(Clone, Copy)]
pub struct ComponentVTable {
    /// Dense type id.
    pub id: u8,
    /// Registered name.
    pub name: &'static str,
    /// Size of one component instance in bytes.
    pub size: usize,
    /// Creates an empty storage whose pool grows by the given chunk size.
    pub new_storage: fn(usize) -> Box<dyn Any + Send + Sync>,
    /// Default-constructs the component of an entity.
    pub construct: fn(&mut dyn Any, EntityId),
    /// Copy-constructs `dst`'s component from `src`'s.
    pub construct_from: fn(&mut dyn Any, EntityId, EntityId),
    /// Destructs in place, keeping the slot memory.
    pub destruct: fn(&mut dyn Any, EntityId),
    /// Destructs (if needed) and returns the slot memory to the pool.
    pub release: fn(&mut dyn Any, EntityId),
}

impl ComponentVTable {
    /// Builds the capability record for `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            id: T::ID,
            name: T::NAME,
            size: std::mem::size_of::<T>(),
            new_storage: |chunk_size| -> Box<dyn Any + Send + Sync> {
                Box::new(ComponentStorage::<T>::new(chunk_size))
            },
            construct: |any, entity| {
                storage::downcast_mut::<T>(any).add(entity);
            },
            construct_from: |any, dst, src| {
                storage::downcast_mut::<T>(any).add_from_entity(dst, src);
            },
            destruct: |any, entity| {
                storage::downcast_mut::<T>(any).remove(entity);
            },
            release: |any, entity| {
                storage::downcast_mut::<T>(any).release(entity);
            },
        }
    }
}

impl std::fmt::Debug for ComponentVTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentVTable")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Health {
        current: f32,
    }

    impl Component for Health {
        const ID: u8 = 4;
        const NAME: &'static str = "health";
    }

    #[test]
    fn test_vtable_metadata() {
        let vtable = ComponentVTable::of::<Health>();
        assert_eq!(vtable.id, 4);
        assert_eq!(vtable.name, "health");
        assert_eq!(vtable.size, std::mem::size_of::<Health>());
    }

    #[test]
    fn test_vtable_construct_and_destruct() {
        let vtable = ComponentVTable::of::<Health>();
        let mut any = (vtable.new_storage)(8);
        let e = EntityId::new(2, 0);

        (vtable.construct)(any.as_mut(), e);
        {
            let typed = storage::downcast_mut::<Health>(any.as_mut());
            assert_eq!(typed.get(e), Some(&Health::default()));
            if let Some(h) = typed.get_mut(e) {
                h.current = 7.0;
            }
        }

        let copy = EntityId::new(5, 0);
        (vtable.construct_from)(any.as_mut(), copy, e);
        (vtable.destruct)(any.as_mut(), e);

        let typed = storage::downcast_mut::<Health>(any.as_mut());
        assert!(typed.get(e).is_none());
        assert_eq!(typed.get(copy).map(|h| h.current), Some(7.0));
    }

    #[test]
    fn test_event_component_reserved_id() {
        assert_eq!(usize::from(EventComponent::ID), MAX_COMPONENTS - 1);
    }
}
