//! # Entity Cache Tests
//!
//! Cache membership must match the filter for every active entity after each
//! tick, stay sorted by index, and cost no more than the transition batch.
//!
//! Run with: `cargo test --package ember_core --test caches`

use ember_core::{
    CacheFilter, Component, EntityCache, EntityId, EventComponent, EventMask, Scene, SceneConfig,
    SceneEvent, SharedEventLog,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Component X of the reference scenario.
#[derive(Clone, Debug, Default, PartialEq)]
struct Mesh {
    id: u32,
}

impl Component for Mesh {
    const ID: u8 = 0;
    const NAME: &'static str = "mesh";
}

/// Second component, to make filters disagree.
#[derive(Clone, Debug, Default, PartialEq)]
struct Body {
    mass: f32,
}

impl Component for Body {
    const ID: u8 = 1;
    const NAME: &'static str = "body";
}

fn scene_with(config: SceneConfig) -> Scene {
    let mut scene = Scene::new(config).unwrap();
    scene.register_component::<Mesh>().unwrap();
    scene.register_component::<Body>().unwrap();
    scene
}

fn assert_strictly_ascending(entities: &[EntityId]) {
    for pair in entities.windows(2) {
        assert!(pair[0].index < pair[1].index, "unsorted: {entities:?}");
    }
}

/// Deterministic generator for churn tests.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

// ============================================================================
// REFERENCE SCENARIO
// ============================================================================

#[test]
fn verify_reference_scenario() {
    let mut scene = scene_with(SceneConfig::default());
    let a = scene.create_entity(0);
    let b = scene.create_entity(0);
    let c = scene.create_entity(0);
    assert_eq!((a.index, b.index, c.index), (0, 1, 2));

    scene.add_component(a, Mesh { id: 1 });
    scene.add_component(b, Mesh { id: 2 });
    let meshes = scene
        .register_cache(CacheFilter::new().require::<Mesh>())
        .unwrap();

    for e in [a, b, c] {
        scene.activate_entity(e);
    }
    scene.update();
    assert_eq!(scene.cache(meshes).entities(), &[a, b]);

    scene.destroy_entity(b);
    scene.update();
    assert_eq!(scene.cache(meshes).entities(), &[a]);
    assert_eq!(scene.free_count(), 1);

    // below the reuse threshold: a new index, not b's
    let d = scene.create_entity(0);
    assert_eq!(d, EntityId::new(3, 0));
    assert_eq!(scene.get_component::<Mesh>(a).map(|m| m.id), Some(1));
}

// ============================================================================
// CORRECTNESS
// ============================================================================

#[test]
fn verify_membership_matches_filter_under_churn() {
    let mut scene = scene_with(SceneConfig::default().reuse_threshold(8));
    let both = scene
        .register_cache(CacheFilter::new().require::<Mesh>().require::<Body>())
        .unwrap();
    let bodies = scene
        .register_cache(CacheFilter::new().require::<Body>())
        .unwrap();
    let mut standalone = EntityCache::new(CacheFilter::new().require::<Mesh>());

    let mut rng = Lcg(0x5eed);
    let mut live: Vec<EntityId> = Vec::new();

    for _ in 0..200 {
        for _ in 0..10 {
            let pick = (!live.is_empty()).then(|| live[rng.next(live.len() as u64) as usize]);
            match (rng.next(7), pick) {
                (0, _) | (_, None) => live.push(scene.create_entity(0)),
                (1, Some(e)) => {
                    scene.destroy_entity(e);
                }
                (2 | 3, Some(e)) => {
                    scene.activate_entity(e);
                }
                (4, Some(e)) => {
                    scene.deactivate_entity(e);
                }
                (5, Some(e)) => {
                    if scene.has_component::<Mesh>(e) {
                        scene.remove_component::<Mesh>(e);
                    } else {
                        scene.add_default_component::<Mesh>(e);
                    }
                }
                (_, Some(e)) => {
                    if scene.has_component::<Body>(e) {
                        scene.remove_component::<Body>(e);
                    } else {
                        scene.add_component(e, Body { mass: 1.0 });
                    }
                }
            }
        }

        scene.update();
        standalone.update(&scene);
        live.retain(|&e| scene.is_alive(e));

        for (id, filter) in [
            (both, CacheFilter::new().require::<Mesh>().require::<Body>()),
            (bodies, CacheFilter::new().require::<Body>()),
        ] {
            let cache = scene.cache(id);
            assert_strictly_ascending(cache.entities());
            let expected: Vec<EntityId> = scene
                .active_entities()
                .filter(|&e| filter.matches(scene.component_mask(e), scene.event_mask(e)))
                .collect();
            assert_eq!(cache.entities(), expected.as_slice());
        }

        let expected: Vec<EntityId> = scene
            .active_entities()
            .filter(|&e| scene.has_component::<Mesh>(e))
            .collect();
        assert_eq!(standalone.entities(), expected.as_slice());
    }
    assert_eq!(standalone.stats().rebuilds, 0);
}

#[test]
fn verify_sorted_regardless_of_activation_order() {
    let mut scene = scene_with(SceneConfig::default());
    let all = scene.register_cache(CacheFilter::new()).unwrap();
    let ids: Vec<EntityId> = (0..16).map(|_| scene.create_entity(0)).collect();

    for &e in ids.iter().rev() {
        scene.activate_entity(e);
    }
    scene.update();

    assert_eq!(scene.cache(all).entities(), ids.as_slice());
    assert_eq!(scene.cache(all).as_bytes().len(), ids.len() * 8);
}

#[test]
fn verify_event_filter_applies_to_marked_entities_only() {
    let mut scene = scene_with(SceneConfig::default());
    let hits = scene
        .register_cache(CacheFilter::new().require::<Mesh>().require_event(2))
        .unwrap();

    let plain = scene.create_entity(0);
    let wanted = scene.create_entity(0);
    let other = scene.create_entity(0);
    for e in [plain, wanted, other] {
        scene.add_default_component::<Mesh>(e);
        scene.activate_entity(e);
    }
    scene.add_component(wanted, EventComponent::new(EventMask::empty().with(2).with(3)));
    scene.add_component(other, EventComponent::new(EventMask::empty().with(1)));
    scene.update();

    assert_eq!(scene.cache(hits).entities(), &[plain, wanted]);
}

// ============================================================================
// COMPONENT CHANGES ON ACTIVE ENTITIES
// ============================================================================

#[test]
fn verify_component_change_reevaluates_next_tick() {
    let log = SharedEventLog::new();
    let mut scene = Scene::with_sink(SceneConfig::default(), Box::new(log.clone())).unwrap();
    scene.register_component::<Mesh>().unwrap();
    scene.register_component::<Body>().unwrap();
    let bodies = scene
        .register_cache(CacheFilter::new().require::<Body>())
        .unwrap();

    let e = scene.create_entity(0);
    scene.activate_entity(e);
    scene.update();
    assert!(scene.cache(bodies).is_empty());
    let _ = log.take();

    scene.add_component(e, Body { mass: 2.0 });
    assert_eq!(scene.pending_transitions().changed(), &[e]);
    assert!(scene.cache(bodies).is_empty());
    scene.update();
    assert_eq!(scene.cache(bodies).entities(), &[e]);
    assert!(scene.applied_transitions().activated().is_empty());
    assert!(log.is_empty());

    assert_eq!(scene.remove_component::<Body>(e).map(|b| b.mass), Some(2.0));
    scene.update();
    assert!(scene.cache(bodies).is_empty());
    assert!(scene.is_entity_active(e));
}

#[test]
fn verify_component_change_on_inactive_entity_is_not_queued() {
    let mut scene = scene_with(SceneConfig::default());
    let e = scene.create_entity(0);
    scene.add_default_component::<Body>(e);
    assert!(scene.pending_transitions().changed().is_empty());
}

// ============================================================================
// COST
// ============================================================================

#[test]
fn verify_evaluations_bounded_by_batch() {
    let mut scene = scene_with(SceneConfig::default());
    let meshes = scene
        .register_cache(CacheFilter::new().require::<Mesh>())
        .unwrap();
    let mut standalone = EntityCache::new(CacheFilter::new().require::<Mesh>());

    for _ in 0..10_000 {
        let e = scene.create_entity(0);
        scene.add_default_component::<Mesh>(e);
        scene.activate_entity(e);
    }
    scene.update();
    standalone.update(&scene);
    assert_eq!(scene.cache(meshes).len(), 10_000);
    assert_eq!(standalone.len(), 10_000);

    let mut batch = Vec::new();
    for _ in 0..5 {
        let e = scene.create_entity(0);
        scene.add_default_component::<Mesh>(e);
        scene.activate_entity(e);
        batch.push(e);
    }
    scene.update();
    standalone.update(&scene);

    assert_eq!(scene.cache(meshes).stats().evaluated, 5);
    assert_eq!(standalone.stats().evaluated, 5);
    assert_eq!(scene.cache(meshes).len(), 10_005);
    assert!(batch.iter().all(|&e| standalone.contains(e)));

    scene.update();
    standalone.update(&scene);
    assert_eq!(scene.cache(meshes).stats().evaluated, 0);
    assert_eq!(standalone.stats().evaluated, 0);
}

#[test]
fn verify_standalone_cache_consumes_each_tick_once() {
    let mut scene = scene_with(SceneConfig::default());
    let mut cache = EntityCache::new(CacheFilter::new());

    let e = scene.create_entity(0);
    scene.activate_entity(e);
    scene.update();
    cache.update(&scene);
    cache.update(&scene);
    assert_eq!(cache.stats().evaluated_total, 1);
    assert_eq!(cache.last_tick(), scene.tick());

    // a missed tick forces a rebuild
    let f = scene.create_entity(0);
    scene.activate_entity(f);
    scene.update();
    scene.update();
    cache.update(&scene);
    assert_eq!(cache.stats().rebuilds, 1);
    assert_eq!(cache.entities(), &[e, f]);
}

#[test]
fn verify_standalone_cache_starts_over_after_clear() {
    let mut scene = scene_with(SceneConfig::default());
    let mut cache = EntityCache::new(CacheFilter::new().require::<Mesh>());

    let old = scene.create_entity(0);
    scene.add_default_component::<Mesh>(old);
    scene.activate_entity(old);
    scene.update();
    cache.update(&scene);
    assert_eq!(cache.entities(), &[old]);

    scene.clear();
    let fresh = scene.create_entity(0);
    assert_eq!(fresh, old);
    scene.add_default_component::<Mesh>(fresh);
    scene.update();
    cache.update(&scene);

    assert!(!scene.is_entity_active(fresh));
    assert!(cache.is_empty());
    assert!(!cache.contains(fresh));

    scene.activate_entity(fresh);
    scene.update();
    cache.update(&scene);
    assert_eq!(cache.entities(), &[fresh]);
    assert_eq!(cache.stats().rebuilds, 1);
}

// ============================================================================
// OBSERVERS AND SUSPENSION
// ============================================================================

#[test]
fn verify_observers_fire_in_order() {
    let mut scene = scene_with(SceneConfig::default());
    let log: Arc<Mutex<Vec<(&'static str, EntityId)>>> = Arc::new(Mutex::new(Vec::new()));

    let mut cache = EntityCache::new(CacheFilter::new().require::<Mesh>());
    let on_add = Arc::clone(&log);
    cache.set_on_add(move |e| on_add.lock().push(("add", e)));
    let on_remove = Arc::clone(&log);
    cache.set_on_remove(move |e| on_remove.lock().push(("remove", e)));
    let meshes = scene.register_cache_with(cache).unwrap();

    let e = scene.create_entity(0);
    scene.add_default_component::<Mesh>(e);
    scene.activate_entity(e);
    scene.update();
    scene.activate_entity(e);
    scene.update();
    scene.destroy_entity(e);
    scene.update();

    assert!(scene.cache(meshes).is_empty());
    assert_eq!(*log.lock(), vec![("add", e), ("remove", e)]);
}

#[test]
fn verify_change_then_deactivate_in_one_tick_is_silent() {
    let mut scene = scene_with(SceneConfig::default());
    let log: Arc<Mutex<Vec<(&'static str, EntityId)>>> = Arc::new(Mutex::new(Vec::new()));

    let mut cache = EntityCache::new(CacheFilter::new().require::<Body>());
    let on_add = Arc::clone(&log);
    cache.set_on_add(move |e| on_add.lock().push(("add", e)));
    let on_remove = Arc::clone(&log);
    cache.set_on_remove(move |e| on_remove.lock().push(("remove", e)));
    let bodies = scene.register_cache_with(cache).unwrap();

    let e = scene.create_entity(0);
    scene.activate_entity(e);
    scene.update();

    scene.add_default_component::<Body>(e);
    scene.deactivate_entity(e);
    scene.update();

    assert!(!scene.is_entity_active(e));
    assert!(scene.cache(bodies).is_empty());
    assert!(log.lock().is_empty());
}

#[test]
fn verify_disable_keeps_membership_bits() {
    let log = SharedEventLog::new();
    let mut scene = Scene::with_sink(SceneConfig::default(), Box::new(log.clone())).unwrap();
    scene.register_component::<Mesh>().unwrap();
    let meshes = scene
        .register_cache(CacheFilter::new().require::<Mesh>())
        .unwrap();

    let a = scene.create_entity(0);
    let b = scene.create_entity(0);
    let c = scene.create_entity(0);
    for e in [a, b, c] {
        scene.add_default_component::<Mesh>(e);
    }
    scene.activate_entity(c);
    scene.activate_entity(a);
    scene.update();

    scene.disable();
    assert!(!scene.is_enabled());
    assert!(scene.cache(meshes).is_empty());
    assert!(scene.is_entity_active(a));

    scene.activate_entity(b);
    scene.deactivate_entity(c);
    scene.update();
    assert!(scene.cache(meshes).is_empty());
    assert!(scene
        .attributes(b)
        .is_some_and(|attrs| attrs.caches.has(meshes.slot())));

    scene.enable();
    assert_eq!(scene.cache(meshes).entities(), &[a, b]);
    assert!(log
        .snapshot()
        .contains(&SceneEvent::Deactivated(c)));
}
