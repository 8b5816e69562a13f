//! Delivery idempotence and watermark behaviour across frames

use crate::common::*;
use proptest::prelude::*;
use relay::{
    CacheKey, DataStore, DeliveryManager, Fidelity, GeometryRepresentation, LocalCommunicator,
    MoveMode, RecordingRenderer, RelayConfig, Representation, View, ViewId,
};

#[test]
fn test_repeated_frames_do_not_redeliver() {
    init_tracing();
    let mut view = View::local(ViewId::new(1), RelayConfig::default());
    view.add_representation(geometry(1, 32)).unwrap();
    view.add_representation(geometry(2, 16)).unwrap();

    let first = view.update();
    assert_eq!(first.delivered_full.len(), 2);

    for _ in 0..3 {
        let again = view.update();
        assert!(again.delivered_full.is_empty());
    }
    let metrics = view.delivery_metrics();
    assert_eq!(metrics.items_delivered, 2);
    assert!(metrics.empty_rounds >= 3);
}

#[test]
fn test_item_hidden_during_a_frame_is_delivered_once_shown() {
    let renderer = RecordingRenderer::new();
    let mut view =
        View::local(ViewId::new(1), RelayConfig::default()).with_renderer(Box::new(renderer.clone()));
    view.add_representation(geometry(1, 32)).unwrap();
    view.add_representation(geometry(2, 16)).unwrap();
    view.update();

    // modified while hidden: no pass runs for it until it is shown
    let rep = view.representation_mut(rid(2)).unwrap();
    rep.mark_modified();
    rep.set_visibility(false);
    let hidden = view.update();
    assert!(hidden.delivered_full.is_empty());

    view.representation_mut(rid(2)).unwrap().set_visibility(true);
    let shown = view.update();
    assert_eq!(shown.delivered_full.as_slice(), &[rid(2)]);

    let drawn: Vec<_> = renderer.last().unwrap().items.iter().map(|(id, _)| *id).collect();
    assert_eq!(drawn, vec![rid(1), rid(2)]);
}

#[test]
fn test_pinned_cache_key_delivers_once_across_time_steps() {
    init_tracing();
    let source = CountingSource::new(32);
    let mut view = View::local(ViewId::new(1), RelayConfig::default());
    let mut rep = GeometryRepresentation::new(rid(1), source.shared());
    rep.set_visibility(true);
    rep.set_force_use_cache(true);
    rep.set_forced_cache_key(CacheKey::new(5.0));
    view.add_representation(Box::new(rep)).unwrap();

    let mut delivered = Vec::new();
    for t in [0.0, 1.0, 2.0, 3.0] {
        view.set_time(Some(t));
        delivered.push(view.update().delivered_full.len());
    }
    assert_eq!(delivered, vec![1, 0, 0, 0]);
    assert_eq!(source.calls(), 1);
}

#[test]
fn test_deliver_with_no_stale_ids_is_empty() {
    let mut store = DataStore::new();
    store.register_representation(rid(1), true);
    store.set_piece(rid(1), object(8), Fidelity::Full).unwrap();

    let manager = DeliveryManager::default();
    let first = manager.deliver(&mut store, &LocalCommunicator, Fidelity::Full, &[rid(1)], MoveMode::CollectToRoot);
    let second = manager.deliver(&mut store, &LocalCommunicator, Fidelity::Full, &[rid(1)], MoveMode::CollectToRoot);
    assert_eq!(first.delivered.len(), 1);
    assert!(second.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Two deliveries with no production in between: the second moves nothing.
    #[test]
    fn prop_delivery_idempotent(
        sizes in proptest::collection::vec(1usize..64, 1..10),
        visible in proptest::collection::vec(any::<bool>(), 10),
        fidelity in prop_oneof![Just(Fidelity::Full), Just(Fidelity::Lod)],
    ) {
        let mut store = DataStore::new();
        for (i, size) in sizes.iter().enumerate() {
            let id = rid(i as u32);
            store.register_representation(id, visible[i]);
            store.set_piece(id, object(*size), fidelity).unwrap();
        }
        let manager = DeliveryManager::default();
        let comm = LocalCommunicator;

        let first = manager.deliver_pending(&mut store, &comm, fidelity, MoveMode::PassThrough);
        let expected = visible.iter().take(sizes.len()).filter(|v| **v).count();
        prop_assert_eq!(first.delivered.len(), expected);

        let second = manager.deliver_pending(&mut store, &comm, fidelity, MoveMode::PassThrough);
        prop_assert!(second.is_empty());

        // an explicit list also moves hidden items, once
        let explicit: Vec<_> = (0..sizes.len() as u32).map(rid).collect();
        let third = manager.deliver(&mut store, &comm, fidelity, &explicit, MoveMode::PassThrough);
        prop_assert_eq!(third.delivered.len(), sizes.len() - expected);
        let fourth = manager.deliver(&mut store, &comm, fidelity, &explicit, MoveMode::PassThrough);
        prop_assert!(fourth.is_empty());
    }
}
