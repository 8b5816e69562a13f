//! Visible-size accounting and delivery selection on a fresh store

use crate::common::*;
use relay::{
    DataStore, DeliveryManager, Fidelity, LocalCommunicator, ModTime, MoveMode,
};

fn walkthrough_store() -> DataStore {
    let mut store = DataStore::new();
    store.register_representation(rid(1), true);
    store.register_representation(rid(2), false);
    store
}

#[test]
fn test_visible_size_ignores_hidden() {
    init_tracing();
    let mut store = walkthrough_store();
    assert_eq!(store.visible_data_size(Fidelity::Full), 0);

    store.set_piece(rid(1), object(100), Fidelity::Full).unwrap();
    assert_eq!(store.visible_data_size(Fidelity::Full), 100);

    store.set_piece(rid(2), object(50), Fidelity::Full).unwrap();
    assert_eq!(store.visible_data_size(Fidelity::Full), 100);
}

#[test]
fn test_needs_delivery_selects_visible_only() {
    let mut store = walkthrough_store();
    store.set_piece(rid(1), object(100), Fidelity::Full).unwrap();
    store.set_piece(rid(2), object(50), Fidelity::Full).unwrap();

    let ids = store.needs_delivery(ModTime::ZERO, Fidelity::Full);
    assert_eq!(ids.as_slice(), &[rid(1)]);
}

#[test]
fn test_delivered_item_is_not_selected_again() {
    let mut store = walkthrough_store();
    store.set_piece(rid(1), object(100), Fidelity::Full).unwrap();
    store.set_piece(rid(2), object(50), Fidelity::Full).unwrap();

    let manager = DeliveryManager::default();
    let comm = LocalCommunicator;
    let report = manager.deliver(&mut store, &comm, Fidelity::Full, &[rid(1)], MoveMode::PassThrough);
    assert_eq!(report.delivered.as_slice(), &[rid(1)]);

    let after = store.item(rid(1), Fidelity::Full).unwrap().timestamp();
    assert!(store.needs_delivery(after, Fidelity::Full).is_empty());
    assert!(store.needs_delivery(manager.watermark(Fidelity::Full), Fidelity::Full).is_empty());
}

#[test]
fn test_registration_creates_both_fidelities() {
    let mut store = DataStore::new();
    store.register_representation(rid(1), true);
    store.register_representation(rid(1), true);
    assert_eq!(store.item_count(Fidelity::Full), 1);
    assert_eq!(store.item_count(Fidelity::Lod), 1);
    assert!(!store.get_producer(rid(1), Fidelity::Lod).unwrap().has_data());
}
