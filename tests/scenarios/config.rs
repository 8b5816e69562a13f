//! Session configuration loaded from disk drives the frame

use crate::common::*;
use relay::{
    DeliverySelector, Fidelity, MoveMode, RelayConfig, StreamingController, View, ViewId,
    CONFIG_FILE_NAME,
};
use tempfile::TempDir;

#[test]
fn test_default_file_round_trips_into_a_view() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    RelayConfig::write_default_if_missing(&path).unwrap();

    let config = RelayConfig::from_file(&path).unwrap();
    assert_eq!(config, RelayConfig::default());

    let mut view = View::local(ViewId::new(1), config);
    view.add_representation(geometry(1, 8)).unwrap();
    let report = view.update();
    assert_eq!(report.mode, MoveMode::PassThrough);
    assert!(!report.cache_full);
}

#[test]
fn test_written_config_controls_cache_and_streaming() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let mut config = RelayConfig::default();
    config.delivery.mode = DeliverySelector::Collect;
    config.cache.enabled = true;
    config.cache.limit = 16;
    config.streaming.enabled = true;
    config.streaming.max_depth = 2;
    config.write_to_file(&path).unwrap();

    let loaded = RelayConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let mut view = View::local(ViewId::new(1), loaded.clone());
    assert!(view.supports_streaming());
    view.set_use_cache(true);
    view.add_representation(geometry(1, 32)).unwrap();
    view.update();
    // 32 visible bytes exceed the 16-byte limit on the next check
    let report = view.update();
    assert!(report.cache_full);
    assert_eq!(view.store().visible_data_size(Fidelity::Full), 32);

    let controller = StreamingController::from_config(&loaded.streaming);
    assert_eq!(controller.state(ViewId::new(1), rid(1)).max_depth, 2);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "[streaming]\nmax_depth = -3\n").unwrap();
    assert!(RelayConfig::from_file(&path).is_err());
    assert!(RelayConfig::from_file(&dir.path().join("missing.toml")).is_err());
}
