//! One broken representation never blanks the rest of the view

use crate::common::*;
use relay::{
    Fidelity, GeometryRepresentation, RecordingRenderer, RelayConfig, Representation,
    UpdateOutcome, View, ViewId,
};

fn broken(id: u32) -> Box<GeometryRepresentation> {
    let mut rep = GeometryRepresentation::new(rid(id), failing_source());
    rep.set_visibility(true);
    Box::new(rep)
}

#[test]
fn test_failing_representation_is_reported_and_isolated() {
    init_tracing();
    let renderer = RecordingRenderer::new();
    let mut view =
        View::local(ViewId::new(1), RelayConfig::default()).with_renderer(Box::new(renderer.clone()));
    view.add_representation(geometry(1, 40)).unwrap();
    view.add_representation(broken(2)).unwrap();
    view.add_representation(geometry(3, 2)).unwrap();

    let report = view.update();
    assert!(report.has_failures());
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, rid(2));
    assert_eq!(report.outcome(rid(1)), Some(&UpdateOutcome::Updated));
    assert_eq!(report.outcome(rid(3)), Some(&UpdateOutcome::Updated));

    assert_eq!(view.store().visible_data_size(Fidelity::Full), 42);
    let frame = renderer.last().unwrap();
    assert_eq!(frame.items.len(), 2);
    assert_eq!(frame.bytes, 42);
}

#[test]
fn test_failed_representation_retries_next_frame() {
    let mut view = View::local(ViewId::new(1), RelayConfig::default());
    view.add_representation(broken(2)).unwrap();

    let first = view.update();
    assert!(first.outcome(rid(2)).map_or(false, UpdateOutcome::is_failure));
    let second = view.update();
    assert!(second.outcome(rid(2)).map_or(false, UpdateOutcome::is_failure));

    // a fixed upstream recovers without re-adding the representation
    let source = CountingSource::new(12);
    view.representation_mut(rid(2))
        .unwrap()
        .set_input(Some(source.shared()));
    let third = view.update();
    assert_eq!(third.outcome(rid(2)), Some(&UpdateOutcome::Updated));
    assert_eq!(source.calls(), 1);
    assert_eq!(view.store().visible_data_size(Fidelity::Full), 12);
}

#[test]
fn test_removed_representation_leaves_store() {
    let mut view = View::local(ViewId::new(1), RelayConfig::default());
    view.add_representation(geometry(1, 8)).unwrap();
    view.update();

    let removed = view.remove_representation(rid(1)).unwrap();
    assert_eq!(removed.id(), rid(1));
    assert!(!view.store().is_registered(rid(1)));
    assert!(view.remove_representation(rid(1)).is_err());

    let report = view.update();
    assert!(report.outcomes.is_empty());
    assert!(report.delivered_full.is_empty());
}
