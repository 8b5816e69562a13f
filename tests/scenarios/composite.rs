//! Composite switching inside a live view

use crate::common::*;
use proptest::prelude::*;
use relay::{
    CompositeRepresentation, Fidelity, GeometryRepresentation, RecordingRenderer, RelayConfig,
    RelayError, Representation, RepresentationId, UpdateOutcome, View, ViewId,
};

const COMPOSITE: u32 = 10;
const GEOM: u32 = 11;
const AXES: u32 = 12;

fn composite_view() -> View {
    init_tracing();
    let mut view = View::local(ViewId::new(1), RelayConfig::default());
    let mut composite = CompositeRepresentation::new(rid(COMPOSITE));
    composite.set_visibility(true);
    view.add_representation(Box::new(composite)).unwrap();
    view.add_to_composite(rid(COMPOSITE), "geom", hidden_geometry(GEOM, 64))
        .unwrap();
    view.add_to_composite(rid(COMPOSITE), "axes", hidden_geometry(AXES, 8))
        .unwrap();
    view
}

/// Composite whose "geom" child reads from `source`
fn counted_composite_view(source: &CountingSource) -> View {
    init_tracing();
    let mut view = View::local(ViewId::new(1), RelayConfig::default());
    let mut composite = CompositeRepresentation::new(rid(COMPOSITE));
    composite.set_visibility(true);
    view.add_representation(Box::new(composite)).unwrap();
    let geom = GeometryRepresentation::new(rid(GEOM), source.shared());
    view.add_to_composite(rid(COMPOSITE), "geom", Box::new(geom))
        .unwrap();
    view.add_to_composite(rid(COMPOSITE), "axes", hidden_geometry(AXES, 8))
        .unwrap();
    view
}

fn composite(view: &View) -> &CompositeRepresentation {
    match view
        .representation(rid(COMPOSITE))
        .and_then(|rep| rep.as_composite())
    {
        Some(composite) => composite,
        None => panic!("composite missing from view"),
    }
}

fn child_visible(view: &View, key: &str) -> bool {
    composite(view)
        .child(key)
        .map_or(false, |child| child.state().is_visible())
}

#[test]
fn test_children_start_detached() {
    let view = composite_view();
    assert!(!view.host().is_attached(rid(GEOM)));
    assert!(!view.host().is_attached(rid(AXES)));
    assert_eq!(composite(&view).keys(), vec!["axes", "geom"]);
}

#[test]
fn test_switch_moves_attachment_and_visibility() {
    let mut view = composite_view();
    view.set_active_representation(rid(COMPOSITE), "geom").unwrap();
    assert!(view.host().is_attached(rid(GEOM)));
    assert!(child_visible(&view, "geom"));

    view.set_active_representation(rid(COMPOSITE), "axes").unwrap();
    assert!(!view.host().is_attached(rid(GEOM)));
    assert!(view.host().is_attached(rid(AXES)));
    assert!(child_visible(&view, "axes"));
    assert!(!child_visible(&view, "geom"));
    assert_eq!(composite(&view).active_key(), Some("axes"));
}

#[test]
fn test_only_active_child_reaches_the_frame() {
    let renderer = RecordingRenderer::new();
    let mut view = composite_view().with_renderer(Box::new(renderer.clone()));
    view.set_active_representation(rid(COMPOSITE), "geom").unwrap();
    let report = view.update();
    assert_eq!(report.outcome(rid(COMPOSITE)), Some(&UpdateOutcome::Updated));
    assert_eq!(view.store().visible_data_size(Fidelity::Full), 64);

    view.set_active_representation(rid(COMPOSITE), "axes").unwrap();
    view.update();
    assert_eq!(view.store().visible_data_size(Fidelity::Full), 8);

    let last = renderer.last().unwrap();
    let ids: Vec<RepresentationId> = last.items.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![rid(AXES)]);
}

#[test]
fn test_switching_back_reuses_produced_geometry() {
    let source = CountingSource::new(64);
    let renderer = RecordingRenderer::new();
    let mut view = counted_composite_view(&source).with_renderer(Box::new(renderer.clone()));

    view.set_active_representation(rid(COMPOSITE), "geom").unwrap();
    view.update();
    view.set_active_representation(rid(COMPOSITE), "axes").unwrap();
    view.update();
    view.set_active_representation(rid(COMPOSITE), "geom").unwrap();
    let report = view.update();

    assert_eq!(source.calls(), 1);
    assert_eq!(report.outcome(rid(COMPOSITE)), Some(&UpdateOutcome::Unchanged));
    assert_eq!(view.store().visible_data_size(Fidelity::Full), 64);
    let last = renderer.last().unwrap();
    let ids: Vec<RepresentationId> = last.items.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![rid(GEOM)]);
}

#[test]
fn test_switching_back_after_time_change_reexecutes() {
    let source = CountingSource::new(64);
    let mut view = counted_composite_view(&source);

    view.set_active_representation(rid(COMPOSITE), "geom").unwrap();
    view.update();
    view.set_active_representation(rid(COMPOSITE), "axes").unwrap();
    view.set_time(Some(2.0));
    view.update();
    view.set_active_representation(rid(COMPOSITE), "geom").unwrap();
    view.update();

    assert_eq!(source.calls(), 2);
}

#[test]
fn test_unknown_key_leaves_nothing_active() {
    let mut view = composite_view();
    view.set_active_representation(rid(COMPOSITE), "geom").unwrap();
    let err = view
        .set_active_representation(rid(COMPOSITE), "volume")
        .unwrap_err();
    assert!(matches!(err, RelayError::UnknownCompositeKey(_)));
    assert_eq!(composite(&view).active_key(), None);
    assert_eq!(view.host().attached_count(), 0);
}

#[test]
fn test_switching_on_non_composite_is_rejected() {
    let mut view = composite_view();
    view.add_representation(geometry(20, 4)).unwrap();
    assert!(view.set_active_representation(rid(20), "geom").is_err());
    assert!(view.set_active_representation(rid(99), "geom").is_err());
}

#[test]
fn test_removing_active_child_detaches_it() {
    let mut view = composite_view();
    view.set_active_representation(rid(COMPOSITE), "geom").unwrap();
    let removed = view.remove_from_composite(rid(COMPOSITE), "geom").unwrap();
    assert_eq!(removed.id(), rid(GEOM));
    assert!(!removed.state().is_visible());
    assert!(!view.host().is_attached(rid(GEOM)));
    assert!(!view.store().is_registered(rid(GEOM)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// At most one child is attached after any switch sequence, and it is
    /// the active one.
    #[test]
    fn prop_composite_exclusivity(keys in proptest::collection::vec(0usize..4, 1..16)) {
        let names = ["geom", "axes", "labels", "missing"];
        let mut view = composite_view();
        view.add_to_composite(rid(COMPOSITE), "labels", hidden_geometry(13, 2)).unwrap();

        for key in keys {
            let _ = view.set_active_representation(rid(COMPOSITE), names[key]);
            let attached: Vec<_> = [GEOM, AXES, 13]
                .into_iter()
                .filter(|id| view.host().is_attached(rid(*id)))
                .collect();
            prop_assert!(attached.len() <= 1);

            let active = composite(&view).active_key().map(str::to_string);
            match active {
                Some(key) => {
                    let id = composite(&view).child(&key).map(|c| c.id());
                    prop_assert_eq!(attached.first().map(|id| rid(*id)), id);
                }
                None => prop_assert!(attached.is_empty()),
            }
        }
    }
}
