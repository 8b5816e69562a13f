//! Progressive refinement driven through the controller, end to end

use crate::common::*;
use relay::{
    ActiveSelection, CommandOutcome, IgnoreReason, RecordingRenderer, RefinementMode,
    StreamingController, View, ViewId,
};

const VIEW: u32 = 3;

fn refining_view(max_depth: u32) -> (View, ActiveSelection, RecordingRenderer) {
    init_tracing();
    let renderer = RecordingRenderer::new();
    let mut view =
        View::local(ViewId::new(VIEW), streaming_config()).with_renderer(Box::new(renderer.clone()));
    view.add_representation(progressive(1, max_depth)).unwrap();
    view.add_representation(geometry(2, 8)).unwrap();
    view.update();

    let mut selection = ActiveSelection::new();
    assert!(selection.on_selection_changed(Some(&mut view), Some(rid(1))));
    (view, selection, renderer)
}

fn depth(view: &mut View) -> u32 {
    view.streaming_facet(rid(1)).map_or(0, |facet| facet.current_depth())
}

#[test]
fn test_depth_cap_stops_refinement() {
    let (mut view, selection, renderer) = refining_view(10);
    let mut controller = StreamingController::new();
    controller.set_max_depth(&selection, &view, -1).unwrap();
    controller.set_max_depth(&selection, &view, 3).unwrap();

    for _ in 0..5 {
        controller.refine(&selection, &mut view).unwrap();
    }
    assert_eq!(depth(&mut view), 3);
    assert_eq!(renderer.last().unwrap().streamed, 3);
}

#[test]
fn test_interrupt_ends_automatic_passes() {
    let (mut view, selection, renderer) = refining_view(10);
    let mut controller = StreamingController::new();
    controller
        .set_refinement_mode(&selection, &mut view, RefinementMode::Automatic)
        .unwrap();
    controller.tick(&selection, &mut view).unwrap();
    controller.tick(&selection, &mut view).unwrap();
    assert_eq!(depth(&mut view), 2);
    let frames = renderer.count();

    controller.interrupt(&selection, &mut view).unwrap();
    assert_eq!(controller.state(ViewId::new(VIEW), rid(1)).mode, RefinementMode::Manual);
    // the partial result is presented once
    assert_eq!(renderer.count(), frames + 1);
    assert_eq!(renderer.last().unwrap().streamed, 2);

    for _ in 0..3 {
        assert_eq!(
            controller.tick(&selection, &mut view).unwrap(),
            CommandOutcome::Ignored(IgnoreReason::ManualMode)
        );
    }
    assert_eq!(depth(&mut view), 2);
    assert_eq!(renderer.count(), frames + 1);
}

#[test]
fn test_automatic_refinement_runs_to_completion() {
    let (mut view, selection, _) = refining_view(4);
    let mut controller = StreamingController::new();
    controller
        .set_refinement_mode(&selection, &mut view, RefinementMode::Automatic)
        .unwrap();

    let mut applied = 0;
    while controller.tick(&selection, &mut view).unwrap().is_applied() {
        applied += 1;
        assert!(applied <= 4);
    }
    assert_eq!(applied, 4);
    assert_eq!(
        controller.tick(&selection, &mut view).unwrap(),
        CommandOutcome::Ignored(IgnoreReason::RefinementComplete)
    );
}

#[test]
fn test_lock_freezes_then_releases() {
    let (mut view, selection, _) = refining_view(10);
    let mut controller = StreamingController::new();
    controller.set_locked(&selection, &view, true).unwrap();
    for _ in 0..3 {
        assert_eq!(
            controller.refine(&selection, &mut view).unwrap(),
            CommandOutcome::Ignored(IgnoreReason::Locked)
        );
    }
    assert_eq!(depth(&mut view), 0);

    controller.set_locked(&selection, &view, false).unwrap();
    assert!(controller.refine(&selection, &mut view).unwrap().is_applied());
    assert_eq!(depth(&mut view), 1);
}

#[test]
fn test_restart_while_locked_keeps_refinement() {
    let (mut view, selection, _) = refining_view(10);
    let mut controller = StreamingController::new();
    controller.refine(&selection, &mut view).unwrap();
    controller.refine(&selection, &mut view).unwrap();
    controller.set_locked(&selection, &view, true).unwrap();

    assert_eq!(
        controller.restart_refinement(&selection, &mut view).unwrap(),
        CommandOutcome::Ignored(IgnoreReason::Locked)
    );
    assert_eq!(depth(&mut view), 2);
    assert_eq!(view.store().streamed_pieces(rid(1)).len(), 2);

    controller.set_locked(&selection, &view, false).unwrap();
    assert!(controller.restart_refinement(&selection, &mut view).unwrap().is_applied());
    assert_eq!(depth(&mut view), 0);
}

#[test]
fn test_non_streaming_selection_is_not_tracked() {
    let (mut view, mut selection, _) = refining_view(4);
    assert!(!selection.on_selection_changed(Some(&mut view), Some(rid(2))));

    let mut controller = StreamingController::new();
    assert!(controller.refine(&selection, &mut view).is_err());
    assert_eq!(depth(&mut view), 0);
}
