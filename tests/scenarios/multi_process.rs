//! Views on several ranks joined by an in-process thread group

use crate::common::*;
use relay::{
    Communicator, DataObject, DataRequest, FnSource, FrameReport, GeometryRepresentation, MoveMode, Piece,
    RecordingRenderer, RelayConfig, Representation, ThreadGroup, View, ViewId,
};
use std::sync::Arc;

const RANKS: usize = 3;

/// Run one frame per rank with `reps` built fresh on each rank
fn run_frame<F>(config: &RelayConfig, reps: F) -> Vec<(FrameReport, RecordingRenderer)>
where
    F: Fn() -> Vec<Box<dyn Representation>> + Sync,
{
    init_tracing();
    ThreadGroup::run(RANKS, |comm| {
        let renderer = RecordingRenderer::new();
        let mut view = View::new(ViewId::new(1), Arc::new(comm), config.clone())
            .with_renderer(Box::new(renderer.clone()));
        for rep in reps() {
            view.add_representation(rep).unwrap();
        }
        (view.update(), renderer)
    })
}

fn one_geometry() -> Vec<Box<dyn Representation>> {
    vec![geometry(1, 10) as Box<dyn Representation>]
}

#[test]
fn test_small_scene_collects_to_root() {
    let config = config_from("[delivery]\nmode = \"auto\"\nremote_render_threshold = 100\n");
    let results = run_frame(&config, one_geometry);

    for (report, _) in &results {
        assert_eq!(report.global_size, 30);
        assert_eq!(report.mode, MoveMode::CollectToRoot);
        assert_eq!(report.delivered_full.as_slice(), &[rid(1)]);
    }
    let root = results[0].1.last().unwrap();
    assert_eq!(root.bytes, 30);
    assert!(results[0].0.rendered);
    for (report, renderer) in &results[1..] {
        assert!(!report.rendered);
        assert_eq!(renderer.count(), 0);
    }
}

#[test]
fn test_large_scene_renders_in_place() {
    let config = config_from("[delivery]\nmode = \"auto\"\nremote_render_threshold = 20\n");
    let results = run_frame(&config, one_geometry);

    for (report, renderer) in &results {
        assert_eq!(report.mode, MoveMode::PassThrough);
        assert_eq!(renderer.last().unwrap().bytes, 10);
    }
}

#[test]
fn test_always_clone_reaches_every_rank() {
    let config = config_from("[delivery]\nmode = \"collect\"\n");
    let results = run_frame(&config, || {
        let mut overlay = GeometryRepresentation::new(rid(2), CountingSource::new(4).shared())
            .with_always_clone(true);
        overlay.set_visibility(true);
        vec![geometry(1, 10) as Box<dyn Representation>, Box::new(overlay)]
    });

    assert_eq!(results[0].1.last().unwrap().bytes, 30 + 12);
    for (report, _) in &results[1..] {
        assert_eq!(report.mode, MoveMode::CollectToRoot);
        assert!(!report.rendered);
    }
}

#[test]
fn test_redistribute_balances_pieces() {
    let config = config_from("[delivery]\nmode = \"pass-through\"\nredistribute = true\n");
    let results = run_frame(&config, || {
        let source = FnSource::new(|request: &DataRequest| {
            let pieces = if request.rank == 0 {
                (0..RANKS).map(|_| Piece::new(0, vec![5u8; 6])).collect()
            } else {
                Vec::new()
            };
            Ok(DataObject::new(pieces).into_handle())
        })
        .shared();
        let mut rep = GeometryRepresentation::new(rid(1), source).with_redistributable(true);
        rep.set_visibility(true);
        vec![Box::new(rep) as Box<dyn Representation>]
    });

    for (report, renderer) in &results {
        assert_eq!(report.mode, MoveMode::PassThrough);
        assert_eq!(renderer.last().unwrap().bytes, 6);
    }
}

#[test]
fn test_second_frame_is_quiet_on_every_rank() {
    let config = config_from("[delivery]\nmode = \"clone\"\n");
    let results = ThreadGroup::run(RANKS, |comm| {
        let mut view = View::new(ViewId::new(1), Arc::new(comm), config.clone());
        view.add_representation(geometry(1, 10)).unwrap();
        let first = view.update();
        let second = view.update();
        (first.delivered_full.len(), second.delivered_full.len(), view.delivery_metrics())
    });

    for (first, second, metrics) in results {
        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert_eq!(metrics.rounds, 1);
    }
}

#[test]
fn test_rank_without_fresh_data_still_joins_the_move() {
    let config = config_from("[delivery]\nmode = \"collect\"\n");
    let results = ThreadGroup::run(RANKS, |comm| {
        let rank = comm.rank();
        let renderer = RecordingRenderer::new();
        let mut view = View::new(ViewId::new(1), Arc::new(comm), config.clone())
            .with_renderer(Box::new(renderer.clone()));
        view.add_representation(geometry(1, 10)).unwrap();
        view.update();

        // only rank 2 produces again; the others still participate
        if rank == 2 {
            view.representation_mut(rid(1)).unwrap().mark_modified();
        }
        let report = view.update();
        (report.delivered_full.len(), renderer)
    });

    for (delivered, _) in &results {
        assert_eq!(*delivered, 1);
    }
    assert_eq!(results[0].1.last().unwrap().bytes, 30);
}
