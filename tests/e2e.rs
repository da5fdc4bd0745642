mod common;

use common::synthetic_tile::{patch, raw, raw_at_global, tile_meta};
use patch_reconcile::labels::load_labels_dir;
use patch_reconcile::prelude::*;
use patch_reconcile::reconciler::assemble_inputs;
use patch_reconcile::tiling::PatchGrid;
use patch_reconcile::{ReconcileError, TileOutcome, TileReport};
use std::fs;

const TILE: &str = "2587_1133";

fn tile(patches: Vec<PatchDetections>) -> TileInput {
    TileInput::new(tile_meta(TILE, 1500, 2_587_000.0, 1_134_000.0), patches)
}

fn process(patches: Vec<PatchDetections>, params: ReconcileParams) -> TileReport {
    let processor = TileProcessor::new(params).expect("valid params");
    processor.process(&tile(patches)).expect("tile is georeferenced")
}

#[test]
fn detections_114px_apart_stay_separate() {
    let _ = env_logger::builder().is_test(true).try_init();
    let report = process(
        vec![
            patch(TILE, 0, 0, vec![raw(0.5, 0.9, 0.8)]),
            patch(TILE, 1, 0, vec![raw(0.5, 0.05, 0.7)]),
        ],
        ReconcileParams::default(),
    );

    let mut ys: Vec<f64> = report
        .resolved
        .iter()
        .map(|r| r.detection.pixel.cy)
        .collect();
    ys.sort_by(f64::total_cmp);
    assert_eq!(ys.len(), 2);
    assert!((ys[0] - 462.0).abs() < 1e-3, "y = {}", ys[0]);
    assert!((ys[1] - 576.0).abs() < 1e-3, "y = {}", ys[1]);

    let d = &report.diagnostics;
    assert_eq!(d.clusters, 2);
    assert_eq!(d.duplicates_removed, 0);
    assert!(d.duplicate_pairs.is_empty());
    assert_eq!(d.comparisons, 1);
}

#[test]
fn observations_3px_apart_merge() {
    let report = process(
        vec![
            patch(TILE, 0, 0, vec![raw_at_global(0, 0, 320.0, 576.0, 0.6)]),
            patch(TILE, 1, 0, vec![raw_at_global(1, 0, 320.0, 579.0, 0.8)]),
        ],
        ReconcileParams::default(),
    );

    assert_eq!(report.resolved.len(), 1);
    let kept = &report.resolved[0];
    assert_eq!((kept.id().patch.row, kept.id().patch.col), (1, 0));
    assert_eq!(kept.cluster_size, 2);
    assert_eq!(kept.discarded.len(), 1);
    assert_eq!(kept.discarded[0].confidence, 0.6);

    let pair = &report.diagnostics.duplicate_pairs[0];
    assert!((pair.distance_px - 3.0).abs() < 1e-3);
    assert_eq!(report.diagnostics.duplicates_removed, 1);
}

#[test]
fn heavy_overlap_never_pairs_non_adjacent_patches() {
    // stride 140: global x = 400 lies in patches (0, 0) and (0, 2)
    let report = process(
        vec![
            patch(TILE, 0, 0, vec![raw(0.625, 0.5, 0.8)]),
            patch(TILE, 0, 2, vec![raw(0.1875, 0.5, 0.7)]),
        ],
        ReconcileParams {
            overlap_px: 500,
            ..Default::default()
        },
    );
    assert_eq!(report.diagnostics.comparisons, 0);
    assert!(report.diagnostics.duplicate_pairs.is_empty());
    assert_eq!(report.resolved.len(), 2);
}

#[test]
fn disabling_both_rules_keeps_every_detection() {
    let report = process(
        vec![
            patch(TILE, 0, 0, vec![raw_at_global(0, 0, 320.0, 576.0, 0.6)]),
            patch(TILE, 1, 0, vec![raw_at_global(1, 0, 320.0, 576.0, 0.8)]),
        ],
        ReconcileParams {
            distance_threshold_px: 0.0,
            iou_threshold: 0.0,
            ..Default::default()
        },
    );
    assert_eq!(report.resolved.len(), 2);
    assert_eq!(report.diagnostics.comparisons, 0);
}

#[test]
fn global_nms_catches_same_patch_duplicates() {
    let twins = || vec![patch(TILE, 0, 0, vec![raw(0.5, 0.5, 0.9), raw(0.501, 0.5, 0.7)])];

    let without = process(twins(), ReconcileParams::default());
    assert_eq!(without.resolved.len(), 2);
    assert_eq!(without.diagnostics.global_nms_removed, 0);

    let with = process(
        twins(),
        ReconcileParams {
            global_nms_iou: 0.3,
            ..Default::default()
        },
    );
    assert_eq!(with.resolved.len(), 1);
    assert_eq!(with.resolved[0].confidence(), 0.9);
    assert_eq!(with.diagnostics.global_nms_removed, 1);
    assert_eq!(with.diagnostics.suppressed[0].suppressed_by.index, 0);
}

#[test]
fn polygons_stay_in_tile_crs() {
    let report = process(
        vec![patch(TILE, 0, 0, vec![raw(0.5, 0.9, 0.8)])],
        ReconcileParams::default(),
    );
    let layer = report.to_layer().expect("one detection survives");
    assert_eq!(layer.crs, "EPSG:2056");

    let feature = &layer.features[0];
    let ring = feature.exterior_ring();
    assert_eq!(ring.len(), 5);
    // pixel box (313.6, 569.6)-(326.4, 582.4) at 0.5 m/px, north-up
    let [x, y] = ring[0];
    assert!((x - 2_587_156.8).abs() < 1e-3, "x = {x}");
    assert!((y - 1_133_715.2).abs() < 1e-3, "y = {y}");
    assert_eq!(feature.properties.source_tile_id.as_str(), TILE);
    assert_eq!(feature.properties.cluster_size, 1);

    let json = layer.to_geojson();
    assert_eq!(json["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::2056");
}

#[test]
fn empty_tile_is_a_status_not_a_failure() {
    let report = process_batch(vec![tile(Vec::new())], &ReconcileParams::default()).unwrap();
    assert_eq!(report.summary.tiles_empty, 1);
    assert_eq!(report.summary.tiles_failed, 0);
    assert!(report.layers("detections").is_empty());

    let TileOutcome::Empty(tile_report) = &report.outcomes[0] else {
        panic!("expected an empty outcome, got {:?}", report.outcomes[0]);
    };
    assert!(tile_report.resolved.is_empty());
    let err = tile_report.to_layer().unwrap_err();
    assert!(err.is_empty_result());
}

#[test]
fn malformed_detections_only_drop_themselves() {
    let report = process(
        vec![patch(
            TILE,
            0,
            0,
            vec![raw(0.5, 0.5, 0.9), raw(1.2, 0.5, 0.9), raw(0.2, 0.2, 1.4)],
        )],
        ReconcileParams::default(),
    );
    assert_eq!(report.resolved.len(), 1);
    let rejected: Vec<u32> = report
        .diagnostics
        .malformed
        .iter()
        .map(|r| r.id.index)
        .collect();
    assert_eq!(rejected, vec![1, 2]);
}

#[test]
fn bad_tiles_do_not_abort_the_batch() {
    let _ = env_logger::builder().is_test(true).try_init();
    let good = tile(vec![patch(TILE, 0, 0, vec![raw(0.5, 0.5, 0.9)])]);
    let no_transform = TileInput::new(
        TileMeta {
            transform: None,
            ..tile_meta("2588_1133", 1500, 2_588_000.0, 1_134_000.0)
        },
        vec![patch("2588_1133", 0, 0, vec![raw(0.5, 0.5, 0.9)])],
    );
    let no_crs = TileInput::new(
        TileMeta {
            crs: None,
            ..tile_meta("2586_1133", 1500, 2_586_000.0, 1_134_000.0)
        },
        Vec::new(),
    );

    let report = process_batch(vec![no_transform, good, no_crs], &ReconcileParams::default()).unwrap();
    let ids: Vec<&str> = report.outcomes.iter().map(|o| o.tile_id().as_str()).collect();
    assert_eq!(ids, vec!["2586_1133", "2587_1133", "2588_1133"]);
    assert!(report.outcomes[0].is_failed());
    assert!(matches!(report.outcomes[1], TileOutcome::Resolved(_)));
    assert!(report.outcomes[2].is_failed());

    let failed = report.failed();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|f| f.reason.contains("georeferencing")));
    assert_eq!(report.summary.resolved, 1);
}

#[test]
fn fallback_crs_rescues_tiles_without_crs() {
    let input = TileInput::new(
        TileMeta {
            crs: None,
            ..tile_meta(TILE, 1500, 2_587_000.0, 1_134_000.0)
        },
        vec![patch(TILE, 0, 0, vec![raw(0.5, 0.5, 0.9)])],
    );
    let params = ReconcileParams {
        fallback_crs: Some("EPSG:2056".to_string()),
        ..Default::default()
    };
    let report = process_batch(vec![input], &params).unwrap();
    assert_eq!(report.summary.tiles_resolved, 1);
    assert_eq!(report.outcomes[0].report().unwrap().crs(), "EPSG:2056");
}

#[test]
fn duplicate_tile_ids_fail_both_copies() {
    let report = process_batch(vec![tile(Vec::new()), tile(Vec::new())], &ReconcileParams::default()).unwrap();
    assert_eq!(report.summary.tiles_failed, 2);
}

#[test]
fn invalid_parameters_abort_the_batch() {
    let params = ReconcileParams {
        patch_size: 640,
        overlap_px: 700,
        ..Default::default()
    };
    let err = process_batch(vec![tile(Vec::new())], &params).unwrap_err();
    assert!(matches!(err, ReconcileError::Configuration(_)));
}

#[test]
fn grid_covers_tile_with_exact_overlaps() {
    let extents = [(640, 640), (1000, 700), (1500, 1500), (2000, 1234), (10, 5000)];
    let configs = [(640, 210), (256, 0), (512, 300)];
    for &(w, h) in &extents {
        for &(p, o) in &configs {
            let grid = PatchGrid::new(w, h, p, o).unwrap();
            let s = p - o;
            let windows: Vec<_> = grid.windows().collect();
            assert_eq!(windows.len(), (grid.rows() * grid.cols()) as usize);

            let columns: Vec<_> = windows.iter().filter(|win| win.row == 0).collect();
            let rows: Vec<_> = windows.iter().filter(|win| win.col == 0).collect();

            for (i, win) in columns.iter().enumerate() {
                assert_eq!(win.x, i as u32 * s);
                assert!(win.width <= p);
                if i + 1 < columns.len() {
                    assert_eq!(win.width, p, "only the last column may be short");
                    assert_eq!(win.x + win.width - columns[i + 1].x, o, "overlap of ({w},{h},{p},{o})");
                }
            }
            let last = columns[columns.len() - 1];
            assert_eq!(last.x + last.width, w, "columns of ({w},{h},{p},{o}) must reach the edge");

            for (i, win) in rows.iter().enumerate() {
                assert_eq!(win.y, i as u32 * s);
                if i + 1 < rows.len() {
                    assert_eq!(win.y + win.height - rows[i + 1].y, o);
                }
            }
            let last = rows[rows.len() - 1];
            assert_eq!(last.y + last.height, h);
        }
    }
}

#[test]
fn labels_on_disk_reconcile_end_to_end() {
    let dir = std::env::temp_dir().join(format!("patch_reconcile_e2e_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("2587_1133_0_0.txt"), "0 0.5 0.9 0.02 0.02 0.6\n").unwrap();
    fs::write(
        dir.join("2587_1133_1_0.txt"),
        "0 0.5 0.2328125 0.02 0.02 0.8\nnot a label line\n",
    )
    .unwrap();
    fs::write(dir.join("9999_9999_0_0.txt"), "0 0.5 0.5 0.02 0.02 0.5\n").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();

    let labels = load_labels_dir(&dir).unwrap();
    fs::remove_dir_all(&dir).unwrap();
    assert_eq!(labels.len(), 2);

    let (inputs, orphans) = assemble_inputs(
        vec![tile_meta(TILE, 1500, 2_587_000.0, 1_134_000.0)],
        labels,
    );
    assert_eq!(inputs[0].patches.len(), 2);
    let report = process_batch(inputs, &ReconcileParams::default())
        .unwrap()
        .with_failed(orphans);

    assert_eq!(report.summary.tiles_total, 2);
    assert_eq!(report.summary.tiles_failed, 1);
    assert_eq!(report.failed()[0].tile_id.as_str(), "9999_9999");
    assert_eq!(report.summary.raw_detections, 2);
    assert_eq!(report.summary.resolved, 1);
    assert_eq!(report.summary.duplicates_removed, 1);
}
