use patch_reconcile::config::{self, OutputFormat, RunConfig};
use patch_reconcile::emit::{crs_slug, VectorLayer};
use patch_reconcile::io::write_json_file;
use patch_reconcile::labels::load_labels_dir;
use patch_reconcile::reconciler::assemble_inputs;
use patch_reconcile::{process_batch, BatchReport, Result, TileOutcome};
use std::env;
use std::path::{Path, PathBuf};

const LAYER_NAME: &str = "detections";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let program = env::args()
        .next()
        .unwrap_or_else(|| "patch_reconcile".to_string());
    let config = config::parse_cli(&program)?;

    let metas = config.tiles.load()?;
    let labels = load_labels_dir(&config.labels_dir)?;
    let (inputs, orphans) = assemble_inputs(metas, labels);

    let report = process_batch(inputs, &config.params)?.with_failed(orphans);

    let written = write_layers(&config, &report)?;

    if config.output.format.includes_text() {
        print_text_summary(&report);
        for path in &written {
            println!("GeoJSON written to {}", path.display());
        }
    }

    if config.output.format.includes_json() {
        if let Some(path) = &config.output.report_json {
            write_json_file(path, &report)?;
            if config.output.format.includes_text() {
                println!("\nJSON report written to {}", path.display());
            } else {
                println!("JSON report written to {}", path.display());
            }
        } else {
            let json = serde_json::to_string_pretty(&report)?;
            if config.output.format == OutputFormat::Both {
                println!("\nJSON report:\n{json}");
            } else {
                println!("{json}");
            }
        }
    } else if let Some(path) = &config.output.report_json {
        write_json_file(path, &report)?;
    }

    Ok(())
}

/// Writes one GeoJSON file per CRS; a single-CRS batch uses the configured
/// path as is.
fn write_layers(config: &RunConfig, report: &BatchReport) -> Result<Vec<PathBuf>> {
    let Some(base) = &config.output.geojson else {
        return Ok(Vec::new());
    };
    let layers: Vec<VectorLayer> = report.layers(LAYER_NAME);
    let single = layers.len() == 1;
    let mut written = Vec::with_capacity(layers.len());
    for layer in &layers {
        let path = if single {
            base.clone()
        } else {
            suffixed(base, &crs_slug(&layer.crs))
        };
        layer.write_geojson(&path)?;
        written.push(path);
    }
    Ok(written)
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| LAYER_NAME.to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "geojson".to_string());
    path.with_file_name(format!("{stem}_{suffix}.{ext}"))
}

fn print_text_summary(report: &BatchReport) {
    let s = &report.summary;
    println!("Reconciliation summary");
    println!(
        "  tiles: {} ({} resolved, {} empty, {} failed)",
        s.tiles_total, s.tiles_resolved, s.tiles_empty, s.tiles_failed
    );
    println!("  raw detections: {}", s.raw_detections);
    println!("  malformed: {}", s.malformed);
    println!("  clusters: {}", s.clusters);
    println!("  duplicates removed: {}", s.duplicates_removed);
    println!("  global NMS removed: {}", s.global_nms_removed);
    if let Some(cross) = &report.cross_tile {
        println!(
            "  cross-tile removed: {} ({} tile pairs, {} candidates)",
            cross.removed.len(),
            cross.tile_pairs,
            cross.candidates
        );
    }
    println!("  resolved: {}", s.resolved);

    println!("Tiles");
    for outcome in &report.outcomes {
        match outcome {
            TileOutcome::Resolved(r) => println!(
                "  {:<16} resolved {:>6}  crs={} raw={} dup={} nms={} ({:.1} ms)",
                r.tile_id().to_string(),
                r.resolved.len(),
                r.crs(),
                r.diagnostics.raw_detections,
                r.diagnostics.duplicates_removed,
                r.diagnostics.global_nms_removed,
                r.diagnostics.timings.total_ms
            ),
            TileOutcome::Empty(r) => println!(
                "  {:<16} empty          raw={} malformed={}",
                r.tile_id().to_string(),
                r.diagnostics.raw_detections,
                r.diagnostics.malformed.len()
            ),
            TileOutcome::Failed(f) => {
                println!("  {:<16} FAILED         {}", f.tile_id.to_string(), f.reason)
            }
        }
    }

    if !report.failed().is_empty() {
        println!("Failed tiles");
        for failed in report.failed() {
            println!("  {}: {}", failed.tile_id, failed.reason);
        }
    }
}
