//! Run configuration of the `patch_reconcile` binary.
//!
//! A run is described by one JSON document:
//!
//! ```json
//! {
//!   "tiles": "tiles.json",
//!   "labels_dir": "labels/",
//!   "params": { "overlap_px": 210, "global_nms_iou": 0.6 },
//!   "output": { "geojson": "out/rocks.geojson", "report_json": "out/report.json", "format": "both" }
//! }
//! ```
//!
//! `tiles` is either an inline list of [`TileMeta`](crate::tiling::TileMeta)
//! records or the path of a JSON file holding that list.

pub mod run;

pub use run::{load_config, parse_cli, OutputConfig, OutputFormat, RunConfig, TileSource};
