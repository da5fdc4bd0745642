//! Diagnostics data model exposed by the reconciler.
//!
//! Split by scope: [`tile`] holds per-tile counters and audit records
//! (rejected detections, duplicate pairs, NMS suppressions), [`batch`] the
//! batch summary and the cross-tile round, [`timing`] the stage timings.
//! Everything serializes to JSON for the reporting side.

pub mod batch;
pub mod tile;
pub mod timing;

pub use batch::{BatchSummary, CrossTileRemoval, CrossTileStage, FailedTile};
pub use tile::{DuplicatePair, RejectedDetection, Suppression, TileDiagnostics};
pub use timing::{StageTiming, TimingBreakdown};
