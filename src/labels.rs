//! Detection label boundary.
//!
//! The detector writes one text file per patch, named after the patch
//! (`<tile_id>_<row>_<col>.txt`), one detection per line:
//!
//! ```text
//! class cx cy w h [score]
//! ```
//!
//! Values are whitespace separated and normalized to the patch size. A line
//! without a score is a ground-truth label and gets confidence `1.0`; fields
//! after the score are ignored. Unparsable lines are logged and skipped;
//! range checks are left to the unifier so that malformed values surface as
//! `MalformedDetection`.
//!
//! A detection's in-patch index is its position among the parsed lines of
//! the file, so skipped and blank lines do not count.

use crate::error::{ReconcileError, Result};
use crate::tiling::parse_patch_path;
use crate::types::{PatchDetections, RawDetection, TileId};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const LABEL_EXTENSION: &str = "txt";

/// Parses one label line; `Ok(None)` for blank lines.
pub fn parse_label_line(line: &str) -> std::result::Result<Option<RawDetection>, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.is_empty() {
        return Ok(None);
    }
    if fields.len() < 5 {
        return Err(format!("expected at least 5 fields, found {}", fields.len()));
    }
    let class_id = fields[0]
        .parse::<u32>()
        .map_err(|e| format!("class {:?}: {e}", fields[0]))?;
    let mut values = [1.0f32; 5];
    for (slot, field) in values.iter_mut().zip(&fields[1..]) {
        *slot = field
            .parse::<f32>()
            .map_err(|e| format!("value {field:?}: {e}"))?;
    }
    let [cx, cy, w, h, confidence] = values;
    Ok(Some(RawDetection::new(class_id, cx, cy, w, h, confidence)))
}

/// Parses the content of one label file. Bad lines come back as
/// [`ReconcileError::LabelParse`] records next to the good detections.
pub fn parse_labels(path: &Path, text: &str) -> (Vec<RawDetection>, Vec<ReconcileError>) {
    let mut detections = Vec::new();
    let mut errors = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        match parse_label_line(line) {
            Ok(Some(det)) => detections.push(det),
            Ok(None) => {}
            Err(reason) => errors.push(ReconcileError::LabelParse {
                path: path.to_path_buf(),
                line: idx + 1,
                reason,
            }),
        }
    }
    (detections, errors)
}

/// Reads one patch label file; the patch key comes from the file name.
pub fn load_label_file(path: &Path) -> Result<PatchDetections> {
    let patch = parse_patch_path(path).ok_or_else(|| ReconcileError::LabelParse {
        path: path.to_path_buf(),
        line: 0,
        reason: "file name is not <tile_id>_<row>_<col>".to_string(),
    })?;
    let text = fs::read_to_string(path).map_err(|e| ReconcileError::file("read", path, e))?;
    let (detections, errors) = parse_labels(path, &text);
    for err in &errors {
        warn!("skipping label line: {err}");
    }
    Ok(PatchDetections { patch, detections })
}

/// Loads every `*.txt` label file of a directory, grouped by tile.
///
/// Patches are sorted by key within each tile. Files whose names do not
/// carry a patch key are skipped with a warning.
pub fn load_labels_dir(dir: &Path) -> Result<BTreeMap<TileId, Vec<PatchDetections>>> {
    let mut by_tile: BTreeMap<TileId, Vec<PatchDetections>> = BTreeMap::new();
    let mut files = 0usize;
    let read_err = |e| ReconcileError::file("list", dir, e);
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(LABEL_EXTENSION) {
            continue;
        }
        match load_label_file(&path) {
            Ok(patch) => {
                files += 1;
                by_tile
                    .entry(patch.patch.tile_id.clone())
                    .or_default()
                    .push(patch);
            }
            Err(err @ ReconcileError::LabelParse { .. }) => warn!("skipping label file: {err}"),
            Err(err) => return Err(err),
        }
    }
    for patches in by_tile.values_mut() {
        patches.sort_by(|a, b| a.patch.cmp(&b.patch));
    }
    debug!(
        "loaded {files} label files for {} tiles from {}",
        by_tile.len(),
        dir.display()
    );
    Ok(by_tile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn score_column_is_optional() {
        let det = parse_label_line("0 0.5 0.25 0.1 0.2 0.87").unwrap().unwrap();
        assert_eq!(det.class_id, 0);
        assert_eq!((det.bbox.cx, det.bbox.cy), (0.5, 0.25));
        assert_eq!(det.confidence, 0.87);

        let truth = parse_label_line("3 0.5 0.5 0.1 0.1").unwrap().unwrap();
        assert_eq!(truth.confidence, 1.0);
    }

    #[test]
    fn blank_and_bad_lines() {
        assert_eq!(parse_label_line("   "), Ok(None));
        assert!(parse_label_line("0 0.5 0.5 0.1").is_err());
        assert!(parse_label_line("x 0.5 0.5 0.1 0.1").is_err());
        assert!(parse_label_line("0 0.5 nan? 0.1 0.1").is_err());
    }

    #[test]
    fn trailing_fields_are_ignored() {
        let det = parse_label_line("0 0.5 0.5 0.1 0.1 0.9 7 extra").unwrap().unwrap();
        assert_eq!(det.confidence, 0.9);
        assert_eq!((det.bbox.w, det.bbox.h), (0.1, 0.1));
    }

    #[test]
    fn bad_lines_do_not_abort_the_file() {
        let path = PathBuf::from("2587_1133_0_1.txt");
        let text = "0 0.5 0.5 0.1 0.1 0.9\ngarbage\n\n0 0.2 0.2 0.05 0.05 0.4\n";
        let (dets, errors) = parse_labels(&path, text);
        assert_eq!(dets.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ReconcileError::LabelParse { line: 2, .. }));
        // the second detection sits on line 4 but is the second parsed one
        assert_eq!(dets[1].confidence, 0.4);
    }

    #[test]
    fn out_of_range_values_still_parse() {
        // range validation belongs to the unifier
        let det = parse_label_line("0 1.4 0.5 0.1 0.1 0.9").unwrap().unwrap();
        assert!(det.validate().is_err());
    }
}
