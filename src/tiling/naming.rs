//! Stable patch identifiers.
//!
//! Patch files are named `<tile_id>_<row>_<col>` where the tile id may itself
//! contain underscores (`2587_1133_0_3` → tile `2587_1133`, row 0, col 3).
//! Grid position always comes from the name, never from listing order.

use crate::types::{PatchKey, TileId};
use std::path::Path;

/// Parses a patch file stem; `None` when the trailing row/col fields are missing.
pub fn parse_patch_stem(stem: &str) -> Option<PatchKey> {
    let mut parts = stem.rsplitn(3, '_');
    let col = parts.next()?.parse::<u32>().ok()?;
    let row = parts.next()?.parse::<u32>().ok()?;
    let tile = parts.next()?;
    if tile.is_empty() {
        return None;
    }
    Some(PatchKey::new(TileId::new(tile), row, col))
}

/// Parses the patch key from a file path, ignoring the extension.
pub fn parse_patch_path(path: &Path) -> Option<PatchKey> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(parse_patch_stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_id_keeps_inner_underscores() {
        let key = parse_patch_stem("2587_1133_0_3").unwrap();
        assert_eq!(key.tile_id.as_str(), "2587_1133");
        assert_eq!((key.row, key.col), (0, 3));
        assert_eq!(key.to_string(), "2587_1133_0_3");
    }

    #[test]
    fn paths_with_extensions_parse() {
        let key = parse_patch_path(Path::new("labels/2600_1200_4_1.txt")).unwrap();
        assert_eq!(key, PatchKey::new(TileId::new("2600_1200"), 4, 1));
    }

    #[test]
    fn malformed_stems_are_rejected() {
        for stem in ["", "tile", "tile_0", "_0_1", "a_b_1", "a_1_b", "a_-1_2"] {
            assert!(parse_patch_stem(stem).is_none(), "accepted {stem:?}");
        }
    }
}
