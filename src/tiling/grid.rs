use crate::error::{ReconcileError, Result};
use serde::Serialize;

/// Regular grid of overlapping, fixed-size patches covering one tile.
///
/// Patch `(row, col)` starts at pixel `(col·S, row·S)` with `S = P − O`.
/// Each axis holds the fewest patches whose union reaches the tile edge; the
/// last patch on an axis is not padded and may be shorter than `P`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchGrid {
    width: u32,
    height: u32,
    patch_size: u32,
    overlap: u32,
    stride: u32,
    rows: u32,
    cols: u32,
}

/// Pixel window of a single patch, clipped to the tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PatchWindow {
    pub row: u32,
    pub col: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PatchGrid {
    pub fn new(width: u32, height: u32, patch_size: u32, overlap: u32) -> Result<Self> {
        if patch_size == 0 || overlap >= patch_size {
            return Err(ReconcileError::Configuration(format!(
                "degenerate patch stride: patch_size={patch_size} overlap={overlap}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(ReconcileError::Configuration(format!(
                "tile has empty pixel extent {width}x{height}"
            )));
        }
        let stride = patch_size - overlap;
        Ok(Self {
            width,
            height,
            patch_size,
            overlap,
            stride,
            rows: axis_count(height, patch_size, stride),
            cols: axis_count(width, patch_size, stride),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn patch_size(&self) -> u32 {
        self.patch_size
    }

    pub fn overlap(&self) -> u32 {
        self.overlap
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row < self.rows && col < self.cols
    }

    /// Pixel offset `(px, py)` of the patch's top-left corner in the tile.
    pub fn patch_offset(&self, row: u32, col: u32) -> (u32, u32) {
        (col * self.stride, row * self.stride)
    }

    pub fn window(&self, row: u32, col: u32) -> Option<PatchWindow> {
        if !self.contains(row, col) {
            return None;
        }
        let (x, y) = self.patch_offset(row, col);
        Some(PatchWindow {
            row,
            col,
            x,
            y,
            width: self.patch_size.min(self.width - x),
            height: self.patch_size.min(self.height - y),
        })
    }

    /// Windows in row-major order.
    pub fn windows(&self) -> impl Iterator<Item = PatchWindow> + '_ {
        (0..self.rows)
            .flat_map(move |row| (0..self.cols).map(move |col| (row, col)))
            .filter_map(move |(row, col)| self.window(row, col))
    }

    /// Adjacent patches that come after `(row, col)` in row-major order: the
    /// right, lower-left, lower and lower-right neighbours inside the grid.
    /// Walking every patch visits each adjacent pair exactly once.
    pub fn forward_neighbors(&self, row: u32, col: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        const FORWARD: [(i64, i64); 4] = [(0, 1), (1, -1), (1, 0), (1, 1)];
        FORWARD.into_iter().filter_map(move |(dr, dc)| {
            let (nr, nc) = (row as i64 + dr, col as i64 + dc);
            if nr < 0 || nc < 0 {
                return None;
            }
            let (nr, nc) = (nr as u32, nc as u32);
            self.contains(nr, nc).then_some((nr, nc))
        })
    }
}

fn axis_count(len: u32, patch_size: u32, stride: u32) -> u32 {
    if len <= patch_size {
        1
    } else {
        1 + (len - patch_size).div_ceil(stride)
    }
}
