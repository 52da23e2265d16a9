//! Precomputed track lookup grid

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use glam::DVec2;
use serde::Deserialize;
use serde_json::Value;

/// One grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Checkpoint(u32),
    /// Cell exists but carries no checkpoint (walls, decoration, bad data)
    NoData,
}

/// Sparse lookup from (row, col) to checkpoint number
#[derive(Debug, Clone, Default)]
pub struct TrackGrid {
    cells: HashMap<(i64, i64), Cell>,
}

#[derive(Deserialize)]
struct GridFile {
    rows: BTreeMap<String, BTreeMap<String, Value>>,
}

impl TrackGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, row: i64, col: i64, cell: Cell) {
        self.cells.insert((row, col), cell);
    }

    pub fn set_checkpoint(&mut self, row: i64, col: i64, checkpoint: u32) {
        self.insert(row, col, Cell::Checkpoint(checkpoint));
    }

    pub fn cell(&self, row: i64, col: i64) -> Option<Cell> {
        self.cells.get(&(row, col)).copied()
    }

    /// Checkpoint under a world position, if the cell carries one
    pub fn checkpoint_at(&self, position: DVec2, cell_size: f64) -> Option<u32> {
        let (row, col) = quantize(position, cell_size);
        match self.cell(row, col)? {
            Cell::Checkpoint(checkpoint) => Some(checkpoint),
            Cell::NoData => None,
        }
    }

    /// Highest checkpoint number on the track
    pub fn max_checkpoint(&self) -> Option<u32> {
        self.cells
            .values()
            .filter_map(|cell| match cell {
                Cell::Checkpoint(checkpoint) => Some(*checkpoint),
                Cell::NoData => None,
            })
            .max()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Parse `{"rows": {"<row>": {"<col>": value}}}`. Non-numeric or
    /// negative values become [`Cell::NoData`]; unparseable keys are errors.
    pub fn from_json(json: &str) -> Result<Self, TrackError> {
        let file: GridFile = serde_json::from_str(json)?;
        let mut grid = Self::new();

        for (row_key, cols) in file.rows {
            let row: i64 = row_key
                .parse()
                .map_err(|_| TrackError::BadIndex(row_key.clone()))?;
            for (col_key, value) in cols {
                let col: i64 = col_key
                    .parse()
                    .map_err(|_| TrackError::BadIndex(col_key.clone()))?;
                let cell = value
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .map(Cell::Checkpoint)
                    .unwrap_or(Cell::NoData);
                grid.insert(row, col, cell);
            }
        }

        Ok(grid)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrackError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Rectangular ring track used when no track file is configured.
    ///
    /// Checkpoints are numbered per side, descending counter-clockwise from
    /// `sides` down to 1; the finish line sits between side 1 and side `sides`.
    pub fn oval(cols: i64, rows: i64, width: i64, checkpoints_per_side: u32) -> Self {
        let mut grid = Self::new();
        let per = checkpoints_per_side.max(1);
        let top = 4 * per;

        for row in 0..rows {
            for col in 0..cols {
                let inner = row >= width
                    && row < rows - width
                    && col >= width
                    && col < cols - width;
                if inner {
                    grid.insert(row, col, Cell::NoData);
                    continue;
                }

                // Walk the ring from the bottom-left corner: bottom edge,
                // right edge, top edge, left edge.
                let (along, length, side) = if row < width {
                    (col, cols, 0)
                } else if col >= cols - width {
                    (row, rows, 1)
                } else if row >= rows - width {
                    (cols - 1 - col, cols, 2)
                } else {
                    (rows - 1 - row, rows, 3)
                };
                let step = ((along * per as i64) / length.max(1)).clamp(0, per as i64 - 1) as u32;
                let checkpoint = top - (side * per + step);
                grid.set_checkpoint(row, col, checkpoint);
            }
        }

        grid
    }
}

/// Grid row/column for a world position
pub fn quantize(position: DVec2, cell_size: f64) -> (i64, i64) {
    (
        (position.y / cell_size).floor() as i64,
        (position.x / cell_size).floor() as i64,
    )
}

#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Failed to read track file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed track JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Grid index is not an integer: {0}")]
    BadIndex(String),
}
