//! Header discovery in loosely structured settlement grids.
//!
//! Bank exports put their header anywhere in the first few rows (title
//! banners, merged cells, blank spacer rows). The locator checks row 0
//! first, then walks the first `scan_rows` rows left to right, top to
//! bottom, and reports the first cell whose text contains a keyword.

use crate::config::KeywordGroup;
use crate::model::{ColumnLocation, Grid};

/// Locate one field. `None` when no header cell matches within the scan.
pub fn locate_column(grid: &Grid, group: &KeywordGroup, scan_rows: usize) -> Option<ColumnLocation> {
    if let Some(col) = match_in_row(grid, 0, group) {
        return Some(ColumnLocation { row: 0, col });
    }

    (1..scan_rows.min(grid.height()))
        .find_map(|row| match_in_row(grid, row, group).map(|col| ColumnLocation { row, col }))
}

/// Locate several fields independently; results follow `groups` order.
pub fn locate_fields(
    grid: &Grid,
    groups: &[&KeywordGroup],
    scan_rows: usize,
) -> Vec<Option<ColumnLocation>> {
    groups
        .iter()
        .map(|group| locate_column(grid, group, scan_rows))
        .collect()
}

fn match_in_row(grid: &Grid, row: usize, group: &KeywordGroup) -> Option<usize> {
    grid.row(row)?
        .iter()
        .position(|cell| group.matches(&cell.as_text()))
}
