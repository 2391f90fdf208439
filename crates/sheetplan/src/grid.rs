//! Resolved per-sheet cell grid and merge registry.

use std::collections::{BTreeMap, BTreeSet};

use crate::spec::{EnumCellValue, Result, SheetPlanError, SpecCellStyle, SpecMergeRange};

/// One resolved output cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridCell {
    /// Normalized stored value.
    pub value: EnumCellValue,
    /// Style after all layers applied.
    pub style: SpecCellStyle,
    /// Number format code attached at handoff.
    pub num_fmt: Option<String>,
}

/// Fully resolved sheet contents handed to the engine after layout.
///
/// Coordinates are zero-based `(row, column)` pairs. Only realized cells
/// are stored; merge ranges may cover positions no cell was written to.
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    name: String,
    n_rows_header: usize,
    l_widths_by_col: Vec<f64>,
    dict_cells: BTreeMap<(usize, usize), GridCell>,
    l_merges: Vec<SpecMergeRange>,
    set_merge_covered: BTreeSet<(usize, usize)>,
    tup_freeze: Option<(usize, usize)>,
    n_rows_used: usize,
    n_cols_used: usize,
}

impl SheetGrid {
    /// Create an empty grid for the named sheet.
    pub fn new(name: impl Into<String>) -> Self {
        SheetGrid {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Worksheet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of header rows placed at the top of the grid.
    pub fn n_rows_header(&self) -> usize {
        self.n_rows_header
    }

    /// Record the header height; body rows start right below it.
    pub fn set_n_rows_header(&mut self, n_rows: usize) {
        self.n_rows_header = n_rows;
        self.n_rows_used = usize::max(self.n_rows_used, n_rows);
    }

    /// Final column widths in display order.
    pub fn widths(&self) -> &[f64] {
        &self.l_widths_by_col
    }

    /// Install planned column widths.
    pub fn set_widths(&mut self, l_widths: Vec<f64>) {
        self.n_cols_used = usize::max(self.n_cols_used, l_widths.len());
        self.l_widths_by_col = l_widths;
    }

    /// Freeze request as `(rows frozen, columns frozen)`.
    pub fn freeze(&self) -> Option<(usize, usize)> {
        self.tup_freeze
    }

    /// Install the freeze request.
    pub fn set_freeze(&mut self, n_rows_freeze: usize, n_cols_freeze: usize) {
        self.tup_freeze = Some((n_rows_freeze, n_cols_freeze));
    }

    /// Rows touched by any cell, merge, or header placement.
    pub fn n_rows_used(&self) -> usize {
        self.n_rows_used
    }

    /// Columns touched by any cell, merge, or width plan.
    pub fn n_cols_used(&self) -> usize {
        self.n_cols_used
    }

    /// Look up a realized cell.
    pub fn cell(&self, n_row: usize, n_col: usize) -> Option<&GridCell> {
        self.dict_cells.get(&(n_row, n_col))
    }

    /// Iterate realized cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (&(usize, usize), &GridCell)> {
        self.dict_cells.iter()
    }

    /// Registered merge ranges in registration order.
    pub fn merges(&self) -> &[SpecMergeRange] {
        &self.l_merges
    }

    /// Whether a position is inside any registered merge.
    pub fn is_covered(&self, n_row: usize, n_col: usize) -> bool {
        self.set_merge_covered.contains(&(n_row, n_col))
    }

    /// Write a value, realizing the cell if needed.
    pub fn write_value(&mut self, n_row: usize, n_col: usize, value: EnumCellValue) {
        self.ensure_cell(n_row, n_col).value = value;
    }

    /// Attach a number format code, realizing the cell if needed.
    pub fn write_num_fmt(&mut self, n_row: usize, n_col: usize, fmt_code: String) {
        self.ensure_cell(n_row, n_col).num_fmt = Some(fmt_code);
    }

    /// Overlay a style patch, realizing the cell if needed.
    pub fn apply_style(&mut self, n_row: usize, n_col: usize, patch: &SpecCellStyle) {
        let cell = self.ensure_cell(n_row, n_col);
        cell.style = cell.style.overlay(patch);
    }

    /// Overlay a style patch onto an already realized cell; positions
    /// without a cell stay untouched.
    pub fn apply_style_existing(&mut self, n_row: usize, n_col: usize, patch: &SpecCellStyle) {
        if let Some(cell) = self.dict_cells.get_mut(&(n_row, n_col)) {
            cell.style = cell.style.overlay(patch);
        }
    }

    /// Layer a base style under an already realized cell's own style.
    pub fn underlay_style_existing(&mut self, n_row: usize, n_col: usize, base: &SpecCellStyle) {
        if let Some(cell) = self.dict_cells.get_mut(&(n_row, n_col)) {
            cell.style = base.overlay(&cell.style);
        }
    }

    /// Register a merge range, rejecting any overlap with earlier merges.
    pub fn register_merge(&mut self, merge: SpecMergeRange) -> Result<()> {
        for n_row in merge.row_start..=merge.row_end {
            for n_col in merge.col_start..=merge.col_end {
                if self.set_merge_covered.contains(&(n_row, n_col)) {
                    return Err(SheetPlanError::MergeConflict {
                        row_start: merge.row_start,
                        col_start: merge.col_start,
                        row_end: merge.row_end,
                        col_end: merge.col_end,
                    });
                }
            }
        }
        for n_row in merge.row_start..=merge.row_end {
            for n_col in merge.col_start..=merge.col_end {
                self.set_merge_covered.insert((n_row, n_col));
            }
        }
        self.n_rows_used = usize::max(self.n_rows_used, merge.row_end + 1);
        self.n_cols_used = usize::max(self.n_cols_used, merge.col_end + 1);
        self.l_merges.push(merge);
        Ok(())
    }

    fn ensure_cell(&mut self, n_row: usize, n_col: usize) -> &mut GridCell {
        self.n_rows_used = usize::max(self.n_rows_used, n_row + 1);
        self.n_cols_used = usize::max(self.n_cols_used, n_col + 1);
        self.dict_cells.entry((n_row, n_col)).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{SpecFillStyle, SpecFontStyle};

    #[test]
    fn test_register_merge_rejects_overlaps() {
        let mut grid = SheetGrid::new("t");
        grid.register_merge(SpecMergeRange {
            row_start: 0,
            col_start: 0,
            row_end: 1,
            col_end: 0,
        })
        .unwrap();

        let result = grid.register_merge(SpecMergeRange {
            row_start: 1,
            col_start: 0,
            row_end: 1,
            col_end: 2,
        });
        assert!(matches!(result, Err(SheetPlanError::MergeConflict { .. })));
        assert_eq!(grid.merges().len(), 1);
    }

    #[test]
    fn test_register_merge_updates_coverage_and_extents() {
        let mut grid = SheetGrid::new("t");
        grid.register_merge(SpecMergeRange {
            row_start: 2,
            col_start: 1,
            row_end: 3,
            col_end: 4,
        })
        .unwrap();
        assert!(grid.is_covered(2, 1));
        assert!(grid.is_covered(3, 4));
        assert!(!grid.is_covered(4, 4));
        assert_eq!(grid.n_rows_used(), 4);
        assert_eq!(grid.n_cols_used(), 5);
    }

    #[test]
    fn test_apply_style_existing_does_not_realize_cells() {
        let mut grid = SheetGrid::new("t");
        let patch = SpecCellStyle::default();
        grid.apply_style_existing(0, 0, &patch);
        assert!(grid.cell(0, 0).is_none());

        grid.apply_style(1, 1, &patch);
        assert!(grid.cell(1, 1).is_some());
        assert_eq!(grid.n_rows_used(), 2);
    }

    #[test]
    fn test_underlay_keeps_the_cell_layer_on_top() {
        let mut grid = SheetGrid::new("t");
        grid.apply_style(
            0,
            0,
            &SpecCellStyle {
                fill: Some(SpecFillStyle {
                    color: Some("#FF0000".to_string()),
                }),
                ..Default::default()
            },
        );
        grid.underlay_style_existing(
            0,
            0,
            &SpecCellStyle {
                fill: Some(SpecFillStyle {
                    color: Some("#00FF00".to_string()),
                }),
                font: Some(SpecFontStyle {
                    bold: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        let cell = grid.cell(0, 0).unwrap();
        assert_eq!(
            cell.style.fill.as_ref().unwrap().color.as_deref(),
            Some("#FF0000")
        );
        assert_eq!(cell.style.font.as_ref().unwrap().bold, Some(true));
    }
}
