//! Sheet layout pipeline: a declarative definition plus records in, a
//! resolved cell grid out.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::conf::N_WIDTH_COLUMN_DEFAULT;
use crate::grid::SheetGrid;
use crate::spec::{
    EnumBorderPreset, EnumCellValue, EnumColumnFormat, EnumColumnMerge, EnumColumnStyle,
    EnumColumnWidth, EnumHeaderCell, Result, SpecBorderEdge, SpecBorderStyle, SpecCellStyle,
    SpecMergeRange, SpecSheet,
};
use crate::util::{
    calculate_auto_width, calculate_display_width, derive_cell_value, derive_display_text,
    derive_horizontal_runs, derive_inline_style, derive_record_map, derive_vertical_runs,
    validate_column_keys, validate_sheet_name,
};

/// Resolve a sheet definition plus its records into a [`SheetGrid`]:
/// 1. Validate the sheet name and the column keys.
/// 2. Plan column widths (fixed, auto-scanned, or default).
/// 3. Place header rows, registering row/column spans.
/// 4. Render one row per record with layered styles and formats.
/// 5. Detect vertical merge runs, then horizontal merge runs.
/// 6. Apply the border preset, then the freeze request.
///
/// The whole grid is resolved before anything touches the engine, so
/// definition errors never leave a half-written worksheet behind.
pub fn build_sheet_grid<T: Serialize>(spec: &SpecSheet<T>, records: &[T]) -> Result<SheetGrid> {
    validate_sheet_name(&spec.name)?;
    validate_column_keys(&spec.columns)?;

    let l_record_maps = records
        .iter()
        .enumerate()
        .map(|(n_idx, record)| derive_record_map(record, n_idx))
        .collect::<Result<Vec<Map<String, Value>>>>()?;

    let mut grid = SheetGrid::new(&spec.name);
    grid.set_widths(plan_column_widths(spec, &l_record_maps));
    place_header_rows(&mut grid, spec)?;
    render_data_rows(&mut grid, spec, records, &l_record_maps)?;
    resolve_vertical_merges(&mut grid, spec, records.len())?;
    resolve_horizontal_merges(&mut grid, spec, records.len())?;
    apply_border_preset(&mut grid, spec.borders);

    if let Some(freeze) = &spec.freeze {
        let n_rows_freeze = freeze.row_freeze.unwrap_or(grid.n_rows_header());
        grid.set_freeze(n_rows_freeze, freeze.col_freeze);
    }

    debug!(
        sheet = %grid.name(),
        n_rows = grid.n_rows_used(),
        n_cols = grid.n_cols_used(),
        n_merges = grid.merges().len(),
        "sheet grid resolved"
    );
    Ok(grid)
}

/// Resolve one final width per column, in display order.
fn plan_column_widths<T>(spec: &SpecSheet<T>, l_record_maps: &[Map<String, Value>]) -> Vec<f64> {
    spec.columns
        .iter()
        .map(|column| match &column.width {
            Some(EnumColumnWidth::Fixed(n_width)) => *n_width,
            Some(EnumColumnWidth::Auto) => {
                let mut n_len_max = if spec.autowidth.header_included {
                    calculate_display_width(&column.header)
                } else {
                    0
                };
                for dict_fields in l_record_maps {
                    let value = derive_cell_value(dict_fields.get(&column.key));
                    let n_len = calculate_display_width(&derive_display_text(&value));
                    n_len_max = usize::max(n_len_max, n_len);
                }
                calculate_auto_width(n_len_max, &spec.autowidth)
            }
            None => N_WIDTH_COLUMN_DEFAULT,
        })
        .collect()
}

/// Place the header block at the top of the grid.
///
/// Absent explicit rows fall back to one implicit row of column labels;
/// an explicit empty row list yields a headerless sheet. The sheet-level
/// header style is layered under every placed header cell at the end.
fn place_header_rows<T>(grid: &mut SheetGrid, spec: &SpecSheet<T>) -> Result<()> {
    match spec.header.as_ref().and_then(|header| header.rows.as_ref()) {
        None => {
            grid.set_n_rows_header(1);
            for (n_idx_col, column) in spec.columns.iter().enumerate() {
                grid.write_value(0, n_idx_col, EnumCellValue::String(column.header.clone()));
            }
        }
        Some(l_rows) => {
            grid.set_n_rows_header(l_rows.len());
            for (n_idx_row, l_cells) in l_rows.iter().enumerate() {
                place_explicit_header_row(grid, n_idx_row, l_cells)?;
            }
        }
    }

    if let Some(style_base) = spec.header.as_ref().and_then(|header| header.style.as_ref()) {
        for n_row in 0..grid.n_rows_header() {
            for n_col in 0..grid.n_cols_used() {
                grid.underlay_style_existing(n_row, n_col, style_base);
            }
        }
    }
    Ok(())
}

/// Place one explicit header row, walking a cursor left to right and
/// skipping positions already covered by earlier spans.
fn place_explicit_header_row(
    grid: &mut SheetGrid,
    n_idx_row: usize,
    l_cells: &[EnumHeaderCell],
) -> Result<()> {
    let mut n_idx_col = 0;
    for cell in l_cells {
        while grid.is_covered(n_idx_row, n_idx_col) {
            n_idx_col += 1;
        }
        match cell {
            EnumHeaderCell::Label(text) => {
                grid.write_value(n_idx_row, n_idx_col, EnumCellValue::String(text.clone()));
                n_idx_col += 1;
            }
            EnumHeaderCell::Cell(descriptor) => {
                grid.write_value(
                    n_idx_row,
                    n_idx_col,
                    EnumCellValue::String(descriptor.value.clone()),
                );
                if let Some(style) = &descriptor.style {
                    grid.apply_style(n_idx_row, n_idx_col, style);
                }
                let n_span_rows = usize::max(descriptor.row_span, 1);
                let n_span_cols = usize::max(descriptor.col_span, 1);
                if n_span_rows > 1 || n_span_cols > 1 {
                    grid.register_merge(SpecMergeRange {
                        row_start: n_idx_row,
                        col_start: n_idx_col,
                        row_end: n_idx_row + n_span_rows - 1,
                        col_end: n_idx_col + n_span_cols - 1,
                    })?;
                }
                n_idx_col += n_span_cols;
            }
        }
    }
    Ok(())
}

/// Write one grid row per record, layering styles per cell.
///
/// Per-cell layer order, lowest to highest: column static style, row
/// style function, record inline style, column computed style. Formats
/// run last: a number-format code attaches to the cell, a substitution
/// function replaces the stored value with its text.
fn render_data_rows<T>(
    grid: &mut SheetGrid,
    spec: &SpecSheet<T>,
    records: &[T],
    l_record_maps: &[Map<String, Value>],
) -> Result<()> {
    let fn_row_style = spec.rows.as_ref().and_then(|policy| policy.style.as_ref());
    for (n_idx_record, (record, dict_fields)) in records.iter().zip(l_record_maps).enumerate() {
        let n_row = grid.n_rows_header() + n_idx_record;
        let style_row = fn_row_style.map(|fn_style| fn_style(record, n_idx_record));
        let style_inline = derive_inline_style(dict_fields, n_idx_record)?;
        for (n_idx_col, column) in spec.columns.iter().enumerate() {
            let value_raw = derive_cell_value(dict_fields.get(&column.key));
            grid.write_value(n_row, n_idx_col, value_raw.clone());
            if let Some(EnumColumnStyle::Static(style)) = &column.style {
                grid.apply_style(n_row, n_idx_col, style);
            }
            if let Some(style) = &style_row {
                grid.apply_style(n_row, n_idx_col, style);
            }
            if let Some(style) = &style_inline {
                grid.apply_style(n_row, n_idx_col, style);
            }
            if let Some(EnumColumnStyle::Computed(fn_style)) = &column.style {
                let style = fn_style(&value_raw, record, n_idx_record);
                grid.apply_style(n_row, n_idx_col, &style);
            }
            match &column.format {
                Some(EnumColumnFormat::NumFormat(fmt_code)) => {
                    grid.write_num_fmt(n_row, n_idx_col, fmt_code.clone());
                }
                Some(EnumColumnFormat::Convert(fn_convert)) => {
                    let text = fn_convert(&value_raw);
                    grid.write_value(n_row, n_idx_col, EnumCellValue::String(text));
                }
                None => {}
            }
        }
    }
    Ok(())
}

/// Merge vertical runs of equal values within each column flagged
/// `Vertical`. Runs compare the stored cell values, so substituted
/// display text merges by what the reader sees.
fn resolve_vertical_merges<T>(
    grid: &mut SheetGrid,
    spec: &SpecSheet<T>,
    n_records: usize,
) -> Result<()> {
    let n_rows_header = grid.n_rows_header();
    for (n_idx_col, column) in spec.columns.iter().enumerate() {
        if column.merge != EnumColumnMerge::Vertical {
            continue;
        }
        let l_values: Vec<EnumCellValue> = (0..n_records)
            .map(|n_idx_record| {
                grid.cell(n_rows_header + n_idx_record, n_idx_col)
                    .map_or(EnumCellValue::None, |cell| cell.value.clone())
            })
            .collect();
        for (n_idx_start, n_idx_end) in derive_vertical_runs(&l_values) {
            grid.register_merge(SpecMergeRange {
                row_start: n_rows_header + n_idx_start,
                col_start: n_idx_col,
                row_end: n_rows_header + n_idx_end,
                col_end: n_idx_col,
            })?;
        }
    }
    Ok(())
}

/// Merge horizontal runs of equal values within each data row, across
/// the columns flagged `Horizontal`. Ineligible columns close a run
/// permanently even when the values around them are equal.
fn resolve_horizontal_merges<T>(
    grid: &mut SheetGrid,
    spec: &SpecSheet<T>,
    n_records: usize,
) -> Result<()> {
    let l_eligible: Vec<bool> = spec
        .columns
        .iter()
        .map(|column| column.merge == EnumColumnMerge::Horizontal)
        .collect();
    if !l_eligible.contains(&true) {
        return Ok(());
    }
    let n_rows_header = grid.n_rows_header();
    for n_idx_record in 0..n_records {
        let n_row = n_rows_header + n_idx_record;
        let l_values: Vec<EnumCellValue> = (0..spec.columns.len())
            .map(|n_idx_col| {
                grid.cell(n_row, n_idx_col)
                    .map_or(EnumCellValue::None, |cell| cell.value.clone())
            })
            .collect();
        for (n_idx_start, n_idx_end) in derive_horizontal_runs(&l_values, &l_eligible) {
            grid.register_merge(SpecMergeRange {
                row_start: n_row,
                col_start: n_idx_start,
                row_end: n_row,
                col_end: n_idx_end,
            })?;
        }
    }
    Ok(())
}

/// Overlay one of the border presets onto the finished grid.
fn apply_border_preset(grid: &mut SheetGrid, preset: EnumBorderPreset) {
    let n_rows = grid.n_rows_used();
    let n_cols = grid.n_cols_used();
    match preset {
        EnumBorderPreset::None => {}
        EnumBorderPreset::All => {
            let edge = derive_border_edge("thin");
            let patch = SpecCellStyle {
                border: Some(SpecBorderStyle {
                    top: edge.clone(),
                    bottom: edge.clone(),
                    left: edge.clone(),
                    right: edge,
                }),
                ..Default::default()
            };
            for n_row in 0..n_rows {
                for n_col in 0..n_cols {
                    grid.apply_style(n_row, n_col, &patch);
                }
            }
        }
        EnumBorderPreset::Outer => {
            if n_rows == 0 || n_cols == 0 {
                return;
            }
            let patch_top = SpecCellStyle {
                border: Some(SpecBorderStyle {
                    top: derive_border_edge("thin"),
                    ..Default::default()
                }),
                ..Default::default()
            };
            let patch_bottom = SpecCellStyle {
                border: Some(SpecBorderStyle {
                    bottom: derive_border_edge("thin"),
                    ..Default::default()
                }),
                ..Default::default()
            };
            let patch_left = SpecCellStyle {
                border: Some(SpecBorderStyle {
                    left: derive_border_edge("thin"),
                    ..Default::default()
                }),
                ..Default::default()
            };
            let patch_right = SpecCellStyle {
                border: Some(SpecBorderStyle {
                    right: derive_border_edge("thin"),
                    ..Default::default()
                }),
                ..Default::default()
            };
            for n_col in 0..n_cols {
                grid.apply_style(0, n_col, &patch_top);
                grid.apply_style(n_rows - 1, n_col, &patch_bottom);
            }
            for n_row in 0..n_rows {
                grid.apply_style(n_row, 0, &patch_left);
                grid.apply_style(n_row, n_cols - 1, &patch_right);
            }
        }
        EnumBorderPreset::HeaderBody => {
            let n_rows_header = grid.n_rows_header();
            if n_rows_header == 0 {
                return;
            }
            let patch = SpecCellStyle {
                border: Some(SpecBorderStyle {
                    bottom: derive_border_edge("medium"),
                    ..Default::default()
                }),
                ..Default::default()
            };
            for n_col in 0..n_cols {
                grid.apply_style(n_rows_header - 1, n_col, &patch);
            }
        }
    }
}

fn derive_border_edge(style_name: &str) -> Option<SpecBorderEdge> {
    Some(SpecBorderEdge {
        style: Some(style_name.to_string()),
        color: None,
    })
}
