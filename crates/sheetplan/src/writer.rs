//! Workbook facade: grid handoff to the engine and async serialization.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, FormatUnderline, Workbook, Worksheet};
use serde::Serialize;
use tracing::{debug, warn};

use crate::builder::build_sheet_grid;
#[cfg(target_arch = "wasm32")]
use crate::conf::MIME_XLSX;
use crate::grid::SheetGrid;
use crate::spec::{
    EnumCellValue, Result, SheetPlanError, SpecCellStyle, SpecSaveOptions, SpecSheet,
};

/// Start an empty workbook facade.
pub fn create_workbook() -> WorkbookWriter {
    WorkbookWriter::new()
}

/// Pass a sheet definition through unchanged, pinning its record type at
/// the declaration site.
pub fn define_sheet<T>(spec: SpecSheet<T>) -> SpecSheet<T> {
    spec
}

/// Stateful workbook facade over the engine.
///
/// Sheets accumulate through [`add_sheet`](Self::add_sheet); the finished
/// workbook serializes through `save`, `save_to_buffer`, or `download`.
/// A timed-out serialization leaves the accumulated sheets intact, so a
/// later call with a larger budget can still succeed.
pub struct WorkbookWriter {
    workbook: Arc<Mutex<Workbook>>,
    set_sheet_names_existing: BTreeSet<String>,
}

impl Default for WorkbookWriter {
    fn default() -> Self {
        Self::new()
    }
}

// The engine workbook has no `Debug` impl, so it is elided here.
impl fmt::Debug for WorkbookWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkbookWriter")
            .field("set_sheet_names_existing", &self.set_sheet_names_existing)
            .finish_non_exhaustive()
    }
}

impl WorkbookWriter {
    /// Create an empty in-memory workbook.
    pub fn new() -> Self {
        Self {
            workbook: Arc::new(Mutex::new(Workbook::new())),
            set_sheet_names_existing: BTreeSet::new(),
        }
    }

    /// Resolve one sheet definition against its records and write the
    /// result into a fresh worksheet. Chainable.
    ///
    /// The whole grid is resolved before the first engine call, so a
    /// definition error never leaves a partial worksheet behind.
    pub fn add_sheet<T: Serialize>(
        &mut self,
        spec: &SpecSheet<T>,
        records: &[T],
    ) -> Result<&mut Self> {
        let grid = build_sheet_grid(spec, records)?;
        if self.set_sheet_names_existing.contains(grid.name()) {
            return Err(SheetPlanError::SheetNameDuplicate(grid.name().to_string()));
        }
        {
            let mut workbook = self.workbook.lock().unwrap_or_else(PoisonError::into_inner);
            let worksheet = workbook.add_worksheet();
            write_grid_to_worksheet(worksheet, &grid)?;
        }
        self.set_sheet_names_existing.insert(grid.name().to_string());
        Ok(self)
    }

    /// Serialize the workbook to a file, racing the engine against the
    /// configured time budget.
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn save(&mut self, path: impl AsRef<Path>, options: &SpecSaveOptions) -> Result<()> {
        let path = path.as_ref();
        if path.to_string_lossy().trim().is_empty() {
            return Err(SheetPlanError::PathEmpty);
        }
        debug!(path = %path.display(), timeout_ms = options.timeout_ms, "saving workbook to file");

        let workbook = Arc::clone(&self.workbook);
        let path_owned = path.to_path_buf();
        race_serialization(options.timeout_ms, move || {
            let mut workbook = workbook.lock().unwrap_or_else(PoisonError::into_inner);
            workbook.save(&path_owned)?;
            Ok(())
        })
        .await
    }

    /// File-system saves are unavailable in the browser.
    #[cfg(target_arch = "wasm32")]
    pub async fn save(
        &mut self,
        _path: impl AsRef<Path>,
        _options: &SpecSaveOptions,
    ) -> Result<()> {
        Err(SheetPlanError::SaveUnsupported)
    }

    /// Serialize the workbook to an in-memory xlsx buffer, racing the
    /// engine against the configured time budget.
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn save_to_buffer(&mut self, options: &SpecSaveOptions) -> Result<Vec<u8>> {
        debug!(timeout_ms = options.timeout_ms, "serializing workbook to buffer");

        let workbook = Arc::clone(&self.workbook);
        race_serialization(options.timeout_ms, move || {
            let mut workbook = workbook.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(workbook.save_to_buffer()?)
        })
        .await
    }

    /// Serialize the workbook to an in-memory xlsx buffer.
    ///
    /// Browsers have no blocking worker threads, so the budget is checked
    /// against elapsed wall time after the fact instead of racing.
    #[cfg(target_arch = "wasm32")]
    pub async fn save_to_buffer(&mut self, options: &SpecSaveOptions) -> Result<Vec<u8>> {
        let instant_start = web_time::Instant::now();
        let buffer = {
            let mut workbook = self.workbook.lock().unwrap_or_else(PoisonError::into_inner);
            workbook.save_to_buffer()?
        };
        let n_ms_elapsed = u64::try_from(instant_start.elapsed().as_millis()).unwrap_or(u64::MAX);
        if n_ms_elapsed > options.timeout_ms {
            warn!(
                budget_ms = options.timeout_ms,
                elapsed_ms = n_ms_elapsed,
                "workbook serialization exceeded its budget"
            );
            return Err(SheetPlanError::Timeout {
                budget_ms: options.timeout_ms,
            });
        }
        Ok(buffer)
    }

    /// Browser downloads are unavailable outside the browser.
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn download(&mut self, _filename: &str, _options: &SpecSaveOptions) -> Result<()> {
        Err(SheetPlanError::DownloadUnsupported)
    }

    /// Serialize the workbook and hand it to the browser as a named
    /// file download.
    #[cfg(target_arch = "wasm32")]
    pub async fn download(&mut self, filename: &str, options: &SpecSaveOptions) -> Result<()> {
        debug!(filename, timeout_ms = options.timeout_ms, "downloading workbook in browser");
        let buffer = self.save_to_buffer(options).await?;
        trigger_browser_download(&buffer, filename)
    }
}

/// Hand a resolved grid to the engine: name, column widths, merge
/// ranges, cells, and the freeze request, in that order. Merge ranges go
/// first so the per-cell writes that follow control each cell's format.
fn write_grid_to_worksheet(worksheet: &mut Worksheet, grid: &SheetGrid) -> Result<()> {
    worksheet.set_name(grid.name())?;

    for (n_idx_col, n_width) in grid.widths().iter().enumerate() {
        worksheet.set_column_width(cast_col_num(n_idx_col)?, *n_width)?;
    }

    for merge in grid.merges() {
        let format = grid
            .cell(merge.row_start, merge.col_start)
            .map_or_else(Format::new, |cell| {
                derive_engine_format(&cell.style, cell.num_fmt.as_deref())
            });
        worksheet.merge_range(
            cast_row_num(merge.row_start)?,
            cast_col_num(merge.col_start)?,
            cast_row_num(merge.row_end)?,
            cast_col_num(merge.col_end)?,
            "",
            &format,
        )?;
    }

    let set_merge_anchors: BTreeSet<(usize, usize)> = grid
        .merges()
        .iter()
        .map(|merge| (merge.row_start, merge.col_start))
        .collect();

    for (&(n_row, n_col), cell) in grid.cells() {
        let format = derive_engine_format(&cell.style, cell.num_fmt.as_deref());
        let n_row_engine = cast_row_num(n_row)?;
        let n_col_engine = cast_col_num(n_col)?;

        // Values inside a merged range stay on the anchor only; covered
        // cells keep their format so range borders stay continuous.
        let if_hidden_by_merge =
            grid.is_covered(n_row, n_col) && !set_merge_anchors.contains(&(n_row, n_col));
        if if_hidden_by_merge {
            worksheet.write_blank(n_row_engine, n_col_engine, &format)?;
            continue;
        }

        match &cell.value {
            EnumCellValue::None => {
                worksheet.write_blank(n_row_engine, n_col_engine, &format)?;
            }
            EnumCellValue::String(val) => {
                worksheet.write_string_with_format(n_row_engine, n_col_engine, val, &format)?;
            }
            EnumCellValue::Number(val) => {
                worksheet.write_number_with_format(n_row_engine, n_col_engine, *val, &format)?;
            }
            EnumCellValue::Bool(val) => {
                worksheet.write_boolean_with_format(n_row_engine, n_col_engine, *val, &format)?;
            }
        }
    }

    if let Some((n_rows_freeze, n_cols_freeze)) = grid.freeze() {
        worksheet.set_freeze_panes(cast_row_num(n_rows_freeze)?, cast_col_num(n_cols_freeze)?)?;
    }
    Ok(())
}

/// Race a blocking serialization closure against the time budget.
///
/// The blocking task is detached on timeout; it may finish in the
/// background and its result is discarded.
#[cfg(not(target_arch = "wasm32"))]
async fn race_serialization<F, R>(n_ms_budget: u64, serialize: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(serialize);
    match tokio::time::timeout(Duration::from_millis(n_ms_budget), handle).await {
        Ok(result_join) => result_join?,
        Err(_) => {
            warn!(budget_ms = n_ms_budget, "workbook serialization timed out");
            Err(SheetPlanError::Timeout {
                budget_ms: n_ms_budget,
            })
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn trigger_browser_download(buffer: &[u8], filename: &str) -> Result<()> {
    use wasm_bindgen::JsCast;

    let window = web_sys::window().ok_or(SheetPlanError::DownloadUnsupported)?;
    let document = window.document().ok_or(SheetPlanError::DownloadUnsupported)?;

    let l_parts = js_sys::Array::new();
    l_parts.push(&js_sys::Uint8Array::from(buffer));
    let props = web_sys::BlobPropertyBag::new();
    props.set_type(MIME_XLSX);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&l_parts, &props)
        .map_err(derive_js_error)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(derive_js_error)?;

    let anchor = document
        .create_element("a")
        .map_err(derive_js_error)?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(|element| SheetPlanError::Browser(format!("{element:?}")))?;
    anchor.set_href(&url);
    anchor.set_download(filename);
    anchor.click();
    web_sys::Url::revoke_object_url(&url).map_err(derive_js_error)?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn derive_js_error(value: wasm_bindgen::JsValue) -> SheetPlanError {
    SheetPlanError::Browser(format!("{value:?}"))
}

/// Translate a resolved cell style plus an optional number-format code
/// into an engine format.
fn derive_engine_format(style: &SpecCellStyle, num_fmt: Option<&str>) -> Format {
    let mut format = Format::new();

    if let Some(font) = &style.font {
        if let Some(val) = &font.name {
            format = format.set_font_name(val.clone());
        }
        if let Some(val) = font.size {
            format = format.set_font_size(val);
        }
        if font.bold.unwrap_or(false) {
            format = format.set_bold();
        }
        if font.italic.unwrap_or(false) {
            format = format.set_italic();
        }
        if font.underline.unwrap_or(false) {
            format = format.set_underline(FormatUnderline::Single);
        }
        if font.strike.unwrap_or(false) {
            format = format.set_font_strikethrough();
        }
        if let Some(val) = &font.color {
            format = format.set_font_color(val.as_str());
        }
    }

    if let Some(fill) = &style.fill
        && let Some(val) = &fill.color
    {
        format = format.set_background_color(val.as_str());
    }

    if let Some(alignment) = &style.alignment {
        if let Some(val) = &alignment.horizontal
            && let Some(align) = derive_format_align(val)
        {
            format = format.set_align(align);
        }
        if let Some(val) = &alignment.vertical
            && let Some(align) = derive_format_align(val)
        {
            format = format.set_align(align);
        }
        if alignment.wrap_text.unwrap_or(false) {
            format = format.set_text_wrap();
        }
    }

    if let Some(border) = &style.border {
        if let Some(edge) = &border.top {
            if let Some(val) = &edge.style {
                format = format.set_border_top(derive_format_border(val));
            }
            if let Some(val) = &edge.color {
                format = format.set_border_top_color(val.as_str());
            }
        }
        if let Some(edge) = &border.bottom {
            if let Some(val) = &edge.style {
                format = format.set_border_bottom(derive_format_border(val));
            }
            if let Some(val) = &edge.color {
                format = format.set_border_bottom_color(val.as_str());
            }
        }
        if let Some(edge) = &border.left {
            if let Some(val) = &edge.style {
                format = format.set_border_left(derive_format_border(val));
            }
            if let Some(val) = &edge.color {
                format = format.set_border_left_color(val.as_str());
            }
        }
        if let Some(edge) = &border.right {
            if let Some(val) = &edge.style {
                format = format.set_border_right(derive_format_border(val));
            }
            if let Some(val) = &edge.color {
                format = format.set_border_right_color(val.as_str());
            }
        }
    }

    if let Some(val) = num_fmt {
        format = format.set_num_format(val);
    }

    format
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" | "centre" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" | "centercontinuous" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "middle" | "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "vertical_justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "vertical_distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn derive_format_border(style_name: &str) -> FormatBorder {
    let value = style_name.trim().to_ascii_lowercase();
    match value.as_str() {
        "" | "none" => FormatBorder::None,
        "thin" => FormatBorder::Thin,
        "medium" => FormatBorder::Medium,
        "dashed" => FormatBorder::Dashed,
        "dotted" => FormatBorder::Dotted,
        "thick" => FormatBorder::Thick,
        "double" => FormatBorder::Double,
        "hair" => FormatBorder::Hair,
        "medium_dashed" | "mediumdashed" => FormatBorder::MediumDashed,
        "dash_dot" | "dashdot" => FormatBorder::DashDot,
        "medium_dash_dot" | "mediumdashdot" => FormatBorder::MediumDashDot,
        "dash_dot_dot" | "dashdotdot" => FormatBorder::DashDotDot,
        "medium_dash_dot_dot" | "mediumdashdotdot" => FormatBorder::MediumDashDotDot,
        "slant_dash_dot" | "slantdashdot" => FormatBorder::SlantDashDot,
        _ => FormatBorder::Thin,
    }
}

fn cast_row_num(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| SheetPlanError::IndexOverflow {
        axis: "row",
        index: value,
    })
}

fn cast_col_num(value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| SheetPlanError::IndexOverflow {
        axis: "column",
        index: value,
    })
}
