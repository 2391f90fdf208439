//! Declarative sheet models, the layered cell style model, and top-level
//! error types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conf::{
    N_MS_SAVE_TIMEOUT_DEFAULT, N_PAD_AUTO_WIDTH_DEFAULT, N_RATIO_CHAR_WIDTH_DEFAULT,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellStyleSpecification

/// Font properties of a cell style layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecFontStyle {
    /// Font family name.
    pub name: Option<String>,
    /// Font size in points.
    pub size: Option<f64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    /// Single underline.
    pub underline: Option<bool>,
    /// Strikethrough.
    pub strike: Option<bool>,
    /// Font color as `#RRGGBB`.
    pub color: Option<String>,
}

/// Solid fill properties of a cell style layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecFillStyle {
    /// Background color as `#RRGGBB`.
    pub color: Option<String>,
}

/// Alignment properties of a cell style layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecAlignStyle {
    /// Horizontal alignment name (`left`, `center`, `right`, ...).
    pub horizontal: Option<String>,
    /// Vertical alignment name (`top`, `middle`, `bottom`, ...).
    pub vertical: Option<String>,
    /// Text wrap.
    pub wrap_text: Option<bool>,
}

/// One border side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecBorderEdge {
    /// Border style name (`thin`, `medium`, `dashed`, ...).
    pub style: Option<String>,
    /// Border color as `#RRGGBB`.
    pub color: Option<String>,
}

/// Per-side border properties of a cell style layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecBorderStyle {
    /// Top side.
    pub top: Option<SpecBorderEdge>,
    /// Bottom side.
    pub bottom: Option<SpecBorderEdge>,
    /// Left side.
    pub left: Option<SpecBorderEdge>,
    /// Right side.
    pub right: Option<SpecBorderEdge>,
}

/// Cell style with independently layered categories.
///
/// Styles stack: overlaying a patch replaces only the leaves the patch
/// sets, category by category, so a fill-only patch never clears a font
/// set by a lower layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecCellStyle {
    /// Font category.
    pub font: Option<SpecFontStyle>,
    /// Fill category.
    pub fill: Option<SpecFillStyle>,
    /// Alignment category.
    pub alignment: Option<SpecAlignStyle>,
    /// Border category.
    pub border: Option<SpecBorderStyle>,
}

impl SpecFontStyle {
    /// Merge two font layers with right-side non-`None` overwrite semantics.
    pub fn overlay(&self, patch: &SpecFontStyle) -> SpecFontStyle {
        SpecFontStyle {
            name: patch.name.clone().or_else(|| self.name.clone()),
            size: patch.size.or(self.size),
            bold: patch.bold.or(self.bold),
            italic: patch.italic.or(self.italic),
            underline: patch.underline.or(self.underline),
            strike: patch.strike.or(self.strike),
            color: patch.color.clone().or_else(|| self.color.clone()),
        }
    }
}

impl SpecFillStyle {
    /// Merge two fill layers with right-side non-`None` overwrite semantics.
    pub fn overlay(&self, patch: &SpecFillStyle) -> SpecFillStyle {
        SpecFillStyle {
            color: patch.color.clone().or_else(|| self.color.clone()),
        }
    }
}

impl SpecAlignStyle {
    /// Merge two alignment layers with right-side non-`None` overwrite semantics.
    pub fn overlay(&self, patch: &SpecAlignStyle) -> SpecAlignStyle {
        SpecAlignStyle {
            horizontal: patch.horizontal.clone().or_else(|| self.horizontal.clone()),
            vertical: patch.vertical.clone().or_else(|| self.vertical.clone()),
            wrap_text: patch.wrap_text.or(self.wrap_text),
        }
    }
}

impl SpecBorderEdge {
    /// Merge two border sides with right-side non-`None` overwrite semantics.
    pub fn overlay(&self, patch: &SpecBorderEdge) -> SpecBorderEdge {
        SpecBorderEdge {
            style: patch.style.clone().or_else(|| self.style.clone()),
            color: patch.color.clone().or_else(|| self.color.clone()),
        }
    }
}

impl SpecBorderStyle {
    /// Merge two border layers side by side.
    pub fn overlay(&self, patch: &SpecBorderStyle) -> SpecBorderStyle {
        SpecBorderStyle {
            top: overlay_category(&self.top, &patch.top, SpecBorderEdge::overlay),
            bottom: overlay_category(&self.bottom, &patch.bottom, SpecBorderEdge::overlay),
            left: overlay_category(&self.left, &patch.left, SpecBorderEdge::overlay),
            right: overlay_category(&self.right, &patch.right, SpecBorderEdge::overlay),
        }
    }
}

impl SpecCellStyle {
    /// Return a new style by overlaying `patch` onto `self`, category by
    /// category, merging leaves inside every category both sides set.
    pub fn overlay(&self, patch: &SpecCellStyle) -> SpecCellStyle {
        SpecCellStyle {
            font: overlay_category(&self.font, &patch.font, SpecFontStyle::overlay),
            fill: overlay_category(&self.fill, &patch.fill, SpecFillStyle::overlay),
            alignment: overlay_category(&self.alignment, &patch.alignment, SpecAlignStyle::overlay),
            border: overlay_category(&self.border, &patch.border, SpecBorderStyle::overlay),
        }
    }

    /// Return a new style by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellStyle) -> SpecCellStyle {
        self.overlay(&patch)
    }
}

fn overlay_category<C: Clone>(
    base: &Option<C>,
    patch: &Option<C>,
    overlay: impl Fn(&C, &C) -> C,
) -> Option<C> {
    match (base, patch) {
        (Some(base), Some(patch)) => Some(overlay(base, patch)),
        (None, Some(patch)) => Some(patch.clone()),
        (Some(base), None) => Some(base.clone()),
        (None, None) => None,
    }
}

/// Normalized scalar value carried through the layout pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetSpecification

/// Cell style computed from `(value, record, record index)`.
pub type FnCellStyle<T> =
    Arc<dyn Fn(&EnumCellValue, &T, usize) -> SpecCellStyle + Send + Sync>;
/// Row style computed from `(record, record index)`.
pub type FnRowStyle<T> = Arc<dyn Fn(&T, usize) -> SpecCellStyle + Send + Sync>;
/// Display-text substitution computed from the raw cell value.
pub type FnCellConvert = Arc<dyn Fn(&EnumCellValue) -> String + Send + Sync>;

/// Column width policy.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumColumnWidth {
    /// Size the column from its longest header/body display text.
    Auto,
    /// Fixed width in Excel column units, passed through unchanged.
    Fixed(f64),
}

/// Merge axis a column participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumColumnMerge {
    /// No automatic merging.
    #[default]
    None,
    /// Merge vertical runs of equal values within this column.
    Vertical,
    /// Eligible for horizontal runs of equal values within each row.
    Horizontal,
}

/// Column style source.
pub enum EnumColumnStyle<T> {
    /// Static style layered under every other body style layer.
    Static(SpecCellStyle),
    /// Style computed per cell, layered over every other body layer.
    Computed(FnCellStyle<T>),
}

impl<T> Clone for EnumColumnStyle<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(style) => Self::Static(style.clone()),
            Self::Computed(fn_style) => Self::Computed(Arc::clone(fn_style)),
        }
    }
}

/// Column display format.
#[derive(Clone)]
pub enum EnumColumnFormat {
    /// Excel number format code attached to the cell.
    NumFormat(String),
    /// Substitution replacing the stored value with derived text.
    Convert(FnCellConvert),
}

/// One column of a sheet definition.
pub struct SpecColumn<T> {
    /// Record field read for this column.
    pub key: String,
    /// Column label used by the implicit header row and the width scan.
    pub header: String,
    /// Width policy; `None` gives the default width.
    pub width: Option<EnumColumnWidth>,
    /// Style source for body cells.
    pub style: Option<EnumColumnStyle<T>>,
    /// Display format.
    pub format: Option<EnumColumnFormat>,
    /// Merge axis.
    pub merge: EnumColumnMerge,
}

impl<T> Default for SpecColumn<T> {
    fn default() -> Self {
        Self {
            key: String::new(),
            header: String::new(),
            width: None,
            style: None,
            format: None,
            merge: EnumColumnMerge::None,
        }
    }
}

impl<T> Clone for SpecColumn<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            header: self.header.clone(),
            width: self.width.clone(),
            style: self.style.clone(),
            format: self.format.clone(),
            merge: self.merge,
        }
    }
}

/// One cell of an explicit header row.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumHeaderCell {
    /// Plain label occupying one cell.
    Label(String),
    /// Descriptor with style and span control.
    Cell(SpecHeaderCell),
}

/// Explicit header cell descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecHeaderCell {
    /// Display text.
    pub value: String,
    /// Style applied to the anchor cell.
    pub style: Option<SpecCellStyle>,
    /// Rows covered; `0` is treated as `1`.
    pub row_span: usize,
    /// Columns covered; `0` is treated as `1`.
    pub col_span: usize,
}

impl Default for SpecHeaderCell {
    fn default() -> Self {
        Self {
            value: String::new(),
            style: None,
            row_span: 1,
            col_span: 1,
        }
    }
}

/// Header configuration for a sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecHeader {
    /// Explicit header rows; `None` keeps the implicit column-label row,
    /// `Some(vec![])` yields a headerless sheet.
    pub rows: Option<Vec<Vec<EnumHeaderCell>>>,
    /// Base style layered under every header cell's own style.
    pub style: Option<SpecCellStyle>,
}

/// Row-level policies applied while rendering body rows.
pub struct SpecRowPolicy<T> {
    /// Style computed per record, layered over column static styles.
    pub style: Option<FnRowStyle<T>>,
}

impl<T> Default for SpecRowPolicy<T> {
    fn default() -> Self {
        Self { style: None }
    }
}

impl<T> Clone for SpecRowPolicy<T> {
    fn clone(&self) -> Self {
        Self {
            style: self.style.clone(),
        }
    }
}

/// Border preset applied after merges are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumBorderPreset {
    /// No borders.
    #[default]
    None,
    /// Thin border on every side of every realized cell.
    All,
    /// Thin border around the used-range perimeter.
    Outer,
    /// Medium bottom border under the last header row.
    HeaderBody,
}

/// Declarative sheet definition over record type `T`.
pub struct SpecSheet<T> {
    /// Worksheet name; validated, never repaired.
    pub name: String,
    /// Columns in display order.
    pub columns: Vec<SpecColumn<T>>,
    /// Header configuration.
    pub header: Option<SpecHeader>,
    /// Row-level policies.
    pub rows: Option<SpecRowPolicy<T>>,
    /// Border preset.
    pub borders: EnumBorderPreset,
    /// Auto-width tuning.
    pub autowidth: SpecAutoWidthPolicy,
    /// Freeze pane request.
    pub freeze: Option<SpecFreezePolicy>,
}

impl<T> Default for SpecSheet<T> {
    fn default() -> Self {
        Self {
            name: String::new(),
            columns: Vec::new(),
            header: None,
            rows: None,
            borders: EnumBorderPreset::None,
            autowidth: SpecAutoWidthPolicy::default(),
            freeze: None,
        }
    }
}

impl<T> Clone for SpecSheet<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            header: self.header.clone(),
            rows: self.rows.clone(),
            borders: self.borders,
            autowidth: self.autowidth.clone(),
            freeze: self.freeze.clone(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PolicyOptions

/// Auto width tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecAutoWidthPolicy {
    /// Include the column header text when seeding the width scan.
    pub header_included: bool,
    /// Display units of padding added around content.
    pub padding: f64,
    /// Multiplier converting display units into column width units.
    pub char_width_constant: f64,
    /// Optional upper clamp on the final width.
    pub width_max: Option<f64>,
}

impl Default for SpecAutoWidthPolicy {
    fn default() -> Self {
        Self {
            header_included: true,
            padding: N_PAD_AUTO_WIDTH_DEFAULT,
            char_width_constant: N_RATIO_CHAR_WIDTH_DEFAULT,
            width_max: None,
        }
    }
}

/// Freeze pane request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFreezePolicy {
    /// Rows frozen at the top; `None` freezes the header rows.
    pub row_freeze: Option<usize>,
    /// Columns frozen at the left.
    pub col_freeze: usize,
}

/// Options for a single save/download call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSaveOptions {
    /// Serialization time budget in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SpecSaveOptions {
    fn default() -> Self {
        Self {
            timeout_ms: N_MS_SAVE_TIMEOUT_DEFAULT,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MergeSpecification

/// Merge range in zero-based inclusive grid coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMergeRange {
    /// First row (inclusive).
    pub row_start: usize,
    /// First column (inclusive).
    pub col_start: usize,
    /// Last row (inclusive).
    pub row_end: usize,
    /// Last column (inclusive).
    pub col_end: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SheetPlanError>;

/// Top-level error for definition, layout, and serialization failures.
#[derive(Debug, thiserror::Error)]
pub enum SheetPlanError {
    /// Sheet name was the empty string.
    #[error("Sheet name is required.")]
    SheetNameEmpty,
    /// Sheet name exceeded the Excel limit.
    #[error("Sheet name {0:?} exceeds the maximum length of 31 characters.")]
    SheetNameTooLong(String),
    /// Sheet name contained a character Excel forbids.
    #[error("Sheet name {0:?} contains invalid characters (\\ / ? * [ ] :).")]
    SheetNameIllegal(String),
    /// Sheet name already used in this workbook.
    #[error("Sheet name {0:?} is already used in this workbook.")]
    SheetNameDuplicate(String),
    /// A column key collided with the inline style channel.
    #[error("Column key 'style' is reserved for row styling and cannot be used as a column key.")]
    ReservedColumnKey,
    /// Record did not serialize to a keyed object.
    #[error("Record at index {index} did not serialize to a keyed object.")]
    RecordNotObject {
        /// Zero-based record index.
        index: usize,
    },
    /// Record inline `style` field did not match the style model.
    #[error("Record at index {index} carries an invalid inline 'style' value: {reason}")]
    InlineStyleInvalid {
        /// Zero-based record index.
        index: usize,
        /// Deserialization failure detail.
        reason: String,
    },
    /// A merge range overlapped one registered earlier.
    #[error(
        "Merge range R{row_start}C{col_start}:R{row_end}C{col_end} overlaps a previously registered merge."
    )]
    MergeConflict {
        /// First row (inclusive).
        row_start: usize,
        /// First column (inclusive).
        col_start: usize,
        /// Last row (inclusive).
        row_end: usize,
        /// Last column (inclusive).
        col_end: usize,
    },
    /// Grid coordinate exceeded the worksheet limits.
    #[error("{axis} index {index} exceeds the worksheet limit.")]
    IndexOverflow {
        /// `"row"` or `"column"`.
        axis: &'static str,
        /// Offending zero-based index.
        index: usize,
    },
    /// Save path was empty.
    #[error("File path cannot be empty.")]
    PathEmpty,
    /// File-system save called on a target without file access.
    #[error("File system access is only available on native targets. Use save_to_buffer() instead.")]
    SaveUnsupported,
    /// Browser download called outside a browser environment.
    #[error("download() is only available in a browser environment. Use save() or save_to_buffer() instead.")]
    DownloadUnsupported,
    /// Serialization exceeded its time budget.
    #[error("Operation timed out after {budget_ms}ms")]
    Timeout {
        /// Budget that elapsed, in milliseconds.
        budget_ms: u64,
    },
    /// Record serialization failed.
    #[error("Record serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    /// Engine-level write failure.
    #[error(transparent)]
    Engine(#[from] rust_xlsxwriter::XlsxError),
    /// Serialization worker task failed to join.
    #[cfg(not(target_arch = "wasm32"))]
    #[error("Serialization task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    /// Browser API call failed.
    #[cfg(target_arch = "wasm32")]
    #[error("Browser API call failed: {0}")]
    Browser(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_font_patch(bold: Option<bool>, color: Option<&str>) -> SpecCellStyle {
        SpecCellStyle {
            font: Some(SpecFontStyle {
                bold,
                color: color.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_overlay_merges_leaves_inside_a_category() {
        let base = derive_font_patch(None, Some("#FF0000"));
        let patch = derive_font_patch(Some(true), None);
        let font = base.overlay(&patch).font.unwrap();
        assert_eq!(font.bold, Some(true));
        assert_eq!(font.color.as_deref(), Some("#FF0000"));
    }

    #[test]
    fn test_overlay_keeps_categories_the_patch_leaves_unset() {
        let base = SpecCellStyle {
            fill: Some(SpecFillStyle {
                color: Some("#EEEEEE".to_string()),
            }),
            ..Default::default()
        };
        let patch = derive_font_patch(Some(true), None);
        let merged = base.overlay(&patch);
        assert_eq!(merged.fill.unwrap().color.as_deref(), Some("#EEEEEE"));
        assert_eq!(merged.font.unwrap().bold, Some(true));
    }

    #[test]
    fn test_border_overlay_merges_side_by_side() {
        let base = SpecCellStyle {
            border: Some(SpecBorderStyle {
                top: Some(SpecBorderEdge {
                    style: Some("thin".to_string()),
                    color: Some("#000000".to_string()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let patch = SpecCellStyle {
            border: Some(SpecBorderStyle {
                top: Some(SpecBorderEdge {
                    style: Some("medium".to_string()),
                    color: None,
                }),
                bottom: Some(SpecBorderEdge {
                    style: Some("thin".to_string()),
                    color: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let border = base.overlay(&patch).border.unwrap();
        let top = border.top.unwrap();
        assert_eq!(top.style.as_deref(), Some("medium"));
        assert_eq!(top.color.as_deref(), Some("#000000"));
        assert!(border.bottom.is_some());
        assert!(border.left.is_none());
    }

    #[test]
    fn test_cell_style_round_trips_through_serde() {
        let style = SpecCellStyle {
            font: Some(SpecFontStyle {
                size: Some(12.0),
                bold: Some(true),
                ..Default::default()
            }),
            alignment: Some(SpecAlignStyle {
                horizontal: Some("center".to_string()),
                wrap_text: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&style).unwrap();
        let restored: SpecCellStyle = serde_json::from_value(value).unwrap();
        assert_eq!(restored, style);
    }
}
