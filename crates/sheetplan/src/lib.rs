//! `sheetplan` v1:
//! Declarative, styled xlsx workbooks from typed row data.
//!
//! A sheet definition plus a slice of serializable records resolves into
//! a fully laid-out grid (widths, headers, layered styles, merges,
//! borders) which is handed to `rust_xlsxwriter` for serialization:
//! - `conf`    : constants and default presets
//! - `spec`    : declarative models, the style model, and error types
//! - `util`    : pure helper functions
//! - `grid`    : resolved cell grid and merge registry
//! - `builder` : sheet layout pipeline
//! - `writer`  : workbook facade and engine handoff
pub mod builder;
pub mod conf;
pub mod grid;
pub mod spec;
pub mod util;
pub mod writer;

pub use builder::build_sheet_grid;
pub use conf::{
    KEY_ROW_STYLE_RESERVED, MIME_XLSX, N_LEN_SHEET_NAME_MAX, N_MS_SAVE_TIMEOUT_DEFAULT,
    N_PAD_AUTO_WIDTH_DEFAULT, N_RATIO_CHAR_WIDTH_DEFAULT, N_WIDTH_COLUMN_DEFAULT,
    TUP_SHEET_NAME_ILLEGAL, derive_default_header_style, derive_default_save_options,
};
pub use grid::{GridCell, SheetGrid};
pub use spec::{
    EnumBorderPreset, EnumCellValue, EnumColumnFormat, EnumColumnMerge, EnumColumnStyle,
    EnumColumnWidth, EnumHeaderCell, FnCellConvert, FnCellStyle, FnRowStyle, Result,
    SheetPlanError, SpecAlignStyle, SpecAutoWidthPolicy, SpecBorderEdge, SpecBorderStyle,
    SpecCellStyle, SpecColumn, SpecFillStyle, SpecFontStyle, SpecFreezePolicy, SpecHeader,
    SpecHeaderCell, SpecMergeRange, SpecRowPolicy, SpecSaveOptions, SpecSheet,
};
pub use util::{
    calculate_auto_width, calculate_display_width, derive_cell_value, derive_display_text,
    derive_horizontal_runs, derive_inline_style, derive_record_map, derive_vertical_runs,
    validate_column_keys, validate_sheet_name,
};
pub use writer::{WorkbookWriter, create_workbook, define_sheet};
