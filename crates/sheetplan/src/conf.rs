//! Layout constants and default preset factories.

use crate::spec::{SpecAlignStyle, SpecCellStyle, SpecFontStyle, SpecSaveOptions};

/// Excel sheet name maximum length.
pub const N_LEN_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_SHEET_NAME_ILLEGAL: [char; 7] = ['\\', '/', '?', '*', '[', ']', ':'];
/// Record field reserved for the per-row inline style channel.
pub const KEY_ROW_STYLE_RESERVED: &str = "style";
/// Column width applied when a column declares no width policy.
pub const N_WIDTH_COLUMN_DEFAULT: f64 = 15.0;
/// Display units of padding added around auto-sized content.
pub const N_PAD_AUTO_WIDTH_DEFAULT: f64 = 2.0;
/// Multiplier converting display units into column width units.
pub const N_RATIO_CHAR_WIDTH_DEFAULT: f64 = 1.2;
/// Default serialization time budget in milliseconds.
pub const N_MS_SAVE_TIMEOUT_DEFAULT: u64 = 10_000;
/// MIME type attached to browser download payloads.
pub const MIME_XLSX: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Build default save options.
pub fn derive_default_save_options() -> SpecSaveOptions {
    SpecSaveOptions::default()
}

/// Build a bold, centered style preset for header rows.
pub fn derive_default_header_style() -> SpecCellStyle {
    SpecCellStyle {
        font: Some(SpecFontStyle {
            bold: Some(true),
            ..Default::default()
        }),
        alignment: Some(SpecAlignStyle {
            horizontal: Some("center".to_string()),
            vertical: Some("middle".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
