//! Pure helpers for validation, record normalization, width math, and
//! merge run detection.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::conf::{
    KEY_ROW_STYLE_RESERVED, N_LEN_SHEET_NAME_MAX, N_WIDTH_COLUMN_DEFAULT,
    TUP_SHEET_NAME_ILLEGAL,
};
use crate::spec::{
    EnumCellValue, Result, SheetPlanError, SpecAutoWidthPolicy, SpecCellStyle, SpecColumn,
};

////////////////////////////////////////////////////////////////////////////////
// #region DefinitionValidation

/// Validate a worksheet name against the Excel naming rules.
///
/// Names are validated, never repaired: empty, overlong, and
/// illegal-character names are definition errors. Only the literal
/// empty string counts as empty; a whitespace-only name is legal and
/// passes through untrimmed.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SheetPlanError::SheetNameEmpty);
    }
    if name.chars().count() > N_LEN_SHEET_NAME_MAX {
        return Err(SheetPlanError::SheetNameTooLong(name.to_string()));
    }
    if name.contains(&TUP_SHEET_NAME_ILLEGAL[..]) {
        return Err(SheetPlanError::SheetNameIllegal(name.to_string()));
    }
    Ok(())
}

/// Reject column keys that collide with the inline row-style channel.
pub fn validate_column_keys<T>(columns: &[SpecColumn<T>]) -> Result<()> {
    if columns
        .iter()
        .any(|column| column.key == KEY_ROW_STYLE_RESERVED)
    {
        return Err(SheetPlanError::ReservedColumnKey);
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordConversion

/// Serialize one record into a keyed field map.
pub fn derive_record_map<T: Serialize>(
    record: &T,
    n_idx_record: usize,
) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(dict_fields) => Ok(dict_fields),
        _ => Err(SheetPlanError::RecordNotObject {
            index: n_idx_record,
        }),
    }
}

/// Normalize one record field into a pipeline cell value.
///
/// Missing fields and nulls become blanks; non-scalar fields are
/// stringified rather than rejected.
pub fn derive_cell_value(value: Option<&Value>) -> EnumCellValue {
    match value {
        None | Some(Value::Null) => EnumCellValue::None,
        Some(Value::String(val)) => EnumCellValue::String(val.clone()),
        Some(Value::Number(val)) => val.as_f64().map_or_else(
            || EnumCellValue::String(val.to_string()),
            EnumCellValue::Number,
        ),
        Some(Value::Bool(val)) => EnumCellValue::Bool(*val),
        Some(other) => EnumCellValue::String(other.to_string()),
    }
}

/// Produce the display text used for width scans.
pub fn derive_display_text(value: &EnumCellValue) -> String {
    match value {
        EnumCellValue::None => String::new(),
        EnumCellValue::String(val) => val.clone(),
        EnumCellValue::Number(val) => val.to_string(),
        EnumCellValue::Bool(val) => val.to_string(),
    }
}

/// Deserialize the reserved inline `style` field when a record carries one.
pub fn derive_inline_style(
    record_map: &Map<String, Value>,
    n_idx_record: usize,
) -> Result<Option<SpecCellStyle>> {
    let Some(value) = record_map.get(KEY_ROW_STYLE_RESERVED) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value::<SpecCellStyle>(value.clone())
        .map(Some)
        .map_err(|err| SheetPlanError::InlineStyleInvalid {
            index: n_idx_record,
            reason: err.to_string(),
        })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Display width of text where code points above `U+00FF` count as two
/// units and all others count as one.
pub fn calculate_display_width(text: &str) -> usize {
    text.chars()
        .map(|chr| if chr as u32 > 255 { 2 } else { 1 })
        .sum()
}

/// Convert the longest display width seen in a column into its final width.
pub fn calculate_auto_width(n_len_max: usize, policy: &SpecAutoWidthPolicy) -> f64 {
    let n_width = (n_len_max as f64 + policy.padding) * policy.char_width_constant;
    if !n_width.is_finite() {
        return N_WIDTH_COLUMN_DEFAULT;
    }
    match policy.width_max {
        Some(n_width_max) => f64::min(n_width, n_width_max),
        None => n_width,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MergeRunDetection

/// Detect contiguous runs of equal values, returning inclusive
/// `(start, end)` index pairs. Runs of length one are dropped; blanks
/// compare equal to blanks and may merge.
pub fn derive_vertical_runs(values: &[EnumCellValue]) -> Vec<(usize, usize)> {
    let mut l_runs = Vec::new();
    let mut n_idx_start = 0;
    for n_idx in 1..=values.len() {
        let if_run_continues = n_idx < values.len() && values[n_idx] == values[n_idx - 1];
        if if_run_continues {
            continue;
        }
        if n_idx - n_idx_start >= 2 {
            l_runs.push((n_idx_start, n_idx - 1));
        }
        n_idx_start = n_idx;
    }
    l_runs
}

/// Detect contiguous equal-value runs across positions flagged eligible.
///
/// An ineligible position always closes the current run; runs never
/// re-group around it even when the values on both sides are equal.
pub fn derive_horizontal_runs(
    values: &[EnumCellValue],
    l_eligible: &[bool],
) -> Vec<(usize, usize)> {
    let mut l_runs = Vec::new();
    let mut n_idx_start = 0;
    for n_idx in 1..=values.len() {
        let if_run_continues = n_idx < values.len()
            && l_eligible[n_idx]
            && l_eligible[n_idx - 1]
            && values[n_idx] == values[n_idx - 1];
        if if_run_continues {
            continue;
        }
        if n_idx - n_idx_start >= 2 {
            l_runs.push((n_idx_start, n_idx - 1));
        }
        n_idx_start = n_idx;
    }
    l_runs
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_validate_sheet_name_rejects_empty_long_and_illegal_names() {
        assert!(validate_sheet_name("Report").is_ok());
        assert!(validate_sheet_name(&"x".repeat(31)).is_ok());
        assert!(validate_sheet_name("   ").is_ok());
        assert!(matches!(
            validate_sheet_name(""),
            Err(SheetPlanError::SheetNameEmpty)
        ));
        assert!(matches!(
            validate_sheet_name(&"x".repeat(32)),
            Err(SheetPlanError::SheetNameTooLong(_))
        ));
        assert!(matches!(
            validate_sheet_name("bad/name"),
            Err(SheetPlanError::SheetNameIllegal(_))
        ));
        assert!(matches!(
            validate_sheet_name("q?"),
            Err(SheetPlanError::SheetNameIllegal(_))
        ));
    }

    #[test]
    fn test_validate_column_keys_rejects_the_reserved_style_key() {
        let l_columns: Vec<SpecColumn<()>> = vec![
            SpecColumn {
                key: "name".to_string(),
                ..Default::default()
            },
            SpecColumn {
                key: "style".to_string(),
                ..Default::default()
            },
        ];
        assert!(matches!(
            validate_column_keys(&l_columns),
            Err(SheetPlanError::ReservedColumnKey)
        ));
        assert!(validate_column_keys(&l_columns[..1]).is_ok());
    }

    #[test]
    fn test_derive_record_map_requires_a_keyed_object() {
        assert!(derive_record_map(&json!({"a": 1}), 0).is_ok());
        assert!(matches!(
            derive_record_map(&json!(42), 3),
            Err(SheetPlanError::RecordNotObject { index: 3 })
        ));
    }

    #[test]
    fn test_derive_cell_value_normalizes_json_scalars() {
        assert_eq!(derive_cell_value(None), EnumCellValue::None);
        assert_eq!(derive_cell_value(Some(&json!(null))), EnumCellValue::None);
        assert_eq!(
            derive_cell_value(Some(&json!("abc"))),
            EnumCellValue::String("abc".to_string())
        );
        assert_eq!(
            derive_cell_value(Some(&json!(2.5))),
            EnumCellValue::Number(2.5)
        );
        assert_eq!(
            derive_cell_value(Some(&json!(true))),
            EnumCellValue::Bool(true)
        );
        assert_eq!(
            derive_cell_value(Some(&json!([1, 2]))),
            EnumCellValue::String("[1,2]".to_string())
        );
    }

    #[test]
    fn test_derive_display_text_drops_trailing_zero_decimals() {
        assert_eq!(derive_display_text(&EnumCellValue::None), "");
        assert_eq!(derive_display_text(&EnumCellValue::Number(36.0)), "36");
        assert_eq!(derive_display_text(&EnumCellValue::Number(1.5)), "1.5");
        assert_eq!(derive_display_text(&EnumCellValue::Bool(true)), "true");
    }

    #[test]
    fn test_derive_inline_style_reads_the_reserved_field() {
        let dict_plain = derive_record_map(&json!({"a": 1}), 0).unwrap();
        assert!(derive_inline_style(&dict_plain, 0).unwrap().is_none());

        let dict_styled = derive_record_map(
            &json!({"a": 1, "style": {"fill": {"color": "#FFEE00"}}}),
            0,
        )
        .unwrap();
        let style = derive_inline_style(&dict_styled, 0).unwrap().unwrap();
        assert_eq!(style.fill.unwrap().color.as_deref(), Some("#FFEE00"));

        let dict_bad = derive_record_map(&json!({"a": 1, "style": 42}), 5).unwrap();
        assert!(matches!(
            derive_inline_style(&dict_bad, 5),
            Err(SheetPlanError::InlineStyleInvalid { index: 5, .. })
        ));
    }

    #[test]
    fn test_calculate_display_width_counts_wide_code_points_twice() {
        assert_eq!(calculate_display_width(""), 0);
        assert_eq!(calculate_display_width("abc"), 3);
        assert_eq!(calculate_display_width("数据"), 4);
        assert_eq!(calculate_display_width("a数"), 3);
    }

    #[test]
    fn test_calculate_auto_width_applies_padding_ratio_and_clamp() {
        let policy = SpecAutoWidthPolicy::default();
        assert!((calculate_auto_width(8, &policy) - 12.0).abs() < 1e-9);

        let policy_clamped = SpecAutoWidthPolicy {
            width_max: Some(10.0),
            ..Default::default()
        };
        assert!((calculate_auto_width(8, &policy_clamped) - 10.0).abs() < 1e-9);

        let policy_bad = SpecAutoWidthPolicy {
            padding: f64::NAN,
            ..Default::default()
        };
        assert!((calculate_auto_width(8, &policy_bad) - N_WIDTH_COLUMN_DEFAULT).abs() < 1e-9);
    }

    #[test]
    fn test_derive_vertical_runs_detects_contiguous_equal_values() {
        let l_values = vec![
            EnumCellValue::String("A".to_string()),
            EnumCellValue::String("A".to_string()),
            EnumCellValue::String("B".to_string()),
        ];
        assert_eq!(derive_vertical_runs(&l_values), vec![(0, 1)]);

        let l_distinct = vec![
            EnumCellValue::String("A".to_string()),
            EnumCellValue::String("B".to_string()),
            EnumCellValue::String("C".to_string()),
        ];
        assert!(derive_vertical_runs(&l_distinct).is_empty());

        assert!(derive_vertical_runs(&[]).is_empty());

        let l_blanks = vec![EnumCellValue::None, EnumCellValue::None];
        assert_eq!(derive_vertical_runs(&l_blanks), vec![(0, 1)]);
    }

    #[test]
    fn test_derive_horizontal_runs_close_at_ineligible_positions() {
        let l_values: Vec<EnumCellValue> = ["X", "X", "Y", "X"]
            .iter()
            .map(|val| EnumCellValue::String(val.to_string()))
            .collect();
        assert_eq!(
            derive_horizontal_runs(&l_values, &[true, true, true, true]),
            vec![(0, 1)]
        );

        let l_equal: Vec<EnumCellValue> = ["X", "X", "X"]
            .iter()
            .map(|val| EnumCellValue::String(val.to_string()))
            .collect();
        assert!(derive_horizontal_runs(&l_equal, &[true, false, true]).is_empty());
        assert_eq!(
            derive_horizontal_runs(&l_equal, &[true, true, true]),
            vec![(0, 2)]
        );
    }
}
