// Automatic merge detection, verified by reading the serialized
// workbook back with umya-spreadsheet.

use std::io::Cursor;

use serde::Serialize;
use sheetplan::{
    EnumColumnMerge, EnumHeaderCell, SheetPlanError, SpecColumn, SpecHeader, SpecHeaderCell,
    SpecSaveOptions, SpecSheet, WorkbookWriter, create_workbook,
};

#[derive(Serialize)]
struct Assignment {
    team: String,
    task: String,
    owner: String,
}

fn derive_assignment_records(l_teams: [&str; 3]) -> Vec<Assignment> {
    l_teams
        .iter()
        .enumerate()
        .map(|(n_idx, team)| Assignment {
            team: team.to_string(),
            task: format!("task-{n_idx}"),
            owner: format!("owner-{n_idx}"),
        })
        .collect()
}

fn derive_assignment_sheet(merge_team: EnumColumnMerge) -> SpecSheet<Assignment> {
    SpecSheet {
        name: "Assignments".to_string(),
        columns: vec![
            SpecColumn {
                key: "team".to_string(),
                header: "Team".to_string(),
                merge: merge_team,
                ..Default::default()
            },
            SpecColumn {
                key: "task".to_string(),
                header: "Task".to_string(),
                ..Default::default()
            },
            SpecColumn {
                key: "owner".to_string(),
                header: "Owner".to_string(),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

async fn read_merge_ranges(writer: &mut WorkbookWriter, sheet_name: &str) -> Vec<String> {
    let buffer = writer
        .save_to_buffer(&SpecSaveOptions::default())
        .await
        .unwrap();
    let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(buffer), true).unwrap();
    book.get_sheet_by_name(sheet_name)
        .unwrap()
        .get_merge_cells()
        .iter()
        .map(|range| range.get_range())
        .collect()
}

#[tokio::test]
async fn vertical_runs_merge_across_rows() {
    let mut writer = create_workbook();
    writer
        .add_sheet(
            &derive_assignment_sheet(EnumColumnMerge::Vertical),
            &derive_assignment_records(["Atlas", "Atlas", "Borea"]),
        )
        .unwrap();

    let l_ranges = read_merge_ranges(&mut writer, "Assignments").await;
    assert_eq!(l_ranges, vec!["A2:A3".to_string()]);
}

#[tokio::test]
async fn distinct_values_leave_no_merges() {
    let mut writer = create_workbook();
    writer
        .add_sheet(
            &derive_assignment_sheet(EnumColumnMerge::Vertical),
            &derive_assignment_records(["Atlas", "Borea", "Cirrus"]),
        )
        .unwrap();

    let l_ranges = read_merge_ranges(&mut writer, "Assignments").await;
    assert!(l_ranges.is_empty(), "unexpected merges: {l_ranges:?}");
}

#[tokio::test]
async fn horizontal_runs_respect_column_eligibility() {
    #[derive(Serialize)]
    struct Quad {
        a: &'static str,
        b: &'static str,
        c: &'static str,
        d: &'static str,
    }

    let spec = SpecSheet::<Quad> {
        name: "Rota".to_string(),
        columns: ["a", "b", "c", "d"]
            .iter()
            .map(|key| SpecColumn {
                key: key.to_string(),
                header: key.to_uppercase(),
                merge: EnumColumnMerge::Horizontal,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };
    let records = vec![Quad {
        a: "X",
        b: "X",
        c: "Y",
        d: "X",
    }];

    let mut writer = create_workbook();
    writer.add_sheet(&spec, &records).unwrap();

    let l_ranges = read_merge_ranges(&mut writer, "Rota").await;
    assert_eq!(l_ranges, vec!["A2:B2".to_string()]);
}

#[test]
fn header_spans_crossing_body_merges_are_rejected() {
    let mut spec = derive_assignment_sheet(EnumColumnMerge::Vertical);
    spec.header = Some(SpecHeader {
        rows: Some(vec![vec![EnumHeaderCell::Cell(SpecHeaderCell {
            value: "Team".to_string(),
            row_span: 3,
            ..Default::default()
        })]]),
        ..Default::default()
    });

    let mut writer = create_workbook();
    let result = writer.add_sheet(
        &spec,
        &derive_assignment_records(["Atlas", "Atlas", "Atlas"]),
    );
    assert!(matches!(
        result,
        Err(SheetPlanError::MergeConflict { .. })
    ));
}
