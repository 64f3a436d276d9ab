//! Report layout assembly.
//!
//! Turns course tables and the summary into a declarative description of
//! the workbook: sheets, cells with a semantic category, and merged header
//! regions. Writers only interpret this descriptor.

use crate::table::{CourseTable, SummaryTable, IDENTITY_HEADERS};
use serde::Serialize;
use std::collections::HashSet;

/// Name of the cross-course sheet.
pub const SUMMARY_SHEET_NAME: &str = "Resumen";

/// Spreadsheet limit on sheet name length.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Characters not allowed in sheet names.
const ILLEGAL_SHEET_CHARS: [char; 8] = ['[', ']', ':', '*', '?', '/', '\\', '\''];

/// Row of the column headers on course sheets, below the two title rows.
pub const COURSE_HEADER_ROW: u32 = 3;

/// Upper (course group) and lower (column name) header rows of the summary.
pub const SUMMARY_GROUP_ROW: u32 = 0;
pub const SUMMARY_HEADER_ROW: u32 = 1;

/// Fixed columns of a course sheet, before the assignment columns.
pub const COURSE_HEADERS: [&str; 8] = [
    "Nombres",
    "Apellidos",
    "RUT",
    "Correo",
    "Fecha de inscripción",
    "Última actividad",
    "Tiempo total de actividad",
    "Ha participado",
];

const YES: &str = "Sí";
const NO: &str = "No";

/// Semantic category of a cell, mapped to a format by writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellCategory {
    Title,
    Header,
    Delivered,
    NotDelivered,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Text(String),
    /// Delivery flag of one student for one assignment.
    Delivery(bool),
    Empty,
}

impl CellValue {
    pub fn display(&self) -> &str {
        match self {
            CellValue::Text(text) => text,
            CellValue::Delivery(true) => YES,
            CellValue::Delivery(false) => NO,
            CellValue::Empty => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub row: u32,
    pub col: u16,
    pub value: CellValue,
    pub category: CellCategory,
}

/// A rectangular region rendered as a single labelled cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRange {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
    pub label: String,
    pub category: CellCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetLayout {
    pub name: String,
    /// Row holding the literal column names.
    pub header_row: u32,
    pub cells: Vec<Cell>,
    pub merges: Vec<MergedRange>,
}

impl SheetLayout {
    fn new(name: String, header_row: u32) -> Self {
        Self {
            name,
            header_row,
            cells: Vec::new(),
            merges: Vec::new(),
        }
    }

    fn push(&mut self, row: u32, col: u16, value: CellValue, category: CellCategory) {
        self.cells.push(Cell {
            row,
            col,
            value,
            category,
        });
    }

    fn push_text(&mut self, row: u32, col: u16, text: &str, category: CellCategory) {
        self.push(row, col, CellValue::Text(text.to_string()), category);
    }

    fn push_delivery(&mut self, row: u32, col: u16, delivered: Option<bool>) {
        match delivered {
            Some(true) => self.push(row, col, CellValue::Delivery(true), CellCategory::Delivered),
            Some(false) => {
                self.push(row, col, CellValue::Delivery(false), CellCategory::NotDelivered)
            }
            None => self.push(row, col, CellValue::Empty, CellCategory::Plain),
        }
    }

    #[cfg(test)]
    pub fn cell(&self, row: u32, col: u16) -> Option<&Cell> {
        self.cells.iter().find(|c| c.row == row && c.col == col)
    }

    /// Number of rows spanned by cells and merges.
    pub fn row_count(&self) -> u32 {
        let cells = self.cells.iter().map(|c| c.row + 1);
        let merges = self.merges.iter().map(|m| m.last_row + 1);
        cells.chain(merges).max().unwrap_or(0)
    }

    /// Number of columns spanned by cells and merges.
    pub fn column_count(&self) -> u16 {
        let cells = self.cells.iter().map(|c| c.col + 1);
        let merges = self.merges.iter().map(|m| m.last_col + 1);
        cells.chain(merges).max().unwrap_or(0)
    }
}

/// The complete workbook description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLayout {
    pub sheets: Vec<SheetLayout>,
}

#[derive(Debug, Clone, Default)]
pub struct LayoutOptions {
    /// Keep only students without activity on course sheets.
    pub non_participants_only: bool,
}

/// Replace characters spreadsheets reject and cut to 31 characters.
pub fn sanitize_sheet_name(name: &str) -> String {
    name.chars()
        .map(|c| if ILLEGAL_SHEET_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_SHEET_NAME_LEN)
        .collect()
}

/// Sheet names are compared case-insensitively; repeats get a " (n)" suffix.
fn unique_sheet_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_lowercase()) {
        return base;
    }

    let mut n = 2;
    loop {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME_LEN - suffix.chars().count();
        let candidate: String = base.chars().take(keep).chain(suffix.chars()).collect();
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// Lay out one sheet per course, then the summary sheet when present.
pub fn assemble(
    courses: &[CourseTable],
    summary: Option<&SummaryTable>,
    options: &LayoutOptions,
) -> ReportLayout {
    let mut used = HashSet::new();
    if summary.is_some() {
        used.insert(SUMMARY_SHEET_NAME.to_lowercase());
    }

    let mut sheets: Vec<SheetLayout> = courses
        .iter()
        .map(|table| {
            let mut base = sanitize_sheet_name(&table.course_name);
            if base.trim().is_empty() {
                base = sanitize_sheet_name(&format!("Curso {}", table.course_id));
            }
            let name = unique_sheet_name(base, &mut used);
            course_sheet(table, name, options)
        })
        .collect();

    if let Some(summary) = summary {
        sheets.push(summary_sheet(summary));
    }

    ReportLayout { sheets }
}

fn course_sheet(table: &CourseTable, name: String, options: &LayoutOptions) -> SheetLayout {
    let mut sheet = SheetLayout::new(name, COURSE_HEADER_ROW);

    sheet.push_text(0, 0, &table.account_name, CellCategory::Title);
    sheet.push_text(1, 0, &table.course_name, CellCategory::Title);

    let headers = COURSE_HEADERS
        .iter()
        .copied()
        .chain(table.assignments.iter().map(|a| a.name.as_str()));
    for (col, header) in headers.enumerate() {
        sheet.push_text(COURSE_HEADER_ROW, col as u16, header, CellCategory::Header);
    }

    let rows = table
        .rows
        .iter()
        .filter(|row| !options.non_participants_only || !row.record.has_participated);

    for (offset, row) in rows.enumerate() {
        let r = COURSE_HEADER_ROW + 1 + offset as u32;
        let record = &row.record;
        let participated = if record.has_participated { YES } else { NO };

        let fixed = [
            record.given_names.clone(),
            record.family_names.clone(),
            record.national_id.clone().unwrap_or_default(),
            record.email.clone().unwrap_or_default(),
            record.display_enrolled_at(),
            record.display_last_activity(),
            record.total_activity_duration.clone().unwrap_or_default(),
            participated.to_string(),
        ];
        for (col, text) in fixed.into_iter().enumerate() {
            sheet.push(r, col as u16, CellValue::Text(text), CellCategory::Plain);
        }

        for (i, delivered) in row.delivered.iter().enumerate() {
            sheet.push_delivery(r, (COURSE_HEADERS.len() + i) as u16, Some(*delivered));
        }
    }

    sheet
}

fn summary_sheet(summary: &SummaryTable) -> SheetLayout {
    let mut sheet = SheetLayout::new(SUMMARY_SHEET_NAME.to_string(), SUMMARY_HEADER_ROW);

    for interval in &summary.intervals {
        sheet.merges.push(MergedRange {
            first_row: SUMMARY_GROUP_ROW,
            first_col: interval.first as u16,
            last_row: SUMMARY_GROUP_ROW,
            last_col: interval.last as u16,
            label: interval.course_name.clone(),
            category: CellCategory::Header,
        });
    }

    for (col, header) in summary.headers().into_iter().enumerate() {
        sheet.push_text(SUMMARY_HEADER_ROW, col as u16, header, CellCategory::Header);
    }

    for (offset, row) in summary.rows.iter().enumerate() {
        let r = SUMMARY_HEADER_ROW + 1 + offset as u32;
        sheet.push_text(r, 0, &row.given_names, CellCategory::Plain);
        sheet.push_text(r, 1, &row.family_names, CellCategory::Plain);
        for (i, value) in row.values.iter().enumerate() {
            sheet.push_delivery(r, (IDENTITY_HEADERS.len() + i) as u16, *value);
        }
    }

    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentRecord;
    use crate::table::merge::{MinimalRow, MinimalTable};
    use crate::table::course::{AssignmentColumn, StudentRow};
    use crate::table::merge_courses;

    fn student(given: &str, family: &str, participated: bool, delivered: Vec<bool>) -> StudentRow {
        StudentRow {
            record: StudentRecord {
                internal_id: Some(1),
                given_names: given.to_string(),
                family_names: family.to_string(),
                national_id: Some("12345678-9".to_string()),
                email: Some("a@x.cl".to_string()),
                enrolled_at: None,
                last_activity_at: None,
                has_participated: participated,
                total_activity_duration: None,
                course_name: None,
                program_name: None,
            },
            delivered,
        }
    }

    fn course(name: &str, rows: Vec<StudentRow>, assignments: &[&str]) -> CourseTable {
        CourseTable {
            course_id: "10".to_string(),
            course_name: name.to_string(),
            account_id: Some(1),
            account_name: "Diplomado en Datos".to_string(),
            assignments: assignments
                .iter()
                .enumerate()
                .map(|(i, n)| AssignmentColumn {
                    id: i as u64,
                    name: n.to_string(),
                })
                .collect(),
            rows,
        }
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("Curso: [A]*?/\\'x"), "Curso_ _A______x");
        let long = "Introducción a la Programación Avanzada 2024";
        let sanitized = sanitize_sheet_name(long);
        assert_eq!(sanitized.chars().count(), 31);
        assert!(long.starts_with(&sanitized));
    }

    #[test]
    fn test_duplicate_sheet_names_get_suffix() {
        let a = course("Taller", vec![], &[]);
        let b = course("taller", vec![], &[]);
        let c = course(&"X".repeat(40), vec![], &[]);
        let d = course(&"X".repeat(40), vec![], &[]);

        let layout = assemble(&[a, b, c, d], None, &LayoutOptions::default());
        let names: Vec<_> = layout.sheets.iter().map(|s| s.name.clone()).collect();

        assert_eq!(names[0], "Taller");
        assert_eq!(names[1], "taller (2)");
        assert_eq!(names[2], "X".repeat(31));
        assert_eq!(names[3], format!("{} (2)", "X".repeat(27)));
        assert!(names.iter().all(|n| n.chars().count() <= MAX_SHEET_NAME_LEN));
    }

    #[test]
    fn test_course_named_like_summary_is_renamed() {
        let table = course("Resumen", vec![], &[]);
        let summary = SummaryTable::default();
        let layout = assemble(&[table], Some(&summary), &LayoutOptions::default());
        assert_eq!(layout.sheets[0].name, "Resumen (2)");
        assert_eq!(layout.sheets[1].name, "Resumen");
    }

    #[test]
    fn test_course_sheet_layout() {
        let table = course(
            "Curso A",
            vec![
                student("Ana", "Soto", true, vec![true]),
                student("Luis", "Rojas", false, vec![false]),
            ],
            &["Tarea1"],
        );

        let layout = assemble(&[table], None, &LayoutOptions::default());
        let sheet = &layout.sheets[0];

        assert_eq!(sheet.header_row, COURSE_HEADER_ROW);
        let title = sheet.cell(0, 0).unwrap();
        assert_eq!(title.value.display(), "Diplomado en Datos");
        assert_eq!(title.category, CellCategory::Title);
        assert_eq!(sheet.cell(1, 0).unwrap().value.display(), "Curso A");

        let header = sheet.cell(3, 8).unwrap();
        assert_eq!(header.value.display(), "Tarea1");
        assert_eq!(header.category, CellCategory::Header);
        assert_eq!(sheet.cell(3, 0).unwrap().value.display(), "Nombres");

        assert_eq!(sheet.cell(4, 0).unwrap().value.display(), "Ana");
        assert_eq!(sheet.cell(4, 2).unwrap().value.display(), "12345678-9");
        assert_eq!(sheet.cell(5, 5).unwrap().value.display(), "Nunca");
        assert_eq!(sheet.cell(4, 7).unwrap().value.display(), "Sí");
        assert_eq!(sheet.cell(4, 7).unwrap().category, CellCategory::Plain);
        assert_eq!(sheet.cell(4, 8).unwrap().category, CellCategory::Delivered);
        assert_eq!(sheet.cell(5, 8).unwrap().category, CellCategory::NotDelivered);
        assert_eq!(sheet.row_count(), 6);
        assert_eq!(sheet.column_count(), 9);
        assert!(sheet.merges.is_empty());
    }

    #[test]
    fn test_non_participants_filter() {
        let table = course(
            "Curso A",
            vec![
                student("Ana", "Soto", true, vec![]),
                student("Luis", "Rojas", false, vec![]),
            ],
            &[],
        );
        let options = LayoutOptions {
            non_participants_only: true,
        };

        let layout = assemble(&[table], None, &options);
        let sheet = &layout.sheets[0];

        assert_eq!(sheet.cell(4, 0).unwrap().value.display(), "Luis");
        assert!(sheet.cell(5, 0).is_none());
    }

    #[test]
    fn test_summary_sheet_layout() {
        let summary = merge_courses(&[
            MinimalTable {
                course_name: "Curso A".to_string(),
                columns: vec!["Tarea1".to_string(), "Tarea2".to_string()],
                rows: vec![MinimalRow {
                    given_names: "Ana".to_string(),
                    family_names: "Soto".to_string(),
                    values: vec![true, false],
                }],
            },
            MinimalTable {
                course_name: "Curso B".to_string(),
                columns: vec!["Foro".to_string()],
                rows: vec![MinimalRow {
                    given_names: "Luis".to_string(),
                    family_names: "Rojas".to_string(),
                    values: vec![true],
                }],
            },
        ]);

        let layout = assemble(&[], Some(&summary), &LayoutOptions::default());
        let sheet = &layout.sheets[0];

        assert_eq!(sheet.name, "Resumen");
        assert_eq!(sheet.header_row, 1);
        assert_eq!(
            sheet.merges,
            vec![
                MergedRange {
                    first_row: 0,
                    first_col: 2,
                    last_row: 0,
                    last_col: 3,
                    label: "Curso A".to_string(),
                    category: CellCategory::Header,
                },
                MergedRange {
                    first_row: 0,
                    first_col: 4,
                    last_row: 0,
                    last_col: 4,
                    label: "Curso B".to_string(),
                    category: CellCategory::Header,
                },
            ]
        );

        let headers: Vec<_> = (0..5)
            .map(|c| sheet.cell(1, c).unwrap().value.display().to_string())
            .collect();
        assert_eq!(headers, vec!["Nombres", "Apellidos", "Tarea1", "Tarea2", "Foro"]);

        // Rojas sorts before Soto.
        assert_eq!(sheet.cell(2, 1).unwrap().value.display(), "Rojas");
        assert_eq!(sheet.cell(2, 2).unwrap().category, CellCategory::Plain);
        assert_eq!(sheet.cell(2, 2).unwrap().value, CellValue::Empty);
        assert_eq!(sheet.cell(2, 4).unwrap().category, CellCategory::Delivered);
        assert_eq!(sheet.cell(3, 2).unwrap().category, CellCategory::Delivered);
        assert_eq!(sheet.cell(3, 3).unwrap().category, CellCategory::NotDelivered);
    }

    #[test]
    fn test_layout_serializes_categories() {
        let table = course("C", vec![student("Ana", "Soto", true, vec![true])], &["T"]);
        let layout = assemble(&[table], None, &LayoutOptions::default());
        let json = serde_json::to_string(&layout).unwrap();
        assert!(json.contains("\"category\":\"delivered\""));
        assert!(json.contains("\"category\":\"title\""));
        assert!(json.contains("{\"type\":\"delivery\",\"value\":true}"));
    }
}
