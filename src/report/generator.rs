//! Markdown and JSON report generation.
//!
//! Both renderings are produced from the same [`ReportLayout`] the workbook
//! writer uses, so every format shows the same cells.

use crate::models::ReportMetadata;
use crate::pipeline::SkippedCourse;
use crate::report::layout::{CellValue, ReportLayout, SheetLayout};
use anyhow::Result;
use serde::Serialize;

/// Everything a JSON consumer receives.
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub metadata: &'a ReportMetadata,
    pub skipped: &'a [SkippedCourse],
    pub layout: &'a ReportLayout,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(
    metadata: &ReportMetadata,
    skipped: &[SkippedCourse],
    layout: &ReportLayout,
) -> String {
    let mut output = String::new();

    output.push_str("# Reporte de participación\n\n");
    output.push_str(&generate_metadata_section(metadata));
    output.push_str(&generate_table_of_contents(layout, skipped));

    for sheet in &layout.sheets {
        output.push_str(&generate_sheet_section(sheet));
    }

    output.push_str(&generate_skipped_section(skipped));
    output.push_str("---\n\n*Reporte generado por participation-checker*\n");

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadatos\n\n");
    section.push_str(&format!("- **Origen:** {}\n", metadata.base_url));
    section.push_str(&format!(
        "- **Fecha:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Cursos solicitados:** {}\n",
        metadata.requested_courses.join(", ")
    ));
    section.push_str(&format!(
        "- **Cursos reportados:** {}\n",
        metadata.courses_reported
    ));
    if metadata.courses_skipped > 0 {
        section.push_str(&format!(
            "- **Cursos omitidos:** {}\n",
            metadata.courses_skipped
        ));
    }
    section.push_str(&format!(
        "- **Tiempo de obtención de datos:** {:.2}s\n\n",
        metadata.duration_seconds
    ));

    section
}

fn anchor(name: &str) -> String {
    name.replace(['/', '.', ' ', '(', ')'], "-").to_lowercase()
}

fn generate_table_of_contents(layout: &ReportLayout, skipped: &[SkippedCourse]) -> String {
    let mut toc = String::new();

    toc.push_str("## Contenido\n\n");
    for sheet in &layout.sheets {
        toc.push_str(&format!("- [{}](#{})\n", sheet.name, anchor(&sheet.name)));
    }
    if !skipped.is_empty() {
        toc.push_str("- [Cursos omitidos](#cursos-omitidos)\n");
    }
    toc.push('\n');

    toc
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Render one sheet: text above the header row, then a table.
fn generate_sheet_section(sheet: &SheetLayout) -> String {
    let mut section = String::new();
    section.push_str(&format!("## {}\n\n", sheet.name));

    let width = sheet.column_count() as usize;
    let height = sheet.row_count();
    let mut grid = vec![vec![String::new(); width]; height as usize];
    for cell in &sheet.cells {
        grid[cell.row as usize][cell.col as usize] = match &cell.value {
            CellValue::Empty => String::new(),
            value => escape(value.display()),
        };
    }

    for row in grid.iter().take(sheet.header_row as usize) {
        let line = row
            .iter()
            .filter(|text| !text.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        if !line.is_empty() {
            section.push_str(&format!("**{}**\n\n", line));
        }
    }

    if !sheet.merges.is_empty() {
        let groups: Vec<String> = sheet
            .merges
            .iter()
            .map(|m| {
                format!(
                    "{} (columnas {}-{})",
                    escape(&m.label),
                    m.first_col + 1,
                    m.last_col + 1
                )
            })
            .collect();
        section.push_str(&format!("*Grupos:* {}\n\n", groups.join(", ")));
    }

    let Some(header) = grid.get(sheet.header_row as usize) else {
        section.push_str("Sin datos.\n\n");
        return section;
    };

    section.push_str(&format!("| {} |\n", header.join(" | ")));
    section.push_str(&format!("|{}\n", ":---|".repeat(width)));
    for row in grid.iter().skip(sheet.header_row as usize + 1) {
        section.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    section.push('\n');

    section
}

fn generate_skipped_section(skipped: &[SkippedCourse]) -> String {
    if skipped.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Cursos omitidos\n\n");
    for course in skipped {
        section.push_str(&format!("- `{}`: {}\n", course.course_id, course.reason));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(
    metadata: &ReportMetadata,
    skipped: &[SkippedCourse],
    layout: &ReportLayout,
) -> Result<String> {
    let document = ReportDocument {
        metadata,
        skipped,
        layout,
    };
    serde_json::to_string_pretty(&document).map_err(Into::into)
}
