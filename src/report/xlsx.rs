//! Workbook export.
//!
//! Interprets a [`ReportLayout`]: each cell category maps to one format,
//! merged regions become merged ranges.

use crate::report::layout::{CellCategory, CellValue, ReportLayout, SheetLayout};
use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tracing::debug;

struct Formats {
    title: Format,
    header: Format,
    delivered: Format,
    not_delivered: Format,
    plain: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            title: Format::new().set_bold().set_font_size(14),
            header: Format::new()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_background_color(Color::RGB(0xD9E1F2))
                .set_border(FormatBorder::Thin),
            delivered: Format::new()
                .set_align(FormatAlign::Center)
                .set_background_color(Color::RGB(0xC6EFCE))
                .set_font_color(Color::RGB(0x006100))
                .set_border(FormatBorder::Thin),
            not_delivered: Format::new()
                .set_align(FormatAlign::Center)
                .set_background_color(Color::RGB(0xFFC7CE))
                .set_font_color(Color::RGB(0x9C0006))
                .set_border(FormatBorder::Thin),
            plain: Format::new().set_border(FormatBorder::Thin),
        }
    }

    fn for_category(&self, category: CellCategory) -> &Format {
        match category {
            CellCategory::Title => &self.title,
            CellCategory::Header => &self.header,
            CellCategory::Delivered => &self.delivered,
            CellCategory::NotDelivered => &self.not_delivered,
            CellCategory::Plain => &self.plain,
        }
    }
}

/// Build the workbook and save it to `path`.
pub fn write_workbook(layout: &ReportLayout, path: &Path) -> Result<()> {
    let bytes = workbook_bytes(layout)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write workbook to {}", path.display()))?;
    Ok(())
}

/// Build the workbook in memory.
pub fn workbook_bytes(layout: &ReportLayout) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(layout).context("Failed to build workbook")?;
    workbook
        .save_to_buffer()
        .context("Failed to serialize workbook")
}

fn build_workbook(layout: &ReportLayout) -> Result<Workbook, XlsxError> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();

    for sheet in &layout.sheets {
        let worksheet = workbook.add_worksheet();
        write_sheet(worksheet, sheet, &formats)?;
        debug!(
            "Sheet {:?}: {} cells, {} merged ranges",
            sheet.name,
            sheet.cells.len(),
            sheet.merges.len()
        );
    }

    Ok(workbook)
}

fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &SheetLayout,
    formats: &Formats,
) -> Result<(), XlsxError> {
    worksheet.set_name(&sheet.name)?;

    for merge in &sheet.merges {
        let format = formats.for_category(merge.category);
        if merge.first_row == merge.last_row && merge.first_col == merge.last_col {
            // Single-cell ranges cannot be merged.
            worksheet.write_string_with_format(
                merge.first_row,
                merge.first_col,
                &merge.label,
                format,
            )?;
        } else {
            worksheet.merge_range(
                merge.first_row,
                merge.first_col,
                merge.last_row,
                merge.last_col,
                &merge.label,
                format,
            )?;
        }
    }

    for cell in &sheet.cells {
        let format = formats.for_category(cell.category);
        match &cell.value {
            CellValue::Empty => {
                worksheet.write_blank(cell.row, cell.col, format)?;
            }
            value => {
                worksheet.write_string_with_format(cell.row, cell.col, value.display(), format)?;
            }
        }
    }

    worksheet.set_freeze_panes(sheet.header_row + 1, 0)?;
    worksheet.autofit();

    Ok(())
}
