//! Excel export: [`ParsedTable`] → in-memory `.xlsx` artifact.
//!
//! The workbook is built entirely in memory with `rust_xlsxwriter` and
//! handed back as bytes, so the caller decides whether it becomes a file on
//! disk, an HTTP download or an e-mail attachment.
//!
//! Every cell is written as a string. The model's numbers arrive as text
//! ("1,250.00", "Null()") and coercing them would silently change what the
//! purchase order said.

use crate::error::Po2XlError;
use crate::table::ParsedTable;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fixed file name of the exported workbook.
pub const EXPORT_FILE_NAME: &str = "data.xlsx";

/// Media type of the exported workbook.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Name of the single worksheet.
pub const SHEET_NAME: &str = "Purchase Order";

/// Column widths are sized to content but never wider than this.
const MAX_COLUMN_WIDTH: f64 = 60.0;

/// A downloadable spreadsheet.
#[derive(Debug, Clone, Serialize)]
pub struct ExportArtifact {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the artifact into `dir` under its fixed file name.
    ///
    /// Uses atomic write (temp file + rename) so a crash never leaves a
    /// half-written workbook behind.
    pub async fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, Po2XlError> {
        let path = dir.join(self.file_name);
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Po2XlError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        let tmp_path = path.with_extension("xlsx.tmp");
        tokio::fs::write(&tmp_path, &self.bytes)
            .await
            .map_err(|e| Po2XlError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| Po2XlError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        Ok(path)
    }
}

/// Serialise `table` into an `.xlsx` workbook held in memory.
///
/// Row 1 holds the column names in bold; data starts on row 2. No index
/// column is written.
pub fn export_xlsx(table: &ParsedTable) -> Result<ExportArtifact, Po2XlError> {
    let bytes = build_workbook(table).map_err(|e| Po2XlError::ExportFailed(e.to_string()))?;
    debug!(
        "Exported {} rows × {} columns → {} bytes",
        table.row_count(),
        table.column_count(),
        bytes.len()
    );
    Ok(ExportArtifact {
        file_name: EXPORT_FILE_NAME,
        mime_type: XLSX_MIME,
        bytes,
    })
}

fn build_workbook(table: &ParsedTable) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col_idx, column) in table.columns().iter().enumerate() {
        let col = col_idx as u16;
        worksheet.write_string_with_format(0, col, &column.name, &header_format)?;
        for (row_idx, value) in column.cells.iter().enumerate() {
            worksheet.write_string(row_idx as u32 + 1, col, value)?;
        }
        worksheet.set_column_width(col, column_width(&column.name, &column.cells))?;
    }

    workbook.save_to_buffer()
}

fn column_width(name: &str, cells: &[String]) -> f64 {
    let widest = cells
        .iter()
        .map(|c| c.chars().count())
        .chain(std::iter::once(name.chars().count()))
        .max()
        .unwrap_or(0);
    ((widest + 2) as f64).min(MAX_COLUMN_WIDTH)
}
