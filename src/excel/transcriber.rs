//! Template transcriber: materialize a table into the target sheet.

use super::sheet::{self, BLANK_WORKSHEET};
use super::template::TemplateWorkbook;
use crate::error::{ConvertError, ConvertResult};
use crate::types::{Table, TARGET_SHEET};
use tracing::{debug, info};

/// What happened to the target sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscribeReport {
    pub sheet_existed: bool,
    /// Cells that held values before clearing
    pub cleared_cells: usize,
    /// Used range of the sheet before clearing, as (rows, cols)
    pub previous_range: Option<(u32, u32)>,
    pub calc_chain_dropped: bool,
}

/// Writes tables into one fixed worksheet of a template
#[derive(Debug, Clone)]
pub struct Transcriber {
    sheet_name: String,
}

impl Default for Transcriber {
    fn default() -> Self {
        Self::new(TARGET_SHEET)
    }
}

impl Transcriber {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Clear (or create) the target sheet and write `table` from A1.
    ///
    /// Row `i`, column `j` of the table lands in sheet cell (i+1, j+1). Only the
    /// in-memory workbook is modified.
    pub fn write_table(
        &self,
        workbook: &mut TemplateWorkbook,
        table: &Table,
    ) -> ConvertResult<TranscribeReport> {
        sheet::check_bounds(table)?;

        let Some(entry) = workbook.sheet(&self.sheet_name).cloned() else {
            let (xml, _) = sheet::rewrite(BLANK_WORKSHEET.as_bytes(), table)?;
            let entry = workbook.add_sheet(&self.sheet_name, xml)?;
            info!(sheet = %self.sheet_name, part = %entry.part, "target sheet created");
            return Ok(TranscribeReport::default());
        };

        let xml = workbook.part(&entry.part)?.ok_or_else(|| {
            ConvertError::WriteFailure(format!(
                "sheet '{}' points at missing part {}",
                entry.name, entry.part
            ))
        })?;
        let (xml, cleared) = sheet::rewrite(&xml, table)?;
        workbook.set_part(&entry.part, xml);
        let calc_chain_dropped = workbook.drop_calc_chain()?;

        debug!(
            sheet = %self.sheet_name,
            cleared = cleared.cleared_cells,
            calc_chain_dropped,
            "target sheet cleared"
        );

        Ok(TranscribeReport {
            sheet_existed: true,
            cleared_cells: cleared.cleared_cells,
            previous_range: cleared.used_range,
            calc_chain_dropped,
        })
    }

    /// [`write_table`](Self::write_table), then serialize the whole workbook.
    pub fn transcribe(
        &self,
        workbook: &mut TemplateWorkbook,
        table: &Table,
    ) -> ConvertResult<(Vec<u8>, TranscribeReport)> {
        let report = self.write_table(workbook, table)?;
        let bytes = workbook.to_bytes()?;
        Ok((bytes, report))
    }
}
