//! Starter template generation

use crate::error::ConvertResult;
use crate::types::TARGET_SHEET;
use rust_xlsxwriter::Workbook;
use std::path::Path;

/// Blank workbook containing only the target sheet.
pub fn starter_template() -> ConvertResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(TARGET_SHEET)?;
    Ok(workbook.save_to_buffer()?)
}

/// Write [`starter_template`] to `path`.
pub fn write_starter_template(path: &Path) -> ConvertResult<()> {
    std::fs::write(path, starter_template()?)?;
    Ok(())
}
