//! CSV → template conversion pipeline
//!
//! raw bytes → [`reader::read_table`] → [`Transcriber`] → [`ConvertedArtifact`]
//!
//! Every call loads its own copy of the template from disk, so nothing is
//! shared between conversions.

use crate::error::{ConvertError, ConvertResult};
use crate::excel::{TemplateWorkbook, Transcriber};
use crate::reader;
use crate::types::{
    converted_filename, CellValue, ConversionSummary, ConvertedArtifact, RawInput, SkippedRow,
    XLSX_MIME,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Rows shown in a preview unless the caller asks otherwise
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// First rows of a decoded CSV plus its size
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub rows: usize,
    pub columns: usize,
    pub encoding: Option<&'static str>,
    pub skipped: Vec<SkippedRow>,
    pub head: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone)]
pub struct Converter {
    template_path: PathBuf,
    transcriber: Transcriber,
}

impl Converter {
    /// Fails with `TemplateMissing` if the template file is not there.
    pub fn new<P: AsRef<Path>>(template_path: P) -> ConvertResult<Self> {
        let converter = Self {
            template_path: template_path.as_ref().to_path_buf(),
            transcriber: Transcriber::default(),
        };
        converter.check_template()?;
        Ok(converter)
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    pub fn sheet_name(&self) -> &str {
        self.transcriber.sheet_name()
    }

    pub fn check_template(&self) -> ConvertResult<()> {
        if self.template_path.is_file() {
            Ok(())
        } else {
            Err(ConvertError::TemplateMissing(self.template_path.clone()))
        }
    }

    /// Decode `input`, write it into a fresh copy of the template and
    /// serialize the result. The template is checked before any decoding.
    #[instrument(skip_all, fields(file = %input.filename, bytes = input.bytes.len()))]
    pub fn convert(&self, input: RawInput) -> ConvertResult<ConvertedArtifact> {
        self.check_template()?;

        let table = reader::read_table(&input.bytes)?;
        drop(input.bytes);

        let mut workbook = TemplateWorkbook::open(&self.template_path)?;
        let (bytes, report) = self.transcriber.transcribe(&mut workbook, &table)?;

        let summary = ConversionSummary {
            rows: table.height(),
            columns: table.width(),
            encoding: table.encoding,
            skipped_rows: table.skipped.len(),
            sheet_existed: report.sheet_existed,
        };
        info!(
            rows = summary.rows,
            columns = summary.columns,
            encoding = summary.encoding.unwrap_or("-"),
            skipped = summary.skipped_rows,
            output_bytes = bytes.len(),
            "conversion complete"
        );

        Ok(ConvertedArtifact {
            bytes,
            filename: converted_filename(&input.filename),
            mime: XLSX_MIME,
            summary,
        })
    }
}

/// Decode `bytes` and keep the first `limit` rows. Needs no template.
pub fn preview(bytes: &[u8], limit: usize) -> ConvertResult<Preview> {
    let table = reader::read_table(bytes)?;
    Ok(Preview {
        rows: table.height(),
        columns: table.width(),
        encoding: table.encoding,
        head: table.rows.iter().take(limit).cloned().collect(),
        skipped: table.skipped,
    })
}
