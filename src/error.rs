use std::path::PathBuf;

use thiserror::Error;

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Shown next to every per-request failure.
pub const REMEDIATION_HINT: &str =
    "Check the CSV file's encoding (UTF-8, Shift_JIS, CP932, ISO-2022-JP or EUC-JP) and format";

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Template not found: {} (place it next to the program)", .0.display())]
    TemplateMissing(PathBuf),

    #[error("Could not decode the CSV file with any supported encoding (tried {})", .tried.join(", "))]
    DecodingExhausted { tried: Vec<&'static str> },

    #[error("CSV file is malformed: {0}")]
    MalformedInput(String),

    #[error("Failed to write workbook: {0}")]
    WriteFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Generic remediation text for the end user.
    pub fn remediation_hint(&self) -> &'static str {
        match self {
            ConvertError::TemplateMissing(_) => "Place template.xlsx next to the program and restart",
            _ => REMEDIATION_HINT,
        }
    }

    /// True for failures caused by the uploaded file rather than the installation.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            ConvertError::DecodingExhausted { .. } | ConvertError::MalformedInput(_)
        )
    }
}

impl From<zip::result::ZipError> for ConvertError {
    fn from(e: zip::result::ZipError) -> Self {
        ConvertError::WriteFailure(format!("template package: {}", e))
    }
}

impl From<quick_xml::Error> for ConvertError {
    fn from(e: quick_xml::Error) -> Self {
        ConvertError::WriteFailure(format!("template XML: {}", e))
    }
}

impl From<quick_xml::events::attributes::AttrError> for ConvertError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        ConvertError::WriteFailure(format!("template XML attribute: {}", e))
    }
}

impl From<rust_xlsxwriter::XlsxError> for ConvertError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ConvertError::WriteFailure(e.to_string())
    }
}
