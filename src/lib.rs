//! csvfill - CSV to Excel template converter
//!
//! Reads a CSV file whose text encoding is not known in advance (UTF-8 with or
//! without BOM, Shift_JIS, CP932, ISO-2022-JP, EUC-JP) and writes its rows into
//! the `貼り付け用` sheet of a template workbook, leaving every other sheet
//! untouched.
//!
//! # Example
//!
//! ```no_run
//! use csvfill::{Converter, RawInput};
//!
//! let converter = Converter::new("template.xlsx")?;
//! let bytes = std::fs::read("sales.csv")?;
//! let artifact = converter.convert(RawInput::new(bytes, "sales.csv"))?;
//!
//! std::fs::write(&artifact.filename, &artifact.bytes)?;
//! println!("{} rows x {} columns", artifact.summary.rows, artifact.summary.columns);
//! # Ok::<(), csvfill::ConvertError>(())
//! ```

pub mod api;
pub mod cli;
pub mod convert;
pub mod error;
pub mod excel;
pub mod reader;
pub mod types;

// Re-export commonly used types
pub use convert::{preview, Converter, Preview};
pub use error::{ConvertError, ConvertResult};
pub use types::{
    CellValue, ConversionSummary, ConvertedArtifact, RawInput, Table, DEFAULT_TEMPLATE_PATH,
    TARGET_SHEET, XLSX_MIME,
};
