use serde::Serialize;
use std::path::Path;

/// Worksheet in the template that receives the CSV data.
pub const TARGET_SHEET: &str = "貼り付け用";

/// Template workbook location, relative to the working directory.
pub const DEFAULT_TEMPLATE_PATH: &str = "template.xlsx";

/// MIME type of the converted download.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

//==============================================================================
// Table Model
//==============================================================================

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Text cell from a CSV field; blank fields become `Empty`.
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(field.to_string())
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// A record dropped because it had more fields than the first record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based record number within the CSV (blank lines not counted)
    pub record: u64,
    /// 1-based source line where the record starts
    pub line: u64,
    pub fields: usize,
    pub expected: usize,
}

/// Ordered rows of ordered cells. Rows may differ in length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<CellValue>>,
    /// Candidate encoding that decoded the source, if the table came from the reader
    pub encoding: Option<&'static str>,
    pub skipped: Vec<SkippedRow>,
}

impl Table {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            rows,
            encoding: None,
            skipped: Vec::new(),
        }
    }

    /// Build a table of text cells (blank strings become empty cells).
    pub fn from_strings<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(|s| CellValue::from_field(s.as_ref())).collect())
                .collect(),
        )
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Length of the longest row
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }
}

//==============================================================================
// Conversion Input / Output
//==============================================================================

/// Uploaded CSV bytes and the name they were uploaded under.
#[derive(Debug, Clone)]
pub struct RawInput {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl RawInput {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
        }
    }
}

/// Counts reported alongside a finished conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub rows: usize,
    pub columns: usize,
    pub encoding: Option<&'static str>,
    pub skipped_rows: usize,
    /// False when the target sheet had to be added to the template
    pub sheet_existed: bool,
}

/// Serialized workbook ready for download.
#[derive(Debug, Clone)]
pub struct ConvertedArtifact {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: &'static str,
    pub summary: ConversionSummary,
}

/// `{name without its final extension}_converted.xlsx`
///
/// Directory components are dropped so an uploaded name can't steer the
/// download location.
pub fn converted_filename(original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let stem = match base.rfind('.') {
        Some(idx) => &base[..idx],
        None => base,
    };
    format!("{}_converted.xlsx", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converted_filename_strips_final_extension() {
        assert_eq!(converted_filename("data.csv"), "data_converted.xlsx");
        assert_eq!(converted_filename("a.b.csv"), "a.b_converted.xlsx");
        assert_eq!(converted_filename("noext"), "noext_converted.xlsx");
        assert_eq!(converted_filename("売上.csv"), "売上_converted.xlsx");
    }

    #[test]
    fn test_converted_filename_drops_directories() {
        assert_eq!(converted_filename("../../etc/data.csv"), "data_converted.xlsx");
        assert_eq!(converted_filename(""), "_converted.xlsx");
    }

    #[test]
    fn test_table_dimensions_with_jagged_rows() {
        let table = Table::from_strings(vec![vec!["a", "b", "c"], vec!["d"], vec![]]);
        assert_eq!(table.height(), 3);
        assert_eq!(table.width(), 3);
        assert_eq!(table.get(1, 0), Some(&CellValue::Text("d".to_string())));
        assert_eq!(table.get(1, 1), None);
    }

    #[test]
    fn test_blank_field_is_empty_cell() {
        assert_eq!(CellValue::from_field(""), CellValue::Empty);
        assert_eq!(CellValue::from_field(" "), CellValue::Text(" ".to_string()));
    }

    #[test]
    fn test_cell_value_serializes_untagged() {
        let cells = vec![CellValue::Empty, CellValue::from("x"), CellValue::from(2.5)];
        assert_eq!(serde_json::to_string(&cells).unwrap(), r#"[null,"x",2.5]"#);
    }
}
