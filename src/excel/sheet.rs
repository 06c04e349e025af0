//! Worksheet part rewrite: clear every cell, then write a table from A1.
//!
//! Only `<dimension>` and `<sheetData>` are regenerated. Everything else in the
//! worksheet XML (views, column widths, merges, conditional formats, page
//! setup) is streamed through unchanged. Cleared cells keep their style index
//! and rows keep their formatting attributes, so the sheet looks the same
//! apart from the values.

use super::cell_ref::{cell_name, parse_column, MAX_COLS, MAX_ROWS};
use super::xml::{attr_value, name_prefix};
use crate::error::{ConvertError, ConvertResult};
use crate::types::{CellValue, Table};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;

type RawAttr = (Vec<u8>, Vec<u8>);

/// Skeleton for a worksheet that does not exist in the template yet.
pub const BLANK_WORKSHEET: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<dimension ref="A1"/>"#,
    r#"<sheetViews><sheetView workbookViewId="0"/></sheetViews>"#,
    r#"<sheetFormatPr defaultRowHeight="15"/>"#,
    r#"<sheetData/>"#,
    r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#,
    r#"</worksheet>"#,
);

/// Formatting that survives clearing
#[derive(Debug, Default)]
struct RowFormat {
    attrs: Vec<RawAttr>,
    /// column → raw `s` attribute value
    styles: BTreeMap<u32, Vec<u8>>,
}

/// What an existing worksheet looked like before clearing
#[derive(Debug, Default)]
pub struct ClearedSheet {
    rows: BTreeMap<u32, RowFormat>,
    /// Cells that held a value or formula
    pub cleared_cells: usize,
    /// Bounding rectangle of those cells as (rows, cols)
    pub used_range: Option<(u32, u32)>,
}

/// Check a table fits on a worksheet.
pub fn check_bounds(table: &Table) -> ConvertResult<()> {
    if table.height() > MAX_ROWS as usize || table.width() > MAX_COLS as usize {
        return Err(ConvertError::WriteFailure(format!(
            "{} rows x {} columns exceeds the worksheet limit of {} x {}",
            table.height(),
            table.width(),
            MAX_ROWS,
            MAX_COLS
        )));
    }
    Ok(())
}

/// Clear `xml`'s cells and write `table` starting at A1.
pub fn rewrite(xml: &[u8], table: &Table) -> ConvertResult<(Vec<u8>, ClearedSheet)> {
    check_bounds(table)?;
    let cleared = scan_formatting(xml)?;
    let body = SheetBody::build(&cleared, table);
    let out = write_sheet(xml, &body)?;
    Ok((out, cleared))
}

//==============================================================================
// Pass 1: collect formatting of existing rows and cells
//==============================================================================

fn scan_formatting(xml: &[u8]) -> ConvertResult<ClearedSheet> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();

    let mut sheet = ClearedSheet::default();
    let mut in_sheet_data = false;
    let mut row: u32 = 0;
    let mut col: u32 = 0;
    let mut max_row: u32 = 0;
    let mut max_col: u32 = 0;
    // Start tag of the cell being read and whether it has content
    let mut open_cell: Option<(u32, bool)> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match &event {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"sheetData" if !is_empty => in_sheet_data = true,
                    b"row" if in_sheet_data => {
                        row = match attr_value(e, &reader, b"r")? {
                            Some(r) => r.parse().map_err(|_| bad_ref("row", &r))?,
                            None => row + 1,
                        };
                        col = 0;
                        let attrs = raw_attrs(e, |key| key != b"r" && key != b"spans")?;
                        sheet.rows.entry(row).or_default().attrs = attrs;
                    }
                    b"c" if in_sheet_data => {
                        col = match attr_value(e, &reader, b"r")? {
                            Some(r) => parse_column(&r).ok_or_else(|| bad_ref("cell", &r))?,
                            None => col + 1,
                        };
                        if let Some(style) = raw_attrs(e, |key| key == b"s")?.pop() {
                            if style.1 != b"0" {
                                sheet.rows.entry(row).or_default().styles.insert(col, style.1);
                            }
                        }
                        if !is_empty {
                            open_cell = Some((col, false));
                        }
                    }
                    b"v" | b"f" | b"is" => {
                        if let Some((_, has_content)) = open_cell.as_mut() {
                            *has_content = true;
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"sheetData" => in_sheet_data = false,
                b"c" => {
                    if let Some((c, true)) = open_cell.take() {
                        sheet.cleared_cells += 1;
                        max_row = max_row.max(row);
                        max_col = max_col.max(c);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    if sheet.cleared_cells > 0 {
        sheet.used_range = Some((max_row, max_col));
    }
    Ok(sheet)
}

fn raw_attrs(e: &BytesStart<'_>, keep: impl Fn(&[u8]) -> bool) -> ConvertResult<Vec<RawAttr>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        if keep(attr.key.as_ref()) {
            attrs.push((attr.key.as_ref().to_vec(), attr.value.into_owned()));
        }
    }
    Ok(attrs)
}

fn bad_ref(kind: &str, value: &str) -> ConvertError {
    ConvertError::WriteFailure(format!("invalid {} reference '{}' in worksheet", kind, value))
}

//==============================================================================
// New sheet body
//==============================================================================

#[derive(Debug)]
struct OutCell<'a> {
    style: Option<&'a [u8]>,
    value: Option<&'a CellValue>,
}

#[derive(Debug, Default)]
struct OutRow<'a> {
    attrs: &'a [RawAttr],
    cells: BTreeMap<u32, OutCell<'a>>,
}

#[derive(Debug, Default)]
struct SheetBody<'a> {
    rows: BTreeMap<u32, OutRow<'a>>,
}

impl<'a> SheetBody<'a> {
    fn build(cleared: &'a ClearedSheet, table: &'a Table) -> Self {
        let mut rows: BTreeMap<u32, OutRow<'a>> = BTreeMap::new();

        for (&r, format) in &cleared.rows {
            let row = rows.entry(r).or_default();
            row.attrs = format.attrs.as_slice();
            for (&c, style) in &format.styles {
                row.cells.insert(
                    c,
                    OutCell {
                        style: Some(style.as_slice()),
                        value: None,
                    },
                );
            }
        }

        for (i, values) in table.rows.iter().enumerate() {
            for (j, value) in values.iter().enumerate() {
                if !is_writable(value) {
                    continue;
                }
                let cell = rows
                    .entry(i as u32 + 1)
                    .or_default()
                    .cells
                    .entry(j as u32 + 1)
                    .or_insert(OutCell {
                        style: None,
                        value: None,
                    });
                cell.value = Some(value);
            }
        }

        rows.retain(|_, row| !row.cells.is_empty() || !row.attrs.is_empty());
        Self { rows }
    }

    fn dimension(&self) -> String {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (&r, row) in &self.rows {
            for &c in row.cells.keys() {
                bounds = Some(match bounds {
                    None => (r, c, r, c),
                    Some((r0, c0, r1, c1)) => (r0.min(r), c0.min(c), r1.max(r), c1.max(c)),
                });
            }
        }
        match bounds {
            Some((r0, c0, r1, c1)) if (r0, c0) != (r1, c1) => {
                format!("{}:{}", cell_name(r0, c0), cell_name(r1, c1))
            }
            Some((r0, c0, _, _)) => cell_name(r0, c0),
            None => "A1".to_string(),
        }
    }
}

fn is_writable(value: &CellValue) -> bool {
    match value {
        CellValue::Empty => false,
        CellValue::Text(_) => true,
        CellValue::Number(n) => n.is_finite(),
    }
}

//==============================================================================
// Pass 2: stream the worksheet, replacing dimension and sheetData
//==============================================================================

fn write_sheet(xml: &[u8], body: &SheetBody<'_>) -> ConvertResult<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;
    let mut wrote_data = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e)
                if matches!(e.local_name().as_ref(), b"sheetData" | b"dimension") =>
            {
                let prefix = name_prefix(e.name().as_ref());
                if e.local_name().as_ref() == b"dimension" {
                    let name = format!("{}dimension", prefix);
                    let dim = body.dimension();
                    writer.write_event(Event::Empty(
                        BytesStart::new(name).with_attributes([("ref", dim.as_str())]),
                    ))?;
                } else {
                    write_sheet_data(&mut writer, &prefix, body)?;
                    wrote_data = true;
                }
                if matches!(event, Event::Start(_)) {
                    skip_depth = 1;
                }
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    if !wrote_data {
        return Err(ConvertError::WriteFailure(
            "worksheet has no sheetData element".to_string(),
        ));
    }
    Ok(writer.into_inner())
}

fn write_sheet_data(
    writer: &mut Writer<Vec<u8>>,
    prefix: &str,
    body: &SheetBody<'_>,
) -> ConvertResult<()> {
    let sheet_data = format!("{}sheetData", prefix);
    let row_tag = format!("{}row", prefix);

    if body.rows.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(sheet_data.as_str())))?;
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new(sheet_data.as_str())))?;
    for (&r, row) in &body.rows {
        let row_num = r.to_string();
        let mut start = BytesStart::new(row_tag.as_str());
        start.push_attribute(("r", row_num.as_str()));
        for (key, value) in row.attrs {
            start.push_attribute((key.as_slice(), value.as_slice()));
        }

        if row.cells.is_empty() {
            writer.write_event(Event::Empty(start))?;
            continue;
        }

        writer.write_event(Event::Start(start))?;
        for (&c, cell) in &row.cells {
            write_cell(writer, prefix, r, c, cell)?;
        }
        writer.write_event(Event::End(BytesEnd::new(row_tag.as_str())))?;
    }
    writer.write_event(Event::End(BytesEnd::new(sheet_data.as_str())))?;
    Ok(())
}

fn write_cell(
    writer: &mut Writer<Vec<u8>>,
    prefix: &str,
    row: u32,
    col: u32,
    cell: &OutCell<'_>,
) -> ConvertResult<()> {
    let tag = format!("{}c", prefix);
    let reference = cell_name(row, col);
    let mut start = BytesStart::new(tag.as_str());
    start.push_attribute(("r", reference.as_str()));
    if let Some(style) = cell.style {
        start.push_attribute((&b"s"[..], style));
    }

    match cell.value {
        None | Some(CellValue::Empty) => {
            writer.write_event(Event::Empty(start))?;
        }
        Some(CellValue::Number(n)) => {
            writer.write_event(Event::Start(start))?;
            let v = format!("{}v", prefix);
            let text = n.to_string();
            writer.write_event(Event::Start(BytesStart::new(v.as_str())))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new(v.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
        }
        Some(CellValue::Text(s)) => {
            start.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(start))?;
            let is = format!("{}is", prefix);
            let t = format!("{}t", prefix);
            let text = escape_excel_text(s);
            let mut t_start = BytesStart::new(t.as_str());
            if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
                t_start.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(BytesStart::new(is.as_str())))?;
            writer.write_event(Event::Start(t_start))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new(t.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new(is.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
        }
    }
    Ok(())
}

/// XML 1.0 cannot carry most C0 control characters; Excel stores them as `_xHHHH_`.
/// Text that already looks like such an escape gets its `_` written as `_x005F_`
/// so readers do not decode it.
fn escape_excel_text(s: &str) -> std::borrow::Cow<'_, str> {
    let is_illegal = |c: char| c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r');
    if !s.chars().any(is_illegal) && !(0..s.len()).any(|i| looks_escaped(&s.as_bytes()[i..])) {
        return std::borrow::Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for (i, c) in s.char_indices() {
        if is_illegal(c) {
            out.push_str(&format!("_x{:04X}_", c as u32));
        } else if c == '_' && looks_escaped(&s.as_bytes()[i..]) {
            out.push_str("_x005F_");
        } else {
            out.push(c);
        }
    }
    std::borrow::Cow::Owned(out)
}

/// `_xHHHH_` at the start of `bytes`
fn looks_escaped(bytes: &[u8]) -> bool {
    bytes.len() >= 7
        && bytes[0] == b'_'
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

/// Used-range size of a worksheet part, for callers that only want to inspect.
pub fn used_range(xml: &[u8]) -> ConvertResult<Option<(u32, u32)>> {
    Ok(scan_formatting(xml)?.used_range)
}
