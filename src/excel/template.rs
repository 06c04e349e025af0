//! Template workbook held as an OOXML package (a zip of XML parts).
//!
//! Parts are never re-encoded unless they have to change: [`TemplateWorkbook::to_bytes`]
//! raw-copies every untouched zip entry, so sheets other than the one being
//! written come out byte-for-byte identical to the template.

use super::xml::{append_child, attr_value, remove_elements};
use crate::error::{ConvertError, ConvertResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = "[Content_Types].xml";
const WORKBOOK: &str = "xl/workbook.xml";
const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";

const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const CT_WORKSHEET: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// A worksheet listed in `xl/workbook.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
    /// Zip entry name of the worksheet part, e.g. `xl/worksheets/sheet1.xml`
    pub part: String,
}

#[derive(Debug, Clone)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
}

/// In-memory template. Edits are kept as part overrides on top of the
/// original package bytes; the file on disk is never touched.
#[derive(Debug)]
pub struct TemplateWorkbook {
    source: Vec<u8>,
    entries: BTreeSet<String>,
    sheets: Vec<SheetEntry>,
    /// Attribute name used for the relationship id on `<sheet>` (normally `r:id`)
    rel_attr: String,
    overrides: BTreeMap<String, Vec<u8>>,
    removed: BTreeSet<String>,
}

impl TemplateWorkbook {
    /// Load the template from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> ConvertResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConvertError::TemplateMissing(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "loaded template");
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(source: Vec<u8>) -> ConvertResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(source.as_slice()))?;
        let entries: BTreeSet<String> = archive.file_names().map(str::to_string).collect();

        let workbook_xml = read_entry(&mut archive, WORKBOOK)?
            .ok_or_else(|| missing_part(WORKBOOK))?;
        let rels_xml = read_entry(&mut archive, WORKBOOK_RELS)?
            .ok_or_else(|| missing_part(WORKBOOK_RELS))?;
        drop(archive);

        let rels = parse_relationships(&rels_xml)?;
        let (listed, rel_attr) = parse_sheet_list(&workbook_xml)?;

        let mut sheets = Vec::with_capacity(listed.len());
        for (name, sheet_id, rel_id) in listed {
            let rel = rels.iter().find(|r| r.id == rel_id).ok_or_else(|| {
                ConvertError::WriteFailure(format!(
                    "sheet '{}' refers to unknown relationship {}",
                    name, rel_id
                ))
            })?;
            sheets.push(SheetEntry {
                name,
                sheet_id,
                part: resolve_target(&rel.target),
                rel_id,
            });
        }

        Ok(Self {
            source,
            entries,
            sheets,
            rel_attr: rel_attr.unwrap_or_else(|| "r:id".to_string()),
            overrides: BTreeMap::new(),
            removed: BTreeSet::new(),
        })
    }

    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetEntry> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Current bytes of a part, including pending edits.
    pub fn part(&self, name: &str) -> ConvertResult<Option<Vec<u8>>> {
        if self.removed.contains(name) {
            return Ok(None);
        }
        if let Some(bytes) = self.overrides.get(name) {
            return Ok(Some(bytes.clone()));
        }
        let mut archive = ZipArchive::new(Cursor::new(self.source.as_slice()))?;
        read_entry(&mut archive, name)
    }

    fn required_part(&self, name: &str) -> ConvertResult<Vec<u8>> {
        self.part(name)?.ok_or_else(|| missing_part(name))
    }

    pub(crate) fn set_part(&mut self, name: &str, bytes: Vec<u8>) {
        self.removed.remove(name);
        self.overrides.insert(name.to_string(), bytes);
    }

    fn has_part(&self, name: &str) -> bool {
        !self.removed.contains(name)
            && (self.entries.contains(name) || self.overrides.contains_key(name))
    }

    /// Append a new worksheet named `name` whose part content is `xml`.
    pub(crate) fn add_sheet(&mut self, name: &str, xml: Vec<u8>) -> ConvertResult<SheetEntry> {
        let part = (1u32..)
            .map(|n| format!("xl/worksheets/sheet{}.xml", n))
            .find(|p| !self.has_part(p))
            .unwrap_or_default();

        let rels_xml = self.required_part(WORKBOOK_RELS)?;
        let rels = parse_relationships(&rels_xml)?;
        let rel_id = (1u32..)
            .map(|n| format!("rId{}", n))
            .find(|id| rels.iter().all(|r| &r.id != id))
            .unwrap_or_default();
        let sheet_id = self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;

        let target = part.trim_start_matches("xl/").to_string();
        let rels_xml = append_child(
            &rels_xml,
            b"Relationships",
            "Relationship",
            &[
                ("Id", rel_id.as_str()),
                ("Type", REL_WORKSHEET),
                ("Target", target.as_str()),
            ],
        )?
        .ok_or_else(|| missing_element(WORKBOOK_RELS, "Relationships"))?;

        let sheet_id_text = sheet_id.to_string();
        let workbook_xml = append_child(
            &self.required_part(WORKBOOK)?,
            b"sheets",
            "sheet",
            &[
                ("name", name),
                ("sheetId", sheet_id_text.as_str()),
                (self.rel_attr.as_str(), rel_id.as_str()),
            ],
        )?
        .ok_or_else(|| missing_element(WORKBOOK, "sheets"))?;

        let part_name = format!("/{}", part);
        let types_xml = append_child(
            &self.required_part(CONTENT_TYPES)?,
            b"Types",
            "Override",
            &[("PartName", part_name.as_str()), ("ContentType", CT_WORKSHEET)],
        )?
        .ok_or_else(|| missing_element(CONTENT_TYPES, "Types"))?;

        self.set_part(WORKBOOK_RELS, rels_xml);
        self.set_part(WORKBOOK, workbook_xml);
        self.set_part(CONTENT_TYPES, types_xml);
        self.set_part(&part, xml);

        let entry = SheetEntry {
            name: name.to_string(),
            sheet_id,
            rel_id,
            part,
        };
        debug!(sheet = %entry.name, part = %entry.part, "added worksheet to template");
        self.sheets.push(entry.clone());
        Ok(entry)
    }

    /// Remove the calculation chain so Excel rebuilds it on open.
    ///
    /// Needed once formulas have been cleared from a sheet: a calc chain
    /// pointing at cells without formulas makes Excel report the file as
    /// corrupt. Returns false if the package had none.
    pub(crate) fn drop_calc_chain(&mut self) -> ConvertResult<bool> {
        let rels_xml = self.required_part(WORKBOOK_RELS)?;
        let rels = parse_relationships(&rels_xml)?;
        let Some(calc) = rels.iter().find(|r| r.rel_type.ends_with("/calcChain")) else {
            return Ok(false);
        };
        let calc_id = calc.id.clone();
        let calc_part = resolve_target(&calc.target);

        let rels_xml = remove_elements(&rels_xml, |e, reader| {
            Ok(e.local_name().as_ref() == b"Relationship"
                && attr_value(e, reader, b"Id")?.as_deref() == Some(calc_id.as_str()))
        })?;
        let part_name = format!("/{}", calc_part);
        let types_xml = remove_elements(&self.required_part(CONTENT_TYPES)?, |e, reader| {
            Ok(e.local_name().as_ref() == b"Override"
                && attr_value(e, reader, b"PartName")?.as_deref() == Some(part_name.as_str()))
        })?;

        self.set_part(WORKBOOK_RELS, rels_xml);
        self.set_part(CONTENT_TYPES, types_xml);
        self.overrides.remove(&calc_part);
        self.removed.insert(calc_part);
        Ok(true)
    }

    /// Serialize the package with all pending edits applied.
    pub fn to_bytes(&self) -> ConvertResult<Vec<u8>> {
        let mut archive = ZipArchive::new(Cursor::new(self.source.as_slice()))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.source.len())));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let name = entry.name().to_string();

            if self.removed.contains(&name) {
                continue;
            }
            match self.overrides.get(&name) {
                Some(bytes) => {
                    drop(entry);
                    writer.start_file(name.as_str(), options)?;
                    writer.write_all(bytes)?;
                }
                None => writer.raw_copy_file(entry)?,
            }
        }

        for (name, bytes) in &self.overrides {
            if !self.entries.contains(name) {
                writer.start_file(name.as_str(), options)?;
                writer.write_all(bytes)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> ConvertResult<Option<Vec<u8>>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn missing_part(name: &str) -> ConvertError {
    ConvertError::WriteFailure(format!("template is missing {}", name))
}

fn missing_element(part: &str, element: &str) -> ConvertError {
    ConvertError::WriteFailure(format!("{} has no <{}> element", part, element))
}

/// Workbook relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => {
            let mut parts: Vec<&str> = vec!["xl"];
            for segment in target.split('/') {
                match segment {
                    "" | "." => {}
                    ".." => {
                        parts.pop();
                    }
                    s => parts.push(s),
                }
            }
            parts.join("/")
        }
    }
}

fn parse_relationships(xml: &[u8]) -> ConvertResult<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let id = attr_value(e, &reader, b"Id")?;
                let rel_type = attr_value(e, &reader, b"Type")?;
                let target = attr_value(e, &reader, b"Target")?;
                if let (Some(id), Some(rel_type), Some(target)) = (id, rel_type, target) {
                    rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                    });
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

type ListedSheet = (String, u32, String);

/// `<sheet name sheetId r:id>` entries in workbook order, plus the qualified
/// name of the relationship id attribute.
fn parse_sheet_list(xml: &[u8]) -> ConvertResult<(Vec<ListedSheet>, Option<String>)> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut rel_attr = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut sheet_id = None;
                let mut rel_id = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    let key = attr.key.as_ref();
                    let value = attr.decode_and_unescape_value(&reader)?.into_owned();
                    match key {
                        b"name" => name = Some(value),
                        b"sheetId" => sheet_id = value.parse::<u32>().ok(),
                        k if k.ends_with(b":id") => {
                            rel_attr = Some(String::from_utf8_lossy(k).into_owned());
                            rel_id = Some(value);
                        }
                        _ => {}
                    }
                }
                match (name, rel_id) {
                    (Some(name), Some(rel_id)) => {
                        sheets.push((name, sheet_id.unwrap_or(0), rel_id));
                    }
                    _ => {
                        return Err(ConvertError::WriteFailure(
                            "workbook lists a sheet without name or relationship id".to_string(),
                        ))
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok((sheets, rel_attr))
}
