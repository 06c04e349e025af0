//! Small streaming edits on package XML parts (rels, content types, workbook).

use crate::error::ConvertResult;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

pub(crate) fn attr_value<B>(
    e: &BytesStart<'_>,
    reader: &Reader<B>,
    key: &[u8],
) -> ConvertResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.decode_and_unescape_value(reader)?.into_owned()));
        }
    }
    Ok(None)
}

/// `x:` for `x:sheetData`, empty for unprefixed names.
pub(crate) fn name_prefix(qname: &[u8]) -> String {
    match qname.iter().position(|&b| b == b':') {
        Some(idx) => String::from_utf8_lossy(&qname[..=idx]).into_owned(),
        None => String::new(),
    }
}

/// Insert `child` as the last element of the first element named `parent`.
///
/// `child` receives the parent's namespace prefix. Returns `None` if no such
/// parent exists.
pub(crate) fn append_child(
    xml: &[u8],
    parent: &[u8],
    child: &str,
    attrs: &[(&str, &str)],
) -> ConvertResult<Option<Vec<u8>>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut inside: Option<(usize, String)> = None;
    let mut inserted = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) => {
                depth += 1;
                if !inserted && inside.is_none() && e.local_name().as_ref() == parent {
                    inside = Some((depth, name_prefix(e.name().as_ref())));
                }
                writer.write_event(event)?;
            }
            Event::Empty(ref e) if !inserted && inside.is_none() && e.local_name().as_ref() == parent => {
                // `<sheets/>` → `<sheets><sheet .../></sheets>`
                let prefix = name_prefix(e.name().as_ref());
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.clone()))?;
                write_child(&mut writer, &prefix, child, attrs)?;
                writer.write_event(Event::End(quick_xml::events::BytesEnd::new(name)))?;
                inserted = true;
            }
            Event::End(_) => {
                if let Some((d, prefix)) = inside.as_ref() {
                    if *d == depth {
                        write_child(&mut writer, prefix, child, attrs)?;
                        inside = None;
                        inserted = true;
                    }
                }
                depth = depth.saturating_sub(1);
                writer.write_event(event)?;
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(inserted.then(|| writer.into_inner()))
}

fn write_child(
    writer: &mut Writer<Vec<u8>>,
    prefix: &str,
    child: &str,
    attrs: &[(&str, &str)],
) -> ConvertResult<()> {
    let name = format!("{}{}", prefix, child);
    let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
    writer.write_event(Event::Empty(start))?;
    Ok(())
}

/// Drop every element (and its subtree) for which `should_drop` returns true.
pub(crate) fn remove_elements<F>(xml: &[u8], mut should_drop: F) -> ConvertResult<Vec<u8>>
where
    F: FnMut(&BytesStart<'_>, &Reader<&[u8]>) -> ConvertResult<bool>,
{
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;

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
            Event::Start(ref e) if should_drop(e, &reader)? => skip_depth = 1,
            Event::Empty(ref e) if should_drop(e, &reader)? => {}
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_child_before_closing_tag() {
        let xml = br#"<Types xmlns="x"><Default Extension="xml"/></Types>"#;
        let out = append_child(xml, b"Types", "Override", &[("PartName", "/a.xml")])
            .unwrap()
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<Types xmlns="x"><Default Extension="xml"/><Override PartName="/a.xml"/></Types>"#
        );
    }

    #[test]
    fn test_append_child_keeps_prefix_and_expands_empty_parent() {
        let xml = br#"<x:workbook xmlns:x="m"><x:sheets/></x:workbook>"#;
        let out = append_child(xml, b"sheets", "sheet", &[("name", "A")])
            .unwrap()
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<x:workbook xmlns:x="m"><x:sheets><x:sheet name="A"/></x:sheets></x:workbook>"#
        );
    }

    #[test]
    fn test_append_child_missing_parent() {
        let out = append_child(b"<a><b/></a>", b"sheets", "sheet", &[]).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_remove_elements_by_attribute() {
        let xml = br#"<R><E Id="1"/><E Id="2"><x/></E><E Id="3"/></R>"#;
        let out = remove_elements(xml, |e, reader| {
            Ok(attr_value(e, reader, b"Id")?.as_deref() == Some("2"))
        })
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<R><E Id="1"/><E Id="3"/></R>"#
        );
    }

    #[test]
    fn test_name_prefix() {
        assert_eq!(name_prefix(b"x:row"), "x:");
        assert_eq!(name_prefix(b"row"), "");
    }
}
