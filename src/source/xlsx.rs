//! `.xlsx` / `.xlsm` workbook reader
//!
//! The workbook structure (sheet names and the parts that hold them) is small
//! and read as a DOM with roxmltree. Shared strings and worksheets can be large
//! and are streamed with quick-xml.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

use super::{CellValue, RawSheet, SpreadsheetSource};
use crate::error::SheetSchemaError;

const RELATIONSHIP_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Low-level failures while decoding an xlsx container
#[derive(Error, Debug)]
pub enum XlsxError {
    #[error("{0}")]
    Zip(#[from] ZipError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlAttribute(#[from] AttrError),

    #[error("{0}")]
    Dom(#[from] roxmltree::Error),

    #[error("missing workbook part '{0}'")]
    MissingPart(String),

    #[error("invalid shared string reference '{0}'")]
    SharedString(String),
}

/// Reads Office Open XML spreadsheets
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxSource;

impl XlsxSource {
    pub fn new() -> Self {
        Self
    }
}

impl SpreadsheetSource for XlsxSource {
    fn read_sheets(&self, path: &Path) -> Result<Vec<RawSheet>, SheetSchemaError> {
        let file = File::open(path).map_err(|source| SheetSchemaError::SourceRead {
            path: path.to_path_buf(),
            source,
        })?;

        let sheets =
            read_workbook(BufReader::new(file)).map_err(|e| SheetSchemaError::SourceFormat {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if sheets.is_empty() {
            return Err(SheetSchemaError::NoSheets {
                path: path.to_path_buf(),
            });
        }

        info!(path = %path.display(), sheets = sheets.len(), "Read workbook");
        Ok(sheets)
    }
}

/// Read every worksheet of an xlsx container, in workbook order
pub fn read_workbook<R: Read + Seek>(reader: R) -> Result<Vec<RawSheet>, XlsxError> {
    let mut archive = ZipArchive::new(reader)?;
    let parts = load_sheet_parts(&mut archive)?;

    let shared_strings =
        with_part(&mut archive, SHARED_STRINGS_PART, parse_shared_strings)?.unwrap_or_default();
    debug!(count = shared_strings.len(), "Loaded shared strings");

    let mut sheets = Vec::with_capacity(parts.len());
    for (name, part) in parts {
        let cells = with_part(&mut archive, &part, |input| {
            parse_worksheet(input, &shared_strings)
        })?
        .ok_or_else(|| XlsxError::MissingPart(part.clone()))?;
        let sheet = build_sheet(&name, cells);
        debug!(sheet = %name, rows = sheet.rows.len(), columns = sheet.width(), "Read worksheet");
        sheets.push(sheet);
    }

    Ok(sheets)
}

/// Run `f` over a buffered reader for the named part, matching the part name
/// case-insensitively. Returns `None` when the part does not exist.
fn with_part<R, T, F>(archive: &mut ZipArchive<R>, name: &str, f: F) -> Result<Option<T>, XlsxError>
where
    R: Read + Seek,
    F: FnOnce(&mut dyn BufRead) -> Result<T, XlsxError>,
{
    let actual = archive
        .file_names()
        .find(|candidate| candidate.eq_ignore_ascii_case(name))
        .map(|candidate| candidate.to_string());
    let Some(actual) = actual else {
        return Ok(None);
    };

    let file = match archive.by_name(&actual) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);
    f(&mut reader).map(Some)
}

fn read_part_to_string<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, XlsxError> {
    with_part(archive, name, |input| {
        let mut text = String::new();
        input.read_to_string(&mut text)?;
        Ok(text)
    })?
    .ok_or_else(|| XlsxError::MissingPart(name.to_string()))
}

/// Resolve `(sheet name, part path)` pairs from workbook.xml and its relationships
fn load_sheet_parts<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<(String, String)>, XlsxError> {
    let rels_xml = read_part_to_string(archive, WORKBOOK_RELS_PART)?;
    let rels = roxmltree::Document::parse(&rels_xml)?;
    let targets: HashMap<&str, String> = rels
        .descendants()
        .filter(|node| node.has_tag_name("Relationship"))
        .filter_map(|node| Some((node.attribute("Id")?, resolve_target(node.attribute("Target")?))))
        .collect();

    let workbook_xml = read_part_to_string(archive, WORKBOOK_PART)?;
    let workbook = roxmltree::Document::parse(&workbook_xml)?;
    let parts = workbook
        .descendants()
        .filter(|node| node.has_tag_name("sheet"))
        .filter_map(|node| {
            let name = node.attribute("name")?;
            let id = node.attribute((RELATIONSHIP_NS, "id"))?;
            targets.get(id).map(|target| (name.to_string(), target.clone()))
        })
        .collect();

    Ok(parts)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn parse_shared_strings(input: &mut dyn BufRead) -> Result<Vec<String>, XlsxError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    // Phonetic runs (rPh) carry furigana that is not part of the cell text
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_item && !in_phonetic => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_item = false;
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(e) if in_text => current.push_str(&e.unescape()?),
            Event::CData(e) if in_text => current.push_str(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

type SparseRows = BTreeMap<usize, Vec<(usize, CellValue)>>;

fn parse_worksheet(input: &mut dyn BufRead, shared: &[String]) -> Result<SparseRows, XlsxError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut rows = SparseRows::new();

    let mut row_number = 0usize;
    let mut next_col = 0usize;
    let mut cell_pos = (0usize, 0usize);
    let mut cell_kind: Option<String> = None;
    let mut value = String::new();
    let mut in_cell = false;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row_number = attribute(&e, "r")?
                        .and_then(|r| r.parse().ok())
                        .unwrap_or(row_number + 1);
                    next_col = 0;
                }
                b"c" => {
                    cell_pos = attribute(&e, "r")?
                        .and_then(|r| parse_cell_reference(&r))
                        .unwrap_or((row_number, next_col));
                    next_col = cell_pos.1 + 1;
                    cell_kind = attribute(&e, "t")?;
                    value.clear();
                    in_cell = true;
                }
                b"v" | b"t" if in_cell => in_value = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                next_col = attribute(&e, "r")?
                    .and_then(|r| parse_cell_reference(&r))
                    .map(|(_, col)| col + 1)
                    .unwrap_or(next_col + 1);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    in_cell = false;
                    let cell = convert_cell(cell_kind.as_deref(), &value, shared)?;
                    if cell != CellValue::Empty {
                        rows.entry(cell_pos.0).or_default().push((cell_pos.1, cell));
                    }
                }
                _ => {}
            },
            Event::Text(e) if in_value => value.push_str(&e.unescape()?),
            Event::CData(e) if in_value => value.push_str(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, XlsxError> {
    match element.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn convert_cell(kind: Option<&str>, raw: &str, shared: &[String]) -> Result<CellValue, XlsxError> {
    if raw.is_empty() {
        return Ok(CellValue::Empty);
    }
    let value = match kind {
        Some("s") => {
            let index: usize = raw
                .trim()
                .parse()
                .map_err(|_| XlsxError::SharedString(raw.to_string()))?;
            let text = shared
                .get(index)
                .ok_or_else(|| XlsxError::SharedString(raw.to_string()))?;
            CellValue::Text(text.clone())
        }
        Some("str") | Some("inlineStr") | Some("d") => CellValue::Text(raw.to_string()),
        Some("b") => CellValue::Bool(raw.trim() == "1"),
        // Error cells (#N/A, #REF!, ...) carry no usable value
        Some("e") => CellValue::Empty,
        _ => match raw.trim().parse::<f64>() {
            Ok(number) => CellValue::Number(number),
            Err(_) => CellValue::Text(raw.to_string()),
        },
    };
    Ok(value)
}

/// Parse an A1-style reference into a (1-based row, 0-based column) pair
pub fn parse_cell_reference(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters.chars().try_fold(0usize, |acc, c| {
        acc.checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as usize - 'A' as usize + 1)
    })?;
    let row = digits.parse().ok()?;
    Some((row, col - 1))
}

/// Densify sparse rows into a rectangular sheet. The first populated row is
/// the header; the width covers every populated column in the sheet.
fn build_sheet(name: &str, cells: SparseRows) -> RawSheet {
    let width = cells
        .values()
        .flat_map(|row| row.iter().map(|(col, _)| col + 1))
        .max()
        .unwrap_or(0);

    let mut rows = cells.into_iter();
    let Some((_, header_cells)) = rows.next() else {
        return RawSheet::new(name, Vec::new());
    };

    let headers = densify(header_cells, width)
        .iter()
        .map(|cell| cell.as_text().unwrap_or_default())
        .collect();
    let mut sheet = RawSheet::new(name, headers);
    for (number, row) in rows {
        sheet.push_row(number, densify(row, width));
    }
    sheet
}

fn densify(cells: Vec<(usize, CellValue)>, width: usize) -> Vec<CellValue> {
    let mut dense = vec![CellValue::Empty; width];
    for (col, value) in cells {
        if col < width {
            dense[col] = value;
        }
    }
    dense
}
