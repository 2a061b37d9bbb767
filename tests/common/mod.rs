//! Common test utilities for rust-sheetschema tests

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use rust_sheetschema::db::Connection;
use rust_sheetschema::error::DbError;
use rust_sheetschema::normalize::{Field, Layout};
use rust_sheetschema::source::RawSheet;
use rust_sheetschema::CellValue;

/// Test context with a temporary directory for isolated test execution
pub struct TestContext {
    /// Kept to prevent temp directory cleanup until TestContext is dropped
    _temp_dir: TempDir,
    pub dir: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            dir,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

// ============================================================================
// Definition sheets
// ============================================================================

/// One definition row; empty strings become empty cells
#[derive(Debug, Clone, Default)]
pub struct Def {
    pub key: &'static str,
    pub name: &'static str,
    pub nul: &'static str,
    pub ty: &'static str,
    pub len: &'static str,
    pub dec: &'static str,
    pub default: &'static str,
    pub desc: &'static str,
    pub note: &'static str,
    pub table_code: &'static str,
    pub table_name: &'static str,
    pub table_desc: &'static str,
    pub table_note: &'static str,
}

impl Def {
    pub fn column(name: &'static str, ty: &'static str) -> Self {
        Self {
            name,
            ty,
            ..Self::default()
        }
    }

    pub fn pk(mut self) -> Self {
        self.key = "PK";
        self
    }

    pub fn fk(mut self) -> Self {
        self.key = "FK";
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nul = "N";
        self
    }

    pub fn len(mut self, len: &'static str) -> Self {
        self.len = len;
        self
    }

    pub fn dec(mut self, dec: &'static str) -> Self {
        self.dec = dec;
        self
    }

    pub fn default_value(mut self, value: &'static str) -> Self {
        self.default = value;
        self
    }

    pub fn desc(mut self, desc: &'static str) -> Self {
        self.desc = desc;
        self
    }

    pub fn table(mut self, code: &'static str, name: &'static str) -> Self {
        self.table_code = code;
        self.table_name = name;
        self
    }

    pub fn table_desc(mut self, desc: &'static str) -> Self {
        self.table_desc = desc;
        self
    }

    fn value(&self, field: Field) -> &'static str {
        match field {
            Field::Key => self.key,
            Field::Name => self.name,
            Field::Nul => self.nul,
            Field::Type => self.ty,
            Field::Len => self.len,
            Field::Dec => self.dec,
            Field::Def => self.default,
            Field::Desc => self.desc,
            Field::Note => self.note,
            Field::TableCode => self.table_code,
            Field::TableName => self.table_name,
            Field::TableDesc => self.table_desc,
            Field::TableNote => self.table_note,
            Field::Back | Field::No | Field::Und => "",
        }
    }
}

/// Numbers become numeric cells, like a spreadsheet would store them
pub fn cell(text: &str) -> CellValue {
    if text.is_empty() {
        CellValue::Empty
    } else if let Ok(n) = text.parse::<f64>() {
        CellValue::Number(n)
    } else {
        CellValue::text(text)
    }
}

pub fn text_row(values: &[&str]) -> Vec<CellValue> {
    values.iter().map(|v| cell(v)).collect()
}

/// Header plus definition rows for `layout`, as the grid a worksheet holds
pub fn definition_grid(layout: Layout, defs: &[Def]) -> Vec<Vec<CellValue>> {
    let mut grid = vec![layout
        .raw_headers()
        .iter()
        .map(|h| CellValue::text(*h))
        .collect::<Vec<_>>()];
    for def in defs {
        grid.push(
            layout
                .raw_columns()
                .iter()
                .map(|field| cell(def.value(*field)))
                .collect(),
        );
    }
    grid
}

pub fn definition_sheet(name: &str, layout: Layout, defs: &[Def]) -> RawSheet {
    RawSheet::from_grid(name, definition_grid(layout, defs))
}

/// A small customer table: PK, two strings, a decimal and a bit flag
pub fn customer_defs() -> Vec<Def> {
    vec![
        Def::column("CustomerId", "int")
            .pk()
            .not_null()
            .desc("Surrogate key")
            .table("CUS", "Customer")
            .table_desc("Customers"),
        Def::column("Name", "nvarchar").len("100").not_null(),
        Def::column("Email", "varchar").len("255"),
        Def::column("Balance", "decimal").len("12").dec("2").default_value("0"),
        Def::column("Active", "bit").default_value("Y"),
    ]
}

/// A data sheet: header row followed by value rows
pub fn data_sheet(name: &str, headers: &[&str], rows: &[Vec<CellValue>]) -> RawSheet {
    let mut grid = vec![headers.iter().map(|h| CellValue::text(*h)).collect()];
    grid.extend(rows.iter().cloned());
    RawSheet::from_grid(name, grid)
}

/// `count` numbered rows for a single `Id` column
pub fn numbered_rows(count: usize) -> Vec<Vec<CellValue>> {
    (1..=count)
        .map(|i| vec![CellValue::Number(i as f64)])
        .collect()
}

// ============================================================================
// xlsx fixtures
// ============================================================================

fn column_letters(mut col: usize) -> String {
    let mut letters = String::new();
    col += 1;
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    letters
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn worksheet_xml(grid: &[Vec<CellValue>], shared: &mut Option<Vec<String>>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in grid.iter().enumerate() {
        let row_number = r + 1;
        xml.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (c, value) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letters(c), row_number);
            match value {
                CellValue::Empty => {}
                CellValue::Number(n) => {
                    xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n))
                }
                CellValue::Bool(b) => xml.push_str(&format!(
                    r#"<c r="{}" t="b"><v>{}</v></c>"#,
                    reference,
                    u8::from(*b)
                )),
                CellValue::Text(s) => match shared {
                    Some(strings) => {
                        let index = match strings.iter().position(|existing| existing == s) {
                            Some(index) => index,
                            None => {
                                strings.push(s.clone());
                                strings.len() - 1
                            }
                        };
                        xml.push_str(&format!(
                            r#"<c r="{}" t="s"><v>{}</v></c>"#,
                            reference, index
                        ));
                    }
                    None => xml.push_str(&format!(
                        r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        reference,
                        escape_xml(s)
                    )),
                },
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Write a minimal xlsx workbook. With `shared_strings` text cells go
/// through xl/sharedStrings.xml, otherwise they are inline strings.
pub fn write_xlsx(path: &Path, sheets: &[(&str, Vec<Vec<CellValue>>)], shared_strings: bool) {
    let file = File::create(path).expect("Failed to create xlsx fixture");
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    let mut shared = shared_strings.then(Vec::new);
    let mut parts = Vec::new();
    for (index, (name, grid)) in sheets.iter().enumerate() {
        let number = index + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            number
        ));
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(name),
            number,
            number
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            number, number
        ));
        parts.push((
            format!("xl/worksheets/sheet{}.xml", number),
            worksheet_xml(grid, &mut shared),
        ));
    }
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");

    let mut write_part = |name: &str, body: &str| {
        zip.start_file(name, options).expect("start zip entry");
        zip.write_all(body.as_bytes()).expect("write zip entry");
    };
    write_part("[Content_Types].xml", &content_types);
    write_part("xl/workbook.xml", &workbook);
    write_part("xl/_rels/workbook.xml.rels", &rels);
    for (name, body) in &parts {
        write_part(name, body);
    }
    if let Some(strings) = shared {
        let mut sst = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{}" uniqueCount="{}">"#,
            strings.len(),
            strings.len()
        );
        for s in &strings {
            sst.push_str(&format!("<si><t>{}</t></si>", escape_xml(s)));
        }
        sst.push_str("</sst>");
        write_part("xl/sharedStrings.xml", &sst);
    }

    zip.finish().expect("finish xlsx fixture");
}

// ============================================================================
// Mock database connection
// ============================================================================

/// Everything a [`MockConnection`] saw
#[derive(Debug, Default)]
pub struct MockState {
    /// Statements run through `execute`
    pub statements: Vec<String>,
    /// Rows of committed transactions
    pub committed: Vec<Vec<CellValue>>,
    pending: Vec<Vec<CellValue>>,
    pub insert_calls: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub closes: usize,
}

impl MockState {
    pub fn committed_ids(&self) -> Vec<i64> {
        self.committed
            .iter()
            .filter_map(|row| row.first().and_then(|c| c.as_integer()))
            .collect()
    }
}

/// In-memory [`Connection`] that records calls and fails on request
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    pub state: Arc<Mutex<MockState>>,
    /// 1-based `execute_with` call that fails
    fail_insert_call: Option<usize>,
    /// `execute` fails for statements containing this text
    fail_statement: Option<String>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_insert_call(mut self, call: usize) -> Self {
        self.fail_insert_call = Some(call);
        self
    }

    pub fn failing_statement(mut self, pattern: &str) -> Self {
        self.fail_statement = Some(pattern.to_string());
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }
}

impl Connection for MockConnection {
    fn execute(&mut self, sql: &str) -> Result<u64, DbError> {
        let mut state = self.state();
        state.statements.push(sql.to_string());
        if let Some(pattern) = &self.fail_statement {
            if sql.contains(pattern.as_str()) {
                return Err(DbError::Driver(format!("statement rejected: {}", pattern)));
            }
        }
        Ok(0)
    }

    fn execute_with(&mut self, _sql: &str, params: &[CellValue]) -> Result<u64, DbError> {
        let mut state = self.state();
        state.insert_calls += 1;
        if self.fail_insert_call == Some(state.insert_calls) {
            return Err(DbError::Driver("constraint violation".to_string()));
        }
        state.pending.push(params.to_vec());
        Ok(1)
    }

    fn begin_transaction(&mut self) -> Result<(), DbError> {
        let mut state = self.state();
        state.begins += 1;
        state.pending.clear();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        let mut state = self.state();
        state.commits += 1;
        let pending = std::mem::take(&mut state.pending);
        state.committed.extend(pending);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        let mut state = self.state();
        state.rollbacks += 1;
        state.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.state().closes += 1;
        Ok(())
    }
}
