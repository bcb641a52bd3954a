//! Spreadsheet reader
//!
//! Loads every worksheet of an `.xlsx`/`.xls`/`.ods` file into memory as rows
//! of string cells. The underlying file handle is released as soon as
//! [`Workbook::open`] returns.

use crate::error::{ConfigError, Result};
use crate::model::ConfigRow;
use calamine::{Data, Reader, open_workbook_auto};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// A cell rendered to text. `None` means the cell was empty.
pub type Cell = Option<String>;

/// All worksheets of a workbook
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Read every worksheet of the file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let mut source = open_workbook_auto(path).map_err(|e| ConfigError::WorkbookOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut sheets = Vec::new();
        for name in source.sheet_names() {
            let range =
                source
                    .worksheet_range(&name)
                    .map_err(|e| ConfigError::WorksheetRead {
                        sheet: name.clone(),
                        message: e.to_string(),
                    })?;

            let rows = range
                .rows()
                .map(|row| row.iter().map(render_cell).collect())
                .collect();

            sheets.push(Sheet::new(name, rows));
        }

        debug!(path = %path.display(), sheet_count = sheets.len(), "Loaded workbook");
        Ok(Self { sheets })
    }

    /// Build a workbook from sheets already in memory
    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Get a worksheet that must exist
    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.find_sheet(name)
            .ok_or_else(|| ConfigError::MissingWorksheet(name.to_string()))
    }

    /// Get an optional worksheet
    pub fn find_sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// One worksheet as a grid of text cells
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Convenience constructor taking plain strings; empty strings become empty cells
    pub fn from_strings(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                    .collect()
            })
            .collect();
        Self::new(name, rows)
    }

    /// Read the first two columns as key/value pairs.
    ///
    /// Keys and values are trimmed; rows where either is blank are skipped.
    pub fn key_values(&self) -> Vec<(String, String)> {
        self.rows
            .iter()
            .filter_map(|row| {
                let key = trimmed(row.first())?;
                let value = trimmed(row.get(1))?;
                Some((key.to_string(), value.to_string()))
            })
            .collect()
    }

    /// Read the sheet as a table keyed by the header row.
    ///
    /// Blank header cells drop their column. Rows with no values at all are
    /// skipped. Row numbers are spreadsheet row numbers (the header is row 1).
    pub fn records(&self) -> Records {
        let Some((header, body)) = self.rows.split_first() else {
            return Records::default();
        };

        let columns: Vec<(usize, String)> = header
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| trimmed(Some(cell)).map(|name| (i, name.to_string())))
            .collect();

        let rows = body
            .iter()
            .enumerate()
            .filter_map(|(offset, cells)| {
                let mut fields = BTreeMap::new();
                for (i, column) in &columns {
                    if let Some(Some(value)) = cells.get(*i) {
                        fields.insert(column.clone(), value.clone());
                    }
                }
                let is_blank = fields.values().all(|v| v.trim().is_empty());
                (!is_blank).then(|| ConfigRow::new(offset + 2, fields))
            })
            .collect();

        Records {
            columns: columns.into_iter().map(|(_, name)| name).collect(),
            rows,
        }
    }
}

/// Header-keyed rows of a worksheet
#[derive(Debug, Clone, Default)]
pub struct Records {
    /// Column names in header order
    pub columns: Vec<String>,
    pub rows: Vec<ConfigRow>,
}

fn trimmed(cell: Option<&Cell>) -> Option<&str> {
    cell?
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn render_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_values_skip_blank_rows() {
        let sheet = Sheet::from_strings(
            "Configuration",
            &[
                &["Subscription", " Acme Production "],
                &["", "orphan value"],
                &["Pulumi Container", ""],
                &["Subscription slug", "ACME"],
            ],
        );

        let pairs = sheet.key_values();
        assert_eq!(
            pairs,
            vec![
                ("Subscription".to_string(), "Acme Production".to_string()),
                ("Subscription slug".to_string(), "ACME".to_string()),
            ]
        );
    }

    #[test]
    fn test_records_keyed_by_header() {
        let sheet = Sheet::from_strings(
            "Deployments",
            &[
                &["Defines", "Resource Group", "", "Service"],
                &["service", "rg1", "ignored", "web"],
                &["", "", "", ""],
                &["app", "rg1", "", "web"],
            ],
        );

        let records = sheet.records();
        assert_eq!(records.columns, vec!["Defines", "Resource Group", "Service"]);
        assert_eq!(records.rows.len(), 2);
        assert_eq!(records.rows[0].number(), 2);
        assert_eq!(records.rows[0].value("Service"), Some("web"));
        assert_eq!(records.rows[1].number(), 4);
        assert_eq!(records.rows[1].value("Defines"), Some("app"));
    }

    #[test]
    fn test_records_trim_header_names() {
        let sheet = Sheet::from_strings(
            "Deployments",
            &[&[" Defines ", "   ", "Service  "], &["service", "x", "web"]],
        );

        let records = sheet.records();
        assert_eq!(records.columns, vec!["Defines", "Service"]);
        assert_eq!(records.rows[0].value("Defines"), Some("service"));
        assert_eq!(records.rows[0].value("Service"), Some("web"));
    }

    #[test]
    fn test_records_of_empty_sheet() {
        let sheet = Sheet::new("Deployments", Vec::new());
        let records = sheet.records();
        assert!(records.columns.is_empty());
        assert!(records.rows.is_empty());
    }

    #[test]
    fn test_missing_worksheet() {
        let workbook = Workbook::from_sheets(vec![Sheet::new("Configuration", Vec::new())]);
        assert!(workbook.sheet("Configuration").is_ok());
        assert!(workbook.find_sheet("Templates").is_none());

        match workbook.sheet("Deployments") {
            Err(ConfigError::MissingWorksheet(name)) => assert_eq!(name, "Deployments"),
            other => panic!("Expected MissingWorksheet, got {:?}", other),
        }
    }

    #[test]
    fn test_render_numeric_cells() {
        assert_eq!(render_cell(&Data::Float(50.0)), Some("50".to_string()));
        assert_eq!(render_cell(&Data::Float(2.5)), Some("2.5".to_string()));
        assert_eq!(render_cell(&Data::Int(7)), Some("7".to_string()));
        assert_eq!(render_cell(&Data::Bool(true)), Some("true".to_string()));
        assert_eq!(render_cell(&Data::Empty), None);
    }

    #[test]
    fn test_open_xlsx_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("acme.xlsx");

        let mut book = rust_xlsxwriter::Workbook::new();
        let config = book.add_worksheet();
        config.set_name("Configuration").unwrap();
        config.write_string(0, 0, "Subscription").unwrap();
        config.write_string(0, 1, "Acme").unwrap();
        let deployments = book.add_worksheet();
        deployments.set_name("Deployments").unwrap();
        deployments.write_string(0, 0, "Defines").unwrap();
        deployments.write_string(0, 1, "Files quota").unwrap();
        deployments.write_string(1, 0, "service").unwrap();
        deployments.write_number(1, 1, 100.0).unwrap();
        book.save(&path).unwrap();

        let workbook = Workbook::open(&path).unwrap();
        let names: Vec<&str> = workbook.sheet_names().collect();
        assert_eq!(names, vec!["Configuration", "Deployments"]);

        let records = workbook.sheet("Deployments").unwrap().records();
        assert_eq!(records.rows[0].value("Files quota"), Some("100"));
    }

    #[test]
    fn test_open_missing_file() {
        let result = Workbook::open(Path::new("/nonexistent/sheet.xlsx"));
        assert!(matches!(result, Err(ConfigError::WorkbookOpen { .. })));
    }
}
