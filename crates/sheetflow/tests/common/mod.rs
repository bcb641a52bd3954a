use rust_xlsxwriter::Workbook;
use std::path::PathBuf;
use tempfile::TempDir;

/// Builds configuration workbooks in a scratch directory
pub struct TestWorkbook {
    pub root: TempDir,
    sheets: Vec<(String, Vec<Vec<String>>)>,
}

impl TestWorkbook {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self {
            root,
            sheets: Vec::new(),
        }
    }

    pub fn sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        self.sheets.push((name.to_string(), rows));
        self
    }

    /// The usual Configuration worksheet
    pub fn with_configuration(self) -> Self {
        self.sheet(
            "Configuration",
            &[
                &["Subscription", "Acme Production"],
                &["Subscription slug", "acme"],
                &["Pulumi Resource Group", "pulumi-state"],
                &["Pulumi Storage Account", "acmestate"],
            ],
        )
    }

    /// Write `<name>.xlsx` and return its path
    pub fn save(&self, name: &str) -> PathBuf {
        let path = self.root.path().join(format!("{}.xlsx", name));
        let mut book = Workbook::new();
        for (sheet_name, rows) in &self.sheets {
            let sheet = book.add_worksheet();
            sheet.set_name(sheet_name).unwrap();
            for (r, row) in rows.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    if !cell.is_empty() {
                        sheet.write_string(r as u32, c as u16, cell).unwrap();
                    }
                }
            }
        }
        book.save(&path).unwrap();
        path
    }

    /// A directory with nothing in it, used as PATH so no external tool can run
    #[allow(dead_code)]
    pub fn empty_path(&self) -> PathBuf {
        let dir = self.root.path().join("empty-bin");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
