use crate::error::{ConfigError, Result};
use std::collections::BTreeMap;

pub const DEFINES: &str = "Defines";
pub const RESOURCE_GROUP: &str = "Resource Group";
pub const SERVICE: &str = "Service";
pub const APP: &str = "App";
pub const REGION: &str = "Region";
pub const SKU: &str = "sku";
pub const FILES_QUOTA: &str = "Files quota";
pub const STATUS: &str = "Status";
/// Stamped onto every deployment row from the `Subscription slug` setting
pub const SUBSCRIPTION: &str = "Subscription";

/// Columns that must be present and non-blank on every deployment row
pub const REQUIRED_COLUMNS: [&str; 3] = [DEFINES, RESOURCE_GROUP, SERVICE];

/// Optional columns and the value used when they are blank
pub const DEFAULTED_COLUMNS: [(&str, &str); 3] =
    [(SKU, "B1"), (REGION, "uksouth"), (FILES_QUOTA, "50")];

/// A spreadsheet row keyed by column name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRow {
    number: usize,
    fields: BTreeMap<String, String>,
}

impl ConfigRow {
    pub fn new(number: usize, fields: BTreeMap<String, String>) -> Self {
        Self { number, fields }
    }

    /// Build a row from pairs, mostly useful in tests
    pub fn from_pairs<'a>(number: usize, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(number, fields)
    }

    /// Spreadsheet row number
    pub fn number(&self) -> usize {
        self.number
    }

    /// Trimmed value of a column, `None` when absent or blank
    pub fn value(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Value of a column this row's kind needs
    pub fn require(&self, sheet: &str, column: &str) -> Result<&str> {
        self.value(column).ok_or_else(|| ConfigError::MissingColumn {
            sheet: sheet.to_string(),
            row: self.number,
            column: column.to_string(),
        })
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    /// Fill a column with `default` when it is absent or blank
    pub fn set_default(&mut self, column: &str, default: &str) {
        if self.value(column).is_none() {
            self.set(column, default);
        }
    }
}
