//! Load a configuration workbook into typed settings

use crate::error::Result;
use crate::model::{ConfigRow, Configuration};
use crate::template::TemplateTable;
use crate::workbook::Workbook;
use std::path::Path;
use tracing::info;

pub const CONFIGURATION_SHEET: &str = "Configuration";
pub const TEMPLATES_SHEET: &str = "Templates";
pub const DEPLOYMENTS_SHEET: &str = "Deployments";

/// Everything a run needs from the workbook
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub configuration: Configuration,
    pub templates: TemplateTable,
    /// Header of the Deployments worksheet
    pub deployment_columns: Vec<String>,
    pub deployments: Vec<ConfigRow>,
}

impl SheetConfig {
    pub fn from_workbook(workbook: &Workbook) -> Result<Self> {
        let configuration =
            Configuration::from_key_values(&workbook.sheet(CONFIGURATION_SHEET)?.key_values())?;

        let overrides = workbook
            .find_sheet(TEMPLATES_SHEET)
            .map(|sheet| sheet.key_values())
            .unwrap_or_default();
        let templates = TemplateTable::with_overrides(&overrides)?;

        let records = workbook.sheet(DEPLOYMENTS_SHEET)?.records();

        Ok(Self {
            configuration,
            templates,
            deployment_columns: records.columns,
            deployments: records.rows,
        })
    }
}

/// Read the workbook at `path`
pub fn load_sheet_config(path: &Path) -> Result<SheetConfig> {
    let workbook = Workbook::open(path)?;
    let config = SheetConfig::from_workbook(&workbook)?;

    info!(
        path = %path.display(),
        deployments = config.deployments.len(),
        "Loaded configuration workbook"
    );
    Ok(config)
}

/// Stack name for a configuration file: its base name without extension
pub fn stack_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}
