//! SheetFlow core
//!
//! Reads the deployment workbook and turns it into typed configuration:
//!
//! - `Configuration` worksheet: subscription and Pulumi state backend settings
//! - `Templates` worksheet (optional): naming template overrides
//! - `Deployments` worksheet: one row per service or app
//!
//! Nothing in this crate talks to the cloud.

pub mod error;
pub mod loader;
pub mod model;
pub mod template;
pub mod workbook;

pub use error::{ConfigError, Result};
pub use loader::{
    CONFIGURATION_SHEET, DEPLOYMENTS_SHEET, SheetConfig, TEMPLATES_SHEET, load_sheet_config,
    stack_name,
};
pub use model::{ConfigRow, Configuration, ResourceType, StateBackend};
pub use template::{NamingTemplate, Segment, TemplateTable};
pub use workbook::{Records, Sheet, Workbook};
