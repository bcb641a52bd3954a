use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open workbook: {path}\nReason: {message}")]
    WorkbookOpen { path: PathBuf, message: String },

    #[error("Failed to read worksheet '{sheet}': {message}")]
    WorksheetRead { sheet: String, message: String },

    #[error("Worksheet '{0}' not found in the workbook")]
    MissingWorksheet(String),

    #[error("'{column}' is missing from row {row} of the {sheet} worksheet")]
    MissingColumn {
        sheet: String,
        row: usize,
        column: String,
    },

    #[error("'{column}' is missing from row {row} of the deployments worksheet")]
    MissingRequiredColumn { row: usize, column: String },

    #[error("'{0}' not found in the Configuration worksheet")]
    MissingSetting(String),

    #[error("Unknown resource type '{0}' in the Templates worksheet")]
    UnknownResourceType(String),

    #[error("Invalid template '{template}': {message}")]
    TemplateSyntax { template: String, message: String },

    #[error("Template for {resource_type} references '{field}', which the row does not provide")]
    TemplateSubstitution { resource_type: String, field: String },

    #[error("Invalid {resource_type} name '{name}': {reason}")]
    InvalidResourceName {
        resource_type: String,
        name: String,
        reason: String,
    },

    #[error("Row {row}: unsupported deployment kind '{kind}' (expected 'service' or 'app')")]
    UnsupportedDeploymentKind { row: usize, kind: String },

    #[error("Row {row}: service '{service}' is declared more than once")]
    DuplicateService { row: usize, service: String },

    #[error("Row {row}: app '{app}' of service '{service}' is declared more than once")]
    DuplicateApp {
        row: usize,
        service: String,
        app: String,
    },

    #[error("Row {row}: {resource_type} name '{name}' is already used by an earlier row")]
    DuplicateResourceName {
        row: usize,
        resource_type: String,
        name: String,
    },

    #[error("Row {row}: app refers to service '{service}', which no service row declares")]
    UnknownParentService { row: usize, service: String },

    #[error("Row {row}: files quota '{value}' is not a positive whole number")]
    InvalidQuota { row: usize, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
