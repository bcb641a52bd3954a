//! Pulumi integration for SheetFlow
//!
//! Renders a `sheetflow_cloud::Program` as a Pulumi YAML project and drives
//! the `pulumi` CLI against the blob state backend.

pub mod error;
pub mod program;
pub mod workspace;

pub use error::{PulumiError, Result};
pub use program::{PROJECT_FILE, project_document, render_project};
pub use workspace::{PulumiWorkspace, UpdateSummary};
