//! Azure provider for SheetFlow
//!
//! Implements `sheetflow_cloud::AzureApi` on top of the Azure CLI.
//!
//! # Requirements
//!
//! - `az` must be installed and on `PATH`
//! - Authentication is whatever `az login` left behind
//!
//! # Example
//!
//! ```ignore
//! use sheetflow_cloud::validate_subscription;
//! use sheetflow_cloud_azure::AzureCliProvider;
//!
//! let azure = AzureCliProvider::new();
//! let ctx = validate_subscription(&azure, "Acme Production").await?;
//! ```

pub mod az;
pub mod error;
pub mod provider;

pub use az::AzCli;
pub use error::{AzureError, Result};
pub use provider::AzureCliProvider;
