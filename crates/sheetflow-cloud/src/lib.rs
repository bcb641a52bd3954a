//! SheetFlow cloud layer
//!
//! Takes validated spreadsheet configuration and prepares a deployment:
//!
//! ```text
//! rows ──► Planner::prepare ──► validate_subscription ──► resolve_resource_groups
//!                                                                  │
//!    BackingStoreProvisioner::ensure ◄── Program ◄── DeploymentPlan::into_program
//! ```
//!
//! Azure is reached through the [`AzureApi`] trait and shell scripts through
//! [`ScriptRunner`], so the whole flow runs against in-memory fakes in tests.

pub mod azure;
pub mod backing_store;
pub mod error;
pub mod planner;
pub mod program;
pub mod script;
pub mod subscription;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use azure::{
    AzureApi, BlobItem, ResourceGroup, StorageAccount, StorageCredentials, StorageKey,
    Subscription,
};
pub use backing_store::{
    BackendHandle, BackingStoreProvisioner, BackingStoreSpec, PROJECT_NAME, initialisation_script,
};
pub use error::{CloudError, Result};
pub use planner::{
    AppIntent, DeploymentIntent, DeploymentKind, DeploymentPlan, Planner, ServiceDeclarations,
    ServiceIntent, ServiceNames,
};
pub use program::{Declaration, OutputRef, Placement, Program, PropertyValue, ResourceSpec};
pub use script::{BashScriptRunner, ScriptRunner, compose};
pub use subscription::{SubscriptionContext, validate_subscription};
