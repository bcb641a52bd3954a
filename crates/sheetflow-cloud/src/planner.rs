//! Deployment planner
//!
//! Planning runs in two phases:
//!
//! 1. [`Planner::prepare`] works offline. It fills defaults, checks required
//!    columns, resolves and validates every resource name and links apps to
//!    their parent service. Any problem anywhere in the sheet fails here,
//!    before Azure is contacted.
//! 2. [`Planner::resolve_resource_groups`] confirms every referenced resource
//!    group exists, looking each distinct group up once, and yields a
//!    [`DeploymentPlan`]. [`DeploymentPlan::into_program`] then turns the plan
//!    into declarations for Pulumi.

use crate::azure::{AzureApi, ResourceGroup};
use crate::error::{CloudError, Result};
use crate::program::{OutputRef, Placement, Program, ResourceSpec};
use crate::subscription::SubscriptionContext;
use sheetflow_core::loader::DEPLOYMENTS_SHEET;
use sheetflow_core::model::row::{
    APP, DEFAULTED_COLUMNS, DEFINES, FILES_QUOTA, REGION, REQUIRED_COLUMNS, SERVICE, SKU, STATUS,
    SUBSCRIPTION,
};
use sheetflow_core::{ConfigError, ConfigRow, ResourceType, TemplateTable};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

const SERVICE_RESOURCES: [ResourceType; 5] = [
    ResourceType::AppServicePlan,
    ResourceType::StorageAccount,
    ResourceType::FileShare,
    ResourceType::AppInsights,
    ResourceType::KeyVault,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentKind {
    Service,
    App,
}

impl DeploymentKind {
    fn parse(row: usize, value: &str) -> std::result::Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "service" => Ok(DeploymentKind::Service),
            "app" => Ok(DeploymentKind::App),
            _ => Err(ConfigError::UnsupportedDeploymentKind {
                row,
                kind: value.to_string(),
            }),
        }
    }

    /// Resource types a row of this kind is named with
    fn resource_types(&self) -> &'static [ResourceType] {
        match self {
            DeploymentKind::Service => &SERVICE_RESOURCES,
            DeploymentKind::App => &[ResourceType::AppService],
        }
    }
}

/// Resolved names of everything a service row declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNames {
    pub plan: String,
    pub storage_account: String,
    pub file_share: String,
    pub insights: String,
    pub key_vault: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIntent {
    pub row: usize,
    pub service: String,
    pub resource_group: String,
    pub region: String,
    pub sku: String,
    pub files_quota: u32,
    pub names: ServiceNames,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIntent {
    pub row: usize,
    /// Parent service
    pub service: String,
    pub app: String,
    pub resource_group: String,
    pub region: String,
    pub name: String,
    pub stopped: bool,
}

impl ServiceIntent {
    /// Logical names of the declarations this service produces
    pub fn declarations(&self) -> ServiceDeclarations {
        ServiceDeclarations {
            plan: format!("service-plan-{}", self.service),
            storage: format!("storage-{}", self.service),
            files: format!("files-{}", self.service),
            insights: format!("insights-{}", self.service),
            vault: format!("vault-{}", self.service),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeclarations {
    pub plan: String,
    pub storage: String,
    pub files: String,
    pub insights: String,
    pub vault: String,
}

impl AppIntent {
    /// Logical names of the app service and its key vault access policy.
    ///
    /// Keyed by the Azure name, which is unique across the sheet and never
    /// contains anything but letters, digits and hyphens.
    pub fn declarations(&self) -> (String, String) {
        (format!("app-{}", self.name), format!("access-{}", self.name))
    }
}

/// A validated deployment row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentIntent {
    Service(ServiceIntent),
    App(AppIntent),
}

impl DeploymentIntent {
    pub fn row(&self) -> usize {
        match self {
            DeploymentIntent::Service(s) => s.row,
            DeploymentIntent::App(a) => a.row,
        }
    }

    pub fn resource_group(&self) -> &str {
        match self {
            DeploymentIntent::Service(s) => &s.resource_group,
            DeploymentIntent::App(a) => &a.resource_group,
        }
    }

    /// Azure names this row creates, file shares excluded
    fn azure_names(&self) -> Vec<(ResourceType, &str)> {
        match self {
            DeploymentIntent::Service(s) => vec![
                (ResourceType::AppServicePlan, s.names.plan.as_str()),
                (ResourceType::StorageAccount, s.names.storage_account.as_str()),
                (ResourceType::AppInsights, s.names.insights.as_str()),
                (ResourceType::KeyVault, s.names.key_vault.as_str()),
            ],
            DeploymentIntent::App(a) => vec![(ResourceType::AppService, a.name.as_str())],
        }
    }
}

/// Types whose names are unique across Azure rather than per resource group
fn globally_named(resource_type: ResourceType) -> bool {
    matches!(
        resource_type,
        ResourceType::StorageAccount | ResourceType::KeyVault | ResourceType::AppService
    )
}

pub struct Planner<'a> {
    templates: &'a TemplateTable,
    subscription_slug: &'a str,
}

impl<'a> Planner<'a> {
    pub fn new(templates: &'a TemplateTable, subscription_slug: &'a str) -> Self {
        Self {
            templates,
            subscription_slug,
        }
    }

    /// Validate every deployment row without touching the cloud.
    ///
    /// `columns` is the header of the Deployments worksheet; templates may
    /// only read those columns, the stamped `Subscription` and the defaulted
    /// columns.
    pub fn prepare(&self, rows: &[ConfigRow], columns: &[String]) -> Result<Vec<DeploymentIntent>> {
        let mut normalized = Vec::with_capacity(rows.len());
        for row in rows {
            normalized.push(self.normalize(row)?);
        }

        let mut used: BTreeSet<ResourceType> = BTreeSet::new();
        if !normalized.is_empty() {
            used.insert(ResourceType::ResourceGroup);
        }
        for (kind, _) in &normalized {
            used.extend(kind.resource_types());
        }
        let mut available: BTreeSet<String> = columns.iter().map(|c| c.trim().to_string()).collect();
        available.insert(SUBSCRIPTION.to_string());
        available.extend(DEFAULTED_COLUMNS.iter().map(|(c, _)| c.to_string()));
        self.templates
            .check_fields(&used.into_iter().collect::<Vec<_>>(), &available)?;

        let mut intents = Vec::with_capacity(normalized.len());
        let mut services: BTreeSet<String> = BTreeSet::new();
        let mut apps: BTreeSet<(String, String)> = BTreeSet::new();
        for (kind, row) in &normalized {
            let intent = match kind {
                DeploymentKind::Service => {
                    let intent = self.service_intent(row)?;
                    if !services.insert(intent.service.clone()) {
                        return Err(ConfigError::DuplicateService {
                            row: intent.row,
                            service: intent.service,
                        }
                        .into());
                    }
                    DeploymentIntent::Service(intent)
                }
                DeploymentKind::App => {
                    let intent = self.app_intent(row)?;
                    if !apps.insert((intent.service.clone(), intent.app.clone())) {
                        return Err(ConfigError::DuplicateApp {
                            row: intent.row,
                            service: intent.service,
                            app: intent.app,
                        }
                        .into());
                    }
                    DeploymentIntent::App(intent)
                }
            };
            intents.push(intent);
        }

        // Parents may be declared below their apps
        for intent in &intents {
            if let DeploymentIntent::App(app) = intent
                && !services.contains(&app.service)
            {
                return Err(ConfigError::UnknownParentService {
                    row: app.row,
                    service: app.service.clone(),
                }
                .into());
            }
        }

        check_unique_names(&intents)?;

        info!(rows = intents.len(), "Deployment rows validated");
        Ok(intents)
    }

    /// Defaults, required columns, subscription stamp and lower-casing
    fn normalize(&self, row: &ConfigRow) -> Result<(DeploymentKind, ConfigRow)> {
        let mut row = row.clone();
        for (column, default) in DEFAULTED_COLUMNS {
            row.set_default(column, default);
        }

        for column in REQUIRED_COLUMNS {
            if row.value(column).is_none() {
                return Err(ConfigError::MissingRequiredColumn {
                    row: row.number(),
                    column: column.to_string(),
                }
                .into());
            }
        }

        row.set(SUBSCRIPTION, self.subscription_slug);
        for column in [SERVICE, REGION, APP] {
            if let Some(value) = row.value(column).map(str::to_lowercase) {
                row.set(column, value);
            }
        }

        let kind = DeploymentKind::parse(row.number(), row.value(DEFINES).unwrap_or_default())?;
        Ok((kind, row))
    }

    fn name(&self, resource_type: ResourceType, row: &ConfigRow) -> Result<String> {
        let name = self.templates.resolve(resource_type, row)?;
        resource_type.check_name(&name)?;
        Ok(name)
    }

    fn service_intent(&self, row: &ConfigRow) -> Result<ServiceIntent> {
        let quota_text = row.value(FILES_QUOTA).unwrap_or_default();
        let files_quota = quota_text
            .parse::<u32>()
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| ConfigError::InvalidQuota {
                row: row.number(),
                value: quota_text.to_string(),
            })?;

        Ok(ServiceIntent {
            row: row.number(),
            service: required(row, SERVICE)?,
            resource_group: self.name(ResourceType::ResourceGroup, row)?,
            region: required(row, REGION)?,
            sku: required(row, SKU)?,
            files_quota,
            names: ServiceNames {
                plan: self.name(ResourceType::AppServicePlan, row)?,
                storage_account: self.name(ResourceType::StorageAccount, row)?,
                file_share: self.name(ResourceType::FileShare, row)?,
                insights: self.name(ResourceType::AppInsights, row)?,
                key_vault: self.name(ResourceType::KeyVault, row)?,
            },
        })
    }

    fn app_intent(&self, row: &ConfigRow) -> Result<AppIntent> {
        let stopped = row
            .value(STATUS)
            .is_some_and(|s| s.eq_ignore_ascii_case("stopped"));

        Ok(AppIntent {
            row: row.number(),
            service: required(row, SERVICE)?,
            app: required(row, APP)?,
            resource_group: self.name(ResourceType::ResourceGroup, row)?,
            region: required(row, REGION)?,
            name: self.name(ResourceType::AppService, row)?,
            stopped,
        })
    }

    /// Confirm every resource group the intents use exists.
    ///
    /// Each distinct group is looked up once.
    pub async fn resolve_resource_groups(
        &self,
        intents: Vec<DeploymentIntent>,
        azure: &dyn AzureApi,
        subscription: &SubscriptionContext,
    ) -> Result<DeploymentPlan> {
        let mut resource_groups: BTreeMap<String, ResourceGroup> = BTreeMap::new();

        for intent in &intents {
            let name = intent.resource_group();
            if resource_groups.contains_key(name) {
                continue;
            }
            if !azure
                .resource_group_exists(&subscription.subscription_id, name)
                .await?
            {
                return Err(CloudError::ResourceGroupNotFound {
                    name: name.to_string(),
                    subscription: subscription.name.clone(),
                });
            }
            let group = azure
                .get_resource_group(&subscription.subscription_id, name)
                .await?;
            debug!(resource_group = %group.name, location = %group.location, "Resource group found");
            resource_groups.insert(name.to_string(), group);
        }

        Ok(DeploymentPlan {
            intents,
            resource_groups,
        })
    }
}

/// Two rows resolving to the same Azure name would collide during the update
fn check_unique_names(intents: &[DeploymentIntent]) -> Result<()> {
    let mut seen: BTreeSet<(ResourceType, &str, &str)> = BTreeSet::new();
    for intent in intents {
        let scope = intent.resource_group();
        for (resource_type, name) in intent.azure_names() {
            let scope = if globally_named(resource_type) { "" } else { scope };
            if !seen.insert((resource_type, scope, name)) {
                return Err(ConfigError::DuplicateResourceName {
                    row: intent.row(),
                    resource_type: resource_type.to_string(),
                    name: name.to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

fn required(row: &ConfigRow, column: &str) -> Result<String> {
    Ok(row.require(DEPLOYMENTS_SHEET, column)?.to_string())
}

/// Validated rows plus the resource groups they deploy into
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    pub intents: Vec<DeploymentIntent>,
    pub resource_groups: BTreeMap<String, ResourceGroup>,
}

/// Logical names of a service's declarations, used by its apps
struct ServiceHandles {
    plan: String,
    insights: String,
    key_vault: String,
}

impl DeploymentPlan {
    /// Turn the plan into Pulumi declarations.
    ///
    /// Services are declared before apps so every app finds its parent's
    /// plan, insights and key vault regardless of row order.
    pub fn into_program(self, subscription: &SubscriptionContext) -> Result<Program> {
        let mut program = Program::new();
        let mut services: HashMap<String, ServiceHandles> = HashMap::new();

        for intent in &self.intents {
            let DeploymentIntent::Service(s) = intent else {
                continue;
            };
            let decl = s.declarations();
            let group = self.group_name(&s.resource_group);
            let place = |name: &str| Placement {
                name: name.to_string(),
                resource_group: group.clone(),
                location: s.region.clone(),
            };

            let plan = program.declare(
                decl.plan,
                ResourceSpec::ServicePlan {
                    placement: place(&s.names.plan),
                    sku: s.sku.clone(),
                },
            )?;
            let storage = program.declare(
                decl.storage,
                ResourceSpec::StorageAccount {
                    placement: place(&s.names.storage_account),
                },
            )?;
            program.declare(
                decl.files,
                ResourceSpec::FileShare {
                    name: s.names.file_share.clone(),
                    storage_account: OutputRef::new(storage, "name"),
                    quota: s.files_quota,
                },
            )?;
            let insights = program.declare(
                decl.insights,
                ResourceSpec::AppInsights {
                    placement: place(&s.names.insights),
                },
            )?;
            let key_vault = program.declare(
                decl.vault,
                ResourceSpec::KeyVault {
                    placement: place(&s.names.key_vault),
                    tenant_id: subscription.tenant_id.clone(),
                },
            )?;

            services.insert(
                s.service.clone(),
                ServiceHandles {
                    plan,
                    insights,
                    key_vault,
                },
            );
        }

        for intent in &self.intents {
            let DeploymentIntent::App(a) = intent else {
                continue;
            };
            let parent = services.get(&a.service).ok_or_else(|| {
                CloudError::Config(ConfigError::UnknownParentService {
                    row: a.row,
                    service: a.service.clone(),
                })
            })?;

            let (app_name, access_name) = a.declarations();
            let app = program.declare(
                app_name,
                ResourceSpec::AppService {
                    placement: Placement {
                        name: a.name.clone(),
                        resource_group: self.group_name(&a.resource_group),
                        location: a.region.clone(),
                    },
                    service_plan: OutputRef::new(&parent.plan, "id"),
                    instrumentation_key: OutputRef::new(&parent.insights, "instrumentationKey"),
                    stopped: a.stopped,
                },
            )?;
            program.declare(
                access_name,
                ResourceSpec::AccessPolicy {
                    key_vault: OutputRef::new(&parent.key_vault, "id"),
                    tenant_id: subscription.tenant_id.clone(),
                    principal: OutputRef::new(&app, "identity.principalId"),
                },
            )?;
        }

        info!(resources = program.len(), "Deployment program built");
        Ok(program)
    }

    /// Name of a resource group as Azure reports it
    fn group_name(&self, name: &str) -> String {
        self.resource_groups
            .get(name)
            .map(|g| g.name.clone())
            .unwrap_or_else(|| name.to_string())
    }
}
