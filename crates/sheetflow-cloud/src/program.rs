//! Declarative deployment program
//!
//! The planner emits a `Program`: an ordered list of resource declarations,
//! each with a unique logical name. Declarations refer to each other's
//! outputs through `OutputRef`s; the Pulumi engine works out the dependency
//! graph and converges the real resources.

use crate::error::{CloudError, Result};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Output of another declaration, e.g. `service-plan-web.id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    pub resource: String,
    pub property: String,
}

impl OutputRef {
    pub fn new(resource: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            property: property.into(),
        }
    }

    /// Pulumi YAML interpolation syntax
    pub fn interpolation(&self) -> String {
        format!("${{{}.{}}}", self.resource, self.property)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Literal(Value),
    Ref(OutputRef),
}

impl PropertyValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        PropertyValue::Literal(value.into())
    }
}

/// Placement shared by every resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub name: String,
    pub resource_group: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    ServicePlan {
        placement: Placement,
        sku: String,
    },
    StorageAccount {
        placement: Placement,
    },
    FileShare {
        name: String,
        storage_account: OutputRef,
        quota: u32,
    },
    AppInsights {
        placement: Placement,
    },
    KeyVault {
        placement: Placement,
        tenant_id: String,
    },
    AppService {
        placement: Placement,
        service_plan: OutputRef,
        instrumentation_key: OutputRef,
        stopped: bool,
    },
    AccessPolicy {
        key_vault: OutputRef,
        tenant_id: String,
        principal: OutputRef,
    },
}

impl ResourceSpec {
    /// Pulumi type token
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceSpec::ServicePlan { .. } => "azure:appservice:ServicePlan",
            ResourceSpec::StorageAccount { .. } => "azure:storage:Account",
            ResourceSpec::FileShare { .. } => "azure:storage:Share",
            ResourceSpec::AppInsights { .. } => "azure:appinsights:Insights",
            ResourceSpec::KeyVault { .. } => "azure:keyvault:KeyVault",
            ResourceSpec::AppService { .. } => "azure:appservice:LinuxWebApp",
            ResourceSpec::AccessPolicy { .. } => "azure:keyvault:AccessPolicy",
        }
    }

    /// Resource properties in declaration order
    pub fn properties(&self) -> Vec<(&'static str, PropertyValue)> {
        let mut props = Vec::new();

        match self {
            ResourceSpec::ServicePlan { placement, sku } => {
                place(&mut props, placement);
                props.push(("osType", lit("Linux")));
                props.push(("skuName", lit(sku.clone())));
            }
            ResourceSpec::StorageAccount { placement } => {
                place(&mut props, placement);
                props.push(("accountTier", lit("Standard")));
                props.push(("accountReplicationType", lit("LRS")));
            }
            ResourceSpec::FileShare {
                name,
                storage_account,
                quota,
            } => {
                props.push(("name", lit(name.clone())));
                props.push(("storageAccountName", PropertyValue::Ref(storage_account.clone())));
                props.push(("quota", lit(*quota)));
            }
            ResourceSpec::AppInsights { placement } => {
                place(&mut props, placement);
                props.push(("applicationType", lit("web")));
            }
            ResourceSpec::KeyVault {
                placement,
                tenant_id,
            } => {
                place(&mut props, placement);
                props.push(("skuName", lit("standard")));
                props.push(("tenantId", lit(tenant_id.clone())));
            }
            ResourceSpec::AppService {
                placement,
                service_plan,
                instrumentation_key,
                stopped,
            } => {
                place(&mut props, placement);
                let stopped = if *stopped { "1" } else { "0" };
                props.push(("servicePlanId", PropertyValue::Ref(service_plan.clone())));
                props.push(("siteConfig", lit(json!({}))));
                props.push(("identity", lit(json!({ "type": "SystemAssigned" }))));
                props.push((
                    "appSettings",
                    lit(json!({
                        "WEBSITE_STOPPED": stopped,
                        "APPINSIGHTS_INSTRUMENTATIONKEY": instrumentation_key.interpolation(),
                    })),
                ));
            }
            ResourceSpec::AccessPolicy {
                key_vault,
                tenant_id,
                principal,
            } => {
                props.push(("keyVaultId", PropertyValue::Ref(key_vault.clone())));
                props.push(("tenantId", lit(tenant_id.clone())));
                props.push(("objectId", PropertyValue::Ref(principal.clone())));
                props.push(("keyPermissions", lit(json!(["Get"]))));
                props.push(("secretPermissions", lit(json!(["Get"]))));
            }
        }
        props
    }

    /// Other declarations this one reads from
    pub fn references(&self) -> Vec<&OutputRef> {
        match self {
            ResourceSpec::FileShare { storage_account, .. } => vec![storage_account],
            ResourceSpec::AppService {
                service_plan,
                instrumentation_key,
                ..
            } => vec![service_plan, instrumentation_key],
            ResourceSpec::AccessPolicy {
                key_vault,
                principal,
                ..
            } => vec![key_vault, principal],
            _ => Vec::new(),
        }
    }
}

fn lit(value: impl Into<Value>) -> PropertyValue {
    PropertyValue::literal(value)
}

fn place(props: &mut Vec<(&'static str, PropertyValue)>, placement: &Placement) {
    props.push(("name", lit(placement.name.clone())));
    props.push(("resourceGroupName", lit(placement.resource_group.clone())));
    props.push(("location", lit(placement.location.clone())));
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub logical_name: String,
    pub spec: ResourceSpec,
}

/// Ordered set of declarations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    declarations: Vec<Declaration>,
    index: BTreeMap<String, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration and return a handle to it.
    ///
    /// Logical names are unique; references must point at earlier declarations.
    pub fn declare(&mut self, logical_name: impl Into<String>, spec: ResourceSpec) -> Result<String> {
        let logical_name = logical_name.into();
        if self.index.contains_key(&logical_name) {
            return Err(CloudError::InvalidProgram(format!(
                "resource '{}' declared twice",
                logical_name
            )));
        }
        if let Some(missing) = spec
            .references()
            .into_iter()
            .find(|r| !self.index.contains_key(&r.resource))
        {
            return Err(CloudError::InvalidProgram(format!(
                "resource '{}' refers to undeclared '{}'",
                logical_name, missing.resource
            )));
        }

        self.index.insert(logical_name.clone(), self.declarations.len());
        self.declarations.push(Declaration {
            logical_name: logical_name.clone(),
            spec,
        });
        Ok(logical_name)
    }

    pub fn get(&self, logical_name: &str) -> Option<&Declaration> {
        self.index.get(logical_name).map(|i| &self.declarations[*i])
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(name: &str) -> Placement {
        Placement {
            name: name.to_string(),
            resource_group: "rg1".to_string(),
            location: "uksouth".to_string(),
        }
    }

    #[test]
    fn test_declare_and_get() {
        let mut program = Program::new();
        let plan = program
            .declare(
                "service-plan-web",
                ResourceSpec::ServicePlan {
                    placement: placement("web"),
                    sku: "B1".to_string(),
                },
            )
            .unwrap();

        assert_eq!(plan, "service-plan-web");
        assert_eq!(
            program.get("service-plan-web").unwrap().spec.type_token(),
            "azure:appservice:ServicePlan"
        );
        assert!(program.get("service-plan-api").is_none());
    }

    #[test]
    fn test_duplicate_logical_name() {
        let mut program = Program::new();
        let spec = ResourceSpec::StorageAccount {
            placement: placement("acmeweb"),
        };
        program.declare("storage-web", spec.clone()).unwrap();
        assert!(program.declare("storage-web", spec).is_err());
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn test_reference_to_undeclared_resource() {
        let mut program = Program::new();
        let result = program.declare(
            "files-web",
            ResourceSpec::FileShare {
                name: "files".to_string(),
                storage_account: OutputRef::new("storage-web", "name"),
                quota: 50,
            },
        );
        assert!(result.is_err());
        assert!(program.is_empty());
    }

    #[test]
    fn test_app_service_properties() {
        let spec = ResourceSpec::AppService {
            placement: placement("acme-web-frontend"),
            service_plan: OutputRef::new("service-plan-web", "id"),
            instrumentation_key: OutputRef::new("insights-web", "instrumentationKey"),
            stopped: true,
        };
        let props: BTreeMap<_, _> = spec.properties().into_iter().collect();

        assert_eq!(
            props["servicePlanId"],
            PropertyValue::Ref(OutputRef::new("service-plan-web", "id"))
        );
        assert_eq!(
            props["appSettings"],
            PropertyValue::literal(json!({
                "WEBSITE_STOPPED": "1",
                "APPINSIGHTS_INSTRUMENTATIONKEY": "${insights-web.instrumentationKey}",
            }))
        );
        assert_eq!(
            props["identity"],
            PropertyValue::literal(json!({ "type": "SystemAssigned" }))
        );
    }
}
