//! Pulumi YAML rendering
//!
//! A `Program` becomes a single `Pulumi.yaml`:
//!
//! ```yaml
//! name: devops
//! runtime: yaml
//! backend:
//!   url: azblob://pulumi
//! resources:
//!   service-plan-web:
//!     type: azure:appservice:ServicePlan
//!     properties:
//!       name: web
//!       ...
//! ```

use crate::error::Result;
use serde_yaml::{Mapping, Value};
use sheetflow_cloud::{Program, PropertyValue};

/// File name Pulumi looks for in the project directory
pub const PROJECT_FILE: &str = "Pulumi.yaml";

/// Build the project document
pub fn project_document(project: &str, backend_url: &str, program: &Program) -> Result<Value> {
    let mut resources = Mapping::new();
    for declaration in program.declarations() {
        let mut properties = Mapping::new();
        for (key, value) in declaration.spec.properties() {
            properties.insert(key.into(), property_value(&value)?);
        }

        let mut resource = Mapping::new();
        resource.insert("type".into(), declaration.spec.type_token().into());
        resource.insert("properties".into(), Value::Mapping(properties));
        resources.insert(
            declaration.logical_name.clone().into(),
            Value::Mapping(resource),
        );
    }

    let mut backend = Mapping::new();
    backend.insert("url".into(), backend_url.into());

    let mut doc = Mapping::new();
    doc.insert("name".into(), project.into());
    doc.insert("runtime".into(), "yaml".into());
    doc.insert(
        "description".into(),
        "Generated by sheetflow. Edit the spreadsheet, not this file.".into(),
    );
    doc.insert("backend".into(), Value::Mapping(backend));
    doc.insert("resources".into(), Value::Mapping(resources));
    Ok(Value::Mapping(doc))
}

/// Render the project document as YAML text
pub fn render_project(project: &str, backend_url: &str, program: &Program) -> Result<String> {
    Ok(serde_yaml::to_string(&project_document(
        project,
        backend_url,
        program,
    )?)?)
}

fn property_value(value: &PropertyValue) -> Result<Value> {
    match value {
        PropertyValue::Literal(json) => Ok(serde_yaml::to_value(json)?),
        PropertyValue::Ref(output) => Ok(Value::String(output.interpolation())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetflow_cloud::{OutputRef, Placement, ResourceSpec};

    fn placement(name: &str) -> Placement {
        Placement {
            name: name.to_string(),
            resource_group: "rg1".to_string(),
            location: "uksouth".to_string(),
        }
    }

    fn sample_program() -> Program {
        let mut program = Program::new();
        program
            .declare(
                "storage-web",
                ResourceSpec::StorageAccount {
                    placement: placement("acmeweb"),
                },
            )
            .unwrap();
        program
            .declare(
                "files-web",
                ResourceSpec::FileShare {
                    name: "files".to_string(),
                    storage_account: OutputRef::new("storage-web", "name"),
                    quota: 50,
                },
            )
            .unwrap();
        program
    }

    #[test]
    fn test_project_header() {
        let doc = project_document("devops", "azblob://pulumi", &Program::new()).unwrap();
        assert_eq!(doc["name"], Value::from("devops"));
        assert_eq!(doc["runtime"], Value::from("yaml"));
        assert_eq!(doc["backend"]["url"], Value::from("azblob://pulumi"));
    }

    #[test]
    fn test_resources_and_references() {
        let doc = project_document("devops", "azblob://pulumi", &sample_program()).unwrap();

        let storage = &doc["resources"]["storage-web"];
        assert_eq!(storage["type"], Value::from("azure:storage:Account"));
        assert_eq!(storage["properties"]["accountReplicationType"], Value::from("LRS"));

        let share = &doc["resources"]["files-web"];
        assert_eq!(share["type"], Value::from("azure:storage:Share"));
        assert_eq!(
            share["properties"]["storageAccountName"],
            Value::from("${storage-web.name}")
        );
        assert_eq!(share["properties"]["quota"], Value::from(50));
    }

    #[test]
    fn test_render_keeps_declaration_order() {
        let yaml = render_project("devops", "azblob://pulumi", &sample_program()).unwrap();
        let storage = yaml.find("storage-web:").unwrap();
        let files = yaml.find("files-web:").unwrap();
        assert!(storage < files);
        assert!(yaml.starts_with("name: devops\n"));
    }
}
