//! Naming templates
//!
//! A template is a string such as `{Subscription}-{Service}` whose
//! placeholders are filled from a deployment row. `{{` and `}}` produce
//! literal braces. Templates are parsed once, when the table is built, so a
//! malformed override fails before any row is looked at.

use crate::error::{ConfigError, Result};
use crate::model::{ConfigRow, ResourceType};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::debug;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").unwrap());

/// Header cell that may open the Templates worksheet
const TEMPLATES_HEADER: &str = "resource type";

/// Piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed naming template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NamingTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let syntax = |message: &str| ConfigError::TemplateSyntax {
            template: source.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in TOKEN.captures_iter(source) {
            let Some(token) = caps.get(0) else { continue };
            literal.push_str(&source[last..token.start()]);
            last = token.end();

            match token.as_str() {
                "{{" => literal.push('{'),
                "}}" => literal.push('}'),
                "{" | "}" => return Err(syntax("unbalanced brace")),
                _ => {
                    let field = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    if field.trim().is_empty() {
                        return Err(syntax("empty placeholder"));
                    }
                    if field.contains(&[':', '!', '.', '['][..]) {
                        return Err(syntax(&format!(
                            "placeholder '{{{}}}' may only name a column",
                            field
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field.to_string()));
                }
            }
        }

        literal.push_str(&source[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Column names the template reads
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute the row's values. Blank values count as missing.
    pub fn render(&self, resource_type: ResourceType, row: &ConfigRow) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    let value =
                        row.value(name)
                            .ok_or_else(|| ConfigError::TemplateSubstitution {
                                resource_type: resource_type.to_string(),
                                field: name.clone(),
                            })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Naming template for every resource type
#[derive(Debug, Clone)]
pub struct TemplateTable {
    templates: BTreeMap<ResourceType, NamingTemplate>,
}

impl TemplateTable {
    /// Built-in templates only
    pub fn defaults() -> Result<Self> {
        Self::with_overrides(&[])
    }

    /// Built-in templates replaced by `overrides` (resource type name, template).
    ///
    /// Later overrides for the same type win. A first pair whose key is the
    /// `Resource Type` header is ignored.
    pub fn with_overrides(overrides: &[(String, String)]) -> Result<Self> {
        let mut templates = BTreeMap::new();
        for t in ResourceType::ALL {
            templates.insert(t, NamingTemplate::parse(t.default_template())?);
        }

        for (i, (name, source)) in overrides.iter().enumerate() {
            if i == 0 && name.trim().eq_ignore_ascii_case(TEMPLATES_HEADER) {
                continue;
            }
            let t = ResourceType::parse(name)
                .ok_or_else(|| ConfigError::UnknownResourceType(name.clone()))?;
            debug!(resource_type = %t, template = %source, "Template override");
            templates.insert(t, NamingTemplate::parse(source)?);
        }

        Ok(Self { templates })
    }

    pub fn get(&self, resource_type: ResourceType) -> &NamingTemplate {
        &self.templates[&resource_type]
    }

    /// Resolve the name of a resource of type `resource_type` for `row`
    pub fn resolve(&self, resource_type: ResourceType, row: &ConfigRow) -> Result<String> {
        self.get(resource_type).render(resource_type, row)
    }

    /// Make sure every field the given templates read is in `available`
    pub fn check_fields(
        &self,
        resource_types: &[ResourceType],
        available: &BTreeSet<String>,
    ) -> Result<()> {
        for t in resource_types {
            if let Some(field) = self.get(*t).fields().find(|f| !available.contains(*f)) {
                return Err(ConfigError::TemplateSubstitution {
                    resource_type: t.to_string(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row::{APP, RESOURCE_GROUP, SERVICE, SUBSCRIPTION};
    use proptest::prelude::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_segments() {
        let template = NamingTemplate::parse("{Subscription}-{Service}").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Field("Subscription".to_string()),
                Segment::Literal("-".to_string()),
                Segment::Field("Service".to_string()),
            ]
        );
    }

    #[test]
    fn test_render_subscription_service() {
        let template = NamingTemplate::parse("{Subscription}-{Service}").unwrap();
        let row = ConfigRow::from_pairs(2, [(SUBSCRIPTION, "acme"), (SERVICE, "web")]);
        assert_eq!(
            template.render(ResourceType::KeyVault, &row).unwrap(),
            "acme-web"
        );
    }

    #[test]
    fn test_escaped_braces() {
        let template = NamingTemplate::parse("{{{Service}}}").unwrap();
        let row = ConfigRow::from_pairs(2, [(SERVICE, "web")]);
        assert_eq!(
            template.render(ResourceType::AppInsights, &row).unwrap(),
            "{web}"
        );
        assert_eq!(template.fields().collect::<Vec<_>>(), vec!["Service"]);
    }

    #[test]
    fn test_field_names_with_spaces() {
        let template = NamingTemplate::parse("{Resource Group}").unwrap();
        let row = ConfigRow::from_pairs(2, [(RESOURCE_GROUP, "Web-Apps")]);
        assert_eq!(
            template.render(ResourceType::ResourceGroup, &row).unwrap(),
            "Web-Apps"
        );
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["{Service", "Service}", "{}", "{Service:>4}", "{a.b}", "x{ }y"] {
            assert!(
                matches!(
                    NamingTemplate::parse(bad),
                    Err(ConfigError::TemplateSyntax { .. })
                ),
                "expected syntax error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_missing_field_is_substitution_error() {
        let table = TemplateTable::defaults().unwrap();
        let row = ConfigRow::from_pairs(2, [(SUBSCRIPTION, "acme"), (SERVICE, "web"), (APP, " ")]);

        match table.resolve(ResourceType::AppService, &row) {
            Err(ConfigError::TemplateSubstitution {
                resource_type,
                field,
            }) => {
                assert_eq!(resource_type, "app_service");
                assert_eq!(field, "App");
            }
            other => panic!("Expected TemplateSubstitution, got {:?}", other),
        }
    }

    #[test]
    fn test_override_wins_over_default() {
        let table = TemplateTable::with_overrides(&pairs(&[
            ("Resource Type", "Template"),
            ("key_vault", "kv-{Service}"),
            ("Storage Account", "{Service}store"),
        ]))
        .unwrap();

        let row = ConfigRow::from_pairs(2, [(SUBSCRIPTION, "acme"), (SERVICE, "web")]);
        assert_eq!(table.resolve(ResourceType::KeyVault, &row).unwrap(), "kv-web");
        assert_eq!(
            table.resolve(ResourceType::StorageAccount, &row).unwrap(),
            "webstore"
        );
        assert_eq!(
            table.resolve(ResourceType::AppServicePlan, &row).unwrap(),
            "web"
        );
    }

    #[test]
    fn test_header_only_skipped_on_first_row() {
        let result = TemplateTable::with_overrides(&pairs(&[
            ("key_vault", "kv-{Service}"),
            ("Resource Type", "Template"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::UnknownResourceType(name)) if name == "Resource Type"
        ));
    }

    #[test]
    fn test_later_override_wins() {
        let table = TemplateTable::with_overrides(&pairs(&[
            ("key_vault", "first-{Service}"),
            ("key_vault", "second-{Service}"),
        ]))
        .unwrap();
        assert_eq!(table.get(ResourceType::KeyVault).source(), "second-{Service}");
    }

    #[test]
    fn test_unknown_override_type() {
        let result = TemplateTable::with_overrides(&pairs(&[("cosmos_db", "{Service}")]));
        assert!(matches!(result, Err(ConfigError::UnknownResourceType(name)) if name == "cosmos_db"));
    }

    #[test]
    fn test_check_fields_against_columns() {
        let table = TemplateTable::defaults().unwrap();
        let available: BTreeSet<String> = ["Subscription", "Service", "Resource Group"]
            .into_iter()
            .map(String::from)
            .collect();

        assert!(
            table
                .check_fields(
                    &[ResourceType::KeyVault, ResourceType::ResourceGroup],
                    &available
                )
                .is_ok()
        );
        assert!(matches!(
            table.check_fields(&[ResourceType::AppService], &available),
            Err(ConfigError::TemplateSubstitution { field, .. }) if field == "App"
        ));
    }

    proptest! {
        #[test]
        fn prop_builtin_templates_yield_valid_names(
            subscription in "[a-z][a-z0-9]{1,7}",
            service in "[a-z][a-z0-9]{1,7}",
            app in "[a-z][a-z0-9]{1,7}",
            group in "[a-z][a-z0-9-]{0,10}[a-z0-9]",
        ) {
            let table = TemplateTable::defaults().unwrap();
            let row = ConfigRow::from_pairs(2, [
                (SUBSCRIPTION, subscription.as_str()),
                (SERVICE, service.as_str()),
                (APP, app.as_str()),
                (RESOURCE_GROUP, group.as_str()),
            ]);

            for t in ResourceType::ALL {
                let name = table.resolve(t, &row).unwrap();
                prop_assert_eq!(&name, &name.to_lowercase());
                prop_assert!(t.check_name(&name).is_ok(), "{} produced invalid name {}", t, name);
            }
        }
    }
}
