use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Kinds of Azure resource SheetFlow knows how to name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    AppServicePlan,
    StorageAccount,
    FileShare,
    AppInsights,
    KeyVault,
    AppService,
    ResourceGroup,
    DatabaseServer,
    ManagedIdentity,
    Database,
}

impl ResourceType {
    pub const ALL: [ResourceType; 10] = [
        ResourceType::AppServicePlan,
        ResourceType::StorageAccount,
        ResourceType::FileShare,
        ResourceType::AppInsights,
        ResourceType::KeyVault,
        ResourceType::AppService,
        ResourceType::ResourceGroup,
        ResourceType::DatabaseServer,
        ResourceType::ManagedIdentity,
        ResourceType::Database,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::AppServicePlan => "app_service_plan",
            ResourceType::StorageAccount => "storage_account",
            ResourceType::FileShare => "file_share",
            ResourceType::AppInsights => "app_insights",
            ResourceType::KeyVault => "key_vault",
            ResourceType::AppService => "app_service",
            ResourceType::ResourceGroup => "resource_group",
            ResourceType::DatabaseServer => "database_server",
            ResourceType::ManagedIdentity => "managed_identity",
            ResourceType::Database => "database",
        }
    }

    /// Parse a name such as `key_vault`, `Key Vault` or `key-vault`
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }

    /// Built-in naming template
    pub fn default_template(&self) -> &'static str {
        match self {
            ResourceType::AppServicePlan => "{Service}",
            ResourceType::StorageAccount => "{Subscription}{Service}",
            ResourceType::FileShare => "files",
            ResourceType::AppInsights => "{Service}",
            ResourceType::KeyVault => "{Subscription}-{Service}",
            ResourceType::AppService => "{Subscription}-{Service}-{App}",
            ResourceType::ResourceGroup => "{Resource Group}",
            ResourceType::DatabaseServer => "{Subscription}-{Service}",
            ResourceType::ManagedIdentity => "{Subscription}{Service}",
            ResourceType::Database => "{App}",
        }
    }

    /// Check `name` against Azure's naming rules for this resource type
    pub fn check_name(&self, name: &str) -> Result<()> {
        self.rule()
            .check(name)
            .map_err(|reason| ConfigError::InvalidResourceName {
                resource_type: self.to_string(),
                name: name.to_string(),
                reason,
            })
    }

    fn rule(&self) -> NameRule {
        match self {
            ResourceType::AppServicePlan => NameRule::new(1, 60, Charset::AlnumHyphen),
            ResourceType::StorageAccount => NameRule::new(3, 24, Charset::LowerAlnum),
            ResourceType::FileShare => NameRule::new(3, 63, Charset::LowerAlnumHyphen)
                .alnum_edges()
                .no_double_hyphen(),
            ResourceType::AppInsights => NameRule::new(1, 260, Charset::Extended).no_trailing_dot(),
            ResourceType::KeyVault => NameRule::new(3, 24, Charset::AlnumHyphen)
                .starts_with_letter()
                .alnum_edges()
                .no_double_hyphen(),
            ResourceType::AppService => NameRule::new(2, 60, Charset::AlnumHyphen).alnum_edges(),
            ResourceType::ResourceGroup => {
                NameRule::new(1, 90, Charset::Extended).no_trailing_dot()
            }
            ResourceType::DatabaseServer => {
                NameRule::new(3, 63, Charset::LowerAlnumHyphen).alnum_edges()
            }
            ResourceType::ManagedIdentity => {
                NameRule::new(3, 128, Charset::AlnumHyphenUnderscore).alnum_edges()
            }
            ResourceType::Database => NameRule::new(1, 128, Charset::Database).no_trailing_dot(),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum Charset {
    LowerAlnum,
    LowerAlnumHyphen,
    AlnumHyphen,
    AlnumHyphenUnderscore,
    /// alphanumerics plus `-_.()`
    Extended,
    /// anything printable except `<>*%&:\/?`
    Database,
}

impl Charset {
    fn allows(self, c: char) -> bool {
        match self {
            Charset::LowerAlnum => c.is_ascii_lowercase() || c.is_ascii_digit(),
            Charset::LowerAlnumHyphen => c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-',
            Charset::AlnumHyphen => c.is_ascii_alphanumeric() || c == '-',
            Charset::AlnumHyphenUnderscore => c.is_ascii_alphanumeric() || c == '-' || c == '_',
            Charset::Extended => c.is_ascii_alphanumeric() || "-_.()".contains(c),
            Charset::Database => !c.is_control() && !"<>*%&:\\/?".contains(c),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Charset::LowerAlnum => "lower-case letters and digits",
            Charset::LowerAlnumHyphen => "lower-case letters, digits and hyphens",
            Charset::AlnumHyphen => "letters, digits and hyphens",
            Charset::AlnumHyphenUnderscore => "letters, digits, hyphens and underscores",
            Charset::Extended => "letters, digits and -_.()",
            Charset::Database => r"characters other than <>*%&:\/?",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct NameRule {
    min: usize,
    max: usize,
    charset: Charset,
    starts_with_letter: bool,
    alnum_edges: bool,
    no_double_hyphen: bool,
    no_trailing_dot: bool,
}

impl NameRule {
    fn new(min: usize, max: usize, charset: Charset) -> Self {
        Self {
            min,
            max,
            charset,
            starts_with_letter: false,
            alnum_edges: false,
            no_double_hyphen: false,
            no_trailing_dot: false,
        }
    }

    fn starts_with_letter(mut self) -> Self {
        self.starts_with_letter = true;
        self
    }

    fn alnum_edges(mut self) -> Self {
        self.alnum_edges = true;
        self
    }

    fn no_double_hyphen(mut self) -> Self {
        self.no_double_hyphen = true;
        self
    }

    fn no_trailing_dot(mut self) -> Self {
        self.no_trailing_dot = true;
        self
    }

    fn check(&self, name: &str) -> std::result::Result<(), String> {
        let len = name.chars().count();
        if len < self.min || len > self.max {
            return Err(format!(
                "length must be between {} and {} characters, got {}",
                self.min, self.max, len
            ));
        }

        if let Some(c) = name.chars().find(|c| !self.charset.allows(*c)) {
            return Err(format!(
                "'{}' is not allowed, use only {}",
                c,
                self.charset.describe()
            ));
        }

        // len >= 1 at this point
        let first = name.chars().next().unwrap_or_default();
        let last = name.chars().last().unwrap_or_default();

        if self.starts_with_letter && !first.is_ascii_alphabetic() {
            return Err("must start with a letter".to_string());
        }
        if self.alnum_edges && !(first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric()) {
            return Err("must start and end with a letter or digit".to_string());
        }
        if self.no_double_hyphen && name.contains("--") {
            return Err("must not contain consecutive hyphens".to_string());
        }
        if self.no_trailing_dot && last == '.' {
            return Err("must not end with a period".to_string());
        }

        Ok(())
    }
}
