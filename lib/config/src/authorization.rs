use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sentinel accepted wherever a role list is expected. It stands for "no restriction".
pub const ALL_ROLES: &str = "ALL";

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// The closed set of roles a principal may carry.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Roles that pass every role and scope check.
    ///
    /// Listing more than one role is supported, for setups where several roles
    /// share the highest privilege tier.
    #[serde(default)]
    pub super_roles: Vec<String>,
    /// Roles that skip scope checks once the role check passed.
    /// `ALL` stands for the wildcard requirement.
    ///
    /// Defaults to `ALL` plus every super role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exempt_roles: Option<Vec<String>>,
    /// The rule passed to the access policy when a scope does not declare one.
    #[serde(default = "default_rule")]
    pub default_rule: String,
    /// Entity kinds that may be used as scope targets.
    #[serde(default)]
    pub scope_targets: Vec<String>,
    /// Field of the parent object compared against the principal's identity
    /// when a private field does not declare its own owner field.
    #[serde(default = "default_owner_field")]
    pub default_owner_field: String,
    #[serde(default)]
    pub unauthorized: UnauthorizedConfig,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            roles: vec![],
            super_roles: vec![],
            exempt_roles: None,
            default_rule: default_rule(),
            scope_targets: vec![],
            default_owner_field: default_owner_field(),
            unauthorized: Default::default(),
        }
    }
}

impl AuthorizationConfig {
    /// Exempt roles as configured, or `ALL` plus the super roles.
    pub fn effective_exempt_roles(&self) -> Vec<String> {
        match &self.exempt_roles {
            Some(roles) => roles.clone(),
            None => std::iter::once(ALL_ROLES.to_string())
                .chain(self.super_roles.iter().cloned())
                .collect(),
        }
    }
}

#[derive(Default, Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct UnauthorizedConfig {
    #[serde(default)]
    pub mode: UnauthorizedMode,
    #[serde(default)]
    pub messages: UnauthorizedMessages,
}

#[derive(
    Debug,
    Default,
    Deserialize,
    Serialize,
    JsonSchema,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UnauthorizedMode {
    /// Denied nodes are replaced with an error, the rest of the result is kept.
    #[default]
    Filter,
    /// Any denied node discards the whole result.
    Reject,
}

impl UnauthorizedMode {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Message templates for user-facing denials.
///
/// `{type}` is replaced with the human readable type name (lower-cased,
/// underscores replaced with spaces), `{field}` with the field name.
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UnauthorizedMessages {
    #[serde(default = "default_role_message")]
    pub role: String,
    #[serde(default = "default_query_message")]
    pub query: String,
    #[serde(default = "default_object_message")]
    pub object: String,
    #[serde(default = "default_field_message")]
    pub field: String,
}

impl Default for UnauthorizedMessages {
    fn default() -> Self {
        Self {
            role: default_role_message(),
            query: default_query_message(),
            object: default_object_message(),
            field: default_field_message(),
        }
    }
}

fn default_rule() -> String {
    "default".to_string()
}

fn default_owner_field() -> String {
    "user_id".to_string()
}

fn default_role_message() -> String {
    "unauthorized".to_string()
}

fn default_query_message() -> String {
    "Not authorized to access this {type}".to_string()
}

fn default_object_message() -> String {
    "Not authorized to access object {type}".to_string()
}

fn default_field_message() -> String {
    "Not authorized to access field {field}".to_string()
}
