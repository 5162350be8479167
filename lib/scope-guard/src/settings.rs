use scope_guard_config::authorization::{
    AuthorizationConfig, UnauthorizedMessages, UnauthorizedMode,
};

use crate::{
    error::ConfigurationError,
    role::RoleRegistry,
    scope::{Rule, ScopeTargetRegistry},
};

/// Immutable engine settings, built once at startup from the configuration
/// record and shared by every component.
#[derive(Debug)]
pub struct AuthorizationSettings {
    pub roles: RoleRegistry,
    pub scope_targets: ScopeTargetRegistry,
    pub default_rule: Rule,
    pub default_owner_field: String,
    pub mode: UnauthorizedMode,
    pub messages: UnauthorizedMessages,
}

impl AuthorizationSettings {
    pub fn from_config(config: &AuthorizationConfig) -> Result<Self, ConfigurationError> {
        let roles = RoleRegistry::new(
            &config.roles,
            &config.super_roles,
            &config.effective_exempt_roles(),
        )?;

        Ok(Self {
            roles,
            scope_targets: ScopeTargetRegistry::new(config.scope_targets.iter().cloned()),
            default_rule: Rule::new(config.default_rule.clone()),
            default_owner_field: config.default_owner_field.clone(),
            mode: config.unauthorized.mode,
            messages: config.unauthorized.messages.clone(),
        })
    }
}

/// Where a denial happened, used to render its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial<'a> {
    /// A root field failed its role check.
    Role { field_name: &'a str },
    /// A root field failed its scope check; `type_name` is its return type.
    QueryScope { type_name: &'a str },
    /// An object in the result tree failed its role or scope check.
    Object { type_name: &'a str },
    /// A private field was hidden from a non-owner.
    Field {
        type_name: &'a str,
        field_name: &'a str,
    },
}

impl Denial<'_> {
    pub fn render(&self, messages: &UnauthorizedMessages) -> String {
        match self {
            Denial::Role { field_name } => fill(&messages.role, "", field_name),
            Denial::QueryScope { type_name } => fill(&messages.query, type_name, ""),
            Denial::Object { type_name } => fill(&messages.object, type_name, ""),
            Denial::Field {
                type_name,
                field_name,
            } => fill(&messages.field, type_name, field_name),
        }
    }
}

fn fill(template: &str, type_name: &str, field_name: &str) -> String {
    template
        .replace("{type}", &humanize(type_name))
        .replace("{field}", &humanize(field_name))
}

/// `WalletItem` and `wallet_item` both become `wallet item`.
pub fn humanize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;

    for ch in name.chars() {
        if ch == '_' {
            if !out.ends_with(' ') && !out.is_empty() {
                out.push(' ');
            }
        } else if ch.is_uppercase() {
            if previous.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                out.push(' ');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
        previous = Some(ch);
    }

    out
}
