use std::sync::Arc;

use serde_json::Value;

use crate::{
    arguments::ScopeValue,
    context::RequestContext,
    error::{AuthorizationError, ConfigurationError},
    policy::AccessPolicy,
    role::{PermissionRequirement, RoleId},
    scope::{Rule, ScopeEvaluator, ScopeTarget},
    settings::{AuthorizationSettings, Denial},
};

/// The principal and policy of one request, bound to the engine settings.
/// Shared by the query gate, the tree walker and the field gate.
pub struct Authorizer<'a, P: AccessPolicy> {
    pub settings: &'a AuthorizationSettings,
    pub policy: Arc<P>,
    pub principal: Option<Arc<P::Principal>>,
    pub role: Option<RoleId>,
}

impl<'a, P: AccessPolicy> Authorizer<'a, P> {
    pub fn from_context(
        settings: &'a AuthorizationSettings,
        context: &RequestContext,
    ) -> Result<Self, ConfigurationError> {
        let policy = context.get::<P>().ok_or_else(|| {
            tracing::error!("access policy is missing from the request context");
            ConfigurationError::PolicyNotRegistered
        })?;
        let principal = policy.current_principal(context);
        let role = principal
            .as_deref()
            .and_then(|principal| policy.role_of(principal))
            .and_then(|role| settings.roles.role_id(role));

        Ok(Self {
            settings,
            policy,
            principal,
            role,
        })
    }

    pub fn role_name(&self) -> Option<&str> {
        self.role.map(|role| self.settings.roles.role_name(role))
    }

    pub fn role_authorized(&self, requirement: &PermissionRequirement) -> bool {
        self.policy
            .authorized(&self.settings.roles, self.role, requirement)
    }

    /// Whether scope checks are skipped for this principal under `requirement`.
    pub fn exempt(&self, requirement: Option<&PermissionRequirement>) -> bool {
        self.policy
            .exempt_roles(&self.settings.roles)
            .covers(self.role, requirement)
    }

    pub fn is_super(&self) -> bool {
        self.settings.roles.is_super(self.role)
    }

    /// A scope check without a principal is a refusal.
    pub async fn scope(
        &self,
        target: &ScopeTarget,
        rule: Option<&Rule>,
        value: &ScopeValue,
    ) -> bool {
        let Some(principal) = self.principal.as_deref() else {
            tracing::debug!(scope_target = %target, "no principal for a scope check");
            return false;
        };

        let rule = rule.unwrap_or(&self.settings.default_rule);
        ScopeEvaluator::new(self.policy.as_ref(), principal)
            .check(target, rule, value)
            .await
    }

    pub fn is_owner(&self, source: &Value, owner_field: &str) -> bool {
        self.principal
            .as_deref()
            .is_some_and(|principal| self.policy.is_owner(principal, source, owner_field))
    }

    pub fn deny(&self, denial: Denial<'_>, code: &'static str) -> AuthorizationError {
        let message = self
            .policy
            .unauthorized_message(&denial, &self.settings.messages);
        AuthorizationError::new(message, code)
    }
}
