use std::{borrow::Cow, sync::Arc};

use async_trait::async_trait;
use scope_guard_config::authorization::UnauthorizedMessages;
use serde_json::Value;

use crate::{
    context::RequestContext,
    role::{ExemptRoles, PermissionRequirement, RoleId, RoleRegistry},
    scope::{Rule, ScopeTarget},
    settings::Denial,
};

/// What the engine needs to know about a principal.
pub trait Identity: Send + Sync + 'static {
    /// The principal's role name, `None` when it carries no role.
    fn role(&self) -> Option<&str>;

    /// Value compared against owner fields of private data.
    fn identity(&self) -> Value;
}

/// The embedding application's policy hooks.
///
/// Only [`AccessPolicy::current_principal`] and [`AccessPolicy::has_access`]
/// must be implemented, every other hook has a default that can be overridden.
/// The implementation is registered in the [`RequestContext`] before a request
/// runs and looked up by its type.
#[async_trait]
pub trait AccessPolicy: Send + Sync + 'static {
    type Principal: Identity;

    fn current_principal(&self, context: &RequestContext) -> Option<Arc<Self::Principal>>;

    /// Decides whether `principal` may access `value` of entity kind `target`
    /// under `rule`. `value` may be `null` (e.g. "no owner yet").
    ///
    /// `field` is the entry name when `args` was declared as a map
    /// (`{ owner: user_id, company: company_id }`), `None` otherwise.
    ///
    /// May perform I/O. Timeouts and retries are the implementation's concern.
    async fn has_access(
        &self,
        principal: &Self::Principal,
        target: &ScopeTarget,
        field: Option<&str>,
        value: &Value,
        rule: &Rule,
    ) -> bool;

    fn role_of<'p>(&self, principal: &'p Self::Principal) -> Option<&'p str> {
        principal.role()
    }

    /// Roles whose scope checks are skipped. Defaults to the configured set,
    /// a policy may return its own (see [`RoleRegistry::exempt_set`]).
    fn exempt_roles<'r>(&'r self, roles: &'r RoleRegistry) -> Cow<'r, ExemptRoles> {
        Cow::Borrowed(roles.exempt_roles())
    }

    fn authorized(
        &self,
        roles: &RoleRegistry,
        role: Option<RoleId>,
        requirement: &PermissionRequirement,
    ) -> bool {
        roles.authorized(role, requirement)
    }

    /// Ownership check used by private fields that name an owner field.
    fn is_owner(&self, principal: &Self::Principal, source: &Value, owner_field: &str) -> bool {
        source
            .get(owner_field)
            .is_some_and(|owner| !owner.is_null() && *owner == principal.identity())
    }

    fn unauthorized_message(&self, denial: &Denial<'_>, messages: &UnauthorizedMessages) -> String {
        denial.render(messages)
    }
}
