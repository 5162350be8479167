//! Role-then-scope check of a single root field, run before it resolves.

use scope_guard_internal::telemetry::spans::{AuthorizationOutcome, QueryGateSpan};
use serde_json::Value;
use tracing::Instrument;

use crate::{
    arguments::{extract, NonScalarLeaf},
    authorizer::Authorizer,
    error::{AuthorizationError, ConfigurationError, UNAUTHORIZED_CODE},
    metadata::QueryAuthorization,
    policy::AccessPolicy,
    settings::Denial,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Both checks passed, or the scope was optional and its argument absent.
    Authorized,
    /// The role check passed and the principal skips scope checks.
    Exempt,
    /// The field must not resolve.
    Denied(AuthorizationError),
}

impl QueryOutcome {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, QueryOutcome::Denied(_))
    }
}

enum GateState {
    Start,
    RoleChecked,
    ScopeChecked,
    Denied(AuthorizationError),
    Resolved,
}

pub struct QueryGate<'a, P: AccessPolicy> {
    authorizer: &'a Authorizer<'a, P>,
    rules: &'a QueryAuthorization,
    parent_type: &'a str,
    field_name: &'a str,
}

impl<'a, P: AccessPolicy> QueryGate<'a, P> {
    pub fn new(
        authorizer: &'a Authorizer<'a, P>,
        rules: &'a QueryAuthorization,
        parent_type: &'a str,
        field_name: &'a str,
    ) -> Self {
        Self {
            authorizer,
            rules,
            parent_type,
            field_name,
        }
    }

    pub async fn run(&self, arguments: &Value) -> Result<QueryOutcome, ConfigurationError> {
        let span = QueryGateSpan::new(self.parent_type, self.field_name);

        async {
            let outcome = self.transition(arguments).await;
            span.record_outcome(match &outcome {
                Ok(QueryOutcome::Authorized) => AuthorizationOutcome::Allowed,
                Ok(QueryOutcome::Exempt) => AuthorizationOutcome::Exempt,
                Ok(QueryOutcome::Denied(_)) => AuthorizationOutcome::Denied,
                Err(_) => AuthorizationOutcome::Misconfigured,
            });
            outcome
        }
        .instrument(span.span.clone())
        .await
    }

    async fn transition(&self, arguments: &Value) -> Result<QueryOutcome, ConfigurationError> {
        let mut state = GateState::Start;

        loop {
            state = match state {
                GateState::Start => {
                    if self.authorizer.role_authorized(&self.rules.requirement) {
                        GateState::RoleChecked
                    } else {
                        tracing::debug!(
                            field = self.field_name,
                            role = self.authorizer.role_name(),
                            "role check failed"
                        );
                        GateState::Denied(self.authorizer.deny(
                            Denial::Role {
                                field_name: self.field_name,
                            },
                            UNAUTHORIZED_CODE,
                        ))
                    }
                }
                GateState::RoleChecked => {
                    if self.rules.scope.is_none() {
                        GateState::Resolved
                    } else if self.authorizer.exempt(Some(&self.rules.requirement)) {
                        tracing::trace!(field = self.field_name, "scope check skipped, exempt");
                        return Ok(QueryOutcome::Exempt);
                    } else if self.check_scope(arguments).await? {
                        GateState::ScopeChecked
                    } else {
                        GateState::Denied(self.authorizer.deny(
                            Denial::QueryScope {
                                type_name: &self.rules.return_type,
                            },
                            UNAUTHORIZED_CODE,
                        ))
                    }
                }
                GateState::ScopeChecked => GateState::Resolved,
                GateState::Resolved => return Ok(QueryOutcome::Authorized),
                GateState::Denied(error) => return Ok(QueryOutcome::Denied(error)),
            };
        }
    }

    async fn check_scope(&self, arguments: &Value) -> Result<bool, ConfigurationError> {
        let Some(scope) = &self.rules.scope else {
            return Ok(true);
        };

        let value = match extract(arguments, &scope.argument) {
            Ok(Some(value)) => value,
            Ok(None) if scope.optional => {
                tracing::trace!(
                    field = self.field_name,
                    path = %scope.argument,
                    "optional scope argument absent"
                );
                return Ok(true);
            }
            Ok(None) => {
                let error = ConfigurationError::MissingArgument {
                    path: scope.argument.to_string(),
                    input: arguments.to_string(),
                };
                tracing::error!(field = self.field_name, "{}", error);
                return Err(error);
            }
            Err(NonScalarLeaf { path }) => {
                let error = ConfigurationError::NonScalarArgument {
                    path,
                    site: format!("{}.{}", self.parent_type, self.field_name),
                };
                tracing::error!("{}", error);
                return Err(error);
            }
        };

        let allowed = self
            .authorizer
            .scope(&scope.target, scope.rule.as_ref(), &value)
            .await;
        if !allowed {
            tracing::debug!(
                field = self.field_name,
                scope_target = %scope.target,
                "scope check failed"
            );
        }

        Ok(allowed)
    }
}
