use scope_guard_internal::telemetry::spans::{AuthorizationOutcome, FieldGateSpan};
use serde_json::Value;
use tracing::Instrument;

use crate::{
    arguments::ScopeValue,
    authorizer::Authorizer,
    error::{AuthorizationError, UNAUTHORIZED_FIELD_CODE},
    metadata::{FieldAuthorization, FieldOwnership},
    policy::AccessPolicy,
    settings::Denial,
};

/// Hides private fields from principals that do not own the parent object.
pub struct FieldGate<'a, P: AccessPolicy> {
    authorizer: &'a Authorizer<'a, P>,
}

impl<'a, P: AccessPolicy> FieldGate<'a, P> {
    pub fn new(authorizer: &'a Authorizer<'a, P>) -> Self {
        Self { authorizer }
    }

    /// `source` is the resolved parent object. Returns the error replacing
    /// the field's value when it must be hidden.
    pub async fn check(
        &self,
        rules: &FieldAuthorization,
        type_name: &str,
        field_name: &str,
        source: &Value,
    ) -> Option<AuthorizationError> {
        if !rules.privacy.is_private(source) {
            return None;
        }

        let span = FieldGateSpan::new(type_name, field_name);
        async {
            if self.authorizer.is_super() {
                span.record_outcome(AuthorizationOutcome::Exempt);
                return None;
            }

            let visible = match &rules.ownership {
                FieldOwnership::OwnerField(owner_field) => {
                    self.authorizer.is_owner(source, owner_field)
                }
                FieldOwnership::Scope { target, rule } => {
                    self.authorizer
                        .scope(target, rule.as_ref(), &ScopeValue::Single(source.clone()))
                        .await
                }
            };

            if visible {
                span.record_outcome(AuthorizationOutcome::Allowed);
                return None;
            }

            tracing::debug!(
                parent_type = type_name,
                field = field_name,
                "private field hidden"
            );
            span.record_outcome(AuthorizationOutcome::Denied);
            Some(self.authorizer.deny(
                Denial::Field {
                    type_name,
                    field_name,
                },
                UNAUTHORIZED_FIELD_CODE,
            ))
        }
        .instrument(span.span.clone())
        .await
    }
}
