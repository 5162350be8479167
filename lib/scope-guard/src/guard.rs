use std::{marker::PhantomData, sync::Arc};

use scope_guard_config::authorization::{AuthorizationConfig, UnauthorizedMode};
use scope_guard_internal::telemetry::spans::{AuthorizationOutcome, AuthorizeSpan};
use serde_json::{json, Value};
use tracing::Instrument;

use crate::{
    authorizer::Authorizer,
    context::RequestContext,
    error::ConfigurationError,
    graphql_error::GraphQLError,
    metadata::{schema::SchemaDefinition, SchemaAuthorization},
    middleware::{FieldGateMiddleware, Middleware, QueryGateMiddleware},
    policy::AccessPolicy,
    query_gate::{QueryGate, QueryOutcome},
    settings::AuthorizationSettings,
    tree::ResultTree,
    walker::ObjectTreeWalker,
};

/// The result of authorizing a resolved result tree.
#[derive(Debug)]
pub enum AuthorizationDecision {
    /// Every node is authorized. Continue with the original tree.
    NoChange,
    /// Denied nodes were replaced with errors. Continue with the new tree.
    Modified {
        tree: ResultTree,
        errors: Vec<GraphQLError>,
    },
    /// The whole result must be discarded, reject mode is enabled.
    Reject { errors: Vec<GraphQLError> },
}

impl AuthorizationDecision {
    pub fn errors(&self) -> &[GraphQLError] {
        match self {
            AuthorizationDecision::NoChange => &[],
            AuthorizationDecision::Modified { errors, .. } => errors,
            AuthorizationDecision::Reject { errors } => errors,
        }
    }

    /// Renders the final `{ data, errors }` response.
    pub fn into_response(self, original: &ResultTree) -> Value {
        match self {
            AuthorizationDecision::NoChange => original.to_response(),
            AuthorizationDecision::Modified { tree, .. } => tree.to_response(),
            AuthorizationDecision::Reject { errors } => json!({
                "data": null,
                "errors": serde_json::to_value(errors).unwrap_or(Value::Null),
            }),
        }
    }
}

/// Entry point of the engine, built once per schema.
///
/// `P` is the embedding application's policy type, looked up in the
/// [`RequestContext`] of every request.
pub struct ScopeGuard<P: AccessPolicy> {
    settings: Arc<AuthorizationSettings>,
    schema: Arc<SchemaAuthorization>,
    _policy: PhantomData<fn() -> P>,
}

impl<P: AccessPolicy> Clone for ScopeGuard<P> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            schema: self.schema.clone(),
            _policy: PhantomData,
        }
    }
}

impl<P: AccessPolicy> ScopeGuard<P> {
    /// Validates the configuration and compiles the schema metadata.
    /// Every configuration mistake that does not depend on request data
    /// is reported here.
    pub fn new(
        config: &AuthorizationConfig,
        schema: &SchemaDefinition,
    ) -> Result<Self, ConfigurationError> {
        let settings = AuthorizationSettings::from_config(config)
            .and_then(|settings| {
                let compiled = SchemaAuthorization::build(schema, &settings)?;
                Ok((settings, compiled))
            })
            .inspect_err(|error| tracing::error!("invalid authorization setup: {}", error));
        let (settings, compiled) = settings?;

        Ok(Self {
            settings: Arc::new(settings),
            schema: Arc::new(compiled),
            _policy: PhantomData,
        })
    }

    /// The compiled metadata, e.g. to check which fields carry rules.
    pub fn metadata(&self) -> &SchemaAuthorization {
        &self.schema
    }

    /// Wraps a field's middleware list. Root fields get the query gate in
    /// front, private fields get the field gate after the resolver.
    pub fn middleware(
        &self,
        parent_type: &str,
        field_name: &str,
        mut existing: Vec<Arc<dyn Middleware>>,
    ) -> Vec<Arc<dyn Middleware>> {
        if let Some(rules) = self.schema.query(parent_type, field_name) {
            existing.insert(
                0,
                Arc::new(QueryGateMiddleware::<P>::new(
                    self.settings.clone(),
                    rules.clone(),
                )),
            );
        } else if let Some(rules) = self.schema.field(parent_type, field_name) {
            existing.push(Arc::new(FieldGateMiddleware::<P>::new(
                self.settings.clone(),
                rules.clone(),
            )));
        }

        existing
    }

    /// Runs the query gate of a root field outside of a middleware list.
    pub async fn check_query(
        &self,
        context: &RequestContext,
        parent_type: &str,
        field_name: &str,
        arguments: &Value,
    ) -> Result<QueryOutcome, ConfigurationError> {
        let rules =
            self.schema
                .query(parent_type, field_name)
                .ok_or_else(|| ConfigurationError::UnknownField {
                    type_name: parent_type.to_string(),
                    field: field_name.to_string(),
                })?;
        let authorizer = Authorizer::<P>::from_context(&self.settings, context)?;

        QueryGate::new(&authorizer, rules, parent_type, field_name)
            .run(arguments)
            .await
    }

    /// Walks a resolved result tree, pruning every object and private field
    /// the current principal may not see.
    pub async fn authorize_result(
        &self,
        context: &RequestContext,
        tree: &ResultTree,
    ) -> Result<AuthorizationDecision, ConfigurationError> {
        let span = AuthorizeSpan::new();

        async {
            let decision = self.decide(context, tree).await;
            match &decision {
                Ok(AuthorizationDecision::NoChange) => {
                    span.record_outcome(AuthorizationOutcome::Allowed, 0)
                }
                Ok(decision) => {
                    span.record_outcome(AuthorizationOutcome::Denied, decision.errors().len())
                }
                Err(_) => span.record_outcome(AuthorizationOutcome::Misconfigured, 0),
            }
            decision
        }
        .instrument(span.span.clone())
        .await
    }

    async fn decide(
        &self,
        context: &RequestContext,
        tree: &ResultTree,
    ) -> Result<AuthorizationDecision, ConfigurationError> {
        let authorizer = Authorizer::<P>::from_context(&self.settings, context)?;
        let (authorized, errors) = ObjectTreeWalker::new(&authorizer, &self.schema)
            .walk(tree)
            .await?;

        if errors.is_empty() {
            return Ok(AuthorizationDecision::NoChange);
        }

        if self.settings.mode == UnauthorizedMode::Reject {
            tracing::debug!(
                denied = errors.len(),
                "result rejected due to unauthorized nodes and reject mode being set"
            );
            return Ok(AuthorizationDecision::Reject { errors });
        }

        Ok(AuthorizationDecision::Modified {
            tree: authorized,
            errors,
        })
    }
}
