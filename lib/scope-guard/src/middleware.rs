//! The seam to the host engine's per-field middleware lists.

use std::{marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    authorizer::Authorizer,
    context::RequestContext,
    error::{AuthorizationError, ConfigurationError},
    field_gate::FieldGate,
    graphql_error::{GraphQLError, GraphQLErrorLocation, GraphQLErrorPathSegment},
    metadata::{FieldAuthorization, QueryAuthorization},
    policy::AccessPolicy,
    query_gate::{QueryGate, QueryOutcome},
    settings::AuthorizationSettings,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionState {
    Unresolved,
    Resolved(Value),
    /// The field resolves to `null` with these errors.
    Errored(Vec<GraphQLError>),
}

/// A field being resolved, passed through its middleware list.
pub struct Resolution {
    pub context: Arc<RequestContext>,
    pub parent_type: String,
    pub field_name: String,
    /// Named return type of the field.
    pub return_type: String,
    pub arguments: Value,
    /// The resolved parent object, `null` for root fields.
    pub source: Value,
    pub path: Vec<GraphQLErrorPathSegment>,
    pub location: Option<GraphQLErrorLocation>,
    pub state: ResolutionState,
}

impl Resolution {
    pub fn new(
        context: Arc<RequestContext>,
        parent_type: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        let field_name = field_name.into();
        Self {
            context,
            parent_type: parent_type.into(),
            path: vec![GraphQLErrorPathSegment::String(field_name.clone())],
            field_name,
            return_type: String::new(),
            arguments: Value::Object(Default::default()),
            source: Value::Null,
            location: None,
            state: ResolutionState::Unresolved,
        }
    }

    pub fn returns(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = return_type.into();
        self
    }

    pub fn arguments(mut self, arguments: Value) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn source(mut self, source: Value) -> Self {
        self.source = source;
        self
    }

    pub fn path(mut self, path: Vec<GraphQLErrorPathSegment>) -> Self {
        self.path = path;
        self
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.location = Some(GraphQLErrorLocation { line, column });
        self
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.state {
            ResolutionState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn errors(&self) -> &[GraphQLError] {
        match &self.state {
            ResolutionState::Errored(errors) => errors,
            _ => &[],
        }
    }

    fn fail(&mut self, error: AuthorizationError) {
        let error = error.at(self.path.clone(), self.location);
        self.state = ResolutionState::Errored(vec![error.into()]);
    }
}

/// One stage of a field's middleware list. The resolver itself is a stage too.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn call(&self, resolution: &mut Resolution) -> Result<(), ConfigurationError>;
}

/// Runs `chain` in order. Stages after the first error are skipped.
pub async fn run_middleware(
    chain: &[Arc<dyn Middleware>],
    resolution: &mut Resolution,
) -> Result<(), ConfigurationError> {
    for stage in chain {
        if matches!(resolution.state, ResolutionState::Errored(_)) {
            break;
        }
        stage.call(resolution).await?;
    }

    Ok(())
}

/// Adapts a plain resolver function into a middleware stage.
pub struct FnResolver<F>(F);

pub fn resolver<F>(resolve: F) -> Arc<dyn Middleware>
where
    F: Fn(&Resolution) -> Result<Value, GraphQLError> + Send + Sync + 'static,
{
    Arc::new(FnResolver(resolve))
}

#[async_trait]
impl<F> Middleware for FnResolver<F>
where
    F: Fn(&Resolution) -> Result<Value, GraphQLError> + Send + Sync + 'static,
{
    async fn call(&self, resolution: &mut Resolution) -> Result<(), ConfigurationError> {
        resolution.state = match (self.0)(resolution) {
            Ok(value) => ResolutionState::Resolved(value),
            Err(error) => ResolutionState::Errored(vec![error]),
        };
        Ok(())
    }
}

/// Prepended to root fields. A denial stops the field before it resolves.
pub struct QueryGateMiddleware<P> {
    settings: Arc<AuthorizationSettings>,
    rules: Arc<QueryAuthorization>,
    _policy: PhantomData<fn() -> P>,
}

impl<P: AccessPolicy> QueryGateMiddleware<P> {
    pub fn new(settings: Arc<AuthorizationSettings>, rules: Arc<QueryAuthorization>) -> Self {
        Self {
            settings,
            rules,
            _policy: PhantomData,
        }
    }
}

#[async_trait]
impl<P: AccessPolicy> Middleware for QueryGateMiddleware<P> {
    async fn call(&self, resolution: &mut Resolution) -> Result<(), ConfigurationError> {
        let authorizer = Authorizer::<P>::from_context(&self.settings, &resolution.context)?;
        let outcome = QueryGate::new(
            &authorizer,
            &self.rules,
            &resolution.parent_type,
            &resolution.field_name,
        )
        .run(&resolution.arguments)
        .await?;

        if let QueryOutcome::Denied(error) = outcome {
            resolution.fail(error);
        }

        Ok(())
    }
}

/// Appended to private fields, runs on the resolved value.
pub struct FieldGateMiddleware<P> {
    settings: Arc<AuthorizationSettings>,
    rules: Arc<FieldAuthorization>,
    _policy: PhantomData<fn() -> P>,
}

impl<P: AccessPolicy> FieldGateMiddleware<P> {
    pub fn new(settings: Arc<AuthorizationSettings>, rules: Arc<FieldAuthorization>) -> Self {
        Self {
            settings,
            rules,
            _policy: PhantomData,
        }
    }
}

#[async_trait]
impl<P: AccessPolicy> Middleware for FieldGateMiddleware<P> {
    async fn call(&self, resolution: &mut Resolution) -> Result<(), ConfigurationError> {
        if !matches!(resolution.state, ResolutionState::Resolved(_)) {
            return Ok(());
        }

        let authorizer = Authorizer::<P>::from_context(&self.settings, &resolution.context)?;
        let denial = FieldGate::new(&authorizer)
            .check(
                &self.rules,
                &resolution.parent_type,
                &resolution.field_name,
                &resolution.source,
            )
            .await;

        if let Some(error) = denial {
            resolution.fail(error);
        }

        Ok(())
    }
}
