use tracing::{field::Empty, info_span, Span};

use crate::telemetry::{kind::GuardSpanKind, TARGET_NAME};

/// Outcome recorded on authorization spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AuthorizationOutcome {
    Allowed,
    Denied,
    Exempt,
    Misconfigured,
}

/// Wraps a full post-resolution walk of a result tree.
#[derive(Clone)]
pub struct AuthorizeSpan {
    pub span: Span,
}

impl std::ops::Deref for AuthorizeSpan {
    type Target = Span;
    fn deref(&self) -> &Self::Target {
        &self.span
    }
}

impl Default for AuthorizeSpan {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorizeSpan {
    pub fn new() -> Self {
        let kind: &'static str = GuardSpanKind::GraphqlAuthorize.into();
        let span = info_span!(
            target: TARGET_NAME,
            "GraphQL Result Authorization",
            "guard.kind" = kind,
            "otel.kind" = "Internal",
            "guard.outcome" = Empty,
            "guard.denied_count" = Empty,
        );
        AuthorizeSpan { span }
    }

    pub fn record_outcome(&self, outcome: AuthorizationOutcome, denied_count: usize) {
        let outcome: &'static str = outcome.into();
        self.span.record("guard.outcome", outcome);
        self.span.record("guard.denied_count", denied_count);
    }
}

/// Wraps the role-then-scope gate of one root field.
#[derive(Clone)]
pub struct QueryGateSpan {
    pub span: Span,
}

impl std::ops::Deref for QueryGateSpan {
    type Target = Span;
    fn deref(&self) -> &Self::Target {
        &self.span
    }
}

impl QueryGateSpan {
    pub fn new(parent_type: &str, field_name: &str) -> Self {
        let kind: &'static str = GuardSpanKind::GraphqlAuthorizeQuery.into();
        let span = info_span!(
            target: TARGET_NAME,
            "GraphQL Query Gate",
            "guard.kind" = kind,
            "otel.kind" = "Internal",
            "graphql.parent_type" = parent_type,
            "graphql.field.name" = field_name,
            "guard.outcome" = Empty,
        );
        QueryGateSpan { span }
    }

    pub fn record_outcome(&self, outcome: AuthorizationOutcome) {
        let outcome: &'static str = outcome.into();
        self.span.record("guard.outcome", outcome);
    }
}

/// Wraps the privacy check of one field.
#[derive(Clone)]
pub struct FieldGateSpan {
    pub span: Span,
}

impl std::ops::Deref for FieldGateSpan {
    type Target = Span;
    fn deref(&self) -> &Self::Target {
        &self.span
    }
}

impl FieldGateSpan {
    pub fn new(parent_type: &str, field_name: &str) -> Self {
        let kind: &'static str = GuardSpanKind::GraphqlAuthorizeField.into();
        let span = info_span!(
            target: TARGET_NAME,
            "GraphQL Field Gate",
            "guard.kind" = kind,
            "otel.kind" = "Internal",
            "graphql.parent_type" = parent_type,
            "graphql.field.name" = field_name,
            "guard.outcome" = Empty,
        );
        FieldGateSpan { span }
    }

    pub fn record_outcome(&self, outcome: AuthorizationOutcome) {
        let outcome: &'static str = outcome.into();
        self.span.record("guard.outcome", outcome);
    }
}
