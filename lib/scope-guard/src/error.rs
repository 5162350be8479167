use crate::graphql_error::{GraphQLError, GraphQLErrorLocation, GraphQLErrorPathSegment};

/// A mistake in the schema declarations or the engine setup.
///
/// These are never turned into a user-facing denial. They surface as hard errors
/// at schema-build time, or at the first request when the problem can only be seen
/// with request data (e.g. a declared argument that is not there).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("role '{role}' used on {site} is not one of the configured roles")]
    UnknownRole { role: String, site: String },
    #[error("'{0}' is reserved and cannot be declared as a role")]
    ReservedRole(String),
    #[error("scope target '{target}' used on {site} is not a registered entity kind")]
    UnknownScopeTarget { target: String, site: String },
    #[error("no authorize meta defined for {site}")]
    MissingAuthorizeMeta { site: String },
    #[error("no scope/authorize meta defined for object {type_name}")]
    MissingObjectMeta { type_name: String },
    #[error("no argument found at path {path} in {input}")]
    MissingArgument { path: String, input: String },
    #[error("value at path {path} on {site} is not a scalar")]
    NonScalarArgument { path: String, site: String },
    #[error("invalid '{key}' meta on {site}: expected {expected}, found {found}")]
    InvalidOption {
        site: String,
        key: String,
        expected: &'static str,
        found: String,
    },
    #[error("conflicting meta on {site}: {reason}")]
    ConflictingMeta { site: String, reason: String },
    #[error("no access policy registered in the request context")]
    PolicyNotRegistered,
    #[error("type '{0}' is not defined in the schema")]
    UnknownType(String),
    #[error("field '{field}' is not defined on type '{type_name}'")]
    UnknownField { type_name: String, field: String },
}

/// Error code attached to query and object denials.
pub const UNAUTHORIZED_CODE: &str = "UNAUTHORIZED";
/// Error code attached to private field denials.
pub const UNAUTHORIZED_FIELD_CODE: &str = "UNAUTHORIZED_FIELD";

/// A data-dependent denial, attached to the location of the denying node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationError {
    pub message: String,
    pub code: &'static str,
    pub path: Vec<GraphQLErrorPathSegment>,
    pub location: Option<GraphQLErrorLocation>,
}

impl AuthorizationError {
    pub fn new(message: String, code: &'static str) -> Self {
        Self {
            message,
            code,
            path: vec![],
            location: None,
        }
    }

    pub fn at(
        mut self,
        path: Vec<GraphQLErrorPathSegment>,
        location: Option<GraphQLErrorLocation>,
    ) -> Self {
        self.path = path;
        self.location = location;
        self
    }
}

impl From<AuthorizationError> for GraphQLError {
    fn from(auth_error: AuthorizationError) -> Self {
        let error = GraphQLError::from_message_and_code(auth_error.message, auth_error.code)
            .with_location(auth_error.location);

        if auth_error.path.is_empty() {
            error
        } else {
            error.with_path(auth_error.path)
        }
    }
}
