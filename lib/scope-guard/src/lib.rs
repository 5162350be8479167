//! Query, object and field authorization for GraphQL execution pipelines.
//!
//! The engine runs in three places of a request:
//! 1. **Query gate** - before a root field resolves, role check then scope check
//! 2. **Object tree walk** - after resolution, every object node is checked and
//!    denied subtrees are pruned
//! 3. **Field gate** - private fields are hidden from principals that do not own them
//!
//! All three consult the [`AccessPolicy`] registered in the [`RequestContext`].

pub mod arguments;
pub mod authorizer;
pub mod context;
pub mod error;
pub mod field_gate;
pub mod graphql_error;
pub mod guard;
pub mod metadata;
pub mod middleware;
pub mod policy;
pub mod query_gate;
pub mod role;
pub mod scope;
pub mod settings;
pub mod tree;
pub mod walker;

#[cfg(test)]
mod tests;

pub use context::RequestContext;
pub use error::{AuthorizationError, ConfigurationError};
pub use guard::{AuthorizationDecision, ScopeGuard};
pub use metadata::{
    meta_value::{MetaBag, MetaValue},
    schema::{FieldDefinition, SchemaDefinition, TypeDefinition, TypeKind},
};
pub use policy::{AccessPolicy, Identity};
pub use query_gate::QueryOutcome;
pub use scope::{Rule, ScopeTarget};
pub use tree::{ObjectNode, ResultField, ResultNode, ResultTree, Selection};
