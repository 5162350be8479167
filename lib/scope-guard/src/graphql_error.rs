use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<GraphQLErrorLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<GraphQLErrorPathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl From<String> for GraphQLError {
    fn from(message: String) -> Self {
        GraphQLError {
            message,
            locations: None,
            path: None,
            extensions: None,
        }
    }
}

impl GraphQLError {
    pub fn from_message_and_code(message: impl Into<String>, code: &str) -> Self {
        GraphQLError {
            message: message.into(),
            locations: None,
            path: None,
            extensions: Some(json!({ "code": code })),
        }
    }

    pub fn with_path(mut self, path: Vec<GraphQLErrorPathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_location(mut self, location: Option<GraphQLErrorLocation>) -> Self {
        if let Some(location) = location {
            self.locations.get_or_insert_with(Vec::new).push(location);
        }
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|extensions| extensions.get("code"))
            .and_then(Value::as_str)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GraphQLErrorLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GraphQLErrorPathSegment {
    String(String),
    Index(usize),
}

impl std::fmt::Display for GraphQLErrorPathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphQLErrorPathSegment::String(key) => write!(f, "{}", key),
            GraphQLErrorPathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}
