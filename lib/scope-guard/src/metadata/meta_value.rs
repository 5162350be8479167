use std::{fmt, sync::Arc};

use serde_json::Value;

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A value in a schema metadata bag.
#[derive(Clone)]
pub enum MetaValue {
    Bool(bool),
    String(String),
    List(Vec<MetaValue>),
    Map(Vec<(String, MetaValue)>),
    /// Evaluated against the parent object of a field.
    Predicate(Predicate),
}

impl MetaValue {
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MetaValue>,
    {
        MetaValue::List(values.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MetaValue>,
    {
        MetaValue::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn predicate(predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        MetaValue::Predicate(Arc::new(predicate))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            MetaValue::Bool(_) => "a boolean",
            MetaValue::String(_) => "a string",
            MetaValue::List(_) => "a list",
            MetaValue::Map(_) => "a map",
            MetaValue::Predicate(_) => "a predicate",
        }
    }
}

impl fmt::Debug for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(value) => write!(f, "{}", value),
            MetaValue::String(value) => write!(f, "{:?}", value),
            MetaValue::List(values) => f.debug_list().entries(values).finish(),
            MetaValue::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(key, value)| (key, value)))
                .finish(),
            MetaValue::Predicate(_) => f.write_str("<predicate>"),
        }
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::String(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::String(value)
    }
}

/// Key-value metadata declared on a schema type or field.
#[derive(Clone, Debug, Default)]
pub struct MetaBag(Vec<(String, MetaValue)>);

impl MetaBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
