//! Post-resolution result tree handed over by the host engine.

use serde_json::{Map, Value};

use crate::graphql_error::{GraphQLError, GraphQLErrorLocation};

/// A resolved operation result, rooted at a query, mutation or subscription type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTree {
    pub root_type: String,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(ResultField),
    /// Expanded in place when the tree is walked.
    FragmentSpread {
        name: String,
        selections: Vec<Selection>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultField {
    pub name: String,
    pub alias: Option<String>,
    pub location: Option<GraphQLErrorLocation>,
    pub node: ResultNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultNode {
    /// Scalar, enum or `null`.
    Leaf(Value),
    Object(ObjectNode),
    List(Vec<ResultNode>),
    /// A union or interface position, holding the concrete node it resolved to.
    Abstract {
        type_name: String,
        node: Box<ResultNode>,
    },
    /// Replaced by an authorization error. Renders as `null`.
    Denied(GraphQLError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    pub type_name: String,
    /// The resolved object as a whole. Scope paths and privacy predicates
    /// are evaluated against it, not against the selected fields.
    pub value: Value,
    pub selections: Vec<Selection>,
}

impl ResultTree {
    pub fn new(root_type: impl Into<String>) -> Self {
        Self {
            root_type: root_type.into(),
            selections: vec![],
        }
    }

    pub fn field(mut self, field: ResultField) -> Self {
        self.selections.push(Selection::Field(field));
        self
    }

    /// Renders the `data` part of a GraphQL response.
    pub fn to_data(&self) -> Value {
        Value::Object(render_selections(&self.selections))
    }

    /// Renders `{ data, errors }`, with errors of denied nodes in document order.
    pub fn to_response(&self) -> Value {
        let mut response = Map::new();
        response.insert("data".to_string(), self.to_data());

        let errors = self.errors();
        if !errors.is_empty() {
            response.insert(
                "errors".to_string(),
                serde_json::to_value(errors).unwrap_or(Value::Null),
            );
        }

        Value::Object(response)
    }

    /// Errors of every denied node, in document order.
    pub fn errors(&self) -> Vec<&GraphQLError> {
        let mut errors = Vec::new();
        collect_selection_errors(&self.selections, &mut errors);
        errors
    }
}

impl ResultField {
    pub fn new(name: impl Into<String>, node: ResultNode) -> Self {
        Self {
            name: name.into(),
            alias: None,
            location: None,
            node,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.location = Some(GraphQLErrorLocation { line, column });
        self
    }

    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl ResultNode {
    pub fn leaf(value: impl Into<Value>) -> Self {
        ResultNode::Leaf(value.into())
    }

    pub fn list(items: impl IntoIterator<Item = ResultNode>) -> Self {
        ResultNode::List(items.into_iter().collect())
    }

    pub fn abstract_type(type_name: impl Into<String>, node: ResultNode) -> Self {
        ResultNode::Abstract {
            type_name: type_name.into(),
            node: Box::new(node),
        }
    }

    fn to_data(&self) -> Value {
        match self {
            ResultNode::Leaf(value) => value.clone(),
            ResultNode::Object(object) if object.value.is_null() => Value::Null,
            ResultNode::Object(object) => Value::Object(render_selections(&object.selections)),
            ResultNode::List(items) => {
                Value::Array(items.iter().map(ResultNode::to_data).collect())
            }
            ResultNode::Abstract { node, .. } => node.to_data(),
            ResultNode::Denied(_) => Value::Null,
        }
    }
}

impl From<ObjectNode> for ResultNode {
    fn from(object: ObjectNode) -> Self {
        ResultNode::Object(object)
    }
}

impl ObjectNode {
    pub fn new(type_name: impl Into<String>, value: Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
            selections: vec![],
        }
    }

    pub fn field(mut self, field: ResultField) -> Self {
        self.selections.push(Selection::Field(field));
        self
    }

    pub fn fragment(mut self, name: impl Into<String>, selections: Vec<Selection>) -> Self {
        self.selections.push(Selection::FragmentSpread {
            name: name.into(),
            selections,
        });
        self
    }

    /// Selects `field_name` as a leaf, reading its value off the resolved object.
    pub fn select(self, field_name: &str) -> Self {
        let value = self.value.get(field_name).cloned().unwrap_or(Value::Null);
        self.field(ResultField::new(field_name, ResultNode::Leaf(value)))
    }
}

fn render_selections(selections: &[Selection]) -> Map<String, Value> {
    let mut data = Map::new();
    render_into(selections, &mut data);
    data
}

fn render_into(selections: &[Selection], data: &mut Map<String, Value>) {
    for selection in selections {
        match selection {
            Selection::Field(field) => {
                data.insert(field.response_key().to_string(), field.node.to_data());
            }
            Selection::FragmentSpread { selections, .. } => render_into(selections, data),
        }
    }
}

fn collect_selection_errors<'a>(selections: &'a [Selection], errors: &mut Vec<&'a GraphQLError>) {
    for selection in selections {
        match selection {
            Selection::Field(field) => collect_node_errors(&field.node, errors),
            Selection::FragmentSpread { selections, .. } => {
                collect_selection_errors(selections, errors)
            }
        }
    }
}

fn collect_node_errors<'a>(node: &'a ResultNode, errors: &mut Vec<&'a GraphQLError>) {
    match node {
        ResultNode::Leaf(_) => {}
        ResultNode::Object(object) => collect_selection_errors(&object.selections, errors),
        ResultNode::List(items) => items
            .iter()
            .for_each(|item| collect_node_errors(item, errors)),
        ResultNode::Abstract { node, .. } => collect_node_errors(node, errors),
        ResultNode::Denied(error) => errors.push(error),
    }
}
