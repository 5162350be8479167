//! Post-resolution walk of a result tree.
//!
//! Every object node is checked against the rules of its type before its
//! selections are visited. A denied object is replaced by an error and its
//! subtree is never evaluated. List elements and sibling fields are decided
//! independently of each other.

use futures::future::{try_join_all, BoxFuture};

use crate::{
    arguments::{extract, NonScalarLeaf, ScopeValue},
    authorizer::Authorizer,
    error::{ConfigurationError, UNAUTHORIZED_CODE},
    field_gate::FieldGate,
    graphql_error::{GraphQLError, GraphQLErrorLocation, GraphQLErrorPathSegment},
    metadata::{schema::TypeKind, ObjectScopeBy, SchemaAuthorization},
    policy::AccessPolicy,
    settings::Denial,
    tree::{ObjectNode, ResultField, ResultNode, ResultTree, Selection},
};

type ResponsePath = Vec<GraphQLErrorPathSegment>;
type Walked<T> = Result<(T, Vec<GraphQLError>), ConfigurationError>;

pub struct ObjectTreeWalker<'a, P: AccessPolicy> {
    authorizer: &'a Authorizer<'a, P>,
    schema: &'a SchemaAuthorization,
}

impl<'a, P: AccessPolicy> ObjectTreeWalker<'a, P> {
    pub fn new(authorizer: &'a Authorizer<'a, P>, schema: &'a SchemaAuthorization) -> Self {
        Self { authorizer, schema }
    }

    /// Returns the authorized tree and the errors of every denied node,
    /// in document order.
    pub async fn walk(&self, tree: &ResultTree) -> Walked<ResultTree> {
        if !self.schema.is_root_type(&tree.root_type) {
            return Err(ConfigurationError::UnknownType(tree.root_type.clone()));
        }

        // The root itself is never scoped.
        let (selections, errors) = self.walk_selections(None, &tree.selections, vec![]).await?;

        Ok((
            ResultTree {
                root_type: tree.root_type.clone(),
                selections,
            },
            errors,
        ))
    }

    fn walk_selections<'b>(
        &'b self,
        parent: Option<&'b ObjectNode>,
        selections: &'b [Selection],
        path: ResponsePath,
    ) -> BoxFuture<'b, Walked<Vec<Selection>>> {
        Box::pin(async move {
            let mut fields = Vec::with_capacity(selections.len());
            expand_fragments(selections, &mut fields);

            let walked = try_join_all(
                fields
                    .into_iter()
                    .map(|field| self.walk_field(parent, field, path.clone())),
            )
            .await?;

            let mut errors = Vec::new();
            let selections = walked
                .into_iter()
                .map(|(field, field_errors)| {
                    errors.extend(field_errors);
                    Selection::Field(field)
                })
                .collect();

            Ok((selections, errors))
        })
    }

    fn walk_field<'b>(
        &'b self,
        parent: Option<&'b ObjectNode>,
        field: &'b ResultField,
        mut path: ResponsePath,
    ) -> BoxFuture<'b, Walked<ResultField>> {
        Box::pin(async move {
            path.push(GraphQLErrorPathSegment::String(
                field.response_key().to_string(),
            ));

            if let Some(parent) = parent {
                if let Some(rules) = self.schema.field(&parent.type_name, &field.name) {
                    let denial = FieldGate::new(self.authorizer)
                        .check(rules, &parent.type_name, &field.name, &parent.value)
                        .await;

                    if let Some(denial) = denial {
                        let error: GraphQLError = denial.at(path, field.location).into();
                        return Ok((
                            with_node(field, ResultNode::Denied(error.clone())),
                            vec![error],
                        ));
                    }
                }
            }

            let (node, errors) = self.walk_node(&field.node, path, field.location).await?;
            Ok((with_node(field, node), errors))
        })
    }

    fn walk_node<'b>(
        &'b self,
        node: &'b ResultNode,
        path: ResponsePath,
        location: Option<GraphQLErrorLocation>,
    ) -> BoxFuture<'b, Walked<ResultNode>> {
        Box::pin(async move {
            match node {
                ResultNode::Leaf(_) | ResultNode::Denied(_) => Ok((node.clone(), vec![])),
                ResultNode::Abstract { type_name, node } => {
                    let (node, errors) = self.walk_node(node, path, location).await?;
                    Ok((
                        ResultNode::Abstract {
                            type_name: type_name.clone(),
                            node: Box::new(node),
                        },
                        errors,
                    ))
                }
                ResultNode::List(items) => {
                    let walked = try_join_all(items.iter().enumerate().map(|(index, item)| {
                        let mut item_path = path.clone();
                        item_path.push(GraphQLErrorPathSegment::Index(index));
                        self.walk_node(item, item_path, location)
                    }))
                    .await?;

                    let mut errors = Vec::new();
                    let items = walked
                        .into_iter()
                        .map(|(item, item_errors)| {
                            errors.extend(item_errors);
                            item
                        })
                        .collect();

                    Ok((ResultNode::List(items), errors))
                }
                ResultNode::Object(object) => self.walk_object(object, path, location).await,
            }
        })
    }

    fn walk_object<'b>(
        &'b self,
        object: &'b ObjectNode,
        path: ResponsePath,
        location: Option<GraphQLErrorLocation>,
    ) -> BoxFuture<'b, Walked<ResultNode>> {
        Box::pin(async move {
            // Nothing to protect.
            if object.value.is_null() {
                return Ok((ResultNode::Object(object.clone()), vec![]));
            }

            let checked = if self.schema.is_root_type(&object.type_name) {
                false
            } else {
                match self.schema.type_kind(&object.type_name) {
                    Some(TypeKind::Object) => true,
                    Some(_) => false,
                    None => return Err(ConfigurationError::UnknownType(object.type_name.clone())),
                }
            };

            if checked && !self.authorize_object(object).await? {
                tracing::debug!(
                    type_name = %object.type_name,
                    path = %display_path(&path),
                    "object denied"
                );
                let error: GraphQLError = self
                    .authorizer
                    .deny(
                        Denial::Object {
                            type_name: &object.type_name,
                        },
                        UNAUTHORIZED_CODE,
                    )
                    .at(path, location)
                    .into();
                return Ok((ResultNode::Denied(error.clone()), vec![error]));
            }

            let (selections, errors) = self
                .walk_selections(Some(object), &object.selections, path)
                .await?;

            Ok((
                ResultNode::Object(ObjectNode {
                    type_name: object.type_name.clone(),
                    value: object.value.clone(),
                    selections,
                }),
                errors,
            ))
        })
    }

    /// Role and scope checks of an object type, both must pass when declared.
    async fn authorize_object(&self, object: &ObjectNode) -> Result<bool, ConfigurationError> {
        let Some(rules) = self.schema.object(&object.type_name) else {
            let error = ConfigurationError::MissingObjectMeta {
                type_name: object.type_name.clone(),
            };
            tracing::error!("{}", error);
            return Err(error);
        };

        if let Some(requirement) = &rules.requirement {
            if !self.authorizer.role_authorized(requirement) {
                return Ok(false);
            }
        }

        let Some(scope) = &rules.scope else {
            return Ok(true);
        };

        if self.authorizer.exempt(rules.requirement.as_ref()) {
            tracing::trace!(type_name = %object.type_name, "object scope skipped, exempt");
            return Ok(true);
        }

        let value = match &scope.by {
            ObjectScopeBy::WholeObject => ScopeValue::Single(object.value.clone()),
            ObjectScopeBy::Path(path) => match extract(&object.value, path) {
                Ok(Some(value)) => value,
                Ok(None) => {
                    let error = ConfigurationError::MissingArgument {
                        path: path.to_string(),
                        input: object.value.to_string(),
                    };
                    tracing::error!(type_name = %object.type_name, "{}", error);
                    return Err(error);
                }
                Err(NonScalarLeaf { path }) => {
                    let error = ConfigurationError::NonScalarArgument {
                        path,
                        site: format!("object {}", object.type_name),
                    };
                    tracing::error!("{}", error);
                    return Err(error);
                }
            },
        };

        Ok(self
            .authorizer
            .scope(&scope.target, scope.rule.as_ref(), &value)
            .await)
    }
}

fn expand_fragments<'b>(selections: &'b [Selection], fields: &mut Vec<&'b ResultField>) {
    for selection in selections {
        match selection {
            Selection::Field(field) => fields.push(field),
            Selection::FragmentSpread { selections, .. } => expand_fragments(selections, fields),
        }
    }
}

fn with_node(field: &ResultField, node: ResultNode) -> ResultField {
    ResultField {
        name: field.name.clone(),
        alias: field.alias.clone(),
        location: field.location,
        node,
    }
}

fn display_path(path: &[GraphQLErrorPathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
