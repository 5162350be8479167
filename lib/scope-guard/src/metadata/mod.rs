//! Authorization metadata read off schema types and fields.
//!
//! Metadata bags are compiled once, when the engine is built, into closed
//! typed rules. Every validation that does not need request data happens here:
//! role names, scope targets, option shapes and conflicting keys.

pub mod meta_value;
pub mod schema;

use std::{fmt, sync::Arc};

use ahash::{HashMap, HashSet};
use serde_json::Value;

use crate::{
    arguments::ArgumentPath,
    error::ConfigurationError,
    metadata::{
        meta_value::{MetaBag, MetaValue, Predicate},
        schema::{FieldDefinition, SchemaDefinition, TypeDefinition, TypeKind},
    },
    role::{PermissionRequirement, Permit},
    scope::{Rule, ScopeTarget},
    settings::AuthorizationSettings,
};

/// Default argument (or object field) a scope is checked on.
pub const DEFAULT_SCOPE_KEY: &str = "id";

/// Rules of a query, mutation or subscription root field.
#[derive(Debug, Clone)]
pub struct QueryAuthorization {
    pub requirement: PermissionRequirement,
    pub scope: Option<QueryScope>,
    /// Named return type, used in denial messages.
    pub return_type: String,
}

#[derive(Debug, Clone)]
pub struct QueryScope {
    pub target: ScopeTarget,
    pub argument: ArgumentPath,
    /// Overrides the configured default rule.
    pub rule: Option<Rule>,
    /// A missing argument authorizes vacuously instead of failing.
    pub optional: bool,
}

/// Rules of an object type, checked against each resolved instance.
/// Role and scope checks, when both declared, must both pass.
#[derive(Debug, Clone)]
pub struct ObjectAuthorization {
    pub requirement: Option<PermissionRequirement>,
    pub scope: Option<ObjectScope>,
}

#[derive(Debug, Clone)]
pub struct ObjectScope {
    pub target: ScopeTarget,
    pub by: ObjectScopeBy,
    pub rule: Option<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectScopeBy {
    /// The whole resolved object is handed to the access policy.
    WholeObject,
    Path(ArgumentPath),
}

#[derive(Clone)]
pub enum PrivacyRule {
    Never,
    Always,
    /// Private when the predicate holds for the parent object.
    Predicate(Predicate),
}

impl PrivacyRule {
    pub fn is_private(&self, source: &Value) -> bool {
        match self {
            PrivacyRule::Never => false,
            PrivacyRule::Always => true,
            PrivacyRule::Predicate(predicate) => predicate(source),
        }
    }
}

impl fmt::Debug for PrivacyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivacyRule::Never => f.write_str("Never"),
            PrivacyRule::Always => f.write_str("Always"),
            PrivacyRule::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Who may see a private field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOwnership {
    /// The parent's `owner_field` must equal the principal's identity.
    OwnerField(String),
    /// The access policy decides, given the whole parent object.
    Scope {
        target: ScopeTarget,
        rule: Option<Rule>,
    },
}

#[derive(Debug, Clone)]
pub struct FieldAuthorization {
    pub privacy: PrivacyRule,
    pub ownership: FieldOwnership,
}

type TypeFieldMap<T> = HashMap<String, HashMap<String, Arc<T>>>;

/// Compiled authorization metadata of a whole schema.
#[derive(Debug, Default)]
pub struct SchemaAuthorization {
    root_types: HashSet<String>,
    type_kinds: HashMap<String, TypeKind>,
    queries: TypeFieldMap<QueryAuthorization>,
    objects: HashMap<String, Arc<ObjectAuthorization>>,
    fields: TypeFieldMap<FieldAuthorization>,
}

impl SchemaAuthorization {
    pub fn build(
        schema: &SchemaDefinition,
        settings: &AuthorizationSettings,
    ) -> Result<Self, ConfigurationError> {
        let mut compiled = SchemaAuthorization::default();

        for root_type in schema.root_types() {
            if schema.get_type(root_type).is_none() {
                return Err(ConfigurationError::UnknownType(root_type.to_string()));
            }
            compiled.root_types.insert(root_type.to_string());
        }

        for type_def in &schema.types {
            compiled
                .type_kinds
                .insert(type_def.name.clone(), type_def.kind);

            if schema.is_root_type(&type_def.name) {
                let mut type_queries = HashMap::default();
                for field in &type_def.fields {
                    let rules = compile_query(type_def, field, settings)?;
                    type_queries.insert(field.name.clone(), Arc::new(rules));
                }
                compiled.queries.insert(type_def.name.clone(), type_queries);
                continue;
            }

            if type_def.kind == TypeKind::Object {
                if let Some(rules) = compile_object(type_def, settings)? {
                    compiled
                        .objects
                        .insert(type_def.name.clone(), Arc::new(rules));
                }
            }

            if type_def.kind == TypeKind::Object {
                let mut type_fields = HashMap::default();
                for field in &type_def.fields {
                    let declared = privacy_source(schema, type_def, field)?;
                    if let Some(rules) = compile_field(type_def, declared, settings)? {
                        type_fields.insert(field.name.clone(), Arc::new(rules));
                    }
                }
                if !type_fields.is_empty() {
                    compiled.fields.insert(type_def.name.clone(), type_fields);
                }
            }
        }

        tracing::debug!(
            root_fields = compiled.queries.values().map(|fields| fields.len()).sum::<usize>(),
            objects = compiled.objects.len(),
            private_fields = compiled.fields.values().map(|fields| fields.len()).sum::<usize>(),
            "authorization metadata compiled"
        );

        Ok(compiled)
    }

    pub fn is_root_type(&self, type_name: &str) -> bool {
        self.root_types.contains(type_name)
    }

    pub fn type_kind(&self, type_name: &str) -> Option<TypeKind> {
        self.type_kinds.get(type_name).copied()
    }

    pub fn query(&self, type_name: &str, field_name: &str) -> Option<&Arc<QueryAuthorization>> {
        self.queries
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
    }

    pub fn object(&self, type_name: &str) -> Option<&Arc<ObjectAuthorization>> {
        self.objects.get(type_name)
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&Arc<FieldAuthorization>> {
        self.fields
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
    }
}

fn compile_query(
    type_def: &TypeDefinition,
    field: &FieldDefinition,
    settings: &AuthorizationSettings,
) -> Result<QueryAuthorization, ConfigurationError> {
    let meta = MetaReader::new(&field.meta, format!("{}.{}", type_def.name, field.name));

    let permit = meta
        .permit("authorize")?
        .ok_or_else(|| ConfigurationError::MissingAuthorizeMeta {
            site: meta.site.clone(),
        })?;
    let requirement = settings.roles.requirement(&permit, &meta.site)?;

    let (target, optional_form) = match (
        meta.scope_target("scope", &field.return_type)?,
        meta.scope_target("scope?", &field.return_type)?,
    ) {
        (Some(_), Some(_)) => return Err(meta.conflict("both 'scope' and 'scope?' are declared")),
        (Some(target), None) => (target, false),
        (None, Some(target)) => (target, true),
        (None, None) => (None, false),
    };

    let argument = meta.path("args")?;
    let optional = meta.bool("optional")?;
    let rule = meta.string("rule")?.map(Rule::new);

    let scope = match target {
        Some(target) => Some(QueryScope {
            target: settings.scope_targets.resolve(&target, &meta.site)?,
            argument: argument.unwrap_or_else(|| ArgumentPath::key(DEFAULT_SCOPE_KEY)),
            rule,
            optional: optional_form || optional.unwrap_or(false),
        }),
        None => {
            if argument.is_some() || optional.is_some() || rule.is_some() {
                return Err(meta.conflict("'args', 'optional' and 'rule' require a scope"));
            }
            None
        }
    };

    Ok(QueryAuthorization {
        requirement,
        scope,
        return_type: field.return_type.clone(),
    })
}

fn compile_object(
    type_def: &TypeDefinition,
    settings: &AuthorizationSettings,
) -> Result<Option<ObjectAuthorization>, ConfigurationError> {
    let meta = MetaReader::new(&type_def.meta, format!("object {}", type_def.name));

    let requirement = meta
        .permit("authorize")?
        .map(|permit| settings.roles.requirement(&permit, &meta.site))
        .transpose()?;
    let declared_scope = meta.scope_target("scope", &type_def.name)?;
    let scope_by = meta.path("scope_by")?;
    let whole = meta.bool("scope_whole")?.unwrap_or(false);
    let rule = meta.string("rule")?.map(Rule::new);

    if whole && scope_by.is_some() {
        return Err(meta.conflict("'scope_whole' and 'scope_by' are mutually exclusive"));
    }

    let scope = match declared_scope.clone().flatten() {
        Some(target) => Some(ObjectScope {
            target: settings.scope_targets.resolve(&target, &meta.site)?,
            by: if whole {
                ObjectScopeBy::WholeObject
            } else {
                ObjectScopeBy::Path(
                    scope_by.unwrap_or_else(|| ArgumentPath::key(DEFAULT_SCOPE_KEY)),
                )
            },
            rule,
        }),
        None => {
            if whole || scope_by.is_some() || rule.is_some() {
                return Err(meta.conflict("'scope_by', 'scope_whole' and 'rule' require a scope"));
            }
            None
        }
    };

    // `scope: false` alone is an explicit "no restriction" declaration.
    if requirement.is_none() && declared_scope.is_none() {
        return Ok(None);
    }

    Ok(Some(ObjectAuthorization { requirement, scope }))
}

/// The field definition whose privacy meta applies to `field`: its own when
/// it declares `private`, otherwise the first implemented interface field that
/// does. Interface rules are compiled against the implementing object.
fn privacy_source<'s>(
    schema: &'s SchemaDefinition,
    type_def: &'s TypeDefinition,
    field: &'s FieldDefinition,
) -> Result<&'s FieldDefinition, ConfigurationError> {
    if field.meta.contains("private") {
        return Ok(field);
    }

    for name in &type_def.interfaces {
        let interface = schema
            .get_type(name)
            .filter(|interface| interface.kind == TypeKind::Interface)
            .ok_or_else(|| ConfigurationError::UnknownType(name.clone()))?;

        if let Some(declared) = interface
            .get_field(&field.name)
            .filter(|declared| declared.meta.contains("private"))
        {
            return Ok(declared);
        }
    }

    Ok(field)
}

fn compile_field(
    type_def: &TypeDefinition,
    field: &FieldDefinition,
    settings: &AuthorizationSettings,
) -> Result<Option<FieldAuthorization>, ConfigurationError> {
    let meta = MetaReader::new(&field.meta, format!("{}.{}", type_def.name, field.name));

    let privacy = meta.privacy("private")?;
    if matches!(privacy, PrivacyRule::Never) {
        return Ok(None);
    }

    let owner = meta.string("owner")?;
    let scope = meta.scope_target("scope", &type_def.name)?.flatten();
    let rule = meta.string("rule")?.map(Rule::new);

    let ownership = match (owner, scope) {
        (Some(_), Some(_)) => {
            return Err(meta.conflict("'owner' and 'scope' are mutually exclusive"))
        }
        (Some(owner), None) => FieldOwnership::OwnerField(owner.to_string()),
        (None, Some(target)) => FieldOwnership::Scope {
            target: settings.scope_targets.resolve(&target, &meta.site)?,
            rule,
        },
        (None, None) => FieldOwnership::OwnerField(settings.default_owner_field.clone()),
    };

    Ok(Some(FieldAuthorization { privacy, ownership }))
}

/// Typed access to a metadata bag, reporting errors against `site`.
struct MetaReader<'a> {
    bag: &'a MetaBag,
    site: String,
}

impl<'a> MetaReader<'a> {
    fn new(bag: &'a MetaBag, site: String) -> Self {
        Self { bag, site }
    }

    fn invalid(&self, key: &str, expected: &'static str, found: &MetaValue) -> ConfigurationError {
        ConfigurationError::InvalidOption {
            site: self.site.clone(),
            key: key.to_string(),
            expected,
            found: found.kind().to_string(),
        }
    }

    fn conflict(&self, reason: &str) -> ConfigurationError {
        ConfigurationError::ConflictingMeta {
            site: self.site.clone(),
            reason: reason.to_string(),
        }
    }

    fn bool(&self, key: &str) -> Result<Option<bool>, ConfigurationError> {
        match self.bag.get(key) {
            None => Ok(None),
            Some(MetaValue::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(self.invalid(key, "a boolean", other)),
        }
    }

    fn string(&self, key: &str) -> Result<Option<&'a str>, ConfigurationError> {
        match self.bag.get(key) {
            None => Ok(None),
            Some(MetaValue::String(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(self.invalid(key, "a string", other)),
        }
    }

    fn permit(&self, key: &str) -> Result<Option<Permit>, ConfigurationError> {
        const EXPECTED: &str = "a role or a list of roles";

        match self.bag.get(key) {
            None => Ok(None),
            Some(MetaValue::String(role)) => Ok(Some(Permit::Role(role.clone()))),
            Some(MetaValue::List(values)) => values
                .iter()
                .map(|value| match value {
                    MetaValue::String(role) => Ok(role.clone()),
                    other => Err(self.invalid(key, EXPECTED, other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|roles| Some(Permit::AnyOf(roles))),
            Some(other) => Err(self.invalid(key, EXPECTED, other)),
        }
    }

    /// `true` scopes against `own_type`, `false` declares no scope.
    /// The outer `Option` tells whether the key was declared at all.
    fn scope_target(
        &self,
        key: &str,
        own_type: &str,
    ) -> Result<Option<Option<String>>, ConfigurationError> {
        match self.bag.get(key) {
            None => Ok(None),
            Some(MetaValue::Bool(false)) => Ok(Some(None)),
            Some(MetaValue::Bool(true)) => Ok(Some(Some(own_type.to_string()))),
            Some(MetaValue::String(target)) => Ok(Some(Some(target.clone()))),
            Some(other) => Err(self.invalid(key, "a boolean or an entity kind", other)),
        }
    }

    fn path(&self, key: &str) -> Result<Option<ArgumentPath>, ConfigurationError> {
        self.bag
            .get(key)
            .map(|value| self.path_value(key, value, true))
            .transpose()
    }

    fn path_value(
        &self,
        key: &str,
        value: &MetaValue,
        allow_fields: bool,
    ) -> Result<ArgumentPath, ConfigurationError> {
        const EXPECTED: &str = "a key, a non-empty list of keys or a map of paths";

        match value {
            MetaValue::String(path_key) => Ok(ArgumentPath::Key(path_key.clone())),
            MetaValue::List(keys) if !keys.is_empty() => keys
                .iter()
                .map(|path_key| match path_key {
                    MetaValue::String(path_key) => Ok(path_key.clone()),
                    other => Err(self.invalid(key, EXPECTED, other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ArgumentPath::Nested),
            MetaValue::Map(entries) if allow_fields && !entries.is_empty() => entries
                .iter()
                .map(|(name, path)| Ok((name.clone(), self.path_value(key, path, false)?)))
                .collect::<Result<Vec<_>, _>>()
                .map(ArgumentPath::Fields),
            other => Err(self.invalid(key, EXPECTED, other)),
        }
    }

    fn privacy(&self, key: &str) -> Result<PrivacyRule, ConfigurationError> {
        match self.bag.get(key) {
            None | Some(MetaValue::Bool(false)) => Ok(PrivacyRule::Never),
            Some(MetaValue::Bool(true)) => Ok(PrivacyRule::Always),
            Some(MetaValue::Predicate(predicate)) => Ok(PrivacyRule::Predicate(predicate.clone())),
            Some(other) => Err(self.invalid(key, "a boolean or a predicate", other)),
        }
    }
}
