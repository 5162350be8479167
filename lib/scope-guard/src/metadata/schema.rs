use crate::metadata::meta_value::MetaBag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Object,
    Interface,
    Union,
    Scalar,
    Enum,
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    /// Named type of the field, without list or non-null wrappers.
    pub return_type: String,
    pub meta: MetaBag,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            meta: MetaBag::default(),
        }
    }

    pub fn meta(mut self, meta: MetaBag) -> Self {
        self.meta = meta;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    pub meta: MetaBag,
    pub fields: Vec<FieldDefinition>,
    /// Interfaces an object type implements.
    pub interfaces: Vec<String>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            meta: MetaBag::default(),
            fields: vec![],
            interfaces: vec![],
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Object)
    }

    pub fn meta(mut self, meta: MetaBag) -> Self {
        self.meta = meta;
        self
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// The part of the host schema the engine reads: root types, type kinds,
/// field return types and metadata bags.
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub query_type: String,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub types: Vec<TypeDefinition>,
}

impl SchemaDefinition {
    pub fn new(query_type: impl Into<String>) -> Self {
        Self {
            query_type: query_type.into(),
            mutation_type: None,
            subscription_type: None,
            types: vec![],
        }
    }

    pub fn mutation(mut self, mutation_type: impl Into<String>) -> Self {
        self.mutation_type = Some(mutation_type.into());
        self
    }

    pub fn subscription(mut self, subscription_type: impl Into<String>) -> Self {
        self.subscription_type = Some(subscription_type.into());
        self
    }

    pub fn with_type(mut self, type_def: TypeDefinition) -> Self {
        self.types.push(type_def);
        self
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|type_def| type_def.name == name)
    }

    pub fn root_types(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.query_type.as_str())
            .chain(self.mutation_type.as_deref())
            .chain(self.subscription_type.as_deref())
    }

    pub fn is_root_type(&self, name: &str) -> bool {
        self.root_types().any(|root| root == name)
    }
}
