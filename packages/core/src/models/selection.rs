//! Selection IR
//!
//! The parsed, schema-validated shape of an operation as handed to the cache by
//! the code generation layer. The cache never parses query text; it only walks
//! these trees.
//!
//! The IR is serde-friendly so generated artifacts can be shipped as JSON:
//!
//! ```json
//! {
//!   "kind": "query",
//!   "selections": [
//!     { "kind": "ObjectField", "name": "book",
//!       "arguments": [{ "name": "id", "value": { "kind": "variable", "name": "id" } }],
//!       "children": [
//!         { "kind": "TypenameField", "name": "__typename" },
//!         { "kind": "ScalarField", "name": "id" },
//!         { "kind": "ScalarField", "name": "title" }
//!       ] }
//!   ]
//! }
//! ```

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Variable bindings for one operation execution
pub type Variables = serde_json::Map<String, Value>;

/// Named fragment bodies, indexed by fragment name
pub type FragmentTable = BTreeMap<String, Vec<Selection>>;

/// Operation type; only queries write to the root record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// A complete operation: its top-level selections plus the fragments they spread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub kind: OperationKind,

    /// Operation name, used only for logging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub selections: Vec<Selection>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fragments: FragmentTable,
}

impl Operation {
    /// Create an operation of the given kind with no fragments
    pub fn new(kind: OperationKind, selections: Vec<Selection>) -> Self {
        Self {
            kind,
            name: None,
            selections,
            fragments: FragmentTable::new(),
        }
    }

    pub fn query(selections: Vec<Selection>) -> Self {
        Self::new(OperationKind::Query, selections)
    }

    pub fn mutation(selections: Vec<Selection>) -> Self {
        Self::new(OperationKind::Mutation, selections)
    }

    pub fn subscription(selections: Vec<Selection>) -> Self {
        Self::new(OperationKind::Subscription, selections)
    }

    /// Set the operation name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register a named fragment
    pub fn with_fragment(mut self, name: impl Into<String>, selections: Vec<Selection>) -> Self {
        self.fragments.insert(name.into(), selections);
        self
    }

    /// Name used in log output
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Look up a fragment body by name
    ///
    /// A miss is a precondition violation: the IR itself is malformed.
    pub fn fragment(&self, name: &str) -> Result<&[Selection], CacheError> {
        self.fragments
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CacheError::missing_fragment(name))
    }

    /// Check that every reachable fragment spread resolves and no fragment spreads itself
    pub fn validate(&self) -> Result<(), CacheError> {
        let mut visiting = Vec::new();
        let mut done = BTreeSet::new();
        self.validate_selections(&self.selections, &mut visiting, &mut done)
    }

    fn validate_selections<'a>(
        &'a self,
        selections: &'a [Selection],
        visiting: &mut Vec<&'a str>,
        done: &mut BTreeSet<&'a str>,
    ) -> Result<(), CacheError> {
        for selection in selections {
            match selection {
                Selection::FragmentSpread(spread) => {
                    self.validate_fragment(&spread.name, visiting, done)?
                }
                other => {
                    if let Some(children) = other.children() {
                        self.validate_selections(children, visiting, done)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_fragment<'a>(
        &'a self,
        name: &'a str,
        visiting: &mut Vec<&'a str>,
        done: &mut BTreeSet<&'a str>,
    ) -> Result<(), CacheError> {
        if done.contains(name) {
            return Ok(());
        }
        if visiting.contains(&name) {
            return Err(CacheError::fragment_cycle(name));
        }

        let body = self.fragment(name)?;
        visiting.push(name);
        self.validate_selections(body, visiting, done)?;
        visiting.pop();
        done.insert(name);
        Ok(())
    }
}

/// One node of the selection tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Selection {
    TypenameField(FieldSelection),
    ScalarField(FieldSelection),
    EnumField(FieldSelection),
    ObjectField(FieldSelection),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

impl Selection {
    /// `__typename`
    pub fn typename() -> Self {
        Self::TypenameField(FieldSelection::new("__typename"))
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::ScalarField(FieldSelection::new(name))
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::EnumField(FieldSelection::new(name))
    }

    pub fn object(name: impl Into<String>, children: Vec<Selection>) -> Self {
        let mut field = FieldSelection::new(name);
        field.children = children;
        Self::ObjectField(field)
    }

    pub fn spread(name: impl Into<String>) -> Self {
        Self::FragmentSpread(FragmentSpread { name: name.into() })
    }

    pub fn inline(type_condition: TypeCondition, children: Vec<Selection>) -> Self {
        Self::InlineFragment(InlineFragment {
            type_condition,
            children,
        })
    }

    /// Set the response alias; no effect on fragments
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        if let Some(field) = self.field_mut() {
            field.alias = Some(alias.into());
        }
        self
    }

    /// Append an argument; no effect on fragments
    pub fn with_argument(mut self, name: impl Into<String>, value: ArgumentValue) -> Self {
        if let Some(field) = self.field_mut() {
            field.arguments.push(Argument {
                name: name.into(),
                value,
            });
        }
        self
    }

    /// The field payload of any field-kind selection
    pub fn field(&self) -> Option<&FieldSelection> {
        match self {
            Self::TypenameField(field)
            | Self::ScalarField(field)
            | Self::EnumField(field)
            | Self::ObjectField(field) => Some(field),
            Self::FragmentSpread(_) | Self::InlineFragment(_) => None,
        }
    }

    fn field_mut(&mut self) -> Option<&mut FieldSelection> {
        match self {
            Self::TypenameField(field)
            | Self::ScalarField(field)
            | Self::EnumField(field)
            | Self::ObjectField(field) => Some(field),
            Self::FragmentSpread(_) | Self::InlineFragment(_) => None,
        }
    }

    /// Nested selections of object fields and inline fragments
    pub fn children(&self) -> Option<&[Selection]> {
        match self {
            Self::ObjectField(field) => Some(&field.children),
            Self::InlineFragment(fragment) => Some(&fragment.children),
            _ => None,
        }
    }
}

/// A selected field: leaf or object-shaped depending on the enclosing variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelection {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Argument>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Selection>,
}

impl FieldSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Key under which the field appears in response data
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentSpread {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineFragment {
    pub type_condition: TypeCondition,
    pub children: Vec<Selection>,
}

/// A named argument as written in the operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: ArgumentValue,
}

/// Argument AST, resolved against variables at normalize/denormalize time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ArgumentValue {
    Literal { value: Value },
    Variable { name: String },
    Object { fields: Vec<Argument> },
    List { items: Vec<ArgumentValue> },
}

impl ArgumentValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable { name: name.into() }
    }

    pub fn object<N: Into<String>>(fields: impl IntoIterator<Item = (N, ArgumentValue)>) -> Self {
        Self::Object {
            fields: fields
                .into_iter()
                .map(|(name, value)| Argument {
                    name: name.into(),
                    value,
                })
                .collect(),
        }
    }

    pub fn list(items: Vec<ArgumentValue>) -> Self {
        Self::List { items }
    }
}

/// Schema classification of an inline fragment's type condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeConditionKind {
    Object,
    Interface,
    Union,
}

/// Type condition of an inline fragment, with the schema's possible types for abstract types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCondition {
    pub kind: TypeConditionKind,
    pub name: String,

    /// Implementing types (interfaces) or member types (unions); ignored for object types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_types: Vec<String>,
}

impl TypeCondition {
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            kind: TypeConditionKind::Object,
            name: name.into(),
            possible_types: Vec::new(),
        }
    }

    pub fn interface<T: Into<String>>(
        name: impl Into<String>,
        implementors: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            kind: TypeConditionKind::Interface,
            name: name.into(),
            possible_types: implementors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn union<T: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            kind: TypeConditionKind::Union,
            name: name.into(),
            possible_types: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Concrete type names this condition admits
    pub fn type_set(&self) -> BTreeSet<&str> {
        let mut types = BTreeSet::from([self.name.as_str()]);
        match self.kind {
            TypeConditionKind::Object => {}
            TypeConditionKind::Interface | TypeConditionKind::Union => {
                types.extend(self.possible_types.iter().map(String::as_str));
            }
        }
        types
    }

    /// Whether a value of runtime type `typename` satisfies this condition
    pub fn matches(&self, typename: &str) -> bool {
        self.type_set().contains(typename)
    }
}
