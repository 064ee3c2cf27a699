//! Key Encoding
//!
//! Pure functions deriving storage identities:
//!
//! - Field keys: `name` or `name@<canonical-json-of-arguments>`
//! - Entity keys: `Typename:id`
//!
//! Argument objects are stringified with recursively sorted keys, so two
//! invocations with equal arguments always land on the same field key no
//! matter how the argument objects were built.

use crate::models::{Argument, ArgumentValue, EntityKey, FieldSelection, Variables};
use serde_json::{Map, Value};

/// Field key for `name` invoked with already-resolved arguments
pub fn field_key(name: &str, resolved_args: &Map<String, Value>) -> String {
    if resolved_args.is_empty() {
        return name.to_string();
    }

    let mut key = String::with_capacity(name.len() + 16);
    key.push_str(name);
    key.push('@');
    write_canonical_object(resolved_args, &mut key);
    key
}

/// Field key for a selected field, resolving its arguments against `variables`
pub fn selection_field_key(field: &FieldSelection, variables: &Variables) -> String {
    if field.arguments.is_empty() {
        return field.name.clone();
    }
    field_key(&field.name, &resolve_arguments(&field.arguments, variables))
}

/// JSON encoding with object keys sorted at every depth
pub fn canonical_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => write_canonical_object(map, out),
        // Display on a scalar Value is its compact JSON form
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_canonical_object(map: &Map<String, Value>, out: &mut String) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (name, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::from(name.as_str()).to_string());
        out.push(':');
        write_canonical(value, out);
    }
    out.push('}');
}

/// Evaluate argument AST nodes against variable bindings
///
/// Unbound variables behave like undefined values: they are dropped from
/// objects and become `null` inside lists.
pub fn resolve_arguments(arguments: &[Argument], variables: &Variables) -> Map<String, Value> {
    arguments
        .iter()
        .filter_map(|argument| {
            resolve_value(&argument.value, variables).map(|value| (argument.name.clone(), value))
        })
        .collect()
}

fn resolve_value(value: &ArgumentValue, variables: &Variables) -> Option<Value> {
    match value {
        ArgumentValue::Literal { value } => Some(value.clone()),
        ArgumentValue::Variable { name } => {
            let resolved = variables.get(name).cloned();
            if resolved.is_none() {
                tracing::trace!(variable = %name, "Unbound variable in arguments");
            }
            resolved
        }
        ArgumentValue::Object { fields } => Some(Value::Object(resolve_arguments(fields, variables))),
        ArgumentValue::List { items } => Some(Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, variables).unwrap_or(Value::Null))
                .collect(),
        )),
    }
}

/// Entity key for a typename/id pair
pub fn entity_key(typename: &str, id: &str) -> EntityKey {
    EntityKey::new(typename, id)
}

/// Whether a response value is an object with string `__typename` and string `id`
pub fn is_entity_keyable(value: &Value) -> bool {
    entity_key_of(value).is_some()
}

/// Entity key of a keyable response value
pub fn entity_key_of(value: &Value) -> Option<EntityKey> {
    let object = value.as_object()?;
    let typename = object.get("__typename")?.as_str()?;
    let id = object.get("id")?.as_str()?;
    Some(entity_key(typename, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Selection, Variables};
    use serde_json::json;

    fn vars(value: Value) -> Variables {
        match value {
            Value::Object(map) => map,
            _ => Variables::new(),
        }
    }

    #[test]
    fn test_field_key_without_arguments_is_the_name() {
        assert_eq!(field_key("title", &Map::new()), "title");
    }

    #[test]
    fn test_field_key_with_arguments() {
        let args = vars(json!({ "id": "book1" }));
        assert_eq!(field_key("book", &args), r#"book@{"id":"book1"}"#);
    }

    #[test]
    fn test_canonical_stringify_sorts_keys_recursively() {
        let a = json!({ "b": 1, "a": { "y": [1, { "d": 2, "c": 3 }], "x": null } });
        let mut reordered = Map::new();
        let mut inner = Map::new();
        inner.insert("x".to_string(), Value::Null);
        inner.insert("y".to_string(), json!([1, { "c": 3, "d": 2 }]));
        reordered.insert("a".to_string(), Value::Object(inner));
        reordered.insert("b".to_string(), json!(1));

        let expected = r#"{"a":{"x":null,"y":[1,{"c":3,"d":2}]},"b":1}"#;
        assert_eq!(canonical_stringify(&a), expected);
        assert_eq!(canonical_stringify(&Value::Object(reordered)), expected);
    }

    #[test]
    fn test_canonical_stringify_escapes_strings() {
        assert_eq!(
            canonical_stringify(&json!({ "q\"": "a\nb" })),
            r#"{"q\"":"a\nb"}"#
        );
    }

    #[test]
    fn test_resolve_arguments_literals_variables_and_nesting() {
        let arguments = vec![
            Argument {
                name: "filters".to_string(),
                value: ArgumentValue::object([
                    ("genre", ArgumentValue::variable("genre")),
                    ("minYear", ArgumentValue::literal(1990)),
                ]),
            },
            Argument {
                name: "ids".to_string(),
                value: ArgumentValue::list(vec![
                    ArgumentValue::literal("a"),
                    ArgumentValue::variable("second"),
                ]),
            },
        ];

        let resolved = resolve_arguments(
            &arguments,
            &vars(json!({ "genre": "scifi", "second": "b" })),
        );
        assert_eq!(
            Value::Object(resolved),
            json!({ "filters": { "genre": "scifi", "minYear": 1990 }, "ids": ["a", "b"] })
        );
    }

    #[test]
    fn test_unbound_variables() {
        let arguments = vec![
            Argument {
                name: "first".to_string(),
                value: ArgumentValue::variable("missing"),
            },
            Argument {
                name: "ids".to_string(),
                value: ArgumentValue::list(vec![ArgumentValue::variable("missing")]),
            },
        ];

        let resolved = resolve_arguments(&arguments, &Variables::new());
        assert_eq!(Value::Object(resolved), json!({ "ids": [null] }));
    }

    #[test]
    fn test_selection_field_key_is_argument_order_independent() {
        let forward = Selection::object("books", vec![])
            .with_argument("limit", ArgumentValue::literal(10))
            .with_argument("offset", ArgumentValue::literal(0));
        let backward = Selection::object("books", vec![])
            .with_argument("offset", ArgumentValue::literal(0))
            .with_argument("limit", ArgumentValue::literal(10));

        let empty = Variables::new();
        assert_eq!(
            selection_field_key(forward.field().unwrap(), &empty),
            selection_field_key(backward.field().unwrap(), &empty)
        );
    }

    #[test]
    fn test_entity_keyable_values() {
        assert!(is_entity_keyable(&json!({ "__typename": "Book", "id": "b1" })));
        assert!(!is_entity_keyable(&json!({ "__typename": "Book" })));
        assert!(!is_entity_keyable(&json!({ "__typename": "Book", "id": 1 })));
        assert!(!is_entity_keyable(&json!([{ "__typename": "Book", "id": "b1" }])));
        assert_eq!(
            entity_key_of(&json!({ "__typename": "Book", "id": "b1", "title": "x" })),
            Some(EntityKey::new("Book", "b1"))
        );
    }
}
