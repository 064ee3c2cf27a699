//! Unit tests for the normalizer

use super::*;
use crate::error::CacheError;
use crate::models::{ArgumentValue, EntityKey, TypeCondition};
use serde_json::json;

fn vars(value: Value) -> Variables {
    match value {
        Value::Object(map) => map,
        _ => Variables::new(),
    }
}

fn book_query() -> Operation {
    Operation::query(vec![Selection::object(
        "book",
        vec![
            Selection::typename(),
            Selection::scalar("id"),
            Selection::scalar("title"),
        ],
    )
    .with_argument("id", ArgumentValue::variable("id"))])
}

#[test]
fn test_query_installs_root_link_and_entity_record() {
    let patch = normalize(
        &book_query(),
        &vars(json!({ "id": "book1" })),
        &json!({ "book": { "__typename": "Book", "id": "book1", "title": "GraphQL in Action" } }),
    )
    .unwrap();

    let root = patch.storage.root().unwrap();
    let link = root.get(r#"book@{"id":"book1"}"#).unwrap();
    assert_eq!(link.as_link().unwrap().resolve(), &EntityKey::new("Book", "book1"));

    let book = patch.storage.entity(&EntityKey::new("Book", "book1")).unwrap();
    assert_eq!(book.get("title").and_then(FieldValue::as_str), Some("GraphQL in Action"));
    assert_eq!(book.typename(), Some("Book"));

    assert_eq!(
        patch.touched,
        DependencySet::from([StorageKey::Root, StorageKey::entity("Book", "book1")])
    );
}

#[test]
fn test_mutation_leaves_root_untouched() {
    let operation = Operation::mutation(vec![Selection::object(
        "updateBook",
        vec![
            Selection::typename(),
            Selection::scalar("id"),
            Selection::scalar("title"),
        ],
    )]);

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({ "updateBook": { "__typename": "Book", "id": "book1", "title": "Renamed" } }),
    )
    .unwrap();

    assert!(patch.storage.root().is_none());
    assert_eq!(
        patch.touched,
        DependencySet::from([StorageKey::entity("Book", "book1")])
    );
}

#[test]
fn test_unidentified_objects_stay_embedded() {
    let operation = Operation::query(vec![Selection::object(
        "book",
        vec![
            Selection::typename(),
            Selection::scalar("id"),
            Selection::object(
                "dimensions",
                vec![Selection::scalar("width"), Selection::scalar("height")],
            ),
        ],
    )]);

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({ "book": {
            "__typename": "Book", "id": "b1",
            "dimensions": { "width": 6, "height": 9 }
        } }),
    )
    .unwrap();

    let book = patch.storage.entity(&EntityKey::new("Book", "b1")).unwrap();
    let dimensions = book.get("dimensions").unwrap().as_object().unwrap();
    assert_eq!(dimensions.get("width"), Some(&FieldValue::from_scalar(json!(6))));
    // Root + Book only: the embedded object gets no record of its own
    assert_eq!(patch.storage.len(), 2);
}

#[test]
fn test_lists_preserve_positions_and_nulls() {
    let operation = Operation::query(vec![Selection::object(
        "books",
        vec![Selection::typename(), Selection::scalar("id")],
    )]);

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({ "books": [
            { "__typename": "Book", "id": "b1" },
            null,
            { "__typename": "Book", "id": "b2" }
        ] }),
    )
    .unwrap();

    let books = patch.storage.root().unwrap().get("books").unwrap();
    let items = books.as_list().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_link().unwrap().resolve(), &EntityKey::new("Book", "b1"));
    assert!(items[1].is_null());
    assert_eq!(items[2].as_link().unwrap().resolve(), &EntityKey::new("Book", "b2"));
}

#[test]
fn test_cyclic_graph_is_flattened_into_one_record_per_entity() {
    let operation = Operation::query(vec![Selection::object(
        "author",
        vec![
            Selection::typename(),
            Selection::scalar("id"),
            Selection::scalar("name"),
            Selection::object(
                "books",
                vec![
                    Selection::typename(),
                    Selection::scalar("id"),
                    Selection::object(
                        "author",
                        vec![Selection::typename(), Selection::scalar("id")],
                    ),
                ],
            ),
        ],
    )]);

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({ "author": {
            "__typename": "Author", "id": "a1", "name": "Ada",
            "books": [{ "__typename": "Book", "id": "b1",
                        "author": { "__typename": "Author", "id": "a1" } }]
        } }),
    )
    .unwrap();

    let author = patch.storage.entity(&EntityKey::new("Author", "a1")).unwrap();
    assert_eq!(author.get("name").and_then(FieldValue::as_str), Some("Ada"));
    assert!(author.get("books").unwrap().is_list());

    let book = patch.storage.entity(&EntityKey::new("Book", "b1")).unwrap();
    assert!(book.get("author").unwrap().is_entity_link());
    assert_eq!(patch.storage.len(), 3);
}

#[test]
fn test_shape_mismatch_skips_only_the_offending_field() {
    let operation = Operation::query(vec![
        Selection::object("broken", vec![Selection::scalar("id")]),
        Selection::object(
            "book",
            vec![Selection::typename(), Selection::scalar("id")],
        ),
        Selection::scalar("count"),
    ]);

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({
            "broken": 42,
            "book": { "__typename": "Book", "id": "b1" },
            "count": 3
        }),
    )
    .unwrap();

    let root = patch.storage.root().unwrap();
    assert!(!root.contains_key("broken"));
    assert!(root.get("book").unwrap().is_entity_link());
    assert_eq!(root.get("count"), Some(&FieldValue::from_scalar(json!(3))));
}

#[test]
fn test_mismatched_list_element_skips_whole_list() {
    let operation = Operation::query(vec![Selection::object(
        "books",
        vec![Selection::scalar("title")],
    )]);

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({ "books": [{ "title": "ok" }, "not an object"] }),
    )
    .unwrap();

    assert!(!patch.storage.root().unwrap().contains_key("books"));
}

#[test]
fn test_absent_response_fields_stay_absent() {
    let patch = normalize(
        &book_query(),
        &vars(json!({ "id": "book1" })),
        &json!({ "book": { "__typename": "Book", "id": "book1" } }),
    )
    .unwrap();

    let book = patch.storage.entity(&EntityKey::new("Book", "book1")).unwrap();
    assert!(!book.contains_key("title"));
}

#[test]
fn test_fragment_spread_merges_into_current_level() {
    let operation = Operation::query(vec![Selection::object(
        "book",
        vec![
            Selection::typename(),
            Selection::scalar("id"),
            Selection::spread("BookDetails"),
        ],
    )])
    .with_fragment(
        "BookDetails",
        vec![Selection::scalar("title"), Selection::enumeration("format")],
    );

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({ "book": { "__typename": "Book", "id": "b1", "title": "T", "format": "HARDCOVER" } }),
    )
    .unwrap();

    let book = patch.storage.entity(&EntityKey::new("Book", "b1")).unwrap();
    assert_eq!(book.get("title").and_then(FieldValue::as_str), Some("T"));
    assert_eq!(book.get("format").and_then(FieldValue::as_str), Some("HARDCOVER"));
}

#[test]
fn test_inline_fragments_apply_by_typename() {
    let operation = Operation::query(vec![Selection::object(
        "search",
        vec![
            Selection::typename(),
            Selection::scalar("id"),
            Selection::inline(TypeCondition::object("Book"), vec![Selection::scalar("title")]),
            Selection::inline(TypeCondition::object("Author"), vec![Selection::scalar("name")]),
        ],
    )]);

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({ "search": [
            { "__typename": "Book", "id": "b1", "title": "T", "name": "stray" },
            { "__typename": "Author", "id": "a1", "name": "Ada" }
        ] }),
    )
    .unwrap();

    let book = patch.storage.entity(&EntityKey::new("Book", "b1")).unwrap();
    assert!(book.contains_key("title"));
    assert!(!book.contains_key("name"));

    let author = patch.storage.entity(&EntityKey::new("Author", "a1")).unwrap();
    assert!(author.contains_key("name"));
    assert!(!author.contains_key("title"));
}

#[test]
fn test_arguments_isolate_field_keys() {
    let books = |alias: &str, genre: &str| {
        Selection::object("books", vec![Selection::scalar("title")])
            .aliased(alias)
            .with_argument(
                "filters",
                ArgumentValue::object([("genre", ArgumentValue::literal(genre))]),
            )
    };
    let operation = Operation::query(vec![books("scifi", "scifi"), books("poetry", "poetry")]);

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({ "scifi": [{ "title": "Dune" }], "poetry": [{ "title": "Odes" }] }),
    )
    .unwrap();

    let root = patch.storage.root().unwrap();
    assert!(root.contains_key(r#"books@{"filters":{"genre":"scifi"}}"#));
    assert!(root.contains_key(r#"books@{"filters":{"genre":"poetry"}}"#));
}

#[test]
fn test_missing_fragment_is_an_error() {
    let operation = Operation::query(vec![Selection::spread("Nope")]);
    let err = normalize(&operation, &Variables::new(), &json!({})).unwrap_err();
    assert!(err.is_precondition_violation());
}

#[test]
fn test_non_object_data_is_rejected() {
    let err = normalize(&book_query(), &Variables::new(), &json!([1, 2])).unwrap_err();
    assert!(matches!(err, CacheError::InvalidResponse(_)));
}

#[test]
fn test_identity_selected_by_a_sibling_selection() {
    let operation = Operation::query(vec![
        Selection::object("book", vec![Selection::typename(), Selection::scalar("id")]),
        Selection::spread("BookTitle"),
    ])
    .with_fragment(
        "BookTitle",
        vec![Selection::object("book", vec![Selection::scalar("title")])],
    );

    let patch = normalize(
        &operation,
        &Variables::new(),
        &json!({ "book": { "__typename": "Book", "id": "b1", "title": "T" } }),
    )
    .unwrap();

    let root = patch.storage.root().unwrap();
    assert!(root.get("book").unwrap().is_entity_link());
    let book = patch.storage.entity(&EntityKey::new("Book", "b1")).unwrap();
    assert_eq!(book.len(), 3);
}
