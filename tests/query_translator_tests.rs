use fennec_backend::{
    models::{ARTICLE_LIST, FIXTURE_LIST, PLAYER_LIST},
    query::{CompareOp, Condition, DEFAULT_LIMIT, DEFAULT_PAGE, PageRef, QueryError, Scalar},
};
use serde_json::json;

fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
    raw.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_defaults_without_paging_parameters() {
    let query = ARTICLE_LIST.translate(&[]).unwrap();

    assert_eq!(query.page, DEFAULT_PAGE);
    assert_eq!(query.limit, DEFAULT_LIMIT);
    assert_eq!(query.skip(), 0);
    assert!(query.filter.all.is_empty());
    assert!(query.select.is_none());

    // Default sort: newest first.
    assert_eq!(query.sort.len(), 1);
    assert_eq!(query.sort[0].field, "createdAt");
    assert!(query.sort[0].descending);
}

#[test]
fn test_operator_suffix_becomes_typed_comparison() {
    let query = PLAYER_LIST
        .translate(&pairs(&[("age[gte]", "16"), ("position", "Forward")]))
        .unwrap();

    assert_eq!(
        query.filter.all,
        vec![
            Condition::Compare {
                field: "age".into(),
                op: CompareOp::Gte,
                value: Scalar::Number(16.0),
            },
            Condition::Compare {
                field: "position".into(),
                op: CompareOp::Eq,
                value: Scalar::Text("Forward".into()),
            },
        ]
    );
}

#[test]
fn test_in_operator_splits_values() {
    let query = PLAYER_LIST
        .translate(&pairs(&[("jerseyNumber[in]", "7, 9,10")]))
        .unwrap();

    assert_eq!(
        query.filter.all,
        vec![Condition::In {
            field: "jerseyNumber".into(),
            values: vec![Scalar::Number(7.0), Scalar::Number(9.0), Scalar::Number(10.0)],
        }]
    );
}

#[test]
fn test_range_on_same_field_is_allowed_but_repeats_are_not() {
    let range = PLAYER_LIST.translate(&pairs(&[("age[gte]", "16"), ("age[lt]", "21")]));
    assert!(range.is_ok());

    let repeated = PLAYER_LIST.translate(&pairs(&[("age[gte]", "16"), ("age[gte]", "18")]));
    assert_eq!(repeated, Err(QueryError::DuplicateFilter("age".into())));
}

#[test]
fn test_rejections() {
    assert_eq!(
        PLAYER_LIST.translate(&pairs(&[("salary", "1")])),
        Err(QueryError::UnknownField("salary".into()))
    );
    assert_eq!(
        PLAYER_LIST.translate(&pairs(&[("age[between]", "1")])),
        Err(QueryError::UnknownOperator {
            field: "age".into(),
            op: "between".into()
        })
    );
    assert_eq!(
        PLAYER_LIST.translate(&pairs(&[("age", "old")])),
        Err(QueryError::InvalidValue {
            field: "age".into(),
            value: "old".into()
        })
    );
    assert_eq!(
        PLAYER_LIST.translate(&pairs(&[("age[gte", "16")])),
        Err(QueryError::MalformedKey("age[gte".into()))
    );
    assert_eq!(
        PLAYER_LIST.translate(&pairs(&[("sort", "-salary")])),
        Err(QueryError::UnknownField("salary".into()))
    );
    // Booleans only support equality and `in`.
    assert!(matches!(
        ARTICLE_LIST.translate(&pairs(&[("featured[gt]", "true")])),
        Err(QueryError::UnknownOperator { .. })
    ));
}

#[test]
fn test_paging_values_fall_back_when_not_positive() {
    let query = PLAYER_LIST
        .translate(&pairs(&[("page", "0"), ("limit", "abc")]))
        .unwrap();
    assert_eq!(query.page, DEFAULT_PAGE);
    assert_eq!(query.limit, DEFAULT_LIMIT);

    let query = PLAYER_LIST
        .translate(&pairs(&[("page", "3"), ("limit", "5")]))
        .unwrap();
    assert_eq!(query.skip(), 10);
}

#[test]
fn test_pagination_links() {
    let query = PLAYER_LIST
        .translate(&pairs(&[("page", "2"), ("limit", "5")]))
        .unwrap();

    let middle = query.pagination(12);
    assert_eq!(middle.next, Some(PageRef { page: 3, limit: 5 }));
    assert_eq!(middle.prev, Some(PageRef { page: 1, limit: 5 }));

    let last = query.pagination(10);
    assert_eq!(last.next, None);

    let first = PLAYER_LIST.translate(&[]).unwrap().pagination(3);
    assert_eq!(first.next, None);
    assert_eq!(first.prev, None);
}

#[test]
fn test_multi_key_sort_and_nested_fields() {
    let query = FIXTURE_LIST
        .translate(&pairs(&[("sort", "status,-date"), ("homeTeam.name", "Fennec FC")]))
        .unwrap();

    let sort: Vec<(&str, bool)> = query
        .sort
        .iter()
        .map(|k| (k.field.as_str(), k.descending))
        .collect();
    assert_eq!(sort, vec![("status", false), ("date", true)]);
    assert_eq!(query.filter.all.len(), 1);
}

#[test]
fn test_select_projection_keeps_id() {
    let query = ARTICLE_LIST
        .translate(&pairs(&[("select", "title,status")]))
        .unwrap();

    let doc = json!({
        "id": "7d3a",
        "title": "Derby day",
        "status": "published",
        "content": "Long text",
    });
    assert_eq!(
        query.project(doc),
        json!({ "id": "7d3a", "title": "Derby day", "status": "published" })
    );
}
