//! Single-condition indexed queries

use crate::common::*;
use std::collections::BTreeSet;
use wideorm::IndexCondition;

fn seed(orm: &TestOrm) {
    for (id, name, age) in [(1, "alice", 30), (2, "bob", 30), (3, "carol", 41)] {
        let mut bean = CompleteBean::new(id, name);
        bean.age = Some(age);
        orm.manager.persist(bean).unwrap();
    }
}

#[test]
fn test_indexed_query_matches_value() {
    let orm = TestOrm::new();
    seed(&orm);

    let found = orm
        .manager
        .indexed_query::<CompleteBean>(IndexCondition::new("age", 30i64))
        .unwrap();
    let ids: BTreeSet<i64> = found.iter().filter_map(|p| p.target().id).collect();
    assert_eq!(ids, BTreeSet::from([1, 2]));
    assert!(found.iter().all(|p| p.is_loaded("name")));
}

#[test]
fn test_indexed_query_no_match() {
    let orm = TestOrm::new();
    seed(&orm);
    let found = orm
        .manager
        .indexed_query::<CompleteBean>(IndexCondition::new("name", "dave"))
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_indexed_query_rejects_bad_conditions() {
    let orm = TestOrm::new();

    let unknown = orm
        .manager
        .indexed_query::<CompleteBean>(IndexCondition::new("nope", 1i64))
        .unwrap_err();
    assert!(matches!(unknown, Error::Validation(_)));

    let counter = orm
        .manager
        .indexed_query::<CompleteBean>(IndexCondition::new("version", 1i64))
        .unwrap_err();
    assert!(matches!(counter, Error::Validation(_)));

    let clustered = orm
        .manager
        .indexed_query::<ClusteredEntity>(IndexCondition::new("value", "x"))
        .unwrap_err();
    assert!(matches!(clustered, Error::Validation(_)));
    assert_eq!(orm.total_statements(), 0);
}
