//! Slice queries over a clustered partition

use crate::common::*;

fn seed(orm: &TestOrm) {
    for name in ["a", "b", "c", "d", "e"] {
        orm.manager
            .persist(ClusteredEntity::new(7, name, &format!("v-{}", name)))
            .unwrap();
    }
    orm.manager
        .persist(ClusteredEntity::new(8, "a", "other partition"))
        .unwrap();
}

fn names(entities: &[EntityProxy<ClusteredEntity>]) -> Vec<String> {
    entities
        .iter()
        .map(|e| e.key().unwrap().name)
        .collect()
}

#[test]
fn test_full_partition_in_clustering_order() {
    let orm = TestOrm::new();
    seed(&orm);

    let all = orm
        .manager
        .slice_query::<ClusteredEntity>()
        .unwrap()
        .partition_key(7i64)
        .get()
        .unwrap();
    assert_eq!(names(&all), vec!["a", "b", "c", "d", "e"]);
    assert_eq!(all[2].target().value.as_deref(), Some("v-c"));
    assert!(all.iter().all(|e| e.key().unwrap().id == 7));
}

#[test]
fn test_inclusive_and_exclusive_bounds() {
    let orm = TestOrm::new();
    seed(&orm);
    let query = || {
        orm.manager
            .slice_query::<ClusteredEntity>()
            .unwrap()
            .partition_key(7i64)
            .from_clustering(["b"])
            .to_clustering(["d"])
    };

    assert_eq!(names(&query().get().unwrap()), vec!["b", "c", "d"]);
    assert_eq!(names(&query().bounds(false, false).get().unwrap()), vec!["c"]);
    assert_eq!(names(&query().bounds(true, false).get().unwrap()), vec!["b", "c"]);
}

#[test]
fn test_reverse_slice() {
    let orm = TestOrm::new();
    seed(&orm);

    let reversed = orm
        .manager
        .slice_query::<ClusteredEntity>()
        .unwrap()
        .partition_key(7i64)
        .from_clustering(["d"])
        .to_clustering(["b"])
        .reverse()
        .get()
        .unwrap();
    assert_eq!(names(&reversed), vec!["d", "c", "b"]);
}

#[test]
fn test_limit_and_get_first() {
    let orm = TestOrm::new();
    seed(&orm);

    let limited = orm
        .manager
        .slice_query::<ClusteredEntity>()
        .unwrap()
        .partition_key(7i64)
        .limit(2)
        .get()
        .unwrap();
    assert_eq!(names(&limited), vec!["a", "b"]);

    let last = orm
        .manager
        .slice_query::<ClusteredEntity>()
        .unwrap()
        .partition_key(7i64)
        .reverse()
        .get_first()
        .unwrap()
        .unwrap();
    assert_eq!(last.key().unwrap().name, "e");
}

#[test]
fn test_empty_partition() {
    let orm = TestOrm::new();
    seed(&orm);
    let none = orm
        .manager
        .slice_query::<ClusteredEntity>()
        .unwrap()
        .partition_key(99i64)
        .get()
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_slice_requires_partition_key() {
    let orm = TestOrm::new();
    let err = orm
        .manager
        .slice_query::<ClusteredEntity>()
        .unwrap()
        .get()
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(orm.total_statements(), 0);
}

#[test]
fn test_slice_on_unclustered_entity_rejected() {
    let orm = TestOrm::new();
    assert!(matches!(
        orm.manager.slice_query::<CompleteBean>().unwrap_err(),
        Error::Validation(_)
    ));
}

#[test]
fn test_remove_deletes_only_its_clustering_prefix() {
    let orm = TestOrm::new();
    seed(&orm);

    orm.manager
        .remove_by_id::<ClusteredEntity>(ClusteredKey::new(7, "c"))
        .unwrap();

    assert!(orm
        .manager
        .find::<ClusteredEntity>(ClusteredKey::new(7, "c"))
        .unwrap()
        .is_none());
    let rest = orm
        .manager
        .slice_query::<ClusteredEntity>()
        .unwrap()
        .partition_key(7i64)
        .get()
        .unwrap();
    assert_eq!(names(&rest), vec!["a", "b", "d", "e"]);
}

#[test]
fn test_clustered_find_and_update() {
    let orm = TestOrm::new();
    seed(&orm);

    let found = orm
        .manager
        .find::<ClusteredEntity>(ClusteredKey::new(7, "b"))
        .unwrap()
        .unwrap();
    let mut managed = Managed::from(found);
    managed
        .as_proxy_mut()
        .unwrap()
        .set("value", "changed")
        .unwrap();
    orm.manager.update(&mut managed).unwrap();

    let again = orm
        .manager
        .find::<ClusteredEntity>(ClusteredKey::new(7, "b"))
        .unwrap()
        .unwrap();
    assert_eq!(again.target().value.as_deref(), Some("changed"));
    let neighbour = orm
        .manager
        .find::<ClusteredEntity>(ClusteredKey::new(7, "a"))
        .unwrap()
        .unwrap();
    assert_eq!(neighbour.target().value.as_deref(), Some("v-a"));
}
