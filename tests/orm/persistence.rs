//! persist / find / remove / refresh

use crate::common::*;
use std::sync::Arc;
use wideorm::{PersistenceContextFactory, StructuralValidator};

#[test]
fn test_persist_find_remove_by_id() {
    let orm = TestOrm::new();
    let mut bean = CompleteBean::new(42, "DuyHai");
    bean.age = Some(35);

    let proxy = orm.manager.persist(bean).unwrap();
    assert!(proxy.is_loaded("name"));
    assert!(!proxy.is_loaded("version"));

    let found = orm.manager.find::<CompleteBean>(42).unwrap().unwrap();
    assert_eq!(found.target().id, Some(42));
    assert_eq!(found.target().name.as_deref(), Some("DuyHai"));
    assert_eq!(found.target().age, Some(35));
    assert!(found.is_loaded("bio"));

    orm.manager.remove_by_id::<CompleteBean>(42).unwrap();
    assert!(orm.manager.find::<CompleteBean>(42).unwrap().is_none());
}

#[test]
fn test_persist_issues_one_write() {
    let orm = TestOrm::new();
    orm.manager.persist(CompleteBean::new(1, "a")).unwrap();

    assert_eq!(orm.count(StatementKind::Write), 1);
    assert_eq!(orm.total_statements(), 1);
}

#[test]
fn test_find_missing_returns_none() {
    let orm = TestOrm::new();
    assert!(orm.manager.find::<CompleteBean>(7).unwrap().is_none());
}

#[test]
fn test_entity_with_only_required_fields_is_found() {
    let orm = TestOrm::new();
    orm.manager.persist(CompleteBean::new(3, "only")).unwrap();

    let found = orm.manager.find::<CompleteBean>(3).unwrap().unwrap();
    assert_eq!(found.target().age, None);
    assert_eq!(found.target().bio, None);
}

#[test]
fn test_failed_validation_issues_no_statement() {
    let orm = TestOrm::new();
    let bean = CompleteBean {
        id: Some(5),
        ..CompleteBean::default()
    };

    let err = orm.manager.persist(bean).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(orm.total_statements(), 0);
}

#[test]
fn test_missing_key_rejected_before_store() {
    let orm = TestOrm::new();
    let bean = CompleteBean {
        name: Some("no id".to_string()),
        ..CompleteBean::default()
    };

    assert!(matches!(
        orm.manager.persist(bean).unwrap_err(),
        Error::Validation(_)
    ));
    assert_eq!(orm.total_statements(), 0);
}

#[test]
fn test_unregistered_entity_rejected() {
    let store = Arc::new(MemoryStore::new());
    let manager = PersistenceManager::new(MetaRegistry::new(), store.clone(), GlobalDefaults::default());

    let err = manager.persist(CompleteBean::new(1, "a")).unwrap_err();
    assert!(matches!(err, Error::UnknownEntity(_)));
    assert!(store.statements().is_empty());
}

#[test]
fn test_persist_of_proxy_rejected() {
    let orm = TestOrm::new();
    let proxy = orm.manager.persist(CompleteBean::new(1, "a")).unwrap();
    orm.store.clear_statements();

    let factory = PersistenceContextFactory::new(
        orm.store.clone(),
        Arc::new(StructuralValidator),
        GlobalDefaults::default(),
    );
    let mut managed = Managed::from(proxy);
    let err = factory
        .entity_context(Arc::new(CompleteBean::meta()), &mut managed, Options::new())
        .persist()
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnexpectedProxyState {
            expected: "NonProxy",
            ..
        }
    ));
    assert_eq!(orm.total_statements(), 0);
}

#[test]
fn test_remove_plain_and_proxied() {
    let orm = TestOrm::new();
    orm.manager.persist(CompleteBean::new(1, "a")).unwrap();
    let proxy = orm.manager.persist(CompleteBean::new(2, "b")).unwrap();

    orm.manager
        .remove(Managed::NonProxy(CompleteBean::new(1, "a")))
        .unwrap();
    orm.manager.remove(Managed::from(proxy)).unwrap();

    assert!(orm.manager.find::<CompleteBean>(1).unwrap().is_none());
    assert!(orm.manager.find::<CompleteBean>(2).unwrap().is_none());
}

#[test]
fn test_persist_after_remove_is_visible() {
    let orm = TestOrm::new();
    orm.manager.persist(CompleteBean::new(9, "first")).unwrap();
    orm.manager.remove_by_id::<CompleteBean>(9).unwrap();
    orm.manager.persist(CompleteBean::new(9, "second")).unwrap();

    let found = orm.manager.find::<CompleteBean>(9).unwrap().unwrap();
    assert_eq!(found.target().name.as_deref(), Some("second"));
}

#[test]
fn test_refresh_discards_pending_changes() {
    let orm = TestOrm::new();
    let mut bean = CompleteBean::new(4, "a");
    bean.age = Some(20);
    let mut proxy = orm.manager.persist(bean).unwrap();
    proxy.set("age", 99i64).unwrap();
    proxy.increment("version", 3).unwrap();

    let mut managed = Managed::from(proxy);
    orm.manager.refresh(&mut managed).unwrap();

    let proxy = managed.as_proxy_mut().unwrap();
    assert_eq!(proxy.target().age, Some(20));
    assert!(!proxy.has_changes());
    assert!(proxy.is_loaded("bio"));
}

#[test]
fn test_refresh_sees_concurrent_writes() {
    let orm = TestOrm::new();
    let stale = orm.manager.persist(CompleteBean::new(6, "old")).unwrap();
    orm.manager.persist(CompleteBean::new(6, "new")).unwrap();

    let mut managed = Managed::from(stale);
    orm.manager.refresh(&mut managed).unwrap();
    assert_eq!(
        managed.as_proxy_mut().unwrap().target().name.as_deref(),
        Some("new")
    );
}

#[test]
fn test_refresh_of_deleted_row_is_not_found() {
    let orm = TestOrm::new();
    let proxy = orm.manager.persist(CompleteBean::new(8, "a")).unwrap();
    orm.manager.remove_by_id::<CompleteBean>(8).unwrap();

    let mut managed = Managed::from(proxy);
    let err = orm.manager.refresh(&mut managed).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_refresh_of_plain_entity_rejected() {
    let orm = TestOrm::new();
    let mut managed = Managed::NonProxy(CompleteBean::new(1, "a"));
    let err = orm.manager.refresh(&mut managed).unwrap_err();
    assert!(matches!(err, Error::UnexpectedProxyState { .. }));
}
