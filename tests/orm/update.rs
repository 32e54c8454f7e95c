//! Dirty-field flushing

use std::time::Duration;

use crate::common::*;

fn persisted(orm: &TestOrm, id: i64) -> Managed<CompleteBean> {
    let mut bean = CompleteBean::new(id, "name");
    bean.age = Some(30);
    bean.bio = Some("bio".to_string());
    let proxy = orm.manager.persist(bean).unwrap();
    orm.store.clear_statements();
    Managed::from(proxy)
}

#[test]
fn test_update_writes_only_dirty_fields() {
    let orm = TestOrm::new();
    let mut managed = persisted(&orm, 1);
    managed.as_proxy_mut().unwrap().set("age", 31i64).unwrap();

    orm.manager.update(&mut managed).unwrap();

    let statements = orm.store.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].kind, StatementKind::Write);
    // Dirty field plus the rewritten marker
    assert_eq!(statements[0].column_count, 2);

    let found = orm.manager.find::<CompleteBean>(1).unwrap().unwrap();
    assert_eq!(found.target().age, Some(31));
    assert_eq!(found.target().name.as_deref(), Some("name"));
}

#[test]
fn test_update_without_changes_issues_nothing() {
    let orm = TestOrm::new();
    let mut managed = persisted(&orm, 2);

    orm.manager.update(&mut managed).unwrap();
    assert_eq!(orm.total_statements(), 0);
}

#[test]
fn test_update_clears_dirty_state() {
    let orm = TestOrm::new();
    let mut managed = persisted(&orm, 3);
    managed.as_proxy_mut().unwrap().set("name", "renamed").unwrap();

    orm.manager.update(&mut managed).unwrap();
    assert!(!managed.as_proxy_mut().unwrap().has_changes());

    orm.store.clear_statements();
    orm.manager.update(&mut managed).unwrap();
    assert_eq!(orm.total_statements(), 0);
}

#[test]
fn test_update_of_converted_proxy_keeps_cleared_state() {
    let orm = TestOrm::new();
    let mut proxy = orm.manager.persist(CompleteBean::new(8, "before")).unwrap();
    proxy.set("name", "after").unwrap();
    let mut managed: Managed<CompleteBean> = proxy.into();

    orm.manager.update(&mut managed).unwrap();
    let proxy = managed.as_proxy_mut().unwrap();
    assert!(!proxy.has_changes());
    assert_eq!(proxy.target().name.as_deref(), Some("after"));
    assert_eq!(
        orm.manager.find::<CompleteBean>(8).unwrap().unwrap().target().name.as_deref(),
        Some("after")
    );
}

#[test]
fn test_update_null_field_deletes_column() {
    let orm = TestOrm::new();
    let mut managed = persisted(&orm, 4);
    managed.as_proxy_mut().unwrap().set("bio", Value::Null).unwrap();

    orm.manager.update(&mut managed).unwrap();
    assert_eq!(orm.count(StatementKind::Delete), 1);
    assert_eq!(orm.count(StatementKind::Write), 0);

    let found = orm.manager.find::<CompleteBean>(4).unwrap().unwrap();
    assert_eq!(found.target().bio, None);
    assert_eq!(found.target().age, Some(30));
}

#[test]
fn test_update_of_plain_entity_rejected() {
    let orm = TestOrm::new();
    let mut managed = Managed::NonProxy(CompleteBean::new(5, "a"));

    let err = orm.manager.update(&mut managed).unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedProxyState {
            expected: "Proxy",
            actual: "NonProxy"
        }
    ));
    assert_eq!(orm.total_statements(), 0);
}

#[test]
fn test_update_clearing_required_field_fails_without_statement() {
    let orm = TestOrm::new();
    let mut managed = persisted(&orm, 6);
    managed.as_proxy_mut().unwrap().set("name", Value::Null).unwrap();

    let err = orm.manager.update(&mut managed).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(orm.total_statements(), 0);
    assert!(managed.as_proxy_mut().unwrap().is_dirty("name"));
}

#[test]
fn test_update_of_lazy_proxy_skips_unloaded_required_field() {
    let orm = TestOrm::new();
    orm.manager.persist(CompleteBean::new(7, "kept")).unwrap();

    let proxy = orm.manager.get_proxy::<CompleteBean>(7).unwrap().unwrap();
    let mut managed = Managed::from(proxy);
    managed.as_proxy_mut().unwrap().set("age", 50i64).unwrap();
    orm.manager.update(&mut managed).unwrap();

    let found = orm.manager.find::<CompleteBean>(7).unwrap().unwrap();
    assert_eq!(found.target().name.as_deref(), Some("kept"));
    assert_eq!(found.target().age, Some(50));
}

#[test]
fn test_update_keeps_marker_alive_past_persist_ttl() {
    let orm = TestOrm::new();
    let proxy = orm
        .manager
        .persist_with(CompleteBean::new(42, "a"), Options::new().with_ttl(10))
        .unwrap();
    let mut managed = Managed::from(proxy);
    managed.as_proxy_mut().unwrap().set("age", 3i64).unwrap();
    orm.manager.update(&mut managed).unwrap();

    orm.clock.advance(Duration::from_secs(11));

    let found = orm.manager.find::<CompleteBean>(42).unwrap();
    let proxied = orm.manager.get_proxy::<CompleteBean>(42).unwrap();
    assert_eq!(found.is_some(), proxied.is_some());
    assert_eq!(found.unwrap().target().age, Some(3));
    let mut lazy = proxied.unwrap();
    assert_eq!(lazy.get("age").unwrap(), Value::Long(3));
}

#[test]
fn test_update_with_ttl_expires_marker_and_fields_together() {
    let orm = TestOrm::new();
    let proxy = orm
        .manager
        .persist_with(CompleteBean::new(43, "b"), Options::new().with_ttl(5))
        .unwrap();
    let mut managed = Managed::from(proxy);
    managed.as_proxy_mut().unwrap().set("name", "c").unwrap();
    orm.manager
        .update_with(&mut managed, Options::new().with_ttl(5))
        .unwrap();

    orm.clock.advance(Duration::from_secs(6));
    assert!(orm.manager.find::<CompleteBean>(43).unwrap().is_none());
    assert!(orm.manager.get_proxy::<CompleteBean>(43).unwrap().is_none());
}
