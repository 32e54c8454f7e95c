//! Lazy loading, initialization and proxy removal

use crate::common::*;
use std::collections::HashSet;

fn seed(orm: &TestOrm, id: i64) {
    let mut bean = CompleteBean::new(id, "lazy");
    bean.age = Some(40);
    bean.bio = Some("long text".to_string());
    orm.manager.persist(bean).unwrap();
    orm.store.clear_statements();
}

#[test]
fn test_get_proxy_loads_only_the_key() {
    let orm = TestOrm::new();
    seed(&orm, 1);

    let proxy = orm.manager.get_proxy::<CompleteBean>(1).unwrap().unwrap();
    assert_eq!(proxy.target().id, Some(1));
    assert!(proxy.loaded_fields().is_empty());
    assert_eq!(proxy.target().name, None);
    assert_eq!(orm.count(StatementKind::Read), 1);
}

#[test]
fn test_get_proxy_of_missing_row_is_none() {
    let orm = TestOrm::new();
    assert!(orm.manager.get_proxy::<CompleteBean>(404).unwrap().is_none());
}

#[test]
fn test_field_loads_on_first_access_only() {
    let orm = TestOrm::new();
    seed(&orm, 2);
    let mut proxy = orm.manager.get_proxy::<CompleteBean>(2).unwrap().unwrap();
    orm.store.clear_statements();

    assert_eq!(proxy.get("name").unwrap(), Value::from("lazy"));
    assert_eq!(proxy.get("name").unwrap(), Value::from("lazy"));
    assert_eq!(orm.count(StatementKind::Read), 1);
    assert!(proxy.is_loaded("name"));
    assert!(!proxy.is_loaded("bio"));
}

#[test]
fn test_initialize_loads_remaining_fields_once() {
    let orm = TestOrm::new();
    seed(&orm, 3);
    let proxy = orm.manager.get_proxy::<CompleteBean>(3).unwrap().unwrap();
    let mut managed = Managed::from(proxy);
    orm.store.clear_statements();

    orm.manager.initialize(&mut managed).unwrap();
    orm.manager.initialize(&mut managed).unwrap();
    assert_eq!(orm.count(StatementKind::Read), 1);

    let proxy = managed.as_proxy_mut().unwrap();
    assert_eq!(proxy.target().bio.as_deref(), Some("long text"));
    assert_eq!(proxy.target().age, Some(40));
    assert!(!proxy.has_changes());
}

#[test]
fn test_initialize_all() {
    let orm = TestOrm::new();
    seed(&orm, 4);
    seed(&orm, 5);
    let mut proxies: Vec<Managed<CompleteBean>> = [4, 5]
        .iter()
        .map(|id| Managed::from(orm.manager.get_proxy::<CompleteBean>(*id).unwrap().unwrap()))
        .collect();

    orm.manager.initialize_all(proxies.iter_mut()).unwrap();
    for managed in &mut proxies {
        assert!(managed.as_proxy_mut().unwrap().is_loaded("bio"));
    }
}

#[test]
fn test_initialize_of_plain_entity_rejected() {
    let orm = TestOrm::new();
    let mut managed = Managed::NonProxy(CompleteBean::new(1, "a"));
    assert!(matches!(
        orm.manager.initialize(&mut managed).unwrap_err(),
        Error::UnexpectedProxyState { .. }
    ));
}

#[test]
fn test_remove_proxy_is_idempotent() {
    let orm = TestOrm::new();
    let proxy = orm.manager.persist(CompleteBean::new(6, "x")).unwrap();

    let plain = orm.manager.remove_proxy(Managed::from(proxy));
    let again = orm.manager.remove_proxy(Managed::NonProxy(plain.clone()));
    assert_eq!(plain, again);
    assert_eq!(plain.name.as_deref(), Some("x"));
}

#[test]
fn test_remove_proxy_list_and_set() {
    let orm = TestOrm::new();
    let a = orm.manager.persist(CompleteBean::new(7, "a")).unwrap();
    let b = orm.manager.persist(CompleteBean::new(8, "b")).unwrap();

    let list = orm
        .manager
        .remove_proxy_list(vec![Managed::from(a.clone()), Managed::from(b.clone())]);
    assert_eq!(list.iter().map(|e| e.id).collect::<Vec<_>>(), vec![Some(7), Some(8)]);

    let set: HashSet<CompleteBean> = orm.manager.remove_proxy_set(vec![
        Managed::from(a),
        Managed::from(b),
        Managed::NonProxy(list[0].clone()),
    ]);
    assert_eq!(set.len(), 2);
}

#[test]
fn test_init_and_remove_proxy_returns_full_entity() {
    let orm = TestOrm::new();
    seed(&orm, 9);
    let proxy = orm.manager.get_proxy::<CompleteBean>(9).unwrap().unwrap();

    let bean = orm.manager.init_and_remove_proxy(Managed::from(proxy)).unwrap();
    assert_eq!(bean.name.as_deref(), Some("lazy"));
    assert_eq!(bean.bio.as_deref(), Some("long text"));

    let list = orm
        .manager
        .init_and_remove_proxy_list(vec![Managed::NonProxy(bean.clone())])
        .unwrap();
    assert_eq!(list, vec![bean]);
}

#[test]
fn test_set_unknown_field_rejected() {
    let orm = TestOrm::new();
    let mut proxy = orm.manager.persist(CompleteBean::new(10, "a")).unwrap();
    assert!(matches!(
        proxy.set("nope", 1i64).unwrap_err(),
        Error::Validation(_)
    ));
}
