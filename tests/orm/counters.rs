//! Counter columns: increments and read-through

use crate::common::*;

#[test]
fn test_persist_initial_counter_value() {
    let orm = TestOrm::new();
    let mut bean = CompleteBean::new(1, "c");
    bean.version = Some(3);

    let mut proxy = orm.manager.persist(bean).unwrap();
    assert_eq!(orm.count(StatementKind::CounterIncrement), 1);
    assert!(!proxy.is_loaded("version"));
    assert_eq!(proxy.get("version").unwrap(), Value::Long(3));
}

#[test]
fn test_counter_reads_exclude_pending_increments() {
    let orm = TestOrm::new();
    let mut bean = CompleteBean::new(2, "c");
    bean.version = Some(1);
    let mut proxy = orm.manager.persist(bean).unwrap();

    proxy.increment("version", 4).unwrap();
    assert_eq!(proxy.get("version").unwrap(), Value::Long(1));

    let mut managed = Managed::from(proxy);
    orm.manager.update(&mut managed).unwrap();
    let proxy = managed.as_proxy_mut().unwrap();
    assert!(proxy.pending_counter_deltas().is_empty());
    assert_eq!(proxy.get("version").unwrap(), Value::Long(5));
}

#[test]
fn test_counter_is_read_through_every_time() {
    let orm = TestOrm::new();
    let mut bean = CompleteBean::new(3, "c");
    bean.version = Some(10);
    let mut first = orm.manager.persist(bean).unwrap();

    let mut second = Managed::from(orm.manager.find::<CompleteBean>(3).unwrap().unwrap());
    second.as_proxy_mut().unwrap().increment("version", 5).unwrap();
    orm.manager.update(&mut second).unwrap();

    assert_eq!(first.get("version").unwrap(), Value::Long(15));
}

#[test]
fn test_unset_counter_reads_null() {
    let orm = TestOrm::new();
    let mut proxy = orm.manager.persist(CompleteBean::new(4, "c")).unwrap();
    assert_eq!(orm.count(StatementKind::CounterIncrement), 0);
    assert_eq!(proxy.get("version").unwrap(), Value::Null);
}

#[test]
fn test_counter_cannot_be_set() {
    let orm = TestOrm::new();
    let mut proxy = orm.manager.persist(CompleteBean::new(5, "c")).unwrap();
    assert!(matches!(
        proxy.set("version", 1i64).unwrap_err(),
        Error::Validation(_)
    ));
    assert!(matches!(
        proxy.increment("age", 1).unwrap_err(),
        Error::Validation(_)
    ));
}

#[test]
fn test_remove_clears_counters() {
    let orm = TestOrm::new();
    let mut bean = CompleteBean::new(6, "c");
    bean.version = Some(2);
    let mut proxy = orm.manager.persist(bean).unwrap();

    orm.manager.remove_by_id::<CompleteBean>(6).unwrap();
    assert_eq!(proxy.get("version").unwrap(), Value::Null);
}
