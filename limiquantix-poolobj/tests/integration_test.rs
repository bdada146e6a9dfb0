//! Integration tests for the pool-object table.
//!
//! These exercise the public API end to end, including several threads
//! sharing one table.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use limiquantix_poolobj::{
    AclFilterFn, AssignDefFn, LockedPoolObj, MatchFilterFn, PoolObj, PoolObjEntry, PoolObjError,
    PoolObjTable, PoolObjTableType,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct NetDef {
    bridge: String,
    ports: Vec<String>,
}

fn net(bridge: &str) -> NetDef {
    NetDef {
        bridge: bridge.to_string(),
        ports: vec!["eth0".to_string()],
    }
}

fn uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap()
}

fn dual_table() -> PoolObjTable<NetDef> {
    PoolObjTable::with_default_size(PoolObjTableType::Network, false)
}

fn replace_def(
    obj: &mut PoolObj<NetDef>,
    def: NetDef,
    _old_def: Option<&mut Option<NetDef>>,
    _flags: u32,
) -> limiquantix_poolobj::Result<()> {
    obj.set_def(def);
    Ok(())
}

/// A conflicting UUID for an existing name is rejected and the table is
/// left as it was.
#[test]
fn test_conflicting_identity_is_rejected() {
    let table = dual_table();
    let first = uuid("11111111-1111-1111-1111-111111111111");

    drop(
        table
            .add(PoolObjEntry::new("pool-a", net("br-a")).with_uuid(first), None, None, 0)
            .unwrap(),
    );
    assert_eq!(table.len(), 1);
    assert!(table.find_by_uuid(&first).is_some());
    assert!(table.find_by_name("pool-a").is_some());

    let err = table
        .add(
            PoolObjEntry::new("pool-a", net("br-other"))
                .with_uuid(uuid("22222222-2222-2222-2222-222222222222")),
            None,
            None,
            0,
        )
        .unwrap_err();
    assert!(matches!(err, PoolObjError::OperationFailed(_)));

    assert_eq!(table.len(), 1);
    assert_eq!(table.find_by_name("pool-a").unwrap().def(), &net("br-a"));
}

/// A removed object is gone from both indexes.
#[test]
fn test_remove_unindexes_both_keys() {
    let table = dual_table();
    let id = Uuid::new_v4();
    let obj = table
        .add(PoolObjEntry::new("pool-b", net("br-b")).with_uuid(id), None, None, 0)
        .unwrap();

    table.remove(obj);

    assert!(table.find_by_uuid(&id).is_none());
    assert!(table.find_by_uuid_ref(&id).is_none());
    assert!(table.find_by_name("pool-b").is_none());
    assert!(table.is_empty());
}

/// Re-adding a name in a name-only table replaces the definition in place.
#[test]
fn test_name_only_redefinition_replaces_in_place() {
    let table: PoolObjTable<NetDef> =
        PoolObjTable::with_default_size(PoolObjTableType::Volume, true);

    let first = table
        .add(PoolObjEntry::new("vol1", net("d1")), None, None, 0)
        .unwrap()
        .shared();
    let mut old = None;
    let second = table
        .add(PoolObjEntry::new("vol1", net("d2")), None, Some(&mut old), 0)
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second.shared()));
    assert_eq!(second.def(), &net("d2"));
    assert_eq!(old, Some(net("d1")));
    drop(second);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_redefinition_keeps_object_identity() {
    let table = dual_table();
    let id = Uuid::new_v4();
    let assign: &AssignDefFn<NetDef, ()> = &replace_def;

    let first = table
        .add(PoolObjEntry::new("default", net("virbr0")).with_uuid(id), Some(assign), None, 0)
        .unwrap()
        .shared();
    let second = table
        .add(PoolObjEntry::new("default", net("virbr1")).with_uuid(id), Some(assign), None, 0)
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second.shared()));
    assert_eq!(second.def().bridge, "virbr1");
    drop(second);
    assert_eq!(table.len(), 1);
}

/// Strong counts track index slots plus live handles.
#[test]
fn test_reference_count_conservation() {
    let table = dual_table();
    let id = Uuid::new_v4();

    let obj = table
        .add(PoolObjEntry::new("counted", net("br0")).with_uuid(id), None, None, 0)
        .unwrap();
    let handle = obj.shared();
    // two index slots, the guard and `handle`
    assert_eq!(Arc::strong_count(&handle), 4);
    drop(obj);
    assert_eq!(Arc::strong_count(&handle), 3);

    let obj = table.find_by_uuid(&id).unwrap();
    assert_eq!(Arc::strong_count(&handle), 4);
    table.remove(obj);
    assert_eq!(Arc::strong_count(&handle), 1);
    assert!(handle.lock().is_removing());
}

/// A handle held by another thread does not keep a removed object visible.
#[test]
fn test_removal_visible_while_other_thread_holds_reference() {
    let table = Arc::new(dual_table());
    let id = Uuid::new_v4();
    let held = table
        .add(PoolObjEntry::new("shared", net("br0")).with_uuid(id), None, None, 0)
        .unwrap()
        .shared();

    let removed = Arc::new(Barrier::new(2));
    let reader = {
        let removed = Arc::clone(&removed);
        thread::spawn(move || {
            removed.wait();
            let obj = LockedPoolObj::acquire(&held);
            (obj.is_removing(), obj.def().bridge.clone())
        })
    };

    let obj = table.find_by_name("shared").unwrap();
    table.remove(obj);
    assert!(table.find_by_uuid(&id).is_none());
    assert!(table.find_by_name("shared").is_none());
    removed.wait();

    let (is_removing, bridge) = reader.join().unwrap();
    assert!(is_removing);
    assert_eq!(bridge, "br0");
}

/// Concurrent adds of one name with different UUIDs: exactly one wins.
#[test]
fn test_concurrent_add_keeps_names_unique() {
    let table = Arc::new(dual_table());
    let start = Arc::new(Barrier::new(8));

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let table = Arc::clone(&table);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                table
                    .add(
                        PoolObjEntry::new("contended", net(&format!("br{}", i)))
                            .with_uuid(Uuid::new_v4()),
                        None,
                        None,
                        0,
                    )
                    .map(drop)
            })
        })
        .collect();

    let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, PoolObjError::OperationFailed(_))));
    assert_eq!(table.len(), 1);
}

/// Many threads adding, finding and removing distinct objects leave a
/// consistent table behind.
#[test]
fn test_concurrent_add_find_remove() {
    let table = Arc::new(dual_table());

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for i in 0..50 {
                    let name = format!("net-{}-{}", t, i);
                    let id = Uuid::new_v4();
                    drop(
                        table
                            .add(PoolObjEntry::new(name.clone(), net("br0")).with_uuid(id), None, None, 0)
                            .unwrap(),
                    );
                    let obj = table.find_by_uuid(&id).unwrap();
                    assert_eq!(obj.name(), name);
                    if i % 2 == 0 {
                        table.remove(obj);
                        assert!(table.find_by_name(&name).is_none());
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(table.len(), 4 * 25);
    let mut names = HashSet::new();
    table.iterate(|obj| {
        assert!(names.insert(obj.name().to_string()));
    });
    assert_eq!(names.len(), 100);
}

/// Cloned definitions are independent of the source.
#[test]
fn test_clone_fidelity() {
    let table = dual_table();
    for name in ["a", "b", "c"] {
        drop(
            table
                .add(PoolObjEntry::new(name, net(name)).with_uuid(Uuid::new_v4()), None, None, 0)
                .unwrap(),
        );
    }

    let copy = table.clone_table(|obj| Ok(obj.def().clone())).unwrap();
    assert_eq!(copy.len(), table.len());
    assert_eq!(copy.table_type(), table.table_type());
    assert_eq!(copy.name_only(), table.name_only());

    copy.find_by_name("a")
        .unwrap()
        .def_mut()
        .ports
        .push("eth1".to_string());
    assert_eq!(table.find_by_name("a").unwrap().def().ports, vec!["eth0"]);

    let a_uuid = table.find_by_name("a").unwrap().uuid().unwrap();
    assert_eq!(copy.find_by_uuid(&a_uuid).unwrap().name(), "a");
}

/// Collect and list agree on what the ACL lets through.
#[test]
fn test_collect_and_list_agree_on_acl() {
    struct Conn {
        allowed_prefix: &'static str,
    }

    let table = dual_table();
    for name in ["prod-a", "prod-b", "dev-a", "dev-b", "dev-c"] {
        let mut obj = table
            .add(PoolObjEntry::new(name, net(name)).with_uuid(Uuid::new_v4()), None, None, 0)
            .unwrap();
        obj.set_active(name.ends_with('a'));
    }
    let gone = table.find_by_name("dev-c").unwrap();
    table.remove(gone);

    let conn = Conn {
        allowed_prefix: "dev-",
    };
    let acl: &AclFilterFn<Conn, NetDef> = &|conn, def| def.bridge.starts_with(conn.allowed_prefix);

    let mut listed = Vec::new();
    let visited = table
        .list(&conn, Some(acl), |obj| {
            listed.push(obj.name().to_string());
            Ok(())
        })
        .unwrap();
    assert_eq!(visited, 2);

    let mut collected: Vec<_> = table
        .collect(&conn, Some(acl), None, 0)
        .iter()
        .map(|shared| shared.lock().name().to_string())
        .collect();
    listed.sort();
    collected.sort();
    assert_eq!(listed, collected);
    assert_eq!(collected, vec!["dev-a", "dev-b"]);

    let active_only: &MatchFilterFn<NetDef, ()> = &|obj, flags| flags == 0 || obj.is_active();
    let active: Vec<_> = table
        .collect(&conn, Some(acl), Some(active_only), 1)
        .iter()
        .map(|shared| shared.lock().name().to_string())
        .collect();
    assert_eq!(active, vec!["dev-a"]);
}
