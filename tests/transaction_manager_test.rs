//! Integration tests for the transaction status file.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use keeldb::{Error, TransactionManager, TransactionStatus};
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Concurrent `begin` calls hand out exactly `1..=counter`.
#[test]
fn test_concurrent_begin_is_dense() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("t");
    let tm = Arc::new(TransactionManager::create(&path).unwrap());

    let mut handles = vec![];
    for _ in 0..8 {
        let tm = Arc::clone(&tm);
        handles.push(thread::spawn(move || {
            (0..25).map(|_| tm.begin().unwrap()).collect::<Vec<_>>()
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for xid in handle.join().unwrap() {
            assert!(seen.insert(xid), "xid {} handed out twice", xid);
        }
    }

    assert_eq!(tm.xid_counter(), 200);
    assert_eq!(seen, (1..=200).collect::<HashSet<_>>());
    for xid in 1..=200 {
        assert!(tm.is_active(xid).unwrap());
    }
    drop(tm);

    let tm = TransactionManager::open(&path).unwrap();
    assert_eq!(tm.xid_counter(), 200);
}

/// Statuses survive a reopen.
#[test]
fn test_status_persists() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("t");

    {
        let tm = TransactionManager::create(&path).unwrap();
        for _ in 0..6 {
            tm.begin().unwrap();
        }
        tm.commit(5).unwrap();
        tm.abort(6).unwrap();
    }

    let tm = TransactionManager::open(&path).unwrap();
    assert!(tm.is_committed(5).unwrap());
    assert!(!tm.is_active(5).unwrap());
    assert!(tm.is_aborted(6).unwrap());
    assert_eq!(tm.status(4).unwrap(), TransactionStatus::Active);
}

/// Commits from many threads land on the right bytes.
#[test]
fn test_concurrent_status_writes() {
    let dir = tempdir().unwrap();
    let tm = Arc::new(TransactionManager::create(&dir.path().join("t")).unwrap());
    let xids: Vec<_> = (0..64).map(|_| tm.begin().unwrap()).collect();

    thread::scope(|s| {
        for chunk in xids.chunks(8) {
            let tm = &tm;
            s.spawn(move || {
                for &xid in chunk {
                    if xid % 2 == 0 {
                        tm.commit(xid).unwrap();
                    } else {
                        tm.abort(xid).unwrap();
                    }
                }
            });
        }
    });

    for xid in xids {
        assert_eq!(tm.is_committed(xid).unwrap(), xid % 2 == 0);
        assert_eq!(tm.is_aborted(xid).unwrap(), xid % 2 == 1);
    }
}

/// A crash after `begin` wrote the status byte but before it wrote the
/// counter leaves a file the next open refuses.
#[test]
fn test_crash_inside_begin_is_fatal() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("t");
    {
        let tm = TransactionManager::create(&path).unwrap();
        tm.begin().unwrap();
    }

    // Status byte for xid 2 with the counter still at 1
    let xid_path = dir.path().join("t.xid");
    let mut bytes = std::fs::read(&xid_path).unwrap();
    bytes.push(TransactionStatus::Active as u8);
    std::fs::write(&xid_path, bytes).unwrap();

    assert!(matches!(
        TransactionManager::open(&path),
        Err(Error::BadStatusFile)
    ));
}
