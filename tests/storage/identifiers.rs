//! Block identifier generator: increasing ids, disjoint blocks across
//! generators sharing one database file.

use crate::{open_file_substrate, open_substrate};
use quire_storage::{LinearBlockIdGenerator, StorageLocation, DOCUMENT_DIMENSION};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn ids_increase_across_block_boundaries() {
    let sql = open_substrate(StorageLocation::Memory, "");
    let ids = LinearBlockIdGenerator::new(sql.anchor().clone(), sql.names(), 4).unwrap();

    let issued: Vec<i64> = (0..10).map(|_| ids.next_id(DOCUMENT_DIMENSION).unwrap()).collect();
    assert_eq!(issued, (1..=10).collect::<Vec<_>>());

    let next_val: i64 = sql
        .anchor()
        .lock()
        .query_row(
            "SELECT \"NextVal\" FROM \"Identifiers\" WHERE \"Dimension\" = 'Document'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(next_val, 13);
}

#[test]
fn dimensions_are_independent() {
    let sql = open_substrate(StorageLocation::Memory, "");
    let ids = LinearBlockIdGenerator::new(sql.anchor().clone(), sql.names(), 20).unwrap();

    assert_eq!(ids.next_id("Document").unwrap(), 1);
    assert_eq!(ids.next_id("Comment").unwrap(), 1);
    assert_eq!(ids.next_id("Document").unwrap(), 2);
}

#[test]
fn zero_block_size_is_rejected() {
    let sql = open_substrate(StorageLocation::Memory, "");
    assert!(LinearBlockIdGenerator::new(sql.anchor().clone(), sql.names(), 0).is_err());
}

#[test]
fn generators_on_one_file_never_overlap() {
    let dir = tempfile::tempdir().unwrap();
    drop(open_file_substrate(dir.path()));
    let threads = 4;
    let per_thread = 50;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let path = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let sql = open_file_substrate(&path);
                let ids =
                    LinearBlockIdGenerator::new(sql.anchor().clone(), sql.names(), 7).unwrap();
                barrier.wait();
                let issued: Vec<i64> = (0..per_thread)
                    .map(|_| ids.next_id(DOCUMENT_DIMENSION).unwrap())
                    .collect();
                issued
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        let issued = handle.join().unwrap();
        for pair in issued.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for id in issued {
            assert!(seen.insert(id), "id {} issued twice", id);
        }
    }
    assert_eq!(seen.len(), threads * per_thread);
}
