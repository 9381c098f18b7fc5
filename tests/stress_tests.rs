//! Stress tests for concurrent access and boundary values.
//!
//! These tests hammer one store from many threads and push the field limits
//! to their edges.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use notes_mcp::store::{Limits, ListFilter, NoteStore, NotePatch, StoreErrorKind};
use tempfile::tempdir;

const THREADS: usize = 8;
const PER_THREAD: usize = 25;

fn ready_store(path: &std::path::Path) -> Arc<NoteStore> {
    let store = Arc::new(NoteStore::new(path, Limits::default()));
    store.initialize().expect("Failed to initialise store");
    store
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_creates_all_persist() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("notes.json");
    let store = ready_store(&path);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|i| {
                        store
                            .create(&format!("t{t} n{i}"), "body", None)
                            .expect("Failed to create")
                            .id
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: HashSet<_> = handles
        .into_iter()
        .flat_map(|h| h.join().expect("Writer thread panicked"))
        .collect();
    assert_eq!(ids.len(), THREADS * PER_THREAD);
    assert_eq!(store.len(), THREADS * PER_THREAD);

    drop(store);
    let reopened = ready_store(&path);
    let persisted: HashSet<_> = reopened
        .list(&ListFilter::default())
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(persisted, ids);
}

#[test]
fn test_readers_see_whole_notes_during_updates() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = ready_store(&temp_dir.path().join("notes.json"));
    let note = store.create("counter", "0", None).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 1..=100 {
                let patch = NotePatch {
                    title: Some(format!("counter {i}")),
                    content: Some(i.to_string()),
                    ..NotePatch::default()
                };
                store.update(&note.id, patch).expect("Failed to update");
            }
        })
    };

    // Title and content are always written together.
    while !writer.is_finished() {
        let seen = store.get(&note.id).unwrap().expect("Note vanished");
        if seen.content != "0" {
            assert_eq!(seen.title, format!("counter {}", seen.content));
        }
    }
    writer.join().expect("Writer thread panicked");

    let last = store.get(&note.id).unwrap().unwrap();
    assert_eq!(last.content, "100");
}

#[test]
fn test_concurrent_create_and_delete() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = ready_store(&temp_dir.path().join("notes.json"));
    let doomed: Vec<_> = (0..50)
        .map(|i| store.create(&format!("old {i}"), "", None).unwrap().id)
        .collect();

    let deleter = {
        let store = Arc::clone(&store);
        thread::spawn(move || doomed.iter().filter(|id| store.delete(id).unwrap()).count())
    };
    let creator = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..50 {
                store.create(&format!("new {i}"), "", None).unwrap();
            }
        })
    };

    assert_eq!(deleter.join().unwrap(), 50);
    creator.join().unwrap();

    let titles: Vec<_> = store
        .list(&ListFilter::default())
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert_eq!(titles.len(), 50);
    assert!(titles.iter().all(|t| t.starts_with("new ")));
}

#[test]
fn test_page_total_agrees_with_page_during_writes() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = ready_store(&temp_dir.path().join("notes.json"));

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..100 {
                store.create(&format!("n{i}"), "", None).unwrap();
            }
        })
    };

    let filter = ListFilter::default().with_offset(10).with_limit(25);
    let mut last_total = 0;
    while !writer.is_finished() {
        let (total, notes) = store.page(&filter).unwrap();
        assert_eq!(notes.len(), total.saturating_sub(10).min(25));
        assert!(total >= last_total);
        last_total = total;
    }
    writer.join().expect("Writer thread panicked");

    let (total, notes) = store.page(&filter).unwrap();
    assert_eq!(total, 100);
    assert_eq!(notes.len(), 25);
    assert_eq!(notes[0].title, "n10");
}

#[test]
fn test_store_shared_with_async_tasks() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = ready_store(&temp_dir.path().join("notes.json"));

    let created = tokio_test::block_on(async {
        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::task::spawn_blocking(move || {
                    store.create(&format!("task {i}"), "", Some(vec!["async".into()]))
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            task.await.expect("Task panicked").expect("Failed to create");
            created += 1;
        }
        created
    });

    assert_eq!(created, 4);
    assert_eq!(
        store.count(&ListFilter::default().with_tag("async")).unwrap(),
        4
    );
}

// =============================================================================
// Boundary Tests
// =============================================================================

#[test]
fn test_title_at_and_over_limit() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = ready_store(&temp_dir.path().join("notes.json"));
    let max = store.limits().max_title_chars;

    // Multi-byte characters count once each.
    let at_limit = "é".repeat(max);
    assert!(store.create(&at_limit, "", None).is_ok());

    let over = "é".repeat(max + 1);
    let err = store.create(&over, "", None).unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Validation);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_content_limit_and_empty_content() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = ready_store(&temp_dir.path().join("notes.json"));
    let max = store.limits().max_content_chars;

    assert!(store.create("empty", "", None).is_ok());
    assert!(store.create("full", &"x".repeat(max), None).is_ok());
    let err = store
        .create("too full", &"x".repeat(max + 1), None)
        .unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Validation);
}

#[test]
fn test_tag_count_limit() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = ready_store(&temp_dir.path().join("notes.json"));
    let max = store.limits().max_tags;

    let tags: Vec<String> = (0..max).map(|i| format!("tag{i}")).collect();
    assert!(store.create("many tags", "", Some(tags.clone())).is_ok());

    let mut too_many = tags;
    too_many.push("one-more".into());
    let err = store.create("too many", "", Some(too_many)).unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Validation);
}

#[test]
fn test_pagination_past_end() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = ready_store(&temp_dir.path().join("notes.json"));
    for i in 0..5 {
        store.create(&format!("n{i}"), "", None).unwrap();
    }

    let filter = ListFilter::default().with_offset(3).with_limit(10);
    assert_eq!(store.list(&filter).unwrap().len(), 2);
    assert_eq!(store.count(&filter).unwrap(), 5);

    let beyond = ListFilter::default().with_offset(100);
    assert!(store.list(&beyond).unwrap().is_empty());
}
