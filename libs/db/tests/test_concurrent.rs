//! Concurrency tests: key uniqueness under concurrent saves and racy
//! partition creation.

use chrono::{DateTime, Duration, Utc};
use logbook_db::{LogRecord, Storage, StorageConfig};
use tempfile::TempDir;

fn ts(text: &str) -> DateTime<Utc> {
    text.parse().unwrap()
}

#[test]
fn concurrent_saves_to_one_namespace_produce_distinct_records() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path().join("db"), StorageConfig::default()).unwrap();

    // Identical timestamps force every key through the sequence tie-break.
    let t = ts("2020-05-05T12:00:00.000Z");
    let threads = 8;
    let per_thread = 10;

    std::thread::scope(|scope| {
        for thread in 0..threads {
            let storage = &storage;
            scope.spawn(move || {
                for i in 0..per_thread {
                    let mut record = LogRecord {
                        message: format!("t{thread}-m{i}"),
                        level: 3,
                        tags: vec![],
                        created_at: Some(t),
                    };
                    storage.save("shared", &mut record).unwrap();
                }
            });
        }
    });

    let records = storage.load("shared", 0, &[], t, t, 1).unwrap();
    assert_eq!(records.len(), threads * per_thread);

    let mut messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
    messages.sort_unstable();
    messages.dedup();
    assert_eq!(messages.len(), threads * per_thread);
}

#[test]
fn concurrent_saves_to_distinct_namespaces_create_each_partition_once() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path().join("db"), StorageConfig::default()).unwrap();
    let t = ts("2020-05-05T12:00:00.000Z");

    std::thread::scope(|scope| {
        for thread in 0..8 {
            let storage = &storage;
            scope.spawn(move || {
                // Several threads race on every namespace.
                for app in ["alpha", "beta", "gamma", "delta"] {
                    let mut record = LogRecord {
                        message: format!("from-{thread}"),
                        level: 2,
                        tags: vec![],
                        created_at: Some(t),
                    };
                    storage.save(app, &mut record).unwrap();
                }
            });
        }
    });

    for app in ["alpha", "beta", "gamma", "delta"] {
        let records = storage.load(app, 0, &[], t, t, 1).unwrap();
        assert_eq!(records.len(), 8, "namespace {app}");
    }
}

#[test]
fn pagination_has_no_overlap_or_gap_across_pages() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(
        dir.path().join("db"),
        StorageConfig {
            records_per_page: 7,
            ..StorageConfig::default()
        },
    )
    .unwrap();

    let base = ts("2020-05-05T12:00:00.000Z");
    for i in 0..20i64 {
        let mut record = LogRecord {
            message: format!("m{i}"),
            level: 3,
            tags: vec![],
            created_at: Some(base + Duration::milliseconds(i)),
        };
        storage.save("app", &mut record).unwrap();
    }

    let end = base + Duration::seconds(1);
    let mut collected = Vec::new();
    for page in 1.. {
        let records = storage.load("app", 0, &[], base, end, page).unwrap();
        if records.is_empty() {
            break;
        }
        collected.extend(records.into_iter().map(|r| r.message));
    }

    let expected: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();
    assert_eq!(collected, expected);
}
