use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, UNIX_EPOCH};

use lodge::clock::ManualClock;
use lodge::config::{SessionBackend, SessionConfig};
use lodge::session::{self, DurableStore, SessionStore};
use tempfile::TempDir;
use tokio::runtime::Runtime;

const TIMEOUT: Duration = Duration::from_secs(120);

// Fields drop in order: the store goes before its runtime.
struct Fixture {
    store: DurableStore,
    clock: Arc<ManualClock>,
    _runtime: Runtime,
    dir: TempDir,
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000)))
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn open_at(runtime: &Runtime, path: &Path, clock: Arc<ManualClock>) -> DurableStore {
    runtime
        .block_on(DurableStore::open(path.join("sessions.db"), TIMEOUT, clock))
        .unwrap()
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let runtime = runtime();
    let clock = clock();
    let store = open_at(&runtime, dir.path(), clock.clone());

    Fixture {
        store,
        clock,
        _runtime: runtime,
        dir,
    }
}

#[test]
fn test_create_then_validate() {
    let f = fixture();

    let session = f.store.create("alice").unwrap();
    assert!(f.store.validate(&session.id).unwrap());

    let current = f.store.get(&session.id).unwrap().unwrap();
    assert_eq!(current.identity, "alice");
    assert_eq!(current.created_at, session.created_at);
}

#[test]
fn test_expired_session_is_removed_on_lookup() {
    let f = fixture();

    let session = f.store.create("alice").unwrap();
    f.clock.advance(TIMEOUT + Duration::from_secs(1));

    assert!(!f.store.validate(&session.id).unwrap());
    assert!(!f.store.destroy(&session.id).unwrap());
    assert_eq!(f.store.active_count().unwrap(), 0);
}

#[test]
fn test_session_lives_through_its_deadline() {
    let f = fixture();
    let session = f.store.create("alice").unwrap();

    f.clock.advance(TIMEOUT);
    assert!(f.store.validate(&session.id).unwrap());
}

#[test]
fn test_get_slides_the_deadline() {
    let f = fixture();
    let session = f.store.create("alice").unwrap();

    f.clock.advance(Duration::from_secs(100));
    let touched = f.store.get(&session.id).unwrap().unwrap();
    assert_eq!(touched.expires_at, session.expires_at + Duration::from_secs(100));

    f.clock.advance(Duration::from_secs(100));
    assert!(f.store.validate(&session.id).unwrap());

    // The sweep must see the moved deadline, not the original one.
    assert_eq!(f.store.sweep().unwrap(), 0);
    assert!(f.store.validate(&session.id).unwrap());
}

#[test]
fn test_destroy_and_unknown_ids() {
    let f = fixture();
    let session = f.store.create("alice").unwrap();

    assert!(f.store.destroy(&session.id).unwrap());
    assert!(!f.store.destroy(&session.id).unwrap());
    assert!(f.store.get("").unwrap().is_none());
    assert!(f.store.get("no-such-id").unwrap().is_none());
    assert!(!f.store.set_value("no-such-id", "k", "v").unwrap());
}

#[test]
fn test_set_value_keeps_deadline() {
    let f = fixture();
    let session = f.store.create("alice").unwrap();

    f.clock.advance(Duration::from_secs(60));
    assert!(f.store.set_value(&session.id, "cart", "3").unwrap());

    f.clock.advance(Duration::from_secs(61));
    assert!(f.store.get(&session.id).unwrap().is_none(), "set_value does not refresh");
    assert!(!f.store.set_value(&session.id, "cart", "4").unwrap());
}

#[test]
fn test_sessions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime();
    let clock = clock();

    let id = {
        let store = open_at(&runtime, dir.path(), clock.clone());
        let session = store.create("alice").unwrap();
        assert!(store.set_value(&session.id, "theme", "dark").unwrap());
        session.id
    };

    let store = open_at(&runtime, dir.path(), clock);
    let session = store.get(&id).unwrap().unwrap();
    assert_eq!(session.identity, "alice");
    assert_eq!(session.get("theme"), Some("dark"));
}

#[test]
fn test_independent_handles_share_the_file() {
    let f = fixture();
    let other_runtime = runtime();
    let other = open_at(&other_runtime, f.dir.path(), f.clock.clone());

    let session = f.store.create("alice").unwrap();
    assert!(other.validate(&session.id).unwrap());

    assert!(other.set_value(&session.id, "theme", "dark").unwrap());
    assert_eq!(
        f.store.get(&session.id).unwrap().unwrap().get("theme"),
        Some("dark")
    );

    assert!(other.destroy(&session.id).unwrap());
    assert!(!f.store.validate(&session.id).unwrap());
    assert_eq!(f.store.active_count().unwrap(), 0);

    drop(other);
}

#[test]
fn test_sweep_counts_expired() {
    let f = fixture();

    for name in ["a", "b", "c"] {
        f.store.create(name).unwrap();
    }
    f.clock.advance(Duration::from_secs(60));
    let survivor = f.store.create("d").unwrap();

    f.clock.advance(Duration::from_secs(61));
    assert_eq!(f.store.sweep().unwrap(), 3);
    assert_eq!(f.store.sweep().unwrap(), 0);
    assert_eq!(f.store.active_count().unwrap(), 1);
    assert!(f.store.validate(&survivor.id).unwrap());
}

#[test]
fn test_sweep_sees_sub_millisecond_expiry() {
    let f = fixture();
    f.store.create("alice").unwrap();

    f.clock.advance(TIMEOUT);
    assert_eq!(f.store.sweep().unwrap(), 0);

    f.clock.advance(Duration::from_micros(1));
    assert_eq!(f.store.sweep().unwrap(), 1);
}

#[test]
fn test_concurrent_clones_share_records() {
    let f = fixture();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = f.store.clone();
            thread::spawn(move || {
                (0..10)
                    .map(|j| store.create(&format!("t{}-{}", i, j)).unwrap().id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(f.store.active_count().unwrap(), 40);
    for id in &ids {
        assert!(f.store.validate(id).unwrap());
    }
}

#[test]
fn test_concurrent_get_on_expired_sessions() {
    let f = fixture();
    let ids: Vec<String> = (0..20)
        .map(|i| f.store.create(&format!("user{}", i)).unwrap().id)
        .collect();

    f.clock.advance(TIMEOUT + Duration::from_secs(1));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = f.store.clone();
            let ids = ids.clone();
            thread::spawn(move || {
                ids.iter()
                    .map(|id| store.get(id))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for h in handles {
        for result in h.join().unwrap() {
            assert!(result.unwrap().is_none());
        }
    }
    assert_eq!(f.store.active_count().unwrap(), 0);
}

#[test]
fn test_open_store_durable_backend() {
    let dir = TempDir::new().unwrap();
    let runtime = runtime();
    let cfg = SessionConfig {
        backend: SessionBackend::Durable,
        db_path: dir.path().join("db").join("sessions.db"),
        ..SessionConfig::default()
    };

    let store = runtime.block_on(session::open_store(&cfg, clock())).unwrap();
    let s = store.create("alice").unwrap();
    assert!(store.validate(&s.id).unwrap());
    assert_eq!(store.timeout(), Duration::from_secs(120));
    assert!(dir.path().join("db").join("sessions.db").exists());

    drop(store);
}
