//! End-to-end persistence scenarios: restart round-trips and the +P mode
//! toggle, driven the way the host drives the backend (set limits, add
//! lines, periodic ticks).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scrollback_backend::{HistoryBackend, HistoryConfig, MemBackend};
use scrollback_history::{
    format_server_time, HistoryFilter, ManualClock, MessageTag, CLEAN_SPREAD,
};
use tempfile::TempDir;

const SECRET: &str = "integration test secret";
const T0: i64 = 1_700_000_000;

fn persist_config(dir: &Path) -> HistoryConfig {
    HistoryConfig {
        persist: true,
        directory: dir.to_path_buf(),
        db_secret: Some(SECRET.into()),
    }
}

fn boot(
    dir: &Path,
    clock: Arc<ManualClock>,
    eligible: Arc<AtomicBool>,
) -> MemBackend {
    MemBackend::with_clock(
        clock,
        persist_config(dir),
        Box::new(move |_: &str| eligible.load(Ordering::SeqCst)),
    )
    .expect("backend boots")
}

/// Enough ticks to cover the whole object table once.
fn full_sweep(backend: &mut MemBackend) {
    for _ in 0..CLEAN_SPREAD {
        backend.tick();
    }
}

fn time_tag(t: i64) -> Vec<MessageTag> {
    vec![MessageTag::new(
        "time",
        format_server_time(chrono::DateTime::from_timestamp(t, 0).unwrap()),
    )]
}

/// Per-object files in the directory (`master.db` excluded).
fn object_file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.ends_with(".db") && name != "master.db"
        })
        .count()
}

#[test]
fn test_restart_roundtrip() {
    let dir = TempDir::new().unwrap();
    let eligible = Arc::new(AtomicBool::new(true));

    // First lifetime: ingest and persist.
    {
        let clock = Arc::new(ManualClock::at(T0));
        let mut backend = boot(dir.path(), clock, eligible.clone());
        backend.set_limit("#c", 5, 3600);
        backend.add("#c", &time_tag(T0), "first");
        let mut tags = time_tag(T0 + 1);
        tags.push(MessageTag::new("foo", "bar"));
        backend.add("#c", &tags, "second");
        backend.add("#c", &time_tag(T0 + 2), "third");

        full_sweep(&mut backend);
        assert_eq!(object_file_count(dir.path()), 1);
        assert!(!backend.store().find("#c").unwrap().is_dirty());
    }

    // Second lifetime: the host registers the channel, then the first tick
    // replays the directory.
    {
        let clock = Arc::new(ManualClock::at(T0 + 10));
        let mut backend = boot(dir.path(), clock, eligible.clone());
        backend.set_limit("#c", 5, 3600);
        backend.tick();

        let obj = backend.store().find("#c").unwrap();
        assert_eq!(obj.num_lines(), 3);
        assert!(!obj.is_dirty());

        let result = backend
            .request("#c", &HistoryFilter::new().last_seconds(3600).last_lines(10))
            .unwrap();
        let texts: Vec<_> = result.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
        assert_eq!(result.lines[1].t, T0 + 1);
        assert!(result.lines[1]
            .tags
            .iter()
            .any(|t| t.name == "foo" && t.value.as_deref() == Some("bar")));
    }
}

#[test]
fn test_restart_without_registration_deletes_file() {
    let dir = TempDir::new().unwrap();
    let eligible = Arc::new(AtomicBool::new(true));

    {
        let clock = Arc::new(ManualClock::at(T0));
        let mut backend = boot(dir.path(), clock, eligible.clone());
        backend.set_limit("#gone", 5, 3600);
        backend.add("#gone", &time_tag(T0), "x");
        full_sweep(&mut backend);
        assert_eq!(object_file_count(dir.path()), 1);
    }

    // The channel lost its history mode while the server was down; the
    // host never calls set_limit for it, so its file is reclaimed.
    {
        let clock = Arc::new(ManualClock::at(T0 + 10));
        let mut backend = boot(dir.path(), clock, eligible.clone());
        backend.tick();
        assert_eq!(object_file_count(dir.path()), 0);
        assert!(backend.request("#gone", &HistoryFilter::new()).is_none());
    }
}

#[test]
fn test_mode_toggle_deletes_then_rewrites() {
    let dir = TempDir::new().unwrap();
    let eligible = Arc::new(AtomicBool::new(true));
    let clock = Arc::new(ManualClock::at(T0));
    let mut backend = boot(dir.path(), clock, eligible.clone());

    backend.set_limit("#d", 5, 3600);
    backend.add("#d", &time_tag(T0), "one");
    backend.add("#d", &time_tag(T0 + 1), "two");
    full_sweep(&mut backend);
    assert_eq!(object_file_count(dir.path()), 1);

    // Channel drops +P: file goes now, object marked dirty.
    eligible.store(false, Ordering::SeqCst);
    backend.mode_char_del("#d", 'P');
    assert_eq!(object_file_count(dir.path()), 0);
    assert!(backend.store().find("#d").unwrap().is_dirty());

    // While ineligible, sweeps must not bring the file back.
    full_sweep(&mut backend);
    assert_eq!(object_file_count(dir.path()), 0);

    // +P again: the dirty mark alone gets the file rewritten, without a
    // new message in between.
    eligible.store(true, Ordering::SeqCst);
    full_sweep(&mut backend);
    assert_eq!(object_file_count(dir.path()), 1);
    assert!(!backend.store().find("#d").unwrap().is_dirty());
}

#[test]
fn test_unrelated_mode_char_is_ignored() {
    let dir = TempDir::new().unwrap();
    let eligible = Arc::new(AtomicBool::new(true));
    let clock = Arc::new(ManualClock::at(T0));
    let mut backend = boot(dir.path(), clock, eligible.clone());

    backend.set_limit("#d", 5, 3600);
    backend.add("#d", &time_tag(T0), "one");
    full_sweep(&mut backend);

    backend.mode_char_del("#d", 'k');
    assert_eq!(object_file_count(dir.path()), 1);
    assert!(!backend.store().find("#d").unwrap().is_dirty());
}

#[test]
fn test_destroy_removes_file_and_object() {
    let dir = TempDir::new().unwrap();
    let eligible = Arc::new(AtomicBool::new(true));
    let clock = Arc::new(ManualClock::at(T0));
    let mut backend = boot(dir.path(), clock, eligible.clone());

    backend.set_limit("#d", 5, 3600);
    backend.add("#d", &time_tag(T0), "one");
    full_sweep(&mut backend);
    assert_eq!(object_file_count(dir.path()), 1);

    assert!(backend.destroy("#d"));
    assert_eq!(object_file_count(dir.path()), 0);
    assert!(backend.request("#d", &HistoryFilter::new()).is_none());
    assert!(!backend.destroy("#d"));
}

#[test]
fn test_flush_persists_without_waiting_for_sweeps() {
    let dir = TempDir::new().unwrap();
    let eligible = Arc::new(AtomicBool::new(true));
    let clock = Arc::new(ManualClock::at(T0));
    let mut backend = boot(dir.path(), clock, eligible.clone());

    backend.set_limit("#q", 5, 3600);
    backend.add("#q", &time_tag(T0), "going down");

    backend.flush();
    assert_eq!(object_file_count(dir.path()), 1);
    assert!(!backend.store().find("#q").unwrap().is_dirty());
}

#[test]
fn test_age_expiry_reaches_disk() {
    let dir = TempDir::new().unwrap();
    let eligible = Arc::new(AtomicBool::new(true));
    let clock = Arc::new(ManualClock::at(T0));
    let mut backend = boot(dir.path(), clock.clone(), eligible.clone());

    backend.set_limit("#old", 10, 60);
    backend.add("#old", &time_tag(T0), "fleeting");
    full_sweep(&mut backend);

    // Expiry marks the object dirty; the same sweep pass rewrites the file
    // with the (now empty) log.
    clock.advance(120);
    full_sweep(&mut backend);

    let obj = backend.store().find("#old").unwrap();
    assert_eq!(obj.num_lines(), 0);
    assert!(!obj.is_dirty());

    // A restarted backend sees the empty log, not the expired line.
    drop(backend);
    let clock = Arc::new(ManualClock::at(T0 + 200));
    let mut backend = boot(dir.path(), clock, eligible);
    backend.set_limit("#old", 10, 60);
    backend.tick();
    let result = backend
        .request("#old", &HistoryFilter::new().last_lines(10))
        .unwrap();
    assert!(result.lines.is_empty());
}
