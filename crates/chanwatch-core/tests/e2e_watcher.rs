/// End-to-end channel watcher tests.
///
/// These run real watcher threads against real temporary directories: the
/// readiness policy, the dispatched-set and the failure handling only mean
/// something against an actual filesystem and an actual clock.
use chanwatch_core::model::{Channel, Message};
use chanwatch_core::shutdown::ShutdownSignal;
use chanwatch_core::watcher::{
    build_observer, ChannelWatcher, ObserverKind, WatcherExit, WatcherOptions, WatcherReport,
};
use chanwatch_core::Handler;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

const FAST: WatcherOptions = WatcherOptions {
    poll_interval: Duration::from_millis(20),
    quiescence: Duration::from_millis(40),
};

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![7u8; n]).unwrap();
}

/// Poll `cond` until it holds, panicking after 10 seconds.
fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Handler that records every message it receives.
fn recorder() -> (Arc<Mutex<Vec<Message>>>, impl Handler + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler = move |m: &Message| -> anyhow::Result<()> {
        sink.lock().push(m.clone());
        Ok(())
    };
    (seen, handler)
}

fn start_watcher(
    dir: &Path,
    kind: ObserverKind,
    options: WatcherOptions,
    handler: impl Handler + 'static,
    signal: &ShutdownSignal,
) -> JoinHandle<WatcherReport> {
    let channel = Channel::inbound(1, "feed", dir);
    let observer = build_observer(kind, dir).unwrap();
    ChannelWatcher::new(channel, observer, Box::new(handler), options)
        .spawn(signal.clone())
        .unwrap()
}

fn file_names(messages: &[Message]) -> Vec<String> {
    let mut names: Vec<String> = messages.iter().map(Message::file_name).collect();
    names.sort();
    names
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Every file is handed to the handler exactly once, even though the
/// watcher keeps rescanning the directory afterwards.
#[test]
fn each_file_is_dispatched_once() {
    let tmp = TempDir::new().unwrap();
    for i in 0..3 {
        write_bytes(&tmp.path().join(format!("{i}.json")), 64);
    }

    let signal = ShutdownSignal::new();
    let (seen, handler) = recorder();
    let handle = start_watcher(tmp.path(), ObserverKind::Poll, FAST, handler, &signal);

    wait_until("three dispatches", || seen.lock().len() == 3);
    // Give the watcher a dozen more cycles to misbehave.
    thread::sleep(FAST.poll_interval * 12);

    signal.request();
    let report = handle.join().unwrap();

    assert_eq!(file_names(&seen.lock()), ["0.json", "1.json", "2.json"]);
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.exit, WatcherExit::Drained);
}

/// A file that keeps growing is not dispatched until it stops growing,
/// and the handler then sees its final size.
#[test]
fn growing_file_waits_for_quiescence() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("photo2.jpg");
    write_bytes(&path, 1024);

    let options = WatcherOptions {
        poll_interval: Duration::from_millis(20),
        quiescence: Duration::from_millis(400),
    };
    let signal = ShutdownSignal::new();
    let (seen, handler) = recorder();
    let handle = start_watcher(tmp.path(), ObserverKind::Poll, options, handler, &signal);

    let mut f = OpenOptions::new().append(true).open(&path).unwrap();
    for _ in 0..15 {
        f.write_all(&[1u8; 1024]).unwrap();
        f.flush().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(seen.lock().is_empty(), "dispatched while still being written");
    }
    drop(f);
    let final_size = fs::metadata(&path).unwrap().len();

    wait_until("dispatch after quiescence", || !seen.lock().is_empty());
    signal.request();
    handle.join().unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].size, final_size);
    assert_eq!(final_size, 16 * 1024);
}

/// Handler errors and panics are reported, the file still counts as
/// dispatched, and the watcher carries on with the next file.
#[test]
fn failing_handler_does_not_stop_the_watcher() {
    let tmp = TempDir::new().unwrap();
    for name in ["bad.json", "good.json", "panic.json"] {
        write_bytes(&tmp.path().join(name), 8);
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = move |m: &Message| -> anyhow::Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        match m.file_name().as_str() {
            "bad.json" => anyhow::bail!("malformed payload"),
            "panic.json" => panic!("handler bug"),
            _ => Ok(()),
        }
    };

    let signal = ShutdownSignal::new();
    let handle = start_watcher(tmp.path(), ObserverKind::Poll, FAST, handler, &signal);

    wait_until("three calls", || calls.load(Ordering::SeqCst) == 3);
    thread::sleep(FAST.poll_interval * 10);
    signal.request();
    let report = handle.join().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3, "failed files must not be retried");
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.failed, 2);
    assert_eq!(report.exit, WatcherExit::Drained);
}

/// Two invocations for one channel never overlap in time.
#[test]
fn handler_is_never_reentered() {
    let tmp = TempDir::new().unwrap();
    for i in 0..6 {
        write_bytes(&tmp.path().join(format!("frame{i}.jpg")), 32);
    }

    let in_flight = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));
    let (flag, overlap_count, done_count) =
        (Arc::clone(&in_flight), Arc::clone(&overlaps), Arc::clone(&done));
    let handler = move |_: &Message| -> anyhow::Result<()> {
        if flag.swap(true, Ordering::SeqCst) {
            overlap_count.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_millis(15));
        flag.store(false, Ordering::SeqCst);
        done_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };

    let signal = ShutdownSignal::new();
    let handle = start_watcher(tmp.path(), ObserverKind::Poll, FAST, handler, &signal);
    wait_until("six calls", || done.load(Ordering::SeqCst) == 6);
    signal.request();
    handle.join().unwrap();

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

/// Removing the watched directory ends only that watcher, without any
/// shutdown request.
#[test]
fn lost_directory_stops_the_watcher() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("ui-input");
    fs::create_dir(&dir).unwrap();

    let signal = ShutdownSignal::new();
    let (_seen, handler) = recorder();
    let handle = start_watcher(&dir, ObserverKind::Poll, FAST, handler, &signal);

    thread::sleep(FAST.poll_interval * 3);
    fs::remove_dir_all(&dir).unwrap();

    let report = handle.join().unwrap();
    assert_eq!(report.exit, WatcherExit::DirectoryLost);
    assert!(!signal.is_draining(), "a lost channel must not stop the runtime");
}

/// Once draining, a watcher starts no dispatch even if ready files exist.
#[test]
fn draining_watcher_dispatches_nothing_new() {
    let tmp = TempDir::new().unwrap();
    write_bytes(&tmp.path().join("late.json"), 16);

    let signal = ShutdownSignal::new();
    signal.request();

    let (seen, handler) = recorder();
    let report = start_watcher(tmp.path(), ObserverKind::Poll, FAST, handler, &signal)
        .join()
        .unwrap();

    assert!(seen.lock().is_empty());
    assert_eq!(report.dispatched, 0);
    assert_eq!(report.exit, WatcherExit::Drained);
}

/// A file rewritten in place with a new modification time is a new message.
#[test]
fn rewritten_file_is_a_new_message() {
    let tmp = TempDir::new().unwrap();
    let path: PathBuf = tmp.path().join("state.json");
    write_bytes(&path, 10);

    let signal = ShutdownSignal::new();
    let (seen, handler) = recorder();
    let handle = start_watcher(tmp.path(), ObserverKind::Poll, FAST, handler, &signal);
    wait_until("first dispatch", || seen.lock().len() == 1);

    let f = OpenOptions::new().write(true).open(&path).unwrap();
    f.set_modified(std::time::SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    drop(f);

    wait_until("second dispatch", || seen.lock().len() == 2);
    signal.request();
    let report = handle.join().unwrap();
    assert_eq!(report.dispatched, 2);
}

/// The event-driven observer honours the same contract as polling.
#[test]
fn native_observer_dispatches_new_files() {
    let tmp = TempDir::new().unwrap();
    let signal = ShutdownSignal::new();
    let (seen, handler) = recorder();
    let handle = start_watcher(tmp.path(), ObserverKind::Native, FAST, handler, &signal);

    thread::sleep(FAST.poll_interval * 2);
    write_bytes(&tmp.path().join("0.json"), 100);
    write_bytes(&tmp.path().join("1.json"), 200);

    wait_until("native dispatches", || seen.lock().len() == 2);
    thread::sleep(FAST.poll_interval * 10);
    signal.request();
    let report = handle.join().unwrap();

    assert_eq!(file_names(&seen.lock()), ["0.json", "1.json"]);
    assert_eq!(report.dispatched, 2);
}
