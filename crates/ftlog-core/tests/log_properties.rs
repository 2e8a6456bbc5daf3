use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ftlog_core::{
    verify_log_chain, EventLoop, FixedClock, LogConfig, LogError, LogMgr, LogMgrConfig,
    RotationMeta, RotationPolicy, SyncMode,
};
use ftlog_types::{LogEntry, NodeId};
use proptest::prelude::*;

fn config(dir: &Path, log: LogConfig) -> LogMgrConfig {
    LogMgrConfig {
        log_dir: dir.to_path_buf(),
        log,
    }
}

fn fixed_mgr(dir: &Path, log: LogConfig) -> LogMgr {
    LogMgr::with_event_loop(
        config(dir, log),
        Arc::new(EventLoop::start().unwrap()),
        Arc::new(FixedClock::at_secs(1_459_686_896)),
    )
    .unwrap()
}

fn read(dir: &Path, file: &str) -> String {
    fs::read_to_string(dir.join(file)).unwrap()
}

/// Strip a leading chain header, if any.
fn body(chunk: &[u8]) -> &[u8] {
    match LogEntry::parse_chain_header(chunk).unwrap() {
        Some((_, offset)) => &chunk[offset..],
        None => chunk,
    }
}

#[test]
fn open_and_close_leaves_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = LogMgr::new(dir.path().join("nested/logs")).unwrap();
    let log = mgr.open("quiet").unwrap();
    let path = log.log_file_name().to_path_buf();
    mgr.close().unwrap();

    assert!(path.exists());
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn file_is_concatenation_of_returned_lines() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = LogMgr::new(dir.path()).unwrap();
    let log = mgr.open("bar").unwrap();

    let mut expected = String::new();
    for i in 0..500 {
        expected.push_str(&log.log(&format!("message number {i}")).unwrap());
    }
    assert_eq!(log.entry_count(), 500);
    mgr.close().unwrap();

    assert_eq!(read(dir.path(), "bar.log"), expected);
}

#[test]
fn duplicate_open_keeps_original_usable() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = LogMgr::new(dir.path()).unwrap();
    let log = mgr.open("bar").unwrap();
    let first = log.log("before").unwrap();

    assert!(matches!(mgr.open("bar"), Err(LogError::DuplicateLog(_))));
    let second = log.log("after").unwrap();
    mgr.close().unwrap();

    assert_eq!(read(dir.path(), "bar.log"), first + &second);
}

#[test]
fn interleaved_logs_stay_separate() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = LogMgr::new(dir.path()).unwrap();
    let foo = mgr.open("foo").unwrap();
    let bar = mgr.open("bar").unwrap();

    let (mut foo_text, mut bar_text) = (String::new(), String::new());
    for i in 0..100 {
        foo_text.push_str(&foo.log(&format!("foo {i}")).unwrap());
        bar_text.push_str(&bar.log(&format!("bar {i}")).unwrap());
    }
    mgr.close().unwrap();

    assert_eq!(read(dir.path(), "foo.log"), foo_text);
    assert_eq!(read(dir.path(), "bar.log"), bar_text);
}

#[test]
fn oh_hello() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = LogMgr::new(dir.path()).unwrap();
    mgr.open("foo").unwrap().log("oh hello").unwrap();
    mgr.close().unwrap();

    assert!(read(dir.path(), "foo.log").trim_end().ends_with("oh hello"));
}

#[test]
fn four_messages_with_pause() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = LogMgr::new(dir.path()).unwrap();
    let log = mgr.open("bar").unwrap();

    let mut expected = String::new();
    for message in ["this is a test", "of the emergency", "broadcasting"] {
        expected.push_str(&log.log(message).unwrap());
    }
    // Long enough for the flush timer to fire at least once.
    thread::sleep(Duration::from_millis(250));
    expected.push_str(&log.log("system").unwrap());
    mgr.close().unwrap();

    assert_eq!(read(dir.path(), "bar.log"), expected);
    let text = read(dir.path(), "bar.log");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].ends_with(" this is a test"));
    assert!(lines[3].ends_with(" system"));
}

#[test]
fn lines_carry_utc_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = fixed_mgr(dir.path(), LogConfig::default());
    let line = mgr.open("bar").unwrap().log("hi").unwrap();
    assert_eq!(line, "2016-04-03 12:34:56 hi\n");
}

#[test]
fn concurrent_writers_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = LogMgr::new(dir.path()).unwrap();
    let log = mgr.open("shared").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                (0..250)
                    .map(|i| log.log(&format!("thread {t} entry {i:03}")).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let returned: Vec<Vec<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(log.entry_count(), 1000);
    mgr.close().unwrap();

    let text = read(dir.path(), "shared.log");
    assert_eq!(text.len(), returned.iter().flatten().map(String::len).sum::<usize>());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1000);
    for (t, mine) in returned.iter().enumerate() {
        // Each thread's own lines appear in the order it logged them.
        let tag = format!(" thread {t} entry ");
        let seen: Vec<String> = lines
            .iter()
            .filter(|l| l.contains(&tag))
            .map(|l| format!("{l}\n"))
            .collect();
        assert_eq!(&seen, mine);
    }
}

#[test]
fn every_flush_sync_mode_writes_through() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = fixed_mgr(
        dir.path(),
        LogConfig {
            sync_mode: SyncMode::EveryFlush,
            flush_interval_ms: 0,
            ..LogConfig::default()
        },
    );
    let log = mgr.open("bar").unwrap();
    let line = log.log("durable").unwrap();
    log.flush().unwrap();
    assert_eq!(read(dir.path(), "bar.log"), line);
    mgr.close().unwrap();
}

#[test]
fn explicit_rotation_chains_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = fixed_mgr(dir.path(), LogConfig::default());
    let log = mgr.open("bar").unwrap();
    let owner = NodeId::derive("node-a");
    let src = NodeId::derive("rotator");

    let first = log.log("before rotation").unwrap();
    let header = log.rotate(RotationMeta { owner, src }).unwrap();
    assert_eq!(header.path(), "bar.000001.log");
    assert_eq!(header.length() as usize, first.len());
    assert_eq!(header.owner(), &owner);
    assert_eq!(header.src(), &src);
    assert_eq!(header.timestamp().as_secs(), 1_459_686_896);

    let second = log.log("after rotation").unwrap();
    log.log_entry(&header).unwrap();
    mgr.close().unwrap();

    assert_eq!(read(dir.path(), "bar.000001.log"), first);
    let active = fs::read(dir.path().join("bar.log")).unwrap();
    assert!(body(&active).starts_with(second.as_bytes()));

    let headers = verify_log_chain(dir.path(), "bar").unwrap();
    assert_eq!(headers, vec![header]);
}

#[test]
fn size_policy_rotates_automatically() {
    let dir = tempfile::tempdir().unwrap();
    let policy = RotationPolicy {
        max_chunk_bytes: 256,
        owner: NodeId::derive("node-a"),
        src: NodeId::derive("policy"),
    };
    let mgr = fixed_mgr(
        dir.path(),
        LogConfig {
            rotation: Some(policy),
            ..LogConfig::default()
        },
    );
    let log = mgr.open("bar").unwrap();
    let mut expected = Vec::new();
    for i in 0..100 {
        expected.extend_from_slice(log.log(&format!("entry {i}")).unwrap().as_bytes());
    }
    mgr.close().unwrap();

    let headers = verify_log_chain(dir.path(), "bar").unwrap();
    assert!(headers.len() >= 5, "only {} rotations", headers.len());

    let mut logged = Vec::new();
    for path in ftlog_core::chain_files(dir.path(), "bar").unwrap() {
        logged.extend_from_slice(body(&fs::read(path).unwrap()));
    }
    assert_eq!(logged, expected);
}

#[test]
fn rotation_resumes_numbering_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let meta = RotationMeta {
        owner: NodeId::derive("node-a"),
        src: NodeId::derive("rotator"),
    };

    let mgr = fixed_mgr(dir.path(), LogConfig::default());
    let log = mgr.open("bar").unwrap();
    log.log("one").unwrap();
    log.rotate(meta).unwrap();
    mgr.close().unwrap();

    let log = mgr.open("bar").unwrap();
    log.log("two").unwrap();
    let header = log.rotate(meta).unwrap();
    assert_eq!(header.path(), "bar.000002.log");
    mgr.close().unwrap();

    assert_eq!(verify_log_chain(dir.path(), "bar").unwrap().len(), 2);
}

#[test]
fn closed_log_refuses_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = LogMgr::new(dir.path()).unwrap();
    let log = mgr.open("bar").unwrap();
    mgr.close().unwrap();
    mgr.close().unwrap();

    assert!(matches!(log.log("late"), Err(LogError::Closed(_))));
    assert_eq!(fs::metadata(dir.path().join("bar.log")).unwrap().len(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn failed_write_marks_log_unusable() {
    let dir = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink("/dev/full", dir.path().join("full.log")).unwrap();
    let mgr = fixed_mgr(
        dir.path(),
        LogConfig {
            flush_interval_ms: 0,
            ..LogConfig::default()
        },
    );
    let good = mgr.open("good").unwrap();
    let full = mgr.open("full").unwrap();

    let kept = good.log("fine").unwrap();
    // Longer than a page, so it is handed to the writer immediately.
    full.log(&"x".repeat(100)).unwrap();
    assert!(full.flush().is_err());
    assert!(matches!(full.log("again"), Err(LogError::Unusable { .. })));

    match mgr.close() {
        Err(LogError::Close { failures }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "full");
        }
        other => panic!("expected close failure, got {other:?}"),
    }
    assert!(mgr.is_empty());
    assert_eq!(read(dir.path(), "good.log"), kept);
}

#[cfg(target_os = "linux")]
#[test]
fn stalled_writer_reports_flush_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("slow.log");
    assert!(std::process::Command::new("mkfifo")
        .arg(&fifo)
        .status()
        .unwrap()
        .success());
    // Never read from, so the writer blocks once the pipe is full.
    let reader = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&fifo)
        .unwrap();

    let mgr = fixed_mgr(
        dir.path(),
        LogConfig {
            flush_interval_ms: 0,
            flush_timeout_ms: Some(200),
            ..LogConfig::default()
        },
    );
    let good = mgr.open("good").unwrap();
    let slow = mgr.open("slow").unwrap();

    let kept = good.log("fine").unwrap();
    let line = "x".repeat(1000);
    for _ in 0..200 {
        slow.log(&line).unwrap();
    }
    assert!(matches!(
        slow.flush(),
        Err(LogError::FlushTimeout { ref name, after })
            if name == "slow" && after == Duration::from_millis(200)
    ));

    match mgr.close() {
        Err(LogError::Close { failures }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "slow");
            assert!(matches!(failures[0].1, LogError::FlushTimeout { .. }));
        }
        other => panic!("expected close failure, got {other:?}"),
    }
    assert!(good.is_closed());
    assert_eq!(read(dir.path(), "good.log"), kept);

    // Let the blocked write fail so the loop can stop.
    drop(reader);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn forced_flushes_neither_drop_nor_duplicate(
        ops in proptest::collection::vec((any::<bool>(), "[a-z ]{0,40}"), 1..60),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = fixed_mgr(dir.path(), LogConfig { page_size: 48, ..LogConfig::default() });
        let log = mgr.open("bar").unwrap();

        let mut expected = String::new();
        for (flush, message) in &ops {
            expected.push_str(&log.log(message).unwrap());
            if *flush {
                log.flush().unwrap();
            }
        }
        mgr.close().unwrap();
        prop_assert_eq!(read(dir.path(), "bar.log"), expected);
    }
}
