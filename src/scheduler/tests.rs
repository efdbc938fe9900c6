use super::*;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::digest::Digest;
use crate::hasher::crc32::crc32;
use crate::hasher::HasherOptions;
use crate::provider::{ChecksumProvider, Md5Provider, SfvProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Recorded {
    Started(u32),
    FileStarted(String),
    Progress(u32),
    FileCompleted(String, CompletionStatus),
    Completed(OperationResults),
    Canceled,
    Error(String),
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    fn new() -> Arc<RecordingSink> {
        Arc::new(RecordingSink::default())
    }

    fn snapshot(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    fn is_terminal(e: &Recorded) -> bool {
        matches!(e, Recorded::Completed(_) | Recorded::Canceled | Recorded::Error(_))
    }
}

impl EventSink for RecordingSink {
    fn on_operation_started(&self, n_files: u32) {
        self.events.lock().unwrap().push(Recorded::Started(n_files));
    }

    fn on_file_started(&self, file: &str, _absolute_file_path: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::FileStarted(file.to_owned()));
    }

    fn on_progress(&self, percentage: u32, _bandwidth_mib_s: u32) {
        self.events.lock().unwrap().push(Recorded::Progress(percentage));
    }

    fn on_file_completed(
        &self,
        file: &str,
        _checksum: &Digest,
        _absolute_file_path: &str,
        status: CompletionStatus,
    ) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::FileCompleted(file.to_owned(), status));
    }

    fn on_operation_completed(&self, results: OperationResults) {
        self.events.lock().unwrap().push(Recorded::Completed(results));
    }

    fn on_canceled(&self) {
        self.events.lock().unwrap().push(Recorded::Canceled);
    }

    fn on_error(&self, error: &crate::Error, _msg: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Error(error.to_string()));
    }
}

fn wait_until(
    scheduler: &OperationScheduler,
    sink: &RecordingSink,
    timeout: Duration,
    pred: impl Fn(&[Recorded]) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        scheduler.run();
        if pred(&sink.snapshot()) {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        scheduler.wait_for_events(Duration::from_millis(20));
    }
}

fn wait_terminal(scheduler: &OperationScheduler, sink: &RecordingSink) -> Vec<Recorded> {
    assert!(
        wait_until(scheduler, sink, Duration::from_secs(30), |events| {
            events.iter().any(RecordingSink::is_terminal)
        }),
        "operation did not finish in time; events so far: {:?}",
        sink.snapshot()
    );
    scheduler.run();
    sink.snapshot()
}

fn crc_string(data: &[u8]) -> String {
    Digest::Crc32(crc32(data, 0, false, false)).to_string()
}

fn sfv_provider() -> Arc<dyn ChecksumProvider> {
    Arc::new(SfvProvider::new())
}

fn post_verify(scheduler: &OperationScheduler, sink: &Arc<RecordingSink>, manifest: &Path) {
    scheduler
        .post_verify(Verify {
            event_sink: Arc::clone(sink) as Arc<dyn EventSink>,
            provider: sfv_provider(),
            options: HasherOptions::default(),
            source_file: manifest.to_path_buf(),
        })
        .unwrap();
}

#[test]
fn test_verify_mixed_outcomes_event_order() {
    let dir = tempfile::tempdir().unwrap();
    let f1 = b"first file contents".to_vec();
    let f3 = b"third file contents".to_vec();
    std::fs::write(dir.path().join("f1.bin"), &f1).unwrap();
    // f2.bin is deliberately absent
    std::fs::write(dir.path().join("f3.bin"), b"tampered contents").unwrap();

    let manifest_path = dir.path().join("files.sfv");
    let manifest = format!(
        "f1.bin {}\nf2.bin {}\nf3.bin {}\n",
        crc_string(&f1),
        crc_string(b"second file contents"),
        crc_string(&f3),
    );
    std::fs::write(&manifest_path, manifest).unwrap();

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    let sink = RecordingSink::new();
    post_verify(&scheduler, &sink, &manifest_path);
    let events = wait_terminal(&scheduler, &sink);
    scheduler.shutdown();

    // filter out progress for the structural comparison
    let structural: Vec<&Recorded> = events
        .iter()
        .filter(|e| !matches!(e, Recorded::Progress(_)))
        .collect();
    assert_eq!(
        structural,
        vec![
            &Recorded::Started(3),
            &Recorded::FileStarted("f1.bin".into()),
            &Recorded::FileCompleted("f1.bin".into(), CompletionStatus::Ok),
            &Recorded::FileStarted("f2.bin".into()),
            &Recorded::FileCompleted("f2.bin".into(), CompletionStatus::Missing),
            &Recorded::FileStarted("f3.bin".into()),
            &Recorded::FileCompleted("f3.bin".into(), CompletionStatus::Bad),
            &Recorded::Completed(OperationResults {
                total: 3,
                ok: 1,
                bad: 1,
                missing: 1,
            }),
        ]
    );
}

#[test]
fn test_verify_empty_file_entry() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("empty.bin"), b"").unwrap();
    let manifest_path = dir.path().join("files.sfv");
    std::fs::write(&manifest_path, "empty.bin 00000000\n").unwrap();

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    let sink = RecordingSink::new();
    post_verify(&scheduler, &sink, &manifest_path);
    let events = wait_terminal(&scheduler, &sink);
    scheduler.shutdown();

    assert!(events.contains(&Recorded::FileCompleted(
        "empty.bin".into(),
        CompletionStatus::Ok
    )));
}

#[test]
fn test_verify_multi_buffer_file_emits_progress() {
    let dir = tempfile::tempdir().unwrap();
    // four hashing buffers worth of data
    let data: Vec<u8> = (0..(16u32 << 20)).map(|i| (i * 31) as u8).collect();
    std::fs::write(dir.path().join("big.bin"), &data).unwrap();
    let manifest_path = dir.path().join("files.sfv");
    std::fs::write(&manifest_path, format!("big.bin {}\n", crc_string(&data))).unwrap();

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    let sink = RecordingSink::new();
    post_verify(&scheduler, &sink, &manifest_path);
    let events = wait_terminal(&scheduler, &sink);
    scheduler.shutdown();

    assert!(events.contains(&Recorded::FileCompleted(
        "big.bin".into(),
        CompletionStatus::Ok
    )));
    // percentage strictly increases across progress events
    let progress: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Recorded::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] < w[1]), "{:?}", progress);
    assert!(progress.iter().all(|&p| p > 0 && p < 100));
}

#[test]
fn test_verify_manifest_parse_failure_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("broken.sfv");
    std::fs::write(&manifest_path, "not a valid sfv line\n").unwrap();

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    let sink = RecordingSink::new();
    post_verify(&scheduler, &sink, &manifest_path);
    let events = wait_terminal(&scheduler, &sink);
    scheduler.shutdown();

    assert!(matches!(events.last(), Some(Recorded::Error(_))));
    assert!(!events.iter().any(|e| matches!(e, Recorded::Completed(_))));
}

#[test]
fn test_verify_missing_manifest_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("does_not_exist.sfv");

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    let sink = RecordingSink::new();
    post_verify(&scheduler, &sink, &manifest_path);
    let events = wait_terminal(&scheduler, &sink);
    scheduler.shutdown();

    assert!(matches!(events.last(), Some(Recorded::Error(_))));
}

#[test]
fn test_jobs_are_processed_serially_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let data = b"shared file".to_vec();
    std::fs::write(dir.path().join("a.bin"), &data).unwrap();
    let m1 = dir.path().join("one.sfv");
    let m2 = dir.path().join("two.sfv");
    std::fs::write(&m1, format!("a.bin {}\n", crc_string(&data))).unwrap();
    std::fs::write(&m2, format!("a.bin {}\n", crc_string(&data))).unwrap();

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    // one sink for both jobs so the global order is observable
    let sink = RecordingSink::new();
    post_verify(&scheduler, &sink, &m1);
    post_verify(&scheduler, &sink, &m2);

    assert!(wait_until(
        &scheduler,
        &sink,
        Duration::from_secs(30),
        |events| {
            events
                .iter()
                .filter(|e| matches!(e, Recorded::Completed(_)))
                .count()
                == 2
        }
    ));
    scheduler.shutdown();

    let events = sink.snapshot();
    // no interleaving: the first job's terminal event precedes any event
    // of the second job
    let first_completed = events
        .iter()
        .position(|e| matches!(e, Recorded::Completed(_)))
        .unwrap();
    let started_count_before = events[..first_completed]
        .iter()
        .filter(|e| matches!(e, Recorded::Started(_)))
        .count();
    assert_eq!(started_count_before, 1);
}

#[test]
fn test_cancel_during_hash_delivers_canceled_last() {
    let dir = tempfile::tempdir().unwrap();
    // large sparse file: plenty of buffers to hash, no disk cost
    let big = dir.path().join("big.bin");
    {
        let f = std::fs::File::create(&big).unwrap();
        f.set_len(1 << 30).unwrap();
    }
    let manifest_path = dir.path().join("files.sfv");
    std::fs::write(&manifest_path, "big.bin 00000000\n").unwrap();

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    let sink = RecordingSink::new();
    post_verify(&scheduler, &sink, &manifest_path);

    // wait until the file is being hashed, then cancel
    assert!(wait_until(
        &scheduler,
        &sink,
        Duration::from_secs(30),
        |events| events
            .iter()
            .any(|e| matches!(e, Recorded::FileStarted(_)))
    ));
    scheduler.post_cancel();

    let events = wait_terminal(&scheduler, &sink);
    scheduler.shutdown();

    assert_eq!(events.last(), Some(&Recorded::Canceled));
    assert!(!events.iter().any(|e| matches!(e, Recorded::Completed(_))));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, Recorded::FileCompleted(_, _)))
    );
}

#[test]
fn test_scheduler_survives_cancel_and_runs_next_job() {
    let dir = tempfile::tempdir().unwrap();
    let big = dir.path().join("big.bin");
    {
        let f = std::fs::File::create(&big).unwrap();
        f.set_len(1 << 30).unwrap();
    }
    let small = b"small".to_vec();
    std::fs::write(dir.path().join("small.bin"), &small).unwrap();
    let m_big = dir.path().join("big.sfv");
    let m_small = dir.path().join("small.sfv");
    std::fs::write(&m_big, "big.bin 00000000\n").unwrap();
    std::fs::write(&m_small, format!("small.bin {}\n", crc_string(&small))).unwrap();

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    let sink = RecordingSink::new();
    post_verify(&scheduler, &sink, &m_big);
    assert!(wait_until(
        &scheduler,
        &sink,
        Duration::from_secs(30),
        |events| events
            .iter()
            .any(|e| matches!(e, Recorded::FileStarted(_)))
    ));
    scheduler.post_cancel();
    assert!(wait_until(
        &scheduler,
        &sink,
        Duration::from_secs(30),
        |events| events.contains(&Recorded::Canceled)
    ));

    // the next queued job runs normally after the cancel
    post_verify(&scheduler, &sink, &m_small);
    assert!(wait_until(
        &scheduler,
        &sink,
        Duration::from_secs(30),
        |events| {
            events.iter().any(|e| {
                matches!(
                    e,
                    Recorded::Completed(OperationResults { ok: 1, .. })
                )
            })
        }
    ));
    scheduler.shutdown();
}

#[test]
fn test_create_from_folder_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("tree");
    std::fs::create_dir_all(tree.join("sub/inner")).unwrap();
    std::fs::write(tree.join("root.bin"), b"root data").unwrap();
    std::fs::write(tree.join("sub/nested.bin"), b"nested data").unwrap();
    std::fs::write(tree.join("sub/inner/deep.bin"), b"deep data").unwrap();
    std::fs::write(tree.join("empty.bin"), b"").unwrap();

    let manifest_path = dir.path().join("out.sfv");

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    let sink = RecordingSink::new();
    scheduler
        .post_create_from_folder(CreateFromFolder {
            event_sink: Arc::clone(&sink) as Arc<dyn EventSink>,
            provider: sfv_provider(),
            options: HasherOptions::default(),
            target_file: manifest_path.clone(),
            folder_path: tree.clone(),
        })
        .unwrap();
    let events = wait_terminal(&scheduler, &sink);

    assert!(matches!(
        events.last(),
        Some(Recorded::Completed(OperationResults {
            total: 4,
            ok: 4,
            bad: 0,
            missing: 0,
        }))
    ));

    // the manifest parses back and verifies clean
    let written = std::fs::read_to_string(&manifest_path).unwrap();
    assert!(written.contains(&format!("root.bin {}", crc_string(b"root data"))));
    assert!(written.contains(&format!("sub/nested.bin {}", crc_string(b"nested data"))));
    assert!(written.contains(&format!(
        "sub/inner/deep.bin {}",
        crc_string(b"deep data")
    )));
    assert!(written.contains("empty.bin 00000000"));

    let verify_sink = RecordingSink::new();
    post_verify(&scheduler, &verify_sink, &manifest_path);
    let events = wait_terminal(&scheduler, &verify_sink);
    scheduler.shutdown();
    assert!(matches!(
        events.last(),
        Some(Recorded::Completed(OperationResults {
            total: 4,
            ok: 4,
            bad: 0,
            missing: 0,
        }))
    ));
}

#[test]
fn test_create_reports_open_failures_as_bad() {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("ok.bin"), b"fine").unwrap();
        let locked = tree.join("locked.bin");
        std::fs::write(&locked, b"no access").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        // running as root would bypass the permission check
        if std::fs::File::open(&locked).is_ok() {
            return;
        }

        let manifest_path = dir.path().join("out.sfv");
        let mut scheduler = OperationScheduler::new();
        scheduler.start().unwrap();
        let sink = RecordingSink::new();
        scheduler
            .post_create_from_folder(CreateFromFolder {
                event_sink: Arc::clone(&sink) as Arc<dyn EventSink>,
                provider: sfv_provider(),
                options: HasherOptions::default(),
                target_file: manifest_path.clone(),
                folder_path: tree.clone(),
            })
            .unwrap();
        let events = wait_terminal(&scheduler, &sink);
        scheduler.shutdown();

        assert!(events.contains(&Recorded::FileCompleted(
            "locked.bin".into(),
            CompletionStatus::Bad
        )));
        assert!(matches!(
            events.last(),
            Some(Recorded::Completed(OperationResults {
                total: 2,
                ok: 1,
                bad: 1,
                missing: 0,
            }))
        ));
        // the bad entry is absent from the written manifest
        let written = std::fs::read_to_string(&manifest_path).unwrap();
        assert!(!written.contains("locked.bin"));
    }
}

#[test]
fn test_md5_manifest_verify() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.bin"), b"ABC").unwrap();
    let manifest_path = dir.path().join("files.md5");
    std::fs::write(
        &manifest_path,
        "902fbdd2b1df0c4f70b4a5d23525e932 *a.bin\n",
    )
    .unwrap();

    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    let sink = RecordingSink::new();
    scheduler
        .post_verify(Verify {
            event_sink: Arc::clone(&sink) as Arc<dyn EventSink>,
            provider: Arc::new(Md5Provider::new()),
            options: HasherOptions::default(),
            source_file: manifest_path.clone(),
        })
        .unwrap();
    let events = wait_terminal(&scheduler, &sink);
    scheduler.shutdown();

    assert!(events.contains(&Recorded::FileCompleted(
        "a.bin".into(),
        CompletionStatus::Ok
    )));
}

#[test]
fn test_shutdown_without_work_and_double_shutdown() {
    let mut scheduler = OperationScheduler::new();
    scheduler.start().unwrap();
    scheduler.shutdown();
    scheduler.shutdown();
    // dropping a never-started scheduler is fine too
    let _ = OperationScheduler::new();
}

#[test]
fn test_resolve_path_handles_backslash_separators() {
    let base = Path::new("/base/dir");
    let resolved = resolve_path(base, "sub\\file.bin");
    let expected: std::path::PathBuf = ["/base/dir", "sub", "file.bin"].iter().collect();
    assert_eq!(resolved, expected);
}
