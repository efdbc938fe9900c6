//! Single-worker operation scheduler with cooperative cancellation.
//!
//! Operations are processed sequentially in enqueue order by one background
//! worker. Within an operation, file contents stream through the hasher via
//! two 4 MiB buffers: while one buffer is hashed, the I/O thread fills the
//! other. Events travel back over a mutex-protected queue and are dispatched
//! on whichever thread calls [`OperationScheduler::run`].

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::checksum_file::{ChecksumFile, WHOLE_FILE};
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::file_io::{FsFileInput, FsFileOutput, advise_sequential, open_readable};
use crate::hasher::{Hasher, HasherOptions};
use crate::provider::ChecksumProvider;

use super::events::{CompletionStatus, Event, EventPayload, EventSink, OperationResults};
use super::io::{
    HASH_FILE_BUFFER_SIZE, IoWorker, ReadRequest, SignalHub, SlidingWindow, WaitOutcome,
};
use super::walk::FileWalk;

/// A verify operation: parse the manifest, hash every listed file, compare.
pub struct Verify {
    pub event_sink: Arc<dyn EventSink>,
    pub provider: Arc<dyn ChecksumProvider>,
    pub options: HasherOptions,
    /// Path of the checksum file; entries resolve relative to its directory.
    pub source_file: PathBuf,
}

/// A create operation: walk a folder, hash every file, write the manifest.
pub struct CreateFromFolder {
    pub event_sink: Arc<dyn EventSink>,
    pub provider: Arc<dyn ChecksumProvider>,
    pub options: HasherOptions,
    /// Path of the checksum file to create.
    pub target_file: PathBuf,
    /// Folder to walk.
    pub folder_path: PathBuf,
}

enum OpKind {
    Verify,
    Create,
}

struct OperationState {
    recipient: Arc<dyn EventSink>,
    provider: Arc<dyn ChecksumProvider>,
    kind: OpKind,
    checksum_file: ChecksumFile,
    checksum_path: PathBuf,
    folder_path: PathBuf,
    hasher: Box<dyn Hasher>,
}

struct OpsQueue {
    queue: Vec<OperationState>,
    shutdown_requested: bool,
}

struct Shared {
    ops: Mutex<OpsQueue>,
    ops_cv: Condvar,
    events: Mutex<Vec<Event>>,
    hub: Arc<SignalHub>,
    wakeup: Sender<()>,
}

impl Shared {
    fn signal(&self, recipient: &Arc<dyn EventSink>, payload: EventPayload) {
        {
            let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
            events.push(Event {
                recipient: Arc::clone(recipient),
                payload,
            });
        }
        // wake whoever is polling run(); dropped receivers are fine
        let _ = self.wakeup.send(());
    }
}

/// The scheduler owning the worker thread and the two queues.
pub struct OperationScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    wakeup_rx: Mutex<Receiver<()>>,
}

impl OperationScheduler {
    pub fn new() -> OperationScheduler {
        let (wakeup_tx, wakeup_rx) = channel();
        OperationScheduler {
            shared: Arc::new(Shared {
                ops: Mutex::new(OpsQueue {
                    queue: Vec::new(),
                    shutdown_requested: false,
                }),
                ops_cv: Condvar::new(),
                events: Mutex::new(Vec::new()),
                hub: Arc::new(SignalHub::new()),
                wakeup: wakeup_tx,
            }),
            worker: None,
            wakeup_rx: Mutex::new(wakeup_rx),
        }
    }

    /// Start the background worker. Startup failures abort here; nothing is
    /// reported through the event queue.
    pub fn start(&mut self) -> Result<()> {
        let io = IoWorker::spawn(Arc::clone(&self.shared.hub))?;
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("qsfv-worker".into())
            .spawn(move || Worker::new(shared, io).run())
            .map_err(|_| Error::SystemError("failed to start worker thread"))?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Stop the worker: request shutdown, raise cancel to interrupt any
    /// in-flight operation, and join.
    pub fn shutdown(&mut self) {
        {
            let mut ops = self.shared.ops.lock().unwrap_or_else(|e| e.into_inner());
            ops.shutdown_requested = true;
        }
        self.shared.ops_cv.notify_all();
        self.shared.hub.raise_cancel();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Enqueue a verify operation.
    pub fn post_verify(&self, op: Verify) -> Result<()> {
        let hasher = op.provider.create_hasher(&op.options)?;
        self.post_state(OperationState {
            recipient: op.event_sink,
            provider: op.provider,
            kind: OpKind::Verify,
            checksum_file: ChecksumFile::new(),
            checksum_path: op.source_file,
            folder_path: PathBuf::new(),
            hasher,
        });
        Ok(())
    }

    /// Enqueue a create-from-folder operation.
    pub fn post_create_from_folder(&self, op: CreateFromFolder) -> Result<()> {
        let hasher = op.provider.create_hasher(&op.options)?;
        self.post_state(OperationState {
            recipient: op.event_sink,
            provider: op.provider,
            kind: OpKind::Create,
            checksum_file: ChecksumFile::new(),
            checksum_path: op.target_file,
            folder_path: op.folder_path,
            hasher,
        });
        Ok(())
    }

    fn post_state(&self, state: OperationState) {
        {
            let mut ops = self.shared.ops.lock().unwrap_or_else(|e| e.into_inner());
            ops.queue.push(state);
        }
        self.shared.ops_cv.notify_one();
    }

    /// Request cancellation of the currently running operation. Takes
    /// effect at the worker's next wait point.
    pub fn post_cancel(&self) {
        self.shared.hub.raise_cancel();
    }

    /// Dispatch all pending events to their recipients, in emission order.
    pub fn run(&self) {
        let pending = {
            let mut events = self.shared.events.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *events)
        };
        for event in pending {
            event.dispatch();
        }
    }

    /// Block until the worker signals pending events or the timeout lapses.
    /// Returns true when a wakeup arrived.
    pub fn wait_for_events(&self, timeout: Duration) -> bool {
        let rx = self.wakeup_rx.lock().unwrap_or_else(|e| e.into_inner());
        rx.recv_timeout(timeout).is_ok()
    }
}

impl Drop for OperationScheduler {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

impl Default for OperationScheduler {
    fn default() -> OperationScheduler {
        OperationScheduler::new()
    }
}

enum HashOutcome {
    DigestReady,
    Canceled,
    Error,
}

struct Worker {
    shared: Arc<Shared>,
    io: IoWorker,
    // the two hashing buffers, owned here whenever no read is in flight
    buffers: Vec<Vec<u8>>,
}

impl Worker {
    fn new(shared: Arc<Shared>, io: IoWorker) -> Worker {
        Worker {
            shared,
            io,
            buffers: vec![
                Vec::with_capacity(HASH_FILE_BUFFER_SIZE),
                Vec::with_capacity(HASH_FILE_BUFFER_SIZE),
            ],
        }
    }

    fn run(mut self) {
        let mut pending_ops = Vec::new();
        loop {
            {
                let mut ops = self.shared.ops.lock().unwrap_or_else(|e| e.into_inner());
                loop {
                    if ops.shutdown_requested {
                        return;
                    }
                    if !ops.queue.is_empty() {
                        break;
                    }
                    ops = self
                        .shared
                        .ops_cv
                        .wait(ops)
                        .unwrap_or_else(|e| e.into_inner());
                }
                pending_ops.clear();
                std::mem::swap(&mut pending_ops, &mut ops.queue);
            }
            for mut op in pending_ops.drain(..) {
                if self
                    .shared
                    .ops
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .shutdown_requested
                {
                    return;
                }
                // the cancel signal is level-triggered; re-arm per operation
                self.shared.hub.reset_cancel();
                let result = match op.kind {
                    OpKind::Verify => self.do_verify(&mut op),
                    OpKind::Create => self.do_create(&mut op),
                };
                if let Err(e) = result {
                    let msg = e.to_string();
                    self.shared
                        .signal(&op.recipient, EventPayload::Error { error: e, msg });
                }
            }
        }
    }

    /// Issue the next read if data remains to be requested and a buffer is
    /// free. Returns the number of bytes requested.
    fn issue_read(
        &mut self,
        file: &Arc<File>,
        read_offset: &mut u64,
        bytes_requested: &mut u64,
        data_size: u64,
        outstanding: &mut usize,
    ) -> Result<u64> {
        if *bytes_requested >= data_size {
            return Ok(0);
        }
        let Some(buffer) = self.buffers.pop() else {
            return Ok(0);
        };
        let to_read = (data_size - *bytes_requested).min(HASH_FILE_BUFFER_SIZE as u64);
        self.io.submit(ReadRequest {
            file: Arc::clone(file),
            offset: *read_offset,
            len: to_read as usize,
            buffer,
        })?;
        *outstanding += 1;
        *bytes_requested += to_read;
        *read_offset += to_read;
        Ok(to_read)
    }

    /// Stream `data_size` bytes starting at `data_offset` through the
    /// hasher with the double-buffer read loop.
    fn hash_file(
        &mut self,
        recipient: &Arc<dyn EventSink>,
        hasher: &mut dyn Hasher,
        file: &Arc<File>,
        data_offset: u64,
        data_size: u64,
    ) -> Result<HashOutcome> {
        hasher.reset();
        if data_size == 0 {
            return Ok(if self.shared.hub.is_cancel_raised() {
                HashOutcome::Canceled
            } else {
                HashOutcome::DigestReady
            });
        }

        let mut bandwidth_track: SlidingWindow<10> = SlidingWindow::new();
        let mut read_offset = data_offset;
        let mut bytes_requested: u64 = 0;
        let mut bytes_hashed: u64 = 0;
        let mut outstanding: usize = 0;
        let mut last_progress: u32 = 0;
        let mut outcome = HashOutcome::DigestReady;

        // prime the first read; the loop below keeps the second buffer in
        // flight while the first is hashed
        let issue_result = self.issue_read(
            file,
            &mut read_offset,
            &mut bytes_requested,
            data_size,
            &mut outstanding,
        );

        let loop_result = issue_result.and_then(|_| {
            loop {
                self.issue_read(
                    file,
                    &mut read_offset,
                    &mut bytes_requested,
                    data_size,
                    &mut outstanding,
                )?;
                // cancel goes first, or it would get starved by completing i/o
                let completion = match self.shared.hub.wait_completion_or_cancel() {
                    WaitOutcome::Canceled => {
                        outcome = HashOutcome::Canceled;
                        break;
                    }
                    WaitOutcome::Completion(c) => c,
                };
                outstanding -= 1;
                let is_eof = completion.eof;
                let had_error = completion.error.is_some();
                let full_buffer = completion.buffer.len() == HASH_FILE_BUFFER_SIZE;
                if full_buffer {
                    bandwidth_track.push(completion.duration);
                }
                let hash_result = if had_error {
                    Ok(())
                } else {
                    hasher.add_data(&completion.buffer)
                };
                bytes_hashed += completion.buffer.len() as u64;
                self.buffers.push(completion.buffer);
                if had_error || hash_result.is_err() {
                    outcome = HashOutcome::Error;
                    break;
                }
                if bytes_hashed == data_size || is_eof {
                    break;
                }
                let current_progress = (bytes_hashed * 100 / data_size) as u32;
                if current_progress != last_progress {
                    let t_avg = bandwidth_track.rolling_average().as_nanos() as u64;
                    let bandwidth_mib_s = if t_avg > 0 {
                        ((HASH_FILE_BUFFER_SIZE as u64 * 1_000_000_000) / (t_avg * 1_048_576))
                            as u32
                    } else {
                        0
                    };
                    self.shared.signal(
                        recipient,
                        EventPayload::Progress {
                            percentage: current_progress,
                            bandwidth_mib_s,
                        },
                    );
                    last_progress = current_progress;
                }
            }
            Ok(())
        });

        // drain any still-pending reads synchronously
        while outstanding > 0 {
            let completion = self.shared.hub.wait_completion();
            self.buffers.push(completion.buffer);
            outstanding -= 1;
        }
        loop_result?;
        Ok(outcome)
    }

    fn do_verify(&mut self, op: &mut OperationState) -> Result<()> {
        let mut reader = FsFileInput::new(&op.checksum_path)?;
        op.checksum_file = op.provider.read_from_file(&mut reader)?;
        let base_dir = op
            .checksum_path
            .parent()
            .unwrap_or(Path::new(""))
            .to_path_buf();

        let mut results = OperationResults {
            total: op.checksum_file.len() as u32,
            ..OperationResults::default()
        };
        self.shared.signal(
            &op.recipient,
            EventPayload::OperationStarted {
                n_files: results.total,
            },
        );

        for entry in op.checksum_file.entries() {
            let portion = &entry.data[0];
            let absolute_path = resolve_path(&base_dir, &portion.path);
            let absolute_str = absolute_path.to_string_lossy().into_owned();
            self.shared.signal(
                &op.recipient,
                EventPayload::FileStarted {
                    file: entry.display.clone(),
                    absolute_file_path: absolute_str.clone(),
                },
            );
            let file = match open_readable(&absolute_path) {
                Ok(f) => {
                    advise_sequential(&f);
                    Arc::new(f)
                }
                Err(e) => {
                    let status = if e.kind() == std::io::ErrorKind::NotFound {
                        results.missing += 1;
                        CompletionStatus::Missing
                    } else {
                        results.bad += 1;
                        CompletionStatus::Bad
                    };
                    self.shared.signal(
                        &op.recipient,
                        EventPayload::FileCompleted {
                            file: entry.display.clone(),
                            checksum: Digest::Empty,
                            absolute_file_path: absolute_str,
                            status,
                        },
                    );
                    continue;
                }
            };
            let data_size = if portion.size == WHOLE_FILE {
                match file.metadata() {
                    Ok(m) => m.len(),
                    Err(_) => {
                        results.bad += 1;
                        self.shared.signal(
                            &op.recipient,
                            EventPayload::FileCompleted {
                                file: entry.display.clone(),
                                checksum: Digest::Empty,
                                absolute_file_path: absolute_str,
                                status: CompletionStatus::Bad,
                            },
                        );
                        continue;
                    }
                }
            } else {
                portion.size as u64
            };
            match self.hash_file(
                &op.recipient,
                op.hasher.as_mut(),
                &file,
                portion.offset,
                data_size,
            )? {
                HashOutcome::DigestReady => {
                    let (digest, status) = match op.hasher.finalize() {
                        Ok(digest) => {
                            let status = if digest == entry.digest {
                                results.ok += 1;
                                CompletionStatus::Ok
                            } else {
                                results.bad += 1;
                                CompletionStatus::Bad
                            };
                            (digest, status)
                        }
                        Err(_) => {
                            results.bad += 1;
                            (Digest::Empty, CompletionStatus::Bad)
                        }
                    };
                    self.shared.signal(
                        &op.recipient,
                        EventPayload::FileCompleted {
                            file: entry.display.clone(),
                            checksum: digest,
                            absolute_file_path: absolute_str,
                            status,
                        },
                    );
                }
                HashOutcome::Error => {
                    results.bad += 1;
                    self.shared.signal(
                        &op.recipient,
                        EventPayload::FileCompleted {
                            file: entry.display.clone(),
                            checksum: Digest::Empty,
                            absolute_file_path: absolute_str,
                            status: CompletionStatus::Bad,
                        },
                    );
                }
                HashOutcome::Canceled => {
                    self.shared.signal(&op.recipient, EventPayload::Canceled);
                    return Ok(());
                }
            }
        }
        self.shared
            .signal(&op.recipient, EventPayload::OperationCompleted { results });
        Ok(())
    }

    fn do_create(&mut self, op: &mut OperationState) -> Result<()> {
        self.shared
            .signal(&op.recipient, EventPayload::OperationStarted { n_files: 0 });
        let mut results = OperationResults::default();

        for walked in FileWalk::new(&op.folder_path) {
            let walked = walked?;
            let absolute_str = walked.absolute_path.to_string_lossy().into_owned();
            let display = match &walked.relative_path {
                Some(rel) => rel.clone(),
                None => walked.absolute_path.to_string_lossy().into_owned(),
            };
            self.shared.signal(
                &op.recipient,
                EventPayload::FileStarted {
                    file: display.clone(),
                    absolute_file_path: absolute_str.clone(),
                },
            );
            results.total += 1;

            let file = match open_readable(&walked.absolute_path) {
                Ok(f) => {
                    advise_sequential(&f);
                    Arc::new(f)
                }
                Err(_) => {
                    results.bad += 1;
                    self.shared.signal(
                        &op.recipient,
                        EventPayload::FileCompleted {
                            file: display,
                            checksum: Digest::Empty,
                            absolute_file_path: absolute_str,
                            status: CompletionStatus::Bad,
                        },
                    );
                    continue;
                }
            };
            // a name that cannot be written into a UTF-8 manifest
            let Some(relative) = walked.relative_path else {
                results.bad += 1;
                self.shared.signal(
                    &op.recipient,
                    EventPayload::FileCompleted {
                        file: display,
                        checksum: Digest::Empty,
                        absolute_file_path: absolute_str,
                        status: CompletionStatus::Bad,
                    },
                );
                continue;
            };
            match self.hash_file(&op.recipient, op.hasher.as_mut(), &file, 0, walked.size)? {
                HashOutcome::DigestReady => match op.hasher.finalize() {
                    Ok(digest) => {
                        results.ok += 1;
                        self.shared.signal(
                            &op.recipient,
                            EventPayload::FileCompleted {
                                file: display,
                                checksum: digest.clone(),
                                absolute_file_path: absolute_str,
                                status: CompletionStatus::Ok,
                            },
                        );
                        op.checksum_file.add_entry(&relative, digest)?;
                    }
                    Err(_) => {
                        results.bad += 1;
                        self.shared.signal(
                            &op.recipient,
                            EventPayload::FileCompleted {
                                file: display,
                                checksum: Digest::Empty,
                                absolute_file_path: absolute_str,
                                status: CompletionStatus::Bad,
                            },
                        );
                    }
                },
                HashOutcome::Error => {
                    results.bad += 1;
                    self.shared.signal(
                        &op.recipient,
                        EventPayload::FileCompleted {
                            file: display,
                            checksum: Digest::Empty,
                            absolute_file_path: absolute_str,
                            status: CompletionStatus::Bad,
                        },
                    );
                }
                HashOutcome::Canceled => {
                    self.shared.signal(&op.recipient, EventPayload::Canceled);
                    return Ok(());
                }
            }
        }

        let mut writer = FsFileOutput::create(&op.checksum_path)?;
        op.provider.write_new_file(&mut writer, &op.checksum_file)?;
        self.shared
            .signal(&op.recipient, EventPayload::OperationCompleted { results });
        Ok(())
    }
}

/// Resolve a manifest-relative path against the manifest's directory.
/// Manifests written on Windows may carry `\` separators.
pub(crate) fn resolve_path(base_dir: &Path, relative: &str) -> PathBuf {
    let normalized = relative.replace('\\', std::path::MAIN_SEPARATOR_STR);
    base_dir.join(normalized)
}
