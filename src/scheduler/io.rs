//! Overlapped-read emulation for the double-buffer hashing loop.
//!
//! A dedicated I/O thread performs positional blocking reads so the worker
//! can hash one buffer while the next is being filled, keeping the disk
//! queue depth at one or more. Completions and the cancel signal share one
//! condition variable, giving the worker a single two-handle wait point.

use std::collections::VecDeque;
use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Size of each of the two hashing buffers.
pub(crate) const HASH_FILE_BUFFER_SIZE: usize = 4 << 20;

/// Sliding window of recent full-buffer read durations, for the
/// instantaneous bandwidth estimate.
pub(crate) struct SlidingWindow<const N: usize> {
    elements: [Duration; N],
    number_of_elements: usize,
    next_element: usize,
}

impl<const N: usize> SlidingWindow<N> {
    pub fn new() -> SlidingWindow<N> {
        SlidingWindow {
            elements: [Duration::ZERO; N],
            number_of_elements: 0,
            next_element: 0,
        }
    }

    pub fn push(&mut self, e: Duration) {
        self.elements[self.next_element] = e;
        self.next_element = (self.next_element + 1) % N;
        self.number_of_elements = (self.number_of_elements + 1).min(N);
    }

    pub fn rolling_average(&self) -> Duration {
        if self.number_of_elements == 0 {
            return Duration::ZERO;
        }
        let sum: Duration = self.elements[..self.number_of_elements].iter().sum();
        sum / self.number_of_elements as u32
    }
}

pub(crate) struct ReadRequest {
    pub file: Arc<File>,
    pub offset: u64,
    pub len: usize,
    pub buffer: Vec<u8>,
}

pub(crate) struct ReadCompletion {
    /// Truncated to the bytes actually read; capacity is preserved for
    /// reuse.
    pub buffer: Vec<u8>,
    pub error: Option<io::Error>,
    /// End of file was reached at or before the end of this read.
    pub eof: bool,
    pub duration: Duration,
}

pub(crate) enum WaitOutcome {
    Completion(ReadCompletion),
    Canceled,
}

struct HubState {
    completions: VecDeque<ReadCompletion>,
}

/// The single synchronization point between the worker's hashing loop, the
/// I/O thread and a cancel request. The cancel signal is manual-reset and
/// level-triggered.
pub(crate) struct SignalHub {
    state: Mutex<HubState>,
    cv: Condvar,
    cancel: AtomicBool,
}

impl SignalHub {
    pub fn new() -> SignalHub {
        SignalHub {
            state: Mutex::new(HubState {
                completions: VecDeque::new(),
            }),
            cv: Condvar::new(),
            cancel: AtomicBool::new(false),
        }
    }

    pub fn raise_cancel(&self) {
        // take the lock so a concurrent waiter cannot miss the flag
        let _guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.cancel.store(true, Ordering::SeqCst);
        self.cv.notify_all();
    }

    pub fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    pub fn is_cancel_raised(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn push_completion(&self, completion: ReadCompletion) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.completions.push_back(completion);
        self.cv.notify_all();
    }

    /// Wait for either the cancel signal or the next read completion.
    /// The cancel signal is checked first on every wakeup so completing
    /// reads cannot starve a cancel.
    pub fn wait_completion_or_cancel(&self) -> WaitOutcome {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return WaitOutcome::Canceled;
            }
            if let Some(c) = state.completions.pop_front() {
                return WaitOutcome::Completion(c);
            }
            state = self.cv.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Wait for the next completion regardless of the cancel signal.
    /// Used to drain outstanding reads after a cancel or an error.
    pub fn wait_completion(&self) -> ReadCompletion {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(c) = state.completions.pop_front() {
                return c;
            }
            state = self.cv.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Fill `buf` from `offset`, retrying partial reads. A short result means
/// end of file.
fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match read_at(file, &mut buf[total..], offset + total as u64) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// The background reader performing the blocking positional reads.
pub(crate) struct IoWorker {
    tx: Option<Sender<ReadRequest>>,
    handle: Option<JoinHandle<()>>,
}

impl IoWorker {
    pub fn spawn(hub: Arc<SignalHub>) -> Result<IoWorker> {
        let (tx, rx): (Sender<ReadRequest>, Receiver<ReadRequest>) = channel();
        let handle = std::thread::Builder::new()
            .name("qsfv-io".into())
            .spawn(move || {
                for mut req in rx {
                    let start = Instant::now();
                    req.buffer.resize(req.len, 0);
                    let (error, eof) = match read_full_at(&req.file, &mut req.buffer, req.offset)
                    {
                        Ok(n) => {
                            req.buffer.truncate(n);
                            (None, n < req.len)
                        }
                        Err(e) => {
                            req.buffer.clear();
                            (Some(e), false)
                        }
                    };
                    hub.push_completion(ReadCompletion {
                        buffer: req.buffer,
                        error,
                        eof,
                        duration: start.elapsed(),
                    });
                }
            })
            .map_err(|_| Error::SystemError("failed to start i/o thread"))?;
        Ok(IoWorker {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn submit(&self, request: ReadRequest) -> Result<()> {
        self.tx
            .as_ref()
            .ok_or(Error::SystemError("i/o thread is gone"))?
            .send(request)
            .map_err(|_| Error::SystemError("i/o thread is gone"))
    }
}

impl Drop for IoWorker {
    fn drop(&mut self) {
        // closing the channel stops the thread once queued reads finish
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
