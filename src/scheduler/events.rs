//! Events posted by the worker and dispatched on the observer's thread.

use std::sync::Arc;

use crate::digest::Digest;
use crate::error::Error;

/// Per-entry verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Digest matched.
    Ok,
    /// File was not found.
    Missing,
    /// Digest mismatch or read error.
    Bad,
}

/// Aggregate counters for a finished operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationResults {
    pub total: u32,
    pub ok: u32,
    pub bad: u32,
    pub missing: u32,
}

/// Observer for scheduler events. All notifications for one operation
/// arrive in emission order: `on_operation_started` first, then per file
/// `on_file_started`, any number of `on_progress`, `on_file_completed`,
/// and finally exactly one of `on_operation_completed`, `on_canceled` or
/// `on_error`.
pub trait EventSink: Send + Sync {
    fn on_operation_started(&self, n_files: u32);
    fn on_file_started(&self, file: &str, absolute_file_path: &str);
    fn on_progress(&self, percentage: u32, bandwidth_mib_s: u32);
    fn on_file_completed(
        &self,
        file: &str,
        checksum: &Digest,
        absolute_file_path: &str,
        status: CompletionStatus,
    );
    fn on_operation_completed(&self, results: OperationResults);
    fn on_canceled(&self);
    fn on_error(&self, error: &Error, msg: &str);
}

pub(crate) enum EventPayload {
    OperationStarted {
        n_files: u32,
    },
    FileStarted {
        file: String,
        absolute_file_path: String,
    },
    Progress {
        percentage: u32,
        bandwidth_mib_s: u32,
    },
    FileCompleted {
        file: String,
        checksum: Digest,
        absolute_file_path: String,
        status: CompletionStatus,
    },
    OperationCompleted {
        results: OperationResults,
    },
    Canceled,
    Error {
        error: Error,
        msg: String,
    },
}

pub(crate) struct Event {
    pub recipient: Arc<dyn EventSink>,
    pub payload: EventPayload,
}

impl Event {
    pub fn dispatch(self) {
        match self.payload {
            EventPayload::OperationStarted { n_files } => {
                self.recipient.on_operation_started(n_files)
            }
            EventPayload::FileStarted {
                file,
                absolute_file_path,
            } => self.recipient.on_file_started(&file, &absolute_file_path),
            EventPayload::Progress {
                percentage,
                bandwidth_mib_s,
            } => self.recipient.on_progress(percentage, bandwidth_mib_s),
            EventPayload::FileCompleted {
                file,
                checksum,
                absolute_file_path,
                status,
            } => self
                .recipient
                .on_file_completed(&file, &checksum, &absolute_file_path, status),
            EventPayload::OperationCompleted { results } => {
                self.recipient.on_operation_completed(results)
            }
            EventPayload::Canceled => self.recipient.on_canceled(),
            EventPayload::Error { error, msg } => self.recipient.on_error(&error, &msg),
        }
    }
}
