// Allow pre-existing clippy lints across the codebase
#![allow(
    clippy::collapsible_if,
    clippy::len_without_is_empty,
    clippy::manual_range_contains,
    clippy::needless_range_loop,
    clippy::new_without_default,
    clippy::too_many_arguments
)]

/// Use mimalloc as the global allocator.
/// Manifest parsing, event queues and digest strings do many small
/// allocations; mimalloc's thread-local caching keeps them off the
/// worker thread's hashing path.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod checksum_file;
pub mod command_line;
pub mod digest;
pub mod error;
pub mod file_io;
pub mod hasher;
pub mod line_reader;
pub mod plugin;
pub mod provider;
pub mod scheduler;
pub mod utf;

pub use error::{Error, Result};
