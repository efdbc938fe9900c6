//! Stable C ABI for third-party checksum providers.
//!
//! Plugins export a factory returning a provider function table. The host
//! drives parsing and serialization through callbacks, and digests cross the
//! boundary as an opaque `user_data` blob paired with four function pointers
//! (`free`/`clone`/`to_string`/`compare`). The function-pointer set doubles
//! as the digest's dynamic type tag: the host only ever passes `compare` two
//! digests carrying the same set.
//!
//! String query protocol: `file_extension`/`file_description` are called
//! first with a null buffer; the plugin stores the required byte count in
//! `in_out_size` and returns OK. The host then allocates and calls again.
//! `to_string` follows the same two-call protocol, returning the length.

use std::os::raw::{c_char, c_void};

/// Result code returned by plugin entry points.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawResult(pub i32);

impl RawResult {
    pub const OK: RawResult = RawResult(1);
    pub const FAILED: RawResult = RawResult(-1);
    pub const NOT_IMPLEMENTED: RawResult = RawResult(-5);
    pub const INSUFFICIENT_MEMORY: RawResult = RawResult(-10);
}

/// Result code returned by host callbacks to a plugin.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCallbackResult(pub i32);

impl RawCallbackResult {
    pub const OK: RawCallbackResult = RawCallbackResult(1);
    /// The data source is exhausted (end of file, no further entries).
    pub const MORE_DATA: RawCallbackResult = RawCallbackResult(2);
    pub const FAILED: RawCallbackResult = RawCallbackResult(-1);
    pub const INVALID_ARG: RawCallbackResult = RawCallbackResult(-2);
}

/// Provider capability values.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCapabilities(pub i32);

impl RawCapabilities {
    pub const FULL: RawCapabilities = RawCapabilities(0);
    pub const VERIFY_ONLY: RawCapabilities = RawCapabilities(1);
}

/// Seek origin values for the binary-read callbacks.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSeekStart(pub i32);

impl RawSeekStart {
    pub const CURRENT_POSITION: RawSeekStart = RawSeekStart(1);
    pub const FILE_START: RawSeekStart = RawSeekStart(2);
    pub const FILE_END: RawSeekStart = RawSeekStart(3);
}

/// Hasher configuration passed across the ABI. `opt_size` carries the
/// struct size for forward compatibility.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawHasherOptions {
    pub opt_size: usize,
    pub has_sse42: u8,
    pub has_avx512: u8,
    pub reserved: [u8; 6],
}

/// Opaque host-side digest slot a plugin fills through
/// [`HostCallbacks::fill_digest`].
#[repr(C)]
pub struct RawDigestSlot {
    _private: [u8; 0],
}

/// Opaque host-side context for the read callbacks.
#[repr(C)]
pub struct RawReadContext {
    _private: [u8; 0],
}

/// Opaque host-side context for the write callbacks.
#[repr(C)]
pub struct RawWriteContext {
    _private: [u8; 0],
}

/// Releases the digest blob. Called exactly once per live digest.
pub type DigestFreeFn = unsafe extern "C" fn(user_data: *mut c_void);
/// Produces an independent copy of the digest blob.
pub type DigestCloneFn = unsafe extern "C" fn(user_data: *mut c_void) -> *mut c_void;
/// Writes the digest's textual form into `out_str` when non-null and
/// returns the length in bytes. Call with null to query the size.
pub type DigestToStringFn =
    unsafe extern "C" fn(user_data: *mut c_void, out_str: *mut c_char) -> usize;
/// Returns 1 when the two blobs represent equal digests, 0 otherwise.
/// Only called with two blobs carrying the same function-pointer set.
pub type DigestCompareFn =
    unsafe extern "C" fn(lhs: *mut c_void, rhs: *mut c_void) -> i8;

/// Host entry point a plugin calls to hand a digest back to the host.
pub type FillDigestFn = unsafe extern "C" fn(
    out_digest: *mut RawDigestSlot,
    user_data: *mut c_void,
    free_user_data: DigestFreeFn,
    clone: DigestCloneFn,
    to_string: DigestToStringFn,
    compare: DigestCompareFn,
);

/// Callbacks handed to the plugin factory at load time.
#[repr(C)]
pub struct HostCallbacks {
    pub fill_digest: FillDigestFn,
}

#[repr(C)]
pub struct RawHasher {
    pub vptr: *const RawHasherVtbl,
}

#[repr(C)]
pub struct RawHasherVtbl {
    pub add_data: unsafe extern "C" fn(
        this: *mut RawHasher,
        data: *const c_char,
        size: usize,
    ) -> RawResult,
    pub finalize:
        unsafe extern "C" fn(this: *mut RawHasher, out_digest: *mut RawDigestSlot) -> RawResult,
    pub reset: unsafe extern "C" fn(this: *mut RawHasher) -> RawResult,
}

/// Reads up to `buf_size` bytes. OK with `out_bytes_read`, or MORE_DATA at
/// end of file.
pub type ReadBinaryFn = unsafe extern "C" fn(
    ctx: *mut RawReadContext,
    out_buf: *mut c_char,
    buf_size: usize,
    out_bytes_read: *mut usize,
) -> RawCallbackResult;
pub type SeekBinaryFn = unsafe extern "C" fn(
    ctx: *mut RawReadContext,
    offset: i64,
    seek_start: RawSeekStart,
) -> RawCallbackResult;
pub type TellBinaryFn =
    unsafe extern "C" fn(ctx: *mut RawReadContext, out_position: *mut i64) -> RawCallbackResult;
/// Yields the next text line (no terminator). The pointer stays valid until
/// the next callback into the host. MORE_DATA once the input is exhausted.
pub type ReadLineFn = unsafe extern "C" fn(
    ctx: *mut RawReadContext,
    out_line: *mut *const c_char,
    out_line_size: *mut usize,
) -> RawCallbackResult;
/// Reports one parsed manifest entry as NUL-terminated UTF-8 strings.
pub type NewEntryFn = unsafe extern "C" fn(
    ctx: *mut RawReadContext,
    filename: *const c_char,
    digest_string: *const c_char,
) -> RawCallbackResult;

pub type WriteFn = unsafe extern "C" fn(
    ctx: *mut RawWriteContext,
    in_buffer: *const c_char,
    in_buffer_size: usize,
) -> RawCallbackResult;
/// Yields the next entry to serialize as NUL-terminated UTF-8 strings,
/// valid until the next callback. MORE_DATA once all entries are consumed.
pub type NextEntryFn = unsafe extern "C" fn(
    ctx: *mut RawWriteContext,
    out_filename: *mut *const c_char,
    out_digest: *mut *const c_char,
) -> RawCallbackResult;

#[repr(C)]
pub struct RawChecksumProvider {
    pub vptr: *const RawChecksumProviderVtbl,
}

#[repr(C)]
pub struct RawChecksumProviderVtbl {
    pub delete: unsafe extern "C" fn(this: *mut RawChecksumProvider) -> RawResult,
    pub get_capabilities: unsafe extern "C" fn(
        this: *mut RawChecksumProvider,
        out_capabilities: *mut RawCapabilities,
    ) -> RawResult,
    pub file_extension: unsafe extern "C" fn(
        this: *mut RawChecksumProvider,
        out_utf8_str: *mut c_char,
        in_out_size: *mut usize,
    ) -> RawResult,
    pub file_description: unsafe extern "C" fn(
        this: *mut RawChecksumProvider,
        out_utf8_str: *mut c_char,
        in_out_size: *mut usize,
    ) -> RawResult,
    pub create_hasher: unsafe extern "C" fn(
        this: *mut RawChecksumProvider,
        out_hasher: *mut *mut RawHasher,
        opts: *mut RawHasherOptions,
    ) -> RawResult,
    pub delete_hasher: unsafe extern "C" fn(
        this: *mut RawChecksumProvider,
        hasher: *mut RawHasher,
    ) -> RawResult,
    pub digest_from_string: unsafe extern "C" fn(
        this: *mut RawChecksumProvider,
        out_digest: *mut RawDigestSlot,
        string_data: *const c_char,
        string_size: usize,
    ) -> RawResult,
    pub read_from_file: unsafe extern "C" fn(
        this: *mut RawChecksumProvider,
        read_provider: *mut RawReadContext,
        read_file_binary: ReadBinaryFn,
        seek_file_binary: SeekBinaryFn,
        tell_file_binary: TellBinaryFn,
        read_line_text: ReadLineFn,
        new_entry_callback: NewEntryFn,
    ) -> RawResult,
    pub write_new_file: unsafe extern "C" fn(
        this: *mut RawChecksumProvider,
        write_provider: *mut RawWriteContext,
        write: WriteFn,
        next_entry: NextEntryFn,
    ) -> RawResult,
}

/// Shape of the factory a plugin exports (`QuickerSFV_LoadPlugin`).
pub type LoadPluginFn =
    unsafe extern "C" fn(callbacks: *const HostCallbacks) -> *mut RawChecksumProvider;
