//! Host-side owners for plugin-provided objects.
//!
//! Every raw pointer crossing the ABI is wrapped in an owner whose `Drop`
//! releases it on all exit paths. A plugin returning a successful code while
//! omitting an output pointer is a contract violation and surfaces as
//! [`Error::Plugin`]; nothing leaks either way.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::checksum_file::ChecksumFile;
use crate::digest::Digest;
use crate::enforce;
use crate::error::{Error, Result};
use crate::file_io::{FileInput, FileOutput, ReadResult, SeekStart};
use crate::hasher::{Hasher, HasherOptions};
use crate::line_reader::LineReader;
use crate::provider::{Capabilities, ChecksumProvider, validate_extensions};

use super::abi::*;

/// A digest owned by a plugin, operated on exclusively through the four
/// callbacks the plugin supplied. The function-pointer set is the digest's
/// dynamic type tag: digests with different sets never compare equal and
/// `compare` is never invoked across sets.
#[derive(Debug)]
pub struct PluginDigest {
    user_data: *mut c_void,
    free: DigestFreeFn,
    clone_fn: DigestCloneFn,
    to_string: DigestToStringFn,
    compare: DigestCompareFn,
}

// Plugin digests are required by the ABI contract to be plain value blobs
// without thread affinity.
unsafe impl Send for PluginDigest {}
unsafe impl Sync for PluginDigest {}

impl PluginDigest {
    fn same_type(&self, other: &PluginDigest) -> bool {
        std::ptr::fn_addr_eq(self.free, other.free)
            && std::ptr::fn_addr_eq(self.clone_fn, other.clone_fn)
            && std::ptr::fn_addr_eq(self.to_string, other.to_string)
            && std::ptr::fn_addr_eq(self.compare, other.compare)
    }

    /// Render the digest through the plugin's `to_string` callback.
    pub fn render(&self) -> String {
        let len = unsafe { (self.to_string)(self.user_data, std::ptr::null_mut()) };
        if len == 0 {
            return String::new();
        }
        let mut buf = vec![0u8; len];
        let written =
            unsafe { (self.to_string)(self.user_data, buf.as_mut_ptr() as *mut c_char) };
        buf.truncate(written.min(len));
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Clone for PluginDigest {
    fn clone(&self) -> PluginDigest {
        let cloned = unsafe { (self.clone_fn)(self.user_data) };
        enforce!(!cloned.is_null());
        PluginDigest {
            user_data: cloned,
            free: self.free,
            clone_fn: self.clone_fn,
            to_string: self.to_string,
            compare: self.compare,
        }
    }
}

impl PartialEq for PluginDigest {
    fn eq(&self, other: &PluginDigest) -> bool {
        if !self.same_type(other) {
            return false;
        }
        unsafe { (self.compare)(self.user_data, other.user_data) == 1 }
    }
}

impl Eq for PluginDigest {}

impl Drop for PluginDigest {
    fn drop(&mut self) {
        // exactly once per live digest
        unsafe { (self.free)(self.user_data) };
    }
}

/// The host entry point plugins call to hand back a digest.
unsafe extern "C" fn fill_digest(
    out_digest: *mut RawDigestSlot,
    user_data: *mut c_void,
    free_user_data: DigestFreeFn,
    clone: DigestCloneFn,
    to_string: DigestToStringFn,
    compare: DigestCompareFn,
) {
    let slot = out_digest as *mut Digest;
    enforce!(!slot.is_null());
    unsafe {
        *slot = Digest::Plugin(PluginDigest {
            user_data,
            free: free_user_data,
            clone_fn: clone,
            to_string,
            compare,
        });
    }
}

/// Callback table handed to every plugin factory.
pub static HOST_CALLBACKS: HostCallbacks = HostCallbacks { fill_digest };

fn check(result: RawResult, what: &'static str) -> Result<()> {
    if result == RawResult::OK {
        Ok(())
    } else {
        Err(Error::Plugin(what))
    }
}

/// A hasher living inside a plugin.
///
/// Holds the owning provider pointer for `delete_hasher`; providers must
/// outlive the hashers they create, which the registration model (providers
/// live for the process) guarantees.
pub struct PluginHasher {
    raw: *mut RawHasher,
    provider: *mut RawChecksumProvider,
}

unsafe impl Send for PluginHasher {}

impl Hasher for PluginHasher {
    fn add_data(&mut self, data: &[u8]) -> Result<()> {
        let result = unsafe {
            ((*(*self.raw).vptr).add_data)(self.raw, data.as_ptr() as *const c_char, data.len())
        };
        check(result, "hasher add_data failed")
    }

    fn finalize(&mut self) -> Result<Digest> {
        let mut digest = Digest::Empty;
        let slot = &mut digest as *mut Digest as *mut RawDigestSlot;
        let result = unsafe { ((*(*self.raw).vptr).finalize)(self.raw, slot) };
        check(result, "hasher finalize failed")?;
        if digest.is_empty() {
            // successful return without filling the output slot
            return Err(Error::Plugin("hasher finalize produced no digest"));
        }
        Ok(digest)
    }

    fn reset(&mut self) {
        // reset cannot report failure through this trait; a failing plugin
        // will surface an error on the next add_data instead
        let _ = unsafe { ((*(*self.raw).vptr).reset)(self.raw) };
    }
}

impl Drop for PluginHasher {
    fn drop(&mut self) {
        unsafe {
            ((*(*self.provider).vptr).delete_hasher)(self.provider, self.raw);
        }
    }
}

/// Host wrapper presenting a plugin's vtable as a [`ChecksumProvider`].
pub struct PluginChecksumProvider {
    raw: *mut RawChecksumProvider,
    capabilities: Capabilities,
    extensions: String,
    description: String,
}

unsafe impl Send for PluginChecksumProvider {}
unsafe impl Sync for PluginChecksumProvider {}

impl Drop for PluginChecksumProvider {
    fn drop(&mut self) {
        unsafe {
            ((*(*self.raw).vptr).delete)(self.raw);
        }
    }
}

type StringQueryFn = unsafe extern "C" fn(
    this: *mut RawChecksumProvider,
    out_utf8_str: *mut c_char,
    in_out_size: *mut usize,
) -> RawResult;

/// Two-call string query: size first, then contents.
fn query_string(raw: *mut RawChecksumProvider, f: StringQueryFn) -> Result<String> {
    let mut size: usize = 0;
    check(
        unsafe { f(raw, std::ptr::null_mut(), &mut size) },
        "string query failed",
    )?;
    let mut buf = vec![0u8; size];
    check(
        unsafe { f(raw, buf.as_mut_ptr() as *mut c_char, &mut size) },
        "string query failed",
    )?;
    buf.truncate(size);
    String::from_utf8(buf).map_err(|_| Error::Plugin("plugin string is not valid utf-8"))
}

/// Wrap the provider returned by a plugin's exported factory.
///
/// Resolving the factory symbol from a shared object is the embedder's
/// concern; this function owns everything after that.
///
/// # Safety
///
/// `factory` must be a conforming `QuickerSFV_LoadPlugin` entry point.
pub unsafe fn load_plugin(factory: LoadPluginFn) -> Result<PluginChecksumProvider> {
    let raw = unsafe { factory(&HOST_CALLBACKS) };
    if raw.is_null() {
        return Err(Error::Plugin("plugin factory returned no provider"));
    }
    // take ownership immediately so failed validation still releases it
    let mut provider = PluginChecksumProvider {
        raw,
        capabilities: Capabilities::VerifyOnly,
        extensions: String::new(),
        description: String::new(),
    };
    let mut caps = RawCapabilities(0);
    check(
        unsafe { ((*(*raw).vptr).get_capabilities)(raw, &mut caps) },
        "get_capabilities failed",
    )?;
    provider.capabilities = match caps {
        RawCapabilities::FULL => Capabilities::Full,
        RawCapabilities::VERIFY_ONLY => Capabilities::VerifyOnly,
        _ => return Err(Error::Plugin("unknown capability value")),
    };
    provider.extensions = query_string(raw, unsafe { (*(*raw).vptr).file_extension })?;
    validate_extensions(&provider.extensions).map_err(|_| Error::Plugin("bad extension list"))?;
    provider.description = query_string(raw, unsafe { (*(*raw).vptr).file_description })?;
    Ok(provider)
}

// ── read bridging ───────────────────────────────────────────────────

struct ReadBridge<'a> {
    reader: LineReader<'a>,
    // keeps the most recent line alive until the next callback
    current_line: Vec<u8>,
    entries: Vec<(String, String)>,
    error: Option<Error>,
}

impl ReadBridge<'_> {
    fn fail(&mut self, e: Error) -> RawCallbackResult {
        if self.error.is_none() {
            self.error = Some(e);
        }
        RawCallbackResult::FAILED
    }
}

unsafe fn bridge_mut<'x>(ctx: *mut RawReadContext) -> &'x mut ReadBridge<'static> {
    unsafe { &mut *(ctx as *mut ReadBridge<'static>) }
}

unsafe extern "C" fn cb_read_binary(
    ctx: *mut RawReadContext,
    out_buf: *mut c_char,
    buf_size: usize,
    out_bytes_read: *mut usize,
) -> RawCallbackResult {
    catch_unwind(AssertUnwindSafe(|| {
        if out_buf.is_null() || out_bytes_read.is_null() {
            return RawCallbackResult::INVALID_ARG;
        }
        let bridge = unsafe { bridge_mut(ctx) };
        let buf = unsafe { std::slice::from_raw_parts_mut(out_buf as *mut u8, buf_size) };
        match bridge.reader.input_mut().read(buf) {
            Ok(ReadResult::Data(n)) => {
                unsafe { *out_bytes_read = n };
                RawCallbackResult::OK
            }
            Ok(ReadResult::Eof) => {
                unsafe { *out_bytes_read = 0 };
                RawCallbackResult::MORE_DATA
            }
            Err(e) => bridge.fail(e),
        }
    }))
    .unwrap_or(RawCallbackResult::FAILED)
}

unsafe extern "C" fn cb_seek_binary(
    ctx: *mut RawReadContext,
    offset: i64,
    seek_start: RawSeekStart,
) -> RawCallbackResult {
    catch_unwind(AssertUnwindSafe(|| {
        let bridge = unsafe { bridge_mut(ctx) };
        let start = match seek_start {
            RawSeekStart::CURRENT_POSITION => SeekStart::CurrentPosition,
            RawSeekStart::FILE_START => SeekStart::FileStart,
            RawSeekStart::FILE_END => SeekStart::FileEnd,
            _ => return RawCallbackResult::INVALID_ARG,
        };
        match bridge.reader.input_mut().seek(offset, start) {
            Ok(_) => RawCallbackResult::OK,
            Err(e) => bridge.fail(e),
        }
    }))
    .unwrap_or(RawCallbackResult::FAILED)
}

unsafe extern "C" fn cb_tell_binary(
    ctx: *mut RawReadContext,
    out_position: *mut i64,
) -> RawCallbackResult {
    catch_unwind(AssertUnwindSafe(|| {
        if out_position.is_null() {
            return RawCallbackResult::INVALID_ARG;
        }
        let bridge = unsafe { bridge_mut(ctx) };
        match bridge.reader.input_mut().tell() {
            Ok(pos) => {
                unsafe { *out_position = pos };
                RawCallbackResult::OK
            }
            Err(e) => bridge.fail(e),
        }
    }))
    .unwrap_or(RawCallbackResult::FAILED)
}

unsafe extern "C" fn cb_read_line(
    ctx: *mut RawReadContext,
    out_line: *mut *const c_char,
    out_line_size: *mut usize,
) -> RawCallbackResult {
    catch_unwind(AssertUnwindSafe(|| {
        if out_line.is_null() || out_line_size.is_null() {
            return RawCallbackResult::INVALID_ARG;
        }
        let bridge = unsafe { bridge_mut(ctx) };
        loop {
            match bridge.reader.read_line() {
                Ok(Some(line)) => {
                    bridge.current_line = line.into_bytes();
                    unsafe {
                        *out_line = bridge.current_line.as_ptr() as *const c_char;
                        *out_line_size = bridge.current_line.len();
                    }
                    return RawCallbackResult::OK;
                }
                Ok(None) => {
                    if bridge.reader.done() {
                        return RawCallbackResult::MORE_DATA;
                    }
                }
                Err(e) => return bridge.fail(e),
            }
        }
    }))
    .unwrap_or(RawCallbackResult::FAILED)
}

unsafe extern "C" fn cb_new_entry(
    ctx: *mut RawReadContext,
    filename: *const c_char,
    digest_string: *const c_char,
) -> RawCallbackResult {
    catch_unwind(AssertUnwindSafe(|| {
        if filename.is_null() || digest_string.is_null() {
            return RawCallbackResult::INVALID_ARG;
        }
        let bridge = unsafe { bridge_mut(ctx) };
        let name = unsafe { CStr::from_ptr(filename) };
        let digest = unsafe { CStr::from_ptr(digest_string) };
        match (name.to_str(), digest.to_str()) {
            (Ok(n), Ok(d)) => {
                bridge.entries.push((n.to_owned(), d.to_owned()));
                RawCallbackResult::OK
            }
            _ => RawCallbackResult::INVALID_ARG,
        }
    }))
    .unwrap_or(RawCallbackResult::FAILED)
}

// ── write bridging ──────────────────────────────────────────────────

struct WriteBridge<'a> {
    output: &'a mut dyn FileOutput,
    entries: Vec<(CString, CString)>,
    next: usize,
    error: Option<Error>,
}

unsafe fn write_bridge_mut<'x>(ctx: *mut RawWriteContext) -> &'x mut WriteBridge<'static> {
    unsafe { &mut *(ctx as *mut WriteBridge<'static>) }
}

unsafe extern "C" fn cb_write(
    ctx: *mut RawWriteContext,
    in_buffer: *const c_char,
    in_buffer_size: usize,
) -> RawCallbackResult {
    catch_unwind(AssertUnwindSafe(|| {
        if in_buffer.is_null() {
            return RawCallbackResult::INVALID_ARG;
        }
        let bridge = unsafe { write_bridge_mut(ctx) };
        let bytes =
            unsafe { std::slice::from_raw_parts(in_buffer as *const u8, in_buffer_size) };
        match bridge.output.write(bytes) {
            Ok(()) => RawCallbackResult::OK,
            Err(e) => {
                if bridge.error.is_none() {
                    bridge.error = Some(e);
                }
                RawCallbackResult::FAILED
            }
        }
    }))
    .unwrap_or(RawCallbackResult::FAILED)
}

unsafe extern "C" fn cb_next_entry(
    ctx: *mut RawWriteContext,
    out_filename: *mut *const c_char,
    out_digest: *mut *const c_char,
) -> RawCallbackResult {
    catch_unwind(AssertUnwindSafe(|| {
        if out_filename.is_null() || out_digest.is_null() {
            return RawCallbackResult::INVALID_ARG;
        }
        let bridge = unsafe { write_bridge_mut(ctx) };
        if bridge.next >= bridge.entries.len() {
            return RawCallbackResult::MORE_DATA;
        }
        let (name, digest) = &bridge.entries[bridge.next];
        bridge.next += 1;
        unsafe {
            *out_filename = name.as_ptr();
            *out_digest = digest.as_ptr();
        }
        RawCallbackResult::OK
    }))
    .unwrap_or(RawCallbackResult::FAILED)
}

impl ChecksumProvider for PluginChecksumProvider {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn file_extensions(&self) -> &str {
        &self.extensions
    }

    fn file_description(&self) -> &str {
        &self.description
    }

    fn create_hasher(&self, options: &HasherOptions) -> Result<Box<dyn Hasher>> {
        let mut raw_opts = RawHasherOptions {
            opt_size: std::mem::size_of::<RawHasherOptions>(),
            has_sse42: options.has_sse42 as u8,
            has_avx512: options.has_avx512 as u8,
            reserved: [0; 6],
        };
        let mut out: *mut RawHasher = std::ptr::null_mut();
        let result = unsafe {
            ((*(*self.raw).vptr).create_hasher)(self.raw, &mut out, &mut raw_opts)
        };
        check(result, "create_hasher failed")?;
        if out.is_null() {
            return Err(Error::Plugin("create_hasher produced no hasher"));
        }
        Ok(Box::new(PluginHasher {
            raw: out,
            provider: self.raw,
        }))
    }

    fn digest_from_string(&self, s: &str) -> Result<Digest> {
        let mut digest = Digest::Empty;
        let slot = &mut digest as *mut Digest as *mut RawDigestSlot;
        let result = unsafe {
            ((*(*self.raw).vptr).digest_from_string)(
                self.raw,
                slot,
                s.as_ptr() as *const c_char,
                s.len(),
            )
        };
        check(result, "digest_from_string failed")?;
        if digest.is_empty() {
            return Err(Error::Plugin("digest_from_string produced no digest"));
        }
        Ok(digest)
    }

    fn read_from_file(&self, input: &mut dyn FileInput) -> Result<ChecksumFile> {
        let mut bridge = ReadBridge {
            reader: LineReader::new(input),
            current_line: Vec::new(),
            entries: Vec::new(),
            error: None,
        };
        let ctx = &mut bridge as *mut ReadBridge as *mut RawReadContext;
        let result = unsafe {
            ((*(*self.raw).vptr).read_from_file)(
                self.raw,
                ctx,
                cb_read_binary,
                cb_seek_binary,
                cb_tell_binary,
                cb_read_line,
                cb_new_entry,
            )
        };
        // a host-side failure takes precedence over whatever the plugin
        // made of the failed callback
        if let Some(e) = bridge.error {
            return Err(e);
        }
        check(result, "read_from_file failed")?;
        let mut ret = ChecksumFile::new();
        for (name, digest_str) in bridge.entries {
            ret.add_entry(&name, self.digest_from_string(&digest_str)?)?;
        }
        Ok(ret)
    }

    fn write_new_file(&self, output: &mut dyn FileOutput, file: &ChecksumFile) -> Result<()> {
        if self.capabilities == Capabilities::VerifyOnly {
            return Err(Error::Failed);
        }
        let mut entries = Vec::with_capacity(file.entries().len());
        for e in file.entries() {
            let name = CString::new(e.display.as_str()).map_err(|_| Error::Failed)?;
            let digest = CString::new(e.digest.to_string()).map_err(|_| Error::Failed)?;
            entries.push((name, digest));
        }
        let mut bridge = WriteBridge {
            output,
            entries,
            next: 0,
            error: None,
        };
        let ctx = &mut bridge as *mut WriteBridge as *mut RawWriteContext;
        let result = unsafe {
            ((*(*self.raw).vptr).write_new_file)(self.raw, ctx, cb_write, cb_next_entry)
        };
        if let Some(e) = bridge.error {
            return Err(e);
        }
        check(result, "write_new_file failed")
    }
}
