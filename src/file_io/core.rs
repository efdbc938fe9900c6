//! Byte-stream abstraction used by providers and the scheduler.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Outcome of a [`FileInput::read`] call.
///
/// End of file is an explicit sentinel rather than a zero-length read so
/// that callers cannot confuse it with an empty buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    /// Number of bytes placed into the buffer. If this is less than the
    /// buffer size, the end of file has been reached and subsequent reads
    /// return [`ReadResult::Eof`].
    Data(usize),
    /// No further input is available.
    Eof,
}

/// Start position for a [`FileInput::seek`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStart {
    CurrentPosition,
    FileStart,
    FileEnd,
}

/// Read access to a single file, with the ability to re-target to sibling
/// files relative to the originally opened path.
pub trait FileInput {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadResult>;
    fn seek(&mut self, offset: i64, start: SeekStart) -> Result<i64>;
    fn tell(&mut self) -> Result<i64>;
    /// File name (with extension, without directory) of the current file.
    fn current_file(&self) -> &str;
    /// Open a new file for reading, interpreted relative to the directory of
    /// the originally opened file. On failure returns false and the original
    /// file remains open.
    fn open(&mut self, new_file: &str) -> bool;
    fn file_size(&mut self) -> Result<u64>;
}

/// Write access to a single file.
pub trait FileOutput {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Track whether O_NOATIME is supported to avoid repeated failed open()
/// attempts. After the first EPERM, we never try O_NOATIME again.
#[cfg(target_os = "linux")]
static NOATIME_SUPPORTED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Open a file read-only with O_NOATIME on Linux to avoid atime update
/// overhead, falling back silently when the caller lacks ownership.
#[cfg(target_os = "linux")]
pub(crate) fn open_readable(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    use std::sync::atomic::Ordering;
    if NOATIME_SUPPORTED.load(Ordering::Relaxed) {
        match std::fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NOATIME)
            .open(path)
        {
            Ok(f) => return Ok(f),
            Err(ref e) if e.raw_os_error() == Some(libc::EPERM) => {
                // O_NOATIME requires file ownership or CAP_FOWNER
                NOATIME_SUPPORTED.store(false, Ordering::Relaxed);
            }
            Err(e) => return Err(e),
        }
    }
    File::open(path)
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn open_readable(path: &Path) -> std::io::Result<File> {
    File::open(path)
}

/// Hint the kernel that the file will be read sequentially front to back.
#[cfg(target_os = "linux")]
pub(crate) fn advise_sequential(file: &File) {
    use std::os::unix::io::AsRawFd;
    if let Ok(meta) = file.metadata() {
        if meta.file_type().is_file() && meta.len() > 0 {
            unsafe {
                libc::posix_fadvise(
                    file.as_raw_fd(),
                    0,
                    meta.len() as libc::off_t,
                    libc::POSIX_FADV_SEQUENTIAL,
                );
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn advise_sequential(_file: &File) {}

/// [`FileInput`] over the local filesystem.
pub struct FsFileInput {
    file: File,
    eof: bool,
    base_dir: PathBuf,
    file_name: String,
}

impl FsFileInput {
    /// Open `path` for reading. The file name must be valid UTF-8.
    pub fn new(path: &Path) -> Result<FsFileInput> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(Error::Failed)?
            .to_owned();
        let base_dir = path.parent().unwrap_or(Path::new("")).to_path_buf();
        let file = open_readable(path)?;
        advise_sequential(&file);
        Ok(FsFileInput {
            file,
            eof: false,
            base_dir,
            file_name,
        })
    }

    /// Directory of the originally opened file; relative entry paths resolve
    /// against this.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl FileInput for FsFileInput {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadResult> {
        if self.eof {
            return Ok(ReadResult::Eof);
        }
        // Fill the whole buffer unless the file ends first; short reads from
        // the OS are retried so a partial result always means end of file.
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if total == 0 {
            self.eof = true;
            return Ok(ReadResult::Eof);
        }
        if total < buf.len() {
            self.eof = true;
        }
        Ok(ReadResult::Data(total))
    }

    fn seek(&mut self, offset: i64, start: SeekStart) -> Result<i64> {
        let pos = match start {
            SeekStart::CurrentPosition => SeekFrom::Current(offset),
            SeekStart::FileStart => SeekFrom::Start(offset as u64),
            SeekStart::FileEnd => SeekFrom::End(offset),
        };
        let new_pos = self.file.seek(pos)?;
        self.eof = false;
        Ok(new_pos as i64)
    }

    fn tell(&mut self) -> Result<i64> {
        Ok(self.file.stream_position()? as i64)
    }

    fn current_file(&self) -> &str {
        &self.file_name
    }

    fn open(&mut self, new_file: &str) -> bool {
        let full_path = self.base_dir.join(new_file);
        match open_readable(&full_path) {
            Ok(f) => {
                advise_sequential(&f);
                self.file = f;
                self.eof = false;
                self.file_name = new_file.to_owned();
                true
            }
            Err(_) => false,
        }
    }

    fn file_size(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// [`FileOutput`] over the local filesystem. Truncates any existing file.
pub struct FsFileOutput {
    file: File,
}

impl FsFileOutput {
    pub fn create(path: &Path) -> Result<FsFileOutput> {
        Ok(FsFileOutput {
            file: File::create(path)?,
        })
    }
}

impl FileOutput for FsFileOutput {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        use std::io::Write;
        self.file.write_all(bytes)?;
        Ok(())
    }
}
