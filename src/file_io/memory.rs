//! In-memory byte streams. Used by tests and by embedders that keep
//! manifests somewhere other than the filesystem.

use crate::error::Result;

use super::core::{FileInput, FileOutput, ReadResult, SeekStart};

/// [`FileInput`] over an owned byte buffer.
pub struct MemoryInput {
    data: Vec<u8>,
    pos: usize,
    eof: bool,
    name: String,
}

impl MemoryInput {
    pub fn new(data: impl Into<Vec<u8>>) -> MemoryInput {
        MemoryInput {
            data: data.into(),
            pos: 0,
            eof: false,
            name: String::from("<memory>"),
        }
    }

    pub fn with_name(data: impl Into<Vec<u8>>, name: &str) -> MemoryInput {
        MemoryInput {
            data: data.into(),
            pos: 0,
            eof: false,
            name: name.to_owned(),
        }
    }
}

impl FileInput for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadResult> {
        if self.eof {
            return Ok(ReadResult::Eof);
        }
        let available = self.data.len() - self.pos;
        if available == 0 {
            self.eof = true;
            return Ok(ReadResult::Eof);
        }
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        if n < buf.len() {
            self.eof = true;
        }
        Ok(ReadResult::Data(n))
    }

    fn seek(&mut self, offset: i64, start: SeekStart) -> Result<i64> {
        let base = match start {
            SeekStart::CurrentPosition => self.pos as i64,
            SeekStart::FileStart => 0,
            SeekStart::FileEnd => self.data.len() as i64,
        };
        let new_pos = (base + offset).clamp(0, self.data.len() as i64);
        self.pos = new_pos as usize;
        self.eof = false;
        Ok(new_pos)
    }

    fn tell(&mut self) -> Result<i64> {
        Ok(self.pos as i64)
    }

    fn current_file(&self) -> &str {
        &self.name
    }

    fn open(&mut self, _new_file: &str) -> bool {
        false
    }

    fn file_size(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }
}

/// [`FileOutput`] collecting everything written into a buffer.
#[derive(Default)]
pub struct MemoryOutput {
    data: Vec<u8>,
}

impl MemoryOutput {
    pub fn new() -> MemoryOutput {
        MemoryOutput { data: Vec::new() }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl FileOutput for MemoryOutput {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.data.extend_from_slice(bytes);
        Ok(())
    }
}
