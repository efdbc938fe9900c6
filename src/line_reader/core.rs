//! Double-buffered line splitting over a [`FileInput`].

use memchr::memchr;

use crate::error::{Error, Result};
use crate::file_io::{FileInput, ReadResult};
use crate::utf::check_valid_utf8;

/// Size of each of the two read buffers.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Yields lines (without terminators) from a [`FileInput`].
///
/// Input is read in two fixed 64 KiB buffers. Recognized line terminators
/// are LF and CRLF; a lone CR in the middle of a line is not a separator.
/// A line may span the two buffers, but a single line with no terminator in
/// sight of both buffers is rejected as a parser error, as is any line that
/// is not valid UTF-8. Residual bytes at end of file form one final line.
pub struct LineReader<'a> {
    input: &'a mut dyn FileInput,
    front: Vec<u8>,
    back: Vec<u8>,
    // consumed prefix of the front buffer
    offset: usize,
    started: bool,
    eof: bool,
}

impl<'a> LineReader<'a> {
    pub fn new(input: &'a mut dyn FileInput) -> LineReader<'a> {
        LineReader {
            input,
            front: Vec::new(),
            back: Vec::new(),
            offset: 0,
            started: false,
            eof: false,
        }
    }

    /// Direct access to the underlying input for binary reads and seeks.
    /// Bytes read this way bypass the line buffers.
    pub fn input_mut(&mut self) -> &mut dyn FileInput {
        &mut *self.input
    }

    /// True once the input and both buffers are exhausted.
    pub fn done(&self) -> bool {
        self.started && self.eof && self.back.is_empty() && self.offset >= self.front.len()
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        match self.input.read(&mut buf)? {
            ReadResult::Eof => {
                self.eof = true;
                buf.clear();
            }
            ReadResult::Data(n) => {
                buf.truncate(n);
                if n < READ_BUFFER_SIZE {
                    self.eof = true;
                }
            }
        }
        Ok(buf)
    }

    fn finish_line(&self, mut bytes: Vec<u8>) -> Result<String> {
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        if !check_valid_utf8(&bytes) {
            return Err(Error::Parser);
        }
        // SAFETY: validated directly above.
        Ok(unsafe { String::from_utf8_unchecked(bytes) })
    }

    /// Read the next line. `Ok(None)` signals end of input; check `done()`.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        if !self.started {
            self.started = true;
            self.front = self.read_chunk()?;
            if !self.eof {
                self.back = self.read_chunk()?;
            }
        }
        if self.done() {
            return Ok(None);
        }

        // line fully contained in the front buffer
        if let Some(i) = memchr(b'\n', &self.front[self.offset..]) {
            let line = self.front[self.offset..self.offset + i].to_vec();
            self.offset += i + 1;
            return self.finish_line(line).map(Some);
        }

        // line spans into the back buffer
        if let Some(j) = memchr(b'\n', &self.back) {
            let mut line = self.front[self.offset..].to_vec();
            line.extend_from_slice(&self.back[..j]);
            self.front = std::mem::take(&mut self.back);
            self.offset = j + 1;
            if !self.eof {
                self.back = self.read_chunk()?;
            }
            return self.finish_line(line).map(Some);
        }

        if !self.eof {
            // no newline within two full buffers; assume invalid file
            return Err(Error::Parser);
        }

        // residual bytes at end of file form the final line
        let mut line = self.front.split_off(self.offset.min(self.front.len()));
        line.append(&mut self.back);
        self.front.clear();
        self.offset = 0;
        if line.is_empty() {
            return Ok(None);
        }
        self.finish_line(line).map(Some)
    }
}
