//! The `.sfv` format: one `<path> <crc32>` entry per line.

use crate::checksum_file::ChecksumFile;
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::file_io::{FileInput, FileOutput};
use crate::hasher::{Crc32Hasher, Hasher, HasherOptions};
use crate::line_reader::LineReader;
use crate::utf::trim;

use super::core::{Capabilities, ChecksumProvider};

/// Provider for SFV checksum files (CRC-32).
pub struct SfvProvider;

impl SfvProvider {
    pub fn new() -> SfvProvider {
        SfvProvider
    }
}

impl ChecksumProvider for SfvProvider {
    fn capabilities(&self) -> Capabilities {
        Capabilities::Full
    }

    fn file_extensions(&self) -> &str {
        "*.sfv"
    }

    fn file_description(&self) -> &str {
        "Sfv File"
    }

    fn create_hasher(&self, options: &HasherOptions) -> Result<Box<dyn Hasher>> {
        Ok(Box::new(Crc32Hasher::new(options)))
    }

    fn digest_from_string(&self, s: &str) -> Result<Digest> {
        Crc32Hasher::digest_from_string(s)
    }

    fn read_from_file(&self, input: &mut dyn FileInput) -> Result<ChecksumFile> {
        let mut reader = LineReader::new(input);
        let mut ret = ChecksumFile::new();
        loop {
            let Some(line) = reader.read_line()? else {
                if reader.done() {
                    break;
                }
                continue;
            };
            let line = trim(&line);
            if line.is_empty() {
                continue;
            }
            // skip comments
            if line.starts_with(';') {
                continue;
            }
            // last 8 chars are the digest, preceded by exactly one space
            if line.len() < 10 {
                return Err(Error::Parser);
            }
            let separator_idx = line.len() - 8;
            if !line.is_char_boundary(separator_idx)
                || line.as_bytes()[separator_idx - 1] != b' '
            {
                return Err(Error::Parser);
            }
            let file_path = trim(&line[..separator_idx - 1]);
            if file_path.is_empty() {
                return Err(Error::Parser);
            }
            ret.add_entry(
                file_path,
                Crc32Hasher::digest_from_string(&line[separator_idx..])?,
            )?;
        }
        Ok(ret)
    }

    fn write_new_file(&self, output: &mut dyn FileOutput, file: &ChecksumFile) -> Result<()> {
        for e in file.entries() {
            let mut out_str = String::with_capacity(e.display.len() + 11);
            out_str.push_str(&e.display);
            out_str.push(' ');
            out_str.push_str(&e.digest.to_string());
            out_str.push('\n');
            output.write(out_str.as_bytes())?;
        }
        Ok(())
    }
}
