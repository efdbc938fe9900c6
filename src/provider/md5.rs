//! The `.md5` format: one `<digest> *<path>` entry per line.

use crate::checksum_file::ChecksumFile;
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::file_io::{FileInput, FileOutput};
use crate::hasher::{Hasher, HasherOptions, Md5Hasher};
use crate::line_reader::LineReader;
use crate::utf::trim;

use super::core::{Capabilities, ChecksumProvider};

/// Provider for MD5 checksum files.
pub struct Md5Provider;

impl Md5Provider {
    pub fn new() -> Md5Provider {
        Md5Provider
    }
}

impl ChecksumProvider for Md5Provider {
    fn capabilities(&self) -> Capabilities {
        Capabilities::Full
    }

    fn file_extensions(&self) -> &str {
        "*.md5"
    }

    fn file_description(&self) -> &str {
        "MD5"
    }

    fn create_hasher(&self, options: &HasherOptions) -> Result<Box<dyn Hasher>> {
        Ok(Box::new(Md5Hasher::new(options)))
    }

    fn digest_from_string(&self, s: &str) -> Result<Digest> {
        Md5Hasher::digest_from_string(s)
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
            if line.is_empty() {
                continue;
            }
            // skip comments
            if line.starts_with(';') {
                continue;
            }
            // the " *" separator is mandatory
            let Some(separator_idx) = line.find('*') else {
                return Err(Error::Parser);
            };
            if separator_idx == 0 || line.as_bytes()[separator_idx - 1] != b' ' {
                return Err(Error::Parser);
            }
            let file_path = trim(&line[separator_idx + 1..]);
            if file_path.contains('*') {
                return Err(Error::Parser);
            }
            let digest_str = trim(&line[..separator_idx - 1]);
            ret.add_entry(file_path, Md5Hasher::digest_from_string(digest_str)?)?;
        }
        Ok(ret)
    }

    fn write_new_file(&self, output: &mut dyn FileOutput, file: &ChecksumFile) -> Result<()> {
        for e in file.entries() {
            let mut out_str = String::with_capacity(e.display.len() + 36);
            out_str.push_str(&e.digest.to_string());
            out_str.push_str(" *");
            out_str.push_str(&e.display);
            out_str.push('\n');
            output.write(out_str.as_bytes())?;
        }
        Ok(())
    }
}
