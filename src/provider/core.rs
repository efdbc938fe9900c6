//! Format adapters binding a manifest syntax to a hasher.

use std::sync::Arc;

use crate::checksum_file::ChecksumFile;
use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::file_io::{FileInput, FileOutput};
use crate::hasher::{Hasher, HasherOptions};

/// What a provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capabilities {
    /// Read and write.
    Full,
    /// Parse only; calls to `write_new_file` always fail.
    VerifyOnly,
}

/// Provides facilities for reading, writing, and checking one checksum file
/// format. Providers are immutable after registration and shared read-only
/// between the UI and the worker.
pub trait ChecksumProvider: Send + Sync {
    fn capabilities(&self) -> Capabilities;
    /// Semicolon-separated list of glob patterns of the form `*.ext`,
    /// used to match manifests to providers by file name.
    fn file_extensions(&self) -> &str;
    /// Short, user-readable description of the file format.
    fn file_description(&self) -> &str;
    /// Create a fresh hasher suitable for computing this format's digests.
    fn create_hasher(&self, options: &HasherOptions) -> Result<Box<dyn Hasher>>;
    /// Parse a digest in the textual form produced by this format's hasher.
    /// Round-trips with `Digest::to_string`.
    fn digest_from_string(&self, s: &str) -> Result<Digest>;
    /// Parse a manifest.
    fn read_from_file(&self, input: &mut dyn FileInput) -> Result<ChecksumFile>;
    /// Serialize a manifest.
    fn write_new_file(&self, output: &mut dyn FileOutput, file: &ChecksumFile) -> Result<()>;
}

/// Check an extension list for well-formedness: every semicolon-separated
/// token must be non-empty and `*`-led. A violation is a provider
/// implementation bug, reported at registration time.
pub fn validate_extensions(extensions: &str) -> Result<()> {
    if extensions.is_empty() {
        return Err(Error::Failed);
    }
    for token in extensions.split(';') {
        if !token.starts_with('*') || token.len() < 2 {
            return Err(Error::Failed);
        }
    }
    Ok(())
}

/// Does `file_name` match any of the provider's extension globs?
/// Matching is a case-insensitive suffix test on the part after the `*`.
pub fn matches_extension(extensions: &str, file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    extensions.split(';').any(|token| {
        let suffix = token.trim_start_matches('*').to_lowercase();
        !suffix.is_empty() && lower.ends_with(&suffix)
    })
}

/// Pick the first registered provider whose extension list matches the file.
pub fn find_provider_for<'a>(
    providers: &'a [Arc<dyn ChecksumProvider>],
    file_name: &str,
) -> Option<&'a Arc<dyn ChecksumProvider>> {
    providers
        .iter()
        .find(|p| matches_extension(p.file_extensions(), file_name))
}
