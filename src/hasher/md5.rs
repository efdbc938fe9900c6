//! MD5 (RFC 1321) streaming hasher over the `md-5` crate.

use digest::Digest as _;
use md5::Md5;

use crate::digest::{Digest, parse_hex_bytes};
use crate::error::{Error, Result};

use super::core::{Hasher, HasherOptions};

/// Streaming MD5 hasher. No SIMD; the hasher options carry no weight here.
pub struct Md5Hasher {
    context: Md5,
    finalized: bool,
}

impl Md5Hasher {
    pub fn new(_options: &HasherOptions) -> Md5Hasher {
        Md5Hasher {
            context: Md5::new(),
            finalized: false,
        }
    }

    /// Parse a digest from its 32 hex digit string form.
    pub fn digest_from_string(s: &str) -> Result<Digest> {
        Ok(Digest::Md5(parse_hex_bytes::<16>(s)?))
    }
}

impl Hasher for Md5Hasher {
    fn add_data(&mut self, data: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(Error::HasherFailure);
        }
        self.context.update(data);
        Ok(())
    }

    fn finalize(&mut self) -> Result<Digest> {
        if self.finalized {
            return Err(Error::HasherFailure);
        }
        self.finalized = true;
        let out = self.context.finalize_reset();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&out);
        Ok(Digest::Md5(bytes))
    }

    fn reset(&mut self) {
        self.context = Md5::new();
        self.finalized = false;
    }
}
