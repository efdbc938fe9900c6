//! Value-semantic checksum digest.

use std::fmt;

use crate::plugin::PluginDigest;

use super::hex::hex_encode;

/// The finalized output of a hasher, or a digest parsed from a manifest.
///
/// `Digest` behaves like a plain value: it can be cloned, compared and
/// formatted without knowing which hasher produced it. Two digests compare
/// equal only if they are of the same kind; comparing a CRC digest with an
/// MD5 digest is `false`, never an error. The string form is deterministic:
/// equal digests always render identically.
#[derive(Debug, Clone, Default)]
pub enum Digest {
    /// Empty digest; only equal to other empty digests.
    #[default]
    Empty,
    /// CRC-32/ISO-HDLC result.
    Crc32(u32),
    /// MD5 result.
    Md5([u8; 16]),
    /// Digest owned by an ffi-plugin, operated on through its callbacks.
    Plugin(PluginDigest),
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        matches!(self, Digest::Empty)
    }
}

impl PartialEq for Digest {
    fn eq(&self, other: &Digest) -> bool {
        match (self, other) {
            (Digest::Empty, Digest::Empty) => true,
            (Digest::Crc32(a), Digest::Crc32(b)) => a == b,
            (Digest::Md5(a), Digest::Md5(b)) => a == b,
            (Digest::Plugin(a), Digest::Plugin(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Digest {}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Digest::Empty => Ok(()),
            // big-endian nibble order: most significant byte first
            Digest::Crc32(v) => write!(f, "{}", hex_encode(&v.to_be_bytes())),
            Digest::Md5(bytes) => write!(f, "{}", hex_encode(bytes)),
            Digest::Plugin(p) => write!(f, "{}", p.render()),
        }
    }
}
