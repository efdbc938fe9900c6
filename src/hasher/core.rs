//! Streaming digest computation.

use crate::digest::Digest;
use crate::error::Result;

/// CPU acceleration features usable by hashers.
///
/// Computed once at startup and passed by value into hasher construction;
/// there is no ambient singleton. `detect()` never reports a feature the
/// CPU lacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuFeatures {
    pub has_sse42: bool,
    pub has_avx512: bool,
}

impl CpuFeatures {
    /// Inspect the CPU: leaf 1 for SSE4.2/PCLMULQDQ/AVX, leaf 7 sub-leaf 0
    /// for AVX-512F/VPCLMULQDQ.
    #[cfg(target_arch = "x86_64")]
    pub fn detect() -> CpuFeatures {
        let pclmul = std::arch::is_x86_feature_detected!("pclmulqdq");
        CpuFeatures {
            has_sse42: std::arch::is_x86_feature_detected!("sse4.2") && pclmul,
            has_avx512: std::arch::is_x86_feature_detected!("avx")
                && pclmul
                && std::arch::is_x86_feature_detected!("avx512f")
                && std::arch::is_x86_feature_detected!("vpclmulqdq"),
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    pub fn detect() -> CpuFeatures {
        CpuFeatures::default()
    }
}

/// Per-hasher configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HasherOptions {
    pub has_sse42: bool,
    pub has_avx512: bool,
}

impl From<CpuFeatures> for HasherOptions {
    fn from(f: CpuFeatures) -> HasherOptions {
        HasherOptions {
            has_sse42: f.has_sse42,
            has_avx512: f.has_avx512,
        }
    }
}

/// A streaming digest computer.
///
/// After `finalize` only `reset` is legal; feeding more data or finalizing
/// again reports [`crate::Error::HasherFailure`].
pub trait Hasher: Send {
    fn add_data(&mut self, data: &[u8]) -> Result<()>;
    fn finalize(&mut self) -> Result<Digest>;
    fn reset(&mut self);
}
