//! CRC-32/ISO-HDLC (polynomial 0x04C11DB7 reflected, init 0, xorout
//! 0xFFFFFFFF) with runtime-dispatched SIMD kernels.
//!
//! Three implementations produce identical digests for any input:
//! a scalar slicing-by-8 table kernel, an SSE4.2+PCLMULQDQ kernel folding
//! 16-byte blocks, and an AVX-512+VPCLMULQDQ kernel folding 256-byte blocks.
//! The carry-less multiplication constants are the bit-reflected values from
//! "Fast CRC Computation for Generic Polynomials Using PCLMULQDQ
//! Instruction" (V. Gopal, E. Ozturk, et al., 2009).

use crate::digest::{Digest, parse_hex_u32};
use crate::error::{Error, Result};

use super::core::{Hasher, HasherOptions};

/// Slicing-by-8 lookup tables for the reflected polynomial 0xEDB88320.
/// Table 0 is the standard byte-at-a-time table; tables 1-7 enable
/// processing 8 bytes per iteration, breaking the data dependency chain.
const CRC_TABLES: [[u32; 256]; 8] = {
    let mut tables = [[0u32; 256]; 8];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xedb8_8320
            } else {
                crc >> 1
            };
            j += 1;
        }
        tables[0][i] = crc;
        i += 1;
    }
    let mut t = 1;
    while t < 8 {
        let mut i = 0;
        while i < 256 {
            let prev = tables[t - 1][i];
            tables[t][i] = (prev >> 8) ^ tables[0][(prev & 0xff) as usize];
            i += 1;
        }
        t += 1;
    }
    tables
};

/// Table-driven kernel over the raw (pre-inverted) CRC state.
fn crc32_table(data: &[u8], mut crc: u32) -> u32 {
    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let lo = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ crc;
        crc = CRC_TABLES[7][(lo & 0xff) as usize]
            ^ CRC_TABLES[6][((lo >> 8) & 0xff) as usize]
            ^ CRC_TABLES[5][((lo >> 16) & 0xff) as usize]
            ^ CRC_TABLES[4][(lo >> 24) as usize]
            ^ CRC_TABLES[3][chunk[4] as usize]
            ^ CRC_TABLES[2][chunk[5] as usize]
            ^ CRC_TABLES[1][chunk[6] as usize]
            ^ CRC_TABLES[0][chunk[7] as usize];
    }
    for &b in chunks.remainder() {
        crc = (crc >> 8) ^ CRC_TABLES[0][((crc ^ b as u32) & 0xff) as usize];
    }
    crc
}

// Bit-reflected fold constants for the ISO-HDLC polynomial.
// k5/k6 fold one 128-bit block (x^(128+32), x^(128-32)); k7 folds 64 to 32
// bits; Px/Ux are the CRC and Barrett reduction polynomials.
#[cfg(target_arch = "x86_64")]
const K5: i64 = 0x0175_1997_d0;
#[cfg(target_arch = "x86_64")]
const K6: i64 = 0x00cc_aa00_9e;
#[cfg(target_arch = "x86_64")]
const K7: i64 = 0x0163_cd61_24;
#[cfg(target_arch = "x86_64")]
const PX: i64 = 0x01db_7106_41;
#[cfg(target_arch = "x86_64")]
const UX: i64 = 0x01f7_0116_41;

// 512-bit folds: k1/k2 fold four 512-bit blocks (x^(512*4±32)), k3/k4 fold
// one 512-bit block (x^(512±32)).
#[cfg(target_arch = "x86_64")]
const K1: i64 = 0x0115_4277_8a;
#[cfg(target_arch = "x86_64")]
const K2: i64 = 0x0132_2d14_30;
#[cfg(target_arch = "x86_64")]
const K3: i64 = 0x0154_442b_d4;
#[cfg(target_arch = "x86_64")]
const K4: i64 = 0x01c6_e415_96;

/// Reduce a 128-bit folded remainder to the 32-bit CRC:
/// 128 -> 64 bits with k5/k7, then Barrett reduction with Px/Ux.
/// The CRC lands in lane 1 of the final register.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2,sse4.1,pclmulqdq")]
unsafe fn fold_128_to_32(x1: core::arch::x86_64::__m128i) -> u32 {
    use core::arch::x86_64::*;

    let k5k6 = _mm_set_epi64x(K6, K5);
    let mask32 = _mm_setr_epi32(!0, 0, !0, 0);

    // Fold 128 bits to 64 bits.
    let mut a1 = x1;
    let a2 = _mm_clmulepi64_si128::<0x10>(a1, k5k6);
    a1 = _mm_srli_si128::<8>(a1);
    a1 = _mm_xor_si128(a1, a2);

    let k7 = _mm_set_epi64x(0, K7);
    let a2 = _mm_srli_si128::<4>(a1);
    a1 = _mm_and_si128(a1, mask32);
    a1 = _mm_clmulepi64_si128::<0x00>(a1, k7);
    a1 = _mm_xor_si128(a1, a2);

    // Barrett reduce to 32 bits.
    let poly = _mm_set_epi64x(UX, PX);
    let mut a2 = _mm_and_si128(a1, mask32);
    a2 = _mm_clmulepi64_si128::<0x10>(a2, poly);
    a2 = _mm_and_si128(a2, mask32);
    a2 = _mm_clmulepi64_si128::<0x00>(a2, poly);
    a1 = _mm_xor_si128(a1, a2);

    _mm_extract_epi32::<1>(a1) as u32
}

/// PCLMULQDQ kernel folding 16-byte blocks.
/// `buf` must be at least 16 bytes and a multiple of 16.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2,sse4.1,pclmulqdq")]
unsafe fn crc32_sse42(buf: &[u8], crc: u32) -> u32 {
    use core::arch::x86_64::*;

    debug_assert!(buf.len() >= 16 && buf.len() % 16 == 0);
    let ptr = buf.as_ptr();
    let len = buf.len();

    let k5k6 = _mm_set_epi64x(K6, K5);
    let mut x1 = unsafe { _mm_loadu_si128(ptr as *const __m128i) };
    x1 = _mm_xor_si128(x1, _mm_cvtsi32_si128(crc as i32));

    let mut pos = 16;
    while pos < len {
        let data = unsafe { _mm_loadu_si128(ptr.add(pos) as *const __m128i) };
        let x2 = _mm_clmulepi64_si128::<0x00>(x1, k5k6);
        x1 = _mm_clmulepi64_si128::<0x11>(x1, k5k6);
        x1 = _mm_xor_si128(x1, x2);
        x1 = _mm_xor_si128(x1, data);
        pos += 16;
    }

    unsafe { fold_128_to_32(x1) }
}

/// VPCLMULQDQ kernel folding 256-byte blocks, then reducing
/// 512 -> 384 -> 256 -> 128 -> 64 -> 32 bits.
/// `buf` must be at least 256 bytes and a multiple of 64.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx512f,vpclmulqdq,pclmulqdq,sse4.1")]
unsafe fn crc32_avx512(buf: &[u8], crc: u32) -> u32 {
    use core::arch::x86_64::*;

    debug_assert!(buf.len() >= 256 && buf.len() % 64 == 0);
    let mut ptr = buf.as_ptr();
    let mut len = buf.len();

    let k1k2 = _mm512_setr_epi64(K1, K2, K1, K2, K1, K2, K1, K2);
    let k3k4 = _mm512_setr_epi64(K3, K4, K3, K4, K3, K4, K3, K4);

    // There's at least one block of 256.
    let mut x1 = unsafe { _mm512_loadu_si512(ptr as *const _) };
    let mut x2 = unsafe { _mm512_loadu_si512(ptr.add(0x40) as *const _) };
    let mut x3 = unsafe { _mm512_loadu_si512(ptr.add(0x80) as *const _) };
    let mut x4 = unsafe { _mm512_loadu_si512(ptr.add(0xc0) as *const _) };

    x1 = _mm512_xor_si512(x1, _mm512_castsi128_si512(_mm_cvtsi32_si128(crc as i32)));

    ptr = unsafe { ptr.add(256) };
    len -= 256;

    // Parallel fold blocks of 256, if any.
    while len >= 256 {
        let x5 = _mm512_clmulepi64_epi128::<0x00>(x1, k1k2);
        let x6 = _mm512_clmulepi64_epi128::<0x00>(x2, k1k2);
        let x7 = _mm512_clmulepi64_epi128::<0x00>(x3, k1k2);
        let x8 = _mm512_clmulepi64_epi128::<0x00>(x4, k1k2);

        x1 = _mm512_clmulepi64_epi128::<0x11>(x1, k1k2);
        x2 = _mm512_clmulepi64_epi128::<0x11>(x2, k1k2);
        x3 = _mm512_clmulepi64_epi128::<0x11>(x3, k1k2);
        x4 = _mm512_clmulepi64_epi128::<0x11>(x4, k1k2);

        let y5 = unsafe { _mm512_loadu_si512(ptr as *const _) };
        let y6 = unsafe { _mm512_loadu_si512(ptr.add(0x40) as *const _) };
        let y7 = unsafe { _mm512_loadu_si512(ptr.add(0x80) as *const _) };
        let y8 = unsafe { _mm512_loadu_si512(ptr.add(0xc0) as *const _) };

        x1 = _mm512_xor_si512(_mm512_xor_si512(x1, x5), y5);
        x2 = _mm512_xor_si512(_mm512_xor_si512(x2, x6), y6);
        x3 = _mm512_xor_si512(_mm512_xor_si512(x3, x7), y7);
        x4 = _mm512_xor_si512(_mm512_xor_si512(x4, x8), y8);

        ptr = unsafe { ptr.add(256) };
        len -= 256;
    }

    // Fold the four accumulators into one 512-bit register.
    let mut x5 = _mm512_clmulepi64_epi128::<0x00>(x1, k3k4);
    x1 = _mm512_clmulepi64_epi128::<0x11>(x1, k3k4);
    x1 = _mm512_xor_si512(_mm512_xor_si512(x1, x2), x5);

    x5 = _mm512_clmulepi64_epi128::<0x00>(x1, k3k4);
    x1 = _mm512_clmulepi64_epi128::<0x11>(x1, k3k4);
    x1 = _mm512_xor_si512(_mm512_xor_si512(x1, x3), x5);

    x5 = _mm512_clmulepi64_epi128::<0x00>(x1, k3k4);
    x1 = _mm512_clmulepi64_epi128::<0x11>(x1, k3k4);
    x1 = _mm512_xor_si512(_mm512_xor_si512(x1, x4), x5);

    // Single fold blocks of 64, if any.
    while len >= 64 {
        let data = unsafe { _mm512_loadu_si512(ptr as *const _) };
        x5 = _mm512_clmulepi64_epi128::<0x00>(x1, k3k4);
        x1 = _mm512_clmulepi64_epi128::<0x11>(x1, k3k4);
        x1 = _mm512_xor_si512(_mm512_xor_si512(x1, data), x5);
        ptr = unsafe { ptr.add(64) };
        len -= 64;
    }

    // Fold 512 bits to 384, 384 to 256, 256 to 128.
    let k5k6 = _mm_set_epi64x(K6, K5);
    let mut a1 = _mm512_extracti32x4_epi32::<0>(x1);
    for lane in [
        _mm512_extracti32x4_epi32::<1>(x1),
        _mm512_extracti32x4_epi32::<2>(x1),
        _mm512_extracti32x4_epi32::<3>(x1),
    ] {
        let a3 = _mm_clmulepi64_si128::<0x00>(a1, k5k6);
        a1 = _mm_clmulepi64_si128::<0x11>(a1, k5k6);
        a1 = _mm_xor_si128(a1, a3);
        a1 = _mm_xor_si128(a1, lane);
    }

    unsafe { fold_128_to_32(a1) }
}

/// Computes the CRC-32/ISO-HDLC checksum of `data`.
///
/// `crc_start` is 0 for the first call and the most recent return value on
/// repeated invocations; partial states compose freely across kernels.
/// `use_avx512`/`use_sse42` must not claim features the CPU lacks; pass the
/// values from [`super::CpuFeatures::detect`].
pub fn crc32(data: &[u8], crc_start: u32, use_avx512: bool, use_sse42: bool) -> u32 {
    let mut crc = !crc_start;
    let mut buf = data;
    #[cfg(target_arch = "x86_64")]
    {
        if use_avx512 && buf.len() >= 256 {
            let split = buf.len() & !63;
            crc = unsafe { crc32_avx512(&buf[..split], crc) };
            buf = &buf[split..];
        } else if use_sse42 && buf.len() >= 16 {
            let split = buf.len() & !15;
            crc = unsafe { crc32_sse42(&buf[..split], crc) };
            buf = &buf[split..];
        }
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = (use_avx512, use_sse42);
    !crc32_table(buf, crc)
}

/// Streaming CRC-32 hasher.
pub struct Crc32Hasher {
    state: u32,
    finalized: bool,
    use_avx512: bool,
    use_sse42: bool,
}

impl Crc32Hasher {
    pub fn new(options: &HasherOptions) -> Crc32Hasher {
        Crc32Hasher {
            state: 0,
            finalized: false,
            use_avx512: options.has_avx512,
            use_sse42: options.has_sse42,
        }
    }

    /// Parse a digest from its 8 hex digit string form.
    pub fn digest_from_string(s: &str) -> Result<Digest> {
        Ok(Digest::Crc32(parse_hex_u32(s)?))
    }

    pub fn digest_from_raw(d: u32) -> Digest {
        Digest::Crc32(d)
    }
}

impl Hasher for Crc32Hasher {
    fn add_data(&mut self, data: &[u8]) -> Result<()> {
        if self.finalized {
            return Err(Error::HasherFailure);
        }
        self.state = crc32(data, self.state, self.use_avx512, self.use_sse42);
        Ok(())
    }

    fn finalize(&mut self) -> Result<Digest> {
        if self.finalized {
            return Err(Error::HasherFailure);
        }
        self.finalized = true;
        Ok(Digest::Crc32(self.state))
    }

    fn reset(&mut self) {
        self.state = 0;
        self.finalized = false;
    }
}
