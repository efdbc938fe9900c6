//! UTF-8/UTF-16 decoding, encoding and validation.
//!
//! All functions are pure. Decoders consume from the front of the input and
//! report how many code units they used; `code_units_consumed == 0` signals
//! a malformed sequence.

/// Result of decoding a single code point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeResult {
    /// Number of code units consumed from the input; 0 on error.
    pub code_units_consumed: u32,
    /// The decoded code point; meaningless when `code_units_consumed` is 0.
    pub code_point: u32,
}

const DECODE_ERROR: DecodeResult = DecodeResult {
    code_units_consumed: 0,
    code_point: 0,
};

/// A single code point encoded as UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf8Encode {
    pub number_of_code_units: u32,
    pub encode: [u8; 4],
}

/// A single code point encoded as UTF-16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf16Encode {
    pub number_of_code_units: u32,
    pub encode: [u16; 2],
}

const SURROGATE_MASK: u16 = 0xfc00;
const SURROGATE_HEADER_HIGH: u16 = 0xd800;
const SURROGATE_HEADER_LOW: u16 = 0xdc00;

/// Decode the first code point from a UTF-8 byte sequence.
///
/// Strict: overlong encodings, stray continuation bytes, truncated
/// sequences, surrogate code points and code points above U+10FFFF all
/// decode as errors.
pub fn decode_utf8(range: &[u8]) -> DecodeResult {
    let Some(&b0) = range.first() else {
        return DECODE_ERROR;
    };
    let (len, mut acc) = match b0 {
        0x00..=0x7f => {
            return DecodeResult {
                code_units_consumed: 1,
                code_point: b0 as u32,
            };
        }
        // continuation byte without a header
        0x80..=0xbf => return DECODE_ERROR,
        0xc0..=0xdf => (2, (b0 & 0x1f) as u32),
        0xe0..=0xef => (3, (b0 & 0x0f) as u32),
        0xf0..=0xf7 => (4, (b0 & 0x07) as u32),
        // invalid encoding header
        _ => return DECODE_ERROR,
    };
    if range.len() < len {
        return DECODE_ERROR;
    }
    for &b in &range[1..len] {
        if b & 0xc0 != 0x80 {
            return DECODE_ERROR;
        }
        acc = (acc << 6) | (b & 0x3f) as u32;
    }
    // overlong encodings re-encode to fewer units
    let min = match len {
        2 => 0x80,
        3 => 0x800,
        _ => 0x1_0000,
    };
    if acc < min || acc > 0x10_ffff || (acc >= 0xd800 && acc <= 0xdfff) {
        return DECODE_ERROR;
    }
    DecodeResult {
        code_units_consumed: len as u32,
        code_point: acc,
    }
}

/// Decode the first code point from a UTF-16 code unit sequence.
///
/// Strict: unpaired surrogate halves are errors.
pub fn decode_utf16(range: &[u16]) -> DecodeResult {
    let Some(&c0) = range.first() else {
        return DECODE_ERROR;
    };
    if c0 & SURROGATE_MASK == SURROGATE_HEADER_HIGH {
        let Some(&c1) = range.get(1) else {
            return DECODE_ERROR;
        };
        if c1 & SURROGATE_MASK != SURROGATE_HEADER_LOW {
            return DECODE_ERROR;
        }
        let acc = (((c0 & !SURROGATE_MASK) as u32) << 10) | (c1 & !SURROGATE_MASK) as u32;
        DecodeResult {
            code_units_consumed: 2,
            code_point: acc + 0x1_0000,
        }
    } else if c0 & SURROGATE_MASK == SURROGATE_HEADER_LOW {
        DECODE_ERROR
    } else {
        DecodeResult {
            code_units_consumed: 1,
            code_point: c0 as u32,
        }
    }
}

/// Decode the first code point from a UTF-16 sequence, passing unpaired
/// surrogate halves through as raw code points (UCS-2 compatibility).
pub fn decode_utf16_non_strict(range: &[u16]) -> DecodeResult {
    let Some(&c0) = range.first() else {
        return DECODE_ERROR;
    };
    if c0 & SURROGATE_MASK == SURROGATE_HEADER_HIGH {
        if let Some(&c1) = range.get(1) {
            if c1 & SURROGATE_MASK == SURROGATE_HEADER_LOW {
                let acc =
                    (((c0 & !SURROGATE_MASK) as u32) << 10) | (c1 & !SURROGATE_MASK) as u32;
                return DecodeResult {
                    code_units_consumed: 2,
                    code_point: acc + 0x1_0000,
                };
            }
        }
    }
    // lone surrogate halves decode like plain code units
    DecodeResult {
        code_units_consumed: 1,
        code_point: c0 as u32,
    }
}

/// Encode a code point as UTF-8. Zero code units for values above U+10FFFF.
pub fn encode_utf32_to_utf8(c: u32) -> Utf8Encode {
    if c < 0x80 {
        Utf8Encode {
            number_of_code_units: 1,
            encode: [c as u8, 0, 0, 0],
        }
    } else if c < 0x800 {
        Utf8Encode {
            number_of_code_units: 2,
            encode: [
                ((c >> 6) & 0x1f) as u8 | 0xc0,
                (c & 0x3f) as u8 | 0x80,
                0,
                0,
            ],
        }
    } else if c < 0x1_0000 {
        Utf8Encode {
            number_of_code_units: 3,
            encode: [
                ((c >> 12) & 0x0f) as u8 | 0xe0,
                ((c >> 6) & 0x3f) as u8 | 0x80,
                (c & 0x3f) as u8 | 0x80,
                0,
            ],
        }
    } else if c <= 0x10_ffff {
        Utf8Encode {
            number_of_code_units: 4,
            encode: [
                ((c >> 18) & 0x07) as u8 | 0xf0,
                ((c >> 12) & 0x3f) as u8 | 0x80,
                ((c >> 6) & 0x3f) as u8 | 0x80,
                (c & 0x3f) as u8 | 0x80,
            ],
        }
    } else {
        Utf8Encode {
            number_of_code_units: 0,
            encode: [0; 4],
        }
    }
}

/// Encode a code point as UTF-16. Zero code units for values above U+10FFFF.
pub fn encode_utf32_to_utf16(c: u32) -> Utf16Encode {
    if c < 0x1_0000 {
        Utf16Encode {
            number_of_code_units: 1,
            encode: [c as u16, 0],
        }
    } else if c <= 0x10_ffff {
        let tmp = c - 0x1_0000;
        let high = ((tmp >> 10) & 0x3ff) as u16 | SURROGATE_HEADER_HIGH;
        let low = (tmp & 0x3ff) as u16 | SURROGATE_HEADER_LOW;
        Utf16Encode {
            number_of_code_units: 2,
            encode: [high, low],
        }
    } else {
        Utf16Encode {
            number_of_code_units: 0,
            encode: [0; 2],
        }
    }
}

/// Check that a byte sequence is entirely valid UTF-8.
pub fn check_valid_utf8(range: &[u8]) -> bool {
    let mut rest = range;
    while !rest.is_empty() {
        let r = decode_utf8(rest);
        if r.code_units_consumed == 0 {
            return false;
        }
        rest = &rest[r.code_units_consumed as usize..];
    }
    true
}

/// Convert a UTF-16 sequence to a UTF-8 string.
///
/// The input must already be valid UTF-16; validate upstream.
pub fn convert_to_utf8(mut range: &[u16]) -> String {
    let mut bytes = Vec::with_capacity(range.len());
    while !range.is_empty() {
        let decoded = decode_utf16(range);
        debug_assert!(decoded.code_units_consumed != 0);
        if decoded.code_units_consumed == 0 {
            break;
        }
        range = &range[decoded.code_units_consumed as usize..];
        let enc = encode_utf32_to_utf8(decoded.code_point);
        bytes.extend_from_slice(&enc.encode[..enc.number_of_code_units as usize]);
    }
    // SAFETY: every byte came out of encode_utf32_to_utf8 for a code point
    // produced by a successful strict UTF-16 decode.
    unsafe { String::from_utf8_unchecked(bytes) }
}

/// Convert a UTF-8 string to a UTF-16 code unit sequence.
pub fn convert_to_utf16(s: &str) -> Vec<u16> {
    let mut ret = Vec::with_capacity(s.len());
    for c in s.chars() {
        let enc = encode_utf32_to_utf16(c as u32);
        ret.extend_from_slice(&enc.encode[..enc.number_of_code_units as usize]);
    }
    ret
}

fn is_ascii_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c' | '\x0b')
}

fn is_utf_space(c: char) -> bool {
    is_ascii_space(c)
        || matches!(
            c as u32,
            0x0085 | 0x00a0 | 0x1680 | 0x2000..=0x200a | 0x2028 | 0x2029 | 0x202f | 0x205f | 0x3000
        )
}

/// Strip ASCII whitespace from both ends.
pub fn trim(s: &str) -> &str {
    s.trim_matches(is_ascii_space)
}

/// Strip the full Unicode whitespace set from both ends.
pub fn trim_all_utf(s: &str) -> &str {
    s.trim_matches(is_utf_space)
}
