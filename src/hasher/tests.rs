use super::*;

use crate::digest::Digest;
use crate::hasher::crc32::crc32;

fn crc_of(data: &[u8]) -> u32 {
    crc32(data, 0, false, false)
}

fn hash_all(h: &mut dyn Hasher, data: &[u8]) -> Digest {
    h.add_data(data).unwrap();
    h.finalize().unwrap()
}

#[test]
fn test_crc32_reference_vectors() {
    assert_eq!(crc_of(b""), 0x0000_0000);
    assert_eq!(crc_of(b"\x00"), 0xd202_ef8d);
    assert_eq!(crc_of(b"Hello World!"), 0x1c29_1ca3);
}

#[test]
fn test_crc32_nine_byte_vector() {
    let bytes = [0x1au8, 0x2b, 0x3c, 0x4f, 0x5a, 0x6b, 0x7c, 0x8d, 0x9e];
    assert_eq!(crc_of(&bytes), 0xb0c3_bbc7);
    let mut h = Crc32Hasher::new(&HasherOptions::default());
    assert_eq!(hash_all(&mut h, &bytes).to_string(), "b0c3bbc7");
}

#[test]
fn test_crc32_streaming_matches_single_shot() {
    let data: Vec<u8> = (0..100_000u32).map(|i| (i * 31 + 7) as u8).collect();
    let whole = crc_of(&data);
    for split in [1, 7, 16, 100, 4096, 65_535] {
        let mut crc = 0;
        for chunk in data.chunks(split) {
            crc = crc32(chunk, crc, false, false);
        }
        assert_eq!(crc, whole, "split {}", split);
    }
}

#[test]
fn test_crc32_kernel_equivalence() {
    let features = CpuFeatures::detect();
    let data: Vec<u8> = (0..8192u32).map(|i| (i * 131 + 89) as u8).collect();
    // lengths crossing every block-size boundary of every kernel
    let lengths = [
        0usize, 1, 15, 16, 17, 31, 32, 63, 64, 65, 127, 128, 255, 256, 257, 319, 320, 511, 512,
        513, 767, 768, 1024, 4099, 8192,
    ];
    for &len in &lengths {
        let scalar = crc32(&data[..len], 0, false, false);
        if features.has_sse42 {
            assert_eq!(crc32(&data[..len], 0, false, true), scalar, "sse len {}", len);
        }
        if features.has_avx512 {
            assert_eq!(crc32(&data[..len], 0, true, false), scalar, "avx len {}", len);
            assert_eq!(crc32(&data[..len], 0, true, true), scalar, "avx+sse len {}", len);
        }
    }
}

#[test]
fn test_crc32_kernel_equivalence_with_start_state() {
    let features = CpuFeatures::detect();
    if !features.has_sse42 && !features.has_avx512 {
        return;
    }
    let data: Vec<u8> = (0..2048u32).map(|i| (i ^ (i >> 3)) as u8).collect();
    let start = crc32(b"prefix", 0, false, false);
    let scalar = crc32(&data, start, false, false);
    assert_eq!(
        crc32(&data, start, features.has_avx512, features.has_sse42),
        scalar
    );
}

#[test]
fn test_crc32_hasher_lifecycle() {
    let mut h = Crc32Hasher::new(&HasherOptions::default());
    h.add_data(b"Hello ").unwrap();
    h.add_data(b"World!").unwrap();
    let d = h.finalize().unwrap();
    assert_eq!(d, Digest::Crc32(0x1c29_1ca3));

    // finalized: adding or finalizing again fails, reset re-arms
    assert!(h.add_data(b"x").is_err());
    assert!(h.finalize().is_err());
    h.reset();
    let d = hash_all(&mut h, b"Hello World!");
    assert_eq!(d.to_string(), "1c291ca3");
}

#[test]
fn test_crc32_digest_from_string_round_trip() {
    let d = Crc32Hasher::digest_from_string("b0c3bbc7").unwrap();
    assert_eq!(d, Digest::Crc32(0xb0c3_bbc7));
    assert_eq!(Crc32Hasher::digest_from_string(&d.to_string()).unwrap(), d);
    // case-insensitive parse, deterministic lowercase output
    assert_eq!(Crc32Hasher::digest_from_string("B0C3BBC7").unwrap(), d);
    assert!(Crc32Hasher::digest_from_string("b0c3bbc").is_err());
    assert!(Crc32Hasher::digest_from_string("b0c3bbc7a").is_err());
    assert!(Crc32Hasher::digest_from_string("b0c3bbcg").is_err());
}

#[test]
fn test_md5_reference_vectors() {
    let opts = HasherOptions::default();
    let mut h = Md5Hasher::new(&opts);
    assert_eq!(
        hash_all(&mut h, b"").to_string(),
        "d41d8cd98f00b204e9800998ecf8427e"
    );
    h.reset();
    assert_eq!(
        hash_all(&mut h, b"\x00").to_string(),
        "93b885adfe0da089cdf634904fd59f71"
    );
    h.reset();
    assert_eq!(
        hash_all(&mut h, b"ABC").to_string(),
        "902fbdd2b1df0c4f70b4a5d23525e932"
    );
}

#[test]
fn test_md5_streaming_matches_single_shot() {
    let opts = HasherOptions::default();
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let mut h = Md5Hasher::new(&opts);
    let whole = hash_all(&mut h, &data);
    let mut h2 = Md5Hasher::new(&opts);
    for chunk in data.chunks(977) {
        h2.add_data(chunk).unwrap();
    }
    assert_eq!(h2.finalize().unwrap(), whole);
}

#[test]
fn test_md5_hasher_lifecycle() {
    let mut h = Md5Hasher::new(&HasherOptions::default());
    h.finalize().unwrap();
    assert!(h.add_data(b"x").is_err());
    assert!(h.finalize().is_err());
    h.reset();
    assert_eq!(
        hash_all(&mut h, b"ABC").to_string(),
        "902fbdd2b1df0c4f70b4a5d23525e932"
    );
}

#[test]
fn test_md5_digest_from_string_round_trip() {
    let s = "902fbdd2b1df0c4f70b4a5d23525e932";
    let d = Md5Hasher::digest_from_string(s).unwrap();
    assert_eq!(d.to_string(), s);
    assert_eq!(Md5Hasher::digest_from_string(&s.to_uppercase()).unwrap(), d);
    assert!(Md5Hasher::digest_from_string("902fbdd2").is_err());
    assert!(Md5Hasher::digest_from_string("zz2fbdd2b1df0c4f70b4a5d23525e932").is_err());
}

#[test]
fn test_digest_type_safety() {
    // an MD5 digest never compares equal to a CRC digest,
    // even when the raw bytes could be made to agree
    let crc = Crc32Hasher::digest_from_string("d41d8cd9").unwrap();
    let md5 = Md5Hasher::digest_from_string("d41d8cd98f00b204e9800998ecf8427e").unwrap();
    assert_ne!(crc, md5);
    assert_ne!(md5, Digest::Empty);
    assert_eq!(Digest::Empty, Digest::Empty);
}

#[test]
fn test_cpu_features_options_conversion() {
    let f = CpuFeatures {
        has_sse42: true,
        has_avx512: false,
    };
    let o = HasherOptions::from(f);
    assert!(o.has_sse42);
    assert!(!o.has_avx512);
}
