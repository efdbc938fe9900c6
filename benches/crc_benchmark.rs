use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use qsfv::hasher::crc32::crc32;
use qsfv::hasher::CpuFeatures;

/// Create test data of the given size for benchmarking.
fn make_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn bench_crc32(c: &mut Criterion) {
    let features = CpuFeatures::detect();
    let sizes = [1024, 64 * 1024, 1024 * 1024, 10 * 1024 * 1024];

    let mut group = c.benchmark_group("crc32");
    for &size in &sizes {
        let data = make_test_data(size);
        let label = if size >= 1024 * 1024 {
            format!("{}MB", size / (1024 * 1024))
        } else {
            format!("{}KB", size / 1024)
        };

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("scalar", &label), &data, |b, data| {
            b.iter(|| crc32(data, 0, false, false));
        });

        if features.has_sse42 {
            group.bench_with_input(BenchmarkId::new("sse42", &label), &data, |b, data| {
                b.iter(|| crc32(data, 0, false, true));
            });
        }

        if features.has_avx512 {
            group.bench_with_input(BenchmarkId::new("avx512", &label), &data, |b, data| {
                b.iter(|| crc32(data, 0, true, true));
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_crc32);
criterion_main!(benches);
