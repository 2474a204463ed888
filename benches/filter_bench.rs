// Filter performance benchmarks for RedBloom

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use redbloom::filter::HashLocator;
use redbloom::{BloomFilter, FilterParams, MemoryStore};
use std::hint::black_box;

fn benchmark_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate");

    for hash_count in [2u32, 14, 32].iter() {
        let locator = HashLocator::new(&FilterParams::new(1 << 32, *hash_count));
        let payload = 231986u64.to_le_bytes();

        group.throughput(Throughput::Elements(*hash_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(hash_count), hash_count, |b, _| {
            b.iter(|| black_box(locator.locate(black_box(&payload)).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");

    for size in [100u64, 1000].iter() {
        let filter =
            BloomFilter::with_store(MemoryStore::new(), "bench:bloom", FilterParams::for_capacity(*size)).unwrap();

        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    filter.add(&i.to_le_bytes()).unwrap();
                }
            });
        });
    }

    group.finish();
}

fn benchmark_exists(c: &mut Criterion) {
    let mut group = c.benchmark_group("exists");

    for size in [100u64, 1000].iter() {
        let filter =
            BloomFilter::with_store(MemoryStore::new(), "bench:bloom", FilterParams::for_capacity(*size)).unwrap();
        for i in 0..*size {
            filter.add(&i.to_le_bytes()).unwrap();
        }

        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::new("present", size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    black_box(filter.exists(&i.to_le_bytes()).unwrap());
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("absent", size), size, |b, &size| {
            b.iter(|| {
                for i in size..size * 2 {
                    black_box(filter.exists(&i.to_le_bytes()).unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_locate, benchmark_add, benchmark_exists);
criterion_main!(benches);
