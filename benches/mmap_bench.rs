use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use mmap_region::{map, map_anon, FaultReader, MapFlags, Protection};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

// Simple helper to build a unique temp path per bench
fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("mmap_region_bench_{}_{}", name, std::process::id()));
    p
}

const SIZES: [usize; 3] = [4 * 1024, 64 * 1024, 1024 * 1024];

fn bench_map_unmap_anon(b: &mut Criterion) {
    let mut group = b.benchmark_group("map_unmap_anon");
    for &size in &SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |ben, &sz| {
            ben.iter(|| {
                let m = map_anon(sz, Protection::READWRITE).expect("map_anon");
                m.unmap().expect("unmap");
            });
        });
    }
    group.finish();
}

fn bench_update_region_flush(b: &mut Criterion) {
    let mut group = b.benchmark_group("update_region_flush");
    for &size in &SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |ben, &sz| {
            let path = tmp_path(&format!("update_flush_{sz}"));
            let _ = fs::remove_file(&path);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .expect("create");
            file.set_len(sz as u64).expect("set_len");
            let mut m = map(&file, Protection::READWRITE, MapFlags::empty()).expect("map");

            let payload = vec![0xAC_u8; sz];
            ben.iter(|| {
                m.update_region(0, &payload).expect("update");
                m.flush().expect("flush");
            });

            drop(m);
            let _ = fs::remove_file(&path);
        });
    }
    group.finish();
}

// Fault-safe reads against a plain slice copy of the same bytes.
fn bench_reader_vs_slice(b: &mut Criterion) {
    let mut group = b.benchmark_group("reader_vs_slice");
    for &size in &SIZES {
        let m = map_anon(size, Protection::READONLY).expect("map_anon");
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("fault_reader", size), &size, |ben, &sz| {
            let reader = FaultReader::new(&m);
            ben.iter_batched_ref(
                || vec![0u8; sz],
                |buf| {
                    let n = reader.read_at(buf, 0).expect("read_at");
                    criterion::black_box(n);
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("slice_copy", size), &size, |ben, &sz| {
            ben.iter_batched_ref(
                || vec![0u8; sz],
                |buf| {
                    buf.copy_from_slice(&m[..]);
                    criterion::black_box(&buf);
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_write_to(b: &mut Criterion) {
    let mut group = b.benchmark_group("reader_write_to");
    let size = 1024 * 1024;
    let m = map_anon(size, Protection::READONLY).expect("map_anon");
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("1MiB", |ben| {
        let mut sink = Vec::with_capacity(size);
        ben.iter(|| {
            sink.clear();
            let mut reader = FaultReader::new(&m);
            reader.write_to(&mut sink).expect("write_to");
        });
        criterion::black_box(&sink);
    });
    group.finish();
}

fn criterion_config() -> Criterion {
    Criterion::default()
        .sample_size(30)
        .warm_up_time(std::time::Duration::from_millis(300))
        .measurement_time(std::time::Duration::from_secs(3))
}

criterion_group! {
    name = mmap_benches;
    config = criterion_config();
    targets =
        bench_map_unmap_anon,
        bench_update_region_flush,
        bench_reader_vs_slice,
        bench_write_to
}

criterion_main!(mmap_benches);
