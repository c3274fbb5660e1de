//! Inspection and generation benchmarks
//!
//! Runs over in-memory corpora so the numbers measure the pipeline, not
//! libhdf5:
//! - Layout detection + classification of a batched file
//! - Full inspection of per_entity corpora of growing size
//! - Batched manifest generation and Parquet encoding
//!
//! Toyota Way: Measure before optimizing (Genchi Genbutsu)

use std::path::{Path, PathBuf};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use h5_broker::inspect::Inspector;
use h5_broker::manifest::table::entities_batch;
use h5_broker::source::{ArrayData, MemoryFile, MemoryStore};
use h5_broker::{Contract, Generator};

/// Batched file with `batch` entities of 32x16 spectra
fn batched_file(batch: usize) -> MemoryFile {
    let params: Vec<f64> = (0..batch).map(|i| i as f64 * 0.01).collect();
    MemoryFile::new()
        .dataset("params/Ja", params.clone())
        .dataset("params/Jb", params)
        .dataset(
            "spectra",
            ArrayData::float(&[batch, 32, 16], vec![0.5; batch * 512]).unwrap(),
        )
        .dataset("energy", (0..32).map(f64::from).collect::<Vec<_>>())
}

/// `n` per-entity files registered under `root`
fn per_entity_store(root: &Path, n: usize) -> (MemoryStore, Vec<PathBuf>) {
    let mut store = MemoryStore::new();
    let mut files = Vec::with_capacity(n);
    for i in 0..n {
        let path = root.join(format!("run_{i:05}.h5"));
        store.insert(
            path.clone(),
            MemoryFile::new()
                .dataset("J", i as f64)
                .dataset("curve", vec![0.0; 200]),
        );
        files.push(path);
    }
    (store, files)
}

fn bench_inspect_batched(c: &mut Criterion) {
    let mut group = c.benchmark_group("inspect_batched");

    for batch in &[100, 1_000, 10_000] {
        let store = MemoryStore::new().with_file("/bench/batch.h5", batched_file(*batch));
        let inspector = Inspector::new(&store);
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, _| {
            b.iter(|| {
                let result = inspector.inspect_files(
                    "/bench",
                    vec![PathBuf::from("/bench/batch.h5")],
                    "*.h5",
                );
                black_box(result.batch_size)
            });
        });
    }

    group.finish();
}

fn bench_inspect_per_entity(c: &mut Criterion) {
    let mut group = c.benchmark_group("inspect_per_entity");

    for n in &[10, 100, 1_000] {
        let (store, files) = per_entity_store(Path::new("/bench"), *n);
        let inspector = Inspector::new(&store);
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| {
                let result = inspector.inspect_files("/bench", files.clone(), "*.h5");
                black_box(result.total_entities)
            });
        });
    }

    group.finish();
}

fn bench_generate_batched(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch.h5");
    std::fs::write(&path, b"").unwrap();
    let store = MemoryStore::new().with_file(path, batched_file(5_000));
    let contract = Contract::from_yaml_str(&format!(
        "label: bench\nkey_prefix: b\n\
         data:\n  directory: {}\n  file_pattern: \"*.h5\"\n  layout: batched\n\
         artifacts:\n  - type: spectra\n    dataset: /spectra\n",
        dir.path().display()
    ))
    .unwrap();
    let generator = Generator::new(&store);

    c.bench_function("generate_batched_5000", |b| {
        b.iter(|| black_box(generator.generate(&contract, None).unwrap().entities.len()));
    });

    let manifest = generator.generate(&contract, None).unwrap();
    c.bench_function("entities_batch_5000", |b| {
        b.iter(|| black_box(entities_batch(&manifest).unwrap().num_rows()));
    });
}

criterion_group!(
    benches,
    bench_inspect_batched,
    bench_inspect_per_entity,
    bench_generate_batched
);
criterion_main!(benches);
