//! Benchmarks for vector search latency.
//!
//! Measures search latency of the in-memory backend across index sizes.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ragcite_core::{Chunk, ChunkMetadata, EmbeddingRecord, ScopeFilter, VectorBackend};
use ragcite_store::MemoryBackend;
use std::hint::black_box;

const EMBEDDING_DIM: usize = 384;

/// Create a pseudo-random embedding vector.
fn create_random_embedding(dim: usize, seed: u64) -> Vec<f32> {
    let mut reader = blake3::Hasher::new()
        .update(&seed.to_le_bytes())
        .finalize_xof();
    let mut bytes = vec![0u8; dim];
    reader.fill(&mut bytes);
    bytes
        .into_iter()
        .map(|b| (f32::from(b) / 255.0) * 2.0 - 1.0)
        .collect()
}

/// Create a test record with a pseudo-random embedding.
fn create_test_record(document: usize, chunk_index: u32, seed: u64) -> EmbeddingRecord {
    let document_id = format!("doc-{document}");
    let chunk = Chunk {
        id: format!("{document_id}_chunk_{chunk_index}"),
        document_id: document_id.clone(),
        content: format!("Test content for chunk number {seed} with some additional text for variety."),
        chunk_index,
        start_offset: None,
        end_offset: None,
        metadata: ChunkMetadata {
            knowledge_base_id: Some(format!("kb-{}", document % 4)),
            ..Default::default()
        },
    };
    EmbeddingRecord::new(chunk, create_random_embedding(EMBEDDING_DIM, seed))
}

/// Populate backend with test records.
async fn populate_backend(backend: &MemoryBackend, record_count: usize) {
    let records: Vec<EmbeddingRecord> = (0..record_count)
        .map(|i| create_test_record(i / 10, (i % 10) as u32, i as u64))
        .collect();

    // Insert in batches of 100
    for batch in records.chunks(100) {
        backend.upsert(batch).await.unwrap();
    }
}

fn search_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("search");

    // Benchmark different index sizes
    for record_count in &[100, 1_000, 10_000] {
        // Skip large benchmarks in CI
        if *record_count > 1_000 && std::env::var("CI").is_ok() {
            continue;
        }

        let backend = MemoryBackend::new(EMBEDDING_DIM);
        rt.block_on(async {
            backend.init().await.unwrap();
            populate_backend(&backend, *record_count).await;
        });

        let query = create_random_embedding(EMBEDDING_DIM, 12345);

        group.bench_with_input(
            BenchmarkId::new("vector_search", format!("{record_count}_records")),
            record_count,
            |b, _| {
                b.to_async(&rt)
                    .iter(|| async { black_box(backend.query(&query, None, 10).await) });
            },
        );

        let filter = ScopeFilter::knowledge_base("kb-1");
        group.bench_with_input(
            BenchmarkId::new("scoped_search", format!("{record_count}_records")),
            record_count,
            |b, _| {
                b.to_async(&rt)
                    .iter(|| async { black_box(backend.query(&query, Some(&filter), 10).await) });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, search_benchmark);
criterion_main!(benches);
