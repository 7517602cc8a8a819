use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use grounding::{Chunk, Chunker, HashingEmbedder, VectorIndex};
use rand::prelude::*;
use tempfile::TempDir;

const NUM_ELEMENTS: usize = 500; // Number of chunks to index
const NUM_QUERIES: usize = 10; // Number of queries per iteration
const DIMENSIONS: usize = 384;

const WORDS: [&str; 16] = [
    "tourism", "hotel", "course", "mission", "travel", "guest", "service", "campus",
    "library", "semester", "certificate", "student", "agency", "region", "adult", "program",
];

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(10))
        .warm_up_time(std::time::Duration::from_secs(2))
        .configure_from_args()
}

fn random_sentence(rng: &mut StdRng, words: usize) -> String {
    let mut sentence: Vec<&str> = (0..words)
        .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
        .collect();
    sentence.push(".");
    sentence.join(" ")
}

fn random_document(rng: &mut StdRng, sentences: usize) -> String {
    (0..sentences)
        .map(|_| {
            let words = rng.gen_range(4..16);
            random_sentence(rng, words)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn chunk_documents(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut group = c.benchmark_group("chunk");

    for sentences in [10, 100, 1000] {
        let text = random_document(&mut rng, sentences);
        let chunker = Chunker::new(500, 50).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(sentences), &text, |b, text| {
            b.iter(|| chunker.split(text))
        });
    }

    group.finish();
}

fn search_index(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let dir = TempDir::new().unwrap();
    let mut index = VectorIndex::open(dir.path(), HashingEmbedder::new(DIMENSIONS).unwrap()).unwrap();

    let chunks: Vec<Chunk> = (0..NUM_ELEMENTS)
        .map(|i| Chunk {
            content: random_document(&mut rng, 5),
            source_id: format!("doc_{}.txt", i / 10),
            chunk_index: i % 10,
            total_chunks: 10,
            origin_path: format!("bench/doc_{}.txt", i / 10),
        })
        .collect();
    index.add(&chunks).unwrap();

    let queries: Vec<String> = (0..NUM_QUERIES)
        .map(|_| random_sentence(&mut rng, 5))
        .collect();

    c.bench_function(
        &format!("search {} queries over {} chunks", NUM_QUERIES, NUM_ELEMENTS),
        |b| {
            b.iter(|| {
                for query in &queries {
                    let results = index.search(query, 3).unwrap();
                    assert!(results.len() <= 3);
                }
            })
        },
    );
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = chunk_documents, search_index
}
criterion_main!(benches);
