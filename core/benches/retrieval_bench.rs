use criterion::{criterion_group, criterion_main, Criterion};
use linkidx::document::CONTENT;
use linkidx::tokenizer::tokenize;
use linkidx::{Article, Engine, EngineConfig, TermStats};

const WORDS: &[&str] = &[
    "rock", "band", "guitar", "liverpool", "football", "club", "insect", "order", "president", "election",
    "river", "mountain", "music", "album", "league", "season", "species", "genus", "city", "county",
];

fn text(seed: usize, len: usize) -> String {
    (0..len).map(|i| WORDS[(seed * 7 + i * 13 + i / 3) % WORDS.len()]).collect::<Vec<_>>().join(" ")
}

fn bench_retrieval(c: &mut Criterion) {
    let paragraph = text(3, 400);
    c.bench_function("tokenize_paragraph", |b| b.iter(|| tokenize(&paragraph)));

    let dir = tempfile::tempdir().expect("tempdir");
    let engine = Engine::open(EngineConfig::new(dir.path())).expect("open");
    let mut writer = engine.writer().expect("writer");
    for wid in 1..=2_000u32 {
        engine.add_article(&mut writer, &Article::with_content(wid, text(wid as usize, 120))).expect("add");
    }
    writer.commit().expect("commit");
    drop(writer);
    engine.refresh().expect("refresh");

    let searcher = engine.searcher();
    c.bench_function("similarity_query", |b| b.iter(|| searcher.similarity_query("liverpool rock band album", CONTENT)));
    c.bench_function("phrase_frequency", |b| b.iter(|| searcher.phrase_frequency(&["rock", "band"], CONTENT)));

    let view = searcher.view();
    let stats = TermStats::new(&view);
    c.bench_function("cosine_similarity", |b| b.iter(|| stats.cosine_similarity(10, 20, CONTENT)));
}

criterion_group!(benches, bench_retrieval);
criterion_main!(benches);
