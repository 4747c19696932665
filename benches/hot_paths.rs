//! Performance benchmarks for codesearch hot paths.
//!
//! Measures the operations that dominate request latency:
//! - Pattern compilation and posting-query planning
//! - Posting list evaluation over the trigram index
//! - Snippet extraction over fetched content
//! - The full search pipeline against in-memory content
//!
//! Run with: `cargo bench`
//! View reports: `open target/criterion/report/index.html`

use codesearch::services::{
    compile, extract_snippets, CodeSearchService, CorpusIndex, LocalSearchService,
    StaticContentService, TrigramIndex, TrigramQuery, MAX_SNIPPETS_PER_FILE,
};
use codesearch::types::{CodeSearchRequest, FileId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

fn go_file(i: usize) -> String {
    format!(
        r#"package handler{i}

import "net/http"

// Handler{i} serves one request.
func Handler{i}(w http.ResponseWriter, r *http.Request) {{
	token := r.Header.Get("Authorization")
	if !authenticate(token) {{
		http.Error(w, "unauthorized", http.StatusUnauthorized)
		return
	}}
	w.Write([]byte("item {i}"))
}}
"#
    )
}

// ============================================================================
// Pattern Benchmarks
// ============================================================================

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for (name, expr) in [
        ("literal", "authenticate"),
        ("alternation", "Handler|Request|Response"),
        ("class", r"http\.\w+\(w"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), expr, |b, expr| {
            b.iter(|| {
                let matcher = compile(black_box(expr), true).unwrap();
                black_box(TrigramQuery::from_hir(matcher.syntax()))
            })
        });
    }

    group.finish();
}

// ============================================================================
// Trigram Index Benchmarks
// ============================================================================

/// Posting query evaluation at different index sizes.
fn bench_posting_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("posting_query");
    let matcher = compile("authenticate|StatusUnauthorized", true).unwrap();
    let query = TrigramQuery::from_hir(matcher.syntax());

    for size in [100, 1_000, 10_000] {
        let mut index = TrigramIndex::new();
        for i in 0..size {
            index.add_file(FileId::new(i as u32), go_file(i).as_bytes());
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &index, |b, index| {
            b.iter(|| black_box(index.posting_query(&query)))
        });
    }

    group.finish();
}

fn bench_trigram_add_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigram_add_file");

    for lines in [10, 100, 1_000] {
        let content: String = (0..lines).map(go_file).collect();
        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &content, |b, content| {
            b.iter(|| {
                let mut index = TrigramIndex::new();
                index.add_file(FileId::new(1), content.as_bytes());
                black_box(index)
            })
        });
    }

    group.finish();
}

// ============================================================================
// Snippet Benchmarks
// ============================================================================

fn bench_extract_snippets(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_snippets");
    let content: String = (0..500).map(go_file).collect();
    group.throughput(Throughput::Bytes(content.len() as u64));

    for (name, expr) in [
        ("early_hit", "package"),
        ("late_hit", "item 499"),
        ("no_hit", "zzzqqq"),
    ] {
        let matcher = compile(expr, true).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &matcher, |b, matcher| {
            b.iter(|| {
                black_box(extract_snippets(
                    content.as_bytes(),
                    matcher,
                    MAX_SNIPPETS_PER_FILE,
                ))
            })
        });
    }

    group.finish();
}

// ============================================================================
// Pipeline Benchmarks
// ============================================================================

fn bench_search_pipeline(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("search_pipeline");

    let docs: Vec<(String, String)> = (0..1_000)
        .map(|i| (format!("handler{i}/handler.go"), go_file(i)))
        .collect();
    let index = CorpusIndex::from_documents(docs.iter().map(|(n, c)| (n.as_str(), c.as_bytes())));
    let content = docs
        .iter()
        .fold(StaticContentService::new(), |svc, (n, c)| svc.with_file(n, c.as_str()));
    let service = LocalSearchService::new(Arc::new(index), Arc::new(content));

    for (name, expr) in [("selective", r"Handler42\b"), ("broad", "authenticate")] {
        group.bench_function(name, |b| {
            b.iter(|| {
                rt.block_on(service.search(CodeSearchRequest::new(expr, true)))
                    .unwrap()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(pattern_benches, bench_compile);

criterion_group!(
    trigram_benches,
    bench_posting_query,
    bench_trigram_add_file,
);

criterion_group!(snippet_benches, bench_extract_snippets);

criterion_group!(search_benches, bench_search_pipeline);

criterion_main!(
    pattern_benches,
    trigram_benches,
    snippet_benches,
    search_benches,
);
