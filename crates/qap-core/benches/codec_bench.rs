//! # Codec & Filter Benchmarks
//!
//! Performance benchmarks for qap-core identity parsing and the header
//! filter query path.
//!
//! Run with: `cargo bench -p qap-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use qap_core::{Header, HeaderFilter};
use std::hint::black_box;

/// Build a filter holding `size` synthetic headers spread over a handful
/// of code families.
fn create_filter(size: usize) -> HeaderFilter {
    let equipment = ["PEC", "UPPE1", "QF", "MB", "RF"];
    let doc_types = ["HP", "TP", "QA"];
    // Equipment and doc type lengths are coprime, so the combination
    // cycles with period 15 and the number keeps every name unique.
    let mut headers = Vec::with_capacity(size);
    for i in 0..size {
        let name = format!(
            "SPS-{}-{}-{:03}.00",
            equipment[i % equipment.len()],
            doc_types[i % doc_types.len()],
            i / (equipment.len() * doc_types.len()) + 1,
        );
        if let Ok(header) = Header::parse(&name, false) {
            headers.push(header);
        }
    }
    HeaderFilter::new(headers)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_header_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("header_parse");

    group.bench_function("valid_short", |b| {
        b.iter(|| Header::parse(black_box("SPS-PEC-HP-023.00"), false));
    });
    group.bench_function("valid_wide", |b| {
        b.iter(|| Header::parse(black_box("SPS-UPPE1-TP-001000.32"), false));
    });
    group.bench_function("reject_early", |b| {
        b.iter(|| Header::parse(black_box("SP-PEC-HP-023.00"), false));
    });

    group.finish();
}

fn bench_human_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("human_query");

    for size in [100, 1000, 10000].iter() {
        let filter = create_filter(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(filter.human_query(25, "SPS-PEC-HP", 0)));
        });
    }

    group.finish();
}

fn bench_duplicate_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplicate_check");

    for size in [100, 1000, 10000].iter() {
        let filter = create_filter(*size);
        let probe = Header::parse("SPS-PEC-HP-001.00", false).expect("probe header");
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(filter.has(&probe)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_header_parse,
    bench_human_query,
    bench_duplicate_check
);
criterion_main!(benches);
