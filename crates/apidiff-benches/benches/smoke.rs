use std::sync::Arc;

use apidiff_benches::{available_corpora, default_rules};
use apidiff_core::{Comparer, RuleCompiler, RuleSet};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    let comparer = Comparer::new(default_rules().expect("valid rules"), Default::default());
    for corpus in available_corpora() {
        let dataset = corpus.generate().expect("failed to generate dataset");
        group.throughput(Throughput::Elements(corpus.line_count() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(corpus.name()), &dataset, |b, dataset| {
            b.iter(|| black_box(dataset.compare(&comparer)));
        });
    }
    group.finish();
}

fn bench_raw_vs_filtered(c: &mut Criterion) {
    let mut group = c.benchmark_group("raw-differences");
    let unordered_rules = RuleSet::new().with_global_ignore_collection_order(true);
    let unordered = Comparer::new(unordered_rules, Default::default());
    let ordered = Comparer::default();
    for corpus in available_corpora() {
        let dataset = corpus.generate().expect("failed to generate dataset");
        group.throughput(Throughput::Elements(corpus.line_count() as u64));
        group.bench_function(BenchmarkId::new("ordered", corpus.name()), |b| {
            b.iter(|| black_box(ordered.raw_differences(dataset.left(), dataset.right())));
        });
        group.bench_function(BenchmarkId::new("unordered", corpus.name()), |b| {
            b.iter(|| black_box(unordered.raw_differences(dataset.left(), dataset.right())));
        });
    }
    group.finish();
}

fn bench_rule_compile(c: &mut Criterion) {
    let rules = default_rules().expect("valid rules");
    let mut group = c.benchmark_group("rule-compile");
    group.bench_function("cold", |b| {
        b.iter(|| black_box(RuleCompiler::default().compile(&rules)));
    });
    let warm = RuleCompiler::default();
    let first = warm.compile(&rules);
    group.bench_function("cached", |b| {
        b.iter(|| {
            let compiled = warm.compile(&rules);
            debug_assert!(Arc::ptr_eq(&compiled, &first));
            black_box(compiled)
        });
    });
    group.finish();
}

fn bench_group(c: &mut Criterion) {
    let comparer = Comparer::default();
    let mut group = c.benchmark_group("group");
    for corpus in available_corpora() {
        let dataset = corpus.generate().expect("failed to generate dataset");
        let differences = dataset.compare(&comparer).into_differences();
        group.throughput(Throughput::Elements(differences.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(corpus.name()),
            &differences,
            |b, differences| {
                b.iter(|| black_box(comparer.group(differences)));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_compare, bench_raw_vs_filtered, bench_rule_compile, bench_group);
criterion_main!(benches);
