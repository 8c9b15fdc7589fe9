//! Benchmarks for expression building and SQL generation.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use sieve::query::{Collection, Computed, Expr, FilterValue, QuerySet};

/// Create an AND expression with `count` conditions.
fn create_and_expr(count: usize) -> Expr {
    Expr::and((0..count).map(|i| Expr::condition(format!("field_{}", i), i as i64)))
}

/// Create an OR expression folded pairwise, the way groups are combined.
fn create_folded_or(count: usize) -> Expr {
    (0..count)
        .map(|i| Expr::lookup("status", "iexact", format!("status_{}", i)))
        .reduce(Expr::or_else)
        .unwrap_or_default()
}

/// Create a deeply nested expression.
fn create_nested_expr(depth: usize) -> Expr {
    if depth == 0 {
        Expr::condition("leaf", true)
    } else {
        Expr::or([
            Expr::negate(create_nested_expr(depth - 1)),
            Expr::condition(format!("level_{}", depth), depth as i64),
        ])
    }
}

fn bench_expr_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("expr_creation");

    group.bench_function("condition", |b| {
        b.iter(|| black_box(Expr::condition("id", 42)))
    });

    for count in [2, 5, 10, 50] {
        group.bench_with_input(BenchmarkId::new("and", count), &count, |b, &count| {
            b.iter(|| black_box(create_and_expr(count)))
        });
        group.bench_with_input(BenchmarkId::new("folded_or", count), &count, |b, &count| {
            b.iter(|| black_box(create_folded_or(count)))
        });
    }

    group.finish();
}

fn bench_template_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_fill");
    let template = Expr::or([
        Expr::placeholder("username__icontains"),
        Expr::placeholder("email__icontains"),
        Expr::negate(Expr::placeholder("bio__icontains")),
    ]);
    let value = FilterValue::from("kate");

    group.bench_function("three_placeholders", |b| {
        b.iter(|| black_box(template.fill(&value).unwrap()))
    });

    group.finish();
}

fn bench_sql_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_generation");

    for count in [5, 20, 100] {
        let qs = QuerySet::new("users").filter(create_and_expr(count));
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("and", count), &qs, |b, qs| {
            b.iter(|| black_box(qs.to_sql()))
        });
    }

    for depth in [3, 10] {
        let qs = QuerySet::new("users").filter(create_nested_expr(depth));
        group.bench_with_input(BenchmarkId::new("nested", depth), &qs, |b, qs| {
            b.iter(|| black_box(qs.to_sql()))
        });
    }

    let mut aliases = indexmap::IndexMap::new();
    aliases.insert("_default_alias_name.len".to_string(), Computed::length("name"));
    let qs = QuerySet::new("users")
        .alias(aliases)
        .filter(Expr::lookup("_default_alias_name.len", "gt", 5));
    group.bench_function("aliased", |b| b.iter(|| black_box(qs.to_sql())));

    group.finish();
}

criterion_group!(
    benches,
    bench_expr_creation,
    bench_template_fill,
    bench_sql_generation
);
criterion_main!(benches);
