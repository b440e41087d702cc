//! # Pipeline Benchmarks
//!
//! Measures parse, resolve and scaffold generation on synthetic listings.
//!
//! Run: `cargo bench --bench pipeline_bench`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use usecode_core::{
    Config, IntrinsicTable, Resolver, ScaffoldGenerator, Tables, convert, parse,
};

/// Listing with `functions` functions, each with two strings and a short body
fn synthetic_listing(functions: u16) -> String {
    let mut out = String::new();
    for n in 0..functions {
        out.push_str(&format!(".funcnumber {:04X}H\n", 0x0100 + n));
        out.push_str(".data\n");
        out.push_str("L0000: db '@The sails must be furled before the planks are raised.@'\n");
        out.push_str("       db 00\n");
        out.push_str("L0039: db '@I think the gangplank is blocked.@'\n");
        out.push_str("       db 00\n");
        out.push_str(".code\n.argc 0001H\n.localc 0002H\n.externsize 0001H\n.extern 08FFH\n");
        out.push_str(
            "\
0000: 48          push eventid
0001: 1F 01 00    pushi 0001H
0004: 22          cmpeq
0005: 05 1A 00    jne 0022
0008: 3E          push itemref
0009: 1F 0A 00    pushi 000AH
000C: 38 88 00 02 callis 0088, 2
0010: 05 09 00    jne 001C
0013: 1D 00 00    pushs L0000
0016: 24 00 00    call extern:0000
0019: 06 06 00    jmp 0022
001C: 1D 39 00    pushs L0039
001F: 24 00 00    call extern:0000
0022: 25          ret
",
        );
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for functions in [1u16, 64, 512] {
        let listing = synthetic_listing(functions);
        group.throughput(Throughput::Bytes(listing.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(functions), &listing, |b, src| {
            b.iter(|| black_box(parse(src).ok()))
        });
    }

    group.finish();
}

fn bench_resolve_and_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("function");

    let listing = synthetic_listing(1);
    let parsed = match parse(&listing) {
        Ok(parsed) => parsed,
        Err(e) => panic!("synthetic listing does not parse: {}", e),
    };
    let Some(function) = parsed.iter().next().cloned() else {
        panic!("synthetic listing has no function");
    };
    let resolver = Resolver::new(IntrinsicTable::builtin());
    let config = Config::default();
    let generator = ScaffoldGenerator::new(&config.scaffold);

    group.bench_function("resolve", |b| {
        b.iter(|| {
            let mut f = function.clone();
            black_box(resolver.resolve(&mut f))
        })
    });

    let mut resolved = function.clone();
    resolver.resolve(&mut resolved);
    group.bench_function("generate", |b| b.iter(|| black_box(generator.generate(&resolved))));

    group.finish();
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    let tables = Tables::standard();
    let config = Config::default();

    for functions in [64u16, 512] {
        let listing = synthetic_listing(functions);
        group.throughput(Throughput::Elements(functions as u64));
        group.bench_with_input(BenchmarkId::from_parameter(functions), &listing, |b, src| {
            b.iter(|| black_box(convert(src, &tables, &config, &[]).ok()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_resolve_and_generate, bench_convert);
criterion_main!(benches);
