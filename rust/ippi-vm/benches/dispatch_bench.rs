//! Criterion benchmarks for program construction and the dispatch loop.
//!
//! Both use a counting loop whose iteration count sets the workload size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ippi_vm::{Executor, Program, SourceArg, SourceInstruction};

fn ins(order: i64, opcode: &str, args: &[(&str, &str)]) -> SourceInstruction {
    let args = args
        .iter()
        .enumerate()
        .map(|(i, (kind, text))| SourceArg::new(i as u8 + 1, *kind, *text))
        .collect();
    SourceInstruction::new(order, opcode, args)
}

/// `for i in 0..n { acc += i; push acc; pop acc }`, written with jumps.
fn counting_loop(n: u64) -> Vec<SourceInstruction> {
    let limit = n.to_string();
    vec![
        ins(1, "defvar", &[("var", "GF@i")]),
        ins(2, "defvar", &[("var", "GF@acc")]),
        ins(3, "move", &[("var", "GF@i"), ("int", "0")]),
        ins(4, "move", &[("var", "GF@acc"), ("int", "0")]),
        ins(5, "label", &[("label", "loop")]),
        ins(6, "add", &[("var", "GF@acc"), ("var", "GF@acc"), ("var", "GF@i")]),
        ins(7, "pushs", &[("var", "GF@acc")]),
        ins(8, "pops", &[("var", "GF@acc")]),
        ins(9, "add", &[("var", "GF@i"), ("var", "GF@i"), ("int", "1")]),
        ins(10, "jumpifneq", &[("label", "loop"), ("var", "GF@i"), ("int", &limit)]),
        ins(11, "write", &[("var", "GF@acc")]),
    ]
}

/// Many small labelled blocks, for measuring construction cost.
fn wide_program(blocks: usize) -> Vec<SourceInstruction> {
    let mut records = Vec::with_capacity(blocks * 3);
    for b in 0..blocks {
        let name = format!("block{}", b);
        let next = format!("block{}", (b + 1) % blocks);
        let base = (b * 3) as i64;
        records.push(ins(base, "label", &[("label", &name)]));
        records.push(ins(base + 1, "write", &[("string", "x\\032y")]));
        records.push(ins(base + 2, "jumpifeq", &[("label", &next), ("int", "1"), ("int", "2")]));
    }
    records
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    for n in [1_000u64, 10_000, 100_000] {
        let program = Program::from_source(counting_loop(n)).expect("benchmark program builds");
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &program, |b, program| {
            b.iter(|| {
                let mut vm = Executor::new(program.clone(), Vec::<u8>::new());
                vm.run().expect("benchmark program runs");
                black_box(vm.into_output())
            })
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for blocks in [100usize, 1_000] {
        let records = wide_program(blocks);
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &records, |b, records| {
            b.iter(|| black_box(Program::from_source(records.clone()).expect("builds")))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_build);
criterion_main!(benches);
