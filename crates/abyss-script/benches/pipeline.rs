use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use abyss_core::{EvalConfig, Identity, MemoryCollaborator};
use abyss_script::{Limits, ScriptEvaluator};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SNIPPET: &str = r#"
    var squares = {};
    foreach (var n in range(200)) {
        if (n % 3 == 0) { continue; }
        squares[str(n)] = n * n;
    }
    len(keys(squares))
"#;

fn bench_compile(c: &mut Criterion) {
    let evaluator = ScriptEvaluator::new(EvalConfig::default());
    c.bench_function("compile", |b| {
        b.iter(|| evaluator.compile(black_box(SNIPPET)).is_ok())
    });
}

fn bench_execute(c: &mut Criterion) {
    let evaluator = ScriptEvaluator::new(EvalConfig::default());
    let compiled = match evaluator.compile(SNIPPET) {
        Ok(compiled) => compiled,
        Err(diagnostics) => panic!("benchmark snippet does not compile: {:?}", diagnostics),
    };
    let collaborator = Arc::new(MemoryCollaborator::new(Identity::new(1, "abyss")));
    let ctx = collaborator.context_for(Identity::new(2, "bench"));
    let limits = Limits::default();
    let cancel = AtomicBool::new(false);
    c.bench_function("execute", |b| {
        b.iter(|| compiled.run(&ctx, &limits, &cancel).is_ok())
    });
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
