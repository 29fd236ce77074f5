//! Benchmarks for pipeline execution.

use actionflow::action::{App, Builder, StackItem};
use actionflow::environment::Environment;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn chain(len: usize) -> Builder {
    let mut builder = Builder::new();
    for idx in 0..len {
        builder.push(StackItem::func(format!("step_{idx}"), |env| {
            env.insert("last", serde_json::json!(true));
            Ok(())
        }));
    }
    builder
}

fn pipeline_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let builder = chain(100);

    c.bench_function("chain_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut env = Environment::new();
                builder.call(&mut env).await.expect("chain succeeds");
                black_box(env)
            })
        });
    });

    c.bench_function("to_app_100", |b| {
        b.iter(|| {
            let mut env = Environment::new();
            black_box(builder.to_app(&mut env))
        });
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
