//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ragflow::pipeline::{ConfigFormat, Pipeline, PipelineInputs};
use ragflow::testing::{linear_pipeline, loop_pipeline, sample_registry};
use serde_json::json;

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime");

    let mut group = c.benchmark_group("linear");
    for len in [1usize, 10, 50] {
        let pipeline = linear_pipeline(len).expect("valid pipeline");
        group.bench_with_input(BenchmarkId::from_parameter(len), &pipeline, |b, pipeline| {
            b.iter(|| {
                let inputs = PipelineInputs::new().with("add_0", "value", json!(0));
                black_box(runtime.block_on(pipeline.run(inputs)).expect("run succeeds"))
            });
        });
    }
    group.finish();

    let looping = loop_pipeline(50, 100).expect("valid pipeline");
    c.bench_function("loop_50", |b| {
        b.iter(|| {
            let inputs = PipelineInputs::new().with("first_of", "initial", json!(0));
            black_box(runtime.block_on(looping.run(inputs)).expect("run succeeds"))
        });
    });

    let registry = sample_registry();
    let text = linear_pipeline(20)
        .expect("valid pipeline")
        .dumps(ConfigFormat::Yaml)
        .expect("serializable");
    c.bench_function("loads_yaml_20", |b| {
        b.iter(|| black_box(Pipeline::loads(&text, ConfigFormat::Yaml, &registry).expect("loads")));
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
