//! Benchmarks for graph assembly and SQL evaluation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lakeflow::pipeline::PipelineBuilder;
use lakeflow::sql::{execute, parse_query};
use lakeflow::stages::ConstStage;
use lakeflow::table::{Table, Value};
use std::sync::Arc;

/// Layers of `width` stages, each reading every stage of the layer above.
fn layered(layers: usize, width: usize) -> PipelineBuilder {
    let empty = Table::from_columns(vec![]).unwrap();
    let mut builder = PipelineBuilder::new("bench");
    for layer in 0..layers {
        for i in 0..width {
            let name = format!("s{layer}_{i}");
            let inputs: Vec<String> = if layer == 0 {
                vec!["source".to_string()]
            } else {
                (0..width).map(|j| format!("s{}_{j}", layer - 1)).collect()
            };
            builder
                .register(name.clone())
                .inputs(inputs)
                .runner(Arc::new(ConstStage::new(name, empty.clone())))
                .done()
                .unwrap();
        }
    }
    builder
}

fn graph_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for (layers, width) in [(10, 1), (10, 10), (50, 10)] {
        let builder = layered(layers, width);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{layers}x{width}")),
            &builder,
            |b, builder| b.iter(|| black_box(builder.clone().build())),
        );
    }
    group.finish();
}

fn sql_group_by(c: &mut Criterion) {
    let zones = ["Queens", "Bronx", "Brooklyn", "Manhattan", "Staten Island"];
    let trips = Table::from_columns(vec![
        ("zone", (0..10_000).map(|i| Value::from(zones[i % zones.len()])).collect()),
        ("fare", (0..10_000_i64).map(|i| Value::Int(i % 97)).collect()),
    ])
    .map(Arc::new)
    .unwrap();
    let query = parse_query("SELECT zone, COUNT(*) AS n, AVG(fare) AS fare FROM trips GROUP BY zone ORDER BY n DESC")
        .unwrap();

    c.bench_function("sql_group_by_10k", |b| {
        b.iter(|| {
            let lookup = |name: &str| (name == "trips").then(|| trips.clone());
            black_box(execute(&query, &lookup))
        });
    });
}

criterion_group!(benches, graph_assembly, sql_group_by);
criterion_main!(benches);
