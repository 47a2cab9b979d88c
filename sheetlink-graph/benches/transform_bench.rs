// Benchmark the result → graph transform and confidence filtering at varying sizes.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use sheetlink_graph::{
    AnalysisResult, ColumnProfile, ConfidenceFilter, ConfidenceLevel, Endpoint, FileProfile,
    Relationship, count_by_confidence, transform,
};

/// Build a synthetic result with `file_count` files of `cols` columns each.
///
/// Relationships connect column `j` of file `i` to column `j` of file
/// `(i * 7 + 1) % file_count`, cycling through the three confidence levels.
/// Every tenth relationship references a missing column so the drop path
/// is exercised too.
fn build_synthetic_result(file_count: usize, cols: usize) -> AnalysisResult {
    let files: Vec<FileProfile> = (0..file_count)
        .map(|i| {
            let columns = (0..cols)
                .map(|j| ColumnProfile::new(format!("col_{j}"), "integer"))
                .collect();
            FileProfile::new(format!("file_{i}.csv"), columns)
        })
        .collect();

    let levels = ["HIGH", "MEDIUM", "LOW"];
    let mut relationships = Vec::with_capacity(file_count * cols);
    for i in 0..file_count {
        let target = (i * 7 + 1) % file_count;
        for j in 0..cols {
            let n = relationships.len();
            let column = if n % 10 == 9 {
                "missing".to_string()
            } else {
                format!("col_{j}")
            };
            relationships.push(
                Relationship::new(
                    format!("r{n}"),
                    Endpoint::new(format!("file_{i}.csv"), format!("col_{j}")),
                    Endpoint::new(format!("file_{target}.csv"), column),
                )
                .with_level(levels[n % 3]),
            );
        }
    }

    AnalysisResult::new(files, relationships)
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");

    for file_count in [5, 50, 500] {
        let result = build_synthetic_result(file_count, 20);

        group.bench_with_input(
            BenchmarkId::new("files", file_count),
            &result,
            |b, r| {
                b.iter(|| transform(r));
            },
        );
    }

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("confidence_filter");

    for file_count in [5, 50, 500] {
        let model = transform(&build_synthetic_result(file_count, 20));
        let mut filter = ConfidenceFilter::all_visible(count_by_confidence(&model.edges));
        filter.toggle(ConfidenceLevel::Medium);

        group.bench_with_input(
            BenchmarkId::new("edges", model.edges.len()),
            &model.edges,
            |b, edges| {
                b.iter(|| filter.visible_indices(edges));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_transform, bench_filter);
criterion_main!(benches);
