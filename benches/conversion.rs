//! Conversion throughput benchmarks
//!
//! Run with: cargo bench --bench conversion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use psmigrate::types::ConversionLevel;
use psmigrate::Converter;

const FUNCTION: &str = r#"function Get-UserReport {
    param(
        [string]$Name,
        [int]$Count = 5
    )
    $users = Get-ChildItem -Path $Name | Where-Object { $_.Length -gt 100 }
    foreach ($user in $users) {
        if ($user.Name -eq "admin") {
            Write-Host "Skipping $($user.Name)"
        } elseif ($Count -le 0) {
            break
        } else {
            Write-Output $user
        }
    }
    return $users.Count
}
"#;

/// Repeat the sample function under distinct names
fn script(functions: usize) -> String {
    (0..functions)
        .map(|i| FUNCTION.replace("Get-UserReport", &format!("Get-UserReport{}", i)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_convert_code(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_code");

    for level in [ConversionLevel::Full, ConversionLevel::Hybrid] {
        let converter = Converter::with_level(level).unwrap();
        for functions in [1usize, 10, 50] {
            let source = script(functions);
            group.bench_with_input(
                BenchmarkId::new(level.to_string(), functions),
                &source,
                |b, source| {
                    b.iter(|| {
                        let result = converter.convert_code(black_box(source), "bench.ps1");
                        black_box(result)
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_pipeline_construction(c: &mut Criterion) {
    c.bench_function("converter_new", |b| {
        b.iter(|| black_box(Converter::with_level(ConversionLevel::Hybrid)))
    });
}

criterion_group!(benches, bench_convert_code, bench_pipeline_construction);
criterion_main!(benches);
