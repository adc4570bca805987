use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use polars::prelude::*;

use corrmatrix::storage::SharedStore;
use corrmatrix::{compute_association, AssociationRequest, Method};

fn gen_table(n: usize, groups: u32, cols: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let site: Vec<String> = (0..n).map(|_| format!("site_{}", rng.gen::<u32>() % groups)).collect();
    let mut columns: Vec<Column> = vec![Series::new("site".into(), site).into()];
    for c in 0..cols {
        let vals: Vec<Option<f64>> = (0..n)
            .map(|_| if rng.gen::<u32>() % 50 == 0 { None } else { Some(rng.gen::<f64>() * 100.0) })
            .collect();
        columns.push(Series::new(format!("m{}", c).into(), vals).into());
    }
    DataFrame::new(columns).expect("df build")
}

fn bench_grouped_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("grouped_fanout");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(10);

    for &(n, groups) in &[(20_000usize, 4u32), (20_000, 64), (100_000, 256)] {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = SharedStore::new(tmp.path()).expect("store");
        store.create_table_df("readings", gen_table(n, groups, 6, 0xC0FF_EE00)).expect("seed");
        let mut run = 0u64;

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("correlation", format!("{}x{}", n, groups)), &n, |b, _| {
            b.iter(|| {
                run += 1;
                let out = format!("readings_corr_{}", run);
                let req = AssociationRequest::new("readings", out.as_str(), Method::Correlation).with_grouping("site");
                compute_association(&store, &req).expect("association");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_grouped_fanout);
criterion_main!(benches);
