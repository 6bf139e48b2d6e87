// Copyright 2025 Veil (https://github.com/veil-privacy/veil)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Checker hot-path benchmarks: full scan vs. snapshot roll-up.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use veil_core::{
    AnonymizationConfig, AttributeRole, Dataset, HistoryConfig, Metric, PrivacyCriterion,
};
use veil_engine::Checker;

fn synthetic_dataset(rows: usize) -> Dataset {
    let mut rng = StdRng::seed_from_u64(42);
    let ages: Vec<String> = (18..90).map(|a| a.to_string()).collect();
    let age_hierarchy: Vec<Vec<String>> = ages
        .iter()
        .map(|a| {
            let n: u32 = a.parse().unwrap();
            vec![
                a.clone(),
                format!("{}-{}", n / 10 * 10, n / 10 * 10 + 9),
                format!("{}-{}", n / 30 * 30, n / 30 * 30 + 29),
                "*".to_string(),
            ]
        })
        .collect();
    let zips: Vec<String> = (0..100).map(|z| format!("81{:03}", z)).collect();
    let zip_hierarchy: Vec<Vec<String>> = zips
        .iter()
        .map(|z| {
            vec![
                z.clone(),
                format!("{}**", &z[..3]),
                "*****".to_string(),
            ]
        })
        .collect();

    let mut builder = Dataset::builder()
        .attribute_with_hierarchy("age", AttributeRole::QuasiIdentifying, age_hierarchy)
        .attribute_with_hierarchy("zip", AttributeRole::QuasiIdentifying, zip_hierarchy);
    for _ in 0..rows {
        let age = &ages[rng.gen_range(0..ages.len())];
        let zip = &zips[rng.gen_range(0..zips.len())];
        builder = builder.row([age.clone(), zip.clone()]);
    }
    builder.build().unwrap()
}

fn bench_checker(c: &mut Criterion) {
    let dataset = synthetic_dataset(10_000);
    let config = AnonymizationConfig {
        criteria: vec![PrivacyCriterion::KAnonymity { k: 5 }],
        metric: Metric::Height,
        history: HistoryConfig {
            snapshot_fraction_dataset: 1.0,
            snapshot_fraction_snapshot: 1.0,
            max_entries: 64,
        },
        ..Default::default()
    };

    c.bench_function("check_full_scan", |b| {
        b.iter(|| {
            let mut checker = Checker::new(&dataset, &config).unwrap();
            black_box(checker.check(0, &[1, 1]).unwrap())
        })
    });

    c.bench_function("check_snapshot_rollup", |b| {
        let mut checker = Checker::new(&dataset, &config).unwrap();
        checker.check(0, &[1, 1]).unwrap();
        let mut node = 1usize;
        b.iter(|| {
            // Each iteration rolls up from the cached [1, 1] snapshot.
            node += 1;
            black_box(checker.check(node, &[2, 1]).unwrap())
        })
    });
}

criterion_group!(benches, bench_checker);
criterion_main!(benches);
