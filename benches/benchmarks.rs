use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::{criterion_group, criterion_main};
use rand::{rngs::StdRng, SeedableRng};

use phylotopo::enumerate::enumerate_topologies;
use phylotopo::generate_tree;
use phylotopo::tree::{topologically_equal, RootedTree};

fn count_topologies(labels: &[String]) -> usize {
    enumerate_topologies(labels, |_| Ok(())).unwrap()
}

fn compare(trees: &(RootedTree, RootedTree)) -> bool {
    topologically_equal(&trees.0, &trees.1).unwrap()
}

fn enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate");
    for n_tips in [6, 8, 9] {
        let labels: Vec<String> = (1..=n_tips).map(|i| format!("Tip_{i}")).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n_tips), &labels, |b, s| {
            b.iter(|| count_topologies(s));
        });
    }
    group.finish();
}

fn comparison(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let mut group = c.benchmark_group("topologically_equal");
    for n_tips in [100, 1000] {
        let tree = generate_tree(n_tips, None, &mut rng).unwrap();
        let mut rotated = tree.clone();
        for id in rotated.inner_nodes().unwrap() {
            rotated.swap_children(&id).unwrap();
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(n_tips),
            &(tree, rotated),
            |b, s| {
                b.iter(|| compare(s));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, enumeration, comparison);
criterion_main!(benches);
