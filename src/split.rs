use std::collections::BTreeMap;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Splits row indices into `(train, test)` keeping each label's share.
///
/// The test partition holds `ceil(n * test_fraction)` rows, spread over the
/// classes by largest remainder. Same labels and seed give the same split.
pub fn stratified_split(labels: &[i32], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let n = labels.len();
    let mut by_class: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(row);
    }

    let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n);
    let quotas = allocate(&by_class, n, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (rows, quota) in by_class.values_mut().zip(quotas) {
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..quota]);
        train.extend_from_slice(&rows[quota..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    (train, test)
}

fn allocate(by_class: &BTreeMap<i32, Vec<usize>>, n: usize, n_test: usize) -> Vec<usize> {
    if n == 0 {
        return vec![0; by_class.len()];
    }
    let exact: Vec<f64> = by_class
        .values()
        .map(|rows| rows.len() as f64 * n_test as f64 / n as f64)
        .collect();
    let mut quotas: Vec<usize> = exact.iter().map(|q| q.floor() as usize).collect();

    let mut order: Vec<usize> = (0..exact.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    let mut missing = n_test - quotas.iter().sum::<usize>();
    let sizes: Vec<usize> = by_class.values().map(Vec::len).collect();
    for class in order.into_iter().cycle().take(exact.len() * 2) {
        if missing == 0 {
            break;
        }
        if quotas[class] < sizes[class] {
            quotas[class] += 1;
            missing -= 1;
        }
    }
    quotas
}
