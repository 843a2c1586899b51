// GPU bitonic and merge sort tests

mod common;

use gpgpu_bench::{BitonicSort, DeviceBuffer, Error, MergeSort};
use rand::{Rng, SeedableRng};

use common::{gpu, is_sorted};

fn random_i32(n: usize, seed: u64) -> Vec<i32> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen()).collect()
}

#[test]
#[ignore] // Run with: cargo test --test sort_tests -- --ignored
fn test_bitonic_sorts_power_of_two() {
    let ctx = gpu();
    let sorter = BitonicSort::new(&ctx).unwrap();
    for log_n in [1, 5, 10, 16, 20] {
        let values = random_i32(1 << log_n, log_n as u64);
        let mut expected = values.clone();
        expected.sort_unstable();
        assert_eq!(sorter.sort(&ctx, &values).unwrap(), expected, "n=2^{log_n}");
    }
}

#[test]
#[ignore] // Run with: cargo test --test sort_tests -- --ignored
fn test_bitonic_pads_other_lengths() {
    let ctx = gpu();
    let sorter = BitonicSort::new(&ctx).unwrap();
    for n in [0usize, 1, 3, 1000, 70_001] {
        let values = random_i32(n, 7);
        let sorted = sorter.sort(&ctx, &values).unwrap();
        assert_eq!(sorted.len(), n);
        assert!(is_sorted(&sorted));
    }
}

#[test]
#[ignore] // Run with: cargo test --test sort_tests -- --ignored
fn test_bitonic_plan_rejects_other_lengths() {
    let ctx = gpu();
    let sorter = BitonicSort::new(&ctx).unwrap();
    let data = DeviceBuffer::<i32>::allocate(&ctx, "odd", 12);
    assert!(matches!(
        sorter.plan(&ctx, &data),
        Err(Error::InvalidLength { len: 12, .. })
    ));
}

#[test]
#[ignore] // Run with: cargo test --test sort_tests -- --ignored
fn test_merge_matches_std_sort() {
    let ctx = gpu();
    let sorter = MergeSort::new(&ctx).unwrap();
    for n in [0usize, 1, 2, 5, 1000, 65_536, 100_003] {
        let values = random_i32(n, n as u64);
        let mut expected = values.clone();
        expected.sort();
        assert_eq!(sorter.sort(&ctx, &values).unwrap(), expected, "n={n}");
    }
}

#[test]
#[ignore] // Run with: cargo test --test sort_tests -- --ignored
fn test_sorted_input_unchanged() {
    let ctx = gpu();
    let values: Vec<i32> = (-512..512).collect();
    assert_eq!(BitonicSort::new(&ctx).unwrap().sort(&ctx, &values).unwrap(), values);
    assert_eq!(MergeSort::new(&ctx).unwrap().sort(&ctx, &values).unwrap(), values);
}

#[test]
#[ignore] // Run with: cargo test --test sort_tests -- --ignored
fn test_merge_with_duplicates() {
    let ctx = gpu();
    let sorter = MergeSort::new(&ctx).unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(9);
    let values: Vec<i32> = (0..50_000).map(|_| rng.gen_range(-3..3)).collect();
    let mut expected = values.clone();
    expected.sort();
    assert_eq!(sorter.sort(&ctx, &values).unwrap(), expected);
}
