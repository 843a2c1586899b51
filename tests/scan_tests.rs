// GPU scan tests: both variants against the host prefix sum

mod common;

use gpgpu_bench::reference;
use gpgpu_bench::scan::{ScanAlgorithm, ScanEngine};
use gpgpu_bench::{DeviceBuffer, PingPong};
use rand::{Rng, SeedableRng};

use common::gpu;

const ALGORITHMS: [ScanAlgorithm; 2] = [ScanAlgorithm::Naive, ScanAlgorithm::WorkEfficient];

#[test]
#[ignore] // Run with: cargo test --test scan_tests -- --ignored
fn test_eight_ones() {
    let ctx = gpu();
    let engine = ScanEngine::new(&ctx).unwrap();
    for algorithm in ALGORITHMS {
        let result = engine.scan(&ctx, algorithm, &[1; 8]).unwrap();
        assert_eq!(result, (1..=8).collect::<Vec<u32>>(), "{}", algorithm.name());
    }
}

#[test]
#[ignore] // Run with: cargo test --test scan_tests -- --ignored
fn test_variants_agree_for_any_length() {
    let ctx = gpu();
    let engine = ScanEngine::new(&ctx).unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(239);

    for n in [0usize, 1, 2, 3, 7, 128, 1000, 4096, 100_003, 1 << 20] {
        let values: Vec<u32> = (0..n).map(|_| rng.gen_range(0..1024)).collect();
        let expected = reference::prefix_sum(&values);
        for algorithm in ALGORITHMS {
            let result = engine.scan(&ctx, algorithm, &values).unwrap();
            assert_eq!(result, expected, "{} n={n}", algorithm.name());
        }
    }
}

#[test]
#[ignore] // Run with: cargo test --test scan_tests -- --ignored
fn test_plans_can_be_replayed() {
    let ctx = gpu();
    let engine = ScanEngine::new(&ctx).unwrap();
    let values: Vec<u32> = (0..5000).map(|i| i % 7).collect();
    let expected = reference::prefix_sum(&values);

    let mut pair = PingPong::allocate(&ctx, "replay", values.len());
    let naive = engine.plan_naive(&ctx, &mut pair).unwrap();
    let data = DeviceBuffer::allocate(&ctx, "replay_in_place", values.len());
    let efficient = engine.plan_work_efficient(&ctx, &data).unwrap();

    for _ in 0..3 {
        pair.first().upload(&ctx, &values).unwrap();
        ctx.run(&naive).unwrap();
        assert_eq!(pair.current().download(&ctx).unwrap(), expected);

        data.upload(&ctx, &values).unwrap();
        ctx.run(&efficient).unwrap();
        assert_eq!(data.download(&ctx).unwrap(), expected);
    }
}
