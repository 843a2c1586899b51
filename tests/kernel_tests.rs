// GPU tests for the reduction, matrix and vector kernels and kernel compilation

mod common;

use gpgpu_bench::data::InputGenerator;
use gpgpu_bench::matrix::{MatmulConfig, MatrixMultiplication, Transpose, TransposeVariant};
use gpgpu_bench::reduce::{Sum, SumVariant};
use gpgpu_bench::vector_add::VectorAdd;
use gpgpu_bench::verify::{self, RELATIVE_TOLERANCE};
use gpgpu_bench::{reference, Defines, DeviceBuffer, Error, Kernel};

use common::gpu;

#[test]
#[ignore] // Run with: cargo test --test kernel_tests -- --ignored
fn test_compile_error_carries_log() {
    let ctx = gpu();
    let result = Kernel::compile(&ctx, "fn broken( {", "main", &Defines::new());
    match result {
        Err(Error::Compile { entry_point, log }) => {
            assert_eq!(entry_point, "main");
            assert!(!log.is_empty());
        }
        Err(other) => panic!("expected a compile error, got {other}"),
        Ok(_) => panic!("broken shader compiled"),
    }
}

#[test]
#[ignore] // Run with: cargo test --test kernel_tests -- --ignored
fn test_transfer_length_mismatch() {
    let ctx = gpu();
    let buffer = DeviceBuffer::<u32>::allocate(&ctx, "short", 4);
    assert!(matches!(
        buffer.upload(&ctx, &[1, 2, 3]),
        Err(Error::Transfer { expected: 4, actual: 3, .. })
    ));
}

#[test]
#[ignore] // Run with: cargo test --test kernel_tests -- --ignored
fn test_sum_variants() {
    let ctx = gpu();
    let n = 1_000_003;
    let values = InputGenerator::new(1).u32_range(n, 0, u32::MAX / n as u32);
    let expected = reference::sum(&values);
    for variant in SumVariant::ALL {
        let kernel = Sum::new(&ctx, variant).unwrap();
        assert_eq!(kernel.sum(&ctx, &values).unwrap(), expected, "{}", variant.entry_point());
    }
}

#[test]
#[ignore] // Run with: cargo test --test kernel_tests -- --ignored
fn test_transpose_variants() {
    let ctx = gpu();
    let (rows, cols) = (100, 37);
    let values = InputGenerator::new(2).f32_unit(rows * cols);
    let expected = reference::transpose(&values, rows, cols);

    let src = DeviceBuffer::from_slice(&ctx, "src", &values).unwrap();
    let dst = DeviceBuffer::<f32>::allocate(&ctx, "dst", rows * cols);
    for variant in TransposeVariant::ALL {
        let kernel = Transpose::new(&ctx, variant, "f32").unwrap();
        let step = kernel.plan(&ctx, &src, &dst, rows as u32, cols as u32).unwrap();
        ctx.run(std::slice::from_ref(&step)).unwrap();
        assert_eq!(dst.download(&ctx).unwrap(), expected, "{variant:?}");
    }
}

#[test]
#[ignore] // Run with: cargo test --test kernel_tests -- --ignored
fn test_transpose_taller_than_one_grid_dimension() {
    let ctx = gpu();
    // More tile rows than a single dispatch dimension allows
    let (rows, cols) = (16 * 65_535 + 5_000, 2);
    let values: Vec<u32> = (0..(rows * cols) as u32).collect();
    let expected = reference::transpose(&values, rows, cols);

    let src = DeviceBuffer::from_slice(&ctx, "tall_src", &values).unwrap();
    let dst = DeviceBuffer::<u32>::allocate(&ctx, "tall_dst", rows * cols);
    for variant in TransposeVariant::ALL {
        let kernel = Transpose::new(&ctx, variant, "u32").unwrap();
        let step = kernel.plan(&ctx, &src, &dst, rows as u32, cols as u32).unwrap();
        ctx.run(std::slice::from_ref(&step)).unwrap();
        assert_eq!(dst.download(&ctx).unwrap(), expected, "{variant:?}");
    }
}

#[test]
#[ignore] // Run with: cargo test --test kernel_tests -- --ignored
fn test_matmul_sweep() {
    let ctx = gpu();
    let (m, k, n) = (67, 45, 33);
    let mut gen = InputGenerator::new(3);
    let a = gen.f32_unit(m * k);
    let b = gen.f32_unit(k * n);
    let expected = reference::matmul(&a, &b, m, k, n);

    let a_gpu = DeviceBuffer::from_slice(&ctx, "a", &a).unwrap();
    let b_gpu = DeviceBuffer::from_slice(&ctx, "b", &b).unwrap();
    let c_gpu = DeviceBuffer::<f32>::allocate(&ctx, "c", m * n);
    for config in MatmulConfig::sweep() {
        let kernel = MatrixMultiplication::new(&ctx, config).unwrap();
        let step = kernel
            .plan(&ctx, &a_gpu, &b_gpu, &c_gpu, (m as u32, k as u32, n as u32))
            .unwrap();
        ctx.run(std::slice::from_ref(&step)).unwrap();
        let actual = c_gpu.download(&ctx).unwrap();
        verify::compare_relative(&config.name(), &expected, &actual, RELATIVE_TOLERANCE).unwrap();
    }
}

#[test]
#[ignore] // Run with: cargo test --test kernel_tests -- --ignored
fn test_vector_add() {
    let ctx = gpu();
    let mut gen = InputGenerator::new(4);
    let a = gen.f32_unit(300_001);
    let b = gen.f32_unit(300_001);
    let adder = VectorAdd::new(&ctx).unwrap();
    assert_eq!(adder.add(&ctx, &a, &b).unwrap(), reference::vector_add(&a, &b));
}
