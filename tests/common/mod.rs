// Shared GPU test setup

use gpgpu_bench::{DeviceConfig, GpuContext};

/// Open the default device. GPU tests are `#[ignore]`d, so reaching this without an
/// adapter is a failure rather than a skip.
pub fn gpu() -> GpuContext {
    GpuContext::new(&DeviceConfig::default()).expect("GPU tests need a wgpu adapter")
}

#[allow(dead_code)]
pub fn is_sorted<T: PartialOrd>(values: &[T]) -> bool {
    values.windows(2).all(|pair| pair[0] <= pair[1])
}
