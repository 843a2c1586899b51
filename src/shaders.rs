// WGSL sources embedded into the binary
// 1-D kernels are compiled with `with_common`, which prepends the workgroup
// linearisation helpers they share.

pub const COMMON: &str = include_str!("../assets/shaders/common.wgsl");
pub const PREFIX_SUM: &str = include_str!("../assets/shaders/prefix_sum.wgsl");
pub const PREFIX_SUM_SWEEP: &str = include_str!("../assets/shaders/prefix_sum_sweep.wgsl");
pub const BITONIC: &str = include_str!("../assets/shaders/bitonic.wgsl");
pub const MERGE: &str = include_str!("../assets/shaders/merge.wgsl");
pub const RADIX_COUNT: &str = include_str!("../assets/shaders/radix_count.wgsl");
pub const RADIX_SCATTER: &str = include_str!("../assets/shaders/radix_scatter.wgsl");
pub const TRANSPOSE: &str = include_str!("../assets/shaders/transpose.wgsl");
pub const REDUCE: &str = include_str!("../assets/shaders/reduce.wgsl");
pub const MATRIX_MULTIPLICATION: &str = include_str!("../assets/shaders/matrix_multiplication.wgsl");
pub const APLUSB: &str = include_str!("../assets/shaders/aplusb.wgsl");

/// Kernel body preceded by the shared 1-D helpers. Requires a `WORKGROUP_SIZE` define.
pub fn with_common(body: &str) -> String {
    format!("{COMMON}\n{body}")
}
