// Bitonic sort: a fixed compare-exchange network, one dispatch per network stage.
// The network is defined for power-of-two lengths only; `sort` pads anything else.

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::buffer::DeviceBuffer;
use crate::context::GpuContext;
use crate::error::{Error, Result};
use crate::kernel::{Defines, Kernel, Step, WorkSize};
use crate::shaders;

pub const BITONIC_WORKGROUP_SIZE: u32 = 64;

/// One stage of the network. Doubles as the kernel's uniform block.
///
/// Sorted runs of `2^log_chunk` elements are being merged into runs twice as long;
/// each invocation compare-exchanges a pair `2^log_block` apart.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct BitonicStage {
    pub n: u32,
    pub log_chunk: u32,
    pub log_block: u32,
    pub _padding: u32,
}

impl BitonicStage {
    /// Lower index of the pair handled by invocation `k`.
    pub fn left(&self, k: u32) -> u32 {
        let block = 1u32 << self.log_block;
        (k >> self.log_block) * (block << 1) + (k & (block - 1))
    }

    pub fn ascending(&self, left: u32) -> bool {
        (left >> (self.log_chunk + 1)) & 1 == 0
    }
}

/// All stages for `n = 2^m` elements: m(m+1)/2 of them.
pub fn schedule(n: u32) -> Vec<BitonicStage> {
    let log_n = if n > 1 { n.ilog2() } else { 0 };
    let mut stages = Vec::new();
    for log_chunk in 0..log_n {
        for log_block in (0..=log_chunk).rev() {
            stages.push(BitonicStage {
                n,
                log_chunk,
                log_block,
                _padding: 0,
            });
        }
    }
    stages
}

pub struct BitonicSort {
    kernel: Kernel,
}

impl BitonicSort {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        let defines = Defines::new().with("WORKGROUP_SIZE", BITONIC_WORKGROUP_SIZE);
        let kernel = Kernel::compile(ctx, &shaders::with_common(shaders::BITONIC), "bitonic", &defines)?;
        Ok(Self { kernel })
    }

    /// Steps sorting `data` ascending in place. The length must be a power of two.
    pub fn plan(&self, ctx: &GpuContext, data: &DeviceBuffer<i32>) -> Result<Vec<Step>> {
        let len = data.len();
        if len > 1 && !len.is_power_of_two() {
            return Err(Error::InvalidLength {
                what: "bitonic sort",
                len,
                reason: "length must be a power of two",
            });
        }

        let n = len as u32;
        let stages = schedule(n);
        debug!("Bitonic plan: n={}, {} stages", n, stages.len());

        stages
            .iter()
            .map(|stage| {
                self.kernel.dispatch(
                    ctx,
                    stage,
                    &[data.raw()],
                    WorkSize::d1(BITONIC_WORKGROUP_SIZE, n / 2),
                )
            })
            .collect()
    }

    /// Sort any number of values. Non-power-of-two inputs are padded with `i32::MAX`
    /// and truncated after readback.
    pub fn sort(&self, ctx: &GpuContext, values: &[i32]) -> Result<Vec<i32>> {
        let padded_len = values.len().next_power_of_two();
        let mut padded = values.to_vec();
        padded.resize(padded_len, i32::MAX);

        let data = DeviceBuffer::from_slice(ctx, "bitonic_data", &padded)?;
        let steps = self.plan(ctx, &data)?;
        ctx.run(&steps)?;

        let mut sorted = data.download(ctx)?;
        sorted.truncate(values.len());
        Ok(sorted)
    }
}

/// Host execution of the schedule with the kernel's index rules.
#[cfg(test)]
pub(crate) fn emulate(data: &mut [i32]) {
    let n = data.len() as u32;
    for stage in schedule(n) {
        for k in 0..n / 2 {
            let left = stage.left(k) as usize;
            let right = left + (1usize << stage.log_block);
            let (a, b) = (data[left], data[right]);
            if (a > b) == stage.ascending(left as u32) {
                data[left] = b;
                data[right] = a;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_stage_count() {
        assert_eq!(schedule(1).len(), 0);
        assert_eq!(schedule(2).len(), 1);
        assert_eq!(schedule(8).len(), 6);
        assert_eq!(schedule(1 << 20).len(), 20 * 21 / 2);
    }

    #[test]
    fn test_pairs_cover_every_index_once() {
        for stage in schedule(16) {
            let mut seen = [false; 16];
            for k in 0..8 {
                let left = stage.left(k) as usize;
                let right = left + (1 << stage.log_block);
                assert!(!seen[left] && !seen[right], "{stage:?}");
                seen[left] = true;
                seen[right] = true;
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn test_final_stages_are_ascending() {
        let n = 64;
        for stage in schedule(n).iter().filter(|s| s.log_chunk == 5) {
            assert!((0..n / 2).all(|k| stage.ascending(stage.left(k))));
        }
    }

    #[test]
    fn test_sorts_random_power_of_two() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        for log_n in 0..12 {
            let mut data: Vec<i32> = (0..1 << log_n).map(|_| rng.gen()).collect();
            let mut expected = data.clone();
            expected.sort_unstable();
            emulate(&mut data);
            assert_eq!(data, expected, "n=2^{log_n}");
        }
    }

    #[test]
    fn test_sorts_with_duplicates_and_extremes() {
        let mut data = vec![3, i32::MIN, 3, i32::MAX, 0, -1, 3, i32::MIN];
        emulate(&mut data);
        assert_eq!(data, vec![i32::MIN, i32::MIN, -1, 0, 3, 3, 3, i32::MAX]);
    }
}
