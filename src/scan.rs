// Scan engine: inclusive prefix sums built from single-kernel passes
//
// Naive (Hillis-Steele): log2(n) passes over all n elements, ping-ponging a buffer pair.
// Work-efficient (Blelloch): in place, an up-sweep that builds partial sums over an
// implicit binary tree followed by a down-sweep that fills the gaps. O(n) total work,
// which is why radix sort runs this variant once per digit pass.

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::buffer::{DeviceBuffer, PingPong};
use crate::context::GpuContext;
use crate::error::Result;
use crate::kernel::{Defines, Kernel, Step, WorkSize};
use crate::shaders;

pub const SCAN_WORKGROUP_SIZE: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAlgorithm {
    Naive,
    WorkEfficient,
}

impl ScanAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            ScanAlgorithm::Naive => "naive",
            ScanAlgorithm::WorkEfficient => "work-efficient",
        }
    }
}

/// Parameters of one scan pass. Doubles as the kernel's uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct ScanPass {
    pub n: u32,
    pub base: u32,
    pub stride: u32,
    pub offset: u32,
}

impl ScanPass {
    /// Invocations a work-efficient pass needs: one per `stride` elements.
    pub fn sweep_invocations(&self) -> u32 {
        self.n / self.stride
    }
}

/// Hillis-Steele schedule: offset = 1, 2, 4, ... while offset < n.
pub fn naive_passes(n: u32) -> Vec<ScanPass> {
    let mut passes = Vec::new();
    let mut offset = 1u64;
    while offset < n as u64 {
        passes.push(ScanPass {
            n,
            base: 0,
            stride: 1,
            offset: offset as u32,
        });
        offset <<= 1;
    }
    passes
}

/// Blelloch schedule. Up-sweep passes touch `2*offset - 1 + k*2*offset`, down-sweep
/// passes touch `3*offset - 1 + k*2*offset`. Passes without any invocation are dropped.
pub fn work_efficient_passes(n: u32) -> Vec<ScanPass> {
    let n64 = n as u64;
    let mut passes = Vec::new();

    let mut offset = 1u64;
    while offset < n64 {
        passes.push(sweep_pass(n, 2 * offset - 1, offset));
        offset <<= 1;
    }

    // offset is now the first power of two >= n; the last up-sweep level was offset / 2
    offset >>= 2;
    while offset > 0 {
        passes.push(sweep_pass(n, 3 * offset - 1, offset));
        offset >>= 1;
    }

    passes.retain(|pass| pass.sweep_invocations() > 0);
    passes
}

fn sweep_pass(n: u32, base: u64, offset: u64) -> ScanPass {
    ScanPass {
        n,
        base: base as u32,
        stride: (2 * offset) as u32,
        offset: offset as u32,
    }
}

pub struct ScanEngine {
    naive: Kernel,
    sweep: Kernel,
    workgroup_size: u32,
}

impl ScanEngine {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        Self::with_workgroup_size(ctx, SCAN_WORKGROUP_SIZE)
    }

    pub fn with_workgroup_size(ctx: &GpuContext, workgroup_size: u32) -> Result<Self> {
        let defines = Defines::new().with("WORKGROUP_SIZE", workgroup_size);
        let naive = Kernel::compile(
            ctx,
            &shaders::with_common(shaders::PREFIX_SUM),
            "prefix_sum_naive",
            &defines,
        )?;
        let sweep = Kernel::compile(
            ctx,
            &shaders::with_common(shaders::PREFIX_SUM_SWEEP),
            "prefix_sum_sweep",
            &defines,
        )?;
        Ok(Self {
            naive,
            sweep,
            workgroup_size,
        })
    }

    /// Naive scan over `pair`, starting from `pair.first()`.
    /// When the steps have run, `pair.current()` holds the result.
    pub fn plan_naive(&self, ctx: &GpuContext, pair: &mut PingPong<u32>) -> Result<Vec<Step>> {
        pair.reset();
        let n = pair.len() as u32;
        let passes = naive_passes(n);
        debug!("Naive scan plan: n={}, {} passes", n, passes.len());

        let mut steps = Vec::with_capacity(passes.len());
        for pass in &passes {
            steps.push(self.naive.dispatch(
                ctx,
                pass,
                &[pair.current().raw(), pair.next().raw()],
                WorkSize::d1(self.workgroup_size, n),
            )?);
            pair.swap();
        }
        Ok(steps)
    }

    /// Work-efficient scan of `data` in place.
    pub fn plan_work_efficient(&self, ctx: &GpuContext, data: &DeviceBuffer<u32>) -> Result<Vec<Step>> {
        let n = data.len() as u32;
        let passes = work_efficient_passes(n);
        debug!("Work-efficient scan plan: n={}, {} passes", n, passes.len());

        passes
            .iter()
            .map(|pass| {
                self.sweep.dispatch(
                    ctx,
                    pass,
                    &[data.raw()],
                    WorkSize::d1(self.workgroup_size, pass.sweep_invocations()),
                )
            })
            .collect()
    }

    /// Upload `values`, scan them and read the result back.
    pub fn scan(&self, ctx: &GpuContext, algorithm: ScanAlgorithm, values: &[u32]) -> Result<Vec<u32>> {
        match algorithm {
            ScanAlgorithm::Naive => {
                let mut pair = PingPong::allocate(ctx, "scan", values.len());
                pair.first().upload(ctx, values)?;
                let steps = self.plan_naive(ctx, &mut pair)?;
                ctx.run(&steps)?;
                pair.current().download(ctx)
            }
            ScanAlgorithm::WorkEfficient => {
                let data = DeviceBuffer::from_slice(ctx, "scan", values)?;
                let steps = self.plan_work_efficient(ctx, &data)?;
                ctx.run(&steps)?;
                data.download(ctx)
            }
        }
    }
}

/// Host execution of the naive schedule with the kernel's index rules.
#[cfg(test)]
pub(crate) fn emulate_naive(values: &[u32]) -> Vec<u32> {
    let n = values.len();
    let mut src = values.to_vec();
    let mut dst = vec![0u32; n];
    for pass in naive_passes(n as u32) {
        let offset = pass.offset as usize;
        for i in 0..n {
            dst[i] = if i >= offset {
                src[i].wrapping_add(src[i - offset])
            } else {
                src[i]
            };
        }
        std::mem::swap(&mut src, &mut dst);
    }
    src
}

/// Host execution of the work-efficient schedule, including the rounded-up tail
/// invocations that the kernel must ignore.
#[cfg(test)]
pub(crate) fn emulate_work_efficient(data: &mut [u32]) {
    let n = data.len() as u32;
    for pass in work_efficient_passes(n) {
        let invocations = pass.sweep_invocations();
        let launched = invocations.div_ceil(SCAN_WORKGROUP_SIZE) * SCAN_WORKGROUP_SIZE;
        for k in 0..launched {
            if k >= invocations {
                continue;
            }
            let idx = pass.base + k * pass.stride;
            if idx >= n {
                continue;
            }
            let (idx, prev) = (idx as usize, (idx - pass.offset) as usize);
            data[idx] = data[idx].wrapping_add(data[prev]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference;
    use rand::{Rng, SeedableRng};

    fn work_efficient(values: &[u32]) -> Vec<u32> {
        let mut data = values.to_vec();
        emulate_work_efficient(&mut data);
        data
    }

    #[test]
    fn test_eight_ones() {
        let ones = vec![1u32; 8];
        let expected: Vec<u32> = (1..=8).collect();
        assert_eq!(emulate_naive(&ones), expected);
        assert_eq!(work_efficient(&ones), expected);
    }

    #[test]
    fn test_matches_reference_for_many_lengths() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for n in (0..=70).chain([127, 128, 129, 1000, 1024, 4096, 5000]) {
            let values: Vec<u32> = (0..n).map(|_| rng.gen_range(0..1024)).collect();
            let expected = reference::prefix_sum(&values);
            assert_eq!(emulate_naive(&values), expected, "naive, n={n}");
            assert_eq!(work_efficient(&values), expected, "work-efficient, n={n}");
        }
    }

    #[test]
    fn test_wrapping_addition() {
        let values = vec![u32::MAX, 2, 3];
        assert_eq!(work_efficient(&values), vec![u32::MAX, 1, 4]);
        assert_eq!(emulate_naive(&values), vec![u32::MAX, 1, 4]);
    }

    #[test]
    fn test_naive_pass_count_is_ceil_log2() {
        assert_eq!(naive_passes(0).len(), 0);
        assert_eq!(naive_passes(1).len(), 0);
        assert_eq!(naive_passes(2).len(), 1);
        assert_eq!(naive_passes(8).len(), 3);
        assert_eq!(naive_passes(9).len(), 4);
        assert_eq!(naive_passes(1 << 20).len(), 20);
    }

    #[test]
    fn test_work_efficient_schedule_for_eight() {
        let passes: Vec<(u32, u32, u32)> = work_efficient_passes(8)
            .iter()
            .map(|p| (p.base, p.stride, p.offset))
            .collect();
        assert_eq!(
            passes,
            vec![(1, 2, 1), (3, 4, 2), (7, 8, 4), (5, 4, 2), (2, 2, 1)]
        );
    }

    #[test]
    fn test_work_efficient_is_linear_work() {
        for n in [1u32 << 10, 1 << 16, 1 << 20, 1_000_003] {
            let touched: u64 = work_efficient_passes(n)
                .iter()
                .map(|p| p.sweep_invocations() as u64)
                .sum();
            assert!(touched < 2 * n as u64, "n={n} touched={touched}");
        }
    }

    #[test]
    fn test_sweep_indices_stay_in_bounds_before_the_guard() {
        // Every invocation below n / stride must address at most n + offset - 1,
        // so the kernel's idx >= n check is the only guard it needs.
        for n in [3u32, 6, 7, 12, 100, 1023, 4097] {
            for pass in work_efficient_passes(n) {
                let last = pass.base as u64 + (pass.sweep_invocations() as u64 - 1) * pass.stride as u64;
                assert!(last < n as u64 + pass.offset as u64, "n={n} pass={pass:?}");
                assert!(pass.base >= pass.offset);
            }
        }
    }
}
