// Global merge sort: bottom-up, each pass merges sibling sorted blocks of doubling size.
// Every pass reads one half of a ping-pong pair and writes the other; with p passes the
// sorted array ends up in buffer p % 2.

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::buffer::PingPong;
use crate::context::GpuContext;
use crate::error::Result;
use crate::kernel::{Defines, Kernel, Step, WorkSize};
use crate::shaders;

pub const MERGE_WORKGROUP_SIZE: u32 = 32;

/// One merge pass. Doubles as the kernel's uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct MergePass {
    pub n: u32,
    /// Length of the already-sorted blocks being merged pairwise
    pub block_size: u32,
    pub _padding0: u32,
    pub _padding1: u32,
}

/// Block sizes 1, 2, 4, ... while below n.
pub fn schedule(n: u32) -> Vec<MergePass> {
    let mut passes = Vec::new();
    let mut block_size = 1u64;
    while block_size < n as u64 {
        passes.push(MergePass {
            n,
            block_size: block_size as u32,
            _padding0: 0,
            _padding1: 0,
        });
        block_size <<= 1;
    }
    passes
}

pub struct MergeSort {
    kernel: Kernel,
}

impl MergeSort {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        let defines = Defines::new().with("WORKGROUP_SIZE", MERGE_WORKGROUP_SIZE);
        let kernel = Kernel::compile(
            ctx,
            &shaders::with_common(shaders::MERGE),
            "merge_global",
            &defines,
        )?;
        Ok(Self { kernel })
    }

    /// Steps sorting `pair.first()`; once they have run, `pair.current()` holds the result.
    pub fn plan(&self, ctx: &GpuContext, pair: &mut PingPong<i32>) -> Result<Vec<Step>> {
        pair.reset();
        let n = pair.len() as u32;
        let passes = schedule(n);
        debug!("Merge plan: n={}, {} passes", n, passes.len());

        let mut steps = Vec::with_capacity(passes.len());
        for pass in &passes {
            steps.push(self.kernel.dispatch(
                ctx,
                pass,
                &[pair.current().raw(), pair.next().raw()],
                WorkSize::d1(MERGE_WORKGROUP_SIZE, n),
            )?);
            pair.swap();
        }
        Ok(steps)
    }

    pub fn sort(&self, ctx: &GpuContext, values: &[i32]) -> Result<Vec<i32>> {
        let mut pair = PingPong::allocate(ctx, "merge", values.len());
        pair.first().upload(ctx, values)?;
        let steps = self.plan(ctx, &mut pair)?;
        ctx.run(&steps)?;
        pair.current().download(ctx)
    }
}

/// Host execution of one pass with the kernel's rank rules.
#[cfg(test)]
pub(crate) fn emulate_pass<T: Copy + Ord>(pass: &MergePass, src: &[T], dst: &mut [T]) {
    let n = pass.n as usize;
    let block = pass.block_size as usize;
    for i in 0..n {
        let left_start = (i / (2 * block)) * 2 * block;
        let right_start = (left_start + block).min(n);
        let right_end = (left_start + 2 * block).min(n);
        let value = src[i];
        let rank = if i < right_start {
            (i - left_start) + src[right_start..right_end].partition_point(|x| *x < value)
        } else {
            (i - right_start) + src[left_start..right_start].partition_point(|x| *x <= value)
        };
        dst[left_start + rank] = value;
    }
}
