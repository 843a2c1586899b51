// Sum reduction kernels. Every variant accumulates into one atomic u32 counter.

use bytemuck::{Pod, Zeroable};

use crate::buffer::DeviceBuffer;
use crate::context::GpuContext;
use crate::error::Result;
use crate::kernel::{Defines, Kernel, Step, WorkSize};
use crate::shaders;

pub const SUM_WORKGROUP_SIZE: u32 = 128;
pub const VALUES_PER_WORKITEM: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SumVariant {
    GlobalAtomic,
    Loop,
    CoalescedLoop,
    LocalMemory,
    Tree,
}

impl SumVariant {
    pub const ALL: [SumVariant; 5] = [
        SumVariant::GlobalAtomic,
        SumVariant::Loop,
        SumVariant::CoalescedLoop,
        SumVariant::LocalMemory,
        SumVariant::Tree,
    ];

    pub fn entry_point(&self) -> &'static str {
        match self {
            SumVariant::GlobalAtomic => "sum_global_atomic",
            SumVariant::Loop => "sum_loop",
            SumVariant::CoalescedLoop => "sum_coalesced_loop",
            SumVariant::LocalMemory => "sum_local_memory",
            SumVariant::Tree => "sum_tree",
        }
    }

    /// Invocations needed for `n` values.
    pub fn invocations(&self, n: u32) -> u32 {
        match self {
            SumVariant::Loop | SumVariant::CoalescedLoop => n.div_ceil(VALUES_PER_WORKITEM),
            _ => n,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct SumParams {
    n: u32,
    _padding0: u32,
    _padding1: u32,
    _padding2: u32,
}

pub struct Sum {
    kernel: Kernel,
    variant: SumVariant,
}

impl Sum {
    pub fn new(ctx: &GpuContext, variant: SumVariant) -> Result<Self> {
        let defines = Defines::new()
            .with("WORKGROUP_SIZE", SUM_WORKGROUP_SIZE)
            .with("VALUES_PER_WORKITEM", VALUES_PER_WORKITEM);
        let kernel = Kernel::compile(
            ctx,
            &shaders::with_common(shaders::REDUCE),
            variant.entry_point(),
            &defines,
        )?;
        Ok(Self { kernel, variant })
    }

    pub fn variant(&self) -> SumVariant {
        self.variant
    }

    /// Steps zeroing `total` and adding every element of `values` into it.
    pub fn plan(&self, ctx: &GpuContext, values: &DeviceBuffer<u32>, total: &DeviceBuffer<u32>) -> Result<Vec<Step>> {
        let n = values.len() as u32;
        let params = SumParams {
            n,
            _padding0: 0,
            _padding1: 0,
            _padding2: 0,
        };
        Ok(vec![
            Step::clear(total.raw()),
            self.kernel.dispatch(
                ctx,
                &params,
                &[values.raw(), total.raw()],
                WorkSize::d1(SUM_WORKGROUP_SIZE, self.variant.invocations(n)),
            )?,
        ])
    }

    pub fn sum(&self, ctx: &GpuContext, values: &[u32]) -> Result<u32> {
        let values = DeviceBuffer::from_slice(ctx, "sum_values", values)?;
        let total = DeviceBuffer::<u32>::allocate(ctx, "sum_total", 1);
        let steps = self.plan(ctx, &values, &total)?;
        ctx.run(&steps)?;
        Ok(total.download(ctx)?[0])
    }
}
