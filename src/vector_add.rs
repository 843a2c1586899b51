// Element-wise vector addition, used to measure kernel and transfer bandwidth

use bytemuck::{Pod, Zeroable};

use crate::buffer::DeviceBuffer;
use crate::context::GpuContext;
use crate::error::{Error, Result};
use crate::kernel::{Defines, Kernel, Step, WorkSize};
use crate::shaders;

pub const ADD_WORKGROUP_SIZE: u32 = 128;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct AddParams {
    n: u32,
    _padding0: u32,
    _padding1: u32,
    _padding2: u32,
}

pub struct VectorAdd {
    kernel: Kernel,
}

impl VectorAdd {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        let defines = Defines::new().with("WORKGROUP_SIZE", ADD_WORKGROUP_SIZE);
        let kernel = Kernel::compile(ctx, &shaders::with_common(shaders::APLUSB), "aplusb", &defines)?;
        Ok(Self { kernel })
    }

    /// Step computing `c = a + b`.
    pub fn plan(
        &self,
        ctx: &GpuContext,
        a: &DeviceBuffer<f32>,
        b: &DeviceBuffer<f32>,
        c: &DeviceBuffer<f32>,
    ) -> Result<Step> {
        let n = a.len();
        for buffer in [b, c] {
            if buffer.len() != n {
                return Err(Error::Transfer {
                    label: buffer.label().to_string(),
                    expected: n,
                    actual: buffer.len(),
                });
            }
        }
        let params = AddParams {
            n: n as u32,
            _padding0: 0,
            _padding1: 0,
            _padding2: 0,
        };
        self.kernel.dispatch(
            ctx,
            &params,
            &[a.raw(), b.raw(), c.raw()],
            WorkSize::d1(ADD_WORKGROUP_SIZE, n as u32),
        )
    }

    pub fn add(&self, ctx: &GpuContext, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        let a = DeviceBuffer::from_slice(ctx, "aplusb_a", a)?;
        let b = DeviceBuffer::from_slice(ctx, "aplusb_b", b)?;
        let c = DeviceBuffer::allocate(ctx, "aplusb_c", a.len());
        let step = self.plan(ctx, &a, &b, &c)?;
        ctx.run(std::slice::from_ref(&step))?;
        c.download(ctx)
    }
}
