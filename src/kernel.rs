// Compute kernels, work descriptors and encoded steps
//
// A kernel is one WGSL entry point compiled with a set of defines (the analogue of
// `-DNAME=value` build options). Kernel arguments are a `Pod` parameter struct bound
// as a uniform at binding 0 followed by storage buffers at bindings 1.. in order.

use std::fmt::Write as _;

use bytemuck::Pod;
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::context::GpuContext;
use crate::error::{Error, Result};

/// Build options compiled into a kernel as a WGSL prelude.
#[derive(Debug, Clone, Default)]
pub struct Defines {
    constants: Vec<(String, u32)>,
    aliases: Vec<(String, String)>,
}

impl Defines {
    pub fn new() -> Self {
        Self::default()
    }

    /// `const NAME: u32 = value;`
    pub fn with(mut self, name: &str, value: u32) -> Self {
        self.constants.push((name.to_string(), value));
        self
    }

    /// `alias NAME = ty;`
    pub fn alias(mut self, name: &str, ty: &str) -> Self {
        self.aliases.push((name.to_string(), ty.to_string()));
        self
    }

    pub fn prelude(&self) -> String {
        let mut out = String::new();
        for (name, ty) in &self.aliases {
            let _ = writeln!(out, "alias {name} = {ty};");
        }
        for (name, value) in &self.constants {
            let _ = writeln!(out, "const {name}: u32 = {value}u;");
        }
        out
    }
}

/// Workgroup size and total invocation count per dimension.
///
/// Totals are rounded up to whole workgroups; kernels bounds-check the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSize {
    group: [u32; 3],
    global: [u32; 3],
    dims: u8,
    fold_rows: bool,
}

impl WorkSize {
    pub fn d1(group_x: u32, global_x: u32) -> Self {
        Self {
            group: [group_x, 1, 1],
            global: [global_x, 1, 1],
            dims: 1,
            fold_rows: false,
        }
    }

    pub fn d2(group_x: u32, group_y: u32, global_x: u32, global_y: u32) -> Self {
        Self {
            group: [group_x, group_y, 1],
            global: [global_x, global_y, 1],
            dims: 2,
            fold_rows: false,
        }
    }

    pub fn d3(group: [u32; 3], global: [u32; 3]) -> Self {
        Self {
            group,
            global,
            dims: 3,
            fold_rows: false,
        }
    }

    /// 2-D descriptor whose rows of workgroups spill into z past the per-dimension limit.
    /// Kernels linearise the workgroup row as `id.z * count.y + id.y` and no-op past the end.
    pub fn d2_folded(group_x: u32, group_y: u32, global_x: u32, global_y: u32) -> Self {
        Self {
            fold_rows: true,
            ..Self::d2(group_x, group_y, global_x, global_y)
        }
    }

    pub fn group(&self) -> [u32; 3] {
        self.group
    }

    pub fn global(&self) -> [u32; 3] {
        self.global
    }

    pub fn dims(&self) -> u8 {
        self.dims
    }

    /// Total invocations after rounding each dimension up to whole workgroups.
    pub fn rounded_global(&self) -> [u32; 3] {
        let mut rounded = [0; 3];
        for d in 0..3 {
            rounded[d] = self.global[d].div_ceil(self.group[d]) * self.group[d];
        }
        rounded
    }

    pub fn is_empty(&self) -> bool {
        self.global.iter().any(|&g| g == 0)
    }

    /// Workgroup counts to dispatch.
    ///
    /// A 1-D descriptor that exceeds `limit` workgroups is folded into a 2-D grid;
    /// kernels linearise the workgroup id as `id.y * count.x + id.x` and no-op past the end.
    pub fn workgroups(&self, limit: u32) -> Result<[u32; 3]> {
        let mut counts = [0u32; 3];
        for d in 0..3 {
            counts[d] = self.global[d].div_ceil(self.group[d]);
        }

        if self.dims == 1 && counts[0] > limit {
            let rows = counts[0].div_ceil(limit);
            let cols = counts[0].div_ceil(rows);
            if rows > limit {
                return Err(self.too_large(counts[0] as u64, limit));
            }
            return Ok([cols, rows, 1]);
        }

        if self.fold_rows && counts[1] > limit && counts[0] <= limit {
            let layers = counts[1].div_ceil(limit);
            let rows = counts[1].div_ceil(layers);
            if layers > limit {
                return Err(self.too_large(counts[1] as u64, limit));
            }
            return Ok([counts[0], rows, layers]);
        }

        if let Some(&worst) = counts.iter().find(|&&c| c > limit) {
            return Err(self.too_large(worst as u64, limit));
        }
        Ok(counts)
    }

    fn too_large(&self, workgroups: u64, limit: u32) -> Error {
        Error::WorkSize {
            group: self.group,
            global: self.global,
            workgroups,
            limit,
        }
    }
}

/// A compiled compute entry point.
pub struct Kernel {
    entry_point: String,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl Kernel {
    /// Compile `entry_point` from `source` with `defines` prepended.
    ///
    /// Shader validation and pipeline creation errors are captured and returned as
    /// `Error::Compile` with the full diagnostic text.
    pub fn compile(ctx: &GpuContext, source: &str, entry_point: &str, defines: &Defines) -> Result<Self> {
        let device = ctx.device();
        let full_source = format!("{}\n{}", defines.prelude(), source);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(entry_point),
            source: wgpu::ShaderSource::Wgsl(full_source.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(entry_point),
            layout: None,
            module: &module,
            entry_point: Some(entry_point),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::Compile {
                entry_point: entry_point.to_string(),
                log: err.to_string(),
            });
        }

        let layout = pipeline.get_bind_group_layout(0);
        debug!("Compiled kernel `{}`", entry_point);

        Ok(Self {
            entry_point: entry_point.to_string(),
            pipeline,
            layout,
        })
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Bind `params` and `buffers` and produce a dispatch step.
    ///
    /// Empty work sizes produce a no-op step so schedules can keep a fixed shape.
    pub fn dispatch<P: Pod>(
        &self,
        ctx: &GpuContext,
        params: &P,
        buffers: &[&wgpu::Buffer],
        work: WorkSize,
    ) -> Result<Step> {
        if work.is_empty() {
            return Ok(Step::Skip);
        }
        let workgroups = work.workgroups(ctx.limits().max_compute_workgroups_per_dimension)?;

        let device = ctx.device();
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_params", self.entry_point)),
            contents: bytemuck::bytes_of(params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries = Vec::with_capacity(buffers.len() + 1);
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        });
        for (i, buffer) in buffers.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: i as u32 + 1,
                resource: buffer.as_entire_binding(),
            });
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&self.entry_point),
            layout: &self.layout,
            entries: &entries,
        });

        Ok(Step::Dispatch(Dispatch {
            label: self.entry_point.clone(),
            pipeline: self.pipeline.clone(),
            bind_group,
            workgroups,
        }))
    }
}

/// A fully bound kernel launch.
pub struct Dispatch {
    label: String,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    workgroups: [u32; 3],
}

impl Dispatch {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn workgroups(&self) -> [u32; 3] {
        self.workgroups
    }
}

/// One encoded device operation.
pub enum Step {
    Dispatch(Dispatch),
    /// Fill a buffer with zeros
    Clear(wgpu::Buffer),
    Skip,
}

impl Step {
    pub fn clear(buffer: &wgpu::Buffer) -> Self {
        Step::Clear(buffer.clone())
    }

    pub fn is_dispatch(&self) -> bool {
        matches!(self, Step::Dispatch(_))
    }

    pub(crate) fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        match self {
            Step::Dispatch(dispatch) => {
                // Separate compute pass per dispatch = memory barrier between passes
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(&dispatch.label),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&dispatch.pipeline);
                pass.set_bind_group(0, &dispatch.bind_group, &[]);
                let [x, y, z] = dispatch.workgroups;
                pass.dispatch_workgroups(x, y, z);
            }
            Step::Clear(buffer) => encoder.clear_buffer(buffer, 0, None),
            Step::Skip => {}
        }
    }
}

/// Count of actual kernel launches in a step list.
pub fn dispatch_count(steps: &[Step]) -> usize {
    steps.iter().filter(|step| step.is_dispatch()).count()
}
