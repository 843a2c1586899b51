// Matrix transpose and matrix multiplication kernels
// Both launch 2-D grids of square tiles over (columns, rows). Transpose is generic over
// the element type through the `Elem` alias; radix sort reuses it on u32 counters.

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::buffer::DeviceBuffer;
use crate::context::GpuContext;
use crate::error::{Error, Result};
use crate::kernel::{Defines, Kernel, Step, WorkSize};
use crate::shaders;

pub const TRANSPOSE_TILE_SIZE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransposeVariant {
    Naive,
    /// Tiles staged in workgroup memory, column reads conflict on banks
    LocalBadBanks,
    /// Tiles padded by one element per row
    LocalGoodBanks,
}

impl TransposeVariant {
    pub const ALL: [TransposeVariant; 3] = [
        TransposeVariant::Naive,
        TransposeVariant::LocalBadBanks,
        TransposeVariant::LocalGoodBanks,
    ];

    pub fn entry_point(&self) -> &'static str {
        match self {
            TransposeVariant::Naive => "transpose_naive",
            TransposeVariant::LocalBadBanks => "transpose_local_bad_banks",
            TransposeVariant::LocalGoodBanks => "transpose_local_good_banks",
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct TransposeParams {
    rows: u32,
    cols: u32,
    _padding0: u32,
    _padding1: u32,
}

pub struct Transpose {
    kernel: Kernel,
}

impl Transpose {
    /// `elem` is the WGSL element type, "f32" or "u32".
    pub fn new(ctx: &GpuContext, variant: TransposeVariant, elem: &str) -> Result<Self> {
        let defines = Defines::new()
            .alias("Elem", elem)
            .with("TILE_SIZE", TRANSPOSE_TILE_SIZE);
        let kernel = Kernel::compile(ctx, shaders::TRANSPOSE, variant.entry_point(), &defines)?;
        Ok(Self { kernel })
    }

    /// Step writing the transpose of the `rows` x `cols` matrix in `src` into `dst`.
    pub fn plan<T: Pod>(
        &self,
        ctx: &GpuContext,
        src: &DeviceBuffer<T>,
        dst: &DeviceBuffer<T>,
        rows: u32,
        cols: u32,
    ) -> Result<Step> {
        let len = rows as usize * cols as usize;
        if src.len() != len || dst.len() != len {
            return Err(Error::Transfer {
                label: dst.label().to_string(),
                expected: len,
                actual: src.len().min(dst.len()),
            });
        }
        let params = TransposeParams {
            rows,
            cols,
            _padding0: 0,
            _padding1: 0,
        };
        self.kernel.dispatch(
            ctx,
            &params,
            &[src.raw(), dst.raw()],
            transpose_work_size(rows, cols),
        )
    }
}

/// Tile grid over (cols, rows). Tall matrices such as the radix counters fold their
/// tile rows into z.
pub fn transpose_work_size(rows: u32, cols: u32) -> WorkSize {
    WorkSize::d2_folded(TRANSPOSE_TILE_SIZE, TRANSPOSE_TILE_SIZE, cols, rows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatmulVariant {
    Naive,
    Local,
    /// Tiled, several output rows per invocation
    LocalWpt,
}

impl MatmulVariant {
    pub fn entry_point(&self) -> &'static str {
        match self {
            MatmulVariant::Naive => "matrix_multiplication_naive",
            MatmulVariant::Local => "matrix_multiplication_local",
            MatmulVariant::LocalWpt => "matrix_multiplication_local_wpt",
        }
    }
}

/// Kernel variant plus its tiling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatmulConfig {
    pub variant: MatmulVariant,
    pub tile_size: u32,
    /// Rows per invocation; always 1 outside `LocalWpt`
    pub work_per_thread: u32,
}

impl MatmulConfig {
    pub fn naive(tile_size: u32) -> Self {
        Self {
            variant: MatmulVariant::Naive,
            tile_size,
            work_per_thread: 1,
        }
    }

    pub fn local(tile_size: u32) -> Self {
        Self {
            variant: MatmulVariant::Local,
            tile_size,
            work_per_thread: 1,
        }
    }

    pub fn local_wpt(tile_size: u32, work_per_thread: u32) -> Self {
        Self {
            variant: MatmulVariant::LocalWpt,
            tile_size,
            work_per_thread,
        }
    }

    /// Every configuration the benchmark sweeps: tiles 4, 8, 16 for each variant and
    /// work-per-thread 2..16 where it divides the tile.
    pub fn sweep() -> Vec<MatmulConfig> {
        let tiles = [4u32, 8, 16];
        let mut configs: Vec<MatmulConfig> = tiles.iter().map(|&t| Self::naive(t)).collect();
        configs.extend(tiles.iter().map(|&t| Self::local(t)));
        for &tile in &tiles {
            for wpt in [2u32, 4, 8, 16] {
                if wpt <= tile {
                    configs.push(Self::local_wpt(tile, wpt));
                }
            }
        }
        configs
    }

    pub fn name(&self) -> String {
        match self.variant {
            MatmulVariant::LocalWpt => format!(
                "{} ts={} wpt={}",
                self.variant.entry_point(),
                self.tile_size,
                self.work_per_thread
            ),
            _ => format!("{} ts={}", self.variant.entry_point(), self.tile_size),
        }
    }

    fn work_size(&self, m: u32, n: u32) -> WorkSize {
        let ts = self.tile_size;
        match self.variant {
            MatmulVariant::Naive | MatmulVariant::Local => WorkSize::d2(ts, ts, n, m),
            MatmulVariant::LocalWpt => {
                let rows_per_step = ts / self.work_per_thread;
                WorkSize::d2(ts, rows_per_step, n, m.div_ceil(ts) * rows_per_step)
            }
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct MatmulParams {
    m: u32,
    k: u32,
    n: u32,
    _padding: u32,
}

pub struct MatrixMultiplication {
    kernel: Kernel,
    config: MatmulConfig,
}

impl MatrixMultiplication {
    pub fn new(ctx: &GpuContext, config: MatmulConfig) -> Result<Self> {
        let defines = Defines::new()
            .with("TILE_SIZE", config.tile_size)
            .with("WORK_PER_THREAD", config.work_per_thread);
        let kernel = Kernel::compile(
            ctx,
            shaders::MATRIX_MULTIPLICATION,
            config.variant.entry_point(),
            &defines,
        )?;
        debug!("Matrix multiplication ready: {}", config.name());
        Ok(Self { kernel, config })
    }

    /// Step computing `c = a x b` for `a` of shape m x k and `b` of shape k x n.
    pub fn plan(
        &self,
        ctx: &GpuContext,
        a: &DeviceBuffer<f32>,
        b: &DeviceBuffer<f32>,
        c: &DeviceBuffer<f32>,
        (m, k, n): (u32, u32, u32),
    ) -> Result<Step> {
        for (buffer, len) in [(a, m * k), (b, k * n), (c, m * n)] {
            if buffer.len() != len as usize {
                return Err(Error::Transfer {
                    label: buffer.label().to_string(),
                    expected: len as usize,
                    actual: buffer.len(),
                });
            }
        }
        let params = MatmulParams {
            m,
            k,
            n,
            _padding: 0,
        };
        self.kernel.dispatch(
            ctx,
            &params,
            &[a.raw(), b.raw(), c.raw()],
            self.config.work_size(m, n),
        )
    }
}
