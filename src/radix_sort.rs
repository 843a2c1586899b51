// GPU Radix Sort
// LSD radix sort over u32 keys, one digit of `bits` bits per pass. Each pass:
// Clear   - zero the per-workgroup digit counters
// Count   - every workgroup histograms its slice of keys into counters[g][d]
// Transpose - counters[g][d] -> offsets[d][g], so buckets are ordered by digit, then workgroup
// Scan    - work-efficient inclusive scan of offsets, in place
// Scatter - each key goes to its bucket start plus its rank among equal digits in its workgroup
// Keys ping-pong between two buffers; the sorted array ends up in buffer passes % 2.

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::buffer::{DeviceBuffer, PingPong};
use crate::context::GpuContext;
use crate::error::{Error, Result};
use crate::kernel::{Defines, Kernel, Step, WorkSize};
use crate::matrix::{Transpose, TransposeVariant};
use crate::scan::ScanEngine;
use crate::shaders;

pub const DEFAULT_DIGIT_BITS: u32 = 4;
pub const DEFAULT_KEY_BITS: u32 = 32;
const MIN_WORKGROUP_SIZE: u32 = 128;

/// Sizes derived from the element count and digit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadixLayout {
    pub n: u32,
    pub workgroup_size: u32,
    pub radix: u32,
    pub workgroups: u32,
}

impl RadixLayout {
    pub fn new(n: u32, workgroup_size: u32, bits: u32) -> Self {
        let radix = 1u32 << bits;
        Self {
            n,
            workgroup_size,
            radix,
            workgroups: n.div_ceil(workgroup_size),
        }
    }

    /// Length of the counter and offset arrays
    pub fn counters(&self) -> usize {
        self.workgroups as usize * self.radix as usize
    }

    /// Grid of the count and scatter kernels, one invocation per key.
    pub fn key_work(&self) -> WorkSize {
        WorkSize::d1(self.workgroup_size, self.n)
    }
}

/// Digit shifts of every pass: 0, bits, 2*bits, ... below `key_bits`.
pub fn pass_shifts(bits: u32, key_bits: u32) -> Vec<u32> {
    (0..key_bits).step_by(bits as usize).collect()
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct RadixParams {
    pub n: u32,
    pub shift: u32,
    pub num_workgroups: u32,
    pub _padding: u32,
}

/// Device memory for sorting `n` keys.
pub struct RadixBuffers {
    pub layout: RadixLayout,
    pub keys: PingPong<u32>,
    pub counters: DeviceBuffer<u32>,
    pub offsets: DeviceBuffer<u32>,
}

impl RadixBuffers {
    pub fn allocate(ctx: &GpuContext, layout: RadixLayout) -> Self {
        Self {
            layout,
            keys: PingPong::allocate(ctx, "radix_keys", layout.n as usize),
            counters: DeviceBuffer::allocate(ctx, "radix_counters", layout.counters()),
            offsets: DeviceBuffer::allocate(ctx, "radix_offsets", layout.counters()),
        }
    }
}

pub struct RadixSort {
    count: Kernel,
    scatter: Kernel,
    transpose: Transpose,
    scan: ScanEngine,
    bits: u32,
    key_bits: u32,
    workgroup_size: u32,
}

impl RadixSort {
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        Self::with_bits(ctx, DEFAULT_DIGIT_BITS, DEFAULT_KEY_BITS)
    }

    /// `bits` per digit (1..=8) over the low `key_bits` (1..=32) of each key.
    pub fn with_bits(ctx: &GpuContext, bits: u32, key_bits: u32) -> Result<Self> {
        if !(1..=8).contains(&bits) {
            return Err(Error::InvalidLength {
                what: "radix digit",
                len: bits as usize,
                reason: "digit width must be between 1 and 8 bits",
            });
        }
        if !(1..=32).contains(&key_bits) {
            return Err(Error::InvalidLength {
                what: "radix key",
                len: key_bits as usize,
                reason: "key width must be between 1 and 32 bits",
            });
        }

        let radix = 1u32 << bits;
        // The count kernel publishes one counter per invocation, so a workgroup needs >= radix lanes
        let workgroup_size = radix.max(MIN_WORKGROUP_SIZE);
        let defines = Defines::new()
            .with("WORKGROUP_SIZE", workgroup_size)
            .with("RADIX", radix);

        let count = Kernel::compile(
            ctx,
            &shaders::with_common(shaders::RADIX_COUNT),
            "radix_count",
            &defines,
        )?;
        let scatter = Kernel::compile(
            ctx,
            &shaders::with_common(shaders::RADIX_SCATTER),
            "radix_scatter",
            &defines,
        )?;
        let transpose = Transpose::new(ctx, TransposeVariant::LocalGoodBanks, "u32")?;
        let scan = ScanEngine::new(ctx)?;

        Ok(Self {
            count,
            scatter,
            transpose,
            scan,
            bits,
            key_bits,
            workgroup_size,
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn key_bits(&self) -> u32 {
        self.key_bits
    }

    pub fn layout(&self, n: u32) -> RadixLayout {
        RadixLayout::new(n, self.workgroup_size, self.bits)
    }

    /// Steps sorting `buffers.keys.first()`; once they have run, `buffers.keys.current()`
    /// holds the result.
    pub fn plan(&self, ctx: &GpuContext, buffers: &mut RadixBuffers) -> Result<Vec<Step>> {
        buffers.keys.reset();
        let layout = buffers.layout;
        if layout.n <= 1 {
            return Ok(Vec::new());
        }

        let shifts = pass_shifts(self.bits, self.key_bits);
        debug!(
            "Radix plan: n={}, {} workgroups, radix {}, {} passes",
            layout.n,
            layout.workgroups,
            layout.radix,
            shifts.len()
        );

        let mut steps = Vec::new();
        for shift in shifts {
            let params = RadixParams {
                n: layout.n,
                shift,
                num_workgroups: layout.workgroups,
                _padding: 0,
            };
            let keys_in = buffers.keys.current().raw();
            let keys_out = buffers.keys.next().raw();

            steps.push(Step::clear(buffers.counters.raw()));
            steps.push(self.count.dispatch(
                ctx,
                &params,
                &[keys_in, buffers.counters.raw()],
                layout.key_work(),
            )?);
            steps.push(self.transpose.plan(
                ctx,
                &buffers.counters,
                &buffers.offsets,
                layout.workgroups,
                layout.radix,
            )?);
            steps.extend(self.scan.plan_work_efficient(ctx, &buffers.offsets)?);
            steps.push(self.scatter.dispatch(
                ctx,
                &params,
                &[keys_in, keys_out, buffers.offsets.raw()],
                layout.key_work(),
            )?);

            buffers.keys.swap();
        }
        Ok(steps)
    }

    pub fn sort(&self, ctx: &GpuContext, keys: &[u32]) -> Result<Vec<u32>> {
        let mut buffers = RadixBuffers::allocate(ctx, self.layout(keys.len() as u32));
        buffers.keys.first().upload(ctx, keys)?;
        let steps = self.plan(ctx, &mut buffers)?;
        ctx.run(&steps)?;
        buffers.keys.current().download(ctx)
    }
}

/// Host execution of every pass with the kernels' index rules.
#[cfg(test)]
pub(crate) fn emulate(keys: &[u32], workgroup_size: u32, bits: u32, key_bits: u32) -> Vec<u32> {
    let layout = RadixLayout::new(keys.len() as u32, workgroup_size, bits);
    if layout.n <= 1 {
        return keys.to_vec();
    }
    let (w, r, wg) = (
        layout.workgroups as usize,
        layout.radix as usize,
        workgroup_size as usize,
    );
    let mask = layout.radix - 1;
    let mut current = keys.to_vec();
    let mut next = vec![0u32; keys.len()];

    for shift in pass_shifts(bits, key_bits) {
        let digit = |key: u32| ((key >> shift) & mask) as usize;

        let mut counters = vec![0u32; w * r];
        for (i, &key) in current.iter().enumerate() {
            counters[(i / wg) * r + digit(key)] += 1;
        }

        let mut offsets = crate::reference::transpose(&counters, w, r);
        crate::scan::emulate_work_efficient(&mut offsets);

        for (i, &key) in current.iter().enumerate() {
            let g = i / wg;
            let d = digit(key);
            let rank = current[g * wg..i].iter().filter(|&&k| digit(k) == d).count();
            let bucket = d * w + g;
            let start = if bucket > 0 { offsets[bucket - 1] as usize } else { 0 };
            next[start + rank] = key;
        }
        std::mem::swap(&mut current, &mut next);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_layout() {
        let layout = RadixLayout::new(1000, 128, 4);
        assert_eq!(layout.radix, 16);
        assert_eq!(layout.workgroups, 8);
        assert_eq!(layout.counters(), 128);
        assert_eq!(RadixLayout::new(0, 128, 4).counters(), 0);
    }

    #[test]
    fn test_quarter_billion_keys_fit_the_dispatch_limit() {
        let layout = RadixLayout::new(1 << 28, 128, 4);
        assert_eq!(layout.workgroups, 1 << 21);

        let [x, y, z] = layout.key_work().workgroups(65535).unwrap();
        assert!(x <= 65535 && y <= 65535 && z == 1);
        assert!(x as u64 * y as u64 >= 1 << 21);

        // 2^21 counter rows need 2^17 tile rows, more than one dimension holds
        let counters = crate::matrix::transpose_work_size(layout.workgroups, layout.radix);
        let [x, y, z] = counters.workgroups(65535).unwrap();
        assert_eq!(x, 1);
        assert!(y <= 65535 && z <= 65535);
        assert!(y as u64 * z as u64 >= 1 << 17);
    }

    #[test]
    fn test_pass_shifts() {
        assert_eq!(pass_shifts(4, 32).len(), 8);
        assert_eq!(pass_shifts(8, 32), vec![0, 8, 16, 24]);
        assert_eq!(pass_shifts(3, 8), vec![0, 3, 6]);
    }

    #[test]
    fn test_small_keys_with_narrow_key_width() {
        let keys = [5, 3, 8, 1, 9, 2, 255, 255];
        assert_eq!(emulate(&keys, 128, 4, 8), vec![1, 2, 3, 5, 8, 9, 255, 255]);
        // Four lanes per workgroup spreads the same keys over two workgroups
        assert_eq!(emulate(&keys, 4, 2, 8), vec![1, 2, 3, 5, 8, 9, 255, 255]);
    }

    #[test]
    fn test_trivial_lengths() {
        assert!(emulate(&[], 128, 4, 32).is_empty());
        assert_eq!(emulate(&[42], 128, 4, 32), vec![42]);
    }

    #[test]
    fn test_random_keys_across_many_workgroups() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        for n in [2usize, 17, 128, 129, 1000, 4097] {
            let keys: Vec<u32> = (0..n).map(|_| rng.gen()).collect();
            assert_eq!(emulate(&keys, 128, 4, 32), reference::sort(&keys), "n={n}");
            assert_eq!(emulate(&keys, 32, 8, 32), reference::sort(&keys), "n={n}, 8-bit digits");
        }
    }

    #[test]
    fn test_duplicates_and_partial_key_width() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(4);
        let keys: Vec<u32> = (0..3000).map(|_| rng.gen_range(0..20)).collect();
        assert_eq!(emulate(&keys, 128, 4, 32), reference::sort(&keys));

        let wide: Vec<u32> = (0..3000).map(|_| rng.gen()).collect();
        assert_eq!(emulate(&wide, 128, 4, 12), reference::radix_sort(&wide, 4, 12));
    }
}
