// Benchmark driver
// Each suite generates its input, times the host references, then times every device
// variant: upload (untimed), run the prepared steps, record a lap. The last device
// result is read back and checked against the single-threaded reference.

use tracing::{info, warn};

use crate::bitonic::BitonicSort;
use crate::buffer::{DeviceBuffer, PingPong};
use crate::config::BenchConfig;
use crate::context::GpuContext;
use crate::data::InputGenerator;
use crate::error::{Error, Result};
use crate::kernel::dispatch_count;
use crate::matrix::{MatmulConfig, MatrixMultiplication, Transpose, TransposeVariant};
use crate::merge::MergeSort;
use crate::radix_sort::{RadixBuffers, RadixSort};
use crate::reduce::{Sum, SumVariant};
use crate::reference;
use crate::scan::{ScanAlgorithm, ScanEngine};
use crate::timer::Timer;
use crate::vector_add::VectorAdd;
use crate::verify::{self, RELATIVE_TOLERANCE};

pub const SORT_DEFAULT_SIZE: usize = 32 * 1024 * 1024;
pub const SUM_DEFAULT_SIZE: usize = 32 * 1024 * 1024;
pub const VECTOR_ADD_DEFAULT_SIZE: usize = 32 * 1024 * 1024;
pub const SCAN_MIN_SIZE: usize = 4096;
pub const SCAN_MAX_SIZE: usize = 1 << 24;
pub const TRANSPOSE_DEFAULT_SIDE: usize = 4096;
pub const MATMUL_DEFAULT_SIDE: usize = 1024;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    Scan,
    Bitonic,
    Merge,
    Radix,
    Sum,
    Transpose,
    Matmul,
    VectorAdd,
}

impl Suite {
    pub const ALL: [Suite; 8] = [
        Suite::Scan,
        Suite::Bitonic,
        Suite::Merge,
        Suite::Radix,
        Suite::Sum,
        Suite::Transpose,
        Suite::Matmul,
        Suite::VectorAdd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Suite::Scan => "scan",
            Suite::Bitonic => "bitonic",
            Suite::Merge => "merge",
            Suite::Radix => "radix",
            Suite::Sum => "sum",
            Suite::Transpose => "transpose",
            Suite::Matmul => "matmul",
            Suite::VectorAdd => "vector-add",
        }
    }

    pub fn run(&self, ctx: &GpuContext, config: &BenchConfig) -> Result<()> {
        match self {
            Suite::Scan => run_scan(ctx, config),
            Suite::Bitonic => run_bitonic(ctx, config),
            Suite::Merge => run_merge(ctx, config),
            Suite::Radix => run_radix(ctx, config),
            Suite::Sum => run_sum(ctx, config),
            Suite::Transpose => run_transpose(ctx, config),
            Suite::Matmul => run_matmul(ctx, config),
            Suite::VectorAdd => run_vector_add(ctx, config),
        }
    }
}

/// Trimmed lap statistics of one benchmarked variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub avg: f64,
    pub std: f64,
    pub laps: usize,
}

impl Measurement {
    pub fn from_timer(timer: &Timer) -> Self {
        Self {
            avg: timer.lap_avg(),
            std: timer.lap_std(),
            laps: timer.laps().len(),
        }
    }

    /// `amount` per second of average lap time.
    pub fn rate(&self, amount: f64) -> f64 {
        if self.avg > 0.0 {
            amount / self.avg
        } else {
            0.0
        }
    }

    pub fn report(&self, label: &str) {
        println!("{label}: {:.6}+-{:.6} s", self.avg, self.std);
    }

    pub fn report_millions(&self, label: &str, elements: usize) {
        self.report(label);
        println!("{label}: {:.2} millions/s", self.rate(elements as f64 / 1e6));
    }
}

/// Run `iteration` `iterations` times (at least once, so there is a result to verify),
/// recording a lap after each. The iteration restarts the timer itself once its untimed
/// setup is done.
pub fn measure(iterations: usize, mut iteration: impl FnMut(&mut Timer) -> Result<()>) -> Result<Measurement> {
    let mut timer = Timer::new();
    for _ in 0..iterations.max(1) {
        iteration(&mut timer)?;
        timer.next_lap();
    }
    Ok(Measurement::from_timer(&timer))
}

/// Time a host computation, returning its last result.
fn measure_host<T>(iterations: usize, mut compute: impl FnMut() -> T) -> (Measurement, Option<T>) {
    let mut timer = Timer::new();
    let mut last = None;
    for _ in 0..iterations {
        timer.restart();
        last = Some(compute());
        timer.next_lap();
    }
    (Measurement::from_timer(&timer), last)
}

/// Reject arrays the device cannot bind as one storage buffer.
fn check_binding_size<T>(ctx: &GpuContext, what: &'static str, len: usize) -> Result<()> {
    let bytes = (len * std::mem::size_of::<T>()) as u64;
    let limits = ctx.limits();
    let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    if bytes > limit {
        return Err(Error::InvalidLength {
            what,
            len,
            reason: "array exceeds the device's storage buffer binding limit",
        });
    }
    Ok(())
}

/// Host reference timings for a sort, returning the single-threaded result.
fn sort_references<T: Ord + Copy + Send>(values: &[T], config: &BenchConfig) -> Vec<T> {
    let (single, sorted) = measure_host(config.cpu_iterations.max(1), || reference::sort(values));
    single.report_millions("CPU", values.len());
    let (parallel, _) = measure_host(config.cpu_iterations, || reference::par_sort(values));
    if parallel.laps > 0 {
        parallel.report_millions("CPU rayon", values.len());
    }
    sorted.unwrap_or_default()
}

pub fn run_scan(ctx: &GpuContext, config: &BenchConfig) -> Result<()> {
    let sizes: Vec<usize> = match config.size {
        Some(n) => vec![n],
        None => std::iter::successors(Some(SCAN_MIN_SIZE), |n| Some(n * 4))
            .take_while(|&n| n <= SCAN_MAX_SIZE)
            .collect(),
    };
    let engine = ScanEngine::new(ctx)?;
    let mut gen = InputGenerator::new(config.seed);

    for n in sizes {
        check_binding_size::<u32>(ctx, "scan", n)?;
        let max_value = (i32::MAX as usize / n.max(1)).min(1023) as u32;
        println!("______________________________________________");
        println!("n={n} values in range: [0; {max_value}]");
        let values = gen.u32_range(n, 0, max_value);

        let (single, expected) = measure_host(config.cpu_iterations.max(1), || reference::prefix_sum(&values));
        single.report_millions("CPU", n);
        let (parallel, _) = measure_host(config.cpu_iterations, || reference::par_prefix_sum(&values));
        if parallel.laps > 0 {
            parallel.report_millions("CPU rayon", n);
        }
        let expected = expected.unwrap_or_default();

        let mut pair = PingPong::allocate(ctx, "scan", n);
        let steps = engine.plan_naive(ctx, &mut pair)?;
        let naive = measure(config.iterations, |timer| {
            pair.first().upload(ctx, &values)?;
            ctx.finish()?;
            timer.restart();
            ctx.run(&steps)
        })?;
        naive.report_millions("GPU", n);
        verify::compare_exact("naive scan", &expected, &pair.current().download(ctx)?)?;

        let data = DeviceBuffer::allocate(ctx, "scan_work_efficient", n);
        let steps = engine.plan_work_efficient(ctx, &data)?;
        let efficient = measure(config.iterations, |timer| {
            data.upload(ctx, &values)?;
            ctx.finish()?;
            timer.restart();
            ctx.run(&steps)
        })?;
        efficient.report_millions(&format!("GPU [{}]", ScanAlgorithm::WorkEfficient.name()), n);
        verify::compare_exact("work-efficient scan", &expected, &data.download(ctx)?)?;
        info!("Scan n={} verified", n);
    }
    Ok(())
}

pub fn run_bitonic(ctx: &GpuContext, config: &BenchConfig) -> Result<()> {
    let n = config.size_or(SORT_DEFAULT_SIZE);
    let padded_len = n.next_power_of_two();
    check_binding_size::<i32>(ctx, "bitonic sort", padded_len)?;

    let values = InputGenerator::new(config.seed).i32_any(n);
    info!("Data generated for n={}", n);
    let expected = sort_references(&values, config);

    let mut padded = values.clone();
    padded.resize(padded_len, i32::MAX);
    if padded_len != n {
        warn!("Bitonic input padded from {} to {} elements", n, padded_len);
    }

    let sorter = BitonicSort::new(ctx)?;
    let data = DeviceBuffer::allocate(ctx, "bitonic_data", padded_len);
    let steps = sorter.plan(ctx, &data)?;
    let gpu = measure(config.iterations, |timer| {
        data.upload(ctx, &padded)?;
        ctx.finish()?;
        timer.restart();
        ctx.run(&steps)
    })?;
    gpu.report_millions("GPU", n);

    let mut sorted = data.download(ctx)?;
    sorted.truncate(n);
    verify::compare_exact("bitonic sort", &expected, &sorted)?;
    info!("Bitonic sort verified");
    Ok(())
}

pub fn run_merge(ctx: &GpuContext, config: &BenchConfig) -> Result<()> {
    let n = config.size_or(SORT_DEFAULT_SIZE);
    check_binding_size::<i32>(ctx, "merge sort", n)?;

    let values = InputGenerator::new(config.seed).i32_any(n);
    info!("Data generated for n={}", n);
    let expected = sort_references(&values, config);

    let sorter = MergeSort::new(ctx)?;
    let mut pair = PingPong::allocate(ctx, "merge", n);
    let steps = sorter.plan(ctx, &mut pair)?;
    let gpu = measure(config.iterations, |timer| {
        pair.first().upload(ctx, &values)?;
        ctx.finish()?;
        timer.restart();
        ctx.run(&steps)
    })?;
    gpu.report_millions("GPU global", n);

    verify::compare_exact("merge sort", &expected, &pair.current().download(ctx)?)?;
    info!("Merge sort verified");
    Ok(())
}

pub fn run_radix(ctx: &GpuContext, config: &BenchConfig) -> Result<()> {
    let n = config.size_or(SORT_DEFAULT_SIZE);
    check_binding_size::<u32>(ctx, "radix sort", n)?;

    let values = InputGenerator::new(config.seed).u32_range(n, 0, i32::MAX as u32);
    info!("Data generated for n={}", n);
    let expected = sort_references(&values, config);

    let sorter = RadixSort::new(ctx)?;
    let mut buffers = RadixBuffers::allocate(ctx, sorter.layout(n as u32));
    let steps = sorter.plan(ctx, &mut buffers)?;
    info!(
        "Radix sort: {} workgroups, {} counters, {} digit bits, {} dispatches",
        buffers.layout.workgroups,
        buffers.layout.counters(),
        sorter.bits(),
        dispatch_count(&steps)
    );
    let gpu = measure(config.iterations, |timer| {
        buffers.keys.first().upload(ctx, &values)?;
        ctx.finish()?;
        timer.restart();
        ctx.run(&steps)
    })?;
    gpu.report_millions("GPU", n);

    verify::compare_exact("radix sort", &expected, &buffers.keys.current().download(ctx)?)?;
    info!("Radix sort verified");
    Ok(())
}

pub fn run_sum(ctx: &GpuContext, config: &BenchConfig) -> Result<()> {
    let n = config.size_or(SUM_DEFAULT_SIZE);
    check_binding_size::<u32>(ctx, "sum", n)?;

    let values = InputGenerator::new(config.seed).u32_range(n, 0, u32::MAX / n.max(1) as u32);
    info!("Data generated for n={}", n);

    let (single, expected) = measure_host(config.cpu_iterations.max(1), || reference::sum(&values));
    single.report_millions("CPU", n);
    let (parallel, _) = measure_host(config.cpu_iterations, || reference::par_sum(&values));
    if parallel.laps > 0 {
        parallel.report_millions("CPU rayon", n);
    }
    let expected = expected.unwrap_or_default();

    let input = DeviceBuffer::from_slice(ctx, "sum_values", &values)?;
    let total = DeviceBuffer::<u32>::allocate(ctx, "sum_total", 1);
    for variant in SumVariant::ALL {
        let kernel = Sum::new(ctx, variant)?;
        let steps = kernel.plan(ctx, &input, &total)?;
        let gpu = measure(config.iterations, |timer| {
            timer.restart();
            ctx.run(&steps)
        })?;
        gpu.report_millions(&format!("GPU {}", variant.entry_point()), n);

        let actual = total.download(ctx)?[0];
        verify::compare_value(variant.entry_point(), expected, actual)?;
    }
    info!("All sum variants verified");
    Ok(())
}

pub fn run_transpose(ctx: &GpuContext, config: &BenchConfig) -> Result<()> {
    let side = config.size_or(TRANSPOSE_DEFAULT_SIDE);
    let (rows, cols) = (side, side);
    check_binding_size::<f32>(ctx, "transpose", rows * cols)?;

    let values = InputGenerator::new(config.seed).f32_unit(rows * cols);
    info!("Data generated for M={}, K={}", rows, cols);

    let (single, expected) = measure_host(config.cpu_iterations.max(1), || reference::transpose(&values, rows, cols));
    single.report_millions("CPU", rows * cols);
    let (parallel, _) = measure_host(config.cpu_iterations, || reference::par_transpose(&values, rows, cols));
    if parallel.laps > 0 {
        parallel.report_millions("CPU rayon", rows * cols);
    }
    let expected = expected.unwrap_or_default();

    let src = DeviceBuffer::from_slice(ctx, "transpose_src", &values)?;
    let dst = DeviceBuffer::<f32>::allocate(ctx, "transpose_dst", rows * cols);
    for variant in TransposeVariant::ALL {
        let kernel = Transpose::new(ctx, variant, "f32")?;
        let step = kernel.plan(ctx, &src, &dst, rows as u32, cols as u32)?;
        let gpu = measure(config.iterations, |timer| {
            timer.restart();
            ctx.run(std::slice::from_ref(&step))
        })?;
        println!("[{}]", variant.entry_point());
        gpu.report_millions("    GPU", rows * cols);
        verify::compare_exact(variant.entry_point(), &expected, &dst.download(ctx)?)?;
    }
    Ok(())
}

pub fn run_matmul(ctx: &GpuContext, config: &BenchConfig) -> Result<()> {
    let side = config.size_or(MATMUL_DEFAULT_SIDE);
    let (m, k, n) = (side, side, side);
    check_binding_size::<f32>(ctx, "matrix multiplication", m * k)?;
    let gflops = 2.0 * (m * k * n) as f64 / 1e9;

    let mut gen = InputGenerator::new(config.seed);
    let a = gen.f32_unit(m * k);
    let b = gen.f32_unit(k * n);
    info!("Data generated for M={}, K={}, N={}", m, k, n);

    let (single, expected) = measure_host(config.cpu_iterations.max(1), || reference::matmul(&a, &b, m, k, n));
    single.report("CPU");
    println!("CPU: {:.3} GFlops", single.rate(gflops));
    let (parallel, _) = measure_host(config.cpu_iterations, || reference::par_matmul(&a, &b, m, k, n));
    if parallel.laps > 0 {
        parallel.report("CPU rayon");
        println!("CPU rayon: {:.3} GFlops", parallel.rate(gflops));
    }
    let expected = expected.unwrap_or_default();

    let a_gpu = DeviceBuffer::from_slice(ctx, "matmul_a", &a)?;
    let b_gpu = DeviceBuffer::from_slice(ctx, "matmul_b", &b)?;
    let c_gpu = DeviceBuffer::<f32>::allocate(ctx, "matmul_c", m * n);
    let limits = ctx.limits();

    for matmul_config in MatmulConfig::sweep() {
        let invocations = matmul_config.tile_size * matmul_config.tile_size / matmul_config.work_per_thread;
        if invocations > limits.max_compute_invocations_per_workgroup {
            warn!(
                "Skipping {}: {} invocations per workgroup exceed the device limit of {}",
                matmul_config.name(),
                invocations,
                limits.max_compute_invocations_per_workgroup
            );
            continue;
        }

        let kernel = MatrixMultiplication::new(ctx, matmul_config)?;
        let step = kernel.plan(ctx, &a_gpu, &b_gpu, &c_gpu, (m as u32, k as u32, n as u32))?;
        let gpu = measure(config.iterations, |timer| {
            timer.restart();
            ctx.run(std::slice::from_ref(&step))
        })?;

        println!("[{}]", matmul_config.name());
        gpu.report("    GPU");
        println!("    GPU: {:.3} GFlops", gpu.rate(gflops));

        let diff = verify::compare_relative(&matmul_config.name(), &expected, &c_gpu.download(ctx)?, RELATIVE_TOLERANCE)?;
        println!("    Average difference: {:.4}%", diff * 100.0);
    }
    Ok(())
}

pub fn run_vector_add(ctx: &GpuContext, config: &BenchConfig) -> Result<()> {
    let n = config.size_or(VECTOR_ADD_DEFAULT_SIZE);
    check_binding_size::<f32>(ctx, "vector add", n)?;

    let mut gen = InputGenerator::new(config.seed);
    let a = gen.f32_unit(n);
    let b = gen.f32_unit(n);
    info!("Data generated for n={}", n);

    let (single, expected) = measure_host(config.cpu_iterations.max(1), || reference::vector_add(&a, &b));
    single.report_millions("CPU", n);
    let (parallel, _) = measure_host(config.cpu_iterations, || reference::par_vector_add(&a, &b));
    if parallel.laps > 0 {
        parallel.report_millions("CPU rayon", n);
    }
    let expected = expected.unwrap_or_default();

    let adder = VectorAdd::new(ctx)?;
    let a_gpu = DeviceBuffer::from_slice(ctx, "aplusb_a", &a)?;
    let b_gpu = DeviceBuffer::from_slice(ctx, "aplusb_b", &b)?;
    let c_gpu = DeviceBuffer::<f32>::allocate(ctx, "aplusb_c", n);
    let step = adder.plan(ctx, &a_gpu, &b_gpu, &c_gpu)?;
    ctx.finish()?;

    let gpu = measure(config.iterations, |timer| {
        timer.restart();
        ctx.run(std::slice::from_ref(&step))
    })?;
    gpu.report("Kernel average time");
    println!("GFlops: {:.3}", gpu.rate(n as f64 / 1e9));
    println!(
        "VRAM bandwidth: {:.3} GB/s",
        gpu.rate(3.0 * (n * std::mem::size_of::<f32>()) as f64 / GIB)
    );

    let mut result = vec![0.0f32; n];
    let transfer = measure(config.iterations, |timer| {
        timer.restart();
        c_gpu.download_into(ctx, &mut result)
    })?;
    transfer.report("Result data transfer time");
    println!(
        "VRAM -> RAM bandwidth: {:.3} GB/s",
        transfer.rate((n * std::mem::size_of::<f32>()) as f64 / GIB)
    );

    verify::compare_exact("vector add", &expected, &result)?;
    info!("Vector add verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_records_one_lap_per_iteration() {
        let mut calls = 0;
        let m = measure(7, |timer| {
            calls += 1;
            timer.restart();
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 7);
        assert_eq!(m.laps, 7);
        assert!(m.avg >= 0.0);

        let m = measure(0, |_| Ok(())).unwrap();
        assert_eq!(m.laps, 1);
    }

    #[test]
    fn test_measure_stops_on_error() {
        let mut calls = 0;
        let result = measure(5, |_| {
            calls += 1;
            Err(Error::InvalidLength {
                what: "test",
                len: 3,
                reason: "always fails",
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_rate() {
        let m = Measurement {
            avg: 0.5,
            std: 0.0,
            laps: 1,
        };
        assert_eq!(m.rate(10.0), 20.0);
        let zero = Measurement { avg: 0.0, ..m };
        assert_eq!(zero.rate(10.0), 0.0);
    }

    #[test]
    fn test_measure_host_returns_last_result() {
        let mut i = 0;
        let (m, last) = measure_host(3, || {
            i += 1;
            i
        });
        assert_eq!(m.laps, 3);
        assert_eq!(last, Some(3));
        let (m, last) = measure_host(0, || 1);
        assert_eq!(m.laps, 0);
        assert_eq!(last, None);
    }

    #[test]
    fn test_suite_names_are_unique() {
        let mut names: Vec<&str> = Suite::ALL.iter().map(|s| s.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Suite::ALL.len());
    }
}
