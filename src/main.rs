use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gpgpu_bench::bench::Suite;
use gpgpu_bench::config::{parse_size, BenchConfig, DeviceConfig};
use gpgpu_bench::GpuContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SuiteArg {
    Scan,
    Bitonic,
    Merge,
    Radix,
    Sum,
    Transpose,
    Matmul,
    VectorAdd,
    All,
}

impl SuiteArg {
    fn suites(&self) -> Vec<Suite> {
        match self {
            SuiteArg::Scan => vec![Suite::Scan],
            SuiteArg::Bitonic => vec![Suite::Bitonic],
            SuiteArg::Merge => vec![Suite::Merge],
            SuiteArg::Radix => vec![Suite::Radix],
            SuiteArg::Sum => vec![Suite::Sum],
            SuiteArg::Transpose => vec![Suite::Transpose],
            SuiteArg::Matmul => vec![Suite::Matmul],
            SuiteArg::VectorAdd => vec![Suite::VectorAdd],
            SuiteArg::All => Suite::ALL.to_vec(),
        }
    }
}

/// Suites in command-line order, each at most once.
fn selected_suites(args: &[SuiteArg]) -> Vec<Suite> {
    if args.is_empty() {
        return Suite::ALL.to_vec();
    }
    let mut suites = Vec::new();
    for suite in args.iter().flat_map(|arg| arg.suites()) {
        if !suites.contains(&suite) {
            suites.push(suite);
        }
    }
    suites
}

/// Benchmarks and validates data-parallel primitives on the GPU
#[derive(Parser, Debug)]
#[command(name = "gpgpu-bench", version, about)]
struct Args {
    /// Suites to run; none means all
    #[arg(value_enum, value_name = "SUITES")]
    suites: Vec<SuiteArg>,

    /// Problem size override (e.g. 1000, 64K, 16M). Matrix suites read it as the side length.
    #[arg(long, value_parser = parse_size)]
    size: Option<usize>,

    /// Timed GPU iterations per variant
    #[arg(long, default_value_t = 10)]
    iters: usize,

    /// Timed CPU reference iterations
    #[arg(long, default_value_t = 1)]
    cpu_iters: usize,

    /// Input generator seed
    #[arg(long, default_value_t = 239)]
    seed: u64,

    /// Prefer the low-power adapter
    #[arg(long)]
    low_power: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let device_config = DeviceConfig {
        power_preference: if args.low_power {
            wgpu::PowerPreference::LowPower
        } else {
            wgpu::PowerPreference::HighPerformance
        },
        ..Default::default()
    };
    let bench_config = BenchConfig {
        iterations: args.iters,
        cpu_iterations: args.cpu_iters,
        seed: args.seed,
        size: args.size,
    };

    let ctx = match GpuContext::new(&device_config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let suites = selected_suites(&args.suites);

    let mut failed = 0;
    for suite in &suites {
        println!();
        println!("=== {} ===", suite.name());
        match suite.run(&ctx, &bench_config) {
            Ok(()) => info!("Suite `{}` passed", suite.name()),
            Err(e) => {
                error!("Suite `{}` failed: {}", suite.name(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        error!("{} of {} suites failed", failed, suites.len());
        std::process::exit(1);
    }
}
