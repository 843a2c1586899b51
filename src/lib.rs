// GPGPU benchmark suite on wgpu compute
// Multi-pass array primitives (scan, bitonic sort, merge sort, radix sort) plus reduction,
// matrix and vector kernels, each checked against host references.

pub mod bench;
pub mod bitonic;
pub mod buffer;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod kernel;
pub mod matrix;
pub mod merge;
pub mod radix_sort;
pub mod reduce;
pub mod reference;
pub mod scan;
pub mod shaders;
pub mod timer;
pub mod vector_add;
pub mod verify;

// Re-exports
pub use bitonic::BitonicSort;
pub use buffer::{DeviceBuffer, PingPong};
pub use config::{BenchConfig, DeviceConfig};
pub use context::GpuContext;
pub use error::{Error, Mismatch, Result};
pub use kernel::{Defines, Kernel, Step, WorkSize};
pub use merge::MergeSort;
pub use radix_sort::{RadixBuffers, RadixLayout, RadixSort};
pub use scan::{ScanAlgorithm, ScanEngine};
pub use timer::Timer;
