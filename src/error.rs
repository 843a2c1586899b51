// Error taxonomy for device setup, kernel compilation, transfers and result checks.
// Nothing here is retried: every variant aborts the benchmark configuration it came from.

use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// One position where a device result disagrees with the host reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub index: usize,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] expected {} but got {}", self.index, self.expected, self.actual)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no suitable GPU adapter found: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("failed to build kernel `{entry_point}`:\n{log}")]
    Compile { entry_point: String, log: String },

    #[error("transfer size mismatch on `{label}`: buffer holds {expected} elements, host array has {actual}")]
    Transfer { label: String, expected: usize, actual: usize },

    #[error("readback of `{label}` failed: {source}")]
    Map {
        label: String,
        #[source]
        source: wgpu::BufferAsyncError,
    },

    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("{what}: GPU results differ from CPU results at {total} positions, first: {}", format_mismatches(.mismatches))]
    Consistency {
        what: String,
        mismatches: Vec<Mismatch>,
        total: usize,
    },

    #[error("{what}: average relative difference {average_relative_difference:.4} exceeds {threshold}")]
    Tolerance {
        what: String,
        average_relative_difference: f64,
        threshold: f64,
    },

    #[error("{what}: invalid length {len} ({reason})")]
    InvalidLength {
        what: &'static str,
        len: usize,
        reason: &'static str,
    },

    #[error("work size {global:?} / {group:?} needs {workgroups} workgroups, device allows {limit} per dimension")]
    WorkSize {
        group: [u32; 3],
        global: [u32; 3],
        workgroups: u64,
        limit: u32,
    },
}

fn format_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
