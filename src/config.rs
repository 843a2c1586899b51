// Run configuration: device selection and benchmark parameters

/// How the adapter is chosen.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub power_preference: wgpu::PowerPreference,
    /// Use the software adapter, if one is available.
    pub force_fallback_adapter: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

/// Parameters shared by every benchmark suite.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Timed device iterations per measurement.
    pub iterations: usize,
    /// Timed host reference iterations per measurement.
    pub cpu_iterations: usize,
    pub seed: u64,
    /// Overrides each suite's default problem size.
    pub size: Option<usize>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            cpu_iterations: 1,
            seed: 239,
            size: None,
        }
    }
}

impl BenchConfig {
    pub fn size_or(&self, default: usize) -> usize {
        self.size.unwrap_or(default)
    }
}

/// Parse sizes like "1000", "64K", "16M" (binary multiples).
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.chars().last() {
        Some('K') | Some('k') => (&s[..s.len() - 1], 1024),
        Some('M') | Some('m') => (&s[..s.len() - 1], 1024 * 1024),
        _ => (s, 1),
    };
    let value: usize = digits
        .parse()
        .map_err(|e| format!("invalid size `{s}`: {e}"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size `{s}` overflows"))
}
