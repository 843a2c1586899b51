// GPU device context
// One adapter, one device, one in-order queue. Created once per benchmark run and
// passed explicitly to every orchestrator; dropping it releases the device.

use tracing::info;

use crate::config::DeviceConfig;
use crate::error::Result;
use crate::kernel::Step;

pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
}

impl GpuContext {
    /// Select an adapter and open a device, blocking until both are ready.
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        pollster::block_on(Self::new_async(config))
    }

    pub async fn new_async(config: &DeviceConfig) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                force_fallback_adapter: config.force_fallback_adapter,
                compatible_surface: None,
            })
            .await?;

        let adapter_info = adapter.get_info();
        info!(
            "Using adapter: {} ({:?}, {:?})",
            adapter_info.name, adapter_info.device_type, adapter_info.backend
        );

        // Take everything the adapter offers: large benchmark arrays need the
        // bigger storage binding limits, not the conservative defaults.
        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("gpgpu_bench_device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        Ok(Self {
            device,
            queue,
            adapter_info,
            limits,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// Encode `steps` into one command buffer and submit it.
    ///
    /// Every dispatch runs in its own compute pass, so each one observes the
    /// completed writes of the steps before it.
    pub fn submit(&self, steps: &[Step]) -> wgpu::SubmissionIndex {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gpgpu_steps"),
            });
        for step in steps {
            step.encode(&mut encoder);
        }
        self.queue.submit(Some(encoder.finish()))
    }

    /// Block until the given submission has finished executing.
    pub fn wait(&self, submission: wgpu::SubmissionIndex) -> Result<()> {
        self.device
            .poll(wgpu::PollType::WaitForSubmissionIndex(submission))?;
        Ok(())
    }

    /// Submit and wait.
    pub fn run(&self, steps: &[Step]) -> Result<()> {
        let submission = self.submit(steps);
        self.wait(submission)
    }

    /// Wait for all outstanding work, including queued buffer writes.
    pub fn finish(&self) -> Result<()> {
        self.queue.submit(std::iter::empty());
        self.device.poll(wgpu::PollType::Wait)?;
        Ok(())
    }
}
