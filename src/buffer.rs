// Typed device arrays and ping-pong pairs
// Uploads go through the queue; downloads copy into a MAP_READ staging buffer and
// block until the mapping completes.

use std::marker::PhantomData;

use bytemuck::Pod;
use tracing::debug;

use crate::context::GpuContext;
use crate::error::{Error, Result};

/// Fixed-length array of `T` resident in device memory.
pub struct DeviceBuffer<T: Pod> {
    raw: wgpu::Buffer,
    len: usize,
    label: String,
    _marker: PhantomData<T>,
}

impl<T: Pod> DeviceBuffer<T> {
    /// Allocate `len` zero-initialized elements.
    pub fn allocate(ctx: &GpuContext, label: &str, len: usize) -> Self {
        // Storage bindings must not be empty, so even zero-length arrays get one word.
        let size = byte_size::<T>(len).max(4);
        let raw = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        debug!("Allocated `{}`: {} elements ({} bytes)", label, len, size);
        Self {
            raw,
            len,
            label: label.to_string(),
            _marker: PhantomData,
        }
    }

    /// Allocate and fill from a host slice.
    pub fn from_slice(ctx: &GpuContext, label: &str, data: &[T]) -> Result<Self> {
        let buffer = Self::allocate(ctx, label, data.len());
        buffer.upload(ctx, data)?;
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    /// Queue a write of the whole array. It lands before the next submission executes.
    pub fn upload(&self, ctx: &GpuContext, data: &[T]) -> Result<()> {
        self.check_len(data.len())?;
        if !data.is_empty() {
            ctx.queue().write_buffer(&self.raw, 0, bytemuck::cast_slice(data));
        }
        Ok(())
    }

    /// Read the whole array back to the host.
    pub fn download(&self, ctx: &GpuContext) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.len];
        self.download_into(ctx, &mut out)?;
        Ok(out)
    }

    pub fn download_into(&self, ctx: &GpuContext, out: &mut [T]) -> Result<()> {
        self.check_len(out.len())?;
        if out.is_empty() {
            return Ok(());
        }

        let size = byte_size::<T>(self.len);
        let staging = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(&self.raw, 0, &staging, 0, size);
        let submission = ctx.queue().submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        ctx.wait(submission)?;

        let mapped = pollster::block_on(receiver)
            .unwrap_or(Err(wgpu::BufferAsyncError))
            .map_err(|source| Error::Map {
                label: self.label.clone(),
                source,
            });
        mapped?;

        {
            let data = slice.get_mapped_range();
            out.copy_from_slice(bytemuck::cast_slice(&data));
        }
        staging.unmap();
        Ok(())
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        if actual != self.len {
            return Err(Error::Transfer {
                label: self.label.clone(),
                expected: self.len,
                actual,
            });
        }
        Ok(())
    }
}

fn byte_size<T>(len: usize) -> u64 {
    (len * std::mem::size_of::<T>()) as u64
}

/// Two equally sized buffers used as alternating read/write targets.
///
/// Swapping flips an index; both buffers stay alive for the lifetime of the pair.
pub struct PingPong<T: Pod> {
    buffers: [DeviceBuffer<T>; 2],
    current: usize,
}

impl<T: Pod> PingPong<T> {
    pub fn allocate(ctx: &GpuContext, label: &str, len: usize) -> Self {
        Self {
            buffers: [
                DeviceBuffer::allocate(ctx, &format!("{label}_a"), len),
                DeviceBuffer::allocate(ctx, &format!("{label}_b"), len),
            ],
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The buffer holding the valid array state.
    pub fn current(&self) -> &DeviceBuffer<T> {
        &self.buffers[self.current]
    }

    /// The buffer the next pass writes into.
    pub fn next(&self) -> &DeviceBuffer<T> {
        &self.buffers[1 - self.current]
    }

    /// The buffer that is current after `reset`; benchmark inputs are uploaded here.
    pub fn first(&self) -> &DeviceBuffer<T> {
        &self.buffers[0]
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}
