//! WebGPU Client implementation.
//!
//! `WgpuClient` owns the WebGPU device and queue. It is the compute backend
//! every kernel is set up against: it allocates and fills buffers, hands out
//! the shared pipeline cache, records kernels into command buffers and reads
//! results back to the host.
//!
//! # Thread Safety
//!
//! `WgpuClient` is `Clone` and the underlying wgpu::Device and wgpu::Queue
//! are already `Send + Sync` by design.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use wgpu::util::DeviceExt;
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Queue};

use super::buffer::{GpuBuffer, device_size};
use super::device::{WgpuDevice, WgpuError, query_adapter_info_blocking};
use super::shaders::PipelineCache;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::kernel::Kernel;

/// How long a blocking wait on the queue may take before it is reported.
const WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// WebGPU compute client.
///
/// Owns the device and queue for kernel dispatch. All kernels submitted
/// through [`WgpuClient::run`] share this client's queue, so submissions
/// complete in the order they were made.
#[derive(Clone)]
pub struct WgpuClient {
    pub(crate) device_id: WgpuDevice,
    pub(crate) wgpu_device: Arc<Device>,
    pub(crate) queue: Arc<Queue>,
    pub(crate) pipeline_cache: Arc<PipelineCache>,
}

impl std::fmt::Debug for WgpuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuClient")
            .field("device", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl WgpuClient {
    /// Create a new WebGPU client for a device.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No suitable GPU adapter is found
    /// - Device creation fails
    pub fn new(device: WgpuDevice) -> std::result::Result<Self, WgpuError> {
        let (adapter, info) = query_adapter_info_blocking(device.index)?;

        // Request the adapter's own limits: the reduction engine and the
        // grid validation size themselves against them.
        let (wgpu_device, queue) = pollster::block_on(async {
            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("wgstat WebGPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                    experimental_features: wgpu::ExperimentalFeatures::default(),
                })
                .await
        })
        .map_err(|e| WgpuError::DeviceError(format!("{:?}", e)))?;

        let wgpu_device = Arc::new(wgpu_device);
        let queue = Arc::new(queue);
        let pipeline_cache = Arc::new(PipelineCache::new(wgpu_device.clone()));
        let device_with_info = WgpuDevice::with_info(device.index, info);

        debug!(device = ?device_with_info, "created WebGPU client");

        Ok(Self {
            device_id: device_with_info,
            wgpu_device,
            queue,
            pipeline_cache,
        })
    }

    /// Device this client was created for.
    #[inline]
    pub fn device(&self) -> &WgpuDevice {
        &self.device_id
    }

    /// Get reference to the WebGPU device.
    #[inline]
    pub fn wgpu_device(&self) -> &Device {
        &self.wgpu_device
    }

    /// Get reference to the WebGPU queue.
    #[inline]
    pub fn wgpu_queue(&self) -> &Queue {
        &self.queue
    }

    /// Get reference to the pipeline cache.
    #[inline]
    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipeline_cache
    }

    /// Limits the device was created with.
    #[inline]
    pub fn limits(&self) -> wgpu::Limits {
        self.wgpu_device.limits()
    }

    /// Required byte alignment for dynamic uniform buffer offsets.
    pub fn min_uniform_offset_alignment(&self) -> u32 {
        self.limits().min_uniform_buffer_offset_alignment
    }

    /// Largest workgroup count allowed along any one grid dimension.
    pub fn max_workgroups_per_dimension(&self) -> u32 {
        self.limits().max_compute_workgroups_per_dimension
    }

    // ------------------------------------------------------------------------
    // Raw buffers
    // ------------------------------------------------------------------------

    /// Create a storage buffer that compute shaders can read and write.
    pub fn create_storage_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    /// Create a staging buffer for CPU readback.
    pub fn create_staging_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a uniform buffer for shader parameters.
    pub fn create_uniform_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Write data to the start of a buffer.
    pub fn write_buffer<T: bytemuck::Pod>(&self, buffer: &Buffer, data: &[T]) {
        self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(data));
    }

    // ------------------------------------------------------------------------
    // Typed buffers
    // ------------------------------------------------------------------------

    /// Allocate a zero-initialized storage buffer of `len` elements of `T`.
    pub fn alloc<T: Element>(&self, label: &str, len: usize) -> GpuBuffer {
        self.alloc_dtype(label, len, T::DTYPE)
    }

    /// Allocate a zero-initialized storage buffer with a runtime dtype.
    pub fn alloc_dtype(&self, label: &str, len: usize, dtype: DType) -> GpuBuffer {
        let raw = self.create_storage_buffer(label, device_size(len, dtype));
        GpuBuffer::new(raw, len, dtype)
    }

    /// Allocate a storage buffer holding a copy of `data`.
    pub fn upload<T: Element>(&self, label: &str, data: &[T]) -> GpuBuffer {
        if data.is_empty() {
            return self.alloc::<T>(label, 0);
        }
        let raw = self
            .wgpu_device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            });
        GpuBuffer::new(raw, data.len(), T::DTYPE)
    }

    /// Allocate a uniform buffer holding `words`.
    pub(crate) fn upload_uniform(&self, label: &str, words: &[u32]) -> GpuBuffer {
        let raw = self.create_uniform_buffer(label, device_size(words.len(), DType::U32));
        self.write_buffer(&raw, words);
        GpuBuffer::new(raw, words.len(), DType::U32)
    }

    /// Overwrite part of a buffer, starting at element `offset`.
    ///
    /// The write is ordered before any work submitted afterwards.
    pub fn write<T: Element>(&self, buffer: &GpuBuffer, offset: usize, data: &[T]) -> Result<()> {
        if buffer.dtype() != T::DTYPE {
            return Err(Error::DTypeMismatch {
                kernel: "write",
                buffer: "destination",
                expected: T::DTYPE.to_string(),
                got: buffer.dtype(),
            });
        }
        if offset + data.len() > buffer.len() {
            return Err(Error::BufferSize {
                kernel: "write",
                buffer: "destination",
                expected: offset + data.len(),
                got: buffer.len(),
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        let byte_offset = (offset * T::DTYPE.size_in_bytes()) as u64;
        self.queue
            .write_buffer(&buffer.raw, byte_offset, bytemuck::cast_slice(data));
        Ok(())
    }

    /// Copy a buffer's logical contents back to the host (blocking).
    pub fn read_back<T: Element>(&self, buffer: &GpuBuffer) -> Result<Vec<T>> {
        if buffer.dtype() != T::DTYPE {
            return Err(Error::DTypeMismatch {
                kernel: "read_back",
                buffer: "source",
                expected: T::DTYPE.to_string(),
                got: buffer.dtype(),
            });
        }
        if buffer.is_empty() {
            return Ok(Vec::new());
        }

        let size = buffer.size_in_bytes();
        let staging = self.create_staging_buffer("read_back_staging", size);
        let mut encoder = self
            .wgpu_device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("read_back"),
            });
        encoder.copy_buffer_to_buffer(&buffer.raw, 0, &staging, 0, size);
        self.submit_and_wait(encoder)?;

        let mut out = vec![T::zero(); buffer.len()];
        self.read_buffer(&staging, &mut out)?;
        staging.destroy();
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------------

    /// Record `kernels` in order into one compute pass, submit, and wait.
    ///
    /// Dispatches recorded earlier in the pass are complete and visible to
    /// later ones. If any kernel fails to encode, nothing is submitted.
    pub fn run(&self, label: &str, kernels: &[&dyn Kernel]) -> Result<()> {
        let mut encoder = self
            .wgpu_device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            for kernel in kernels {
                trace!(step = label, kernel = kernel.label(), "encode");
                kernel.encode(&mut pass)?;
            }
        }
        self.submit_and_wait(encoder)
    }

    /// Submit commands and wait for completion.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: Some(WAIT_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed waiting for submission: {e}")))?;
        Ok(())
    }

    /// Read a mapped staging buffer into `output` (blocking).
    pub fn read_buffer<T: bytemuck::Pod>(&self, staging: &Buffer, output: &mut [T]) -> Result<()> {
        let slice = staging.slice(..);

        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(WAIT_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed during buffer read: {e}")))?;

        let map_result = receiver.recv().map_err(|_| {
            Error::Backend("map_async callback was not invoked during buffer read".into())
        })?;
        map_result
            .map_err(|e| Error::Backend(format!("map_async failed during buffer read: {e}")))?;

        {
            let data = slice.get_mapped_range();
            let src: &[T] = bytemuck::cast_slice(&data);
            output.copy_from_slice(&src[..output.len()]);
        }

        staging.unmap();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgpu_client_creation() {
        match WgpuClient::new(WgpuDevice::new(0)) {
            Ok(client) => {
                println!("Client created for: {:?}", client.device());
                assert!(client.min_uniform_offset_alignment() >= 1);
                assert!(client.max_workgroups_per_dimension() >= 1);
            }
            Err(e) => {
                println!("No GPU available, skipping test: {}", e);
            }
        }
    }

    #[test]
    fn test_wgpu_buffer_roundtrip() {
        let Ok(client) = WgpuClient::new(WgpuDevice::new(0)) else {
            println!("No GPU available, skipping test");
            return;
        };
        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
        let buffer = client.upload("roundtrip", &data);
        assert_eq!(buffer.len(), 4);
        assert_eq!(client.read_back::<f32>(&buffer).unwrap(), data);

        client.write(&buffer, 2, &[7.0f32]).unwrap();
        assert_eq!(
            client.read_back::<f32>(&buffer).unwrap(),
            vec![1.0, 2.0, 7.0, 4.0]
        );
    }

    #[test]
    fn test_write_rejects_overflow_and_dtype() {
        let Ok(client) = WgpuClient::new(WgpuDevice::new(0)) else {
            println!("No GPU available, skipping test");
            return;
        };
        let buffer = client.alloc::<u32>("small", 2);
        assert!(matches!(
            client.write(&buffer, 1, &[1u32, 2]),
            Err(Error::BufferSize { expected: 3, got: 2, .. })
        ));
        assert!(matches!(
            client.write(&buffer, 0, &[1.0f32]),
            Err(Error::DTypeMismatch { .. })
        ));
        assert!(client.read_back::<u32>(&client.alloc::<u32>("empty", 0)).unwrap().is_empty());
    }
}
