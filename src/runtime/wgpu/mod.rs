//! WebGPU compute backend
//!
//! Device discovery, the client that allocates buffers and submits work,
//! the pipeline cache and the WGSL generators behind every kernel.

mod buffer;
mod cache;
mod client;
mod device;
pub mod shaders;

pub use buffer::GpuBuffer;
pub use cache::{default_client, get_or_create_client, is_wgpu_available};
pub use client::WgpuClient;
pub use device::{WgpuDevice, WgpuError};
