//! Global client cache for the WebGPU runtime

use super::client::WgpuClient;
use super::device::{WgpuDevice, WgpuError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global client cache: device index -> cached WgpuClient
static CLIENT_CACHE: OnceLock<Mutex<HashMap<usize, WgpuClient>>> = OnceLock::new();

/// Get or create a cached WgpuClient for a device.
///
/// Only one `wgpu::Device` exists per device index. wgpu buffers belong to
/// the device that created them and cannot be bound on another one, so every
/// kernel and buffer that should interoperate must come from the same client.
pub fn get_or_create_client(device: &WgpuDevice) -> Result<WgpuClient, WgpuError> {
    let cache = CLIENT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock();

    if let Some(client) = guard.get(&device.index) {
        return Ok(client.clone());
    }

    let client = WgpuClient::new(device.clone())?;
    guard.insert(device.index, client.clone());
    Ok(client)
}

/// Cached client for the first adapter.
pub fn default_client() -> Result<WgpuClient, WgpuError> {
    get_or_create_client(&WgpuDevice::new(0))
}

/// Check whether any WebGPU adapter can be acquired.
pub fn is_wgpu_available() -> bool {
    super::device::query_adapter_info_blocking(0).is_ok()
}
