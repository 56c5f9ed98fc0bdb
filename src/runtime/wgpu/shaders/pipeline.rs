//! WGSL compute pipeline infrastructure
//!
//! Pipeline caching, bind group construction and the recorded dispatch
//! type every kernel replays from `encode`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBinding, BufferBindingType,
    BufferSize, ComputePass, ComputePipeline, ComputePipelineDescriptor, Device,
    PipelineLayoutDescriptor, ShaderModule, ShaderModuleDescriptor, ShaderSource, ShaderStages,
};

use crate::error::{Error, Result};

/// Size in bytes of one dimension record in a uniform buffer (`vec4<u32>`).
pub const DIMS_RECORD_SIZE: u64 = 16;

// ============================================================================
// Pipeline Cache
// ============================================================================

/// Cache for shader modules, pipelines and bind group layouts.
///
/// Module names encode everything baked into the generated source (dtype,
/// threads per block, constants), so a name identifies one WGSL program.
pub struct PipelineCache {
    device: Arc<Device>,
    modules: Mutex<HashMap<String, Arc<ShaderModule>>>,
    pipelines: Mutex<HashMap<(String, &'static str), Arc<ComputePipeline>>>,
    layouts: Mutex<HashMap<LayoutKey, Arc<BindGroupLayout>>>,
}

/// Key for the bind group layout cache.
///
/// Bindings are numbered read-only storage first, then read-write storage,
/// then the uniform buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    /// Number of read-only storage buffers
    pub num_readonly_storage: u32,
    /// Number of read-write storage buffers
    pub num_storage_buffers: u32,
    /// Number of uniform buffers
    pub num_uniform_buffers: u32,
    /// Whether the last uniform buffer is bound with a dynamic offset
    pub dynamic_uniform: bool,
}

impl LayoutKey {
    /// Layout with `readonly` inputs, `storage` outputs and one plain uniform.
    pub const fn with_params(readonly: u32, storage: u32) -> Self {
        Self {
            num_readonly_storage: readonly,
            num_storage_buffers: storage,
            num_uniform_buffers: 1,
            dynamic_uniform: false,
        }
    }

    fn total(&self) -> u32 {
        self.num_readonly_storage + self.num_storage_buffers + self.num_uniform_buffers
    }
}

impl PipelineCache {
    /// Create a new pipeline cache
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            modules: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            layouts: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create a shader module.
    ///
    /// `source` is only invoked when `name` has not been compiled yet.
    pub fn get_or_create_module(
        &self,
        name: &str,
        source: impl FnOnce() -> String,
    ) -> Arc<ShaderModule> {
        let mut modules = self.modules.lock();
        if let Some(module) = modules.get(name) {
            return module.clone();
        }

        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source().into()),
        });

        let module = Arc::new(module);
        modules.insert(name.to_string(), module.clone());
        module
    }

    /// Get or create a compute pipeline
    pub fn get_or_create_pipeline(
        &self,
        shader_name: &str,
        entry_point: &'static str,
        module: &ShaderModule,
        layout: &BindGroupLayout,
    ) -> Arc<ComputePipeline> {
        let key = (shader_name.to_string(), entry_point);
        let mut pipelines = self.pipelines.lock();

        if let Some(pipeline) = pipelines.get(&key) {
            return pipeline.clone();
        }

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{}_layout", shader_name)),
                bind_group_layouts: &[layout],
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(&format!("{}_{}", shader_name, entry_point)),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });

        let pipeline = Arc::new(pipeline);
        pipelines.insert(key, pipeline.clone());
        pipeline
    }

    /// Get or create a bind group layout
    pub fn get_or_create_layout(&self, key: LayoutKey) -> Arc<BindGroupLayout> {
        let mut layouts = self.layouts.lock();

        if let Some(layout) = layouts.get(&key) {
            return layout.clone();
        }

        let mut entries = Vec::with_capacity(key.total() as usize);
        let storage = |binding, read_only| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        for i in 0..key.num_readonly_storage {
            entries.push(storage(i, true));
        }
        for i in 0..key.num_storage_buffers {
            entries.push(storage(key.num_readonly_storage + i, false));
        }

        let first_uniform = key.num_readonly_storage + key.num_storage_buffers;
        for i in 0..key.num_uniform_buffers {
            let dynamic = key.dynamic_uniform && i + 1 == key.num_uniform_buffers;
            entries.push(BindGroupLayoutEntry {
                binding: first_uniform + i,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: dynamic,
                    min_binding_size: BufferSize::new(DIMS_RECORD_SIZE),
                },
                count: None,
            });
        }

        let layout = self
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("wgstat_layout"),
                entries: &entries,
            });

        let layout = Arc::new(layout);
        layouts.insert(key, layout.clone());
        layout
    }

    /// Create a bind group binding each buffer in full, in binding order
    pub fn create_bind_group(&self, layout: &BindGroupLayout, buffers: &[&Buffer]) -> BindGroup {
        let entries: Vec<BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("compute_bind_group"),
            layout,
            entries: &entries,
        })
    }

    /// Create a bind group whose final binding is one dimension record of a
    /// dynamically offset uniform buffer.
    pub fn create_bind_group_dynamic(
        &self,
        layout: &BindGroupLayout,
        buffers: &[&Buffer],
        records: &Buffer,
    ) -> BindGroup {
        let mut entries: Vec<BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        entries.push(BindGroupEntry {
            binding: buffers.len() as u32,
            resource: BindingResource::Buffer(BufferBinding {
                buffer: records,
                offset: 0,
                size: BufferSize::new(DIMS_RECORD_SIZE),
            }),
        });

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("dynamic_bind_group"),
            layout,
            entries: &entries,
        })
    }
}

// ============================================================================
// Recorded dispatches
// ============================================================================

/// One compute dispatch prepared at `setup` and replayed by `encode`.
pub struct Dispatch {
    pipeline: Arc<ComputePipeline>,
    bind_group: BindGroup,
    dynamic_offset: Option<u32>,
    grid: [u32; 3],
}

impl Dispatch {
    /// Dispatch with a statically bound bind group.
    pub fn new(pipeline: Arc<ComputePipeline>, bind_group: BindGroup, grid: [u32; 3]) -> Self {
        Self {
            pipeline,
            bind_group,
            dynamic_offset: None,
            grid,
        }
    }

    /// Dispatch selecting its dimension record at `offset` bytes.
    pub fn with_offset(
        pipeline: Arc<ComputePipeline>,
        bind_group: BindGroup,
        offset: u32,
        grid: [u32; 3],
    ) -> Self {
        Self {
            pipeline,
            bind_group,
            dynamic_offset: Some(offset),
            grid,
        }
    }

    /// Workgroup grid of this dispatch.
    pub fn grid(&self) -> [u32; 3] {
        self.grid
    }

    /// Record the dispatch into a compute pass.
    pub fn record(&self, pass: &mut ComputePass<'_>) {
        pass.set_pipeline(&self.pipeline);
        match self.dynamic_offset {
            Some(offset) => pass.set_bind_group(0, Some(&self.bind_group), &[offset]),
            None => pass.set_bind_group(0, Some(&self.bind_group), &[]),
        }
        let [x, y, z] = self.grid;
        pass.dispatch_workgroups(x, y, z);
    }
}

// ============================================================================
// Dispatch Helpers
// ============================================================================

/// Number of workgroups needed to cover `n` items at `per_group` items each
#[inline]
pub fn workgroup_count(n: usize, per_group: u32) -> usize {
    n.div_ceil(per_group as usize)
}

/// Check a workgroup grid against the device's per-dimension limit.
pub fn checked_grid(
    operation: &'static str,
    grid: [usize; 3],
    max_per_dimension: u32,
) -> Result<[u32; 3]> {
    let mut out = [0u32; 3];
    for (axis, (&count, slot)) in grid.iter().zip(out.iter_mut()).enumerate() {
        if count > max_per_dimension as usize {
            return Err(Error::backend_limitation(
                "wgpu",
                operation,
                format!(
                    "grid dimension {axis} needs {count} workgroups, device allows {max_per_dimension}"
                ),
            ));
        }
        *slot = count as u32;
    }
    Ok(out)
}

/// Grid for a one-dimensional launch of `threads` invocations.
///
/// Workgroups are folded into the y dimension once x reaches the device
/// limit; shaders recover the flat index with `linear_index`.
pub fn linear_grid(
    operation: &'static str,
    threads: usize,
    threads_per_block: u32,
    max_per_dimension: u32,
) -> Result<[u32; 3]> {
    let groups = workgroup_count(threads, threads_per_block).max(1);
    let x = groups.min(max_per_dimension as usize);
    let y = groups.div_ceil(x);
    checked_grid(operation, [x, y, 1], max_per_dimension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_count() {
        assert_eq!(workgroup_count(1, 32), 1);
        assert_eq!(workgroup_count(32, 32), 1);
        assert_eq!(workgroup_count(33, 32), 2);
        assert_eq!(workgroup_count(0, 32), 0);
    }

    #[test]
    fn test_linear_grid_folds_into_y() {
        assert_eq!(linear_grid("t", 100, 32, 65535).unwrap(), [4, 1, 1]);
        assert_eq!(linear_grid("t", 10 * 32, 32, 4).unwrap(), [4, 3, 1]);
        assert_eq!(linear_grid("t", 0, 32, 65535).unwrap(), [1, 1, 1]);
    }

    #[test]
    fn test_checked_grid_rejects_oversized_axis() {
        let err = checked_grid("Sum3D", [1, 70000, 1], 65535).unwrap_err();
        assert!(matches!(err, Error::BackendLimitation { operation: "Sum3D", .. }));
    }
}
