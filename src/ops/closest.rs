//! Brute-force nearest reference point search.

use tracing::debug;
use wgpu::ComputePass;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer, extent};
use crate::runtime::wgpu::shaders::generator::{CLOSEST_ENTRY, generate_closest_shader};
use crate::runtime::wgpu::shaders::pipeline::linear_grid;
use crate::runtime::wgpu::shaders::{Dispatch, LayoutKey};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

struct ClosestState {
    dispatch: Dispatch,
    _dims: GpuBuffer,
}

/// For each of `M1` query points, the index of the nearest of `M2`
/// reference points by squared Euclidean distance over `K` features.
///
/// Points are feature-major (`queries[i + l * M1]`, `references[j + l * M2]`).
/// One invocation scans every reference, so the cost is `O(M1 * M2 * K)`.
/// Ties go to the lowest reference index.
pub struct ClosestPairwiseLoop {
    m1: usize,
    m2: usize,
    k: usize,
    config: KernelConfig,
    state: Option<ClosestState>,
}

impl ClosestPairwiseLoop {
    /// Bind `m1` queries, `m2` references and `k` features.
    pub fn new(m1: usize, m2: usize, k: usize) -> Result<Self> {
        Self::with_config(m1, m2, k, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(m1: usize, m2: usize, k: usize, config: KernelConfig) -> Result<Self> {
        dim("m1", m1)?;
        dim("m2", m2)?;
        dim("k", k)?;
        extent("m1 * k", &[m1, k])?;
        extent("m2 * k", &[m2, k])?;
        Ok(Self {
            m1,
            m2,
            k,
            config,
            state: None,
        })
    }

    /// Validate `queries` (`M1 * K`), `references` (`M2 * K`) and
    /// `nearest` (`M1`, u32).
    pub fn setup(
        &mut self,
        client: &WgpuClient,
        queries: &GpuBuffer,
        references: &GpuBuffer,
        nearest: &GpuBuffer,
    ) -> Result<()> {
        let label = self.label();
        expect_buffer(label, "queries", queries, DType::F32, self.m1 * self.k)?;
        expect_buffer(label, "references", references, DType::F32, self.m2 * self.k)?;
        expect_buffer(label, "nearest", nearest, DType::U32, self.m1)?;
        self.state = None;

        let t = self.config.threads_per_block();
        let grid = linear_grid(label, self.m1, t, client.max_workgroups_per_dimension())?;
        let dims = client.upload_uniform(
            "closest_dims",
            &[self.m1 as u32, self.m2 as u32, self.k as u32, 0],
        );

        let cache = client.pipeline_cache();
        let name = format!("closest_pairwise_t{t}");
        let module = cache.get_or_create_module(&name, || generate_closest_shader(t));
        let layout = cache.get_or_create_layout(LayoutKey::with_params(2, 1));
        let pipeline = cache.get_or_create_pipeline(&name, CLOSEST_ENTRY, &module, &layout);
        let bind_group = cache.create_bind_group(
            &layout,
            &[queries.raw(), references.raw(), nearest.raw(), dims.raw()],
        );

        debug!(kernel = label, m1 = self.m1, m2 = self.m2, k = self.k, "closest set up");

        self.state = Some(ClosestState {
            dispatch: Dispatch::new(pipeline, bind_group, grid),
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for ClosestPairwiseLoop {
    fn label(&self) -> &'static str {
        "ClosestPairwiseLoop"
    }

    fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::NotSetUp {
            kernel: self.label(),
        })?;
        state.dispatch.record(pass);
        Ok(())
    }
}
