//! Tiled matrix transpose.

use tracing::debug;
use wgpu::ComputePass;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{
    Kernel, KernelConfig, MAX_THREADS_PER_BLOCK, dim, expect_buffer, expect_dtype, extent,
};
use crate::runtime::wgpu::shaders::generator::{TRANSPOSE_ENTRY, generate_transpose_shader};
use crate::runtime::wgpu::shaders::pipeline::checked_grid;
use crate::runtime::wgpu::shaders::{Dispatch, LayoutKey};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

/// Default tile edge; a workgroup covers `tile x tile` elements.
pub const DEFAULT_TILE: u32 = 8;

struct TransposeState {
    dispatch: Dispatch,
    _dims: GpuBuffer,
}

/// Transpose a row-major `(M, N)` matrix into a row-major `(N, M)` one.
///
/// Pure data movement: the result is bit-exact for every dtype.
pub struct Transpose {
    m: usize,
    n: usize,
    tile: u32,
    state: Option<TransposeState>,
}

impl Transpose {
    /// Bind dimensions with the default tile edge.
    pub fn new(m: usize, n: usize) -> Result<Self> {
        Self::with_config(m, n, KernelConfig::new(DEFAULT_TILE)?)
    }

    /// Bind dimensions; `threads_per_block` is the tile edge, so a workgroup
    /// runs its square and that square must fit in one workgroup.
    pub fn with_config(m: usize, n: usize, config: KernelConfig) -> Result<Self> {
        dim("m", m)?;
        dim("n", n)?;
        extent("m * n", &[m, n])?;
        let tile = config.threads_per_block();
        if tile * tile > MAX_THREADS_PER_BLOCK {
            return Err(Error::invalid_argument(
                "threads_per_block",
                format!("tile edge {tile} gives {} lanes per workgroup", tile * tile),
            ));
        }
        Ok(Self {
            m,
            n,
            tile,
            state: None,
        })
    }

    /// Validate `input` (`M * N`) and `output` (`N * M`, same dtype).
    pub fn setup(&mut self, client: &WgpuClient, input: &GpuBuffer, output: &GpuBuffer) -> Result<()> {
        let label = self.label();
        expect_dtype(label, "input", input, &[DType::F32, DType::I32, DType::U32])?;
        let dtype = input.dtype();
        expect_buffer(label, "input", input, dtype, self.m * self.n)?;
        expect_buffer(label, "output", output, dtype, self.m * self.n)?;
        self.state = None;

        let tile = self.tile as usize;
        let grid = checked_grid(
            label,
            [self.n.div_ceil(tile), self.m.div_ceil(tile), 1],
            client.max_workgroups_per_dimension(),
        )?;
        let dims = client.upload_uniform("transpose_dims", &[self.m as u32, self.n as u32, 0, 0]);

        let cache = client.pipeline_cache();
        let name = format!("transpose_{}_tile{}", dtype.name(), self.tile);
        let module = cache.get_or_create_module(&name, || generate_transpose_shader(dtype, self.tile));
        let layout = cache.get_or_create_layout(LayoutKey::with_params(1, 1));
        let pipeline = cache.get_or_create_pipeline(&name, TRANSPOSE_ENTRY, &module, &layout);
        let bind_group =
            cache.create_bind_group(&layout, &[input.raw(), output.raw(), dims.raw()]);

        debug!(kernel = label, m = self.m, n = self.n, tile = self.tile, "transpose set up");

        self.state = Some(TransposeState {
            dispatch: Dispatch::new(pipeline, bind_group, grid),
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for Transpose {
    fn label(&self) -> &'static str {
        "Transpose"
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
