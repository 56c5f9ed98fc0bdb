//! ThreeFry4x32-20 counter-based generator.
//!
//! Reference: Salmon et al. "Parallel Random Numbers: As Easy as 1, 2, 3" (2011).
//! Block `i` is the 20-round ThreeFry mix of counter `(i, 0, 0, 0)` under the
//! caller's 128-bit key; output word `4i + j` is lane `j` of block `i`. The
//! host implementation in [`crate::runtime::cpu::threefry4x32_20`] is
//! bit-identical.

use tracing::debug;
use wgpu::ComputePass;

use super::KEY_WORDS;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer, extent};
use crate::runtime::wgpu::shaders::generator::{THREEFRY_ENTRY, generate_threefry_shader};
use crate::runtime::wgpu::shaders::pipeline::linear_grid;
use crate::runtime::wgpu::shaders::{Dispatch, LayoutKey};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

struct ThreeFryState {
    dispatch: Dispatch,
    _dims: GpuBuffer,
}

/// Fill `4 * blocks` words from a 4-word key.
///
/// The key buffer is only read. Output does not depend on how the blocks
/// are spread over workgroups.
pub struct ThreeFry {
    blocks: usize,
    config: KernelConfig,
    state: Option<ThreeFryState>,
}

impl ThreeFry {
    /// Bind the number of 4-word blocks to generate.
    pub fn new(blocks: usize) -> Result<Self> {
        Self::with_config(blocks, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(blocks: usize, config: KernelConfig) -> Result<Self> {
        dim("blocks", blocks)?;
        extent("4 * blocks", &[blocks, KEY_WORDS])?;
        Ok(Self {
            blocks,
            config,
            state: None,
        })
    }

    /// Number of words written.
    pub fn words(&self) -> usize {
        self.blocks * KEY_WORDS
    }

    /// Validate `key` (4 u32) and `output` (`4 * blocks` u32).
    pub fn setup(&mut self, client: &WgpuClient, key: &GpuBuffer, output: &GpuBuffer) -> Result<()> {
        let label = self.label();
        expect_buffer(label, "key", key, DType::U32, KEY_WORDS)?;
        expect_buffer(label, "output", output, DType::U32, self.words())?;
        self.state = None;

        let t = self.config.threads_per_block();
        let grid = linear_grid(label, self.blocks, t, client.max_workgroups_per_dimension())?;
        let dims = client.upload_uniform("threefry_dims", &[self.blocks as u32, 0, 0, 0]);

        let cache = client.pipeline_cache();
        let name = format!("threefry4x32_20_t{t}");
        let module = cache.get_or_create_module(&name, || generate_threefry_shader(t));
        let layout = cache.get_or_create_layout(LayoutKey::with_params(1, 1));
        let pipeline = cache.get_or_create_pipeline(&name, THREEFRY_ENTRY, &module, &layout);
        let bind_group = cache.create_bind_group(&layout, &[key.raw(), output.raw(), dims.raw()]);

        debug!(kernel = label, blocks = self.blocks, "threefry set up");

        self.state = Some(ThreeFryState {
            dispatch: Dispatch::new(pipeline, bind_group, grid),
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for ThreeFry {
    fn label(&self) -> &'static str {
        "ThreeFry"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_are_four_per_block() {
        assert_eq!(ThreeFry::new(3).unwrap().words(), 12);
        assert!(ThreeFry::new(0).is_err());
    }
}
