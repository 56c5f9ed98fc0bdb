//! Uniform `[0, 1)` sampler.

use tracing::debug;
use wgpu::ComputePass;

use super::{ThreeFry, TransformSpec, TransformState, blocks_for, build_transform};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer};
use crate::runtime::wgpu::shaders::LayoutKey;
use crate::runtime::wgpu::shaders::generator::{UNIFORM_ENTRY, generate_uniform_shader};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

/// `N` uniform deviates in `[0, 1)`.
///
/// Word `i` of the key's ThreeFry stream maps to `(w >> 8) / 2^24`, which
/// is exact in `f32` and never reaches 1. Padding words of the last block
/// are discarded.
pub struct Uniform {
    n: usize,
    config: KernelConfig,
    threefry: ThreeFry,
    state: Option<TransformState>,
}

impl Uniform {
    /// Bind the number of samples.
    pub fn new(n: usize) -> Result<Self> {
        Self::with_config(n, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(n: usize, config: KernelConfig) -> Result<Self> {
        dim("n", n)?;
        Ok(Self {
            n,
            config,
            threefry: ThreeFry::with_config(blocks_for(n), config)?,
            state: None,
        })
    }

    /// Validate `key` (4 u32) and `output` (`N` f32).
    pub fn setup(&mut self, client: &WgpuClient, key: &GpuBuffer, output: &GpuBuffer) -> Result<()> {
        let label = self.label();
        expect_buffer(label, "output", output, DType::F32, self.n)?;
        self.state = None;

        let words = client.alloc::<u32>("uniform_words", self.threefry.words());
        self.threefry.setup(client, key, &words)?;

        let t = self.config.threads_per_block();
        let dims = client.upload_uniform("uniform_dims", &[self.n as u32, 0, 0, 0]);
        let dispatch = build_transform(
            client,
            self.config,
            TransformSpec {
                label,
                name: format!("uniform_transform_t{t}"),
                entry: UNIFORM_ENTRY,
                layout: LayoutKey::with_params(1, 1),
                buffers: &[words.raw(), output.raw(), dims.raw()],
                threads: self.n,
            },
            || generate_uniform_shader(t),
        )?;

        debug!(kernel = label, n = self.n, "uniform sampler set up");
        self.state = Some(TransformState {
            dispatch,
            _words: words,
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for Uniform {
    fn label(&self) -> &'static str {
        "Uniform"
    }

    fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::NotSetUp {
            kernel: self.label(),
        })?;
        self.threefry.encode(pass)?;
        state.dispatch.record(pass);
        Ok(())
    }
}
