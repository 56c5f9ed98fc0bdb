//! Standard normal sampler (Box-Muller).

use tracing::debug;
use wgpu::ComputePass;

use super::{ThreeFry, TransformSpec, TransformState, blocks_for, build_transform};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer};
use crate::runtime::wgpu::shaders::LayoutKey;
use crate::runtime::wgpu::shaders::generator::{NORMAL_ENTRY, generate_normal_shader};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

/// `N` standard normal deviates.
///
/// Words `2i` and `2i + 1` give the pair of outputs `2i`, `2i + 1`; an odd
/// `N` drops the sine half of the final pair.
pub struct Normal {
    n: usize,
    config: KernelConfig,
    threefry: ThreeFry,
    state: Option<TransformState>,
}

impl Normal {
    /// Bind the number of samples.
    pub fn new(n: usize) -> Result<Self> {
        Self::with_config(n, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(n: usize, config: KernelConfig) -> Result<Self> {
        dim("n", n)?;
        let pairs = n.div_ceil(2);
        Ok(Self {
            n,
            config,
            threefry: ThreeFry::with_config(blocks_for(2 * pairs), config)?,
            state: None,
        })
    }

    /// Validate `key` (4 u32) and `output` (`N` f32).
    pub fn setup(&mut self, client: &WgpuClient, key: &GpuBuffer, output: &GpuBuffer) -> Result<()> {
        let label = self.label();
        expect_buffer(label, "output", output, DType::F32, self.n)?;
        self.state = None;

        let words = client.alloc::<u32>("normal_words", self.threefry.words());
        self.threefry.setup(client, key, &words)?;

        let t = self.config.threads_per_block();
        let dims = client.upload_uniform("normal_dims", &[self.n as u32, 0, 0, 0]);
        let dispatch = build_transform(
            client,
            self.config,
            TransformSpec {
                label,
                name: format!("normal_transform_t{t}"),
                entry: NORMAL_ENTRY,
                layout: LayoutKey::with_params(1, 1),
                buffers: &[words.raw(), output.raw(), dims.raw()],
                threads: self.n.div_ceil(2),
            },
            || generate_normal_shader(t),
        )?;

        debug!(kernel = label, n = self.n, "normal sampler set up");
        self.state = Some(TransformState {
            dispatch,
            _words: words,
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for Normal {
    fn label(&self) -> &'static str {
        "Normal"
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
