//! Categorical sampler over unnormalized log-probabilities.

use tracing::debug;
use wgpu::ComputePass;

use super::{ThreeFry, TransformSpec, TransformState, blocks_for, build_transform};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer, extent};
use crate::runtime::wgpu::shaders::LayoutKey;
use crate::runtime::wgpu::shaders::generator::{CATEGORICAL_ENTRY, generate_categorical_shader};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

/// `N` labels in `[0, K)` drawn with probability `softmax(log_probs)`.
///
/// Gumbel-max: draw `i` scores category `c` as
/// `log_probs[c] - log(-log(u[i * K + c]))` and keeps the first maximum.
/// Log-probabilities need not be normalized.
pub struct Categorical {
    n: usize,
    k: usize,
    config: KernelConfig,
    threefry: ThreeFry,
    state: Option<TransformState>,
}

impl Categorical {
    /// Bind `n` draws over `k` categories.
    pub fn new(n: usize, k: usize) -> Result<Self> {
        Self::with_config(n, k, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(n: usize, k: usize, config: KernelConfig) -> Result<Self> {
        dim("n", n)?;
        dim("k", k)?;
        let words = extent("n * k", &[n, k])?;
        Ok(Self {
            n,
            k,
            config,
            threefry: ThreeFry::with_config(blocks_for(words), config)?,
            state: None,
        })
    }

    /// Validate `key` (4 u32), `log_probs` (`K` f32) and `output` (`N` u32).
    pub fn setup(
        &mut self,
        client: &WgpuClient,
        key: &GpuBuffer,
        log_probs: &GpuBuffer,
        output: &GpuBuffer,
    ) -> Result<()> {
        let label = self.label();
        expect_buffer(label, "log_probs", log_probs, DType::F32, self.k)?;
        expect_buffer(label, "output", output, DType::U32, self.n)?;
        self.state = None;

        let words = client.alloc::<u32>("categorical_words", self.threefry.words());
        self.threefry.setup(client, key, &words)?;

        let t = self.config.threads_per_block();
        let dims = client.upload_uniform("categorical_dims", &[self.n as u32, self.k as u32, 0, 0]);
        let dispatch = build_transform(
            client,
            self.config,
            TransformSpec {
                label,
                name: format!("categorical_draw_t{t}"),
                entry: CATEGORICAL_ENTRY,
                layout: LayoutKey::with_params(2, 1),
                buffers: &[words.raw(), log_probs.raw(), output.raw(), dims.raw()],
                threads: self.n,
            },
            || generate_categorical_shader(t),
        )?;

        debug!(kernel = label, n = self.n, k = self.k, "categorical sampler set up");
        self.state = Some(TransformState {
            dispatch,
            _words: words,
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for Categorical {
    fn label(&self) -> &'static str {
        "Categorical"
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
