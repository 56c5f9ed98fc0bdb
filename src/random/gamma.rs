//! Gamma sampler (Marsaglia-Tsang).

use tracing::debug;
use wgpu::ComputePass;

use super::{KeySplitter, Normal, TransformSpec, Uniform, build_transform};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer, extent};
use crate::runtime::wgpu::shaders::generator::{GAMMA_ENTRY, generate_gamma_shader};
use crate::runtime::wgpu::shaders::{Dispatch, LayoutKey};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

/// Candidate slots per output sample.
const CANDIDATES: usize = 4;

struct GammaState {
    dispatch: Dispatch,
    _uniforms: GpuBuffer,
    _normals: GpuBuffer,
    _dims: GpuBuffer,
}

/// `N` deviates from `Gamma(shape, scale)`.
///
/// The key is split in two: sub-key A drives `4N` uniforms, sub-key B
/// drives `4N` normals. Sample `i` tries candidates `4i..4i + 4` and takes
/// the first accepted. For `shape < 1` the last uniform of the group is
/// spent on the `U^(1/shape)` boost instead. If every candidate is
/// rejected the sample falls back to `d * boost * scale`, which happens
/// with probability below `1e-4` for any shape.
pub struct Gamma {
    n: usize,
    shape: f32,
    scale: f32,
    config: KernelConfig,
    splitter: KeySplitter,
    uniform: Uniform,
    normal: Normal,
    state: Option<GammaState>,
}

impl Gamma {
    /// Bind the number of samples and the distribution parameters.
    pub fn new(n: usize, shape: f32, scale: f32) -> Result<Self> {
        Self::with_config(n, shape, scale, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(n: usize, shape: f32, scale: f32, config: KernelConfig) -> Result<Self> {
        dim("n", n)?;
        if !(shape.is_finite() && shape > 0.0) {
            return Err(Error::invalid_argument(
                "shape",
                format!("must be finite and positive, got {shape}"),
            ));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::invalid_argument(
                "scale",
                format!("must be finite and positive, got {scale}"),
            ));
        }
        let draws = extent("4 * n", &[n, CANDIDATES])?;
        Ok(Self {
            n,
            shape,
            scale,
            config,
            splitter: KeySplitter::new()?,
            uniform: Uniform::with_config(draws, config)?,
            normal: Normal::with_config(draws, config)?,
            state: None,
        })
    }

    /// Shape parameter.
    pub fn shape(&self) -> f32 {
        self.shape
    }

    /// Scale parameter.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Validate `key` (4 u32) and `output` (`N` f32).
    pub fn setup(&mut self, client: &WgpuClient, key: &GpuBuffer, output: &GpuBuffer) -> Result<()> {
        let label = self.label();
        expect_buffer(label, "output", output, DType::F32, self.n)?;
        self.state = None;

        self.splitter.setup(client, key)?;
        let draws = self.n * CANDIDATES;
        let uniforms = client.alloc::<f32>("gamma_uniforms", draws);
        let normals = client.alloc::<f32>("gamma_normals", draws);
        self.uniform.setup(client, self.splitter.key_a()?, &uniforms)?;
        self.normal.setup(client, self.splitter.key_b()?, &normals)?;

        let t = self.config.threads_per_block();
        let (shape, scale) = (self.shape, self.scale);
        let dims = client.upload_uniform("gamma_dims", &[self.n as u32, 0, 0, 0]);
        let dispatch = build_transform(
            client,
            self.config,
            TransformSpec {
                label,
                name: format!(
                    "gamma_transform_t{t}_{:08x}_{:08x}",
                    shape.to_bits(),
                    scale.to_bits()
                ),
                entry: GAMMA_ENTRY,
                layout: LayoutKey::with_params(2, 1),
                buffers: &[uniforms.raw(), normals.raw(), output.raw(), dims.raw()],
                threads: self.n,
            },
            || generate_gamma_shader(t, shape, scale),
        )?;

        debug!(kernel = label, n = self.n, shape, scale, "gamma sampler set up");
        self.state = Some(GammaState {
            dispatch,
            _uniforms: uniforms,
            _normals: normals,
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for Gamma {
    fn label(&self) -> &'static str {
        "Gamma"
    }

    fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::NotSetUp {
            kernel: self.label(),
        })?;
        self.splitter.encode(pass)?;
        self.uniform.encode(pass)?;
        self.normal.encode(pass)?;
        state.dispatch.record(pass);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(Gamma::new(4, 0.0, 1.0).is_err());
        assert!(Gamma::new(4, -1.0, 1.0).is_err());
        assert!(Gamma::new(4, f32::NAN, 1.0).is_err());
        assert!(Gamma::new(4, 2.0, f32::INFINITY).is_err());
        assert!(Gamma::new(0, 2.0, 1.0).is_err());
        assert!(Gamma::new(4, 0.5, 2.0).is_ok());
    }
}
