//! Gaussian mixture sampling.

use tracing::debug;
use wgpu::ComputePass;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer, extent};
use crate::ops::ScaleAndShiftIndexed2D;
use crate::random::{Categorical, KeySplitter, Normal};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

/// Draw `M` samples with `N` features from a `K`-component diagonal
/// Gaussian mixture.
///
/// The seed is split once: sub-key A picks a component per sample from
/// `softmax(log_weights)`, sub-key B drives the `N * M` standard normals
/// that are then scaled and shifted by the chosen component's standard
/// deviations and means.
pub struct GaussianMixtureSampler {
    m: usize,
    n: usize,
    k: usize,
    splitter: KeySplitter,
    choose: Categorical,
    noise: Normal,
    transform: ScaleAndShiftIndexed2D,
    ready: bool,
}

impl GaussianMixtureSampler {
    /// Bind `m` samples, `n` features and `k` components.
    pub fn new(m: usize, n: usize, k: usize) -> Result<Self> {
        Self::with_config(m, n, k, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(m: usize, n: usize, k: usize, config: KernelConfig) -> Result<Self> {
        dim("m", m)?;
        dim("n", n)?;
        dim("k", k)?;
        let draws = extent("n * m", &[n, m])?;
        Ok(Self {
            m,
            n,
            k,
            splitter: KeySplitter::new()?,
            choose: Categorical::with_config(m, k, config)?,
            noise: Normal::with_config(draws, config)?,
            transform: ScaleAndShiftIndexed2D::with_config(m, n, k, config)?,
            ready: false,
        })
    }

    /// Validate `seed` (4 u32), `log_weights` (`K` f32), `means` and
    /// `stddevs` (`N * K` f32), `samples` (`N * M` f32, feature-major) and
    /// `assignments` (`M` u32).
    ///
    /// A failed setup leaves the sampler not set up, even if it was before.
    #[allow(clippy::too_many_arguments)]
    pub fn setup(
        &mut self,
        client: &WgpuClient,
        seed: &GpuBuffer,
        log_weights: &GpuBuffer,
        means: &GpuBuffer,
        stddevs: &GpuBuffer,
        samples: &GpuBuffer,
        assignments: &GpuBuffer,
    ) -> Result<()> {
        let label = self.label();
        // Children may hold bind groups over the splitter's previous keys.
        self.ready = false;
        expect_buffer(label, "means", means, DType::F32, self.n * self.k)?;
        expect_buffer(label, "stddevs", stddevs, DType::F32, self.n * self.k)?;
        expect_buffer(label, "samples", samples, DType::F32, self.n * self.m)?;
        expect_buffer(label, "log_weights", log_weights, DType::F32, self.k)?;
        expect_buffer(label, "assignments", assignments, DType::U32, self.m)?;

        self.splitter.setup(client, seed)?;
        self.choose
            .setup(client, self.splitter.key_a()?, log_weights, assignments)?;
        self.noise.setup(client, self.splitter.key_b()?, samples)?;
        self.transform
            .setup(client, assignments, stddevs, means, samples)?;

        debug!(kernel = label, m = self.m, n = self.n, k = self.k, "gaussian mixture set up");
        self.ready = true;
        Ok(())
    }
}

impl Kernel for GaussianMixtureSampler {
    fn label(&self) -> &'static str {
        "GaussianMixtureSampler"
    }

    fn is_setup(&self) -> bool {
        self.ready
            && self.splitter.is_setup()
            && self.choose.is_setup()
            && self.noise.is_setup()
            && self.transform.is_setup()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        if !self.is_setup() {
            return Err(Error::NotSetUp {
                kernel: self.label(),
            });
        }
        self.splitter.encode(pass)?;
        self.choose.encode(pass)?;
        self.noise.encode(pass)?;
        self.transform.encode(pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_dims() {
        assert!(GaussianMixtureSampler::new(0, 2, 3).is_err());
        let gmm = GaussianMixtureSampler::new(1000, 2, 3).unwrap();
        assert!(!gmm.is_setup());
    }
}
