//! Lloyd's k-means on feature-major data.

use tracing::debug;
use wgpu::ComputePass;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer, extent};
use crate::ops::{
    BinaryOp, ClosestPairwiseLoop, Count, MatVecElementwise, Transpose, UnsortedSegmentSum2D,
};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

struct KMeansScratch {
    _sums: GpuBuffer,
    _counts: GpuBuffer,
    _sums_by_cluster: GpuBuffer,
    _means_by_cluster: GpuBuffer,
}

/// One Lloyd iteration per encode over `M` points with `N` features and
/// `K` clusters.
///
/// ```text
/// data (N, M) + assignments (M)
///   ├── UnsortedSegmentSum2D ─> sums (N, K)
///   ├── Count                ─> counts (K)
///   ├── Transpose(N, K)      ─> sums (K, N)
///   ├── MatVec Divide        ─> means (K, N)
///   ├── Transpose(K, N)      ─> centroids (N, K)
///   └── ClosestPairwiseLoop  ─> assignments (M), in place
/// ```
///
/// A cluster that loses all its points gets NaN centroids, which never win
/// the nearest-centroid search, so it stays empty.
pub struct KMeans {
    m: usize,
    n: usize,
    k: usize,
    segment_sum: UnsortedSegmentSum2D,
    count: Count,
    to_cluster_major: Transpose,
    divide: MatVecElementwise,
    to_feature_major: Transpose,
    assign: ClosestPairwiseLoop,
    scratch: Option<KMeansScratch>,
}

impl KMeans {
    /// Bind `m` points, `n` features and `k` clusters.
    pub fn new(m: usize, n: usize, k: usize) -> Result<Self> {
        Self::with_config(m, n, k, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration. Transposes keep
    /// their default tile.
    pub fn with_config(m: usize, n: usize, k: usize, config: KernelConfig) -> Result<Self> {
        dim("m", m)?;
        dim("n", n)?;
        dim("k", k)?;
        extent("n * m", &[n, m])?;
        Ok(Self {
            m,
            n,
            k,
            segment_sum: UnsortedSegmentSum2D::with_config(m, n, k, config)?,
            count: Count::with_config(m, k, config)?,
            to_cluster_major: Transpose::new(n, k)?,
            divide: MatVecElementwise::with_config(k, n, BinaryOp::Divide, config)?,
            to_feature_major: Transpose::new(k, n)?,
            assign: ClosestPairwiseLoop::with_config(m, k, n, config)?,
            scratch: None,
        })
    }

    /// Validate `data` (`N * M` f32, feature-major), `assignments` (`M`
    /// u32, the starting labels) and `centroids` (`N * K` f32, written).
    pub fn setup(
        &mut self,
        client: &WgpuClient,
        data: &GpuBuffer,
        assignments: &GpuBuffer,
        centroids: &GpuBuffer,
    ) -> Result<()> {
        let label = self.label();
        expect_buffer(label, "data", data, DType::F32, self.n * self.m)?;
        expect_buffer(label, "assignments", assignments, DType::U32, self.m)?;
        expect_buffer(label, "centroids", centroids, DType::F32, self.n * self.k)?;
        self.scratch = None;

        let sums = client.alloc::<f32>("kmeans_sums", self.n * self.k);
        let counts = client.alloc::<f32>("kmeans_counts", self.k);
        let sums_by_cluster = client.alloc::<f32>("kmeans_sums_t", self.k * self.n);
        let means_by_cluster = client.alloc::<f32>("kmeans_means_t", self.k * self.n);

        self.segment_sum.setup(client, data, assignments, &sums)?;
        self.count.setup(client, assignments, &counts)?;
        self.to_cluster_major.setup(client, &sums, &sums_by_cluster)?;
        self.divide
            .setup(client, &sums_by_cluster, &counts, &means_by_cluster)?;
        self.to_feature_major
            .setup(client, &means_by_cluster, centroids)?;
        self.assign.setup(client, data, centroids, assignments)?;

        debug!(kernel = label, m = self.m, n = self.n, k = self.k, "kmeans set up");
        self.scratch = Some(KMeansScratch {
            _sums: sums,
            _counts: counts,
            _sums_by_cluster: sums_by_cluster,
            _means_by_cluster: means_by_cluster,
        });
        Ok(())
    }

    /// Record `iterations` Lloyd steps into one submission and wait.
    pub fn run_iterations(&self, client: &WgpuClient, iterations: usize) -> Result<()> {
        if !self.is_setup() {
            return Err(Error::NotSetUp {
                kernel: self.label(),
            });
        }
        let step: &dyn Kernel = self;
        client.run("kmeans", &vec![step; iterations])
    }
}

impl Kernel for KMeans {
    fn label(&self) -> &'static str {
        "KMeans"
    }

    fn is_setup(&self) -> bool {
        self.scratch.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        if self.scratch.is_none() {
            return Err(Error::NotSetUp {
                kernel: self.label(),
            });
        }
        self.segment_sum.encode(pass)?;
        self.count.encode(pass)?;
        self.to_cluster_major.encode(pass)?;
        self.divide.encode(pass)?;
        self.to_feature_major.encode(pass)?;
        self.assign.encode(pass)
    }
}
