//! Segmented (group-by) sums and counts.
//!
//! Two phases, recorded back to back in one pass:
//!
//! 1. scatter: the `M` axis is cut into blocks of `T` elements and each
//!    workgroup sums one `(block, segment, column)` combination into a
//!    scratch tensor of block partials shaped `(blocks, N, K)`;
//! 2. reduce: the leading-axis sum collapses the block axis, leaving one
//!    total per `(column, segment)`.
//!
//! No atomics are involved. Segment ids are not bounds-checked on the
//! device; an id outside `[0, K)` matches no workgroup and is dropped.

use tracing::debug;
use wgpu::ComputePass;

use super::reduce::{Sum2D, Sum3D};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer, expect_dtype, extent};
use crate::runtime::wgpu::shaders::generator::{
    SEGMENT_SCATTER_ENTRY, generate_segment_scatter_shader,
};
use crate::runtime::wgpu::shaders::pipeline::checked_grid;
use crate::runtime::wgpu::shaders::{Dispatch, LayoutKey};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

const SUMMABLE: [DType; 3] = [DType::F32, DType::I32, DType::U32];

struct ScatterState {
    dispatch: Dispatch,
    partials: GpuBuffer,
    _dims: GpuBuffer,
}

/// Build the scatter dispatch writing block partials for `(m, n, k)`.
fn setup_scatter(
    label: &'static str,
    client: &WgpuClient,
    config: KernelConfig,
    (m, n, k): (usize, usize, usize),
    data: &GpuBuffer,
    segment_ids: &GpuBuffer,
    output: &GpuBuffer,
) -> Result<ScatterState> {
    expect_dtype(label, "data", data, &SUMMABLE)?;
    let dtype = data.dtype();
    expect_buffer(label, "data", data, dtype, m * n)?;
    expect_buffer(label, "segment_ids", segment_ids, DType::U32, m)?;
    expect_buffer(label, "output", output, dtype, n * k)?;

    let t = config.threads_per_block();
    let blocks = m.div_ceil(t as usize);
    let partials_len = extent("blocks * n * k", &[blocks, n, k])?;
    let max_groups = client.max_workgroups_per_dimension();
    let grid = checked_grid(label, [blocks.min(max_groups as usize), k, n], max_groups)?;

    let partials = client.alloc_dtype(&format!("{label}_partials"), partials_len, dtype);
    let dims = client.upload_uniform(
        &format!("{label}_dims"),
        &[m as u32, n as u32, k as u32, blocks as u32],
    );

    let cache = client.pipeline_cache();
    let name = format!("segment_scatter_{}_t{t}", dtype.name());
    let module = cache.get_or_create_module(&name, || generate_segment_scatter_shader(dtype, t));
    let layout = cache.get_or_create_layout(LayoutKey::with_params(2, 1));
    let pipeline = cache.get_or_create_pipeline(&name, SEGMENT_SCATTER_ENTRY, &module, &layout);
    let bind_group = cache.create_bind_group(
        &layout,
        &[data.raw(), segment_ids.raw(), partials.raw(), dims.raw()],
    );

    debug!(kernel = label, m, n, k, blocks, "segment scatter set up");

    Ok(ScatterState {
        dispatch: Dispatch::new(pipeline, bind_group, grid),
        partials,
        _dims: dims,
    })
}

// ============================================================================
// UnsortedSegmentSum
// ============================================================================

/// Per-segment sums of an `M`-vector: `output[s] = sum(data[i] | ids[i] == s)`.
///
/// Segments that never occur produce zero.
pub struct UnsortedSegmentSum {
    m: usize,
    k: usize,
    config: KernelConfig,
    reduce: Sum2D,
    state: Option<ScatterState>,
}

impl UnsortedSegmentSum {
    /// Bind `m` elements and `num_segments` segments.
    pub fn new(m: usize, num_segments: usize) -> Result<Self> {
        Self::with_config(m, num_segments, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(m: usize, num_segments: usize, config: KernelConfig) -> Result<Self> {
        dim("m", m)?;
        dim("num_segments", num_segments)?;
        let blocks = m.div_ceil(config.threads_per_block() as usize);
        Ok(Self {
            m,
            k: num_segments,
            config,
            reduce: Sum2D::with_config(blocks, num_segments, config)?,
            state: None,
        })
    }

    /// Validate `data` (`M`), `segment_ids` (`M`, u32) and `output` (`K`).
    pub fn setup(
        &mut self,
        client: &WgpuClient,
        data: &GpuBuffer,
        segment_ids: &GpuBuffer,
        output: &GpuBuffer,
    ) -> Result<()> {
        self.state = None;
        let state = setup_scatter(
            "UnsortedSegmentSum",
            client,
            self.config,
            (self.m, 1, self.k),
            data,
            segment_ids,
            output,
        )?;
        self.reduce.setup(client, &state.partials, output)?;
        self.state = Some(state);
        Ok(())
    }
}

impl Kernel for UnsortedSegmentSum {
    fn label(&self) -> &'static str {
        "UnsortedSegmentSum"
    }

    fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::NotSetUp {
            kernel: self.label(),
        })?;
        state.dispatch.record(pass);
        self.reduce.encode(pass)
    }
}

// ============================================================================
// UnsortedSegmentSum2D
// ============================================================================

/// Per-segment sums of every column of a feature-major `(N, M)` array.
///
/// `data[n * M + m]` is added to `output[n * K + ids[m]]`.
pub struct UnsortedSegmentSum2D {
    m: usize,
    n: usize,
    k: usize,
    config: KernelConfig,
    reduce: Sum3D,
    state: Option<ScatterState>,
}

impl UnsortedSegmentSum2D {
    /// Bind `m` points with `n` features each and `num_segments` segments.
    pub fn new(m: usize, n: usize, num_segments: usize) -> Result<Self> {
        Self::with_config(m, n, num_segments, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(
        m: usize,
        n: usize,
        num_segments: usize,
        config: KernelConfig,
    ) -> Result<Self> {
        dim("m", m)?;
        dim("n", n)?;
        dim("num_segments", num_segments)?;
        let blocks = m.div_ceil(config.threads_per_block() as usize);
        Ok(Self {
            m,
            n,
            k: num_segments,
            config,
            reduce: Sum3D::with_config(blocks, n, num_segments, config)?,
            state: None,
        })
    }

    /// Validate `data` (`N * M`), `segment_ids` (`M`, u32) and `output` (`N * K`).
    pub fn setup(
        &mut self,
        client: &WgpuClient,
        data: &GpuBuffer,
        segment_ids: &GpuBuffer,
        output: &GpuBuffer,
    ) -> Result<()> {
        self.state = None;
        let state = setup_scatter(
            "UnsortedSegmentSum2D",
            client,
            self.config,
            (self.m, self.n, self.k),
            data,
            segment_ids,
            output,
        )?;
        self.reduce.setup(client, &state.partials, output)?;
        self.state = Some(state);
        Ok(())
    }
}

impl Kernel for UnsortedSegmentSum2D {
    fn label(&self) -> &'static str {
        "UnsortedSegmentSum2D"
    }

    fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::NotSetUp {
            kernel: self.label(),
        })?;
        state.dispatch.record(pass);
        self.reduce.encode(pass)
    }
}

// ============================================================================
// Count
// ============================================================================

/// Occurrences of each segment id: a segmented sum over an all-ones vector.
///
/// The output dtype decides the counting type; k-means counts in `f32` so
/// the counts can divide sums directly.
pub struct Count {
    m: usize,
    sum: UnsortedSegmentSum,
    ones: Option<GpuBuffer>,
}

impl Count {
    /// Bind `m` ids and `num_segments` segments.
    pub fn new(m: usize, num_segments: usize) -> Result<Self> {
        Self::with_config(m, num_segments, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(m: usize, num_segments: usize, config: KernelConfig) -> Result<Self> {
        Ok(Self {
            m,
            sum: UnsortedSegmentSum::with_config(m, num_segments, config)?,
            ones: None,
        })
    }

    /// Validate `segment_ids` (`M`, u32) and `output` (`K`).
    pub fn setup(
        &mut self,
        client: &WgpuClient,
        segment_ids: &GpuBuffer,
        output: &GpuBuffer,
    ) -> Result<()> {
        expect_dtype("Count", "output", output, &SUMMABLE)?;
        self.ones = None;
        let ones = match output.dtype() {
            DType::F32 => client.upload("count_ones", &vec![1.0f32; self.m]),
            DType::I32 => client.upload("count_ones", &vec![1i32; self.m]),
            DType::U32 => client.upload("count_ones", &vec![1u32; self.m]),
        };
        self.sum.setup(client, &ones, segment_ids, output)?;
        self.ones = Some(ones);
        Ok(())
    }
}

impl Kernel for Count {
    fn label(&self) -> &'static str {
        "Count"
    }

    fn is_setup(&self) -> bool {
        self.ones.is_some() && self.sum.is_setup()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        if self.ones.is_none() {
            return Err(Error::NotSetUp {
                kernel: self.label(),
            });
        }
        self.sum.encode(pass)
    }
}
