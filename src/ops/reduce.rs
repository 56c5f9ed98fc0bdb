//! Multi-pass tree reduction along the leading axis.
//!
//! A `(M, N, K)` tensor stores each of its `N * K` rows of length `M`
//! contiguously. Every pass shrinks each row from width `w` to `ceil(w / T)`
//! by letting one workgroup of `T` lanes sum `T` neighbouring elements, until
//! a single element per row remains:
//!
//! ```text
//! widths = [M, ceil(M/T), ceil(ceil(M/T)/T), ..., 1]
//!
//! pass 0:  input    -> scratch A      (or -> output if it is the only pass)
//! pass 1:  scratch A -> scratch B
//! pass 2:  scratch B -> scratch A
//! ...
//! last:    scratch   -> output
//! ```
//!
//! The block axis is capped at the device's per-dimension workgroup limit
//! and the shader strides over the remaining blocks, so `M` is bounded only
//! by `u32` indexing. `N` and `K` each map to one grid axis and are limited
//! by the device.
//!
//! Pass dimensions live in one uniform buffer, one 16-byte record per pass
//! at a stride satisfying the device's dynamic offset alignment. Each pass
//! selects its record with a dynamic offset.

use tracing::debug;
use wgpu::ComputePass;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer, expect_dtype, extent};
use crate::runtime::wgpu::shaders::generator::{SUM_PASS_ENTRY, generate_sum_pass_shader};
use crate::runtime::wgpu::shaders::pipeline::checked_grid;
use crate::runtime::wgpu::shaders::{DIMS_RECORD_SIZE, Dispatch, LayoutKey};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

const SUMMABLE: [DType; 3] = [DType::F32, DType::I32, DType::U32];

/// Buffer a reduction pass reads from or writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// The caller's input tensor
    Input,
    /// The caller's output tensor
    Output,
    /// First scratch buffer
    ScratchA,
    /// Second scratch buffer
    ScratchB,
}

/// Pass schedule for reducing rows of length `M` with `T` lanes per block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReductionPlan {
    widths: Vec<usize>,
    threads_per_block: u32,
}

impl ReductionPlan {
    /// Plan the reduction of rows of length `m >= 1`.
    pub fn new(m: usize, threads_per_block: u32) -> Self {
        let t = threads_per_block as usize;
        let mut widths = vec![m];
        let mut width = m;
        while width > 1 {
            width = width.div_ceil(t);
            widths.push(width);
        }
        Self {
            widths,
            threads_per_block,
        }
    }

    /// Row width before each pass, ending in 1.
    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    /// Number of dispatches. A row of length 1 still takes one copy pass.
    pub fn passes(&self) -> usize {
        (self.widths.len() - 1).max(1)
    }

    /// `(width, next_width)` for pass `i`.
    pub fn pass_widths(&self, i: usize) -> (usize, usize) {
        let width = self.widths[i];
        let next = self.widths.get(i + 1).copied().unwrap_or(1);
        (width, next)
    }

    /// Source and destination of pass `i`; intermediates alternate by parity.
    pub fn endpoints(&self, i: usize) -> (Endpoint, Endpoint) {
        let scratch = |j: usize| {
            if j % 2 == 0 {
                Endpoint::ScratchA
            } else {
                Endpoint::ScratchB
            }
        };
        let source = if i == 0 {
            Endpoint::Input
        } else {
            scratch(i - 1)
        };
        let dest = if i + 1 == self.passes() {
            Endpoint::Output
        } else {
            scratch(i)
        };
        (source, dest)
    }

    /// How many scratch buffers the schedule touches (0, 1 or 2).
    pub fn scratch_buffers(&self) -> usize {
        (self.passes() - 1).min(2)
    }

    /// Elements per scratch buffer for `rows` independent rows.
    pub fn scratch_len(&self, rows: usize) -> usize {
        if self.scratch_buffers() == 0 {
            0
        } else {
            self.widths[1] * rows
        }
    }

    /// Byte stride between pass records for a given offset alignment.
    pub fn record_stride(alignment: u32) -> u64 {
        DIMS_RECORD_SIZE.next_multiple_of(u64::from(alignment.max(1)))
    }

    /// Pass records `{width, n, k, next_width}` laid out at `stride` bytes.
    pub fn records(&self, n: u32, k: u32, stride: u64) -> Vec<u32> {
        let words_per_record = (stride / 4) as usize;
        let mut words = vec![0u32; words_per_record * self.passes()];
        for i in 0..self.passes() {
            let (width, next) = self.pass_widths(i);
            let base = i * words_per_record;
            words[base..base + 4].copy_from_slice(&[width as u32, n, k, next as u32]);
        }
        words
    }

    /// Threads per block the plan was made for.
    pub fn threads_per_block(&self) -> u32 {
        self.threads_per_block
    }
}

// ============================================================================
// Shared engine
// ============================================================================

struct ReductionState {
    dispatches: Vec<Dispatch>,
    _scratch: Vec<GpuBuffer>,
    _records: GpuBuffer,
}

/// Leading-axis sum over `(m, n, k)`, shared by [`Sum2D`] and [`Sum3D`].
struct LeadingAxisSum {
    label: &'static str,
    m: usize,
    n: usize,
    k: usize,
    config: KernelConfig,
    plan: ReductionPlan,
    state: Option<ReductionState>,
}

impl LeadingAxisSum {
    fn new(
        label: &'static str,
        m: usize,
        n: usize,
        k: usize,
        config: KernelConfig,
    ) -> Result<Self> {
        dim("m", m)?;
        dim("n", n)?;
        dim("k", k)?;
        extent("m * n * k", &[m, n, k])?;
        Ok(Self {
            label,
            m,
            n,
            k,
            config,
            plan: ReductionPlan::new(m, config.threads_per_block()),
            state: None,
        })
    }

    fn setup(&mut self, client: &WgpuClient, input: &GpuBuffer, output: &GpuBuffer) -> Result<()> {
        let label = self.label;
        expect_dtype(label, "input", input, &SUMMABLE)?;
        let dtype = input.dtype();
        expect_buffer(label, "input", input, dtype, self.m * self.n * self.k)?;
        expect_buffer(label, "output", output, dtype, self.n * self.k)?;

        // Release the previous scratch before allocating new scratch.
        self.state = None;

        let t = self.config.threads_per_block();
        let max_groups = client.max_workgroups_per_dimension();
        let rows = self.n * self.k;
        let scratch: Vec<GpuBuffer> = (0..self.plan.scratch_buffers())
            .map(|i| {
                client.alloc_dtype(
                    &format!("{label}_scratch_{i}"),
                    self.plan.scratch_len(rows),
                    dtype,
                )
            })
            .collect();

        let stride = ReductionPlan::record_stride(client.min_uniform_offset_alignment());
        let records = client.upload_uniform(
            &format!("{label}_pass_records"),
            &self.plan.records(self.n as u32, self.k as u32, stride),
        );

        let cache = client.pipeline_cache();
        let name = format!("sum_pass_{}_t{t}", dtype.name());
        let module = cache.get_or_create_module(&name, || generate_sum_pass_shader(dtype, t));
        let layout = cache.get_or_create_layout(LayoutKey {
            num_readonly_storage: 1,
            num_storage_buffers: 1,
            num_uniform_buffers: 1,
            dynamic_uniform: true,
        });
        let pipeline = cache.get_or_create_pipeline(&name, SUM_PASS_ENTRY, &module, &layout);

        let mut dispatches = Vec::with_capacity(self.plan.passes());
        for i in 0..self.plan.passes() {
            let (source, dest) = self.plan.endpoints(i);
            let (width, _) = self.plan.pass_widths(i);
            // Blocks beyond the x limit are strided over by the shader.
            let blocks = width.div_ceil(t as usize).min(max_groups as usize);
            let grid = checked_grid(label, [blocks, self.n, self.k], max_groups)?;
            let bind_group = cache.create_bind_group_dynamic(
                &layout,
                &[
                    resolve(label, source, input, output, &scratch)?.raw(),
                    resolve(label, dest, input, output, &scratch)?.raw(),
                ],
                records.raw(),
            );
            dispatches.push(Dispatch::with_offset(
                pipeline.clone(),
                bind_group,
                (i as u64 * stride) as u32,
                grid,
            ));
        }

        debug!(
            kernel = label,
            m = self.m,
            n = self.n,
            k = self.k,
            passes = self.plan.passes(),
            scratch_elems = self.plan.scratch_len(rows) * scratch.len(),
            "reduction set up"
        );

        self.state = Some(ReductionState {
            dispatches,
            _scratch: scratch,
            _records: records,
        });
        Ok(())
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        let state = self
            .state
            .as_ref()
            .ok_or(Error::NotSetUp { kernel: self.label })?;
        for dispatch in &state.dispatches {
            dispatch.record(pass);
        }
        Ok(())
    }
}

fn resolve<'a>(
    label: &'static str,
    endpoint: Endpoint,
    input: &'a GpuBuffer,
    output: &'a GpuBuffer,
    scratch: &'a [GpuBuffer],
) -> Result<&'a GpuBuffer> {
    match endpoint {
        Endpoint::Input => Some(input),
        Endpoint::Output => Some(output),
        Endpoint::ScratchA => scratch.first(),
        Endpoint::ScratchB => scratch.get(1),
    }
    .ok_or_else(|| Error::Backend(format!("{label}: pass plan references missing scratch")))
}

// ============================================================================
// Public kernels
// ============================================================================

/// Sum an `(M, N)` tensor over `M`, producing `N` values.
///
/// Element `(m, n)` is read from `n * M + m`. Floating-point results follow
/// the tree order, not a left-to-right sum.
pub struct Sum2D {
    inner: LeadingAxisSum,
}

impl Sum2D {
    /// Bind dimensions with the default configuration.
    pub fn new(m: usize, n: usize) -> Result<Self> {
        Self::with_config(m, n, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(m: usize, n: usize, config: KernelConfig) -> Result<Self> {
        Ok(Self {
            inner: LeadingAxisSum::new("Sum2D", m, n, 1, config)?,
        })
    }

    /// Validate `input` (`M * N`) and `output` (`N`) and build the passes.
    pub fn setup(&mut self, client: &WgpuClient, input: &GpuBuffer, output: &GpuBuffer) -> Result<()> {
        self.inner.setup(client, input, output)
    }

    /// The pass schedule.
    pub fn plan(&self) -> &ReductionPlan {
        &self.inner.plan
    }
}

impl Kernel for Sum2D {
    fn label(&self) -> &'static str {
        self.inner.label
    }

    fn is_setup(&self) -> bool {
        self.inner.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        self.inner.encode(pass)
    }
}

/// Sum an `(M, N, K)` tensor over `M`, producing `(N, K)` values.
///
/// Element `(m, n, k)` is read from `(n * K + k) * M + m` and the result
/// for `(n, k)` is written to `n * K + k`.
pub struct Sum3D {
    inner: LeadingAxisSum,
}

impl Sum3D {
    /// Bind dimensions with the default configuration.
    pub fn new(m: usize, n: usize, k: usize) -> Result<Self> {
        Self::with_config(m, n, k, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(m: usize, n: usize, k: usize, config: KernelConfig) -> Result<Self> {
        Ok(Self {
            inner: LeadingAxisSum::new("Sum3D", m, n, k, config)?,
        })
    }

    /// Validate `input` (`M * N * K`) and `output` (`N * K`) and build the passes.
    pub fn setup(&mut self, client: &WgpuClient, input: &GpuBuffer, output: &GpuBuffer) -> Result<()> {
        self.inner.setup(client, input, output)
    }

    /// The pass schedule.
    pub fn plan(&self) -> &ReductionPlan {
        &self.inner.plan
    }
}

impl Kernel for Sum3D {
    fn label(&self) -> &'static str {
        self.inner.label
    }

    fn is_setup(&self) -> bool {
        self.inner.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        self.inner.encode(pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_widths() {
        assert_eq!(ReductionPlan::new(1, 32).widths(), &[1]);
        assert_eq!(ReductionPlan::new(32, 32).widths(), &[32, 1]);
        assert_eq!(ReductionPlan::new(33, 32).widths(), &[33, 2, 1]);
        assert_eq!(ReductionPlan::new(60000, 32).widths(), &[60000, 1875, 59, 2, 1]);
    }

    #[test]
    fn test_single_pass_when_row_fits_a_block() {
        for m in [1, 2, 31, 32] {
            let plan = ReductionPlan::new(m, 32);
            assert_eq!(plan.passes(), 1, "m = {m}");
            assert_eq!(plan.endpoints(0), (Endpoint::Input, Endpoint::Output));
            assert_eq!(plan.scratch_buffers(), 0);
            assert_eq!(plan.scratch_len(10), 0);
        }
        assert_eq!(ReductionPlan::new(1, 32).pass_widths(0), (1, 1));
    }

    #[test]
    fn test_endpoints_ping_pong_by_parity() {
        let plan = ReductionPlan::new(60000, 32);
        assert_eq!(plan.passes(), 4);
        assert_eq!(plan.endpoints(0), (Endpoint::Input, Endpoint::ScratchA));
        assert_eq!(plan.endpoints(1), (Endpoint::ScratchA, Endpoint::ScratchB));
        assert_eq!(plan.endpoints(2), (Endpoint::ScratchB, Endpoint::ScratchA));
        assert_eq!(plan.endpoints(3), (Endpoint::ScratchA, Endpoint::Output));
        assert_eq!(plan.scratch_buffers(), 2);
        assert_eq!(plan.scratch_len(3), 1875 * 3);
    }

    #[test]
    fn test_two_pass_plan_uses_one_scratch() {
        let plan = ReductionPlan::new(100, 32);
        assert_eq!(plan.passes(), 2);
        assert_eq!(plan.scratch_buffers(), 1);
        assert_eq!(plan.endpoints(1), (Endpoint::ScratchA, Endpoint::Output));
    }

    #[test]
    fn test_records_respect_stride() {
        let plan = ReductionPlan::new(100, 32);
        let stride = ReductionPlan::record_stride(256);
        assert_eq!(stride, 256);
        let words = plan.records(5, 2, stride);
        assert_eq!(words.len(), 128);
        assert_eq!(&words[0..4], &[100, 5, 2, 4]);
        assert_eq!(&words[64..68], &[4, 5, 2, 1]);
        assert_eq!(ReductionPlan::record_stride(4), 16);
    }

    #[test]
    fn test_constructor_rejects_zero_dims() {
        assert!(Sum2D::new(0, 4).is_err());
        assert!(Sum3D::new(4, 4, 0).is_err());
        let sum = Sum2D::new(10, 3).unwrap();
        assert!(!sum.is_setup());
    }
}
