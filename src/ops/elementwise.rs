//! Row-broadcast arithmetic and the indexed affine transform.

use tracing::debug;
use wgpu::ComputePass;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelConfig, dim, expect_buffer, expect_dtype, extent};
use crate::runtime::wgpu::shaders::generator::{
    MATVEC_ENTRY, SCALE_SHIFT_ENTRY, generate_matvec_shader, generate_scale_shift_shader,
};
use crate::runtime::wgpu::shaders::pipeline::linear_grid;
use crate::runtime::wgpu::shaders::{Dispatch, LayoutKey};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

/// Binary operation applied by [`MatVecElementwise`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`; float division by zero yields inf or NaN
    Divide,
}

impl BinaryOp {
    /// WGSL operator token
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }

    /// Lowercase name, used in pipeline cache keys
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "sub",
            Self::Multiply => "mul",
            Self::Divide => "div",
        }
    }
}

struct ElementwiseState {
    dispatch: Dispatch,
    _dims: GpuBuffer,
}

fn encode_state(
    kernel: &'static str,
    state: &Option<ElementwiseState>,
    pass: &mut ComputePass<'_>,
) -> Result<()> {
    let state = state.as_ref().ok_or(Error::NotSetUp { kernel })?;
    state.dispatch.record(pass);
    Ok(())
}

// ============================================================================
// MatVecElementwise
// ============================================================================

/// `output[i * N + j] = matrix[i * N + j] op vector[i]` for an `(M, N)` matrix.
pub struct MatVecElementwise {
    m: usize,
    n: usize,
    op: BinaryOp,
    config: KernelConfig,
    state: Option<ElementwiseState>,
}

impl MatVecElementwise {
    /// Bind dimensions and the operation.
    pub fn new(m: usize, n: usize, op: BinaryOp) -> Result<Self> {
        Self::with_config(m, n, op, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(m: usize, n: usize, op: BinaryOp, config: KernelConfig) -> Result<Self> {
        dim("m", m)?;
        dim("n", n)?;
        extent("m * n", &[m, n])?;
        Ok(Self {
            m,
            n,
            op,
            config,
            state: None,
        })
    }

    /// The bound operation.
    pub fn op(&self) -> BinaryOp {
        self.op
    }

    /// Validate `matrix` (`M * N`), `vector` (`M`) and `output` (`M * N`).
    pub fn setup(
        &mut self,
        client: &WgpuClient,
        matrix: &GpuBuffer,
        vector: &GpuBuffer,
        output: &GpuBuffer,
    ) -> Result<()> {
        let label = self.label();
        expect_dtype(label, "matrix", matrix, &[DType::F32, DType::I32, DType::U32])?;
        let dtype = matrix.dtype();
        // WGSL integer division by zero yields the dividend, not inf/NaN.
        if self.op == BinaryOp::Divide && dtype.is_int() {
            return Err(Error::UnsupportedDType {
                dtype,
                op: "MatVecElementwise(Divide)",
            });
        }
        expect_buffer(label, "matrix", matrix, dtype, self.m * self.n)?;
        expect_buffer(label, "vector", vector, dtype, self.m)?;
        expect_buffer(label, "output", output, dtype, self.m * self.n)?;
        self.state = None;

        let t = self.config.threads_per_block();
        let grid = linear_grid(label, self.m * self.n, t, client.max_workgroups_per_dimension())?;
        let dims = client.upload_uniform("matvec_dims", &[self.m as u32, self.n as u32, 0, 0]);

        let cache = client.pipeline_cache();
        let op = self.op;
        let name = format!("matvec_{}_{}_t{t}", op.name(), dtype.name());
        let module =
            cache.get_or_create_module(&name, || generate_matvec_shader(dtype, t, op.symbol()));
        let layout = cache.get_or_create_layout(LayoutKey::with_params(2, 1));
        let pipeline = cache.get_or_create_pipeline(&name, MATVEC_ENTRY, &module, &layout);
        let bind_group = cache.create_bind_group(
            &layout,
            &[matrix.raw(), vector.raw(), output.raw(), dims.raw()],
        );

        debug!(kernel = label, m = self.m, n = self.n, op = op.name(), "matvec set up");

        self.state = Some(ElementwiseState {
            dispatch: Dispatch::new(pipeline, bind_group, grid),
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for MatVecElementwise {
    fn label(&self) -> &'static str {
        "MatVecElementwise"
    }

    fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        encode_state(self.label(), &self.state, pass)
    }
}

// ============================================================================
// ScaleAndShiftIndexed2D
// ============================================================================

/// In-place per-group affine transform of feature-major data.
///
/// For point `i` in group `a = assignments[i]` and feature `j`:
/// `data[j * M1 + i] = data[j * M1 + i] * scale[j * K + a] + shift[j * K + a]`.
pub struct ScaleAndShiftIndexed2D {
    m1: usize,
    m2: usize,
    k: usize,
    config: KernelConfig,
    state: Option<ElementwiseState>,
}

impl ScaleAndShiftIndexed2D {
    /// Bind `m1` points, `m2` features and `k` groups.
    pub fn new(m1: usize, m2: usize, k: usize) -> Result<Self> {
        Self::with_config(m1, m2, k, KernelConfig::default())
    }

    /// Bind dimensions with an explicit configuration.
    pub fn with_config(m1: usize, m2: usize, k: usize, config: KernelConfig) -> Result<Self> {
        dim("m1", m1)?;
        dim("m2", m2)?;
        dim("k", k)?;
        extent("m1 * m2", &[m1, m2])?;
        extent("m2 * k", &[m2, k])?;
        Ok(Self {
            m1,
            m2,
            k,
            config,
            state: None,
        })
    }

    /// Validate `assignments` (`M1`, u32), `scale` and `shift` (`M2 * K`)
    /// and `data` (`M2 * M1`, transformed in place).
    pub fn setup(
        &mut self,
        client: &WgpuClient,
        assignments: &GpuBuffer,
        scale: &GpuBuffer,
        shift: &GpuBuffer,
        data: &GpuBuffer,
    ) -> Result<()> {
        let label = self.label();
        expect_buffer(label, "assignments", assignments, DType::U32, self.m1)?;
        expect_buffer(label, "scale", scale, DType::F32, self.m2 * self.k)?;
        expect_buffer(label, "shift", shift, DType::F32, self.m2 * self.k)?;
        expect_buffer(label, "data", data, DType::F32, self.m1 * self.m2)?;
        self.state = None;

        let t = self.config.threads_per_block();
        let grid = linear_grid(label, self.m1 * self.m2, t, client.max_workgroups_per_dimension())?;
        let dims = client.upload_uniform(
            "scale_shift_dims",
            &[self.m1 as u32, self.m2 as u32, self.k as u32, 0],
        );

        let cache = client.pipeline_cache();
        let name = format!("scale_shift_indexed_t{t}");
        let module = cache.get_or_create_module(&name, || generate_scale_shift_shader(t));
        let layout = cache.get_or_create_layout(LayoutKey::with_params(3, 1));
        let pipeline = cache.get_or_create_pipeline(&name, SCALE_SHIFT_ENTRY, &module, &layout);
        let bind_group = cache.create_bind_group(
            &layout,
            &[
                assignments.raw(),
                scale.raw(),
                shift.raw(),
                data.raw(),
                dims.raw(),
            ],
        );

        debug!(kernel = label, m1 = self.m1, m2 = self.m2, k = self.k, "scale and shift set up");

        self.state = Some(ElementwiseState {
            dispatch: Dispatch::new(pipeline, bind_group, grid),
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for ScaleAndShiftIndexed2D {
    fn label(&self) -> &'static str {
        "ScaleAndShiftIndexed2D"
    }

    fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        encode_state(self.label(), &self.state, pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_tokens() {
        assert_eq!(BinaryOp::Add.symbol(), "+");
        assert_eq!(BinaryOp::Subtract.symbol(), "-");
        assert_eq!(BinaryOp::Multiply.symbol(), "*");
        assert_eq!(BinaryOp::Divide.symbol(), "/");
        assert_eq!(BinaryOp::Divide.name(), "div");
    }

    #[test]
    fn test_constructors_validate_dims() {
        assert!(MatVecElementwise::new(3, 0, BinaryOp::Add).is_err());
        assert!(ScaleAndShiftIndexed2D::new(10, 2, 0).is_err());
        let op = MatVecElementwise::new(3, 4, BinaryOp::Multiply).unwrap();
        assert_eq!(op.op(), BinaryOp::Multiply);
        assert!(!op.is_setup());
    }
}
