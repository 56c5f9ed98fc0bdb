//! # wgstat
//!
//! **GPU kernels for statistical computing on WebGPU.**
//!
//! wgstat provides the building blocks for sampling and clustering on any
//! adapter wgpu can drive: a counter-based random number generator with
//! derived samplers, multi-pass tree reductions, segmented sums, layout
//! utilities and a brute-force nearest-neighbour search.
//!
//! ## Why wgstat?
//!
//! - **Deterministic**: every sampler is a pure function of a 128-bit key
//! - **No atomics**: segmented sums scatter into block partials and reduce
//! - **Explicit ownership**: kernels own their scratch and release it on drop
//! - **Host reference**: every kernel has a sequential twin in [`runtime::cpu`]
//!
//! ## Kernel lifecycle
//!
//! A kernel binds its dimensions at construction, validates caller buffers
//! and builds pipelines in `setup`, then records into a compute pass on every
//! [`Kernel::encode`](kernel::Kernel::encode):
//!
//! ```rust,ignore
//! use wgstat::prelude::*;
//!
//! let client = default_client()?;
//! let input = client.upload("input", &data);
//! let output = client.alloc::<f32>("column_sums", n);
//!
//! let mut sum = Sum2D::new(m, n)?;
//! sum.setup(&client, &input, &output)?;
//! client.run("column sums", &[&sum])?;
//! let sums: Vec<f32> = client.read_back(&output)?;
//! ```
//!
//! ## Modules
//!
//! - [`ops`]: reductions, segmented sums, transpose, broadcasts, nearest neighbour
//! - [`random`]: ThreeFry, key splitting, uniform/normal/categorical/gamma samplers
//! - [`models`]: k-means and Gaussian mixture sampling composites
//! - [`runtime`]: the wgpu backend and host reference kernels

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dtype;
pub mod error;
pub mod kernel;
pub mod models;
pub mod ops;
pub mod random;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::{DType, Element};
    pub use crate::error::{Error, Result};
    pub use crate::kernel::{Kernel, KernelConfig};
    pub use crate::models::{GaussianMixtureSampler, KMeans};
    pub use crate::ops::{
        BinaryOp, ClosestPairwiseLoop, Count, MatVecElementwise, ScaleAndShiftIndexed2D, Sum2D,
        Sum3D, Transpose, UnsortedSegmentSum, UnsortedSegmentSum2D,
    };
    pub use crate::random::{
        Categorical, CopyKey, Gamma, KeySplitter, Normal, ThreeFry, Uniform,
    };
    pub use crate::runtime::wgpu::{
        GpuBuffer, WgpuClient, WgpuDevice, default_client, get_or_create_client,
        is_wgpu_available,
    };
}
