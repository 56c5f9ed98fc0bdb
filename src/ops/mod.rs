//! Deterministic compute kernels
//!
//! ```text
//! Sum2D / Sum3D            multi-pass leading-axis tree reduction
//!   └── UnsortedSegmentSum[2D]   block-partial scatter + reduction
//!         └── Count              segmented sum of ones
//! Transpose                tiled layout permutation
//! MatVecElementwise        row-broadcast add/sub/mul/div
//! ScaleAndShiftIndexed2D   per-group affine transform
//! ClosestPairwiseLoop      nearest reference index
//! ```

pub mod closest;
pub mod elementwise;
pub mod reduce;
pub mod segment;
pub mod transpose;

pub use closest::ClosestPairwiseLoop;
pub use elementwise::{BinaryOp, MatVecElementwise, ScaleAndShiftIndexed2D};
pub use reduce::{Endpoint, ReductionPlan, Sum2D, Sum3D};
pub use segment::{Count, UnsortedSegmentSum, UnsortedSegmentSum2D};
pub use transpose::Transpose;
