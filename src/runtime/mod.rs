//! Compute backends
//!
//! `wgpu` runs the kernels; `cpu` holds sequential host implementations of
//! the same operations, used to check device output.

pub mod cpu;
pub mod wgpu;
