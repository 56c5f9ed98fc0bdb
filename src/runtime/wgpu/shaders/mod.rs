//! WGSL shaders and pipeline plumbing for the WebGPU backend

pub mod generator;
pub mod pipeline;

pub use pipeline::{DIMS_RECORD_SIZE, Dispatch, LayoutKey, PipelineCache};
