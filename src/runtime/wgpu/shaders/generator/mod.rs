//! WGSL source generators
//!
//! Each generator bakes the element type, threads-per-block and any
//! operation constants into the shader text; the pipeline cache keys
//! compiled modules by the same parameters.

pub mod closest;
pub mod common;
pub mod layout;
pub mod random;
pub mod reduce;
pub mod segment;

pub use closest::{CLOSEST_ENTRY, generate_closest_shader};
pub use common::wgsl_type;
pub use layout::{
    MATVEC_ENTRY, SCALE_SHIFT_ENTRY, TRANSPOSE_ENTRY, generate_matvec_shader,
    generate_scale_shift_shader, generate_transpose_shader,
};
pub use random::{
    CATEGORICAL_ENTRY, COPY_KEY_ENTRY, GAMMA_ENTRY, NORMAL_ENTRY, THREEFRY_ENTRY, UNIFORM_ENTRY,
    generate_categorical_shader, generate_copy_key_shader, generate_gamma_shader,
    generate_normal_shader, generate_threefry_shader, generate_uniform_shader,
};
pub use reduce::{SUM_PASS_ENTRY, generate_sum_pass_shader};
pub use segment::{SEGMENT_SCATTER_ENTRY, generate_segment_scatter_shader};
