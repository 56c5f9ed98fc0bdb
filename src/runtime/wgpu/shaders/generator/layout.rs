//! WGSL shader generation for transpose and row-broadcast elementwise ops

use super::common::{LINEAR_ENTRY_ARGS, linear_index_fn, wgsl_type};
use crate::dtype::DType;

/// Entry point of the transpose shader
pub const TRANSPOSE_ENTRY: &str = "transpose_tiled";
/// Entry point of the matrix-vector broadcast shader
pub const MATVEC_ENTRY: &str = "matvec_elementwise";
/// Entry point of the indexed scale-and-shift shader
pub const SCALE_SHIFT_ENTRY: &str = "scale_and_shift_indexed";

/// Generate a tiled transpose of a row-major `(rows, cols)` matrix.
///
/// Each `tile x tile` workgroup stages its block through shared memory so
/// that both the load and the store walk contiguous addresses. The tile row
/// is padded by one element to avoid bank conflicts on the transposed read.
pub fn generate_transpose_shader(dtype: DType, tile: u32) -> String {
    let t = wgsl_type(dtype);
    let pitch = tile + 1;

    format!(
        r#"// Auto-generated tiled transpose for {t}

struct TransposeDims {{
    rows: u32,
    cols: u32,
    _pad0: u32,
    _pad1: u32,
}}

@group(0) @binding(0) var<storage, read> source: array<{t}>;
@group(0) @binding(1) var<storage, read_write> transposed: array<{t}>;
@group(0) @binding(2) var<uniform> dims: TransposeDims;

var<workgroup> tile: array<{t}, {size}>;

@compute @workgroup_size({tile}, {tile})
fn {TRANSPOSE_ENTRY}(@builtin(local_invocation_id) lid: vec3<u32>,
             @builtin(workgroup_id) wid: vec3<u32>) {{
    let col = wid.x * {tile}u + lid.x;
    let row = wid.y * {tile}u + lid.y;
    if (row < dims.rows && col < dims.cols) {{
        tile[lid.y * {pitch}u + lid.x] = source[row * dims.cols + col];
    }}
    workgroupBarrier();

    let out_row = wid.x * {tile}u + lid.y;
    let out_col = wid.y * {tile}u + lid.x;
    if (out_row < dims.cols && out_col < dims.rows) {{
        transposed[out_row * dims.rows + out_col] = tile[lid.x * {pitch}u + lid.y];
    }}
}}
"#,
        size = tile * pitch,
    )
}

/// Generate `out[i * cols + j] = matrix[i * cols + j] <operator> vector[i]`.
pub fn generate_matvec_shader(dtype: DType, threads_per_block: u32, operator: &str) -> String {
    let t = wgsl_type(dtype);
    let index_fn = linear_index_fn(threads_per_block);

    format!(
        r#"// Auto-generated row-broadcast `{operator}` for {t}

struct MatVecDims {{
    rows: u32,
    cols: u32,
    _pad0: u32,
    _pad1: u32,
}}

@group(0) @binding(0) var<storage, read> lhs: array<{t}>;
@group(0) @binding(1) var<storage, read> row_values: array<{t}>;
@group(0) @binding(2) var<storage, read_write> result: array<{t}>;
@group(0) @binding(3) var<uniform> dims: MatVecDims;

{index_fn}

@compute @workgroup_size({threads_per_block})
fn {MATVEC_ENTRY}({LINEAR_ENTRY_ARGS}) {{
    let idx = linear_index(wid, nwg, lid);
    if (idx >= dims.rows * dims.cols) {{
        return;
    }}
    let row = idx / dims.cols;
    result[idx] = lhs[idx] {operator} row_values[row];
}}
"#
    )
}

/// Generate the in-place per-assignment affine transform.
///
/// Data is feature-major `(features, points)`; scale and shift are
/// `(features, groups)`. Points assigned outside `[0, groups)` are left
/// unchanged.
pub fn generate_scale_shift_shader(threads_per_block: u32) -> String {
    let index_fn = linear_index_fn(threads_per_block);

    format!(
        r#"// Auto-generated indexed scale-and-shift

struct ScaleShiftDims {{
    points: u32,
    features: u32,
    groups: u32,
    _pad0: u32,
}}

@group(0) @binding(0) var<storage, read> assignments: array<u32>;
@group(0) @binding(1) var<storage, read> scale: array<f32>;
@group(0) @binding(2) var<storage, read> shift: array<f32>;
@group(0) @binding(3) var<storage, read_write> data: array<f32>;
@group(0) @binding(4) var<uniform> dims: ScaleShiftDims;

{index_fn}

@compute @workgroup_size({threads_per_block})
fn {SCALE_SHIFT_ENTRY}({LINEAR_ENTRY_ARGS}) {{
    let idx = linear_index(wid, nwg, lid);
    if (idx >= dims.points * dims.features) {{
        return;
    }}
    let feature = idx / dims.points;
    let point = idx % dims.points;
    let group = assignments[point];
    if (group >= dims.groups) {{
        return;
    }}
    let param = feature * dims.groups + group;
    data[idx] = data[idx] * scale[param] + shift[param];
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_tile_is_padded() {
        let src = generate_transpose_shader(DType::F32, 8);
        assert!(src.contains("array<f32, 72>"));
        assert!(src.contains("@workgroup_size(8, 8)"));
    }

    #[test]
    fn test_matvec_bakes_operator() {
        let src = generate_matvec_shader(DType::F32, 32, "/");
        assert!(src.contains("lhs[idx] / row_values[row]"));
    }

    #[test]
    fn test_scale_shift_skips_foreign_groups() {
        let src = generate_scale_shift_shader(32);
        assert!(src.contains("if (group >= dims.groups)"));
    }
}
