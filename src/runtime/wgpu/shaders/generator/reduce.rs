//! WGSL shader generation for the multi-pass leading-axis sum

use super::common::{wgsl_type, workgroup_tree_sum, zero_literal};
use crate::dtype::DType;

/// Entry point of the sum pass shader
pub const SUM_PASS_ENTRY: &str = "sum_pass";

/// Generate one reduction pass.
///
/// The source holds rows of `width` contiguous elements, one row per
/// `(n, k)` pair. Workgroup `(b, n, k)` sums elements
/// `[b * T, (b + 1) * T)` of row `n * K + k` and writes the result to slot
/// `b` of that row in the destination, whose rows are `next_width` long.
/// When the x grid is capped below `next_width`, workgroup `b` also covers
/// blocks `b + nwg.x`, `b + 2 * nwg.x` and so on.
/// The pass dimensions come from a dynamically offset uniform record.
pub fn generate_sum_pass_shader(dtype: DType, threads_per_block: u32) -> String {
    let t = wgsl_type(dtype);
    let zero = zero_literal(dtype);
    let tree = workgroup_tree_sum(threads_per_block);

    format!(
        r#"// Auto-generated leading-axis sum pass for {t}

struct PassDims {{
    width: u32,
    n: u32,
    k: u32,
    next_width: u32,
}}

@group(0) @binding(0) var<storage, read> pass_input: array<{t}>;
@group(0) @binding(1) var<storage, read_write> pass_output: array<{t}>;
@group(0) @binding(2) var<uniform> dims: PassDims;

var<workgroup> partial: array<{t}, {threads_per_block}>;

@compute @workgroup_size({threads_per_block})
fn {SUM_PASS_ENTRY}(@builtin(local_invocation_id) lid: vec3<u32>,
            @builtin(workgroup_id) wid: vec3<u32>,
            @builtin(num_workgroups) nwg: vec3<u32>) {{
    let tid = lid.x;
    let row = wid.y * dims.k + wid.z;

    for (var block: u32 = wid.x; block < dims.next_width; block = block + nwg.x) {{
        let m = block * {threads_per_block}u + tid;
        var value: {t} = {zero};
        if (m < dims.width) {{
            value = pass_input[row * dims.width + m];
        }}
        partial[tid] = value;
{tree}

        if (tid == 0u) {{
            pass_output[row * dims.next_width + block] = partial[0];
        }}
    }}
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_pass_bakes_type_and_block() {
        let src = generate_sum_pass_shader(DType::U32, 64);
        assert!(src.contains("array<u32, 64>"));
        assert!(src.contains("@workgroup_size(64)"));
        assert!(src.contains("var value: u32 = 0u"));
        assert!(src.contains("fn sum_pass"));
        assert!(src.contains("block = block + nwg.x"));
    }
}
