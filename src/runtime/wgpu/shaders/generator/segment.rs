//! WGSL shader generation for the segmented-sum scatter phase

use super::common::{wgsl_type, workgroup_tree_sum, zero_literal};
use crate::dtype::DType;

/// Entry point of the scatter shader
pub const SEGMENT_SCATTER_ENTRY: &str = "segment_scatter";

/// Generate the block-partial scatter.
///
/// Workgroup `(b, s, n)` owns scratch slot `(n * K + s) * blocks + b`: it
/// sums the elements of column `n` in block `b` whose segment id equals `s`.
/// When the x grid is capped below `blocks`, workgroup `b` also covers
/// blocks `b + nwg.x`, `b + 2 * nwg.x` and so on. Every slot is written on
/// every launch, so segments absent from a block
/// contribute an exact zero and ids outside `[0, K)` match no workgroup.
pub fn generate_segment_scatter_shader(dtype: DType, threads_per_block: u32) -> String {
    let t = wgsl_type(dtype);
    let zero = zero_literal(dtype);
    let tree = workgroup_tree_sum(threads_per_block);

    format!(
        r#"// Auto-generated segmented-sum scatter for {t}

struct SegmentDims {{
    m: u32,
    n: u32,
    k: u32,
    blocks: u32,
}}

@group(0) @binding(0) var<storage, read> data: array<{t}>;
@group(0) @binding(1) var<storage, read> segment_ids: array<u32>;
@group(0) @binding(2) var<storage, read_write> partials: array<{t}>;
@group(0) @binding(3) var<uniform> dims: SegmentDims;

var<workgroup> partial: array<{t}, {threads_per_block}>;

@compute @workgroup_size({threads_per_block})
fn {SEGMENT_SCATTER_ENTRY}(@builtin(local_invocation_id) lid: vec3<u32>,
                   @builtin(workgroup_id) wid: vec3<u32>,
                   @builtin(num_workgroups) nwg: vec3<u32>) {{
    let tid = lid.x;
    let segment = wid.y;
    let column = wid.z;

    for (var block: u32 = wid.x; block < dims.blocks; block = block + nwg.x) {{
        let m = block * {threads_per_block}u + tid;
        var value: {t} = {zero};
        if (m < dims.m) {{
            if (segment_ids[m] == segment) {{
                value = data[column * dims.m + m];
            }}
        }}
        partial[tid] = value;
{tree}

        if (tid == 0u) {{
            partials[(column * dims.k + segment) * dims.blocks + block] = partial[0];
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
    fn test_scatter_reads_u32_ids() {
        let src = generate_segment_scatter_shader(DType::F32, 32);
        assert!(src.contains("var<storage, read> segment_ids: array<u32>"));
        assert!(src.contains("array<f32, 32>"));
    }
}
