//! WGSL shader generation for brute-force nearest reference search

use super::common::{LINEAR_ENTRY_ARGS, float_literal, linear_index_fn};

/// Entry point of the closest-pair shader
pub const CLOSEST_ENTRY: &str = "closest_pairwise";

/// Generate the nearest-reference search.
///
/// Both point sets are feature-major: feature `l` of query `i` lives at
/// `i + l * queries`, of reference `j` at `j + l * references`. Only a
/// strictly smaller squared distance replaces the current best, so the
/// lowest reference index wins ties and NaN distances never win. The search
/// starts from the largest finite `f32`; the first reference at exactly that
/// distance is still taken.
pub fn generate_closest_shader(threads_per_block: u32) -> String {
    let index_fn = linear_index_fn(threads_per_block);
    let max_distance = float_literal(f32::MAX);

    format!(
        r#"// Auto-generated closest-pairwise loop

struct ClosestDims {{
    queries: u32,
    references: u32,
    features: u32,
    _pad0: u32,
}}

@group(0) @binding(0) var<storage, read> query_points: array<f32>;
@group(0) @binding(1) var<storage, read> reference_points: array<f32>;
@group(0) @binding(2) var<storage, read_write> nearest: array<u32>;
@group(0) @binding(3) var<uniform> dims: ClosestDims;

{index_fn}

@compute @workgroup_size({threads_per_block})
fn {CLOSEST_ENTRY}({LINEAR_ENTRY_ARGS}) {{
    let i = linear_index(wid, nwg, lid);
    if (i >= dims.queries) {{
        return;
    }}

    var best: u32 = 0u;
    var best_distance: f32 = {max_distance};
    var found = false;
    for (var j: u32 = 0u; j < dims.references; j = j + 1u) {{
        var dist2: f32 = 0.0;
        for (var l: u32 = 0u; l < dims.features; l = l + 1u) {{
            let diff = query_points[i + l * dims.queries] - reference_points[j + l * dims.references];
            dist2 = dist2 + diff * diff;
        }}
        if (dist2 < best_distance || (!found && dist2 == best_distance)) {{
            best_distance = dist2;
            best = j;
            found = true;
        }}
    }}
    nearest[i] = best;
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_uses_strict_comparison() {
        let src = generate_closest_shader(32);
        assert!(src.contains("if (dist2 < best_distance ||"));
        assert!(src.contains("best_distance: f32 = 3.4028235e38"));
    }
}
