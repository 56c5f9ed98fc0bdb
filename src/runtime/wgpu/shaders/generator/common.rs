//! Common helper functions for WGSL shader generation

use crate::dtype::DType;

/// WGSL type name for a given DType
pub fn wgsl_type(dtype: DType) -> &'static str {
    match dtype {
        DType::F32 => "f32",
        DType::I32 => "i32",
        DType::U32 => "u32",
    }
}

/// Typed zero literal
pub fn zero_literal(dtype: DType) -> &'static str {
    match dtype {
        DType::F32 => "0.0",
        DType::I32 => "0i",
        DType::U32 => "0u",
    }
}

/// WGSL float literal that parses back to exactly `value`
///
/// Callers must reject non-finite values first; WGSL has no literal for them.
pub fn float_literal(value: f32) -> String {
    let text = format!("{:?}", value);
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{text}.0")
    }
}

/// Flat invocation index for launches laid out by `linear_grid`.
pub fn linear_index_fn(threads_per_block: u32) -> String {
    format!(
        r#"fn linear_index(wid: vec3<u32>, nwg: vec3<u32>, lid: vec3<u32>) -> u32 {{
    return (wid.y * nwg.x + wid.x) * {threads_per_block}u + lid.x;
}}"#
    )
}

/// Builtin parameters shared by every `linear_index` entry point.
pub const LINEAR_ENTRY_ARGS: &str = "@builtin(workgroup_id) wid: vec3<u32>,
        @builtin(num_workgroups) nwg: vec3<u32>,
        @builtin(local_invocation_id) lid: vec3<u32>";

/// Shared-memory tree sum of `partial[0..threads_per_block]` into `partial[0]`.
///
/// Every invocation of the workgroup must reach this code.
pub fn workgroup_tree_sum(threads_per_block: u32) -> String {
    format!(
        r#"    workgroupBarrier();
    for (var stride: u32 = {half}u; stride > 0u; stride = stride >> 1u) {{
        if (tid < stride) {{
            partial[tid] = partial[tid] + partial[tid + stride];
        }}
        workgroupBarrier();
    }}"#,
        half = threads_per_block / 2
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_literal_round_trips() {
        assert_eq!(float_literal(2.0), "2.0");
        assert_eq!(float_literal(0.5), "0.5");
        assert_eq!(float_literal(1e-10), "1e-10");
        for v in [0.1f32, 3.7, 1234.5678, 1.0e-7] {
            assert_eq!(float_literal(v).parse::<f32>().unwrap(), v);
        }
    }

    #[test]
    fn test_tree_sum_halves_from_block() {
        let src = workgroup_tree_sum(64);
        assert!(src.contains("stride: u32 = 32u"));
    }
}
