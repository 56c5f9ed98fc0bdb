//! WGSL shader generation for the counter-based generator and its samplers
//!
//! All samplers consume raw ThreeFry words produced by a separate dispatch,
//! so the bit stream for a given key is identical whichever sampler reads it.

use super::common::{LINEAR_ENTRY_ARGS, float_literal, linear_index_fn};

/// Entry point of the ThreeFry block shader
pub const THREEFRY_ENTRY: &str = "threefry_blocks";
/// Entry point of the key copy shader
pub const COPY_KEY_ENTRY: &str = "copy_key";
/// Entry point of the uniform transform
pub const UNIFORM_ENTRY: &str = "uniform_transform";
/// Entry point of the Box-Muller transform
pub const NORMAL_ENTRY: &str = "normal_transform";
/// Entry point of the Gumbel-max categorical draw
pub const CATEGORICAL_ENTRY: &str = "categorical_draw";
/// Entry point of the Marsaglia-Tsang gamma transform
pub const GAMMA_ENTRY: &str = "gamma_transform";

/// Maps the top 24 bits of a word onto `[0, 1)` exactly.
const UNIT_FLOAT_FN: &str = r#"const UNIT_SCALE: f32 = 5.9604644775390625e-8;

fn unit_float(word: u32) -> f32 {
    return f32(word >> 8u) * UNIT_SCALE;
}"#;

/// ThreeFry4x32 with 20 rounds, counter `(i, 0, 0, 0)` for block `i`.
pub fn generate_threefry_shader(threads_per_block: u32) -> String {
    let index_fn = linear_index_fn(threads_per_block);

    format!(
        r#"// Auto-generated ThreeFry4x32-20 block generator

struct BlockDims {{
    blocks: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}}

@group(0) @binding(0) var<storage, read> key: array<u32>;
@group(0) @binding(1) var<storage, read_write> words: array<u32>;
@group(0) @binding(2) var<uniform> dims: BlockDims;

const SKEIN_KS_PARITY: u32 = 0x1BD11BDAu;

fn rotl(x: u32, n: u32) -> u32 {{
    return (x << n) | (x >> (32u - n));
}}

fn threefry4x32_20(ctr: vec4<u32>, k: vec4<u32>) -> vec4<u32> {{
    var rotations = array<vec2<u32>, 8>(
        vec2<u32>(10u, 26u), vec2<u32>(11u, 21u), vec2<u32>(13u, 27u), vec2<u32>(23u, 5u),
        vec2<u32>(6u, 20u), vec2<u32>(17u, 11u), vec2<u32>(25u, 10u), vec2<u32>(18u, 20u),
    );
    var ks = array<u32, 5>(k.x, k.y, k.z, k.w, SKEIN_KS_PARITY ^ k.x ^ k.y ^ k.z ^ k.w);

    var x0 = ctr.x + ks[0];
    var x1 = ctr.y + ks[1];
    var x2 = ctr.z + ks[2];
    var x3 = ctr.w + ks[3];

    for (var rnd: u32 = 0u; rnd < 20u; rnd = rnd + 1u) {{
        let r = rotations[rnd % 8u];
        x0 = x0 + x1;
        x1 = rotl(x1, r.x) ^ x0;
        x2 = x2 + x3;
        x3 = rotl(x3, r.y) ^ x2;
        let carry = x1;
        x1 = x3;
        x3 = carry;

        if ((rnd + 1u) % 4u == 0u) {{
            let s = (rnd + 1u) / 4u;
            x0 = x0 + ks[s % 5u];
            x1 = x1 + ks[(s + 1u) % 5u];
            x2 = x2 + ks[(s + 2u) % 5u];
            x3 = x3 + ks[(s + 3u) % 5u] + s;
        }}
    }}
    return vec4<u32>(x0, x1, x2, x3);
}}

{index_fn}

@compute @workgroup_size({threads_per_block})
fn {THREEFRY_ENTRY}({LINEAR_ENTRY_ARGS}) {{
    let i = linear_index(wid, nwg, lid);
    if (i >= dims.blocks) {{
        return;
    }}
    let block = threefry4x32_20(
        vec4<u32>(i, 0u, 0u, 0u),
        vec4<u32>(key[0], key[1], key[2], key[3]),
    );
    words[4u * i] = block.x;
    words[4u * i + 1u] = block.y;
    words[4u * i + 2u] = block.z;
    words[4u * i + 3u] = block.w;
}}
"#
    )
}

/// Copies words `[4 * slot, 4 * slot + 4)` of the source into a 4-word key.
pub fn generate_copy_key_shader() -> String {
    format!(
        r#"// Auto-generated key slice copy

struct SlotDims {{
    slot: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}}

@group(0) @binding(0) var<storage, read> source_words: array<u32>;
@group(0) @binding(1) var<storage, read_write> key_out: array<u32>;
@group(0) @binding(2) var<uniform> dims: SlotDims;

@compute @workgroup_size(4)
fn {COPY_KEY_ENTRY}(@builtin(local_invocation_id) lid: vec3<u32>) {{
    key_out[lid.x] = source_words[dims.slot * 4u + lid.x];
}}
"#
    )
}

/// `out[i] = unit_float(words[i])` for `i < n`.
pub fn generate_uniform_shader(threads_per_block: u32) -> String {
    let index_fn = linear_index_fn(threads_per_block);

    format!(
        r#"// Auto-generated uniform transform

struct SampleDims {{
    n: u32,
    k: u32,
    _pad0: u32,
    _pad1: u32,
}}

@group(0) @binding(0) var<storage, read> words: array<u32>;
@group(0) @binding(1) var<storage, read_write> samples: array<f32>;
@group(0) @binding(2) var<uniform> dims: SampleDims;

{UNIT_FLOAT_FN}

{index_fn}

@compute @workgroup_size({threads_per_block})
fn {UNIFORM_ENTRY}({LINEAR_ENTRY_ARGS}) {{
    let i = linear_index(wid, nwg, lid);
    if (i >= dims.n) {{
        return;
    }}
    samples[i] = unit_float(words[i]);
}}
"#
    )
}

/// Box-Muller over word pairs `(2i, 2i + 1)`, writing `2i` and `2i + 1`.
pub fn generate_normal_shader(threads_per_block: u32) -> String {
    let index_fn = linear_index_fn(threads_per_block);

    format!(
        r#"// Auto-generated Box-Muller transform

struct SampleDims {{
    n: u32,
    k: u32,
    _pad0: u32,
    _pad1: u32,
}}

@group(0) @binding(0) var<storage, read> words: array<u32>;
@group(0) @binding(1) var<storage, read_write> samples: array<f32>;
@group(0) @binding(2) var<uniform> dims: SampleDims;

const TWO_PI: f32 = 6.283185307179586;

{UNIT_FLOAT_FN}

{index_fn}

@compute @workgroup_size({threads_per_block})
fn {NORMAL_ENTRY}({LINEAR_ENTRY_ARGS}) {{
    let pair = linear_index(wid, nwg, lid);
    let first = 2u * pair;
    if (first >= dims.n) {{
        return;
    }}
    // Shifted by one step so the radius argument is never zero.
    let u1 = f32((words[first] >> 8u) + 1u) * UNIT_SCALE;
    let u2 = unit_float(words[first + 1u]);
    let radius = sqrt(-2.0 * log(u1));
    let theta = TWO_PI * u2;
    samples[first] = radius * cos(theta);
    if (first + 1u < dims.n) {{
        samples[first + 1u] = radius * sin(theta);
    }}
}}
"#
    )
}

/// Gumbel-max draw over `k` log-probabilities using `k` words per sample.
pub fn generate_categorical_shader(threads_per_block: u32) -> String {
    let index_fn = linear_index_fn(threads_per_block);

    format!(
        r#"// Auto-generated Gumbel-max categorical draw

struct SampleDims {{
    n: u32,
    k: u32,
    _pad0: u32,
    _pad1: u32,
}}

@group(0) @binding(0) var<storage, read> words: array<u32>;
@group(0) @binding(1) var<storage, read> log_probs: array<f32>;
@group(0) @binding(2) var<storage, read_write> labels: array<u32>;
@group(0) @binding(3) var<uniform> dims: SampleDims;

{UNIT_FLOAT_FN}

{index_fn}

@compute @workgroup_size({threads_per_block})
fn {CATEGORICAL_ENTRY}({LINEAR_ENTRY_ARGS}) {{
    let i = linear_index(wid, nwg, lid);
    if (i >= dims.n) {{
        return;
    }}
    var best: u32 = 0u;
    var best_score: f32 = -3.0e38;
    for (var c: u32 = 0u; c < dims.k; c = c + 1u) {{
        let u = max(unit_float(words[i * dims.k + c]), UNIT_SCALE);
        let score = log_probs[c] - log(-log(u));
        if (score > best_score) {{
            best_score = score;
            best = c;
        }}
    }}
    labels[i] = best;
}}
"#
    )
}

/// Marsaglia-Tsang gamma transform with `shape` and `scale` baked in.
///
/// Output `i` tries candidates from slots `4i..4i+4` of the uniform and
/// normal streams. For `shape < 1` the draw is made at `shape + 1` and
/// boosted by `U^(1/shape)`, where `U` takes slot `4i + 3`.
pub fn generate_gamma_shader(threads_per_block: u32, shape: f32, scale: f32) -> String {
    let index_fn = linear_index_fn(threads_per_block);
    let shape = float_literal(shape);
    let scale = float_literal(scale);

    format!(
        r#"// Auto-generated Marsaglia-Tsang gamma transform

struct SampleDims {{
    n: u32,
    k: u32,
    _pad0: u32,
    _pad1: u32,
}}

@group(0) @binding(0) var<storage, read> uniforms: array<f32>;
@group(0) @binding(1) var<storage, read> normals: array<f32>;
@group(0) @binding(2) var<storage, read_write> samples: array<f32>;
@group(0) @binding(3) var<uniform> dims: SampleDims;

const SHAPE: f32 = {shape};
const SCALE: f32 = {scale};
const TINY: f32 = 5.9604644775390625e-8;

{index_fn}

@compute @workgroup_size({threads_per_block})
fn {GAMMA_ENTRY}({LINEAR_ENTRY_ARGS}) {{
    let i = linear_index(wid, nwg, lid);
    if (i >= dims.n) {{
        return;
    }}
    let base = 4u * i;

    var alpha = SHAPE;
    var boost = 1.0;
    var candidates = 4u;
    if (SHAPE < 1.0) {{
        alpha = SHAPE + 1.0;
        boost = pow(max(uniforms[base + 3u], TINY), 1.0 / SHAPE);
        candidates = 3u;
    }}

    let d = alpha - 1.0 / 3.0;
    let c = 1.0 / sqrt(9.0 * d);
    var value = d;
    for (var s: u32 = 0u; s < candidates; s = s + 1u) {{
        let x = normals[base + s];
        let t = 1.0 + c * x;
        if (t <= 0.0) {{
            continue;
        }}
        let v = t * t * t;
        let u = max(uniforms[base + s], TINY);
        if (log(u) < 0.5 * x * x + d - d * v + d * log(v)) {{
            value = d * v;
            break;
        }}
    }}
    samples[i] = value * boost * SCALE;
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threefry_uses_random123_rotations() {
        let src = generate_threefry_shader(32);
        assert!(src.contains("vec2<u32>(10u, 26u)"));
        assert!(src.contains("vec2<u32>(18u, 20u)"));
        assert!(src.contains("0x1BD11BDAu"));
    }

    #[test]
    fn test_gamma_bakes_parameters() {
        let src = generate_gamma_shader(32, 0.5, 2.0);
        assert!(src.contains("const SHAPE: f32 = 0.5;"));
        assert!(src.contains("const SCALE: f32 = 2.0;"));
    }
}
