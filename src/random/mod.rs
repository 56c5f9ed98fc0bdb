//! Counter-based random number generation
//!
//! ```text
//! ThreeFry(key, blocks) ── raw u32 words, block i = threefry(ctr = (i,0,0,0), key)
//!   ├── Uniform      words -> [0, 1)
//!   ├── Normal       word pairs -> Box-Muller deviates
//!   ├── Categorical  K words per draw -> Gumbel-max label
//!   └── KeySplitter  ThreeFry(2 blocks) -> CopyKey(0), CopyKey(1)
//!         └── Gamma  Uniform(4N, key A) + Normal(4N, key B) -> Marsaglia-Tsang
//! ```
//!
//! Every sampler is a pure function of its key buffer: re-encoding without
//! changing the key reproduces the same output bit for bit.

pub mod categorical;
pub mod gamma;
pub mod normal;
pub mod split;
pub mod threefry;
pub mod uniform;

pub use categorical::Categorical;
pub use gamma::Gamma;
pub use normal::Normal;
pub use split::{CopyKey, KeySplitter};
pub use threefry::ThreeFry;
pub use uniform::Uniform;

use crate::error::Result;
use crate::kernel::KernelConfig;
use crate::runtime::wgpu::shaders::pipeline::linear_grid;
use crate::runtime::wgpu::shaders::{Dispatch, LayoutKey};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

/// Words in a key.
pub const KEY_WORDS: usize = 4;

/// State shared by the samplers that transform a private word stream.
struct TransformState {
    dispatch: Dispatch,
    _words: GpuBuffer,
    _dims: GpuBuffer,
}

/// Description of a one-dispatch transform over `threads` invocations.
struct TransformSpec<'a> {
    label: &'static str,
    name: String,
    entry: &'static str,
    layout: LayoutKey,
    buffers: &'a [&'a wgpu::Buffer],
    threads: usize,
}

fn build_transform(
    client: &WgpuClient,
    config: KernelConfig,
    spec: TransformSpec<'_>,
    source: impl FnOnce() -> String,
) -> Result<Dispatch> {
    let grid = linear_grid(
        spec.label,
        spec.threads,
        config.threads_per_block(),
        client.max_workgroups_per_dimension(),
    )?;
    let cache = client.pipeline_cache();
    let module = cache.get_or_create_module(&spec.name, source);
    let layout = cache.get_or_create_layout(spec.layout);
    let pipeline = cache.get_or_create_pipeline(&spec.name, spec.entry, &module, &layout);
    let bind_group = cache.create_bind_group(&layout, spec.buffers);
    Ok(Dispatch::new(pipeline, bind_group, grid))
}

/// ThreeFry blocks needed to supply `words` words.
#[inline]
pub(crate) fn blocks_for(words: usize) -> usize {
    words.div_ceil(KEY_WORDS)
}
