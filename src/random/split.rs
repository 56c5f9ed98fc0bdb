//! Sub-key derivation.
//!
//! Two samplers fed the same key draw the same words. Composite samplers
//! therefore never reuse their key directly: they run ThreeFry once over
//! two blocks and hand the first block to one child and the second block to
//! the other.

use tracing::debug;
use wgpu::ComputePass;

use super::{KEY_WORDS, ThreeFry};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, expect_buffer, expect_dtype};
use crate::runtime::wgpu::shaders::generator::{COPY_KEY_ENTRY, generate_copy_key_shader};
use crate::runtime::wgpu::shaders::{Dispatch, LayoutKey};
use crate::runtime::wgpu::{GpuBuffer, WgpuClient};

struct CopyKeyState {
    dispatch: Dispatch,
    _dims: GpuBuffer,
}

/// Copy words `[4 * slot, 4 * slot + 4)` of a word buffer into a key buffer.
pub struct CopyKey {
    slot: usize,
    state: Option<CopyKeyState>,
}

impl CopyKey {
    /// Bind the source block index.
    pub fn new(slot: usize) -> Result<Self> {
        u32::try_from(slot)
            .map_err(|_| Error::invalid_argument("slot", format!("{slot} does not fit in u32")))?;
        Ok(Self { slot, state: None })
    }

    /// Validate `source` (at least `4 * (slot + 1)` u32) and `key` (4 u32).
    pub fn setup(&mut self, client: &WgpuClient, source: &GpuBuffer, key: &GpuBuffer) -> Result<()> {
        let label = self.label();
        expect_dtype(label, "source", source, &[DType::U32])?;
        let needed = KEY_WORDS * (self.slot + 1);
        if source.len() < needed {
            return Err(Error::BufferSize {
                kernel: label,
                buffer: "source",
                expected: needed,
                got: source.len(),
            });
        }
        expect_buffer(label, "key", key, DType::U32, KEY_WORDS)?;
        self.state = None;

        let dims = client.upload_uniform("copy_key_dims", &[self.slot as u32, 0, 0, 0]);
        let cache = client.pipeline_cache();
        let module = cache.get_or_create_module("copy_key", generate_copy_key_shader);
        let layout = cache.get_or_create_layout(LayoutKey::with_params(1, 1));
        let pipeline = cache.get_or_create_pipeline("copy_key", COPY_KEY_ENTRY, &module, &layout);
        let bind_group = cache.create_bind_group(&layout, &[source.raw(), key.raw(), dims.raw()]);

        self.state = Some(CopyKeyState {
            dispatch: Dispatch::new(pipeline, bind_group, [1, 1, 1]),
            _dims: dims,
        });
        Ok(())
    }
}

impl Kernel for CopyKey {
    fn label(&self) -> &'static str {
        "CopyKey"
    }

    fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        let state = self.state.as_ref().ok_or(Error::NotSetUp {
            kernel: self.label(),
        })?;
        state.dispatch.record(pass);
        Ok(())
    }
}

struct SplitState {
    words: GpuBuffer,
    key_a: GpuBuffer,
    key_b: GpuBuffer,
}

/// Derive two independent sub-keys from one key.
///
/// The sub-keys are scratch owned by the splitter and rebuilt on every
/// `setup`; the parent key is only read.
pub struct KeySplitter {
    threefry: ThreeFry,
    copy_a: CopyKey,
    copy_b: CopyKey,
    state: Option<SplitState>,
}

impl KeySplitter {
    /// Create a splitter.
    pub fn new() -> Result<Self> {
        Ok(Self {
            threefry: ThreeFry::new(2)?,
            copy_a: CopyKey::new(0)?,
            copy_b: CopyKey::new(1)?,
            state: None,
        })
    }

    /// Validate `key` (4 u32) and allocate the sub-keys.
    pub fn setup(&mut self, client: &WgpuClient, key: &GpuBuffer) -> Result<()> {
        self.state = None;
        let words = client.alloc::<u32>("key_split_words", self.threefry.words());
        let key_a = client.alloc::<u32>("sub_key_a", KEY_WORDS);
        let key_b = client.alloc::<u32>("sub_key_b", KEY_WORDS);

        self.threefry.setup(client, key, &words)?;
        self.copy_a.setup(client, &words, &key_a)?;
        self.copy_b.setup(client, &words, &key_b)?;

        debug!(kernel = self.label(), "key splitter set up");
        self.state = Some(SplitState {
            words,
            key_a,
            key_b,
        });
        Ok(())
    }

    /// First sub-key (words 0..4 of the split block pair).
    pub fn key_a(&self) -> Result<&GpuBuffer> {
        self.state
            .as_ref()
            .map(|s| &s.key_a)
            .ok_or(Error::NotSetUp {
                kernel: self.label(),
            })
    }

    /// Second sub-key (words 4..8 of the split block pair).
    pub fn key_b(&self) -> Result<&GpuBuffer> {
        self.state
            .as_ref()
            .map(|s| &s.key_b)
            .ok_or(Error::NotSetUp {
                kernel: self.label(),
            })
    }

    /// The 8 raw words both sub-keys are sliced from.
    pub fn words(&self) -> Result<&GpuBuffer> {
        self.state
            .as_ref()
            .map(|s| &s.words)
            .ok_or(Error::NotSetUp {
                kernel: self.label(),
            })
    }
}

impl Kernel for KeySplitter {
    fn label(&self) -> &'static str {
        "KeySplitter"
    }

    fn is_setup(&self) -> bool {
        self.state.is_some()
    }

    fn encode(&self, pass: &mut ComputePass<'_>) -> Result<()> {
        if self.state.is_none() {
            return Err(Error::NotSetUp {
                kernel: self.label(),
            });
        }
        self.threefry.encode(pass)?;
        self.copy_a.encode(pass)?;
        self.copy_b.encode(pass)
    }
}
