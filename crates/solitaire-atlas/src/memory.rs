use std::cell::Cell;
use std::rc::Rc;

use crate::error::{AtlasError, Result};
use crate::ingest::{LayerBackend, LayerDesc};

/// CPU-resident layer storage.
///
/// Used to check an atlas without a GPU (`solitaire pack` verifies its output
/// through it) and as the reference backend in tests. Tracks how many of its
/// textures are alive so callers can assert nothing leaked.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    live: Rc<Cell<usize>>,
    allocations: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Textures allocated so far, released or not.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Textures currently alive.
    pub fn live_textures(&self) -> usize {
        self.live.get()
    }
}

/// A layered texture held in memory.
#[derive(Debug)]
pub struct MemoryTexture {
    desc: LayerDesc,
    layers: Vec<Option<Vec<u8>>>,
    live: Rc<Cell<usize>>,
}

impl MemoryTexture {
    pub fn desc(&self) -> &LayerDesc {
        &self.desc
    }

    /// Pixel data of `layer`, if it has been written.
    pub fn layer(&self, layer: u32) -> Option<&[u8]> {
        self.layers.get(layer as usize)?.as_deref()
    }

    /// Whether every layer has been written.
    pub fn is_complete(&self) -> bool {
        self.layers.iter().all(Option::is_some)
    }
}

impl Drop for MemoryTexture {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

impl LayerBackend for MemoryBackend {
    type Texture = MemoryTexture;

    fn allocate(&mut self, desc: &LayerDesc) -> Result<MemoryTexture> {
        if desc.width == 0 || desc.height == 0 || desc.layers == 0 {
            return Err(AtlasError::ResourceAllocationFailed(format!(
                "degenerate texture {}x{}x{}",
                desc.width, desc.height, desc.layers
            )));
        }

        self.allocations += 1;
        self.live.set(self.live.get() + 1);

        Ok(MemoryTexture {
            desc: *desc,
            layers: vec![None; desc.layers as usize],
            live: Rc::clone(&self.live),
        })
    }

    fn write_layer(&mut self, texture: &mut MemoryTexture, layer: u32, pixels: &[u8]) -> Result<()> {
        let expected = texture.desc.layer_bytes();
        if pixels.len() != expected {
            return Err(AtlasError::ResourceAllocationFailed(format!(
                "layer {layer} upload is {} bytes, expected {expected}",
                pixels.len()
            )));
        }

        let slot = texture.layers.get_mut(layer as usize).ok_or_else(|| {
            AtlasError::ResourceAllocationFailed(format!(
                "layer {layer} out of range (texture has {})",
                texture.desc.layers
            ))
        })?;
        *slot = Some(pixels.to_vec());
        Ok(())
    }
}
