//! Sprite sheet → texture array ingestion.
//!
//! Validation runs over every sprite before anything is allocated, so a
//! malformed atlas never produces a half-filled texture. Once the texture
//! exists, it is owned by a local until the last layer is written; an early
//! return drops it, which is how backends release it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{AtlasError, Result};
use crate::image::DecodedImage;
use crate::metadata::load_metadata;
use crate::sprite::SpriteRect;

/// Shape of the layered texture to allocate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LayerDesc {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    /// Bytes per pixel of the layer data (1 to 4, 8 bits each).
    pub channels: u32,
}

impl LayerDesc {
    /// Size in bytes of one tightly packed layer.
    #[inline]
    pub fn layer_bytes(&self) -> usize {
        self.bytes_per_row() * self.height as usize
    }

    #[inline]
    pub fn bytes_per_row(&self) -> usize {
        self.width as usize * self.channels as usize
    }
}

/// Storage that can hold a layered texture.
///
/// `Texture` must release its resources on drop.
pub trait LayerBackend {
    type Texture;

    /// Allocates an uninitialized texture of `desc.layers` layers.
    fn allocate(&mut self, desc: &LayerDesc) -> Result<Self::Texture>;

    /// Uploads one tightly packed layer (`desc.layer_bytes()` bytes).
    fn write_layer(&mut self, texture: &mut Self::Texture, layer: u32, pixels: &[u8])
    -> Result<()>;
}

/// A populated texture array plus the sprite name → layer mapping.
#[derive(Debug)]
pub struct TextureAtlas<T> {
    texture: T,
    desc: LayerDesc,
    layers: HashMap<String, u32>,
    names: Vec<String>,
}

impl<T> TextureAtlas<T> {
    pub fn texture(&self) -> &T {
        &self.texture
    }

    pub fn layer_width(&self) -> u32 {
        self.desc.width
    }

    pub fn layer_height(&self) -> u32 {
        self.desc.height
    }

    pub fn layer_count(&self) -> u32 {
        self.desc.layers
    }

    pub fn desc(&self) -> &LayerDesc {
        &self.desc
    }

    pub fn layer_index(&self, name: &str) -> Option<u32> {
        self.layers.get(name).copied()
    }

    /// Sprite stored in `layer`.
    pub fn name_of(&self, layer: u32) -> Option<&str> {
        self.names.get(layer as usize).map(String::as_str)
    }

    /// Sprite names in layer order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Checks every sprite against the image and against each other.
///
/// Returns the common cell size, taken from the first sprite.
pub fn validate_sprites(image: &DecodedImage, sprites: &[SpriteRect]) -> Result<(u32, u32)> {
    let Some(first) = sprites.first() else {
        return Err(AtlasError::EmptyAtlas);
    };
    let (cell_w, cell_h) = first.size();

    let mut seen = HashSet::with_capacity(sprites.len());
    for s in sprites {
        if !seen.insert(s.name.as_str()) {
            return Err(AtlasError::DuplicateName(s.name.clone()));
        }
        if s.is_empty() {
            return Err(AtlasError::ZeroSizedSprite(s.name.clone()));
        }
        if !s.fits_within(image.width(), image.height()) {
            return Err(AtlasError::OutOfBounds {
                name: s.name.clone(),
                x: s.x,
                y: s.y,
                w: s.w,
                h: s.h,
                image_width: image.width(),
                image_height: image.height(),
            });
        }
        if s.size() != (cell_w, cell_h) {
            return Err(AtlasError::DimensionMismatch {
                name: s.name.clone(),
                cell_w,
                cell_h,
                found_w: s.w,
                found_h: s.h,
            });
        }
    }

    Ok((cell_w, cell_h))
}

/// Copies the sprite's region into `out`, one row at a time.
///
/// The region is a sub-rectangle of the sheet, so consecutive rows are
/// `image.row_stride()` bytes apart in the source and packed back to back in
/// `out`.
pub fn copy_region(image: &DecodedImage, sprite: &SpriteRect, out: &mut Vec<u8>) {
    out.clear();
    for row in 0..sprite.h {
        out.extend_from_slice(image.row_span(sprite.x, sprite.y + row, sprite.w));
    }
}

/// Builds a texture array with one layer per sprite, in input order.
///
/// `image` is consumed and dropped once every layer has been uploaded.
pub fn build_atlas<B>(
    backend: &mut B,
    image: DecodedImage,
    sprites: &[SpriteRect],
) -> Result<TextureAtlas<B::Texture>>
where
    B: LayerBackend,
{
    let (cell_w, cell_h) = validate_sprites(&image, sprites)?;
    let layer_count = u32::try_from(sprites.len()).map_err(|_| {
        AtlasError::ResourceAllocationFailed(format!("{} layers requested", sprites.len()))
    })?;

    let desc = LayerDesc {
        width: cell_w,
        height: cell_h,
        layers: layer_count,
        channels: image.channels(),
    };

    let mut texture = backend.allocate(&desc)?;

    let mut layers = HashMap::with_capacity(sprites.len());
    let mut names = Vec::with_capacity(sprites.len());
    let mut staging = Vec::with_capacity(desc.layer_bytes());

    for (layer, sprite) in (0u32..).zip(sprites) {
        copy_region(&image, sprite, &mut staging);
        backend.write_layer(&mut texture, layer, &staging)?;

        log::debug!("sprite `{}` -> layer {layer}", sprite.name);
        layers.insert(sprite.name.clone(), layer);
        names.push(sprite.name.clone());
    }

    drop(image);

    log::info!(
        "built atlas: {} layers of {}x{} ({} channels)",
        desc.layers,
        desc.width,
        desc.height,
        desc.channels
    );

    Ok(TextureAtlas { texture, desc, layers, names })
}

/// Reads the sheet and its metadata from disk and builds the atlas.
pub fn load_atlas<B>(
    backend: &mut B,
    sheet: impl AsRef<Path>,
    metadata: impl AsRef<Path>,
) -> Result<TextureAtlas<B::Texture>>
where
    B: LayerBackend,
{
    let image = DecodedImage::open(sheet)?;
    let sprites = load_metadata(metadata)?;
    build_atlas(backend, image, &sprites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    /// 96x32 RGBA strip: red, green, blue 32x32 cells.
    fn strip() -> DecodedImage {
        let mut pixels = Vec::with_capacity(96 * 32 * 4);
        for _y in 0..32 {
            for x in 0..96 {
                let c = match x / 32 {
                    0 => RED,
                    1 => GREEN,
                    _ => BLUE,
                };
                pixels.extend_from_slice(&c);
            }
        }
        DecodedImage::new(pixels, 96, 32, 4).unwrap()
    }

    fn abc() -> Vec<SpriteRect> {
        vec![
            SpriteRect::new("A", 0, 0, 32, 32),
            SpriteRect::new("B", 32, 0, 32, 32),
            SpriteRect::new("C", 64, 0, 32, 32),
        ]
    }

    /// Fails on demand after allocation, to exercise cleanup.
    struct FailingBackend {
        inner: MemoryBackend,
        fail_allocate: bool,
        fail_on_layer: Option<u32>,
    }

    impl FailingBackend {
        fn new() -> Self {
            Self { inner: MemoryBackend::new(), fail_allocate: false, fail_on_layer: None }
        }
    }

    impl LayerBackend for FailingBackend {
        type Texture = <MemoryBackend as LayerBackend>::Texture;

        fn allocate(&mut self, desc: &LayerDesc) -> Result<Self::Texture> {
            if self.fail_allocate {
                return Err(AtlasError::ResourceAllocationFailed("out of memory".into()));
            }
            self.inner.allocate(desc)
        }

        fn write_layer(
            &mut self,
            texture: &mut Self::Texture,
            layer: u32,
            pixels: &[u8],
        ) -> Result<()> {
            if self.fail_on_layer == Some(layer) {
                return Err(AtlasError::ResourceAllocationFailed("device lost".into()));
            }
            self.inner.write_layer(texture, layer, pixels)
        }
    }

    // ── success ───────────────────────────────────────────────────────────

    #[test]
    fn three_cells_become_three_layers() {
        let mut backend = MemoryBackend::new();
        let atlas = build_atlas(&mut backend, strip(), &abc()).unwrap();

        assert_eq!(atlas.layer_count(), 3);
        assert_eq!((atlas.layer_width(), atlas.layer_height()), (32, 32));
        assert_eq!(atlas.layer_index("A"), Some(0));
        assert_eq!(atlas.layer_index("B"), Some(1));
        assert_eq!(atlas.layer_index("C"), Some(2));

        let layer = atlas.texture().layer(1).unwrap();
        assert!(layer.chunks_exact(4).all(|px| px == GREEN));
    }

    #[test]
    fn layer_order_follows_input_order() {
        let mut sprites = abc();
        sprites.reverse();

        let mut backend = MemoryBackend::new();
        let atlas = build_atlas(&mut backend, strip(), &sprites).unwrap();

        assert_eq!(atlas.names().collect::<Vec<_>>(), ["C", "B", "A"]);
        assert_eq!(atlas.layer_index("C"), Some(0));
        assert_eq!(atlas.name_of(2), Some("A"));
        assert!(atlas.texture().layer(0).unwrap().chunks_exact(4).all(|px| px == BLUE));
    }

    #[test]
    fn layers_match_source_rows_byte_for_byte() {
        // Every pixel distinct so a stride mistake shows up.
        let (w, h) = (12u32, 6u32);
        let pixels: Vec<u8> = (0..w * h * 3).map(|i| (i * 7 % 251) as u8).collect();
        let image = DecodedImage::new(pixels, w, h, 3).unwrap();
        let sprites = vec![
            SpriteRect::new("tl", 0, 0, 4, 3),
            SpriteRect::new("mid", 5, 2, 4, 3),
            SpriteRect::new("br", 8, 3, 4, 3),
        ];

        let mut backend = MemoryBackend::new();
        let atlas = build_atlas(&mut backend, image.clone(), &sprites).unwrap();

        for s in &sprites {
            let layer = atlas.layer_index(&s.name).unwrap();
            let data = atlas.texture().layer(layer).unwrap();
            let row_bytes = (s.w * 3) as usize;
            for (row, got) in data.chunks_exact(row_bytes).enumerate() {
                assert_eq!(got, image.row_span(s.x, s.y + row as u32, s.w), "{} row {row}", s.name);
            }
        }
    }

    #[test]
    fn single_sprite_covering_whole_image() {
        let image = DecodedImage::filled(5, 7, &[9, 9, 9, 9]).unwrap();
        let mut backend = MemoryBackend::new();
        let atlas = build_atlas(&mut backend, image, &[SpriteRect::new("all", 0, 0, 5, 7)]).unwrap();
        assert_eq!(atlas.layer_count(), 1);
        assert_eq!(atlas.texture().layer(0).unwrap().len(), 5 * 7 * 4);
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn empty_sprite_list_allocates_nothing() {
        let mut backend = MemoryBackend::new();
        let err = build_atlas(&mut backend, strip(), &[]).unwrap_err();
        assert!(matches!(err, AtlasError::EmptyAtlas));
        assert_eq!(backend.allocations(), 0);
    }

    #[test]
    fn sprite_past_right_edge_is_out_of_bounds() {
        let mut backend = MemoryBackend::new();
        let sprites = [SpriteRect::new("X", 90, 0, 32, 32)];
        let err = build_atlas(&mut backend, strip(), &sprites).unwrap_err();
        assert!(matches!(err, AtlasError::OutOfBounds { ref name, .. } if name == "X"));
        assert_eq!(backend.allocations(), 0);
    }

    #[test]
    fn sprite_past_bottom_edge_is_out_of_bounds() {
        let mut backend = MemoryBackend::new();
        let sprites = [SpriteRect::new("Y", 0, 1, 32, 32)];
        let err = build_atlas(&mut backend, strip(), &sprites).unwrap_err();
        assert!(matches!(err, AtlasError::OutOfBounds { .. }));
    }

    #[test]
    fn late_size_mismatch_fails_before_allocation() {
        let mut sprites = abc();
        sprites[2].h = 16;

        let mut backend = MemoryBackend::new();
        let err = build_atlas(&mut backend, strip(), &sprites).unwrap_err();

        match err {
            AtlasError::DimensionMismatch { name, cell_w, cell_h, found_w, found_h } => {
                assert_eq!(name, "C");
                assert_eq!((cell_w, cell_h, found_w, found_h), (32, 32, 32, 16));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.allocations(), 0);
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut sprites = abc();
        sprites[1].name = "A".into();
        let mut backend = MemoryBackend::new();
        let err = build_atlas(&mut backend, strip(), &sprites).unwrap_err();
        assert!(matches!(err, AtlasError::DuplicateName(ref n) if n == "A"));
    }

    #[test]
    fn zero_sized_sprite_is_rejected() {
        let mut backend = MemoryBackend::new();
        let sprites = [SpriteRect::new("flat", 0, 0, 32, 0)];
        let err = build_atlas(&mut backend, strip(), &sprites).unwrap_err();
        assert!(matches!(err, AtlasError::ZeroSizedSprite(_)));
    }

    // ── cleanup ───────────────────────────────────────────────────────────

    #[test]
    fn allocation_failure_is_reported() {
        let mut backend = FailingBackend::new();
        backend.fail_allocate = true;
        let err = build_atlas(&mut backend, strip(), &abc()).unwrap_err();
        assert!(matches!(err, AtlasError::ResourceAllocationFailed(_)));
        assert_eq!(backend.inner.live_textures(), 0);
    }

    #[test]
    fn failed_layer_upload_releases_the_texture() {
        let mut backend = FailingBackend::new();
        backend.fail_on_layer = Some(1);
        let err = build_atlas(&mut backend, strip(), &abc()).unwrap_err();

        assert!(matches!(err, AtlasError::ResourceAllocationFailed(_)));
        assert_eq!(backend.inner.allocations(), 1);
        assert_eq!(backend.inner.live_textures(), 0);
    }

    #[test]
    fn dropping_the_atlas_releases_the_texture() {
        let mut backend = MemoryBackend::new();
        let atlas = build_atlas(&mut backend, strip(), &abc()).unwrap();
        assert_eq!(backend.live_textures(), 1);
        drop(atlas);
        assert_eq!(backend.live_textures(), 0);
    }
}
