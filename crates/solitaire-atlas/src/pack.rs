//! Shelf packer that turns a folder of same-sized card images into one sheet
//! plus metadata.
//!
//! Every sprite must share one size, which becomes the cell size. Cells are
//! laid out left to right with `padding` pixels around each, wrapping to a new
//! row when the next cell would cross `max_size`.

use std::path::Path;

use crate::error::{AtlasError, Result};
use crate::image::DecodedImage;
use crate::metadata::metadata_to_json;
use crate::sprite::SpriteRect;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PackOptions {
    /// Transparent pixels between cells and around the sheet border.
    pub padding: u32,
    /// Largest allowed sheet width or height.
    pub max_size: u32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self { padding: 2, max_size: 4096 }
    }
}

/// Output of [`pack_sprites`].
#[derive(Debug, Clone)]
pub struct PackedAtlas {
    pub image: DecodedImage,
    pub sprites: Vec<SpriteRect>,
}

impl PackedAtlas {
    pub fn metadata_json(&self) -> Result<String> {
        metadata_to_json(&self.sprites)
    }

    /// Writes the sheet PNG and the `{"frames": ...}` metadata.
    pub fn save(&self, png: impl AsRef<Path>, json: impl AsRef<Path>) -> Result<()> {
        self.image.save_png(png)?;

        let json = json.as_ref();
        std::fs::write(json, self.metadata_json()?).map_err(|e| AtlasError::io(json, e))
    }
}

/// Packs named images into one sheet, in the order given.
pub fn pack_sprites(images: &[(String, DecodedImage)], opts: &PackOptions) -> Result<PackedAtlas> {
    let Some((_, first)) = images.first() else {
        return Err(AtlasError::Pack("no images to pack".into()));
    };
    let channels = first.channels();
    if let Some((name, _)) = images.iter().find(|(_, img)| img.channels() != channels) {
        return Err(AtlasError::Pack(format!(
            "`{name}` has a different channel count than `{}`",
            images[0].0
        )));
    }

    let (cell_w, cell_h) = (first.width(), first.height());
    if let Some((name, img)) = images
        .iter()
        .find(|(_, img)| img.width() != cell_w || img.height() != cell_h)
    {
        return Err(AtlasError::Pack(format!(
            "`{name}` is {}x{}, expected {cell_w}x{cell_h} like `{}`",
            img.width(),
            img.height(),
            images[0].0
        )));
    }

    let pad = opts.padding;
    let too_big = || {
        AtlasError::Pack(format!(
            "{cell_w}x{cell_h} cells with {pad}px padding do not fit in {0}x{0}",
            opts.max_size
        ))
    };
    let stride_x = cell_w.checked_add(pad).filter(|&s| s > 0).ok_or_else(too_big)?;
    let stride_y = cell_h.checked_add(pad).ok_or_else(too_big)?;
    let per_row = opts.max_size.saturating_sub(pad) / stride_x;
    if per_row == 0 || stride_y.checked_add(pad).map_or(true, |h| h > opts.max_size) {
        return Err(too_big());
    }

    let count = images.len() as u32;
    let cols = count.min(per_row);
    let rows = count.div_ceil(per_row);

    let sheet_w = cols * stride_x + pad;
    let sheet_h = rows as u64 * stride_y as u64 + pad as u64;
    if sheet_h > opts.max_size as u64 {
        return Err(AtlasError::Pack(format!(
            "{count} cells need a {sheet_w}x{sheet_h} sheet, larger than {}",
            opts.max_size
        )));
    }
    let sheet_h = sheet_h as u32;

    let transparent = vec![0u8; channels as usize];
    let mut sheet = DecodedImage::filled(sheet_w, sheet_h, &transparent)?;
    let mut sprites = Vec::with_capacity(images.len());

    for (i, (name, img)) in (0u32..).zip(images) {
        let x = pad + (i % per_row) * stride_x;
        let y = pad + (i / per_row) * stride_y;
        sheet.blit(img, x, y);
        sprites.push(SpriteRect::new(name.clone(), x, y, img.width(), img.height()));
    }

    log::info!("packed {count} sprites into {sheet_w}x{sheet_h} ({cols} per row)");
    Ok(PackedAtlas { image: sheet, sprites })
}

/// Loads every `*.png` in `dir`, sorted by file name.
///
/// Sprite names are file stems (`ace_of_spades.png` → `ace_of_spades`).
pub fn load_sprite_dir(dir: impl AsRef<Path>) -> Result<Vec<(String, DecodedImage)>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| AtlasError::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| AtlasError::io(dir, e))?.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if path.is_file() && is_png {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok((name, DecodedImage::open(&path)?))
        })
        .collect()
}
