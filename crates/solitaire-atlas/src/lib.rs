//! Sprite-sheet ingestion for the solitaire renderer.
//!
//! This crate has no GPU dependency. It decodes the sheet, parses the atlas
//! metadata, validates the sprites, and copies each one into its own layer of
//! a texture array through the [`LayerBackend`] trait. The engine crate
//! provides the wgpu backend; [`MemoryBackend`] keeps layers on the CPU.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`image`] | `DecodedImage` (PNG decode/encode) |
//! | [`sprite`] | `SpriteRect` |
//! | [`metadata`] | `cards.json` parsing and writing |
//! | [`ingest`] | `build_atlas`, `LayerBackend`, `TextureAtlas` |
//! | [`memory`] | `MemoryBackend` |
//! | [`pack`] | shelf packer for building a sheet from loose images |
//! | [`error`] | `AtlasError` |
//!
//! # Quick start
//!
//! ```rust
//! use solitaire_atlas::{build_atlas, DecodedImage, MemoryBackend, SpriteRect};
//!
//! let sheet = DecodedImage::filled(64, 32, &[255, 255, 255, 255]).unwrap();
//! let sprites = [SpriteRect::new("ace", 0, 0, 32, 32), SpriteRect::new("back", 32, 0, 32, 32)];
//!
//! let mut backend = MemoryBackend::new();
//! let atlas = build_atlas(&mut backend, sheet, &sprites).unwrap();
//! assert_eq!(atlas.layer_index("back"), Some(1));
//! ```

pub mod error;
pub mod image;
pub mod ingest;
pub mod memory;
pub mod metadata;
pub mod pack;
pub mod sprite;

pub use error::{AtlasError, Result};
pub use image::DecodedImage;
pub use ingest::{build_atlas, load_atlas, LayerBackend, LayerDesc, TextureAtlas};
pub use memory::{MemoryBackend, MemoryTexture};
pub use metadata::{load_metadata, parse_metadata};
pub use pack::{pack_sprites, PackOptions, PackedAtlas};
pub use sprite::SpriteRect;
