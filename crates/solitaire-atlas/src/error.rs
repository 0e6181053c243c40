use std::path::PathBuf;

/// Everything that can go wrong between reading a sprite sheet from disk and
/// holding a populated texture array.
#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("malformed atlas metadata: {0}")]
    Metadata(String),

    #[error("atlas has no sprites")]
    EmptyAtlas,

    #[error("sprite `{0}` appears more than once")]
    DuplicateName(String),

    #[error("sprite `{0}` has zero width or height")]
    ZeroSizedSprite(String),

    #[error(
        "sprite `{name}` at ({x}, {y}) size {w}x{h} exceeds image bounds {image_width}x{image_height}"
    )]
    OutOfBounds {
        name: String,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error(
        "sprite `{name}` is {found_w}x{found_h} but the atlas cell size is {cell_w}x{cell_h}"
    )]
    DimensionMismatch {
        name: String,
        cell_w: u32,
        cell_h: u32,
        found_w: u32,
        found_h: u32,
    },

    #[error("texture allocation failed: {0}")]
    ResourceAllocationFailed(String),

    #[error("cannot pack atlas: {0}")]
    Pack(String),
}

impl AtlasError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
