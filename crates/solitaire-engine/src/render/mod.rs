//! GPU rendering subsystem.
//!
//! Each renderer owns its GPU resources (pipeline, buffers, textures) and
//! releases them on drop.
//!
//! Convention:
//! - CPU geometry is in logical pixels (top-left origin, +Y down).
//! - Vertex shader converts to NDC using a viewport uniform.

mod cards;
mod common;
mod ctx;
mod texture_array;

pub use cards::{
    build_instances, resolve_layer, CardDrawRequest, CardFace, CardInstance, CardRenderer,
    CardRendererConfig, Unresolved,
};
pub use ctx::{RenderCtx, RenderTarget};
pub use texture_array::{check_limits, layer_format, GpuLayerBackend, GpuLayerTexture};
