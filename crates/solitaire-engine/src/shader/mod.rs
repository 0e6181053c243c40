//! Shader compilation and program linking.
//!
//! Shaders are WGSL files. `compile` runs them through naga (the same front
//! end wgpu embeds) so a bad source fails at startup with the compiler's
//! report instead of a device validation panic. `link` checks that the two
//! stages agree on their `@location` interface and resource bindings.

mod compile;
mod error;
mod link;

pub use compile::{compile, read_shader, CompiledShader};
pub use error::{ShaderError, ShaderStage};
pub use link::{link, LinkedProgram, ResourceKind, ResourceSlot};
