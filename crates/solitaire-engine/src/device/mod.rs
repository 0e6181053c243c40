//! GPU device + surface management.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue, configures the window
//! surface, and hands out per-frame encoders.

mod gpu;

pub use gpu::{choose_surface_format, Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
