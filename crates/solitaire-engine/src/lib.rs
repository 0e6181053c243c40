//! Solitaire engine crate.
//!
//! Owns the platform + GPU runtime pieces: the window and event loop, the wgpu
//! device and surface, shader compilation, and the card renderer that draws
//! from a sprite-sheet texture array.

pub mod core;
pub mod device;
pub mod input;
pub mod shader;
pub mod window;

pub mod coords;
pub mod logging;
pub mod render;
