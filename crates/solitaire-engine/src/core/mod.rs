//! Core engine-facing contracts.
//!
//! The interface between the runtime (platform loop) and the game: the `App`
//! trait and the contexts handed to its callbacks.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, StartCtx, WindowCtx};
