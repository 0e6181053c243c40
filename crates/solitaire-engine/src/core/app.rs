use winit::event::WindowEvent;

use super::ctx::{FrameCtx, StartCtx};

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by the game.
pub trait App {
    /// Called once, after the window and GPU exist and before the first frame.
    ///
    /// Load shaders and assets here. An error stops the event loop and is
    /// returned from `Runtime::run`.
    fn on_start(&mut self, ctx: &mut StartCtx<'_, '_>) -> anyhow::Result<()>;

    /// Called for raw window events.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called once per rendered frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
