/// Viewport size in logical pixels.
///
/// The basis the card vertex shader uses to map logical px to NDC.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimized_window_is_not_valid() {
        assert!(Viewport::new(1400.0, 1000.0).is_valid());
        assert!(!Viewport::new(0.0, 1000.0).is_valid());
        assert!(!Viewport::new(f32::NAN, 10.0).is_valid());
    }
}
