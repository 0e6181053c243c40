/// A named region of the sprite sheet, in pixels (top-left origin).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpriteRect {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl SpriteRect {
    pub fn new(name: impl Into<String>, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { name: name.into(), x, y, w, h }
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.w, self.h)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Whether the rect lies inside a `width` x `height` image.
    ///
    /// Computed in u64 so huge coordinates cannot wrap around.
    #[inline]
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.w as u64 <= width as u64
            && self.y as u64 + self.h as u64 <= height as u64
    }
}
