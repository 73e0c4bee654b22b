/// Draw layer of a 2D object.
///
/// Higher layers are drawn over lower ones. Text and sprites share the same layer space.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct ZIndex(pub i32);

impl ZIndex {
    pub const BACK: Self = Self(i32::MIN);
    pub const FRONT: Self = Self(i32::MAX);

    #[inline]
    pub const fn new(v: i32) -> Self {
        Self(v)
    }

    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for ZIndex {
    fn from(v: i32) -> Self {
        Self(v)
    }
}
