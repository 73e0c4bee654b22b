use core::cmp::Ordering;

use super::{ObjectId, ZIndex};

/// Draw order of a 2D object.
///
/// Ordering rules:
/// 1) `z`: ascending (back-to-front)
/// 2) `id`: ascending, so equal layers draw in insertion order
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SortKey {
    pub z: ZIndex,
    pub id: ObjectId,
}

impl SortKey {
    #[inline]
    pub const fn new(z: ZIndex, id: ObjectId) -> Self {
        Self { z, id }
    }
}

impl Ord for SortKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        match self.z.cmp(&other.z) {
            Ordering::Equal => self.id.cmp(&other.id),
            o => o,
        }
    }
}

impl PartialOrd for SortKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
