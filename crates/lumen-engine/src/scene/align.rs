use glam::Vec2;

/// Screen point a 2D object is placed against.
///
/// The matching point of the object's own rectangle sits on it, offset by the object's
/// translation: `BottomRight` with `(-8, -8)` keeps the object 8 px inside the bottom-right
/// corner whatever the window size.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Alignment {
    #[default]
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleCenter,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Alignment {
    /// Position inside a rectangle as a fraction of its size, `(0, 0)` top-left.
    pub fn factor(self) -> Vec2 {
        let (x, y) = match self {
            Alignment::TopLeft => (0.0, 0.0),
            Alignment::TopCenter => (0.5, 0.0),
            Alignment::TopRight => (1.0, 0.0),
            Alignment::MiddleLeft => (0.0, 0.5),
            Alignment::MiddleCenter => (0.5, 0.5),
            Alignment::MiddleRight => (1.0, 0.5),
            Alignment::BottomLeft => (0.0, 1.0),
            Alignment::BottomCenter => (0.5, 1.0),
            Alignment::BottomRight => (1.0, 1.0),
        };
        Vec2::new(x, y)
    }

    /// Point of a `viewport`-sized screen this alignment refers to.
    pub fn reference(self, viewport: Vec2) -> Vec2 {
        viewport * self.factor()
    }
}
