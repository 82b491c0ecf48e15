/// A closed range `[min, max]` of ray parameters or coordinates.
///
/// An interval with `min > max` is empty; [`Interval::default`] returns the
/// canonical empty interval so that unions can start from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Contains nothing. Identity element of [`Interval::surrounding`].
    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    /// Contains every value.
    pub const UNIVERSE: Interval = Interval {
        min: f32::NEG_INFINITY,
        max: f32::INFINITY,
    };

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// `max - min`; negative for empty intervals.
    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Closed membership test: `min <= x <= max`.
    pub fn contains(&self, x: f32) -> bool {
        self.min <= x && x <= self.max
    }

    /// Open membership test: `min < x < max`.
    ///
    /// Root finders use this so a returned `t` never coincides with the
    /// search bounds, which would let a scattered ray re-hit its own origin.
    pub fn surrounds(&self, x: f32) -> bool {
        self.min < x && x < self.max
    }

    pub fn clamp(&self, x: f32) -> f32 {
        x.clamp(self.min, self.max)
    }

    /// Pads the interval by `delta / 2` on each side.
    pub fn expand(&self, delta: f32) -> Interval {
        let padding = delta / 2.0;
        Interval::new(self.min - padding, self.max + padding)
    }

    /// Smallest interval enclosing both `a` and `b`.
    pub fn surrounding(a: &Interval, b: &Interval) -> Interval {
        Interval::new(a.min.min(b.min), a.max.max(b.max))
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::EMPTY
    }
}
