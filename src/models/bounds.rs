use glam::DVec2;

use crate::utils::{check_non_negative, FlockError};

/// The simulation domain, anchored at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub const fn new(width: f64, height: f64) -> Self {
        Bounds { width, height }
    }

    /// Checks that both extents are finite and non-negative.
    ///
    /// # Example
    /// ```
    /// use flock_sim::models::Bounds;
    /// assert!(Bounds::new(100.0, 50.0).validate().is_ok());
    /// assert!(Bounds::new(f64::NAN, 50.0).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), FlockError> {
        check_non_negative("width", self.width)?;
        check_non_negative("height", self.height)
    }

    pub fn contains(&self, point: DVec2) -> bool {
        self.as_rect().contains(point)
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Axis-aligned rectangle used for cell areas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn min(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn max(&self) -> DVec2 {
        DVec2::new(self.x + self.width, self.y + self.height)
    }

    /// Edges are inclusive on both sides, so a point on a shared edge is
    /// contained by both neighbouring rectangles.
    pub fn contains(&self, point: DVec2) -> bool {
        let max = self.max();
        point.x >= self.x && point.x <= max.x && point.y >= self.y && point.y <= max.y
    }
}
