//! Axis-aligned and rotated rectangles in pixel coordinates (X right, Y down).

use std::fmt;

use nalgebra::{Rotation2, Vector2};

use super::AspectRatio;

/// An axis-aligned rectangle, stored as center and size.
///
/// Width and height may be zero, but never negative.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    x_center: f32,
    y_center: f32,
    width: f32,
    height: f32,
}

impl Rect {
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    #[inline]
    pub fn from_top_left(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_center(x + width / 2.0, y + height / 2.0, width, height)
    }

    /// Returns the smallest rectangle containing all `points`, or [`None`] if there are none.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let [x, y] = points.next()?;
        let (min, max) = points.fold(([x, y], [x, y]), |(min, max), [x, y]| {
            ([min[0].min(x), min[1].min(y)], [max[0].max(x), max[1].max(y)])
        });

        Some(Self::from_top_left(
            min[0],
            min[1],
            max[0] - min[0],
            max[1] - min[1],
        ))
    }

    /// Multiplies width and height by `factor`, keeping the center.
    #[must_use]
    pub fn scale(&self, factor: f32) -> Self {
        Self::from_center(
            self.x_center,
            self.y_center,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Adds `amount` times the width to the left and right side, and `amount` times the height to
    /// the top and bottom.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.scale(1.0 + 2.0 * amount)
    }

    /// Extends the shorter dimension (relative to `aspect`) symmetrically until the rectangle has
    /// the aspect ratio `aspect`.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: AspectRatio) -> Self {
        let ratio = aspect.as_f32();
        let (width, height) = if self.height * ratio >= self.width {
            (self.height * ratio, self.height)
        } else {
            (self.width, self.width / ratio)
        };
        Self::from_center(self.x_center, self.y_center, width, height)
    }

    /// X coordinate of the left edge.
    #[inline]
    pub fn x(&self) -> f32 {
        self.x_center - self.width / 2.0
    }

    /// Y coordinate of the top edge.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y_center - self.height / 2.0
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y_center
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x_center, self.y_center)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    #[must_use]
    pub fn move_by(&self, dx: f32, dy: f32) -> Self {
        Self::from_center(self.x_center + dx, self.y_center + dy, self.width, self.height)
    }

    /// Moves the top left corner to `(x, y)`.
    #[must_use]
    pub fn move_to(&self, x: f32, y: f32) -> Self {
        Self::from_top_left(x, y, self.width, self.height)
    }

    fn intersection_area(&self, other: &Self) -> f32 {
        let w = (self.x() + self.width).min(other.x() + other.width) - self.x().max(other.x());
        let h = (self.y() + self.height).min(other.y() + other.height) - self.y().max(other.y());
        w.max(0.0) * h.max(0.0)
    }

    /// Intersection over union of `self` and `other`, from 0.0 (disjoint) to 1.0 (identical).
    ///
    /// Two rectangles without area have an IoU of 0.0.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect({}x{} at {},{})",
            self.width, self.height, self.x_center, self.y_center
        )
    }
}

/// Rotates a vector clockwise on screen (which is counterclockwise with Y pointing up).
fn rotate([x, y]: [f32; 2], radians: f32) -> [f32; 2] {
    let v = Rotation2::new(radians) * Vector2::new(x, y);
    [v.x, v.y]
}

/// A [`Rect`] rotated clockwise around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Returns the smallest rectangle rotated by `radians` that contains all `points`.
    ///
    /// Returns [`None`] if there are no points.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(radians: f32, points: I) -> Option<Self> {
        let local = Rect::bounding(points.into_iter().map(|p| rotate(p, -radians)))?;
        let [x, y] = rotate([local.x_center, local.y_center], radians);
        Some(Self::new(
            Rect::from_center(x, y, local.width, local.height),
            radians,
        ))
    }

    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// The rectangle before rotation.
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Replaces the unrotated rectangle with `f(rect)`, keeping the rotation.
    pub fn map(self, f: impl FnOnce(Rect) -> Rect) -> Self {
        Self::new(f(self.rect), self.radians)
    }

    pub fn center(&self) -> (f32, f32) {
        self.rect.center()
    }

    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.map(|rect| rect.grow_rel(amount))
    }

    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: AspectRatio) -> Self {
        self.map(|rect| rect.grow_to_fit_aspect(aspect))
    }

    /// Maps a point from the rectangle's own coordinates (origin in its top left corner, axes
    /// rotated with it) to the surrounding coordinate system.
    pub fn transform_out(&self, x: f32, y: f32) -> [f32; 2] {
        let (half_w, half_h) = (self.rect.width / 2.0, self.rect.height / 2.0);
        let [x, y] = rotate([x - half_w, y - half_h], self.radians);
        [x + self.rect.x_center, y + self.rect.y_center]
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}
