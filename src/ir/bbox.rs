//! Corner-pair and center-size box encodings, and the geometry between them.

use super::coord::Coord;
use super::Pixel;

/// An axis-aligned bounding box in XYXY format (xmin, ymin, xmax, ymax).
///
/// The constructor does not enforce `min <= max`; readers build whatever the
/// label file says and writers decide what to do with degenerate boxes.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    pub min: Coord<TSpace>,
    pub max: Coord<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    #[inline]
    pub fn new(min: Coord<TSpace>, max: Coord<TSpace>) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            min: Coord::new(xmin, ymin),
            max: Coord::new(xmax, ymax),
        }
    }

    /// Builds a box from a top-left corner plus extent.
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(x, y, x + width, y + height)
    }

    #[inline]
    pub fn xmin(&self) -> f64 {
        self.min.x
    }

    #[inline]
    pub fn ymin(&self) -> f64 {
        self.min.y
    }

    #[inline]
    pub fn xmax(&self) -> f64 {
        self.max.x
    }

    #[inline]
    pub fn ymax(&self) -> f64 {
        self.max.y
    }

    /// May be negative if the box is malformed (xmax < xmin).
    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// May be negative if the box is malformed (ymax < ymin).
    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("xmin", &self.min.x)
            .field("ymin", &self.min.y)
            .field("xmax", &self.max.x)
            .field("ymax", &self.max.y)
            .finish()
    }
}

impl<TSpace> Default for BBoxXYXY<TSpace> {
    fn default() -> Self {
        Self::from_xyxy(0.0, 0.0, 0.0, 0.0)
    }
}

/// A box as `(center_x, center_y, width, height)`, each a fraction of the
/// image size. This is the payload of a normalized-center label line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CenterSize {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl BBoxXYXY<Pixel> {
    /// Converts pixel corners to the normalized center-size encoding.
    ///
    /// The center is shifted by one pixel before normalizing
    /// (`cx = ((xmin + xmax) / 2 - 1) / W`). Existing normalized-center
    /// datasets were produced with this offset, so it is kept for
    /// bit-compatible output.
    pub fn to_center_size(&self, image_width: u32, image_height: u32) -> CenterSize {
        let dw = 1.0 / image_width as f64;
        let dh = 1.0 / image_height as f64;
        CenterSize {
            cx: ((self.xmin() + self.xmax()) / 2.0 - 1.0) * dw,
            cy: ((self.ymin() + self.ymax()) / 2.0 - 1.0) * dh,
            w: self.width() * dw,
            h: self.height() * dh,
        }
    }

    /// True iff both x corners lie in `[region.xmin, region.xmax]` and both y
    /// corners lie in `[region.ymin, region.ymax]`.
    ///
    /// A box that only partially overlaps the region is outside; tiles never
    /// clip boxes.
    pub fn is_fully_inside(&self, region: &BBoxXYXY<Pixel>) -> bool {
        let x_range = region.xmin()..=region.xmax();
        let y_range = region.ymin()..=region.ymax();
        x_range.contains(&self.xmin())
            && x_range.contains(&self.xmax())
            && y_range.contains(&self.ymin())
            && y_range.contains(&self.ymax())
    }

    /// Expresses the box relative to an origin at `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.min.shifted_back(dx, dy), self.max.shifted_back(dx, dy))
    }

    /// The min/max envelope of a set of points, or `None` for an empty set.
    pub fn envelope(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let (xmin, ymin, xmax, ymax) = rest.iter().fold(
            (x0, y0, x0, y0),
            |(xmin, ymin, xmax, ymax), &(x, y)| {
                (xmin.min(x), ymin.min(y), xmax.max(x), ymax.max(y))
            },
        );
        Some(Self::from_xyxy(xmin, ymin, xmax, ymax))
    }
}

impl CenterSize {
    /// Inverse of [`BBoxXYXY::to_center_size`], each corner rounded to the
    /// nearest pixel.
    pub fn to_corners(&self, image_width: u32, image_height: u32) -> BBoxXYXY<Pixel> {
        let (w_px, h_px) = (image_width as f64, image_height as f64);
        let cx = self.cx * w_px + 1.0;
        let cy = self.cy * h_px + 1.0;
        let half_w = self.w * w_px / 2.0;
        let half_h = self.h * h_px / 2.0;
        BBoxXYXY::from_xyxy(
            (cx - half_w).round(),
            (cy - half_h).round(),
            (cx + half_w).round(),
            (cy + half_h).round(),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.cx.is_finite() && self.cy.is_finite() && self.w.is_finite() && self.h.is_finite()
    }
}
