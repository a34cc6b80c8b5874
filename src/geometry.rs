//! Coordinate denormalization.
//!
//! Detection streams describe boxes as normalized center boxes (cx, cy, w, h), each a
//! fraction of the frame width/height. Drawing and classification work on pixel-space
//! corners. This module owns that conversion and the clamping to frame bounds.

use serde::{Deserialize, Serialize};

/// Pixel dimensions of the frame being annotated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Normalized center box: center and size as fractions of the frame dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl NormBox {
    pub fn new(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self { cx, cy, w, h }
    }

    /// Pixel-space corners, rounded but NOT clamped.
    pub fn to_pixels(&self, res: Resolution) -> PixelBox {
        let fw = res.width as f64;
        let fh = res.height as f64;
        let cx = self.cx * fw;
        let cy = self.cy * fh;
        let half_w = self.w * fw / 2.0;
        let half_h = self.h * fh / 2.0;
        PixelBox {
            x1: (cx - half_w).round() as i32,
            y1: (cy - half_h).round() as i32,
            x2: (cx + half_w).round() as i32,
            y2: (cy + half_h).round() as i32,
        }
    }

    /// Pixel-space corners clamped to `[0, W]` x `[0, H]`.
    pub fn to_clamped_pixels(&self, res: Resolution) -> PixelBox {
        self.to_pixels(res).clamp_to(res)
    }
}

/// Pixel-space corner box. `x1 <= x2` is not guaranteed; zero-size boxes are legal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn clamp_to(self, res: Resolution) -> Self {
        let max_x = i32::try_from(res.width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(res.height).unwrap_or(i32::MAX);
        Self {
            x1: self.x1.clamp(0, max_x),
            y1: self.y1.clamp(0, max_y),
            x2: self.x2.clamp(0, max_x),
            y2: self.y2.clamp(0, max_y),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Integer center, truncating toward zero.
    pub fn center(&self) -> (i32, i32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    /// Smallest box enclosing all points. `None` for an empty iterator.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
        for (x, y) in iter {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self {
            x1: min_x.round() as i32,
            y1: min_y.round() as i32,
            x2: max_x.round() as i32,
            y2: max_y.round() as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_box_maps_to_pixel_corners() {
        let b = NormBox::new(0.5, 0.5, 0.2, 0.4);
        let px = b.to_pixels(Resolution::new(1000, 2000));
        assert_eq!(px, PixelBox::new(400, 600, 600, 1400));
    }

    #[test]
    fn clamping_keeps_corners_inside_frame() {
        let b = NormBox::new(0.05, 0.98, 0.3, 0.1);
        let res = Resolution::new(640, 480);
        let raw = b.to_pixels(res);
        assert!(raw.x1 < 0);
        assert!(raw.y2 > 480);

        let clamped = b.to_clamped_pixels(res);
        assert_eq!(clamped.x1, 0);
        assert_eq!(clamped.y2, 480);
        assert_eq!(clamped.x2, raw.x2);
        assert_eq!(clamped.y1, raw.y1);
    }

    #[test]
    fn zero_size_box_is_degenerate_not_an_error() {
        let b = NormBox::new(0.5, 0.5, 0.0, 0.0).to_clamped_pixels(Resolution::new(100, 100));
        assert_eq!(b, PixelBox::new(50, 50, 50, 50));
        assert!(b.is_degenerate());
    }

    #[test]
    fn enclosing_box_of_points() {
        let b = PixelBox::enclosing([(10.0, 40.0), (30.2, 5.0), (22.0, 18.0)]).unwrap();
        assert_eq!(b, PixelBox::new(10, 5, 30, 40));
        assert!(PixelBox::enclosing(std::iter::empty()).is_none());
    }
}
