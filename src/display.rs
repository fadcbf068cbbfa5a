//! Screen geometry used to keep the pointer on screen and for edge jumps.

use crate::action::Edge;
use crate::error::Result;

/// A rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left coordinate.
    pub x: f64,
    /// Top coordinate.
    pub y: f64,
    /// Width in screen points.
    pub width: f64,
    /// Height in screen points.
    pub height: f64,
}

impl Rect {
    /// Check whether a point is inside this rectangle.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    fn right(&self) -> f64 {
        self.x + (self.width - 1.0).max(0.0)
    }

    fn bottom(&self) -> f64 {
        self.y + (self.height - 1.0).max(0.0)
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Rect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }

    /// Nearest point inside the rectangle.
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (x.clamp(self.x, self.right()), y.clamp(self.y, self.bottom()))
    }

    /// The point on `edge` closest to `(x, y)`.
    pub fn edge_point(&self, edge: Edge, x: f64, y: f64) -> (f64, f64) {
        let (x, y) = self.clamp(x, y);
        match edge {
            Edge::Top => (x, self.y),
            Edge::Bottom => (x, self.bottom()),
            Edge::Left => (self.x, y),
            Edge::Right => (self.right(), y),
        }
    }
}

/// Information about a display/monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    /// Platform-specific identifier (best-effort).
    pub id: u32,
    /// Display bounds in screen coordinates.
    pub bounds: Rect,
    /// Whether this is the primary display.
    pub is_primary: bool,
}

/// Bounding box of all displays.
pub fn desktop_bounds(displays: &[DisplayInfo]) -> Option<Rect> {
    displays
        .iter()
        .map(|d| d.bounds)
        .reduce(|acc, rect| acc.union(&rect))
}

/// The display containing a point, else the primary, else the first.
pub fn display_for_point(displays: &[DisplayInfo], x: f64, y: f64) -> Option<&DisplayInfo> {
    displays
        .iter()
        .find(|d| d.bounds.contains(x, y))
        .or_else(|| displays.iter().find(|d| d.is_primary))
        .or_else(|| displays.first())
}

/// List all available displays.
pub fn displays() -> Result<Vec<DisplayInfo>> {
    crate::platform::displays()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_screens() -> Vec<DisplayInfo> {
        vec![
            DisplayInfo {
                id: 1,
                bounds: Rect {
                    x: 0.0,
                    y: 0.0,
                    width: 1920.0,
                    height: 1080.0,
                },
                is_primary: true,
            },
            DisplayInfo {
                id: 2,
                bounds: Rect {
                    x: 1920.0,
                    y: -200.0,
                    width: 1280.0,
                    height: 1024.0,
                },
                is_primary: false,
            },
        ]
    }

    #[test]
    fn test_desktop_bounds() {
        let bounds = desktop_bounds(&two_screens()).unwrap();
        assert_eq!(
            bounds,
            Rect {
                x: 0.0,
                y: -200.0,
                width: 3200.0,
                height: 1280.0,
            }
        );
        assert!(desktop_bounds(&[]).is_none());
    }

    #[test]
    fn test_clamp() {
        let rect = two_screens()[0].bounds;
        assert_eq!(rect.clamp(-5.0, 2000.0), (0.0, 1079.0));
        assert_eq!(rect.clamp(100.0, 100.0), (100.0, 100.0));
    }

    #[test]
    fn test_edge_points() {
        let rect = two_screens()[0].bounds;
        assert_eq!(rect.edge_point(Edge::Top, 500.0, 600.0), (500.0, 0.0));
        assert_eq!(rect.edge_point(Edge::Bottom, 500.0, 600.0), (500.0, 1079.0));
        assert_eq!(rect.edge_point(Edge::Left, 500.0, 600.0), (0.0, 600.0));
        assert_eq!(rect.edge_point(Edge::Right, 500.0, 600.0), (1919.0, 600.0));
    }

    #[test]
    fn test_display_for_point() {
        let displays = two_screens();
        assert_eq!(display_for_point(&displays, 2000.0, 0.0).unwrap().id, 2);
        assert_eq!(display_for_point(&displays, -50.0, -50.0).unwrap().id, 1);
        assert!(display_for_point(&[], 0.0, 0.0).is_none());
    }
}
