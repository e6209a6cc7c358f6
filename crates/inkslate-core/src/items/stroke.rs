//! Freehand strokes, aggregated from persisted segments.

use super::ItemColor;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// How a segment is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentShape {
    /// Filled outline.
    Polygon,
    /// Open centerline drawn with a pen width.
    Polyline,
    /// Straight two-point line.
    Line,
}

/// One persisted piece of a stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeSegment {
    pub shape: SegmentShape,
    pub points: Vec<Point>,
    /// Pen pressure per point; empty when not recorded.
    #[serde(default)]
    pub pressures: Vec<f64>,
    pub color: ItemColor,
    /// Pen width for polylines and lines.
    pub width: f64,
}

impl StrokeSegment {
    pub fn new(shape: SegmentShape, points: Vec<Point>, color: ItemColor) -> Self {
        Self {
            shape,
            points,
            pressures: Vec::new(),
            color,
            width: 1.0,
        }
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = width;
        self
    }
}

/// A logical freehand stroke: every segment sharing one stroke key.
///
/// Segments and their points keep insertion order; that order is the
/// persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokesGroup {
    pub key: String,
    pub segments: Vec<StrokeSegment>,
}

impl StrokesGroup {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            segments: Vec::new(),
        }
    }

    pub fn push_segment(&mut self, segment: StrokeSegment) {
        self.segments.push(segment);
    }

    /// All points of all segments, concatenated in order.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.segments.iter().flat_map(|s| s.points.iter().copied())
    }

    pub fn point_count(&self) -> usize {
        self.segments.iter().map(|s| s.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Bounding box of all points.
    pub fn bounds(&self) -> Rect {
        let mut points = self.points();
        let Some(first) = points.next() else {
            return Rect::ZERO;
        };

        let mut min_x = first.x;
        let mut min_y = first.y;
        let mut max_x = first.x;
        let mut max_y = first.y;

        for point in points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        Rect::new(min_x, min_y, max_x, max_y)
    }
}
