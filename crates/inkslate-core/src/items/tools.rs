//! Geometry tools and page masks.

use super::ItemColor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxesItem {
    pub show_numbers: bool,
}

impl Default for AxesItem {
    fn default() -> Self {
        Self { show_numbers: true }
    }
}

/// Protractor angles, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtractorItem {
    pub start_angle: f64,
    pub marker_angle: f64,
}

/// Corner holding the triangle's right angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriangleOrientation {
    #[default]
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
}

impl TriangleOrientation {
    pub fn name(&self) -> &'static str {
        match self {
            TriangleOrientation::BottomLeft => "BottomLeft",
            TriangleOrientation::BottomRight => "BottomRight",
            TriangleOrientation::TopLeft => "TopLeft",
            TriangleOrientation::TopRight => "TopRight",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BottomLeft" => Some(TriangleOrientation::BottomLeft),
            "BottomRight" => Some(TriangleOrientation::BottomRight),
            "TopLeft" => Some(TriangleOrientation::TopLeft),
            "TopRight" => Some(TriangleOrientation::TopRight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriangleItem {
    pub orientation: TriangleOrientation,
}

/// Shape of the hole a cache cuts into its mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheShape {
    #[default]
    Circle,
    Square,
}

/// Page mask with a movable hole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheItem {
    pub color: ItemColor,
    pub shape: CacheShape,
    pub shape_width: f64,
}

impl CacheItem {
    pub const DEFAULT_SHAPE_WIDTH: f64 = 100.0;
}

impl Default for CacheItem {
    fn default() -> Self {
        Self {
            color: ItemColor::black(),
            shape: CacheShape::default(),
            shape_width: Self::DEFAULT_SHAPE_WIDTH,
        }
    }
}
