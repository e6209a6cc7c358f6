//! Text items.

use super::ItemColor;
use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// Font weight options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontWeight {
    Light,
    #[default]
    Regular,
    Bold,
}

impl FontWeight {
    /// Numeric CSS weight.
    pub fn css_value(&self) -> u16 {
        match self {
            FontWeight::Light => 300,
            FontWeight::Regular => 400,
            FontWeight::Bold => 700,
        }
    }

    /// Parse a CSS weight keyword or number.
    pub fn from_css(value: &str) -> Option<Self> {
        match value.trim() {
            "normal" => Some(FontWeight::Regular),
            "bold" | "bolder" => Some(FontWeight::Bold),
            "light" | "lighter" => Some(FontWeight::Light),
            other => {
                let numeric: u16 = other.parse().ok()?;
                Some(match numeric {
                    0..=349 => FontWeight::Light,
                    350..=599 => FontWeight::Regular,
                    _ => FontWeight::Bold,
                })
            }
        }
    }
}

/// Font used by a text item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    /// Size in pixels.
    pub size_px: f64,
    pub weight: FontWeight,
    pub italic: bool,
}

impl FontSpec {
    pub const DEFAULT_FAMILY: &'static str = "Arial";
    pub const DEFAULT_SIZE: f64 = 20.0;
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: Self::DEFAULT_FAMILY.to_string(),
            size_px: Self::DEFAULT_SIZE,
            weight: FontWeight::default(),
            italic: false,
        }
    }
}

/// Which point of the text box the geometry origin denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextOrigin {
    #[default]
    TopLeft,
    /// Left end of the first baseline (old text elements).
    Baseline,
}

/// A text box.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextItem {
    /// Rich text (HTML) or plain content.
    pub content: String,
    pub font: FontSpec,
    pub color: Option<ItemColor>,
    #[serde(default)]
    pub origin: TextOrigin,
}

impl TextItem {
    /// Ascent as a fraction of the font size.
    pub const ASCENT_RATIO: f64 = 0.8;

    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_font(mut self, font: FontSpec) -> Self {
        self.font = font;
        self
    }

    pub fn ascent(&self) -> f64 {
        self.font.size_px * Self::ASCENT_RATIO
    }

    /// `geometry` expressed with a top-left origin.
    pub fn top_left_geometry(&self, geometry: Rect) -> Rect {
        match self.origin {
            TextOrigin::TopLeft => geometry,
            TextOrigin::Baseline => {
                let ascent = self.ascent();
                Rect::new(geometry.x0, geometry.y0 - ascent, geometry.x1, geometry.y1 - ascent)
            }
        }
    }
}
