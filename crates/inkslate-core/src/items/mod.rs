//! Graphical items placed on a page.
//!
//! Every item is a tagged variant: shared geometry, transform and flags in
//! [`Item`], kind-specific payload in [`ItemKind`]. Persistence dispatches on
//! the kind tag instead of going through per-kind behaviour.

mod group;
mod media;
mod stroke;
mod text;
mod tools;

pub use group::{Group, GroupInfo};
pub use media::{ImageFormat, MediaItem, PdfPageItem, PixmapItem, ResourceRef, VectorImageItem, WidgetItem};
pub use stroke::{SegmentShape, StrokeSegment, StrokesGroup};
pub use text::{FontSpec, FontWeight, TextItem, TextOrigin};
pub use tools::{AxesItem, CacheItem, CacheShape, ProtractorItem, TriangleItem, TriangleOrientation};

use kurbo::{Affine, Rect};
use peniko::Color;
use peniko::color::{Srgb, parse_color};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for items.
pub type ItemId = Uuid;

/// RGBA8 color as stored on items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ItemColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse a CSS color (`#rrggbb`, `#rgb`, named colors, `rgb(...)`).
    pub fn parse(text: &str) -> Option<Self> {
        let color = parse_color(text.trim()).ok()?;
        Some(color.to_alpha_color::<Srgb>().into())
    }

    /// Alpha as a fraction in `0.0..=1.0`.
    pub fn alpha_f(&self) -> f64 {
        f64::from(self.a) / 255.0
    }

    /// Same color with the alpha channel replaced by a fraction.
    pub fn with_alpha_f(self, alpha: f64) -> Self {
        let alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 1.0 };
        Self {
            a: (alpha * 255.0).round() as u8,
            ..self
        }
    }

    /// `#rrggbb`, alpha excluded.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// `#rrggbb`, or `#rrggbbaa` when the color is not opaque.
    pub fn to_hex_alpha(&self) -> String {
        if self.a == u8::MAX {
            self.to_hex()
        } else {
            format!("{}{:02x}", self.to_hex(), self.a)
        }
    }
}

impl From<Color> for ItemColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<ItemColor> for Color {
    fn from(color: ItemColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Ink colors used when the page background is dark or light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorPair {
    pub on_dark: Option<ItemColor>,
    pub on_light: Option<ItemColor>,
}

impl ColorPair {
    pub fn new(on_dark: ItemColor, on_light: ItemColor) -> Self {
        Self {
            on_dark: Some(on_dark),
            on_light: Some(on_light),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.on_dark.is_none() && self.on_light.is_none()
    }

    /// Fill missing entries from `defaults`.
    pub fn or(self, defaults: ColorPair) -> Self {
        Self {
            on_dark: self.on_dark.or(defaults.on_dark),
            on_light: self.on_light.or(defaults.on_light),
        }
    }
}

/// Kind-specific payload of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    Stroke(StrokesGroup),
    Pixmap(PixmapItem),
    VectorImage(VectorImageItem),
    PdfPage(PdfPageItem),
    Text(TextItem),
    Video(MediaItem),
    Audio(MediaItem),
    NativeWidget(WidgetItem),
    WebWidget(WidgetItem),
    Curtain,
    Ruler,
    Axes(AxesItem),
    Compass,
    Protractor(ProtractorItem),
    Triangle(TriangleItem),
    Cache(CacheItem),
    Group(Group),
}

impl ItemKind {
    /// Stable type tag for the kind.
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Stroke(_) => "stroke",
            ItemKind::Pixmap(_) => "pixmap",
            ItemKind::VectorImage(_) => "vector-image",
            ItemKind::PdfPage(_) => "pdf-page",
            ItemKind::Text(_) => "text",
            ItemKind::Video(_) => "video",
            ItemKind::Audio(_) => "audio",
            ItemKind::NativeWidget(_) => "native-widget",
            ItemKind::WebWidget(_) => "web-widget",
            ItemKind::Curtain => "curtain",
            ItemKind::Ruler => "ruler",
            ItemKind::Axes(_) => "axes",
            ItemKind::Compass => "compass",
            ItemKind::Protractor(_) => "protractor",
            ItemKind::Triangle(_) => "triangle",
            ItemKind::Cache(_) => "cache",
            ItemKind::Group(_) => "group",
        }
    }

    /// Linked or embedded resource of resource-backed kinds.
    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            ItemKind::Pixmap(p) => p.resource.as_ref(),
            ItemKind::VectorImage(v) => v.resource.as_ref(),
            ItemKind::PdfPage(p) => p.resource.as_ref(),
            ItemKind::Video(m) | ItemKind::Audio(m) => m.resource.as_ref(),
            ItemKind::NativeWidget(w) | ItemKind::WebWidget(w) => w.resource.as_ref(),
            _ => None,
        }
    }
}

/// A graphical item: geometry in local coordinates plus a transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub(crate) id: ItemId,
    /// Rectangle in local coordinates.
    pub geometry: Rect,
    /// Position, rotation, scale and mirroring.
    pub transform: Affine,
    pub z_value: f64,
    pub locked: bool,
    pub visible: bool,
    /// Ink colors for dark and light page backgrounds.
    #[serde(default)]
    pub colors: ColorPair,
    /// Where the content originally came from, if known.
    #[serde(default)]
    pub source_url: Option<String>,
    pub kind: ItemKind,
}

impl Item {
    /// Create an item with a fresh id, empty geometry and identity transform.
    pub fn new(kind: ItemKind) -> Self {
        Self::with_id(Uuid::new_v4(), kind)
    }

    /// Create an item with a specific id.
    pub fn with_id(id: ItemId, kind: ItemKind) -> Self {
        Self {
            id,
            geometry: Rect::ZERO,
            transform: Affine::IDENTITY,
            z_value: 0.0,
            locked: false,
            visible: true,
            colors: ColorPair::default(),
            source_url: None,
            kind,
        }
    }

    pub fn with_geometry(mut self, geometry: Rect) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_z(mut self, z_value: f64) -> Self {
        self.z_value = z_value;
        self
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Replace the id with a new unique one.
    pub fn regenerate_id(&mut self) {
        self.id = Uuid::new_v4();
    }

    /// Bounding box after applying the transform.
    pub fn bounds(&self) -> Rect {
        self.transform.transform_rect_bbox(self.geometry)
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ItemKind::Group(_))
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            ItemKind::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.kind {
            ItemKind::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_stroke(&self) -> Option<&StrokesGroup> {
        match &self.kind {
            ItemKind::Stroke(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_stroke_mut(&mut self) -> Option<&mut StrokesGroup> {
        match &mut self.kind {
            ItemKind::Stroke(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextItem> {
        match &self.kind {
            ItemKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Find an item by id in this item or its descendants.
    pub fn find(&self, id: ItemId) -> Option<&Item> {
        if self.id == id {
            return Some(self);
        }
        self.as_group().and_then(|g| g.find_item(id))
    }

    /// Visit this item and every descendant, depth first.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Item)) {
        f(self);
        if let Some(group) = self.as_group() {
            for child in &group.children {
                child.walk(f);
            }
        }
    }

    /// Mutable variant of [`Item::walk`].
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Item)) {
        f(self);
        if let Some(group) = self.as_group_mut() {
            for child in &mut group.children {
                child.walk_mut(f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse_hex_and_names() {
        assert_eq!(ItemColor::parse("#ff0000"), Some(ItemColor::new(255, 0, 0, 255)));
        assert_eq!(ItemColor::parse(" #000 "), Some(ItemColor::black()));
        assert_eq!(ItemColor::parse("white"), Some(ItemColor::white()));
        assert_eq!(ItemColor::parse("not-a-color"), None);
    }

    #[test]
    fn test_color_hex_and_alpha() {
        let color = ItemColor::new(18, 52, 86, 255).with_alpha_f(0.5);
        assert_eq!(color.to_hex(), "#123456");
        assert_eq!(color.a, 128);
        assert!((color.with_alpha_f(2.0).alpha_f() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hex_alpha_parses_back() {
        let color = ItemColor::new(18, 52, 86, 100);
        assert_eq!(color.to_hex_alpha(), "#12345664");
        assert_eq!(ItemColor::parse(&color.to_hex_alpha()), Some(color));
        assert_eq!(ItemColor::black().to_hex_alpha(), "#000000");
    }

    #[test]
    fn test_color_pair_defaults() {
        let pair = ColorPair {
            on_dark: Some(ItemColor::white()),
            on_light: None,
        };
        let filled = pair.or(ColorPair::new(ItemColor::black(), ItemColor::black()));
        assert_eq!(filled.on_dark, Some(ItemColor::white()));
        assert_eq!(filled.on_light, Some(ItemColor::black()));
        assert!(ColorPair::default().is_empty());
    }

    #[test]
    fn test_item_bounds_follow_transform() {
        let item = Item::new(ItemKind::Ruler)
            .with_geometry(Rect::new(0.0, 0.0, 10.0, 20.0))
            .with_transform(Affine::translate((5.0, 5.0)));
        let bounds = item.bounds();
        assert!((bounds.x0 - 5.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_walk_visits_descendants() {
        let inner = Item::new(ItemKind::Curtain);
        let inner_id = inner.id();
        let group = Item::new(ItemKind::Group(Group::new(vec![inner, Item::new(ItemKind::Compass)])));

        let mut count = 0;
        group.walk(&mut |_| count += 1);
        assert_eq!(count, 3);
        assert!(group.find(inner_id).is_some());
        assert_eq!(group.kind.name(), "group");
    }
}
