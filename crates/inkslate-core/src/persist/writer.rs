//! Markup writer: serializes a scene in the current dialect.

use super::dialect::{
    FONT_SIZE_PREFIX, FONT_STYLE_PREFIX, FONT_WEIGHT_PREFIX, PIXEL_UNIT, SVG_NAMESPACE, UB_NAMESPACE,
    XHTML_NAMESPACE, XLINK_NAMESPACE, XML_FALSE, XML_TRUE,
};
use super::transform::{self, format_number};
use super::{PersistConfig, PersistError, PersistResult};
use crate::items::{
    CacheShape, ColorPair, Item, ItemColor, ItemKind, ResourceRef, SegmentShape, StrokeSegment, StrokesGroup,
    TextItem, WidgetItem,
};
use crate::scene::Scene;
use crate::version::FileVersion;
use kurbo::Rect;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, Event};
use std::collections::HashSet;
use std::path::Path;

/// Remap of polygon fill alpha kept for compatibility with older readers.
/// Not inverted on read.
pub fn trick_alpha(alpha: f64) -> f64 {
    if (0.2..0.6).contains(&alpha) {
        alpha / 5.0
    } else if alpha < 0.8 {
        alpha / 3.0
    } else {
        alpha
    }
}

/// Serialize `scene`; resource paths are written relative to `base_path`.
pub fn write_scene(scene: &Scene, base_path: &Path, config: &PersistConfig) -> PersistResult<Vec<u8>> {
    SceneWriter::new(scene, base_path, config).write()
}

fn bool_literal(value: bool) -> &'static str {
    if value { XML_TRUE } else { XML_FALSE }
}

/// Writes one scene.
pub struct SceneWriter<'a> {
    scene: &'a Scene,
    base_path: &'a Path,
    writer: Writer<Vec<u8>>,
    stroke_keys: HashSet<String>,
}

impl<'a> SceneWriter<'a> {
    pub fn new(scene: &'a Scene, base_path: &'a Path, config: &PersistConfig) -> Self {
        let writer = match config.indent {
            Some(indent) => Writer::new_with_indent(Vec::new(), b' ', indent),
            None => Writer::new(Vec::new()),
        };
        Self {
            scene,
            base_path,
            writer,
            stroke_keys: HashSet::new(),
        }
    }

    pub fn write(mut self) -> PersistResult<Vec<u8>> {
        let scene = self.scene;
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("svg");
        root.push_attribute(("xmlns", SVG_NAMESPACE));
        root.push_attribute(("xmlns:ub", UB_NAMESPACE));
        root.push_attribute(("xmlns:xlink", XLINK_NAMESPACE));
        root.push_attribute(("xmlns:xhtml", XHTML_NAMESPACE));
        root.push_attribute(("version", "1.1"));
        root.push_attribute(("ub:version", FileVersion::CURRENT.to_string().as_str()));
        root.push_attribute(("ub:uuid", scene.uuid.braced().to_string().as_str()));
        if let Some(rect) = scene.scene_rect {
            let view_box = [rect.x0, rect.y0, rect.width(), rect.height()]
                .iter()
                .map(|v| format_number(*v))
                .collect::<Vec<_>>()
                .join(" ");
            root.push_attribute(("viewBox", view_box.as_str()));
        }
        if let Some(size) = scene.nominal_size {
            let size = format!("{}x{}", format_number(size.width), format_number(size.height));
            root.push_attribute(("ub:nominal-size", size.as_str()));
        }
        root.push_attribute(("ub:dark-background", bool_literal(scene.background.dark)));
        root.push_attribute(("ub:crossed-background", bool_literal(scene.background.crossed)));
        root.push_attribute(("ub:ruled-background", bool_literal(scene.background.ruled)));
        if let Some(grid_size) = scene.background.grid_size {
            root.push_attribute(("ub:grid-size", format_number(grid_size).as_str()));
        }
        self.event(Event::Start(root))?;

        for item in scene.items() {
            self.write_item(item, ColorPair::default())?;
        }

        self.event(Event::End(BytesEnd::new("svg")))?;
        Ok(self.writer.into_inner())
    }

    fn event(&mut self, event: Event<'_>) -> PersistResult<()> {
        self.writer
            .write_event(event)
            .map_err(|e| PersistError::Write(e.to_string()))
    }

    fn write_item(&mut self, item: &Item, parent_colors: ColorPair) -> PersistResult<()> {
        match &item.kind {
            ItemKind::Group(group) => {
                let mut start = BytesStart::new("g");
                push_common(&mut start, item, None);
                push_colors(&mut start, group.info.colors, parent_colors);
                self.event(Event::Start(start))?;
                for child in group.children() {
                    self.write_item(child, group.info.colors)?;
                }
                self.event(Event::End(BytesEnd::new("g")))
            }
            ItemKind::Stroke(stroke) => self.write_stroke(item, stroke, parent_colors),
            ItemKind::Pixmap(pixmap) => {
                let mut start = self.item_start("image", item, parent_colors);
                self.push_link(&mut start, pixmap.resource.as_ref(), None);
                if pixmap.background {
                    start.push_attribute(("ub:background", XML_TRUE));
                }
                self.event(Event::Empty(start))
            }
            ItemKind::VectorImage(image) => {
                let mut start = self.item_start("image", item, parent_colors);
                self.push_link(&mut start, image.resource.as_ref(), None);
                self.event(Event::Empty(start))
            }
            ItemKind::PdfPage(pdf) => {
                let mut start = self.item_start("foreignObject", item, parent_colors);
                start.push_attribute(("ub:type", "pdf"));
                self.push_link(&mut start, pdf.resource.as_ref(), Some(pdf.page));
                self.event(Event::Empty(start))
            }
            ItemKind::Text(text) => self.write_text(item, text, parent_colors),
            ItemKind::Video(media) | ItemKind::Audio(media) => {
                let name = if matches!(item.kind, ItemKind::Video(_)) { "video" } else { "audio" };
                let mut start = self.item_start(name, item, parent_colors);
                self.push_link(&mut start, media.resource.as_ref(), None);
                start.push_attribute(("ub:muted", bool_literal(media.muted)));
                self.event(Event::Empty(start))
            }
            ItemKind::NativeWidget(widget) => self.write_widget(item, widget, "native-widget", parent_colors),
            ItemKind::WebWidget(widget) => self.write_widget(item, widget, "web-widget", parent_colors),
            ItemKind::Curtain => self.write_tool("ub:curtain", item, parent_colors, |_| {}),
            ItemKind::Ruler => self.write_tool("ub:ruler", item, parent_colors, |_| {}),
            ItemKind::Compass => self.write_tool("ub:compass", item, parent_colors, |_| {}),
            ItemKind::Axes(axes) => self.write_tool("ub:axes", item, parent_colors, |start| {
                start.push_attribute(("ub:numbers", bool_literal(axes.show_numbers)));
            }),
            ItemKind::Protractor(protractor) => self.write_tool("ub:protractor", item, parent_colors, |start| {
                start.push_attribute(("ub:angle", format_number(protractor.start_angle).as_str()));
                start.push_attribute(("ub:marker-angle", format_number(protractor.marker_angle).as_str()));
            }),
            ItemKind::Triangle(triangle) => self.write_tool("ub:triangle", item, parent_colors, |start| {
                start.push_attribute(("ub:orientation", triangle.orientation.name()));
            }),
            ItemKind::Cache(cache) => self.write_tool("ub:cache", item, parent_colors, |start| {
                start.push_attribute(("fill", cache.color.to_hex().as_str()));
                if cache.color.a < u8::MAX {
                    start.push_attribute(("fill-opacity", format_number(cache.color.alpha_f()).as_str()));
                }
                let shape = match cache.shape {
                    CacheShape::Circle => "circle",
                    CacheShape::Square => "square",
                };
                start.push_attribute(("ub:shape", shape));
                start.push_attribute(("ub:shape-width", format_number(cache.shape_width).as_str()));
            }),
        }
    }

    /// Start tag with geometry, shared attributes and colors.
    fn item_start(&self, name: &'static str, item: &Item, parent_colors: ColorPair) -> BytesStart<'static> {
        let mut start = BytesStart::new(name);
        push_common(&mut start, item, Some(item.geometry));
        push_colors(&mut start, item.colors, parent_colors);
        start
    }

    fn write_tool(
        &mut self,
        name: &'static str,
        item: &Item,
        parent_colors: ColorPair,
        extra: impl FnOnce(&mut BytesStart<'static>),
    ) -> PersistResult<()> {
        let mut start = self.item_start(name, item, parent_colors);
        extra(&mut start);
        self.event(Event::Empty(start))
    }

    fn write_stroke(&mut self, item: &Item, stroke: &StrokesGroup, parent_colors: ColorPair) -> PersistResult<()> {
        if stroke.segments.is_empty() {
            log::debug!("Not writing empty stroke {}", stroke.key);
            return Ok(());
        }

        let key = self.unique_stroke_key(item, stroke);
        for (i, segment) in stroke.segments.iter().enumerate() {
            let name = match segment.shape {
                SegmentShape::Polygon => "polygon",
                SegmentShape::Polyline => "polyline",
                SegmentShape::Line => "line",
            };
            let mut start = BytesStart::new(name);
            if i == 0 {
                push_common(&mut start, item, None);
                push_colors(&mut start, item.colors, parent_colors);
            }
            start.push_attribute(("ub:parent", key.as_str()));
            push_segment(&mut start, segment);
            self.event(Event::Empty(start))?;
        }
        Ok(())
    }

    /// Segments are regrouped by key on read, so no two strokes on a page
    /// may share one.
    fn unique_stroke_key(&mut self, item: &Item, stroke: &StrokesGroup) -> String {
        let mut key = stroke.key.clone();
        if key.is_empty() || self.stroke_keys.contains(&key) {
            key = item.id().braced().to_string();
        }
        let mut n = 1;
        let base = key.clone();
        while self.stroke_keys.contains(&key) {
            key = format!("{}-{}", base, n);
            n += 1;
        }
        if key != stroke.key {
            log::debug!("Writing stroke {} under key {}", item.id(), key);
        }
        self.stroke_keys.insert(key.clone());
        key
    }

    fn write_text(&mut self, item: &Item, text: &TextItem, parent_colors: ColorPair) -> PersistResult<()> {
        let mut start = BytesStart::new("foreignObject");
        push_common(&mut start, item, Some(text.top_left_geometry(item.geometry)));
        push_colors(&mut start, item.colors, parent_colors);
        start.push_attribute(("ub:type", "text"));
        start.push_attribute(("font-family", text.font.family.as_str()));
        let style = format!(
            "{}{}{}; {}{}; {}{};",
            FONT_SIZE_PREFIX,
            format_number(text.font.size_px),
            PIXEL_UNIT,
            FONT_WEIGHT_PREFIX,
            text.font.weight.css_value(),
            FONT_STYLE_PREFIX,
            if text.font.italic { "italic" } else { "normal" }
        );
        start.push_attribute(("style", style.as_str()));
        if let Some(color) = text.color {
            start.push_attribute(("fill", color.to_hex().as_str()));
            if color.a < u8::MAX {
                start.push_attribute(("fill-opacity", format_number(color.alpha_f()).as_str()));
            }
        }
        self.event(Event::Start(start))?;

        self.event(Event::Start(BytesStart::new("itemTextContent")))?;
        // A CDATA section cannot contain `]]>`; split it across sections.
        let mut rest = text.content.as_str();
        while let Some(pos) = rest.find("]]>") {
            self.event(Event::CData(BytesCData::new(&rest[..pos + 2])))?;
            rest = &rest[pos + 2..];
        }
        self.event(Event::CData(BytesCData::new(rest)))?;
        self.event(Event::End(BytesEnd::new("itemTextContent")))?;

        self.event(Event::End(BytesEnd::new("foreignObject")))
    }

    fn write_widget(
        &mut self,
        item: &Item,
        widget: &WidgetItem,
        widget_type: &str,
        parent_colors: ColorPair,
    ) -> PersistResult<()> {
        let mut start = self.item_start("foreignObject", item, parent_colors);
        start.push_attribute(("ub:type", widget_type));
        if let Some(resource) = &widget.resource {
            start.push_attribute(("ub:src", self.link(resource).as_str()));
        }
        self.event(Event::Start(start))?;

        let entries = widget
            .preferences
            .iter()
            .map(|entry| ("ub:preference", entry))
            .chain(widget.datastore.iter().map(|entry| ("ub:datastoreEntry", entry)));
        for (name, (key, value)) in entries {
            let mut entry = BytesStart::new(name);
            entry.push_attribute(("key", key.as_str()));
            entry.push_attribute(("value", value.as_str()));
            self.event(Event::Empty(entry))?;
        }

        self.event(Event::End(BytesEnd::new("foreignObject")))
    }

    fn push_link(&self, start: &mut BytesStart<'static>, resource: Option<&ResourceRef>, page: Option<u32>) {
        let Some(resource) = resource else {
            return;
        };
        let mut link = self.link(resource);
        if let Some(page) = page {
            link = format!("{}#{}", link, page);
        }
        start.push_attribute(("xlink:href", link.as_str()));
    }

    /// Document-relative link for a resource, or a data URI.
    fn link(&self, resource: &ResourceRef) -> String {
        match resource {
            ResourceRef::Embedded { .. } => resource.data_uri().unwrap_or_default(),
            ResourceRef::File { path, .. } => relative_link(self.base_path, path),
        }
    }
}

/// `path` relative to `base`, with `/` separators.
fn relative_link(base: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(base) {
        Ok(relative) => relative,
        Err(_) if path.is_relative() => path,
        Err(_) => {
            log::warn!("Resource {} is outside the document, keeping absolute link", path.display());
            return path.to_string_lossy().into_owned();
        }
    };
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn push_common(start: &mut BytesStart<'static>, item: &Item, geometry: Option<Rect>) {
    if let Some(rect) = geometry {
        start.push_attribute(("x", format_number(rect.x0).as_str()));
        start.push_attribute(("y", format_number(rect.y0).as_str()));
        start.push_attribute(("width", format_number(rect.width()).as_str()));
        start.push_attribute(("height", format_number(rect.height()).as_str()));
    }
    let transform = transform::encode(item.transform);
    if !transform.is_empty() {
        start.push_attribute(("transform", transform.as_str()));
    }
    start.push_attribute(("ub:uuid", item.id().braced().to_string().as_str()));
    start.push_attribute(("ub:z-value", format_number(item.z_value).as_str()));
    if item.locked {
        start.push_attribute(("ub:locked", XML_TRUE));
    }
    if !item.visible {
        start.push_attribute(("visibility", "hidden"));
    }
    if let Some(source) = &item.source_url {
        start.push_attribute(("ub:source", source.as_str()));
    }
}

/// Colors that differ from what the enclosing container supplies.
fn push_colors(start: &mut BytesStart<'static>, colors: ColorPair, parent: ColorPair) {
    let differs = |color: Option<ItemColor>, inherited: Option<ItemColor>| color.filter(|c| Some(*c) != inherited);
    if let Some(color) = differs(colors.on_dark, parent.on_dark) {
        start.push_attribute(("ub:fill-on-dark-background", color.to_hex_alpha().as_str()));
    }
    if let Some(color) = differs(colors.on_light, parent.on_light) {
        start.push_attribute(("ub:fill-on-light-background", color.to_hex_alpha().as_str()));
    }
}

fn push_segment(start: &mut BytesStart<'static>, segment: &StrokeSegment) {
    let color = segment.color;
    match segment.shape {
        SegmentShape::Polygon => {
            start.push_attribute(("points", transform::encode_points(&segment.points).as_str()));
            start.push_attribute(("fill", color.to_hex().as_str()));
            if color.a < u8::MAX {
                let alpha = trick_alpha(color.alpha_f());
                start.push_attribute(("fill-opacity", format_number(alpha).as_str()));
            }
        }
        SegmentShape::Polyline | SegmentShape::Line => {
            if segment.shape == SegmentShape::Line {
                let point = |i: usize| segment.points.get(i).copied().unwrap_or_default();
                let (from, to) = (point(0), point(1));
                start.push_attribute(("x1", format_number(from.x).as_str()));
                start.push_attribute(("y1", format_number(from.y).as_str()));
                start.push_attribute(("x2", format_number(to.x).as_str()));
                start.push_attribute(("y2", format_number(to.y).as_str()));
            } else {
                start.push_attribute(("points", transform::encode_points(&segment.points).as_str()));
            }
            start.push_attribute(("fill", "none"));
            start.push_attribute(("stroke", color.to_hex().as_str()));
            start.push_attribute(("stroke-width", format_number(segment.width).as_str()));
            if color.a < u8::MAX {
                start.push_attribute(("stroke-opacity", format_number(color.alpha_f()).as_str()));
            }
        }
    }
    if !segment.pressures.is_empty() {
        let pressures = segment
            .pressures
            .iter()
            .map(|p| format_number(*p))
            .collect::<Vec<_>>()
            .join(" ");
        start.push_attribute(("ub:pressures", pressures.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Group, GroupInfo, PixmapItem, TextOrigin};
    use kurbo::Point;

    fn write(scene: &Scene) -> String {
        let bytes = write_scene(scene, Path::new("/doc"), &PersistConfig::default()).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_trick_alpha_thresholds() {
        assert_eq!(trick_alpha(0.1), 0.1 / 3.0);
        assert_eq!(trick_alpha(0.2), 0.2 / 5.0);
        assert_eq!(trick_alpha(0.5), 0.5 / 5.0);
        assert_eq!(trick_alpha(0.6), 0.6 / 3.0);
        assert_eq!(trick_alpha(0.79), 0.79 / 3.0);
        assert_eq!(trick_alpha(0.8), 0.8);
        assert_eq!(trick_alpha(1.0), 1.0);
    }

    #[test]
    fn test_relative_links() {
        let base = Path::new("/doc");
        assert_eq!(relative_link(base, Path::new("/doc/images/a.png")), "images/a.png");
        assert_eq!(relative_link(base, Path::new("videos/b.mp4")), "videos/b.mp4");
        assert_eq!(relative_link(base, Path::new("/elsewhere/c.png")), "/elsewhere/c.png");
    }

    #[test]
    fn test_writes_current_dialect() {
        let mut scene = Scene::new();
        scene.version = FileVersion::DEFAULT_LEGACY;
        let markup = write(&scene);
        assert!(markup.contains(r#"ub:version="4.8.0""#));
        assert!(markup.contains(UB_NAMESPACE));
        assert!(markup.contains(&scene.uuid.braced().to_string()));
    }

    #[test]
    fn test_locked_flag_literal() {
        let mut scene = Scene::new();
        let mut locked = Item::new(ItemKind::Ruler);
        locked.locked = true;
        scene.add_item(locked);
        scene.add_item(Item::new(ItemKind::Compass));

        let markup = write(&scene);
        assert_eq!(markup.matches(r#"ub:locked="true""#).count(), 1);
        assert!(!markup.contains("ub:locked=\"false\""));
    }

    #[test]
    fn test_group_colors_not_repeated_on_children() {
        let colors = ColorPair::new(ItemColor::white(), ItemColor::black());
        let mut child = Item::new(ItemKind::Ruler);
        child.colors = colors;
        let group = Group::new(vec![child]).with_info(GroupInfo { colors });

        let mut scene = Scene::new();
        scene.add_item(Item::new(ItemKind::Group(group)));
        let markup = write(&scene);
        assert_eq!(markup.matches("ub:fill-on-dark-background").count(), 1);
        assert!(markup.contains("<g "));
    }

    #[test]
    fn test_polygon_alpha_is_remapped() {
        let segment = StrokeSegment::new(
            SegmentShape::Polygon,
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
            ItemColor::new(255, 0, 0, 255).with_alpha_f(0.4),
        );
        let mut stroke = StrokesGroup::new("k");
        stroke.push_segment(segment);

        let mut scene = Scene::new();
        scene.add_item(Item::new(ItemKind::Stroke(stroke)));
        let markup = write(&scene);
        let expected = format!(r#"fill-opacity="{}""#, format_number(trick_alpha(102.0 / 255.0)));
        assert!(markup.contains(&expected), "{}", markup);
        assert!(markup.contains(r#"ub:parent="k""#));
    }

    #[test]
    fn test_text_cdata_split() {
        let mut text = TextItem::new("a]]>b");
        text.origin = TextOrigin::TopLeft;
        let mut scene = Scene::new();
        scene.add_item(Item::new(ItemKind::Text(text)));
        let markup = write(&scene);
        assert!(markup.contains("<![CDATA[a]]]]>"), "{}", markup);
        assert!(markup.contains("<![CDATA[>b]]>"), "{}", markup);
    }

    #[test]
    fn test_embedded_pixmap_as_data_uri() {
        let pixmap = PixmapItem {
            resource: Some(ResourceRef::embedded(crate::items::ImageFormat::Png, &[0x89, 0x50, 0x4E, 0x47])),
            background: true,
        };
        let mut scene = Scene::new();
        scene.add_item(Item::new(ItemKind::Pixmap(pixmap)));
        let markup = write(&scene);
        assert!(markup.contains(r#"xlink:href="data:image/png;base64,"#));
        assert!(markup.contains(r#"ub:background="true""#));
    }
}
