//! Incremental markup reader.
//!
//! A [`SceneReader`] consumes one token per [`SceneReader::step`] so callers
//! can interleave a long load with other work. Element-local failures
//! degrade the affected item and are recorded as [`LoadIssue`]s; only a
//! broken token stream fails the load.

use super::dialect::{
    self, Dialect, FONT_SIZE_PREFIX, FONT_STYLE_PREFIX, FONT_WEIGHT_PREFIX, PIXEL_UNIT, UB_NAMESPACES,
    XLINK_NAMESPACE, XML_FALSE, XML_TRUE,
};
use super::tokens::{Attributes, Token, TokenStream};
use super::{LoadIssue, PersistConfig, PersistError, PersistResult, transform, upgrade};
use crate::items::{
    AxesItem, CacheItem, CacheShape, ColorPair, FontSpec, FontWeight, Group, Item, ItemColor, ItemId, ItemKind,
    MediaItem, PdfPageItem, PixmapItem, ProtractorItem, ResourceRef, SegmentShape, StrokeSegment, StrokesGroup,
    TextItem, TextOrigin, TriangleItem, TriangleOrientation, VectorImageItem, WidgetItem,
};
use crate::scene::Scene;
use crate::version::FileVersion;
use kurbo::{Affine, Point, Rect, Size};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Progress of a [`SceneReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    NotStarted,
    Reading,
    Finished,
    /// The token stream was not well formed; no scene is available.
    Failed,
}

/// Defaults a container (the page or a group) hands to its children.
#[derive(Debug, Clone, Copy)]
struct Container {
    colors: ColorPair,
    /// Default z of the first child.
    baseline: f64,
    last_z: Option<f64>,
}

impl Container {
    fn new(colors: ColorPair, baseline: f64) -> Self {
        Self {
            colors,
            baseline,
            last_z: None,
        }
    }

    fn default_z(&self) -> f64 {
        self.last_z.map_or(self.baseline, |z| z + Scene::Z_STEP)
    }

    fn record_z(&mut self, z: f64) {
        self.last_z = Some(self.last_z.map_or(z, |last| last.max(z)));
    }
}

/// One open element.
enum Frame {
    Root(Container),
    Group {
        item: Item,
        container: Container,
        explicit_geometry: bool,
    },
    Widget(Item),
    Text {
        item: Item,
        content: String,
    },
    /// `itemTextContent` inside a text object, or markup nested in it.
    TextContent,
    LegacyText {
        item: Item,
        content: String,
    },
    /// Element whose item (if any) is already placed, or that is ignored.
    Skip,
}

/// Where an open stroke lives: container frame and child index.
#[derive(Debug, Clone, Copy)]
struct StrokeSlot {
    frame: usize,
    index: usize,
}

/// Reader session for one page.
pub struct SceneReader {
    tokens: TokenStream,
    state: ReaderState,
    config: PersistConfig,
    base_path: PathBuf,
    document_version: Option<FileVersion>,
    dialect: Dialect,
    scene: Scene,
    frames: Vec<Frame>,
    /// Open strokes by container frame and `ub:parent` key.
    strokes: HashMap<(usize, String), StrokeSlot>,
    seen_ids: HashSet<ItemId>,
    issues: Vec<LoadIssue>,
    must_finalize: bool,
}

impl SceneReader {
    /// `document_version` is the version declared by the owning document; a
    /// `ub:version` on the page root takes precedence.
    pub fn new(
        bytes: Vec<u8>,
        document_version: Option<FileVersion>,
        base_path: impl Into<PathBuf>,
        config: PersistConfig,
    ) -> Self {
        let version = document_version.unwrap_or(FileVersion::DEFAULT_LEGACY);
        Self {
            tokens: TokenStream::new(bytes),
            state: ReaderState::NotStarted,
            config,
            base_path: base_path.into(),
            document_version,
            dialect: Dialect::resolve(version),
            scene: Scene::new(),
            frames: Vec::new(),
            strokes: HashMap::new(),
            seen_ids: HashSet::new(),
            issues: Vec::new(),
            must_finalize: false,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == ReaderState::Finished
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Problems recovered so far.
    pub fn warnings(&self) -> &[LoadIssue] {
        &self.issues
    }

    /// The loaded scene, once finished.
    pub fn scene(&self) -> Option<&Scene> {
        self.is_finished().then_some(&self.scene)
    }

    pub fn into_scene(self) -> PersistResult<Scene> {
        if self.is_finished() {
            Ok(self.scene)
        } else {
            Err(PersistError::NotReady("page is not fully read"))
        }
    }

    /// Step until finished.
    pub fn read_to_end(mut self) -> PersistResult<Scene> {
        while !self.is_finished() {
            self.step()?;
        }
        self.into_scene()
    }

    /// Consume exactly one token.
    pub fn step(&mut self) -> PersistResult<()> {
        match self.state {
            ReaderState::Finished => return Ok(()),
            ReaderState::Failed => return Err(PersistError::NotReady("reader has failed")),
            ReaderState::NotStarted => self.state = ReaderState::Reading,
            ReaderState::Reading => {}
        }

        let result = self.tokens.next_token().and_then(|token| self.handle(token));
        if let Err(e) = &result {
            log::warn!("Page load failed: {}", e);
            self.state = ReaderState::Failed;
            self.strokes.clear();
        }
        result
    }

    fn handle(&mut self, token: Token) -> PersistResult<()> {
        match token {
            Token::StartElement { name, attributes, .. } => self.start_element(&name, &attributes),
            Token::EndElement { .. } => self.end_element(),
            Token::Characters(text) => {
                self.characters(&text);
                Ok(())
            }
            Token::EndDocument => self.end_document(),
        }
    }

    fn start_element(&mut self, name: &str, attrs: &Attributes) -> PersistResult<()> {
        if self.must_finalize {
            return Err(PersistError::MalformedDocument(format!(
                "element <{}> after the root element",
                name
            )));
        }

        match self.frames.last() {
            None => self.start_root(name, attrs),
            Some(Frame::Root(_) | Frame::Group { .. }) => {
                self.start_item(name, attrs);
                Ok(())
            }
            Some(Frame::Text { .. }) if name == "itemTextContent" => {
                self.frames.push(Frame::TextContent);
                Ok(())
            }
            Some(Frame::TextContent) => {
                // Markup without CDATA: keep its character data only.
                let parent = self.frames.len().checked_sub(2).and_then(|i| self.frames.get(i));
                if matches!(parent, Some(Frame::Text { .. })) {
                    self.issue(LoadIssue::FlattenedMarkup {
                        element: name.to_string(),
                    });
                }
                self.frames.push(Frame::TextContent);
                Ok(())
            }
            Some(Frame::Widget(_)) if name == "preference" || name == "datastoreEntry" => {
                self.widget_entry(name, attrs);
                self.frames.push(Frame::Skip);
                Ok(())
            }
            Some(_) => {
                self.frames.push(Frame::Skip);
                Ok(())
            }
        }
    }

    fn end_element(&mut self) -> PersistResult<()> {
        let Some(top) = self.frames.len().checked_sub(1) else {
            return Err(PersistError::MalformedDocument("unbalanced end element".to_string()));
        };
        if matches!(self.frames[top], Frame::Root(_) | Frame::Group { .. }) {
            self.finalize_strokes(Some(top));
        }

        match self.frames.pop() {
            Some(Frame::Root(_)) => {
                self.finalize_strokes(None);
                self.must_finalize = true;
            }
            Some(Frame::Group {
                mut item,
                explicit_geometry,
                ..
            }) => {
                if !explicit_geometry {
                    if let Some(group) = item.as_group() {
                        item.geometry = group.bounds();
                    }
                }
                self.place(item);
            }
            Some(Frame::Widget(item)) => {
                self.place(item);
            }
            Some(Frame::Text { mut item, content } | Frame::LegacyText { mut item, content }) => {
                if let ItemKind::Text(text) = &mut item.kind {
                    text.content = content;
                }
                self.place(item);
            }
            Some(Frame::TextContent | Frame::Skip) | None => {}
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) {
        let len = self.frames.len();
        let target = match self.frames.last() {
            Some(Frame::TextContent) => self
                .frames
                .iter()
                .rposition(|frame| !matches!(frame, Frame::TextContent)),
            Some(Frame::LegacyText { .. }) => len.checked_sub(1),
            _ => None,
        };
        match target.and_then(|i| self.frames.get_mut(i)) {
            Some(Frame::Text { content, .. } | Frame::LegacyText { content, .. }) => content.push_str(text),
            _ => {}
        }
    }

    fn end_document(&mut self) -> PersistResult<()> {
        if !self.must_finalize {
            return Err(PersistError::MalformedDocument("document has no root element".to_string()));
        }
        self.strokes.clear();
        if self.config.upgrade_on_load {
            let from = self.scene.version;
            if upgrade(&mut self.scene) {
                log::info!("Upgraded page from {} to {}", from, self.scene.version);
            }
        }
        self.state = ReaderState::Finished;
        Ok(())
    }

    // Root

    fn start_root(&mut self, name: &str, attrs: &Attributes) -> PersistResult<()> {
        if name != "svg" {
            return Err(PersistError::MalformedDocument(format!(
                "unexpected root element <{}>",
                name
            )));
        }

        let declared = ub(attrs, "version").and_then(|text| {
            let parsed = FileVersion::parse(text);
            if parsed.is_none() {
                self.malformed("svg", "version", text);
                // A numeric major too large to encode is still newer than us.
                let major = text.trim().split('.').next().unwrap_or_default();
                if major.trim().parse::<u64>().is_ok() {
                    return Some(FileVersion::CURRENT);
                }
            }
            parsed
        });
        let version = declared
            .or(self.document_version)
            .unwrap_or(FileVersion::DEFAULT_LEGACY);
        if version > FileVersion::CURRENT && !dialect::is_known_version(version) {
            self.issue(LoadIssue::UnknownVersion { version });
        }
        self.dialect = Dialect::resolve(version);
        self.scene.version = version;
        log::debug!("Reading page version {} ({})", version, self.dialect.namespace());

        if let Some(text) = ub(attrs, "uuid") {
            match Uuid::parse_str(text.trim()) {
                Ok(uuid) => self.scene.uuid = uuid,
                Err(_) => self.malformed("svg", "uuid", text),
            }
        }
        if let Some(text) = attrs.get("viewBox") {
            match transform::parse_numbers(text).filter(|v| v.len() == 4) {
                Some(v) => self.scene.scene_rect = Some(Rect::new(v[0], v[1], v[0] + v[2], v[1] + v[3])),
                None => self.malformed("svg", "viewBox", text),
            }
        }
        let size_attribute = self.dialect.nominal_size_attribute();
        if let Some(text) = ub(attrs, size_attribute) {
            match parse_size(text) {
                Some(size) => self.scene.nominal_size = Some(size),
                None => self.malformed("svg", size_attribute, text),
            }
        }
        self.scene.background.dark = self.read_bool("svg", "dark-background", ub(attrs, "dark-background"), false);
        self.scene.background.crossed =
            self.read_bool("svg", "crossed-background", ub(attrs, "crossed-background"), false);
        self.scene.background.ruled = self.read_bool("svg", "ruled-background", ub(attrs, "ruled-background"), false);
        self.scene.background.grid_size = self.number("svg", "grid-size", ub(attrs, "grid-size"));

        self.frames.push(Frame::Root(Container::new(ColorPair::default(), 0.0)));
        Ok(())
    }

    // Items

    fn start_item(&mut self, name: &str, attrs: &Attributes) {
        match name {
            "g" => {
                self.start_group(attrs);
                return;
            }
            "polygon" | "polyline" | "line" => self.read_stroke_fragment(name, attrs),
            "image" => self.read_image(attrs),
            "video" | "audio" => self.read_media(name, attrs),
            "foreignObject" => {
                self.start_foreign_object(attrs);
                return;
            }
            "text" => {
                self.start_legacy_text(attrs);
                return;
            }
            "curtain" | "ruler" | "axes" | "compass" | "protractor" | "triangle" | "cache" => {
                let kind = self.read_tool(name, attrs);
                let item = self.read_item(name, attrs, kind);
                self.place(item);
            }
            other => log::debug!("Skipping unsupported element <{}>", other),
        }
        self.frames.push(Frame::Skip);
    }

    /// Shared attributes of every item element.
    fn read_item(&mut self, element: &str, attrs: &Attributes, kind: ItemKind) -> Item {
        let id = self.read_id(element, attrs);
        let mut item = Item::with_id(id, kind);

        let x = self.number(element, "x", attrs.get("x")).unwrap_or(0.0);
        let y = self.number(element, "y", attrs.get("y")).unwrap_or(0.0);
        let width = self.number(element, "width", attrs.get("width")).unwrap_or(0.0);
        let height = self.number(element, "height", attrs.get("height")).unwrap_or(0.0);
        item.geometry = Rect::new(x, y, x + width, y + height);

        if let Some(text) = attrs.get("transform") {
            item.transform = match transform::decode(text) {
                Ok(transform) => transform,
                Err(_) => {
                    self.issue(LoadIssue::MalformedTransform {
                        element: element.to_string(),
                        value: text.to_string(),
                    });
                    Affine::IDENTITY
                }
            };
        }

        item.z_value = self.read_z(element, attrs);
        let lock_attribute = self.dialect.lock_attribute();
        item.locked = self.read_bool(element, lock_attribute, ub(attrs, lock_attribute), false);
        item.visible = attrs.get("visibility") != Some("hidden");
        item.source_url = ub(attrs, "source").map(str::to_string);
        item.colors = ColorPair {
            on_dark: self.color(element, "fill-on-dark-background", ub(attrs, "fill-on-dark-background")),
            on_light: self.color(element, "fill-on-light-background", ub(attrs, "fill-on-light-background")),
        };
        item
    }

    fn read_id(&mut self, element: &str, attrs: &Attributes) -> ItemId {
        let id = match ub(attrs, "uuid") {
            Some(text) => Uuid::parse_str(text.trim()).unwrap_or_else(|_| {
                self.malformed(element, "uuid", text);
                Uuid::new_v4()
            }),
            None => Uuid::new_v4(),
        };
        if self.seen_ids.insert(id) {
            return id;
        }
        self.issue(LoadIssue::DuplicateItem { id });
        let fresh = Uuid::new_v4();
        self.seen_ids.insert(fresh);
        fresh
    }

    fn read_z(&mut self, element: &str, attrs: &Attributes) -> f64 {
        let explicit = self.number(element, "z-value", ub(attrs, "z-value"));
        let frame = self.container_index();
        let Some(container) = self.container_mut(frame) else {
            return explicit.unwrap_or(0.0);
        };
        let z = match explicit {
            Some(z) => z.clamp(Scene::Z_MIN, Scene::Z_MAX),
            None => container.default_z(),
        };
        container.record_z(z);
        z
    }

    fn start_group(&mut self, attrs: &Attributes) {
        let mut item = self.read_item("g", attrs, ItemKind::Group(Group::default()));
        let parent_colors = self.container_colors();
        let mut colors = std::mem::take(&mut item.colors).or(parent_colors);
        if colors.is_empty() {
            colors = self.dialect.default_group_colors();
        }
        if let Some(group) = item.as_group_mut() {
            group.info.colors = colors;
        }
        let explicit_geometry = attrs.get("width").is_some() && attrs.get("height").is_some();
        let container = Container::new(colors, item.z_value);
        self.frames.push(Frame::Group {
            item,
            container,
            explicit_geometry,
        });
    }

    fn read_stroke_fragment(&mut self, element: &str, attrs: &Attributes) {
        let segment = self.read_segment(element, attrs);
        let key = ub(attrs, "parent").map(str::to_string);

        let frame = self.container_index();
        let open = key.as_ref().and_then(|key| self.strokes.get(&(frame, key.clone()))).copied();
        if let Some(slot) = open {
            if let Some(stroke) = self.stroke_at(slot) {
                stroke.push_segment(segment);
                return;
            }
        }

        let mut item = self.read_item(element, attrs, ItemKind::Stroke(StrokesGroup::new(String::new())));
        let key = key.unwrap_or_else(|| item.id().braced().to_string());
        if let Some(stroke) = item.as_stroke_mut() {
            stroke.key = key.clone();
            stroke.push_segment(segment);
        }
        if let Some((frame, index)) = self.place(item) {
            self.strokes.insert((frame, key), StrokeSlot { frame, index });
        }
    }

    fn read_segment(&mut self, element: &str, attrs: &Attributes) -> StrokeSegment {
        let (shape, points) = match element {
            "polygon" => (SegmentShape::Polygon, self.points(element, attrs)),
            "polyline" => (SegmentShape::Polyline, self.points(element, attrs)),
            _ => {
                let mut coord = |name: &str| self.number(element, name, attrs.get(name)).unwrap_or(0.0);
                let start = Point::new(coord("x1"), coord("y1"));
                let end = Point::new(coord("x2"), coord("y2"));
                (SegmentShape::Line, vec![start, end])
            }
        };

        let (color_attribute, opacity_attribute) = match shape {
            SegmentShape::Polygon => ("fill", "fill-opacity"),
            _ => ("stroke", "stroke-opacity"),
        };
        let mut color = self
            .color(element, color_attribute, attrs.get(color_attribute))
            .unwrap_or_else(ItemColor::black);
        if let Some(opacity) = self.number(element, opacity_attribute, attrs.get(opacity_attribute)) {
            color = color.with_alpha_f(opacity);
        }

        let mut segment = StrokeSegment::new(shape, points, color);
        if shape != SegmentShape::Polygon {
            if let Some(width) = self.number(element, "stroke-width", attrs.get("stroke-width")) {
                segment.width = width;
            }
        }
        if let Some(text) = ub(attrs, "pressures") {
            match transform::parse_numbers(text) {
                Some(pressures) => segment.pressures = pressures,
                None => self.malformed(element, "pressures", text),
            }
        }
        segment
    }

    /// `fill` with `fill-opacity` applied.
    fn fill(&mut self, element: &str, attrs: &Attributes) -> Option<ItemColor> {
        let color = self.color(element, "fill", attrs.get("fill"))?;
        Some(match self.number(element, "fill-opacity", attrs.get("fill-opacity")) {
            Some(opacity) => color.with_alpha_f(opacity),
            None => color,
        })
    }

        fn points(&mut self, element: &str, attrs: &Attributes) -> Vec<Point> {
        let Some(text) = attrs.get("points") else {
            return Vec::new();
        };
        transform::decode_points(text).unwrap_or_else(|| {
            self.malformed(element, "points", text);
            Vec::new()
        })
    }

    fn read_image(&mut self, attrs: &Attributes) {
        let href = href(attrs);
        let is_vector = href.is_some_and(|link| !link.starts_with("data:") && link_extension(link).as_deref() == Some("svg"));
        let resource = self.resolve_resource("image", href);
        let kind = if is_vector {
            ItemKind::VectorImage(VectorImageItem { resource })
        } else {
            let background = self.read_bool("image", "background", ub(attrs, "background"), false);
            ItemKind::Pixmap(PixmapItem { resource, background })
        };

        let item = self.read_item("image", attrs, kind);
        let id = item.id();
        let background = matches!(&item.kind, ItemKind::Pixmap(pixmap) if pixmap.background);
        if self.place(item).is_some() && background {
            self.scene.background_object = Some(id);
        }
    }

    fn read_media(&mut self, element: &str, attrs: &Attributes) {
        let resource = self.resolve_resource(element, href(attrs));
        let muted = self.read_bool(element, "muted", ub(attrs, "muted"), false);
        let media = MediaItem { resource, muted };
        let kind = if element == "video" {
            ItemKind::Video(media)
        } else {
            ItemKind::Audio(media)
        };
        let item = self.read_item(element, attrs, kind);
        self.place(item);
    }

    fn start_foreign_object(&mut self, attrs: &Attributes) {
        const ELEMENT: &str = "foreignObject";
        let href = href(attrs);
        let src = ub(attrs, "src");

        let object_type = ub(attrs, "type").or_else(|| {
            if href.and_then(link_extension).as_deref() == Some("pdf") {
                Some("pdf")
            } else {
                match src.and_then(link_extension).as_deref() {
                    Some("wgt") => Some("web-widget"),
                    Some("wdgt") => Some("native-widget"),
                    _ => None,
                }
            }
        });

        match object_type {
            Some("pdf") => {
                let page = match href.and_then(|link| link.split_once('#')) {
                    Some((_, fragment)) => fragment.trim().parse::<u32>().unwrap_or_else(|_| {
                        self.malformed(ELEMENT, "href", fragment);
                        1
                    }),
                    None => 1,
                };
                let resource = self.resolve_resource(ELEMENT, href);
                let item = self.read_item(ELEMENT, attrs, ItemKind::PdfPage(PdfPageItem { resource, page }));
                self.place(item);
                self.frames.push(Frame::Skip);
            }
            Some(kind @ ("web-widget" | "native-widget")) => {
                let widget = WidgetItem {
                    resource: self.resolve_resource(ELEMENT, src),
                    ..WidgetItem::default()
                };
                let kind = if kind == "web-widget" {
                    ItemKind::WebWidget(widget)
                } else {
                    ItemKind::NativeWidget(widget)
                };
                let item = self.read_item(ELEMENT, attrs, kind);
                self.frames.push(Frame::Widget(item));
            }
            Some("text") => {
                let mut font = FontSpec::default();
                if let Some(family) = attrs.get("font-family") {
                    font.family = family.to_string();
                }
                if let Some(style) = attrs.get("style") {
                    self.apply_style(ELEMENT, style, &mut font);
                }
                let text = TextItem {
                    content: String::new(),
                    font,
                    color: self.fill(ELEMENT, attrs),
                    origin: TextOrigin::TopLeft,
                };
                let item = self.read_item(ELEMENT, attrs, ItemKind::Text(text));
                self.frames.push(Frame::Text {
                    item,
                    content: String::new(),
                });
            }
            other => {
                log::debug!("Skipping foreignObject of type {:?}", other);
                self.frames.push(Frame::Skip);
            }
        }
    }

    fn apply_style(&mut self, element: &str, style: &str, font: &mut FontSpec) {
        for declaration in style.split(';').map(str::trim).filter(|d| !d.is_empty()) {
            if let Some(size) = declaration.strip_prefix(FONT_SIZE_PREFIX) {
                let size = size.trim();
                match size.strip_suffix(PIXEL_UNIT).unwrap_or(size).trim().parse::<f64>() {
                    Ok(px) if px.is_finite() && px > 0.0 => font.size_px = px,
                    _ => self.malformed(element, "font-size", size),
                }
            } else if let Some(weight) = declaration.strip_prefix(FONT_WEIGHT_PREFIX) {
                match FontWeight::from_css(weight) {
                    Some(weight) => font.weight = weight,
                    None => self.malformed(element, "font-weight", weight),
                }
            } else if let Some(style) = declaration.strip_prefix(FONT_STYLE_PREFIX) {
                font.italic = matches!(style.trim(), "italic" | "oblique");
            }
        }
    }

    fn start_legacy_text(&mut self, attrs: &Attributes) {
        const ELEMENT: &str = "text";
        let mut font = FontSpec::default();
        if let Some(family) = attrs.get("font-family") {
            font.family = family.to_string();
        }
        if let Some(size) = attrs.get("font-size") {
            match size.trim().strip_suffix(PIXEL_UNIT).unwrap_or(size.trim()).parse::<f64>() {
                Ok(px) if px.is_finite() && px > 0.0 => font.size_px = px,
                _ => self.malformed(ELEMENT, "font-size", size),
            }
        }
        if let Some(weight) = attrs.get("font-weight") {
            match FontWeight::from_css(weight) {
                Some(weight) => font.weight = weight,
                None => self.malformed(ELEMENT, "font-weight", weight),
            }
        }
        font.italic = matches!(attrs.get("font-style"), Some("italic" | "oblique"));

        let text = TextItem {
            content: String::new(),
            font,
            color: self.fill(ELEMENT, attrs),
            origin: TextOrigin::Baseline,
        };
        let item = self.read_item(ELEMENT, attrs, ItemKind::Text(text));
        self.frames.push(Frame::LegacyText {
            item,
            content: String::new(),
        });
    }

    fn widget_entry(&mut self, name: &str, attrs: &Attributes) {
        let Some(key) = attrs.get("key") else {
            self.malformed(name, "key", "");
            return;
        };
        let value = attrs.get("value").unwrap_or_default();
        if let Some(Frame::Widget(item)) = self.frames.last_mut() {
            if let ItemKind::NativeWidget(widget) | ItemKind::WebWidget(widget) = &mut item.kind {
                if name == "preference" {
                    widget.set_preference(key, value);
                } else {
                    widget.set_datastore_entry(key, value);
                }
            }
        }
    }

    fn read_tool(&mut self, name: &str, attrs: &Attributes) -> ItemKind {
        match name {
            "curtain" => ItemKind::Curtain,
            "ruler" => ItemKind::Ruler,
            "compass" => ItemKind::Compass,
            "axes" => ItemKind::Axes(AxesItem {
                show_numbers: self.read_bool(name, "numbers", ub(attrs, "numbers"), true),
            }),
            "protractor" => ItemKind::Protractor(ProtractorItem {
                start_angle: self.number(name, "angle", ub(attrs, "angle")).unwrap_or(0.0),
                marker_angle: self.number(name, "marker-angle", ub(attrs, "marker-angle")).unwrap_or(0.0),
            }),
            "triangle" => {
                let orientation = match ub(attrs, "orientation") {
                    Some(text) => TriangleOrientation::from_name(text.trim()).unwrap_or_else(|| {
                        self.malformed(name, "orientation", text);
                        TriangleOrientation::default()
                    }),
                    None => TriangleOrientation::default(),
                };
                ItemKind::Triangle(TriangleItem { orientation })
            }
            _ => {
                let mut cache = CacheItem::default();
                if let Some(color) = self.color(name, "fill", attrs.get("fill")) {
                    cache.color = color;
                }
                if let Some(opacity) = self.number(name, "fill-opacity", attrs.get("fill-opacity")) {
                    cache.color = cache.color.with_alpha_f(opacity);
                }
                match ub(attrs, "shape") {
                    Some("square") => cache.shape = CacheShape::Square,
                    Some("circle") | None => cache.shape = CacheShape::Circle,
                    Some(other) => self.malformed(name, "shape", other),
                }
                if let Some(width) = self.number(name, "shape-width", ub(attrs, "shape-width")) {
                    cache.shape_width = width;
                }
                ItemKind::Cache(cache)
            }
        }
    }

    /// Resolve a resource link against the document base path.
    fn resolve_resource(&mut self, element: &str, link: Option<&str>) -> Option<ResourceRef> {
        let Some(link) = link.map(str::trim).filter(|link| !link.is_empty()) else {
            self.issue(LoadIssue::MissingResource {
                element: element.to_string(),
            });
            return None;
        };

        if link.starts_with("data:") {
            let resource = ResourceRef::from_data_uri(link);
            if resource.is_none() {
                self.malformed(element, "href", link);
            }
            return resource;
        }

        let link = link.strip_prefix("file://").unwrap_or(link);
        let link = link.split('#').next().unwrap_or(link);
        let relative = Path::new(link);
        let path = if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.base_path.join(relative)
        };
        let missing = self.config.verify_resources && !path.exists();
        if missing {
            self.issue(LoadIssue::UnresolvedResource { path: path.clone() });
        }
        Some(ResourceRef::File { path, missing })
    }

    // Containers and strokes

    fn container_index(&self) -> usize {
        self.frames
            .iter()
            .rposition(|frame| matches!(frame, Frame::Root(_) | Frame::Group { .. }))
            .unwrap_or(0)
    }

    fn container_mut(&mut self, frame: usize) -> Option<&mut Container> {
        match self.frames.get_mut(frame)? {
            Frame::Root(container) | Frame::Group { container, .. } => Some(container),
            _ => None,
        }
    }

    fn container_colors(&self) -> ColorPair {
        match self.frames.get(self.container_index()) {
            Some(Frame::Root(container) | Frame::Group { container, .. }) => container.colors,
            _ => ColorPair::default(),
        }
    }

    fn children_mut(&mut self, frame: usize) -> Option<&mut Vec<Item>> {
        match self.frames.get_mut(frame)? {
            Frame::Root(_) => Some(self.scene.items_mut()),
            Frame::Group { item, .. } => item.as_group_mut().map(Group::children_mut),
            _ => None,
        }
    }

    /// Append an item to the innermost container, filling in default colors.
    fn place(&mut self, mut item: Item) -> Option<(usize, usize)> {
        if !item.is_group() {
            item.colors = item.colors.or(self.container_colors());
        }
        let frame = self.container_index();
        let children = self.children_mut(frame)?;
        children.push(item);
        Some((frame, children.len() - 1))
    }

    fn stroke_at(&mut self, slot: StrokeSlot) -> Option<&mut StrokesGroup> {
        self.children_mut(slot.frame)?
            .get_mut(slot.index)?
            .as_stroke_mut()
    }

    /// Close the strokes placed in `frame` (all strokes when `None`).
    fn finalize_strokes(&mut self, frame: Option<usize>) {
        let keys: Vec<(usize, String)> = self
            .strokes
            .keys()
            .filter(|(slot_frame, _)| frame.is_none_or(|f| *slot_frame == f))
            .cloned()
            .collect();

        for key in keys {
            let Some(slot) = self.strokes.remove(&key) else {
                continue;
            };
            let item = self
                .children_mut(slot.frame)
                .and_then(|children| children.get_mut(slot.index));
            if let Some(item) = item {
                if let Some(bounds) = item.as_stroke().map(StrokesGroup::bounds) {
                    item.geometry = bounds;
                }
            }
        }
    }

    // Attribute helpers

    fn issue(&mut self, issue: LoadIssue) {
        log::warn!("{}", issue);
        self.issues.push(issue);
    }

    fn malformed(&mut self, element: &str, attribute: &str, value: &str) {
        self.issue(LoadIssue::MalformedAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
            value: value.chars().take(64).collect(),
        });
    }

    fn number(&mut self, element: &str, attribute: &str, value: Option<&str>) -> Option<f64> {
        let text = value?;
        match text.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => Some(number),
            _ => {
                self.malformed(element, attribute, text);
                None
            }
        }
    }

    fn read_bool(&mut self, element: &str, attribute: &str, value: Option<&str>, default: bool) -> bool {
        match value.map(str::trim) {
            None => default,
            Some(XML_TRUE) => true,
            Some(XML_FALSE) => false,
            Some(other) => {
                self.malformed(element, attribute, other);
                default
            }
        }
    }

    fn color(&mut self, element: &str, attribute: &str, value: Option<&str>) -> Option<ItemColor> {
        let text = value?;
        let color = ItemColor::parse(text);
        if color.is_none() {
            self.malformed(element, attribute, text);
        }
        color
    }
}

/// Board extension attribute, in either extension namespace.
fn ub<'a>(attrs: &'a Attributes, name: &str) -> Option<&'a str> {
    attrs.get_any(&UB_NAMESPACES, name)
}

fn href(attrs: &Attributes) -> Option<&str> {
    attrs.get_ns(XLINK_NAMESPACE, "href").or_else(|| attrs.get("href"))
}

/// Lower-case extension of a link, ignoring any `#fragment`.
fn link_extension(link: &str) -> Option<String> {
    let path = link.split('#').next().unwrap_or(link);
    Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Parse `WxH`.
fn parse_size(text: &str) -> Option<Size> {
    let (width, height) = text.trim().split_once('x')?;
    let width: f64 = width.trim().parse().ok()?;
    let height: f64 = height.trim().parse().ok()?;
    (width.is_finite() && height.is_finite()).then(|| Size::new(width, height))
}
