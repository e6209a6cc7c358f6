//! Load/save round trips through a page store.

use super::*;
use crate::items::{
    AxesItem, CacheItem, CacheShape, ColorPair, FontSpec, FontWeight, Group, GroupInfo, ImageFormat, Item, ItemColor,
    ItemKind, MediaItem, PdfPageItem, PixmapItem, ProtractorItem, ResourceRef, SegmentShape, StrokeSegment,
    StrokesGroup, TextItem, TextOrigin, TriangleItem, TriangleOrientation, VectorImageItem, WidgetItem,
};
use crate::storage::{DocumentDirectory, MemoryDocument, PageStore};
use kurbo::{Affine, Point, Rect, Size};
use tempfile::tempdir;

const LEGACY_PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:ub="http://www.mnemis.com/uniboard" xmlns:xlink="http://www.w3.org/1999/xlink" ub:uuid="{0b8f3a7e-4f0a-4c55-9a51-3d2f8a6f7c10}">
  <g ub:uuid="{5a8e1c32-2b6e-4d0a-8c2e-0f9a6b1d2e33}">
    <text x="10" y="50" width="100" height="30" font-size="20" ub:frozen="true">Hello</text>
    <image xlink:href="images/photo.png" x="0" y="0" width="64" height="48"/>
  </g>
</svg>"#;

fn lenient() -> PersistConfig {
    PersistConfig {
        verify_resources: false,
        ..PersistConfig::default()
    }
}

fn round_trip(scene: &Scene) -> Scene {
    let bytes = write_scene(scene, Path::new("/doc"), &lenient()).unwrap();
    read_scene(bytes, None, Path::new("/doc"), &lenient()).unwrap()
}

#[test]
fn test_legacy_page_upgrades_and_round_trips() {
    let store = MemoryDocument::new().with_base_path("/doc");
    store.push_page(LEGACY_PAGE).unwrap();
    let adaptor = SceneAdaptor::with_config(store, lenient());

    let scene = adaptor.load_scene(0).unwrap();
    assert_eq!(scene.version, FileVersion::CURRENT);
    assert_eq!(scene.nominal_size, Some(LEGACY_PAGE_SIZE));

    let group = scene.items()[0].as_group().unwrap();
    let legacy_colors = ColorPair::new(ItemColor::white(), ItemColor::black());
    assert_eq!(group.info.colors, legacy_colors);

    let text = &group.children()[0];
    assert!(text.locked);
    assert_eq!(text.colors, legacy_colors);
    assert_eq!(text.as_text().unwrap().origin, TextOrigin::TopLeft);
    assert!((text.geometry.y0 - 34.0).abs() < 1e-9);

    let image = &group.children()[1];
    assert_eq!(image.colors, legacy_colors);
    assert_eq!(
        image.kind.resource().and_then(ResourceRef::path),
        Some(Path::new("/doc/images/photo.png"))
    );

    adaptor.persist_scene(0, &scene).unwrap();
    let markup = adaptor.load_scene_as_text(0).unwrap();
    assert!(markup.contains(r#"ub:version="4.8.0""#));
    assert!(markup.contains(r#"xlink:href="images/photo.png""#));
    assert!(!markup.contains(dialect::FORMER_UB_NAMESPACE));

    let reloaded = adaptor.load_scene(0).unwrap();
    assert_eq!(reloaded, scene);
}

#[test]
fn test_locked_item_round_trip() {
    let mut scene = Scene::new();
    let mut ruler = Item::new(ItemKind::Ruler).with_geometry(Rect::new(0.0, 0.0, 200.0, 40.0));
    ruler.locked = true;
    let id = ruler.id();
    scene.add_item(ruler);

    let bytes = write_scene(&scene, Path::new("/doc"), &lenient()).unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains(r#"ub:locked="true""#));

    let reloaded = read_scene(bytes, None, Path::new("/doc"), &lenient()).unwrap();
    assert!(reloaded.find_item(id).unwrap().locked);
}

#[test]
fn test_fifty_point_stroke_round_trip() {
    let mut stroke = StrokesGroup::new("{3c9a2f6e-7d14-4b8a-a1f2-5e6d7c8b9a01}");
    for s in 0..10 {
        let points = (0..5)
            .map(|i| Point::new(f64::from(s * 5 + i) * 2.5, f64::from(i % 2) * 3.0))
            .collect();
        let mut segment = StrokeSegment::new(SegmentShape::Polygon, points, ItemColor::new(10, 20, 30, 255));
        segment.pressures = vec![0.5; 5];
        stroke.push_segment(segment);
    }
    let item = Item::new(ItemKind::Stroke(stroke.clone()))
        .with_transform(Affine::translate((5.0, 5.0)))
        .with_z(3.0);
    let id = item.id();
    let mut scene = Scene::new();
    scene.add_item(item);

    let reloaded = round_trip(&scene);
    assert_eq!(reloaded.item_count(), 1);
    let item = reloaded.find_item(id).unwrap();
    let read = item.as_stroke().unwrap();
    assert_eq!(read.point_count(), 50);
    assert_eq!(read, &stroke);
    assert_eq!(item.geometry, stroke.bounds());
    assert_eq!(item.transform, Affine::translate((5.0, 5.0)));
    assert_eq!(item.z_value, 3.0);
}

#[test]
fn test_every_kind_round_trips() {
    let file = |path: &str| Some(ResourceRef::file(path));
    let mut widget = WidgetItem {
        resource: file("/doc/widgets/clock.wgt"),
        ..WidgetItem::default()
    };
    widget.set_preference("zone", "UTC");
    widget.set_datastore_entry("alarm", "07:00");

    let text = TextItem::new("a < b & c").with_font(FontSpec {
        family: "Helvetica".to_string(),
        size_px: 32.0,
        weight: FontWeight::Bold,
        italic: true,
    });

    let kinds = vec![
        ItemKind::Pixmap(PixmapItem {
            resource: Some(ResourceRef::embedded(ImageFormat::Png, b"\x89PNG\r\n\x1a\n")),
            background: false,
        }),
        ItemKind::VectorImage(VectorImageItem {
            resource: file("/doc/images/diagram.svg"),
        }),
        ItemKind::PdfPage(PdfPageItem {
            resource: file("/doc/objects/slides.pdf"),
            page: 7,
        }),
        ItemKind::Text(TextItem {
            color: Some(ItemColor::new(200, 0, 0, 128)),
            ..text
        }),
        ItemKind::Video(MediaItem {
            resource: file("/doc/videos/clip.mp4"),
            muted: true,
        }),
        ItemKind::Audio(MediaItem {
            resource: file("/doc/audios/note.mp3"),
            muted: false,
        }),
        ItemKind::WebWidget(widget.clone()),
        ItemKind::NativeWidget(WidgetItem {
            resource: file("/doc/widgets/calc.wdgt"),
            ..WidgetItem::default()
        }),
        ItemKind::Curtain,
        ItemKind::Ruler,
        ItemKind::Compass,
        ItemKind::Axes(AxesItem { show_numbers: false }),
        ItemKind::Protractor(ProtractorItem {
            start_angle: 15.0,
            marker_angle: 42.5,
        }),
        ItemKind::Triangle(TriangleItem {
            orientation: TriangleOrientation::TopRight,
        }),
        ItemKind::Cache(CacheItem {
            color: ItemColor::new(0, 0, 0, 255),
            shape: CacheShape::Square,
            shape_width: 80.0,
        }),
    ];

    let mut scene = Scene::new();
    scene.nominal_size = Some(Size::new(1280.0, 960.0));
    scene.scene_rect = Some(Rect::new(-640.0, -480.0, 640.0, 480.0));
    scene.background.crossed = true;
    scene.background.grid_size = Some(25.0);
    for (i, kind) in kinds.into_iter().enumerate() {
        let offset = i as f64 * 10.0;
        let mut item = Item::new(kind)
            .with_geometry(Rect::new(offset, offset, offset + 120.0, offset + 90.0))
            .with_z(i as f64);
        item.visible = i % 3 != 0;
        item.source_url = (i == 1).then(|| "https://example.org/diagram.svg".to_string());
        if i == 3 {
            item.colors = ColorPair::new(ItemColor::new(255, 255, 255, 100), ItemColor::new(0, 0, 0, 255));
        }
        scene.add_item(item);
    }

    let reloaded = round_trip(&scene);
    assert_eq!(reloaded, scene);
}

#[test]
fn test_group_round_trip_keeps_colors() {
    let colors = ColorPair::new(ItemColor::new(240, 240, 0, 255), ItemColor::new(0, 0, 128, 255));
    let mut child = Item::new(ItemKind::Compass).with_geometry(Rect::new(10.0, 10.0, 60.0, 60.0));
    child.colors = colors;
    let mut other = Item::new(ItemKind::Ruler)
        .with_geometry(Rect::new(100.0, 0.0, 300.0, 40.0))
        .with_z(1.0);
    other.colors = ColorPair {
        on_dark: Some(ItemColor::white()),
        on_light: Some(ItemColor::new(0, 0, 128, 255)),
    };
    let group = Group::new(vec![child, other]).with_info(GroupInfo { colors });
    let mut group_item = Item::new(ItemKind::Group(group));
    group_item.geometry = group_item.as_group().unwrap().bounds();

    let mut scene = Scene::new();
    scene.add_item(group_item);
    let reloaded = round_trip(&scene);
    assert_eq!(reloaded, scene);
}

#[test]
fn test_strokes_sharing_a_key_stay_separate() {
    let stroke = |x: f64| {
        let mut stroke = StrokesGroup::new("k");
        let points = vec![Point::new(x, 0.0), Point::new(x + 1.0, 1.0), Point::new(x, 1.0)];
        stroke.push_segment(StrokeSegment::new(SegmentShape::Polygon, points, ItemColor::black()));
        stroke
    };
    let first = Item::new(ItemKind::Stroke(stroke(0.0)));
    let second = Item::new(ItemKind::Stroke(stroke(10.0)))
        .with_transform(Affine::translate((3.0, 4.0)))
        .with_z(2.0);
    let ids = [first.id(), second.id()];
    let mut scene = Scene::new();
    scene.add_item(first);
    scene.add_item(second);

    let reloaded = round_trip(&scene);
    assert_eq!(reloaded.item_count(), 2);
    assert_eq!(reloaded.find_item(ids[0]).unwrap().as_stroke().unwrap().key, "k");
    let second = reloaded.find_item(ids[1]).unwrap();
    assert_eq!(second.as_stroke().unwrap().point_count(), 3);
    assert_eq!(second.transform, Affine::translate((3.0, 4.0)));
    assert_eq!(second.z_value, 2.0);
}

#[test]
fn test_malformed_transform_keeps_item() {
    let page = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:ub="http://uniboard.mnemis.com/document" ub:version="4.8.0">
  <ub:ruler x="5" y="5" width="100" height="20" transform="rotate(oops)"/>
</svg>"#;
    let mut reader = SceneReader::new(page.as_bytes().to_vec(), None, "/doc", lenient());
    while !reader.is_finished() {
        reader.step().unwrap();
    }
    assert!(matches!(reader.warnings(), [LoadIssue::MalformedTransform { .. }]));
    let scene = reader.into_scene().unwrap();
    assert_eq!(scene.items()[0].transform, Affine::IDENTITY);
    assert_eq!(scene.items()[0].geometry, Rect::new(5.0, 5.0, 105.0, 25.0));
}

#[test]
fn test_unclosed_tag_fails_load() {
    let store = MemoryDocument::new();
    store
        .push_page(r#"<svg xmlns="http://www.w3.org/2000/svg"><g>"#)
        .unwrap();
    let adaptor = SceneAdaptor::new(store);
    assert!(matches!(adaptor.load_scene(0), Err(PersistError::MalformedDocument(_))));
    assert!(matches!(
        adaptor.load_scene(3),
        Err(PersistError::Storage(StorageError::NotFound(3)))
    ));
}

#[test]
fn test_upgrade_scene_rewrites_only_old_pages() {
    let store = MemoryDocument::new()
        .with_base_path("/doc")
        .with_version(FileVersion::new(4, 1, 0));
    store.push_page(LEGACY_PAGE).unwrap();
    let adaptor = SceneAdaptor::with_config(store, lenient());

    assert!(adaptor.upgrade_scene(0).unwrap());
    assert!(adaptor.load_scene_as_text(0).unwrap().contains(r#"ub:version="4.8.0""#));
    assert!(!adaptor.upgrade_scene(0).unwrap());
}

#[test]
fn test_scene_uuid_on_directory() {
    let dir = tempdir().unwrap();
    let store = DocumentDirectory::open(dir.path()).unwrap();
    let adaptor = SceneAdaptor::new(store);

    let scene = Scene::new();
    adaptor.persist_scene(0, &scene).unwrap();
    assert!(dir.path().join("page001.svg").exists());
    assert_eq!(adaptor.scene_uuid(0).unwrap(), Some(scene.uuid));

    let fresh = uuid::Uuid::new_v4();
    adaptor.set_scene_uuid(0, fresh).unwrap();
    assert_eq!(adaptor.scene_uuid(0).unwrap(), Some(fresh));
    assert_eq!(adaptor.load_scene(0).unwrap().uuid, fresh);
}

#[test]
fn test_prepare_loading_scene_is_incremental() {
    let store = MemoryDocument::new();
    store.push_page(LEGACY_PAGE).unwrap();
    let adaptor = SceneAdaptor::with_config(store, lenient());

    let mut reader = adaptor.prepare_loading_scene(0).unwrap();
    assert_eq!(reader.state(), ReaderState::NotStarted);
    reader.step().unwrap();
    assert_eq!(reader.state(), ReaderState::Reading);
    assert!(reader.scene().is_none());
    assert!(adaptor.store().page_count() == 1);
}

struct Checkerboard;

impl Rasterizer for Checkerboard {
    fn rasterize(&self, _source: RasterSource<'_>, size: Size) -> PersistResult<RasterImage> {
        let (width, height) = (size.width.max(1.0) as u32, size.height.max(1.0) as u32);
        let rgba = (0..width * height)
            .flat_map(|i| if i % 2 == 0 { [0, 0, 0, 255] } else { [255, 255, 255, 255] })
            .collect();
        Ok(RasterImage { width, height, rgba })
    }
}

#[test]
fn test_document_conversions() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("objects")).unwrap();
    std::fs::write(dir.path().join("objects/slides.pdf"), b"%PDF-1.4").unwrap();
    let store = DocumentDirectory::open(dir.path()).unwrap();
    let adaptor = SceneAdaptor::new(store);

    let mut scene = Scene::new();
    scene.add_item(
        Item::new(ItemKind::PdfPage(PdfPageItem {
            resource: Some(ResourceRef::file(dir.path().join("objects/slides.pdf"))),
            page: 2,
        }))
        .with_geometry(Rect::new(0.0, 0.0, 8.0, 6.0)),
    );
    adaptor.persist_scene(0, &scene).unwrap();
    adaptor.persist_scene(1, &Scene::new()).unwrap();

    assert_eq!(adaptor.convert_svg_images_to_images(&Checkerboard).unwrap(), 0);
    assert_eq!(adaptor.convert_pdf_objects_to_images(&Checkerboard).unwrap(), 1);

    let converted = adaptor.load_scene(0).unwrap();
    assert!(matches!(
        &converted.items()[0].kind,
        ItemKind::Pixmap(PixmapItem { resource: Some(ResourceRef::Embedded { format: ImageFormat::Png, .. }), .. })
    ));
    assert_eq!(adaptor.convert_pdf_objects_to_images(&Checkerboard).unwrap(), 0);
}
