//! Migration of scenes read from older file versions.

use crate::items::{Item, ItemKind, TextOrigin};
use crate::scene::Scene;
use crate::version::FileVersion;
use kurbo::Size;

/// Page size assumed for pages written before nominal sizes were stored.
pub const LEGACY_PAGE_SIZE: Size = Size::new(1024.0, 768.0);

/// First version that stores the page nominal size.
const NOMINAL_SIZE_VERSION: FileVersion = FileVersion::new(4, 2, 0);

/// Bring a scene up to the current version in place.
///
/// Returns `false` when the scene is already current. Running it twice is a
/// no-op the second time.
pub fn upgrade(scene: &mut Scene) -> bool {
    if scene.version >= FileVersion::CURRENT {
        return false;
    }
    let from = scene.version;

    let mut moved = 0;
    scene.for_each_item_mut(&mut |item| {
        if let ItemKind::Text(text) = &mut item.kind {
            if text.origin == TextOrigin::Baseline {
                item.geometry = text.top_left_geometry(item.geometry);
                text.origin = TextOrigin::TopLeft;
                moved += 1;
            }
        }
    });
    if moved > 0 {
        scene.items_mut().iter_mut().for_each(refresh_group_bounds);
    }

    if from < NOMINAL_SIZE_VERSION && scene.nominal_size.is_none() {
        scene.nominal_size = Some(LEGACY_PAGE_SIZE);
    }

    scene.version = FileVersion::CURRENT;
    log::debug!("Upgraded scene from {} ({} baseline text item(s) moved)", from, moved);
    true
}

/// Groups read without explicit geometry take their children's bounds.
fn refresh_group_bounds(item: &mut Item) {
    if let ItemKind::Group(group) = &mut item.kind {
        group.children_mut().iter_mut().for_each(refresh_group_bounds);
        item.geometry = group.bounds();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::TextItem;
    use kurbo::Rect;

    fn legacy_scene() -> (Scene, crate::items::ItemId) {
        let mut scene = Scene::new();
        scene.version = FileVersion::DEFAULT_LEGACY;
        let mut text = TextItem::new("legacy");
        text.origin = TextOrigin::Baseline;
        let item = Item::new(ItemKind::Text(text)).with_geometry(Rect::new(0.0, 50.0, 100.0, 80.0));
        let id = item.id();
        scene.add_item(item);
        (scene, id)
    }

    #[test]
    fn test_upgrade_moves_baseline_text() {
        let (mut scene, id) = legacy_scene();
        assert!(upgrade(&mut scene));
        assert_eq!(scene.version, FileVersion::CURRENT);
        assert_eq!(scene.nominal_size, Some(LEGACY_PAGE_SIZE));

        let item = scene.find_item(id).unwrap();
        assert_eq!(item.as_text().unwrap().origin, TextOrigin::TopLeft);
        assert!((item.geometry.y0 - 34.0).abs() < 1e-9);
    }

    #[test]
    fn test_upgrade_is_idempotent() {
        let (mut scene, id) = legacy_scene();
        upgrade(&mut scene);
        let once = scene.find_item(id).unwrap().geometry;
        assert!(!upgrade(&mut scene));
        assert_eq!(scene.find_item(id).unwrap().geometry, once);
    }

    #[test]
    fn test_keeps_declared_nominal_size() {
        let mut scene = Scene::new();
        scene.version = FileVersion::new(4, 1, 1);
        scene.nominal_size = Some(Size::new(800.0, 600.0));
        assert!(upgrade(&mut scene));
        assert_eq!(scene.nominal_size, Some(Size::new(800.0, 600.0)));
    }

    #[test]
    fn test_current_scene_untouched() {
        let mut scene = Scene::new();
        assert!(!upgrade(&mut scene));
        assert_eq!(scene.nominal_size, None);
    }
}
