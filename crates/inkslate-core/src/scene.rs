//! Scene: the ordered item tree of one document page.

use crate::items::{Item, ItemId};
use crate::version::FileVersion;
use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Page background settings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageBackground {
    pub dark: bool,
    pub crossed: bool,
    pub ruled: bool,
    /// Grid spacing for crossed/ruled backgrounds, in pixels.
    pub grid_size: Option<f64>,
}

/// One document page.
///
/// Owns every item; an item is either a top-level entry or a descendant of
/// exactly one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Per-page unique identifier.
    pub uuid: Uuid,
    /// Dialect the scene was built under.
    pub version: FileVersion,
    /// Scene rectangle (the page view box).
    pub scene_rect: Option<Rect>,
    pub nominal_size: Option<Size>,
    pub background: PageBackground,
    /// Image used as the page background, if any.
    pub background_object: Option<ItemId>,
    items: Vec<Item>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Distance between default z values of consecutive items.
    pub const Z_STEP: f64 = 1.0;
    /// Lowest z value in the working scale.
    pub const Z_MIN: f64 = -1_000_000.0;
    /// Highest z value in the working scale.
    pub const Z_MAX: f64 = 1_000_000.0;

    /// Create a new empty scene in the current dialect.
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            version: FileVersion::CURRENT,
            scene_rect: None,
            nominal_size: None,
            background: PageBackground::default(),
            background_object: None,
            items: Vec::new(),
        }
    }

    pub fn is_dark_background(&self) -> bool {
        self.background.dark
    }

    /// Add a top-level item.
    ///
    /// Returns `false` and leaves the scene untouched when an item with the
    /// same id is already present.
    pub fn add_item(&mut self, item: Item) -> bool {
        let mut duplicate = false;
        item.walk(&mut |candidate| duplicate |= self.contains(candidate.id()));
        if duplicate {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Remove a top-level item or a descendant of a group.
    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        if let Some(pos) = self.items.iter().position(|item| item.id() == id) {
            if self.background_object == Some(id) {
                self.background_object = None;
            }
            return Some(self.items.remove(pos));
        }
        for item in &mut self.items {
            if let Some(group) = item.as_group_mut() {
                if let Some(pos) = group.children.iter().position(|c| c.id() == id) {
                    return Some(group.children.remove(pos));
                }
            }
        }
        None
    }

    /// Top-level items, in stacking order as stored.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<Item> {
        &mut self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.background_object = None;
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items, descendants of groups included.
    pub fn item_count(&self) -> usize {
        let mut count = 0;
        self.for_each_item(&mut |_| count += 1);
        count
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.find_item(id).is_some()
    }

    /// Find an item anywhere in the tree.
    pub fn find_item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find_map(|item| item.find(id))
    }

    pub fn find_item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        for item in &mut self.items {
            if item.id() == id {
                return Some(item);
            }
            if let Some(group) = item.as_group_mut() {
                if let Some(found) = group.find_item_mut(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Visit every item depth first.
    pub fn for_each_item<'a>(&'a self, f: &mut dyn FnMut(&'a Item)) {
        for item in &self.items {
            item.walk(f);
        }
    }

    pub fn for_each_item_mut(&mut self, f: &mut dyn FnMut(&mut Item)) {
        for item in &mut self.items {
            item.walk_mut(f);
        }
    }

    /// Default z for an item placed on top of the current top-level items.
    pub fn next_z(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.z_value)
            .fold(None, |acc: Option<f64>, z| Some(acc.map_or(z, |a| a.max(z))))
            .map_or(0.0, |z| z + Self::Z_STEP)
    }

    /// Bounding box of all items.
    pub fn bounds(&self) -> Option<Rect> {
        let mut iter = self.items.iter().map(Item::bounds);
        let first = iter.next()?;
        Some(iter.fold(first, |acc, b| acc.union(b)))
    }
}
