//! Group container for nesting items.

use super::{ColorPair, Item, ItemId};
use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// Information a group shares with its children.
///
/// The z baseline is the group item's own `z_value`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Background-dependent colors applied to children that carry none.
    pub colors: ColorPair,
}

impl GroupInfo {
    pub fn has_info(&self) -> bool {
        !self.colors.is_empty()
    }
}

/// A group of items that can be manipulated as a single unit.
/// Groups can contain other groups, enabling nested hierarchies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    /// Child items, in stacking order as read.
    pub children: Vec<Item>,
    #[serde(default)]
    pub info: GroupInfo,
}

impl Group {
    /// Create a new group from a list of items.
    pub fn new(children: Vec<Item>) -> Self {
        Self {
            children,
            info: GroupInfo::default(),
        }
    }

    pub fn with_info(mut self, info: GroupInfo) -> Self {
        self.info = info;
        self
    }

    pub fn children(&self) -> &[Item] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Item> {
        &mut self.children
    }

    /// Dissolve this group and return its children.
    pub fn ungroup(self) -> Vec<Item> {
        self.children
    }

    /// Ids of all descendants (nested groups included, the group itself excluded).
    pub fn all_item_ids(&self) -> Vec<ItemId> {
        let mut ids = Vec::new();
        for child in &self.children {
            child.walk(&mut |item| ids.push(item.id()));
        }
        ids
    }

    /// Find an item by id within this group (including nested groups).
    pub fn find_item(&self, id: ItemId) -> Option<&Item> {
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Find a mutable item by id within this group (including nested groups).
    pub fn find_item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        for child in &mut self.children {
            if child.id() == id {
                return Some(child);
            }
            if let Some(group) = child.as_group_mut() {
                if let Some(found) = group.find_item_mut(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Union of the children's bounds, in the group's local coordinates.
    pub fn bounds(&self) -> Rect {
        let mut iter = self.children.iter().map(Item::bounds);
        let Some(first) = iter.next() else {
            return Rect::ZERO;
        };
        iter.fold(first, |acc, b| acc.union(b))
    }
}
