//! The canonical menu document.
//!
//! A [`MenuDocument`] is built exactly once per extraction by
//! [`crate::pipeline::normalize`] and afterwards only ever replaced by a new
//! snapshot (see [`crate::editor`]). Sections and items sit behind [`Arc`] so
//! a snapshot produced by an edit shares every sub-tree the edit did not
//! touch with the snapshot it came from.
//!
//! The types derive `Serialize` only. The one way *into* a document is the
//! validating decoder in [`crate::pipeline::normalize`], so untrusted JSON
//! never reaches these structs without being checked.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Synthetic identifier of a section, stable across edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SectionId(pub u32);

/// Synthetic identifier of an item, stable across edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ItemId(pub u32);

/// Root of an editable menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuDocument {
    /// Menu heading, e.g. "FOOD MENU".
    #[serde(rename = "name")]
    pub title: String,
    #[serde(rename = "restaurant")]
    pub restaurant_name: String,
    /// Sections in display order.
    pub sections: Vec<Arc<MenuSection>>,
    pub contact: Contact,
}

/// A named group of items ("MAIN COURSE", "BEVERAGES", …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuSection {
    #[serde(skip)]
    pub id: SectionId,
    pub name: String,
    pub items: Vec<Arc<MenuItem>>,
}

/// A single dish or drink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    #[serde(skip)]
    pub id: ItemId,
    pub name: String,
    /// Display string, rendered verbatim ("$10", "12,50 €", "MP").
    pub price: String,
    /// URI or `data:` URI of the dish picture.
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub phone: String,
    pub address: String,
}

impl MenuDocument {
    pub fn section(&self, index: usize) -> Option<&MenuSection> {
        self.sections.get(index).map(Arc::as_ref)
    }

    pub fn item(&self, section_index: usize, item_index: usize) -> Option<&MenuItem> {
        self.section(section_index)?
            .items
            .get(item_index)
            .map(Arc::as_ref)
    }

    /// Total number of items across all sections.
    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    /// Current position of the section with the given id.
    pub fn locate_section(&self, id: SectionId) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    /// Current `(section, item)` position of the item with the given id.
    pub fn locate_item(&self, id: ItemId) -> Option<(usize, usize)> {
        self.sections.iter().enumerate().find_map(|(si, section)| {
            section
                .items
                .iter()
                .position(|item| item.id == id)
                .map(|ii| (si, ii))
        })
    }

    /// Serialise to the wire JSON shape.
    pub fn to_json_pretty(&self) -> String {
        // Serialising plain strings and vectors cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Top-level scalar fields addressable by [`crate::editor::Edit::ReplaceField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentField {
    Title,
    RestaurantName,
    ContactPhone,
    ContactAddress,
}

/// Per-item fields addressable by [`crate::editor::Edit::UpdateItemField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Name,
    Price,
    Image,
}

impl DocumentField {
    pub(crate) fn get(self, doc: &MenuDocument) -> &str {
        match self {
            DocumentField::Title => &doc.title,
            DocumentField::RestaurantName => &doc.restaurant_name,
            DocumentField::ContactPhone => &doc.contact.phone,
            DocumentField::ContactAddress => &doc.contact.address,
        }
    }

    pub(crate) fn get_mut(self, doc: &mut MenuDocument) -> &mut String {
        match self {
            DocumentField::Title => &mut doc.title,
            DocumentField::RestaurantName => &mut doc.restaurant_name,
            DocumentField::ContactPhone => &mut doc.contact.phone,
            DocumentField::ContactAddress => &mut doc.contact.address,
        }
    }
}

impl ItemField {
    pub(crate) fn get(self, item: &MenuItem) -> &str {
        match self {
            ItemField::Name => &item.name,
            ItemField::Price => &item.price,
            ItemField::Image => &item.image,
        }
    }

    pub(crate) fn get_mut(self, item: &mut MenuItem) -> &mut String {
        match self {
            ItemField::Name => &mut item.name,
            ItemField::Price => &mut item.price,
            ItemField::Image => &mut item.image,
        }
    }
}

impl FromStr for DocumentField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "title" | "name" => Ok(DocumentField::Title),
            "restaurant" | "restaurant_name" => Ok(DocumentField::RestaurantName),
            "phone" | "contact.phone" => Ok(DocumentField::ContactPhone),
            "address" | "contact.address" => Ok(DocumentField::ContactAddress),
            other => Err(format!("unknown document field '{other}'")),
        }
    }
}

impl FromStr for ItemField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(ItemField::Name),
            "price" => Ok(ItemField::Price),
            "image" => Ok(ItemField::Image),
            other => Err(format!("unknown item field '{other}'")),
        }
    }
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemField::Name => "name",
            ItemField::Price => "price",
            ItemField::Image => "image",
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn item(id: u32, name: &str, price: &str) -> Arc<MenuItem> {
        Arc::new(MenuItem {
            id: ItemId(id),
            name: name.into(),
            price: price.into(),
            image: crate::schema::PLACEHOLDER_IMAGE.into(),
        })
    }

    /// Two sections, three items; ids in document order.
    pub fn lunch_menu() -> MenuDocument {
        MenuDocument {
            title: "Lunch".into(),
            restaurant_name: "Cafe X".into(),
            sections: vec![
                Arc::new(MenuSection {
                    id: SectionId(0),
                    name: "Mains".into(),
                    items: vec![item(0, "Burger", "$10"), item(1, "Hot dog", "$7")],
                }),
                Arc::new(MenuSection {
                    id: SectionId(1),
                    name: "Drinks".into(),
                    items: vec![item(2, "Coffee", "$3")],
                }),
            ],
            contact: Contact {
                phone: "555-0100".into(),
                address: "1 Main St.".into(),
            },
        }
    }
}
