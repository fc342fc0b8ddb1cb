//! Copy-on-write editing of a [`MenuDocument`].
//!
//! Every successful edit produces a new `Arc<MenuDocument>` snapshot. Only
//! the path from the root to the touched section or item is cloned; all
//! other sections and items are shared with the previous snapshot. An edit
//! that leaves the value unchanged returns the *same* snapshot, and a failed
//! edit leaves the current snapshot in place.
//!
//! [`MenuEditor`] is the plain owned editor. [`SharedEditor`] puts the same
//! operations behind a `tokio::sync::watch` channel so one writer can serve
//! many observing tasks.

use crate::error::MenuError;
use crate::model::{DocumentField, ItemField, MenuDocument};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// One edit, described as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Replace a top-level scalar. Any string is accepted, including `""`.
    ReplaceField { field: DocumentField, value: String },
    /// Rename a section. Blank names are rejected.
    RenameSection { section: usize, name: String },
    UpdateItemField {
        section: usize,
        item: usize,
        field: ItemField,
        value: String,
    },
    /// Replace an item's picture, usually with a `data:` URI from
    /// [`crate::pipeline::input::load_local_image`].
    ReplaceItemImage {
        section: usize,
        item: usize,
        image: String,
    },
}

/// Owned editor over a single document.
#[derive(Debug, Clone)]
pub struct MenuEditor {
    current: Arc<MenuDocument>,
}

impl MenuEditor {
    pub fn new(doc: MenuDocument) -> Self {
        Self {
            current: Arc::new(doc),
        }
    }

    pub fn from_snapshot(current: Arc<MenuDocument>) -> Self {
        Self { current }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<MenuDocument> {
        Arc::clone(&self.current)
    }

    pub fn document(&self) -> &MenuDocument {
        &self.current
    }

    pub fn replace_field(
        &mut self,
        field: DocumentField,
        value: impl Into<String>,
    ) -> Arc<MenuDocument> {
        self.current = replace_field(&self.current, field, value.into());
        self.snapshot()
    }

    pub fn rename_section(
        &mut self,
        section: usize,
        name: impl Into<String>,
    ) -> Result<Arc<MenuDocument>, MenuError> {
        self.apply(Edit::RenameSection {
            section,
            name: name.into(),
        })
    }

    pub fn update_item_field(
        &mut self,
        section: usize,
        item: usize,
        field: ItemField,
        value: impl Into<String>,
    ) -> Result<Arc<MenuDocument>, MenuError> {
        self.apply(Edit::UpdateItemField {
            section,
            item,
            field,
            value: value.into(),
        })
    }

    pub fn replace_item_image(
        &mut self,
        section: usize,
        item: usize,
        image: impl Into<String>,
    ) -> Result<Arc<MenuDocument>, MenuError> {
        self.apply(Edit::ReplaceItemImage {
            section,
            item,
            image: image.into(),
        })
    }

    /// Apply an edit, returning the resulting snapshot.
    pub fn apply(&mut self, edit: Edit) -> Result<Arc<MenuDocument>, MenuError> {
        self.current = apply_edit(&self.current, edit)?;
        Ok(self.snapshot())
    }
}

/// Editor shared across tasks.
///
/// Writes are serialised by the watch channel's lock; observers obtained
/// from [`SharedEditor::subscribe`] only ever see complete snapshots.
#[derive(Debug, Clone)]
pub struct SharedEditor {
    tx: Arc<watch::Sender<Arc<MenuDocument>>>,
}

impl SharedEditor {
    pub fn new(doc: MenuDocument) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(doc));
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Arc<MenuDocument> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<MenuDocument>> {
        self.tx.subscribe()
    }

    /// Install a whole new document (e.g. after a fresh extraction).
    pub fn replace(&self, doc: MenuDocument) -> Arc<MenuDocument> {
        let next = Arc::new(doc);
        self.tx.send_replace(Arc::clone(&next));
        next
    }

    /// Apply an edit. Observers are only notified when the snapshot changes.
    pub fn apply(&self, edit: Edit) -> Result<Arc<MenuDocument>, MenuError> {
        let mut outcome = None;
        self.tx.send_if_modified(|current| match apply_edit(current, edit) {
            Ok(next) => {
                let changed = !Arc::ptr_eq(current, &next);
                *current = Arc::clone(&next);
                outcome = Some(Ok(next));
                changed
            }
            Err(e) => {
                outcome = Some(Err(e));
                false
            }
        });
        outcome.unwrap_or_else(|| Err(MenuError::Internal("edit was not applied".into())))
    }
}

// ── Snapshot transitions ─────────────────────────────────────────────────────

fn apply_edit(current: &Arc<MenuDocument>, edit: Edit) -> Result<Arc<MenuDocument>, MenuError> {
    match edit {
        Edit::ReplaceField { field, value } => Ok(replace_field(current, field, value)),
        Edit::RenameSection { section, name } => {
            check_section(current, section)?;
            if name.trim().is_empty() {
                return Err(MenuError::InvalidEdit(
                    "section name must not be blank".into(),
                ));
            }
            if current.sections[section].name == name {
                return Ok(Arc::clone(current));
            }
            debug!("Renaming section {} to '{}'", section, name);
            let mut next = Arc::clone(current);
            Arc::make_mut(&mut Arc::make_mut(&mut next).sections[section]).name = name;
            Ok(next)
        }
        Edit::UpdateItemField {
            section,
            item,
            field,
            value,
        } => update_item(current, section, item, field, value),
        Edit::ReplaceItemImage {
            section,
            item,
            image,
        } => update_item(current, section, item, ItemField::Image, image),
    }
}

fn replace_field(
    current: &Arc<MenuDocument>,
    field: DocumentField,
    value: String,
) -> Arc<MenuDocument> {
    if field.get(current) == value {
        return Arc::clone(current);
    }
    let mut next = Arc::clone(current);
    *field.get_mut(Arc::make_mut(&mut next)) = value;
    next
}

fn update_item(
    current: &Arc<MenuDocument>,
    section: usize,
    item: usize,
    field: ItemField,
    value: String,
) -> Result<Arc<MenuDocument>, MenuError> {
    check_section(current, section)?;
    let items = &current.sections[section].items;
    if item >= items.len() {
        return Err(MenuError::IndexOutOfRange {
            target: "item",
            index: item,
            len: items.len(),
        });
    }
    if field.get(&items[item]) == value {
        return Ok(Arc::clone(current));
    }

    debug!("Updating {} of item [{}][{}]", field, section, item);
    let mut next = Arc::clone(current);
    let doc = Arc::make_mut(&mut next);
    let sec = Arc::make_mut(&mut doc.sections[section]);
    *field.get_mut(Arc::make_mut(&mut sec.items[item])) = value;
    Ok(next)
}

fn check_section(doc: &MenuDocument, section: usize) -> Result<(), MenuError> {
    if section < doc.sections.len() {
        Ok(())
    } else {
        Err(MenuError::IndexOutOfRange {
            target: "section",
            index: section,
            len: doc.sections.len(),
        })
    }
}
