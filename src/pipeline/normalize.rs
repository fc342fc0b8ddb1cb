//! Normalization: JSON → canonical [`MenuDocument`].
//!
//! Two entry points share one decoder.
//!
//! * [`normalize_response`] / [`decode_document`] take untrusted model
//!   output and apply the policy below.
//! * [`decode_saved_document`] reads a document that already went through
//!   normalization and editing (a saved `menu.json`, an `/api/export`
//!   body). It checks structure and types only: no defaults, no trimming,
//!   no envelope. Whatever an edit wrote comes back unchanged.
//!
//! ## Model output policy
//!
//! One policy for every backend: the *structure* of a menu is required and
//! never invented, while *cosmetic* fields fall back to fixed literals.
//!
//! | Field                         | When missing / null / blank         |
//! |-------------------------------|-------------------------------------|
//! | `name`                        | `"FOOD MENU"`                       |
//! | `restaurant`                  | `"Restaurant Name"`                 |
//! | `contact` / `contact.phone`   | `"123-456-7890"`                    |
//! | `contact.address`             | `"123 Anywhere St., Any City"`      |
//! | `sections[].items[].image`    | [`PLACEHOLDER_IMAGE`]               |
//! | `sections`                    | error                               |
//! | `sections[].name`             | error (blank counts as missing)     |
//! | `sections[].items`            | error (`[]` is fine)                |
//! | `sections[].items[].name`     | error                               |
//! | `sections[].items[].price`    | error                               |
//!
//! Labels are trimmed; prices are kept exactly as written. Numbers are
//! accepted where a string is expected and kept in their JSON spelling,
//! since some models emit `"price": 12.5`. Every other type mismatch is a
//! [`DecodeError::WrongType`]. Unknown keys are ignored. Order is preserved
//! exactly as received.

use crate::error::{DecodeError, MenuError};
use crate::model::{Contact, ItemId, MenuDocument, MenuItem, MenuSection, SectionId};
use crate::pipeline::postprocess::clean_json_text;
use crate::schema::{
    field, DEFAULT_ADDRESS, DEFAULT_PHONE, DEFAULT_RESTAURANT, DEFAULT_TITLE, PLACEHOLDER_IMAGE,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Clean, parse and validate raw model output.
pub fn normalize_response(raw: &str) -> Result<MenuDocument, MenuError> {
    let cleaned = clean_json_text(raw);
    let value: Value = serde_json::from_str(&cleaned).map_err(DecodeError::from)?;
    let doc = decode_document(&value)?;
    debug!(
        "Normalized menu: {} sections, {} items",
        doc.sections.len(),
        doc.item_count()
    );
    Ok(doc)
}

/// Validate model output that is already parsed. Ids are assigned in
/// document order starting at 0.
pub fn decode_document(value: &Value) -> Result<MenuDocument, DecodeError> {
    Decoder::new(Mode::ModelOutput).document(value)
}

/// Read back a document in the wire shape without altering any value.
///
/// Every field must be present with a string value and every section name
/// must be non-blank.
pub fn decode_saved_document(value: &Value) -> Result<MenuDocument, DecodeError> {
    Decoder::new(Mode::Saved).document(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    ModelOutput,
    Saved,
}

struct Decoder {
    mode: Mode,
    next_section: u32,
    next_item: u32,
}

impl Decoder {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            next_section: 0,
            next_item: 0,
        }
    }

    fn document(&mut self, value: &Value) -> Result<MenuDocument, DecodeError> {
        let value = match self.mode {
            Mode::ModelOutput => unwrap_envelope(value),
            Mode::Saved => value,
        };
        let obj = value.as_object().ok_or(DecodeError::NotAnObject {
            found: json_kind(value),
        })?;

        let title = self.cosmetic(obj, field::TITLE, field::TITLE, DEFAULT_TITLE)?;
        let restaurant_name =
            self.cosmetic(obj, field::RESTAURANT, field::RESTAURANT, DEFAULT_RESTAURANT)?;

        let sections = array(obj, field::SECTIONS, field::SECTIONS)?
            .iter()
            .enumerate()
            .map(|(i, v)| self.section(v, &format!("{}[{}]", field::SECTIONS, i)))
            .collect::<Result<Vec<_>, _>>()?;

        let contact = self.contact(obj.get(field::CONTACT))?;

        Ok(MenuDocument {
            title,
            restaurant_name,
            sections,
            contact,
        })
    }

    fn section(&mut self, value: &Value, path: &str) -> Result<Arc<MenuSection>, DecodeError> {
        let obj = object(value, path)?;
        let id = SectionId(self.next_section);
        self.next_section += 1;

        let name_path = format!("{path}.{}", field::SECTION_NAME);
        let name = self
            .text(obj.get(field::SECTION_NAME), &name_path, true)?
            .filter(|s| !s.trim().is_empty())
            .ok_or(DecodeError::MissingField { path: name_path })?;

        let items_path = format!("{path}.{}", field::ITEMS);
        let items = array(obj, field::ITEMS, &items_path)?
            .iter()
            .enumerate()
            .map(|(i, v)| self.item(v, &format!("{items_path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Arc::new(MenuSection { id, name, items }))
    }

    fn item(&mut self, value: &Value, path: &str) -> Result<Arc<MenuItem>, DecodeError> {
        let obj = object(value, path)?;
        let id = ItemId(self.next_item);
        self.next_item += 1;

        Ok(Arc::new(MenuItem {
            id,
            name: self.required(obj, field::ITEM_NAME, path, true)?,
            price: self.required(obj, field::PRICE, path, false)?,
            image: self.cosmetic(
                obj,
                field::IMAGE,
                &format!("{path}.{}", field::IMAGE),
                PLACEHOLDER_IMAGE,
            )?,
        }))
    }

    fn contact(&self, value: Option<&Value>) -> Result<Contact, DecodeError> {
        let empty = Map::new();
        let obj = match value {
            None | Some(Value::Null) if self.mode == Mode::ModelOutput => &empty,
            None | Some(Value::Null) => {
                return Err(DecodeError::MissingField {
                    path: field::CONTACT.to_string(),
                })
            }
            Some(Value::Object(obj)) => obj,
            Some(other) => {
                return Err(DecodeError::WrongType {
                    path: field::CONTACT.to_string(),
                    expected: "an object",
                    found: json_kind(other),
                })
            }
        };

        Ok(Contact {
            phone: self.cosmetic(
                obj,
                field::PHONE,
                &format!("{}.{}", field::CONTACT, field::PHONE),
                DEFAULT_PHONE,
            )?,
            address: self.cosmetic(
                obj,
                field::ADDRESS,
                &format!("{}.{}", field::CONTACT, field::ADDRESS),
                DEFAULT_ADDRESS,
            )?,
        })
    }

    /// A string value. `None` when absent or null.
    ///
    /// Model output also accepts numbers, and labels (`trim`) are trimmed.
    /// Saved documents are taken verbatim.
    fn text(
        &self,
        value: Option<&Value>,
        path: &str,
        trim: bool,
    ) -> Result<Option<String>, DecodeError> {
        let lenient = self.mode == Mode::ModelOutput;
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if lenient && trim => Ok(Some(s.trim().to_string())),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) if lenient => Ok(Some(n.to_string())),
            Some(other) => Err(DecodeError::WrongType {
                path: path.to_string(),
                expected: "a string",
                found: json_kind(other),
            }),
        }
    }

    fn required(
        &self,
        obj: &Map<String, Value>,
        key: &str,
        parent: &str,
        trim: bool,
    ) -> Result<String, DecodeError> {
        let path = format!("{parent}.{key}");
        self.text(obj.get(key), &path, trim)?
            .ok_or(DecodeError::MissingField { path })
    }

    /// Defaulted when blank in model output; required as-is when saved.
    fn cosmetic(
        &self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
        default: &str,
    ) -> Result<String, DecodeError> {
        let value = self.text(obj.get(key), path, true)?;
        match self.mode {
            Mode::Saved => value.ok_or_else(|| DecodeError::MissingField {
                path: path.to_string(),
            }),
            Mode::ModelOutput => Ok(value.filter(|s| !s.is_empty()).unwrap_or_else(|| {
                debug!("Defaulting '{}'", path);
                default.to_string()
            })),
        }
    }
}

/// `{"menu": {...}}` → `{...}` when the outer object has no sections of its own.
fn unwrap_envelope(value: &Value) -> &Value {
    match value {
        Value::Object(obj) if !obj.contains_key(field::SECTIONS) => {
            match obj.get(field::MENU_ENVELOPE) {
                Some(inner @ Value::Object(_)) => {
                    debug!("Unwrapping '{}' envelope", field::MENU_ENVELOPE);
                    inner
                }
                _ => value,
            }
        }
        _ => value,
    }
}

fn object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, DecodeError> {
    value.as_object().ok_or_else(|| DecodeError::WrongType {
        path: path.to_string(),
        expected: "an object",
        found: json_kind(value),
    })
}

fn array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Vec<Value>, DecodeError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(DecodeError::MissingField {
            path: path.to_string(),
        }),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(DecodeError::WrongType {
            path: path.to_string(),
            expected: "an array",
            found: json_kind(other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
