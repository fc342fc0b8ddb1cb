//! Canonical shape of a menu document.
//!
//! Two consumers share this module: the Gemini backend hands
//! [`response_schema`] to the model so the server constrains its output, and
//! the normalizer uses the same field names and default literals when it
//! validates a response.

use serde_json::{json, Value};

/// JSON field names on the wire.
pub mod field {
    pub const TITLE: &str = "name";
    pub const RESTAURANT: &str = "restaurant";
    pub const SECTIONS: &str = "sections";
    pub const CONTACT: &str = "contact";
    pub const SECTION_NAME: &str = "name";
    pub const ITEMS: &str = "items";
    pub const ITEM_NAME: &str = "name";
    pub const PRICE: &str = "price";
    pub const IMAGE: &str = "image";
    pub const PHONE: &str = "phone";
    pub const ADDRESS: &str = "address";
    /// Envelope key some models wrap the whole document in.
    pub const MENU_ENVELOPE: &str = "menu";
}

pub const DEFAULT_TITLE: &str = "FOOD MENU";
pub const DEFAULT_RESTAURANT: &str = "Restaurant Name";
pub const DEFAULT_PHONE: &str = "123-456-7890";
pub const DEFAULT_ADDRESS: &str = "123 Anywhere St., Any City";

/// Image reference used when extraction yields none.
///
/// Served by `GET /api/placeholder/{w}/{h}` when the `server` feature is on.
pub const PLACEHOLDER_IMAGE: &str = "/api/placeholder/200/200";

/// Response schema in the OpenAPI subset accepted by Gemini's
/// `generationConfig.responseSchema`.
///
/// Structural fields are `required`; cosmetic fields (item image) are not,
/// since the normalizer fills those.
pub fn response_schema() -> Value {
    let string = json!({ "type": "STRING" });

    let item = json!({
        "type": "OBJECT",
        "properties": {
            "name": string,
            "price": string,
            "image": string,
        },
        "required": ["name", "price"],
    });

    let section = json!({
        "type": "OBJECT",
        "properties": {
            "name": string,
            "items": { "type": "ARRAY", "items": item },
        },
        "required": ["name", "items"],
    });

    json!({
        "type": "OBJECT",
        "properties": {
            "name": string,
            "restaurant": string,
            "sections": { "type": "ARRAY", "items": section },
            "contact": {
                "type": "OBJECT",
                "properties": {
                    "phone": string,
                    "address": string,
                },
            },
        },
        "required": ["name", "restaurant", "sections", "contact"],
    })
}
