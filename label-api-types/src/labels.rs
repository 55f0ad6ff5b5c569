use std::{fmt, str::FromStr};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The number of labels on one printed sheet.
pub const SHEET_SLOTS: usize = 24;
/// The number of label columns on one printed sheet.
pub const SHEET_COLUMNS: usize = 3;
/// The number of label rows on one printed sheet.
pub const SHEET_ROWS: usize = SHEET_SLOTS / SHEET_COLUMNS;

/// The collection an item id is looked up in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, JsonSchema, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    #[default]
    Product,
    Material,
}

impl ItemType {
    /// The name of the backing collection for this type of item.
    pub fn collection(&self) -> &'static str {
        match self {
            ItemType::Product => "products",
            ItemType::Material => "materials",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Product => write!(f, "product"),
            ItemType::Material => write!(f, "material"),
        }
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "product" => Ok(ItemType::Product),
            "material" => Ok(ItemType::Material),
            other => Err(format!("unknown item type `{}`, expected `product` or `material`", other)),
        }
    }
}

/// The query string of a label sheet request.
///
/// Everything but `type` is kept as raw text so that a malformed number falls
/// back to its default instead of rejecting the request.
#[derive(Debug, Clone, Default, JsonSchema, Deserialize, Serialize)]
pub struct LabelSheetQuery {
    #[serde(default, rename = "type")]
    pub item_type: ItemType,
    /// The 1-based slot to start printing at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Comma separated `id:quantity` pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    /// Comma separated ids that share `quantity`. May be repeated, as in
    /// `ids=P001&ids=P002`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
}

/// Ids given either joined with commas or already split.
#[derive(Debug, Clone, PartialEq, Eq, JsonSchema, Deserialize, Serialize)]
#[serde(untagged)]
pub enum IdList {
    Joined(String),
    Split(Vec<String>),
}

/// The JSON body of a label sheet request.
#[derive(Debug, Clone, Default, JsonSchema, Deserialize, Serialize)]
pub struct LabelSheetBody {
    #[serde(default, rename = "type")]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<IdList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

/// An item id together with the display name it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, JsonSchema, Deserialize, Serialize)]
pub struct ResolvedItem {
    pub id: String,
    pub name: String,
}

/// One physical label position on a sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, JsonSchema, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LabelSlot {
    Filled(ResolvedItem),
    #[default]
    Empty,
}

impl LabelSlot {
    pub fn item(&self) -> Option<&ResolvedItem> {
        match self {
            LabelSlot::Filled(item) => Some(item),
            LabelSlot::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, LabelSlot::Empty)
    }
}

/// What happened to a single requested label.
#[derive(Debug, Clone, PartialEq, Eq, JsonSchema, Deserialize, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LabelOutcome {
    /// The label was placed at the given 0-based slot.
    Placed { slot: usize, id: String },
    /// The id did not resolve to an item, so it took no slot.
    DroppedUnresolved { id: String },
    /// `count` labels of this id did not fit on the sheet past the last slot.
    DroppedOverflow { id: String, count: u64 },
}

/// A filled in sheet of labels, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq, JsonSchema, Deserialize, Serialize)]
pub struct LabelSheetResponse {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// The 1-based slot printing started at.
    pub start: usize,
    pub slots: [LabelSlot; SHEET_SLOTS],
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<LabelOutcome>,
    pub placed: usize,
    pub dropped_unresolved: usize,
    pub dropped_overflow: u64,
}
