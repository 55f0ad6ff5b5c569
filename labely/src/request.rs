//! Normalizing the raw parameters of a label sheet request.
//!
//! Both the query string and the JSON body end up as a [`LabelRequest`], so
//! nothing past this module has to care which shape the caller used.
use label_api_types::{IdList, ItemType, LabelSheetBody, SHEET_SLOTS};
use log::warn;
use url::form_urlencoded;

/// The quantity used when none is given or it does not parse.
pub const DEFAULT_QUANTITY: u32 = 1;

/// A single id and how many labels to print for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRequestItem {
    pub id: String,
    pub quantity: u32,
}

/// The 1-based slot on the sheet to start printing at.
///
/// Anything below 1 becomes 1. Anything past the last slot is kept, and simply
/// leaves no room for labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartPosition(usize);

impl StartPosition {
    pub fn new(raw: Option<i64>) -> Self {
        match raw {
            Some(n) if n >= 1 => StartPosition(usize::try_from(n).unwrap_or(usize::MAX)),
            _ => StartPosition(1),
        }
    }

    pub fn get(&self) -> usize {
        self.0
    }

    /// The 0-based slot index of the first label.
    pub fn cursor(&self) -> usize {
        self.0 - 1
    }

    /// How many labels fit on the sheet from this position on.
    pub fn capacity(&self) -> usize {
        SHEET_SLOTS.saturating_sub(self.cursor())
    }
}

impl Default for StartPosition {
    fn default() -> Self {
        StartPosition(1)
    }
}

/// Which items to print, in one of the two supported shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSpec {
    /// Every id carries its own quantity, from `items=P001:3,P002:2`.
    PerItem(Vec<LabelRequestItem>),
    /// All ids share one quantity, from `ids=P001,P002&quantity=2`.
    ///
    /// The quantity only applies when exactly one id is given.
    Shared { ids: Vec<String>, quantity: u32 },
}

impl ItemSpec {
    pub fn is_empty(&self) -> bool {
        match self {
            ItemSpec::PerItem(items) => items.is_empty(),
            ItemSpec::Shared { ids, .. } => ids.is_empty(),
        }
    }
}

/// A validated request for one sheet of labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRequest {
    pub item_type: ItemType,
    pub start: StartPosition,
    pub spec: ItemSpec,
}

impl LabelRequest {
    /// Parse a raw query string, such as `type=material&ids=M1,M2&quantity=2`.
    ///
    /// `ids` may be repeated (`ids=P001&ids=P002`, or `ids[]=...`) and every
    /// value is kept. For the other keys the last value wins. Only an unknown
    /// `type` is an error.
    pub fn from_query_string(raw: &str) -> Result<Self, String> {
        let mut item_type = ItemType::default();
        let mut start = None;
        let mut items = None;
        let mut ids: Option<Vec<String>> = None;
        let mut quantity = None;

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "type" => item_type = value.parse()?,
                "start" => start = parse_integer(&value),
                "items" => items = Some(value.into_owned()),
                "ids" | "ids[]" => ids.get_or_insert_with(Vec::new).extend(split_ids(&value)),
                "quantity" => quantity = parse_integer(&value),
                _ => {}
            }
        }

        Ok(Self::build(item_type, start, items.as_deref(), ids, quantity))
    }

    pub fn from_body(body: &LabelSheetBody) -> Self {
        let ids = body.ids.as_ref().map(|ids| match ids {
            IdList::Joined(joined) => split_ids(joined),
            IdList::Split(split) => split
                .iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        });

        Self::build(body.item_type, body.start, body.items.as_deref(), ids, body.quantity)
    }

    fn build(
        item_type: ItemType,
        start: Option<i64>,
        items: Option<&str>,
        ids: Option<Vec<String>>,
        quantity: Option<i64>,
    ) -> Self {
        let items = items.filter(|items| !items.trim().is_empty());

        let spec = match (items, ids) {
            (Some(items), ids) => {
                if ids.map(|ids| !ids.is_empty()).unwrap_or(false) {
                    warn!("label request has both `items` and `ids`, using `items`");
                }
                ItemSpec::PerItem(parse_items(items))
            }
            (None, ids) => ItemSpec::Shared {
                ids: ids.unwrap_or_default(),
                quantity: quantity_or_default(quantity),
            },
        };

        LabelRequest {
            item_type,
            start: StartPosition::new(start),
            spec,
        }
    }
}

/// Parse `id:quantity` pairs separated by commas.
///
/// A missing or bad quantity becomes [`DEFAULT_QUANTITY`]. Empty ids are skipped.
/// Repeated ids stay separate entries in the order given.
pub fn parse_items(items: &str) -> Vec<LabelRequestItem> {
    items
        .split(',')
        .filter_map(|token| {
            let (id, quantity) = match token.split_once(':') {
                Some((id, quantity)) => (id.trim(), parse_integer(quantity)),
                None => (token.trim(), None),
            };
            if id.is_empty() {
                return None;
            }

            Some(LabelRequestItem {
                id: id.to_string(),
                quantity: quantity_or_default(quantity),
            })
        })
        .collect()
}

/// Split comma separated ids, dropping empty ones.
pub fn split_ids(ids: &str) -> Vec<String> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_integer(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn quantity_or_default(quantity: Option<i64>) -> u32 {
    quantity
        .filter(|q| *q >= 1)
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(DEFAULT_QUANTITY)
}
