//! Response shapes the client interprets
//!
//! Most payloads are passed through as raw JSON; only the pieces the client
//! reasons about (pagination metadata, the match summary printed by the CLI)
//! get types of their own.

use serde::Serialize;
use serde_json::Value;

use super::ApiError;

/// Pagination metadata attached to a match-history page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMeta {
    /// Number of the final page, when the API reports one
    pub last_page: Option<u32>,
}

impl PageMeta {
    /// Reads `last_page` (or `lastPage`) from a `meta` object
    ///
    /// Accepts numbers and numeric strings. Zero counts as unknown, so a
    /// zero `last_page` falls through to `lastPage`.
    fn from_value(meta: &Value) -> Self {
        let last_page = ["last_page", "lastPage"]
            .iter()
            .filter_map(|key| meta.get(*key))
            .find_map(|value| as_page_number(value).filter(|&page| page > 0));
        Self { last_page }
    }

    /// Whether `page` is the last page or beyond it
    pub fn is_last(&self, page: u32) -> bool {
        self.last_page.is_some_and(|last| page >= last)
    }
}

fn as_page_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One page of a player's match history
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchPage {
    /// Match records on this page, newest first
    pub data: Vec<Value>,
    /// Pagination metadata, when present
    pub meta: Option<PageMeta>,
}

impl MatchPage {
    /// Interprets a page payload
    ///
    /// A `null` payload is an error. Anything else is read leniently: a
    /// missing or non-array `data` is an empty page and an empty or missing
    /// `meta` is no metadata.
    pub fn from_payload(payload: &Value) -> Result<Self, ApiError> {
        if payload.is_null() {
            return Err(ApiError::NullPayload);
        }

        let data = payload
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let meta = payload
            .get("meta")
            .filter(|meta| meta.as_object().is_some_and(|fields| !fields.is_empty()))
            .map(PageMeta::from_value);

        Ok(Self { data, meta })
    }

    /// Whether the page carries no match records
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Hunter played in a match
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HunterRef {
    pub name: Option<String>,
    pub image_url: Option<String>,
}

/// Condensed view of a match-history record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSummary {
    pub placement: Option<i64>,
    pub hunter: HunterRef,
}

impl MatchSummary {
    /// Extracts placement and hunter from a raw match record
    ///
    /// The hunter image prefers `head_image_url` over `image_url`.
    pub fn from_item(item: &Value) -> Self {
        let hero = item.get("hero").unwrap_or(&Value::Null);
        let text = |key: &str| hero.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            placement: item.get("placement").and_then(Value::as_i64),
            hunter: HunterRef {
                name: text("name"),
                image_url: text("head_image_url").or_else(|| text("image_url")),
            },
        }
    }
}
