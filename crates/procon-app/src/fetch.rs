// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! The paginated list contract every remote-backed component reads through.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ids::EntityId;
use crate::model::{Record, SortKey};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Query parameters of one list request.
///
/// `query_input` and `sort` are JSON documents encoded as strings, the way the
/// list endpoint takes them on the query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub query_input: String,
    pub sort: String,
    pub limit: usize,
    pub skip: usize,
}

impl ListParams {
    pub fn new(filter: &Record, sort: &[SortKey], page: PageRequest) -> Self {
        Self {
            query_input: Value::Object(filter.clone()).to_string(),
            sort: encode_sort(sort),
            limit: page.page_size,
            skip: page.skip(),
        }
    }

    pub fn filter(&self) -> Result<Record> {
        if self.query_input.trim().is_empty() {
            return Ok(Record::new());
        }
        match serde_json::from_str::<Value>(&self.query_input)? {
            Value::Object(filter) => Ok(filter),
            other => anyhow::bail!("queryInput must be a JSON object, got {other}"),
        }
    }

    pub fn sort_keys(&self) -> Result<Vec<SortKey>> {
        decode_sort(&self.sort)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<Record>,
    pub count: u64,
}

/// 1-based page cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub current: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(current: usize, page_size: usize) -> Self {
        Self {
            current: current.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn skip(self) -> usize {
        self.current.saturating_sub(1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One fetched row plus whether it is in the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectableRow {
    pub id: Option<EntityId>,
    pub checked: bool,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableResult {
    pub data: Vec<SelectableRow>,
    pub total: u64,
    pub success: bool,
}

pub trait PaginatedFetch {
    fn fetch_page(&mut self, page_id: &str, api: &str, params: &ListParams) -> Result<Page>;
}

impl<T: PaginatedFetch + ?Sized> PaginatedFetch for &mut T {
    fn fetch_page(&mut self, page_id: &str, api: &str, params: &ListParams) -> Result<Page> {
        (**self).fetch_page(page_id, api, params)
    }
}

impl<T: PaginatedFetch + ?Sized> PaginatedFetch for Box<T> {
    fn fetch_page(&mut self, page_id: &str, api: &str, params: &ListParams) -> Result<Page> {
        (**self).fetch_page(page_id, api, params)
    }
}

/// Rewrites table column filters into the backend filter language.
///
/// Strings become `{"contains": s}` except on `id`, which matches exactly.
/// Arrays become `{"in": [...]}`. Objects are already operator documents and
/// pass through. Nulls and blank strings are dropped.
pub fn backend_filter(filters: &Record) -> Record {
    let mut out = Record::new();
    for (key, value) in filters {
        let translated = match value {
            Value::Null => continue,
            Value::String(text) if text.trim().is_empty() => continue,
            Value::String(text) if key == "id" => match EntityId::from_value(value) {
                Some(id) => id.to_value(),
                None => Value::String(text.clone()),
            },
            Value::String(text) => json!({ "contains": text }),
            Value::Array(items) => json!({ "in": items }),
            other => other.clone(),
        };
        out.insert(key.clone(), translated);
    }
    out
}

/// `[{"field": "asc"}, ...]` in priority order.
pub fn encode_sort(sort: &[SortKey]) -> String {
    Value::Array(
        sort.iter()
            .map(|key| {
                let mut entry = Record::new();
                entry.insert(key.field.clone(), Value::from(key.order.as_backend()));
                Value::Object(entry)
            })
            .collect(),
    )
    .to_string()
}

pub fn decode_sort(raw: &str) -> Result<Vec<SortKey>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let Value::Array(entries) = serde_json::from_str::<Value>(raw)? else {
        anyhow::bail!("sort must be a JSON array like [{{\"field\": \"asc\"}}]");
    };
    let mut keys = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(entry) = entry else {
            anyhow::bail!("sort entries must be objects, got {entry}");
        };
        for (field, order) in entry {
            let order = order
                .as_str()
                .and_then(crate::model::SortOrder::parse)
                .ok_or_else(|| anyhow::anyhow!("sort order for {field:?} must be asc or desc"))?;
            keys.push(SortKey { field, order });
        }
    }
    Ok(keys)
}
