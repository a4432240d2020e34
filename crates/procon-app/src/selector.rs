// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Remote entity picker.
//!
//! The committed `output` is the only record of what is selected. Display
//! names are a cache rebuilt from `output` through a names request; every
//! change to `output` bumps `version`, and a names response carrying an older
//! version is dropped on arrival.

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::fetch::{
    ListParams, Page, PageRequest, PaginatedFetch, SelectableRow, TableResult, backend_filter,
};
use crate::format::plain_text;
use crate::ids::EntityId;
use crate::model::{Record, RemoteBinding, SelectField, SortKey};
use crate::schema::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Single,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalMode {
    /// Browse the whole filtered remote set.
    Select,
    /// Only rows that are already selected.
    View,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: usize,
    pub current: usize,
    pub total: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        let page = PageRequest::default();
        Self {
            page_size: page.page_size,
            current: page.current,
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorCommand {
    Toggle(ModalMode),
    Check { id: EntityId, checked: bool },
    Confirm,
    Cancel,
}

/// Fetch of the display rows for `output` as of `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamesRequest {
    pub version: u64,
    pub page_id: String,
    pub api: String,
    pub params: ListParams,
}

#[derive(Debug)]
pub struct NamesResponse {
    pub version: u64,
    pub page: Result<Page>,
}

impl NamesRequest {
    /// Runs the request against `source` and tags the outcome.
    pub fn run<S: PaginatedFetch + ?Sized>(&self, source: &mut S) -> NamesResponse {
        let page = source
            .fetch_page(&self.page_id, &self.api, &self.params)
            .with_context(|| format!("fetch names from {}/{}", self.page_id, self.api));
        NamesResponse {
            version: self.version,
            page,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorEvent {
    ModalOpened(ModalMode),
    ModalClosed,
    ItemAdded(EntityId),
    ItemRemoved(EntityId),
    /// Committed value: an id or `null` in single mode, an id array otherwise.
    Changed(Value),
    NamesRequested(NamesRequest),
    NamesApplied,
    FetchFailed(String),
}

#[derive(Debug, Clone)]
pub struct RemoteSelector {
    binding: RemoteBinding,
    select_fields: Vec<SelectField>,
    mode: SelectMode,
    output: Vec<EntityId>,
    working: Vec<EntityId>,
    names: BTreeMap<EntityId, String>,
    rows: Vec<SelectableRow>,
    pagination: Pagination,
    modal: Option<ModalMode>,
    version: u64,
}

impl RemoteSelector {
    pub fn new(binding: &RemoteBinding) -> Result<Self, SchemaError> {
        let select_fields = binding.select_fields()?;
        if select_fields.is_empty() {
            return Err(SchemaError::MissingSelectField(binding.api.clone()));
        }
        Ok(Self {
            binding: binding.clone(),
            select_fields,
            mode: if binding.multiple {
                SelectMode::Multiple
            } else {
                SelectMode::Single
            },
            output: Vec::new(),
            working: Vec::new(),
            names: BTreeMap::new(),
            rows: Vec::new(),
            pagination: Pagination::default(),
            modal: None,
            version: 0,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.pagination.page_size = page_size.max(1);
        self
    }

    pub fn binding(&self) -> &RemoteBinding {
        &self.binding
    }

    pub fn select_fields(&self) -> &[SelectField] {
        &self.select_fields
    }

    pub fn mode(&self) -> SelectMode {
        self.mode
    }

    pub fn output(&self) -> &[EntityId] {
        &self.output
    }

    /// In-modal selection; equals `output` while the modal is closed.
    pub fn working(&self) -> &[EntityId] {
        &self.working
    }

    pub fn names(&self) -> &BTreeMap<EntityId, String> {
        &self.names
    }

    pub fn rows(&self) -> &[SelectableRow] {
        &self.rows
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn modal(&self) -> Option<ModalMode> {
        self.modal
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_current(&self, version: u64) -> bool {
        version == self.version
    }

    pub fn value(&self) -> Value {
        ids_to_value(self.mode, &self.output)
    }

    pub fn display_names(&self) -> Vec<String> {
        self.output
            .iter()
            .map(|id| {
                self.names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("#{id}"))
            })
            .collect()
    }

    pub fn display_text(&self) -> String {
        self.display_names().join(", ")
    }

    /// Label for a fetched entity: its first select field, else `#id`.
    pub fn label_of(&self, record: &Record) -> Option<String> {
        let id = EntityId::from_value(record.get("id")?)?;
        let label = self
            .select_fields
            .first()
            .and_then(|field| record.get(&field.field))
            .map(plain_text)
            .filter(|label| !label.trim().is_empty());
        Some(label.unwrap_or_else(|| format!("#{id}")))
    }

    pub fn dispatch(&mut self, command: SelectorCommand) -> Vec<SelectorEvent> {
        match command {
            SelectorCommand::Toggle(mode) => self.toggle(mode),
            SelectorCommand::Check { id, checked } => self.on_checkbox_changed(id, checked),
            SelectorCommand::Confirm => self.confirm(),
            SelectorCommand::Cancel => self.cancel(),
        }
    }

    fn toggle(&mut self, mode: ModalMode) -> Vec<SelectorEvent> {
        match self.modal {
            Some(open) if open == mode => self.cancel(),
            Some(_) => {
                self.modal = Some(mode);
                self.rows.clear();
                self.pagination.current = 1;
                vec![SelectorEvent::ModalOpened(mode)]
            }
            None => {
                self.modal = Some(mode);
                self.working = self.output.clone();
                self.rows.clear();
                self.pagination.current = 1;
                debug!(api = %self.binding.api, ?mode, "selector opened");
                vec![SelectorEvent::ModalOpened(mode)]
            }
        }
    }

    fn on_checkbox_changed(&mut self, id: EntityId, checked: bool) -> Vec<SelectorEvent> {
        if self.modal.is_none() {
            debug!(%id, "ignoring check while selector is closed");
            return Vec::new();
        }
        let mut events = Vec::new();
        match self.mode {
            SelectMode::Single => {
                self.working = if checked { vec![id] } else { Vec::new() };
            }
            SelectMode::Multiple => {
                let present = self.working.contains(&id);
                if checked && !present {
                    self.working.push(id);
                    events.push(SelectorEvent::ItemAdded(id));
                } else if !checked && present {
                    self.working.retain(|existing| *existing != id);
                    events.push(SelectorEvent::ItemRemoved(id));
                }
            }
        }
        self.refresh_checked();
        events
    }

    fn confirm(&mut self) -> Vec<SelectorEvent> {
        if self.modal.is_none() {
            return Vec::new();
        }
        let mut events = Vec::new();
        let changed = self.working != self.output;
        if changed {
            self.output = self.working.clone();
            self.version += 1;
        }
        events.push(SelectorEvent::Changed(self.value()));
        if changed {
            events.extend(self.request_names());
        }
        self.modal = None;
        events.push(SelectorEvent::ModalClosed);
        events
    }

    fn cancel(&mut self) -> Vec<SelectorEvent> {
        self.working = self.output.clone();
        if self.modal.take().is_none() {
            return Vec::new();
        }
        self.refresh_checked();
        vec![SelectorEvent::ModalClosed]
    }

    /// Accepts an externally supplied value.
    ///
    /// The value is normalized to an id list with nulls dropped. A value that
    /// holds the same ids as `output`, in any order, changes nothing. With the
    /// modal open, the in-modal checks and unchecks are replayed on top of the
    /// new value so a later confirm does not resurrect the old one.
    pub fn set_value(&mut self, value: &Value) -> Vec<SelectorEvent> {
        let ids = normalize_ids(value);
        if same_ids(&ids, &self.output) {
            return Vec::new();
        }
        let previous = std::mem::replace(&mut self.output, ids);
        self.working = if self.modal.is_some() {
            rebase_working(self.mode, &previous, &self.working, &self.output)
        } else {
            self.output.clone()
        };
        self.refresh_checked();
        self.version += 1;
        debug!(api = %self.binding.api, version = self.version, "selection replaced");
        self.request_names().into_iter().collect()
    }

    /// Puts `output` in the order of `ids` without changing its members.
    ///
    /// Ids outside `output` are ignored; committed ids missing from `ids`
    /// (entities the last fetch did not return) keep their relative order at
    /// the tail. Returns whether the order changed.
    pub fn reorder_committed(&mut self, ids: &[EntityId]) -> bool {
        let mut ordered: Vec<EntityId> = Vec::with_capacity(self.output.len());
        for id in ids {
            if self.output.contains(id) && !ordered.contains(id) {
                ordered.push(*id);
            }
        }
        for id in &self.output {
            if !ordered.contains(id) {
                ordered.push(*id);
            }
        }
        if ordered == self.output {
            return false;
        }
        self.output = ordered;
        if self.modal.is_none() {
            self.working = self.output.clone();
        }
        true
    }

    /// Request for the display rows of the current `output`, or `None` when
    /// nothing is selected. An empty selection clears the cache directly.
    pub fn request_names(&mut self) -> Option<SelectorEvent> {
        if self.output.is_empty() {
            self.names.clear();
            return None;
        }
        let ids: Vec<Value> = self.output.iter().map(|id| id.to_value()).collect();
        let mut filter = Record::new();
        filter.insert("id".to_owned(), json!({ "in": ids }));
        let params = ListParams::new(&filter, &[], PageRequest::new(1, self.output.len()));
        Some(SelectorEvent::NamesRequested(NamesRequest {
            version: self.version,
            page_id: self.binding.page_id.clone(),
            api: self.binding.api.clone(),
            params,
        }))
    }

    /// Applies a names response if it belongs to the current version.
    pub fn apply_names(&mut self, response: NamesResponse) -> Vec<SelectorEvent> {
        if !self.is_current(response.version) {
            debug!(
                api = %self.binding.api,
                stale = response.version,
                current = self.version,
                "discarding stale names response"
            );
            return Vec::new();
        }
        match response.page {
            Ok(page) => {
                let wanted: BTreeSet<EntityId> = self.output.iter().copied().collect();
                let names = page
                    .data
                    .iter()
                    .filter_map(|record| {
                        let id = EntityId::from_value(record.get("id")?)?;
                        if !wanted.contains(&id) {
                            return None;
                        }
                        Some((id, self.label_of(record)?))
                    })
                    .collect();
                self.names = names;
                vec![SelectorEvent::NamesApplied]
            }
            Err(error) => {
                warn!(api = %self.binding.api, error = %format!("{error:#}"), "names fetch failed");
                vec![SelectorEvent::FetchFailed(format!("{error:#}"))]
            }
        }
    }

    /// Loads one page of the modal table.
    ///
    /// On failure the rows and pagination stay as they were and the error is
    /// returned to the caller.
    pub fn fetch_data<S: PaginatedFetch + ?Sized>(
        &mut self,
        source: &mut S,
        page: PageRequest,
        sorter: &[SortKey],
        filters: &Record,
    ) -> Result<TableResult> {
        let mut filter = backend_filter(filters);
        if self.modal == Some(ModalMode::View) {
            self.restrict_to_output(&mut filter);
        }
        let params = ListParams::new(&filter, sorter, page);
        let fetched = source
            .fetch_page(&self.binding.page_id, &self.binding.api, &params)
            .with_context(|| {
                format!(
                    "fetch page {} of {}/{}",
                    page.current, self.binding.page_id, self.binding.api
                )
            });
        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(api = %self.binding.api, error = %format!("{error:#}"), "selector fetch failed");
                return Err(error);
            }
        };

        self.rows = fetched
            .data
            .into_iter()
            .map(|record| {
                let id = record.get("id").and_then(EntityId::from_value);
                SelectableRow {
                    checked: id.is_some_and(|id| self.working.contains(&id)),
                    id,
                    record,
                }
            })
            .collect();
        self.pagination = Pagination {
            page_size: page.page_size,
            current: page.current,
            total: fetched.count,
        };
        Ok(TableResult {
            data: self.rows.clone(),
            total: fetched.count,
            success: true,
        })
    }

    /// View mode never shows rows outside `output`: an `id` filter that does
    /// not match the selection is forced to the impossible id 0.
    fn restrict_to_output(&self, filter: &mut Record) {
        let restricted = match filter.get("id") {
            Some(requested) => match EntityId::from_value(requested) {
                Some(id) if self.output.contains(&id) => id.to_value(),
                _ => Value::from(0),
            },
            None if self.output.is_empty() => Value::from(0),
            None => {
                let ids: Vec<Value> = self.output.iter().map(|id| id.to_value()).collect();
                json!({ "in": ids })
            }
        };
        filter.insert("id".to_owned(), restricted);
    }

    fn refresh_checked(&mut self) {
        for row in &mut self.rows {
            row.checked = row.id.is_some_and(|id| self.working.contains(&id));
        }
    }
}

/// Replays the difference between `working` and `previous` onto `next`.
fn rebase_working(
    mode: SelectMode,
    previous: &[EntityId],
    working: &[EntityId],
    next: &[EntityId],
) -> Vec<EntityId> {
    if mode == SelectMode::Single {
        return if working == previous {
            next.to_vec()
        } else {
            working.to_vec()
        };
    }
    let mut rebased: Vec<EntityId> = next
        .iter()
        .filter(|id| !previous.contains(id) || working.contains(id))
        .copied()
        .collect();
    for id in working {
        if !previous.contains(id) && !rebased.contains(id) {
            rebased.push(*id);
        }
    }
    rebased
}

pub fn normalize_ids(value: &Value) -> Vec<EntityId> {
    let mut ids = Vec::new();
    let mut push = |id: EntityId| {
        if !ids.contains(&id) {
            ids.push(id);
        }
    };
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                if let Some(id) = EntityId::from_value(item) {
                    push(id);
                }
            }
        }
        other => {
            if let Some(id) = EntityId::from_value(other) {
                push(id);
            }
        }
    }
    ids
}

pub fn ids_to_value(mode: SelectMode, ids: &[EntityId]) -> Value {
    match mode {
        SelectMode::Single => ids.first().map_or(Value::Null, |id| id.to_value()),
        SelectMode::Multiple => Value::Array(ids.iter().map(|id| id.to_value()).collect()),
    }
}

fn same_ids(left: &[EntityId], right: &[EntityId]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let left: BTreeSet<_> = left.iter().collect();
    let right: BTreeSet<_> = right.iter().collect();
    left == right
}
