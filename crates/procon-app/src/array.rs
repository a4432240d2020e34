// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Ordered multi-selection with a dense `sequence` per entry.

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use crate::fetch::{PageRequest, PaginatedFetch, TableResult};
use crate::ids::EntityId;
use crate::model::{Record, RemoteBinding, SortKey};
use crate::schema::SchemaError;
use crate::selector::{NamesResponse, RemoteSelector, SelectorCommand, SelectorEvent};
use crate::sortable::{MoveReport, SortableRows};

pub const SEQUENCE_FIELD: &str = "sequence";

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayEntry {
    pub id: EntityId,
    /// 1-based position, always dense across the list.
    pub sequence: u32,
    /// Fetched entity fields plus per-row edits.
    pub fields: Record,
}

impl ArrayEntry {
    pub fn to_record(&self) -> Record {
        let mut record = self.fields.clone();
        record.insert("id".to_owned(), self.id.to_value());
        record.insert(SEQUENCE_FIELD.to_owned(), Value::from(self.sequence));
        record
    }

    /// Reads an entry back out of [`ArrayEntry::to_record`] output.
    pub fn from_record(record: &Record) -> Option<Self> {
        let id = EntityId::from_value(record.get("id")?)?;
        let sequence = record
            .get(SEQUENCE_FIELD)
            .and_then(Value::as_u64)
            .and_then(|sequence| u32::try_from(sequence).ok())
            .unwrap_or(0);
        let mut fields = record.clone();
        fields.remove("id");
        fields.remove(SEQUENCE_FIELD);
        Some(Self {
            id,
            sequence,
            fields,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayCommand {
    Selector(SelectorCommand),
    Move { old_index: usize, new_index: usize },
    Update { id: EntityId, patch: Record },
    Remove(EntityId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayEvent {
    Selector(SelectorEvent),
    Moved(MoveReport<EntityId>),
    Changed(Vec<ArrayEntry>),
}

#[derive(Debug, Clone)]
pub struct ArraySelector {
    selector: RemoteSelector,
    entries: Vec<ArrayEntry>,
}

impl ArraySelector {
    pub fn new(binding: &RemoteBinding) -> Result<Self, SchemaError> {
        let binding = binding.clone().multiple();
        Ok(Self {
            selector: RemoteSelector::new(&binding)?,
            entries: Vec::new(),
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.selector = self.selector.with_page_size(page_size);
        self
    }

    pub fn entries(&self) -> &[ArrayEntry] {
        &self.entries
    }

    pub fn selector(&self) -> &RemoteSelector {
        &self.selector
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|entry| Value::Object(entry.to_record()))
                .collect(),
        )
    }

    pub fn dispatch(&mut self, command: ArrayCommand) -> Vec<ArrayEvent> {
        match command {
            ArrayCommand::Selector(command) => self.dispatch_selector(command),
            ArrayCommand::Move {
                old_index,
                new_index,
            } => self.on_sort_end(old_index, new_index),
            ArrayCommand::Update { id, patch } => self.update_entry(id, &patch),
            ArrayCommand::Remove(id) => self.remove_entry(id),
        }
    }

    fn dispatch_selector(&mut self, command: SelectorCommand) -> Vec<ArrayEvent> {
        let before = self.selector.version();
        let mut events: Vec<ArrayEvent> = self
            .selector
            .dispatch(command)
            .into_iter()
            .map(ArrayEvent::Selector)
            .collect();
        if command == SelectorCommand::Confirm
            && self.selector.version() != before
            && self.drop_deselected()
        {
            events.push(self.changed());
        }
        events
    }

    /// Takes an externally supplied value: ids, or entry records as produced
    /// by [`ArraySelector::to_value`].
    ///
    /// Entry records replace the list wholesale (keeping their given order).
    /// Bare ids only reconcile the selection; entries for new ids arrive with
    /// the names fetch.
    pub fn set_value(&mut self, value: &Value) -> Vec<ArrayEvent> {
        let records: Vec<ArrayEntry> = match value {
            Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(ArrayEntry::from_record)
                    .collect()
            }
            _ => Vec::new(),
        };

        if records.is_empty() {
            let events: Vec<ArrayEvent> = self
                .selector
                .set_value(value)
                .into_iter()
                .map(ArrayEvent::Selector)
                .collect();
            if !events.is_empty() || self.selector.output().is_empty() {
                self.drop_deselected();
            }
            return events;
        }

        let mut sorted = records;
        sorted.sort_by_key(|entry| entry.sequence);
        let ids: Vec<Value> = sorted.iter().map(|entry| entry.id.to_value()).collect();
        let mut events: Vec<ArrayEvent> = self
            .selector
            .set_value(&Value::Array(ids))
            .into_iter()
            .map(ArrayEvent::Selector)
            .collect();
        let order: Vec<EntityId> = sorted.iter().map(|entry| entry.id).collect();
        self.selector.reorder_committed(&order);
        if sorted != self.entries {
            self.entries = sorted;
            renumber(&mut self.entries);
            events.push(self.changed());
        }
        events
    }

    /// Applies a names response to both the label cache and the entry list.
    pub fn apply_fetch(&mut self, response: NamesResponse) -> Vec<ArrayEvent> {
        let fetched = match (&response.page, self.selector.is_current(response.version)) {
            (Ok(page), true) => Some(page.data.clone()),
            _ => None,
        };
        let mut events: Vec<ArrayEvent> = self
            .selector
            .apply_names(response)
            .into_iter()
            .map(ArrayEvent::Selector)
            .collect();
        if let Some(fetched) = fetched
            && self.sync_entries(&fetched)
        {
            events.push(self.changed());
        }
        events
    }

    /// Rebuilds entries against the committed ids using freshly fetched rows.
    ///
    /// Entries still selected keep their fields (including unsaved per-row
    /// edits); entries no longer selected are dropped; survivors are
    /// renumbered densely; new ids are appended after the current maximum in
    /// selection order. Returns whether anything changed.
    pub fn sync_entries(&mut self, fetched: &[Record]) -> bool {
        let before = self.entries.clone();
        let mut entries: Vec<ArrayEntry> = before
            .iter()
            .filter(|entry| self.selector.output().contains(&entry.id))
            .cloned()
            .collect();
        renumber(&mut entries);

        let present: BTreeSet<EntityId> = entries.iter().map(|entry| entry.id).collect();
        let max = entries.iter().map(|entry| entry.sequence).max().unwrap_or(0);
        let mut position = 0u32;
        for id in self.selector.output() {
            if present.contains(id) {
                continue;
            }
            let Some(record) = fetched
                .iter()
                .find(|record| record.get("id").and_then(EntityId::from_value) == Some(*id))
            else {
                debug!(%id, "selected id missing from fetch; not adding entry");
                continue;
            };
            position += 1;
            let Some(mut entry) = ArrayEntry::from_record(record) else {
                continue;
            };
            entry.sequence = max + position;
            entries.push(entry);
        }

        let order: Vec<EntityId> = entries.iter().map(|entry| entry.id).collect();
        self.selector.reorder_committed(&order);
        let changed = entries != before;
        self.entries = entries;
        changed
    }

    pub fn on_sort_end(&mut self, old_index: usize, new_index: usize) -> Vec<ArrayEvent> {
        let mut rows = SortableRows::new(std::mem::take(&mut self.entries), |entry: &ArrayEntry| {
            entry.id
        });
        let report = rows.on_sort_end(old_index, new_index, |entry, index| {
            entry.sequence = position_sequence(index);
        });
        self.entries = rows.into_rows();
        let Some(report) = report else {
            return Vec::new();
        };
        let order: Vec<EntityId> = self.entries.iter().map(|entry| entry.id).collect();
        self.selector.reorder_committed(&order);
        vec![ArrayEvent::Moved(report), self.changed()]
    }

    /// Merges `patch` into one entry. The entry is replaced, never mutated in
    /// place; `id` and `sequence` in the patch are ignored.
    pub fn update_entry(&mut self, id: EntityId, patch: &Record) -> Vec<ArrayEvent> {
        if !self.entries.iter().any(|entry| entry.id == id) {
            return Vec::new();
        }
        self.entries = self
            .entries
            .iter()
            .map(|entry| {
                if entry.id != id {
                    return entry.clone();
                }
                let mut fields = entry.fields.clone();
                for (key, value) in patch {
                    if key != "id" && key != SEQUENCE_FIELD {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                ArrayEntry {
                    fields,
                    ..entry.clone()
                }
            })
            .collect();
        vec![self.changed()]
    }

    pub fn remove_entry(&mut self, id: EntityId) -> Vec<ArrayEvent> {
        if !self.entries.iter().any(|entry| entry.id == id) {
            return Vec::new();
        }
        let remaining: Vec<Value> = self
            .selector
            .output()
            .iter()
            .filter(|existing| **existing != id)
            .map(|existing| existing.to_value())
            .collect();
        let mut events: Vec<ArrayEvent> = self
            .selector
            .set_value(&Value::Array(remaining))
            .into_iter()
            .map(ArrayEvent::Selector)
            .collect();
        self.drop_deselected();
        events.push(self.changed());
        events
    }

    pub fn fetch_data<S: PaginatedFetch + ?Sized>(
        &mut self,
        source: &mut S,
        page: PageRequest,
        sorter: &[SortKey],
        filters: &Record,
    ) -> Result<TableResult> {
        self.selector.fetch_data(source, page, sorter, filters)
    }

    fn drop_deselected(&mut self) -> bool {
        let before = self.entries.len();
        let output = self.selector.output();
        self.entries.retain(|entry| output.contains(&entry.id));
        let dropped = self.entries.len() != before;
        renumber(&mut self.entries);
        dropped
    }

    fn changed(&self) -> ArrayEvent {
        ArrayEvent::Changed(self.entries.clone())
    }
}

fn position_sequence(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

fn renumber(entries: &mut [ArrayEntry]) {
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.sequence = position_sequence(index);
    }
}

#[cfg(test)]
mod tests {
    use super::{ArrayCommand, ArrayEntry, ArrayEvent, ArraySelector};
    use crate::fetch::Page;
    use crate::ids::EntityId;
    use crate::model::{Record, RemoteBinding};
    use crate::selector::{ModalMode, NamesResponse, SelectorCommand, SelectorEvent};
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn selector() -> ArraySelector {
        ArraySelector::new(&RemoteBinding::new("voucher", "p1", "name$$Name"))
            .expect("valid binding")
    }

    fn vouchers(ids: &[i64]) -> Page {
        Page {
            data: ids
                .iter()
                .map(|id| record(json!({"id": id, "name": format!("v{id}"), "price": 100})))
                .collect(),
            count: ids.len() as u64,
        }
    }

    fn settle(array: &mut ArraySelector, events: Vec<ArrayEvent>, ids: &[i64]) {
        for event in events {
            if let ArrayEvent::Selector(SelectorEvent::NamesRequested(request)) = event {
                array.apply_fetch(NamesResponse {
                    version: request.version,
                    page: Ok(vouchers(ids)),
                });
            }
        }
    }

    fn ids_and_sequences(array: &ArraySelector) -> Vec<(i64, u32)> {
        array
            .entries()
            .iter()
            .map(|entry| (entry.id.get(), entry.sequence))
            .collect()
    }

    fn assert_dense(array: &ArraySelector) {
        let mut sequences: Vec<u32> = array.entries().iter().map(|entry| entry.sequence).collect();
        sequences.sort_unstable();
        let expected: Vec<u32> = (1..=array.entries().len() as u32).collect();
        assert_eq!(sequences, expected);
    }

    #[test]
    fn move_renumbers_to_new_positions() {
        let mut array = selector();
        let events = array.set_value(&json!([1, 2, 3]));
        settle(&mut array, events, &[1, 2, 3]);
        assert_eq!(ids_and_sequences(&array), vec![(1, 1), (2, 2), (3, 3)]);

        let events = array.dispatch(ArrayCommand::Move {
            old_index: 2,
            new_index: 0,
        });
        assert_eq!(ids_and_sequences(&array), vec![(3, 1), (1, 2), (2, 3)]);
        assert!(matches!(events.last(), Some(ArrayEvent::Changed(_))));
        assert_eq!(
            array.selector().output(),
            &[EntityId::new(3), EntityId::new(1), EntityId::new(2)]
        );
    }

    #[test]
    fn reorder_reaches_output_when_an_entity_is_gone() {
        let mut array = selector();
        let events = array.set_value(&json!([1, 2, 3]));
        settle(&mut array, events, &[1, 2]);
        assert_eq!(ids_and_sequences(&array), vec![(1, 1), (2, 2)]);

        array.dispatch(ArrayCommand::Move {
            old_index: 1,
            new_index: 0,
        });
        assert_eq!(ids_and_sequences(&array), vec![(2, 1), (1, 2)]);
        assert_eq!(
            array.selector().output(),
            &[EntityId::new(2), EntityId::new(1), EntityId::new(3)]
        );
        assert_eq!(array.selector().value(), json!([2, 1, 3]));
    }

    #[test]
    fn refetch_keeps_edits_for_surviving_ids() {
        let mut array = selector();
        let events = array.set_value(&json!([1, 2]));
        settle(&mut array, events, &[1, 2]);
        array.dispatch(ArrayCommand::Update {
            id: EntityId::new(2),
            patch: record(json!({"price": 55, "sequence": 9})),
        });

        let events = array.set_value(&json!([2, 4]));
        settle(&mut array, events, &[2, 4]);

        assert_eq!(ids_and_sequences(&array), vec![(2, 1), (4, 2)]);
        assert_eq!(array.entries()[0].fields.get("price"), Some(&json!(55)));
        assert_eq!(array.entries()[1].fields.get("price"), Some(&json!(100)));
    }

    #[test]
    fn stale_fetch_does_not_add_entries() {
        let mut array = selector();
        let first = array.set_value(&json!([1, 2]));
        let second = array.set_value(&json!([3]));
        settle(&mut array, second, &[3]);
        settle(&mut array, first, &[1, 2]);

        assert_eq!(ids_and_sequences(&array), vec![(3, 1)]);
        assert_eq!(array.selector().display_text(), "v3");
    }

    #[test]
    fn confirm_drops_deselected_immediately() {
        let mut array = selector();
        let events = array.set_value(&json!([1, 2, 3]));
        settle(&mut array, events, &[1, 2, 3]);

        array.dispatch(ArrayCommand::Selector(SelectorCommand::Toggle(
            ModalMode::Select,
        )));
        array.dispatch(ArrayCommand::Selector(SelectorCommand::Check {
            id: EntityId::new(1),
            checked: false,
        }));
        array.dispatch(ArrayCommand::Selector(SelectorCommand::Check {
            id: EntityId::new(5),
            checked: true,
        }));
        let events = array.dispatch(ArrayCommand::Selector(SelectorCommand::Confirm));
        assert!(
            events
                .iter()
                .any(|event| matches!(event, ArrayEvent::Changed(entries) if entries.len() == 2))
        );
        assert_eq!(ids_and_sequences(&array), vec![(2, 1), (3, 2)]);

        settle(&mut array, events, &[2, 3, 5]);
        assert_eq!(ids_and_sequences(&array), vec![(2, 1), (3, 2), (5, 3)]);
    }

    #[test]
    fn sequences_stay_dense_through_mixed_operations() {
        let mut array = selector();
        let events = array.set_value(&json!([10, 20, 30, 40]));
        settle(&mut array, events, &[10, 20, 30, 40]);
        assert_dense(&array);

        array.dispatch(ArrayCommand::Move {
            old_index: 0,
            new_index: 3,
        });
        assert_dense(&array);
        array.dispatch(ArrayCommand::Remove(EntityId::new(30)));
        assert_dense(&array);
        let events = array.set_value(&json!([20, 40, 10, 50]));
        settle(&mut array, events, &[20, 40, 10, 50]);
        assert_dense(&array);
        array.dispatch(ArrayCommand::Move {
            old_index: 3,
            new_index: 1,
        });
        assert_dense(&array);
        assert_eq!(array.entries().len(), 4);
    }

    #[test]
    fn entry_records_replace_the_list() {
        let mut array = selector();
        let events = array.set_value(&json!([
            {"id": 7, "sequence": 2, "name": "b"},
            {"id": 6, "sequence": 1, "name": "a"},
        ]));
        assert!(matches!(events.last(), Some(ArrayEvent::Changed(_))));
        assert_eq!(ids_and_sequences(&array), vec![(6, 1), (7, 2)]);
        assert_eq!(
            array.to_value(),
            json!([
                {"id": 6, "sequence": 1, "name": "a"},
                {"id": 7, "sequence": 2, "name": "b"},
            ])
        );
        assert_eq!(
            ArrayEntry::from_record(&record(json!({"id": 6, "sequence": 1, "name": "a"})))
                .map(|entry| entry.fields),
            Some(record(json!({"name": "a"})))
        );
    }
}
