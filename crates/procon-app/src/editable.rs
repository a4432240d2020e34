// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Inline cell editing for schema tables.
//!
//! A cell is `Viewing` until clicked. Blur or Enter validates the pending
//! input; a valid value replaces the owning row (copy-on-write) and returns
//! the cell to `Viewing`, an invalid one keeps the cell `Editing` and records
//! the errors in the table's [`ErrorSummary`].

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::ids::EntityId;
use crate::model::{DataIndex, FieldDescriptor, Record};
use crate::rules::{self, FieldError};
use crate::schema::SchemaIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellState {
    Viewing,
    Editing {
        pending: String,
        errors: Vec<FieldError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableCell {
    pub row: EntityId,
    pub field: String,
    pub state: CellState,
}

impl EditableCell {
    pub fn is_editing(&self) -> bool {
        matches!(self.state, CellState::Editing { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellCommand {
    Click,
    Input(String),
    Blur,
    Enter,
    Escape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    EditStarted {
        row: EntityId,
        field: String,
    },
    Committed {
        row: EntityId,
        field: String,
        value: Value,
    },
    RowsChanged(Vec<Record>),
    ValidationFailed {
        row: EntityId,
        field: String,
        errors: Vec<FieldError>,
    },
    EditCancelled {
        row: EntityId,
        field: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub row: EntityId,
    pub field: String,
    pub message: String,
}

/// Outstanding validation errors across the whole table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSummary {
    entries: Vec<SummaryEntry>,
}

impl ErrorSummary {
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| format!("row {} {}: {}", entry.row, entry.field, entry.message))
            .collect()
    }

    fn set(&mut self, row: EntityId, field: &str, errors: &[FieldError]) {
        self.clear(row, field);
        self.entries
            .extend(errors.iter().map(|error| SummaryEntry {
                row,
                field: field.to_owned(),
                message: error.message.clone(),
            }));
    }

    fn clear(&mut self, row: EntityId, field: &str) {
        self.entries
            .retain(|entry| entry.row != row || entry.field != field);
    }

    fn retain_rows(&mut self, keep: impl Fn(EntityId) -> bool) {
        self.entries.retain(|entry| keep(entry.row));
    }
}

type CellKey = (EntityId, String);

#[derive(Debug, Clone)]
pub struct EditableTable {
    index: Arc<SchemaIndex>,
    rows: Vec<Record>,
    cells: BTreeMap<CellKey, EditableCell>,
    errors: ErrorSummary,
}

impl EditableTable {
    pub fn new(index: Arc<SchemaIndex>, rows: Vec<Record>) -> Self {
        Self {
            index,
            rows,
            cells: BTreeMap::new(),
            errors: ErrorSummary::default(),
        }
    }

    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn errors(&self) -> &ErrorSummary {
        &self.errors
    }

    pub fn cell(&self, row: EntityId, field: &str) -> Option<&EditableCell> {
        self.cells.get(&(row, field.to_owned()))
    }

    pub fn is_editing(&self, row: EntityId, field: &str) -> bool {
        self.cell(row, field).is_some_and(EditableCell::is_editing)
    }

    pub fn row(&self, id: EntityId) -> Option<&Record> {
        self.rows.iter().find(|row| row_id(row) == Some(id))
    }

    /// Replaces the dataset. Cells and errors of rows that left it are
    /// dropped.
    pub fn set_rows(&mut self, rows: Vec<Record>) {
        self.rows = rows;
        let live: Vec<EntityId> = self.rows.iter().filter_map(row_id).collect();
        self.cells.retain(|(row, _), _| live.contains(row));
        self.errors.retain_rows(|row| live.contains(&row));
    }

    pub fn dispatch(
        &mut self,
        row: EntityId,
        field: &str,
        command: CellCommand,
    ) -> Vec<TableEvent> {
        match command {
            CellCommand::Click => self.start_edit(row, field),
            CellCommand::Input(text) => {
                if let Some(CellState::Editing { pending, .. }) = self
                    .cells
                    .get_mut(&(row, field.to_owned()))
                    .map(|cell| &mut cell.state)
                {
                    *pending = text;
                }
                Vec::new()
            }
            CellCommand::Blur | CellCommand::Enter => self.commit(row, field),
            CellCommand::Escape => self.cancel(row, field),
        }
    }

    /// Merges `record` into the row with the same id and publishes the new
    /// dataset. Rows are replaced, never mutated in place.
    pub fn handle_save(&mut self, record: Record) -> Vec<TableEvent> {
        let Some(id) = row_id(&record) else {
            debug!("ignoring save of a row without id");
            return Vec::new();
        };
        if self.row(id).is_none() {
            debug!(%id, "ignoring save of unknown row");
            return Vec::new();
        }
        self.rows = self
            .rows
            .iter()
            .map(|row| {
                if row_id(row) != Some(id) {
                    return row.clone();
                }
                let mut merged = row.clone();
                merged.extend(record.clone());
                merged
            })
            .collect();
        vec![TableEvent::RowsChanged(self.rows.clone())]
    }

    fn start_edit(&mut self, row: EntityId, field: &str) -> Vec<TableEvent> {
        let Some(descriptor) = self.index.get(field).filter(|field| field.editable) else {
            return Vec::new();
        };
        let Some(record) = self.row(row) else {
            return Vec::new();
        };
        if self.is_editing(row, field) {
            return Vec::new();
        }
        let pending = rules::input_text(descriptor.value_in(record));
        self.cells.insert(
            (row, field.to_owned()),
            EditableCell {
                row,
                field: field.to_owned(),
                state: CellState::Editing {
                    pending,
                    errors: Vec::new(),
                },
            },
        );
        vec![TableEvent::EditStarted {
            row,
            field: field.to_owned(),
        }]
    }

    fn commit(&mut self, row: EntityId, field: &str) -> Vec<TableEvent> {
        let key = (row, field.to_owned());
        let Some(CellState::Editing { pending, .. }) =
            self.cells.get(&key).map(|cell| cell.state.clone())
        else {
            return Vec::new();
        };
        let (Some(descriptor), Some(record)) = (self.index.get(field), self.row(row)) else {
            self.cells.remove(&key);
            return Vec::new();
        };

        let patch = match validated_patch(&self.index, descriptor, &pending, record) {
            Ok(patch) => patch,
            Err(errors) => {
                self.errors.set(row, field, &errors);
                if let Some(cell) = self.cells.get_mut(&key) {
                    cell.state = CellState::Editing {
                        pending,
                        errors: errors.clone(),
                    };
                }
                return vec![TableEvent::ValidationFailed {
                    row,
                    field: field.to_owned(),
                    errors,
                }];
            }
        };

        let value = descriptor.value_in(&patch).cloned().unwrap_or(Value::Null);
        if let Some(cell) = self.cells.get_mut(&key) {
            cell.state = CellState::Viewing;
        }
        self.errors.clear(row, field);
        let mut events = vec![TableEvent::Committed {
            row,
            field: field.to_owned(),
            value,
        }];
        events.extend(self.handle_save(patch));
        events
    }

    fn cancel(&mut self, row: EntityId, field: &str) -> Vec<TableEvent> {
        let key = (row, field.to_owned());
        let Some(cell) = self.cells.get_mut(&key) else {
            return Vec::new();
        };
        if !cell.is_editing() {
            return Vec::new();
        }
        cell.state = CellState::Viewing;
        self.errors.clear(row, field);
        vec![TableEvent::EditCancelled {
            row,
            field: field.to_owned(),
        }]
    }
}

/// The full row with the edited value (and its mirror) applied, or the
/// field errors that block the commit. A mirrored value must pass the rules
/// of the field it lands in.
fn validated_patch(
    index: &SchemaIndex,
    descriptor: &FieldDescriptor,
    pending: &str,
    record: &Record,
) -> Result<Record, Vec<FieldError>> {
    let kind = descriptor.value_type.resolve(record).kind;
    let value = rules::coerce_input(descriptor, kind, pending).map_err(|error| vec![error])?;
    let errors = rules::validate_field(descriptor, &value, record);
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut patch = record.clone();
    let mirrored = descriptor
        .mirror
        .as_ref()
        .and_then(|mirror| Some((mirror, mirror.derive(&value, record)?)));
    descriptor.data_index.set(&mut patch, value);
    if let Some((mirror, mirrored)) = mirrored {
        DataIndex::parse(&mirror.field).set(&mut patch, mirrored.clone());
        if let Some(target) = index.get(&mirror.field) {
            let errors = rules::validate_field(target, &mirrored, &patch);
            if !errors.is_empty() {
                debug!(field = %mirror.field, "mirrored value rejected");
                return Err(errors);
            }
        }
    }
    Ok(patch)
}

fn row_id(row: &Record) -> Option<EntityId> {
    row.get("id").and_then(EntityId::from_value)
}

#[cfg(test)]
mod tests {
    use super::{CellCommand, CellState, EditableTable, TableEvent};
    use crate::ids::EntityId;
    use crate::model::{FieldDescriptor, Record, ValueType};
    use crate::rules::{Mirror, Rule, TierRule};
    use crate::schema::SchemaIndex;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn table() -> EditableTable {
        let index = SchemaIndex::build(vec![
            FieldDescriptor::new("name", "Name"),
            FieldDescriptor::new("listPrice", "List price").value_type(ValueType::Money),
            FieldDescriptor::new("salePrice", "Sale price")
                .value_type(ValueType::Money)
                .editable()
                .rule(Rule::Required)
                .rule(Rule::LessThanField {
                    field: "listPrice".to_owned(),
                })
                .rule(Rule::DiscountFloor {
                    list_field: "listPrice".to_owned(),
                    min_percent: Some(5.0),
                })
                .mirror(Mirror::percent_from_price("discountPercent", "listPrice")),
            FieldDescriptor::new("discountPercent", "Discount")
                .value_type(ValueType::Percent)
                .editable()
                .rule(Rule::PercentFloor {
                    min_percent: Some(5.0),
                })
                .mirror(Mirror::price_from_percent("salePrice", "listPrice")),
            FieldDescriptor::new("priceTiers", "Tiers")
                .editable()
                .rule(Rule::Tiers(TierRule::default())),
        ])
        .expect("valid schema");
        EditableTable::new(
            Arc::new(index),
            vec![
                record(json!({"id": 1, "name": "a", "listPrice": 100, "salePrice": 90, "discountPercent": 10})),
                record(json!({"id": 2, "name": "b", "listPrice": 50, "salePrice": 40, "discountPercent": 20})),
            ],
        )
    }

    const ROW: EntityId = EntityId::new(1);

    #[test]
    fn invalid_edit_stays_editing_and_valid_edit_commits() {
        let mut table = table();
        let before = table.rows().to_vec();

        assert_eq!(
            table.dispatch(ROW, "salePrice", CellCommand::Click),
            vec![TableEvent::EditStarted {
                row: ROW,
                field: "salePrice".to_owned(),
            }]
        );
        table.dispatch(ROW, "salePrice", CellCommand::Input("100".to_owned()));
        let events = table.dispatch(ROW, "salePrice", CellCommand::Blur);
        assert!(matches!(events[0], TableEvent::ValidationFailed { .. }));
        assert_eq!(table.rows(), before.as_slice());
        assert!(table.is_editing(ROW, "salePrice"));
        let Some(CellState::Editing { errors, .. }) =
            table.cell(ROW, "salePrice").map(|cell| cell.state.clone())
        else {
            panic!("cell should still be editing");
        };
        assert!(!errors.is_empty());
        assert!(!table.errors().is_empty());

        table.dispatch(ROW, "salePrice", CellCommand::Input("80".to_owned()));
        let events = table.dispatch(ROW, "salePrice", CellCommand::Enter);
        assert_eq!(
            events[0],
            TableEvent::Committed {
                row: ROW,
                field: "salePrice".to_owned(),
                value: json!(80),
            }
        );
        assert!(matches!(events[1], TableEvent::RowsChanged(_)));
        assert!(!table.is_editing(ROW, "salePrice"));
        assert!(table.errors().is_empty());
        let row = table.row(ROW).expect("row exists");
        assert_eq!(row.get("salePrice"), Some(&json!(80)));
        assert_eq!(row.get("discountPercent"), Some(&json!(20)));
    }

    #[test]
    fn percent_edit_recomputes_price() {
        let mut table = table();
        table.dispatch(ROW, "discountPercent", CellCommand::Click);
        table.dispatch(ROW, "discountPercent", CellCommand::Input("25".to_owned()));
        table.dispatch(ROW, "discountPercent", CellCommand::Enter);
        let row = table.row(ROW).expect("row exists");
        assert_eq!(row.get("discountPercent"), Some(&json!(25)));
        assert_eq!(row.get("salePrice"), Some(&json!(75)));
    }

    #[test]
    fn mirrored_value_must_pass_its_own_rules() {
        let index = SchemaIndex::build(vec![
            FieldDescriptor::new("listPrice", "List price").value_type(ValueType::Money),
            FieldDescriptor::new("salePrice", "Sale price")
                .value_type(ValueType::Money)
                .editable()
                .rule(Rule::LessThanField {
                    field: "listPrice".to_owned(),
                }),
            FieldDescriptor::new("discountPercent", "Discount")
                .value_type(ValueType::Percent)
                .editable()
                .rule(Rule::PercentFloor { min_percent: None })
                .mirror(Mirror::price_from_percent("salePrice", "listPrice")),
        ])
        .expect("valid schema");
        let row = record(json!({"id": 1, "listPrice": 100, "salePrice": 90, "discountPercent": 10}));
        let mut table = EditableTable::new(Arc::new(index), vec![row.clone()]);

        table.dispatch(ROW, "discountPercent", CellCommand::Click);
        table.dispatch(ROW, "discountPercent", CellCommand::Input("0".to_owned()));
        let events = table.dispatch(ROW, "discountPercent", CellCommand::Enter);
        let [TableEvent::ValidationFailed { errors, .. }] = events.as_slice() else {
            panic!("expected a single validation failure, got {events:?}");
        };
        assert_eq!(errors[0].field, "salePrice");
        assert_eq!(errors[0].message, "must be smaller than listPrice");
        assert!(table.is_editing(ROW, "discountPercent"));
        assert_eq!(table.rows(), &[row]);

        table.dispatch(ROW, "discountPercent", CellCommand::Input("30".to_owned()));
        table.dispatch(ROW, "discountPercent", CellCommand::Enter);
        let saved = table.row(ROW).expect("row exists");
        assert_eq!(saved.get("salePrice"), Some(&json!(70)));
        assert!(table.errors().is_empty());
    }

    #[test]
    fn discount_floor_blocks_small_discounts() {
        let mut table = table();
        table.dispatch(ROW, "salePrice", CellCommand::Click);
        table.dispatch(ROW, "salePrice", CellCommand::Input("97".to_owned()));
        let events = table.dispatch(ROW, "salePrice", CellCommand::Enter);
        let TableEvent::ValidationFailed { errors, .. } = &events[0] else {
            panic!("expected validation failure, got {events:?}");
        };
        assert_eq!(errors[0].message, "discount must be at least 5%");
    }

    #[test]
    fn tier_price_must_decrease() {
        let mut table = table();
        table.dispatch(ROW, "priceTiers", CellCommand::Click);
        table.dispatch(
            ROW,
            "priceTiers",
            CellCommand::Input(
                r#"[{"countMin":2,"countMax":5,"price":1000},{"countMin":6,"countMax":9,"price":1200}]"#
                    .to_owned(),
            ),
        );
        let events = table.dispatch(ROW, "priceTiers", CellCommand::Enter);
        let TableEvent::ValidationFailed { errors, .. } = &events[0] else {
            panic!("expected validation failure, got {events:?}");
        };
        assert!(errors[0].message.contains("price must be smaller than previous tier"));
    }

    #[test]
    fn escape_abandons_edit_and_clears_errors() {
        let mut table = table();
        table.dispatch(ROW, "salePrice", CellCommand::Click);
        table.dispatch(ROW, "salePrice", CellCommand::Input("abc".to_owned()));
        table.dispatch(ROW, "salePrice", CellCommand::Blur);
        assert_eq!(table.errors().len(), 1);

        let events = table.dispatch(ROW, "salePrice", CellCommand::Escape);
        assert_eq!(
            events,
            vec![TableEvent::EditCancelled {
                row: ROW,
                field: "salePrice".to_owned(),
            }]
        );
        assert!(table.errors().is_empty());
        assert_eq!(
            table.row(ROW).and_then(|row| row.get("salePrice")),
            Some(&json!(90))
        );
    }

    #[test]
    fn read_only_fields_do_not_enter_edit() {
        let mut table = table();
        assert!(table.dispatch(ROW, "name", CellCommand::Click).is_empty());
        assert!(table.cell(ROW, "name").is_none());
    }

    #[test]
    fn removed_rows_drop_their_cells() {
        let mut table = table();
        let other = EntityId::new(2);
        table.dispatch(other, "salePrice", CellCommand::Click);
        table.dispatch(other, "salePrice", CellCommand::Input("x".to_owned()));
        table.dispatch(other, "salePrice", CellCommand::Blur);
        assert!(table.cell(other, "salePrice").is_some());

        let keep = table.rows()[..1].to_vec();
        table.set_rows(keep);
        assert!(table.cell(other, "salePrice").is_none());
        assert!(table.errors().is_empty());
    }

    #[test]
    fn handle_save_replaces_only_the_matching_row() {
        let mut table = table();
        let untouched = table.rows()[1].clone();
        let events = table.handle_save(record(json!({"id": 1, "name": "renamed"})));
        assert_eq!(events.len(), 1);
        assert_eq!(
            table.row(ROW).and_then(|row| row.get("name")),
            Some(&json!("renamed"))
        );
        assert_eq!(table.rows()[1], untouched);
        assert!(table.handle_save(record(json!({"id": 99}))).is_empty());
    }
}
