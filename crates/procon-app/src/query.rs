// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dates::{self, DateLayout};
use crate::model::{FieldDescriptor, Record, SortKey, SortOrder};
use crate::schema::SchemaIndex;

/// How date-typed form values are written into a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateFormatter {
    #[default]
    String,
    /// Epoch milliseconds.
    Number,
    Keep,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormQuery {
    pub filter: Record,
    pub sort: Vec<SortKey>,
}

/// Turns search-form values into a backend filter.
#[derive(Debug, Clone, Copy)]
pub struct FormQueryBuilder<'a> {
    index: &'a SchemaIndex,
    formatter: DateFormatter,
}

impl<'a> FormQueryBuilder<'a> {
    pub fn new(index: &'a SchemaIndex, formatter: DateFormatter) -> Self {
        Self { index, formatter }
    }

    /// Filter part of the query. Running it on its own output is a no-op.
    pub fn build(&self, values: &Record) -> Record {
        let mut filter = Record::new();
        for (key, value) in values {
            let field = self.index.get(key);
            if is_dropped(field, value) {
                continue;
            }
            let converted = match field {
                Some(field) => self.convert(field, value, values),
                None => value.clone(),
            };
            filter.insert(key.clone(), converted);
        }
        filter
    }

    pub fn build_query(&self, values: &Record, sorter: &[(String, SortOrder)]) -> FormQuery {
        FormQuery {
            filter: self.build(values),
            sort: sorter
                .iter()
                .map(|(field, order)| SortKey::new(field, *order))
                .collect(),
        }
    }

    fn convert(&self, field: &FieldDescriptor, value: &Value, values: &Record) -> Value {
        let kind = field.value_type.resolve(values).kind;
        let Some(layout) = DateLayout::for_value_type(kind) else {
            return value.clone();
        };
        match value {
            Value::Array(endpoints) if kind.is_range() && endpoints.len() == 2 => Value::Array(
                endpoints
                    .iter()
                    .map(|endpoint| self.convert_date(endpoint, layout))
                    .collect(),
            ),
            Value::Array(_) => value.clone(),
            single => self.convert_date(single, layout),
        }
    }

    fn convert_date(&self, value: &Value, layout: DateLayout) -> Value {
        match self.formatter {
            DateFormatter::Keep => value.clone(),
            DateFormatter::String => dates::format_date_value(value, layout)
                .map_or_else(|| value.clone(), Value::String),
            DateFormatter::Number => dates::parse_date_value(value)
                .map(|parsed| Value::from(dates::epoch_millis(parsed)))
                .unwrap_or_else(|| value.clone()),
        }
    }
}

fn is_dropped(field: Option<&FieldDescriptor>, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) if text.trim().is_empty() => true,
        Value::String(text) if text == "all" => {
            field.is_some_and(|field| field.value_enum.is_some())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{DateFormatter, FormQueryBuilder};
    use crate::model::{FieldDescriptor, Record, SortOrder, ValueEnum, ValueType};
    use crate::schema::SchemaIndex;
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn schema() -> SchemaIndex {
        SchemaIndex::build(vec![
            FieldDescriptor::new("name", "Name"),
            FieldDescriptor::new("status", "Status")
                .value_enum(ValueEnum::new([("all", "All"), ("1", "Open")])),
            FieldDescriptor::new("kind", "Kind"),
            FieldDescriptor::new("createdAt", "Created").value_type(ValueType::DateTimeRange),
            FieldDescriptor::new("day", "Day").value_type(ValueType::Date),
            FieldDescriptor::new("at", "At").value_type(ValueType::Time),
        ])
        .expect("valid schema")
    }

    #[test]
    fn drops_nulls_and_enum_all_sentinel() {
        let index = schema();
        let builder = FormQueryBuilder::new(&index, DateFormatter::String);
        let filter = builder.build(&record(json!({
            "name": null,
            "status": "all",
            "kind": "all",
            "extra": 3,
        })));
        assert_eq!(filter, record(json!({"kind": "all", "extra": 3})));
    }

    #[test]
    fn drops_cleared_text_inputs() {
        let index = schema();
        let builder = FormQueryBuilder::new(&index, DateFormatter::String);
        let filter = builder.build(&record(json!({
            "name": "",
            "name2": "   ",
            "extra": " ann ",
        })));
        assert_eq!(filter, record(json!({"extra": " ann "})));
    }

    #[test]
    fn formats_dates_per_value_type() {
        let index = schema();
        let builder = FormQueryBuilder::new(&index, DateFormatter::String);
        let filter = builder.build(&record(json!({
            "createdAt": ["2026-01-02T00:00:00Z", "2026-01-09"],
            "day": "2026-03-04 10:11:12",
            "at": "2026-03-04T10:11:12Z",
        })));
        assert_eq!(
            filter,
            record(json!({
                "createdAt": ["2026-01-02 00:00:00", "2026-01-09 00:00:00"],
                "day": "2026-03-04",
                "at": "10:11:12",
            }))
        );
    }

    #[test]
    fn number_formatter_emits_epoch_millis() {
        let index = schema();
        let builder = FormQueryBuilder::new(&index, DateFormatter::Number);
        let filter = builder.build(&record(json!({"day": "1970-01-02"})));
        assert_eq!(filter.get("day"), Some(&json!(86_400_000)));
    }

    #[test]
    fn keep_formatter_leaves_dates_alone() {
        let index = schema();
        let builder = FormQueryBuilder::new(&index, DateFormatter::Keep);
        let values = record(json!({"day": "2026-03-04T10:11:12Z"}));
        assert_eq!(builder.build(&values), values);
    }

    #[test]
    fn build_is_idempotent() {
        let index = schema();
        for formatter in [
            DateFormatter::String,
            DateFormatter::Number,
            DateFormatter::Keep,
        ] {
            let builder = FormQueryBuilder::new(&index, formatter);
            let once = builder.build(&record(json!({
                "name": "ann",
                "status": "1",
                "createdAt": ["2026-01-02T05:00:00+02:00", 1_767_225_600_000_i64],
                "day": "2026-03-04",
                "at": "10:11:12",
                "name2": "",
            })));
            assert_eq!(builder.build(&once), once);
        }
    }

    #[test]
    fn sort_pairs_become_sort_keys() {
        let index = schema();
        let builder = FormQueryBuilder::new(&index, DateFormatter::String);
        let query = builder.build_query(
            &record(json!({"name": "x"})),
            &[("createdAt".to_owned(), SortOrder::Descend)],
        );
        assert_eq!(query.sort.len(), 1);
        assert_eq!(query.sort[0].order.as_backend(), "desc");
    }
}
