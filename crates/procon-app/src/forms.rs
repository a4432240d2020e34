// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{FieldDescriptor, Record, SortOrder, Surface, ValueType};
use crate::query::{DateFormatter, FormQuery, FormQueryBuilder};
use crate::render::{Rendered, RendererRegistry};
use crate::rules::{self, FieldError};
use crate::schema::{SchemaError, SchemaIndex};

pub const DEFAULT_COLLAPSED_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Number,
    Money,
    Percent,
    Date,
    DateRange,
    DateTime,
    DateTimeRange,
    Time,
    Switch,
    Select,
    Radio,
    RemoteSelect { multiple: bool },
    Code,
    Upload,
    ReadOnly,
}

impl InputKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Money => "money",
            Self::Percent => "percent",
            Self::Date => "date",
            Self::DateRange => "date range",
            Self::DateTime => "date time",
            Self::DateTimeRange => "date time range",
            Self::Time => "time",
            Self::Switch => "switch",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::RemoteSelect { multiple: false } => "remote select",
            Self::RemoteSelect { multiple: true } => "remote multi select",
            Self::Code => "code",
            Self::Upload => "upload",
            Self::ReadOnly => "read only",
        }
    }
}

/// Value type -> form input dispatch.
#[derive(Debug, Clone)]
pub struct InputRegistry {
    kinds: HashMap<ValueType, InputKind>,
    fallback: InputKind,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
            fallback: InputKind::Text,
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.init();
        registry
    }

    pub fn init(&mut self) {
        let builtins = [
            (ValueType::Text, InputKind::Text),
            (ValueType::Money, InputKind::Money),
            (ValueType::Date, InputKind::Date),
            (ValueType::DateRange, InputKind::DateRange),
            (ValueType::DateTime, InputKind::DateTime),
            (ValueType::DateTimeRange, InputKind::DateTimeRange),
            (ValueType::Time, InputKind::Time),
            (ValueType::Digit, InputKind::Number),
            (ValueType::Percent, InputKind::Percent),
            (ValueType::Progress, InputKind::Number),
            (ValueType::Avatar, InputKind::Upload),
            (ValueType::Code, InputKind::Code),
            (ValueType::Image, InputKind::Upload),
            (ValueType::Switch, InputKind::Switch),
            (ValueType::Radio, InputKind::Radio),
            (ValueType::RadioGroup, InputKind::Radio),
            (ValueType::Index, InputKind::ReadOnly),
            (ValueType::IndexBorder, InputKind::ReadOnly),
            (ValueType::Option, InputKind::Select),
        ];
        for (kind, input) in builtins {
            self.kinds.entry(kind).or_insert(input);
        }
    }

    pub fn dispose(&mut self) {
        self.kinds.clear();
    }

    pub fn register(&mut self, kind: ValueType, input: InputKind) {
        self.kinds.insert(kind, input);
    }

    /// Remote-bound fields always get a remote select and enumerated fields
    /// a select, whatever their value type says.
    pub fn input_for(&self, field: &FieldDescriptor, values: &Record) -> InputKind {
        if let Some(remote) = &field.remote {
            return InputKind::RemoteSelect {
                multiple: remote.multiple,
            };
        }
        let kind = field.value_type.resolve(values).kind;
        if field.value_enum.is_some() && !matches!(kind, ValueType::Radio | ValueType::RadioGroup)
        {
            return InputKind::Select;
        }
        self.kinds.get(&kind).copied().unwrap_or(self.fallback)
    }
}

impl Default for InputRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[derive(Debug, Clone)]
pub struct FormItem<'a> {
    pub field: &'a FieldDescriptor,
    pub input: InputKind,
    pub value: Value,
    pub display: Rendered,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    Query(FormQuery),
    Values(Record),
}

/// A search or edit form generated from a schema.
#[derive(Debug, Clone)]
pub struct FormEngine {
    index: Arc<SchemaIndex>,
    surface: Surface,
    values: Record,
    collapsed: bool,
    collapsed_count: usize,
    inputs: InputRegistry,
    formatter: DateFormatter,
    sorter: Vec<(String, SortOrder)>,
}

impl FormEngine {
    pub fn new(index: Arc<SchemaIndex>, surface: Surface) -> Self {
        let mut engine = Self {
            index,
            surface,
            values: Record::new(),
            collapsed: surface == Surface::Search,
            collapsed_count: DEFAULT_COLLAPSED_COUNT,
            inputs: InputRegistry::with_defaults(),
            formatter: DateFormatter::default(),
            sorter: Vec::new(),
        };
        engine.reset();
        engine
    }

    pub fn with_collapsed_count(mut self, count: usize) -> Self {
        self.collapsed_count = count;
        self
    }

    pub fn with_formatter(mut self, formatter: DateFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_inputs(mut self, inputs: InputRegistry) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn visible_fields(&self) -> Vec<&FieldDescriptor> {
        self.index.visible(self.surface).collect()
    }

    /// Number of fields the collapsed form currently hides.
    pub fn hidden_count(&self) -> usize {
        if !self.collapsed {
            return 0;
        }
        self.visible_fields()
            .len()
            .saturating_sub(self.collapsed_count)
    }

    pub fn toggle_collapse(&mut self) -> bool {
        self.collapsed = !self.collapsed;
        self.collapsed
    }

    pub fn items(&self, renderer: &RendererRegistry) -> Vec<FormItem<'_>> {
        let limit = if self.collapsed {
            self.collapsed_count
        } else {
            usize::MAX
        };
        self.index
            .visible(self.surface)
            .take(limit)
            .map(|field| {
                let key = field.key();
                let value = self.values.get(&key).cloned().unwrap_or(Value::Null);
                let display = renderer.render_field(field, &self.keyed_record(field), 0);
                FormItem {
                    field,
                    input: self.inputs.input_for(field, &self.values),
                    value,
                    display,
                }
            })
            .collect()
    }

    pub fn set_value(&mut self, key: &str, value: Value) -> Result<(), SchemaError> {
        self.index.require(key)?;
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    /// Parses typed text into `key`'s value.
    pub fn set_input(&mut self, key: &str, input: &str) -> Result<(), FieldError> {
        let field = self
            .index
            .get(key)
            .ok_or_else(|| FieldError::new(key, "unknown field"))?;
        let kind = field.value_type.resolve(&self.values).kind;
        let value = rules::coerce_input(field, kind, input)?;
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    pub fn set_sort(&mut self, field: &str, order: SortOrder) {
        self.sorter.retain(|(existing, _)| existing != field);
        self.sorter.push((field.to_owned(), order));
    }

    /// Back to each field's initial value; fields without one are cleared.
    pub fn reset(&mut self) {
        self.values = self
            .index
            .visible(self.surface)
            .map(|field| {
                (
                    field.key(),
                    field.initial_value.clone().unwrap_or(Value::Null),
                )
            })
            .collect();
        self.sorter.clear();
    }

    /// Search forms produce a query; edit forms validate every visible field
    /// and produce the value record.
    pub fn submit(&self) -> Result<FormOutcome, Vec<FieldError>> {
        match self.surface {
            Surface::Search | Surface::Table => {
                let builder = FormQueryBuilder::new(&self.index, self.formatter);
                Ok(FormOutcome::Query(
                    builder.build_query(&self.values, &self.sorter),
                ))
            }
            Surface::Form => {
                let errors: Vec<FieldError> = self
                    .index
                    .visible(Surface::Form)
                    .flat_map(|field| {
                        let value = self
                            .values
                            .get(&field.key())
                            .cloned()
                            .unwrap_or(Value::Null);
                        rules::validate_field(field, &value, &self.values)
                    })
                    .collect();
                if !errors.is_empty() {
                    return Err(errors);
                }
                Ok(FormOutcome::Values(self.values.clone()))
            }
        }
    }

    /// Form values addressed the way `field`'s data index expects.
    fn keyed_record(&self, field: &FieldDescriptor) -> Record {
        let mut record = self.values.clone();
        if let Some(value) = self.values.get(&field.key()) {
            field.data_index.set(&mut record, value.clone());
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::{FormEngine, FormOutcome, InputKind, InputRegistry};
    use crate::model::{
        FieldDescriptor, RemoteBinding, SortOrder, Surface, ValueEnum, ValueType,
    };
    use crate::render::{Rendered, RendererRegistry};
    use crate::rules::Rule;
    use crate::schema::SchemaIndex;
    use serde_json::json;
    use std::sync::Arc;

    fn index() -> Arc<SchemaIndex> {
        Arc::new(
            SchemaIndex::build(vec![
                FieldDescriptor::new("id", "ID").hide_in_form(),
                FieldDescriptor::new("name", "Name").rule(Rule::Required),
                FieldDescriptor::new("status", "Status")
                    .value_enum(ValueEnum::new([("all", "All"), ("1", "Open")]))
                    .initial_value(json!("all")),
                FieldDescriptor::new("price", "Price")
                    .value_type(ValueType::Money)
                    .rule(Rule::Min(0.0)),
                FieldDescriptor::new("createdAt", "Created").value_type(ValueType::DateRange),
                FieldDescriptor::new("games", "Games")
                    .remote(RemoteBinding::new("game", "p1", "name$$Name").multiple()),
            ])
            .expect("valid schema"),
        )
    }

    #[test]
    fn search_form_collapses_secondary_fields() {
        let mut form = FormEngine::new(index(), Surface::Search);
        let renderer = RendererRegistry::default();
        assert!(form.is_collapsed());
        assert_eq!(form.items(&renderer).len(), 3);
        assert_eq!(form.hidden_count(), 3);

        assert!(!form.toggle_collapse());
        assert_eq!(form.items(&renderer).len(), 6);
        assert_eq!(form.hidden_count(), 0);
    }

    #[test]
    fn inputs_follow_value_type_enum_and_remote_binding() {
        let form = FormEngine::new(index(), Surface::Form).with_collapsed_count(10);
        let renderer = RendererRegistry::default();
        let inputs: Vec<(String, InputKind)> = form
            .items(&renderer)
            .into_iter()
            .map(|item| (item.field.key(), item.input))
            .collect();
        assert_eq!(
            inputs,
            vec![
                ("name".to_owned(), InputKind::Text),
                ("status".to_owned(), InputKind::Select),
                ("price".to_owned(), InputKind::Money),
                ("createdAt".to_owned(), InputKind::DateRange),
                ("games".to_owned(), InputKind::RemoteSelect { multiple: true }),
            ]
        );
    }

    #[test]
    fn search_submit_builds_query_without_sentinels() {
        let mut form = FormEngine::new(index(), Surface::Search);
        form.set_value("name", json!("gold")).expect("known field");
        form.set_value("createdAt", json!(["2026-01-01T10:00:00Z", "2026-01-31"]))
            .expect("known field");
        form.set_sort("price", SortOrder::Descend);

        let Ok(FormOutcome::Query(query)) = form.submit() else {
            panic!("search submit should produce a query");
        };
        assert_eq!(query.filter.get("status"), None);
        assert_eq!(query.filter.get("name"), Some(&json!("gold")));
        assert_eq!(
            query.filter.get("createdAt"),
            Some(&json!(["2026-01-01", "2026-01-31"]))
        );
        assert_eq!(query.sort[0].field, "price");
    }

    #[test]
    fn edit_submit_validates_rules() {
        let mut form = FormEngine::new(index(), Surface::Form);
        form.set_input("price", "-3").expect("number parses");
        let errors = form.submit().expect_err("invalid form");
        let fields: Vec<&str> = errors.iter().map(|error| error.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "price"]);

        form.set_value("name", json!("ok")).expect("known field");
        form.set_input("price", "12.5").expect("number parses");
        let Ok(FormOutcome::Values(values)) = form.submit() else {
            panic!("valid form should submit");
        };
        assert_eq!(values.get("price"), Some(&json!(12.5)));
    }

    #[test]
    fn reset_restores_initial_values_and_rejects_unknown_keys() {
        let mut form = FormEngine::new(index(), Surface::Search);
        form.set_value("status", json!("1")).expect("known field");
        form.reset();
        assert_eq!(form.value("status"), Some(&json!("all")));
        assert!(form.set_value("nope", json!(1)).is_err());
    }

    #[test]
    fn items_render_read_only_display() {
        let mut form = FormEngine::new(index(), Surface::Form).with_collapsed_count(10);
        form.set_value("price", json!(1234)).expect("known field");
        let renderer = RendererRegistry::default();
        let items = form.items(&renderer);
        let price = items
            .iter()
            .find(|item| item.field.key() == "price")
            .expect("price item");
        assert_eq!(price.display, Rendered::Text("¥1,234.00".to_owned()));
    }

    #[test]
    fn disposed_input_registry_falls_back_to_text() {
        let mut inputs = InputRegistry::with_defaults();
        inputs.dispose();
        let field = FieldDescriptor::new("price", "Price").value_type(ValueType::Money);
        assert_eq!(inputs.input_for(&field, &Default::default()), InputKind::Text);
    }
}
