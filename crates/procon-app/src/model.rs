// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::rules::{Mirror, Rule};
use crate::schema::SchemaError;

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    Text,
    Money,
    Date,
    DateRange,
    DateTime,
    DateTimeRange,
    Time,
    Digit,
    Percent,
    Progress,
    Avatar,
    Code,
    Image,
    Switch,
    Radio,
    RadioGroup,
    Index,
    IndexBorder,
    Option,
}

impl ValueType {
    pub const ALL: [Self; 19] = [
        Self::Text,
        Self::Money,
        Self::Date,
        Self::DateRange,
        Self::DateTime,
        Self::DateTimeRange,
        Self::Time,
        Self::Digit,
        Self::Percent,
        Self::Progress,
        Self::Avatar,
        Self::Code,
        Self::Image,
        Self::Switch,
        Self::Radio,
        Self::RadioGroup,
        Self::Index,
        Self::IndexBorder,
        Self::Option,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Money => "money",
            Self::Date => "date",
            Self::DateRange => "dateRange",
            Self::DateTime => "dateTime",
            Self::DateTimeRange => "dateTimeRange",
            Self::Time => "time",
            Self::Digit => "digit",
            Self::Percent => "percent",
            Self::Progress => "progress",
            Self::Avatar => "avatar",
            Self::Code => "code",
            Self::Image => "image",
            Self::Switch => "switch",
            Self::Radio => "radio",
            Self::RadioGroup => "radioGroup",
            Self::Index => "index",
            Self::IndexBorder => "indexBorder",
            Self::Option => "option",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub const fn is_date(self) -> bool {
        matches!(
            self,
            Self::Date | Self::DateRange | Self::DateTime | Self::DateTimeRange | Self::Time
        )
    }

    pub const fn is_range(self) -> bool {
        matches!(self, Self::DateRange | Self::DateTimeRange)
    }

    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Money | Self::Digit | Self::Percent | Self::Progress
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressStatus {
    Success,
    Exception,
    Active,
}

impl ProgressStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Exception => "exception",
            Self::Active => "active",
        }
    }
}

/// Per-row rendering overrides that travel with a resolved value type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderOptions {
    pub precision: Option<u8>,
    pub status: Option<ProgressStatus>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValueType {
    pub kind: ValueType,
    pub options: RenderOptions,
}

impl ResolvedValueType {
    pub fn plain(kind: ValueType) -> Self {
        Self {
            kind,
            options: RenderOptions::default(),
        }
    }

    pub fn with_precision(mut self, precision: u8) -> Self {
        self.options.precision = Some(precision);
        self
    }

    pub fn with_status(mut self, status: ProgressStatus) -> Self {
        self.options.status = Some(status);
        self
    }
}

impl From<ValueType> for ResolvedValueType {
    fn from(kind: ValueType) -> Self {
        Self::plain(kind)
    }
}

pub type ValueTypeFn = Arc<dyn Fn(&Record) -> ResolvedValueType + Send + Sync>;

/// Either a fixed value type or one chosen per record, e.g. a money column
/// that shows some rows as percentages.
#[derive(Clone)]
pub enum ValueTypeSpec {
    Fixed(ResolvedValueType),
    Dynamic(ValueTypeFn),
}

impl ValueTypeSpec {
    pub fn dynamic<F>(resolve: F) -> Self
    where
        F: Fn(&Record) -> ResolvedValueType + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(resolve))
    }

    pub fn resolve(&self, record: &Record) -> ResolvedValueType {
        match self {
            Self::Fixed(resolved) => resolved.clone(),
            Self::Dynamic(resolve) => resolve(record),
        }
    }

    pub fn fixed_kind(&self) -> Option<ValueType> {
        match self {
            Self::Fixed(resolved) => Some(resolved.kind),
            Self::Dynamic(_) => None,
        }
    }
}

impl Default for ValueTypeSpec {
    fn default() -> Self {
        Self::Fixed(ResolvedValueType::plain(ValueType::Text))
    }
}

impl From<ValueType> for ValueTypeSpec {
    fn from(kind: ValueType) -> Self {
        Self::Fixed(ResolvedValueType::plain(kind))
    }
}

impl From<ResolvedValueType> for ValueTypeSpec {
    fn from(resolved: ResolvedValueType) -> Self {
        Self::Fixed(resolved)
    }
}

impl fmt::Debug for ValueTypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(resolved) => f.debug_tuple("Fixed").field(resolved).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Path into a record. `"player.name"` addresses `record["player"]["name"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DataIndex(Vec<String>);

impl DataIndex {
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn key(&self) -> String {
        self.0.join(".")
    }

    pub fn get<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = record.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Writes `value` at this path, creating intermediate objects. A non-object
    /// intermediate value is replaced.
    pub fn set(&self, record: &mut Record, value: Value) {
        let Some((last, parents)) = self.0.split_last() else {
            return;
        };
        let mut current = record;
        for segment in parents {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Value::Object(next) = slot else {
                return;
            };
            current = next;
        }
        current.insert(last.clone(), value);
    }
}

impl From<&str> for DataIndex {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub value: String,
    pub label: String,
}

/// Enumerated value set of a field. Search forms treat the `"all"` value of
/// such a field as "no filter".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValueEnum(Vec<EnumOption>);

impl ValueEnum {
    pub fn new<I, V, L>(options: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<String>,
        L: Into<String>,
    {
        Self(
            options
                .into_iter()
                .map(|(value, label)| EnumOption {
                    value: value.into(),
                    label: label.into(),
                })
                .collect(),
        )
    }

    pub fn options(&self) -> &[EnumOption] {
        &self.0
    }

    pub fn label_for(&self, value: &Value) -> Option<&str> {
        let needle = match value {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => return None,
        };
        self.0
            .iter()
            .find(|option| option.value == needle)
            .map(|option| option.label.as_str())
    }
}

/// One `field$$Label` pair of the remote select mini-DSL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectField {
    pub field: String,
    pub label: String,
}

impl SelectField {
    /// Parses `"name$$Name,code$$Code"`. A pair without `$$` uses the field
    /// name as its label.
    pub fn parse_list(dsl: &str) -> Result<Vec<Self>, SchemaError> {
        let mut fields = Vec::new();
        for pair in dsl.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (field, label) = match pair.split_once("$$") {
                Some((field, label)) => (field.trim(), label.trim()),
                None => (pair, pair),
            };
            if field.is_empty() {
                return Err(SchemaError::InvalidSelectField(pair.to_owned()));
            }
            let label = if label.is_empty() { field } else { label };
            fields.push(Self {
                field: field.to_owned(),
                label: label.to_owned(),
            });
        }
        Ok(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteBinding {
    pub api: String,
    pub page_id: String,
    pub select_field: String,
    pub multiple: bool,
}

impl RemoteBinding {
    pub fn new(api: &str, page_id: &str, select_field: &str) -> Self {
        Self {
            api: api.to_owned(),
            page_id: page_id.to_owned(),
            select_field: select_field.to_owned(),
            multiple: false,
        }
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn select_fields(&self) -> Result<Vec<SelectField>, SchemaError> {
        SelectField::parse_list(&self.select_field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Surface {
    Search,
    Form,
    Table,
}

#[derive(Debug, Clone, Default)]
pub struct FieldDescriptor {
    pub key: Option<String>,
    pub data_index: DataIndex,
    pub title: String,
    pub value_type: ValueTypeSpec,
    pub editable: bool,
    pub hide_in_search: bool,
    pub hide_in_form: bool,
    pub hide_in_table: bool,
    pub initial_value: Option<Value>,
    pub rules: Vec<Rule>,
    pub value_enum: Option<ValueEnum>,
    pub remote: Option<RemoteBinding>,
    pub mirror: Option<Mirror>,
}

impl FieldDescriptor {
    pub fn new(data_index: &str, title: &str) -> Self {
        Self {
            data_index: DataIndex::parse(data_index),
            title: title.to_owned(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_owned());
        self
    }

    pub fn value_type(mut self, spec: impl Into<ValueTypeSpec>) -> Self {
        self.value_type = spec.into();
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn hide_in_search(mut self) -> Self {
        self.hide_in_search = true;
        self
    }

    pub fn hide_in_form(mut self) -> Self {
        self.hide_in_form = true;
        self
    }

    pub fn hide_in_table(mut self) -> Self {
        self.hide_in_table = true;
        self
    }

    pub fn initial_value(mut self, value: Value) -> Self {
        self.initial_value = Some(value);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn value_enum(mut self, value_enum: ValueEnum) -> Self {
        self.value_enum = Some(value_enum);
        self
    }

    pub fn remote(mut self, binding: RemoteBinding) -> Self {
        self.remote = Some(binding);
        self
    }

    pub fn mirror(mut self, mirror: Mirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Explicit key, or the data index segments joined with `.`.
    pub fn key(&self) -> String {
        match &self.key {
            Some(key) => key.clone(),
            None => self.data_index.key(),
        }
    }

    pub fn visible_in(&self, surface: Surface) -> bool {
        match surface {
            Surface::Search => !self.hide_in_search,
            Surface::Form => !self.hide_in_form,
            Surface::Table => !self.hide_in_table,
        }
    }

    pub fn value_in<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        self.data_index.get(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascend,
    Descend,
}

impl SortOrder {
    pub const fn as_backend(self) -> &'static str {
        match self {
            Self::Ascend => "asc",
            Self::Descend => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ascend" | "asc" => Some(Self::Ascend),
            "descend" | "desc" => Some(Self::Descend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn new(field: &str, order: SortOrder) -> Self {
        Self {
            field: field.to_owned(),
            order,
        }
    }
}
