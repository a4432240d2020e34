// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Read-only value rendering keyed by [`ValueType`].
//!
//! Rendering is total: a value a renderer cannot interpret comes back as
//! [`Rendered::Raw`] holding the input untouched.

use serde_json::Value;
use std::collections::HashMap;

use crate::dates::{self, DateLayout};
use crate::format::{self, DEFAULT_CURRENCY_SYMBOL, number_of, plain_text};
use crate::model::{
    FieldDescriptor, ProgressStatus, Record, ResolvedValueType, ValueEnum, ValueType,
    ValueTypeSpec,
};

const DEFAULT_PRECISION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Text(String),
    /// Stacked lines, e.g. the two endpoints of a date range.
    Lines(Vec<String>),
    Percent {
        value: f64,
        text: String,
        trend: Trend,
    },
    Progress {
        percent: f64,
        status: ProgressStatus,
    },
    Image {
        url: String,
    },
    Avatar {
        url: String,
    },
    Code(String),
    Switch(bool),
    Index {
        number: usize,
        bordered: bool,
    },
    Placeholder(String),
    Raw(Value),
}

impl Rendered {
    /// Single-line text for terminals and logs.
    pub fn plain(&self) -> String {
        match self {
            Self::Text(text) | Self::Code(text) | Self::Placeholder(text) => text.clone(),
            Self::Lines(lines) => lines.join(" ~ "),
            Self::Percent { text, .. } => text.clone(),
            Self::Progress { percent, status } => {
                let amount = format::format_digit(*percent).unwrap_or_default();
                format!("{amount}% {}", status.as_str())
            }
            Self::Image { url } | Self::Avatar { url } => url.clone(),
            Self::Switch(true) => "on".to_owned(),
            Self::Switch(false) => "off".to_owned(),
            Self::Index { number, bordered } => {
                if *bordered {
                    format!("[{number}]")
                } else {
                    number.to_string()
                }
            }
            Self::Raw(value) => plain_text(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Placeholder for empty values; `None` renders empties untouched.
    pub empty_text: Option<String>,
    pub currency_symbol: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            empty_text: Some("-".to_owned()),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_owned(),
        }
    }
}

/// Everything a renderer may look at besides the value itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub row_index: usize,
    pub record: &'a Record,
    pub value_type: &'a ResolvedValueType,
    pub value_enum: Option<&'a ValueEnum>,
    pub config: &'a RenderConfig,
}

pub type RenderFn = fn(&Value, &RenderContext<'_>) -> Rendered;

/// Tagged dispatch table from value type to renderer.
///
/// A fresh registry only knows the fallback; [`RendererRegistry::init`]
/// installs the built-in renderers and [`RendererRegistry::dispose`] removes
/// them again.
#[derive(Debug, Clone)]
pub struct RendererRegistry {
    config: RenderConfig,
    renderers: HashMap<ValueType, RenderFn>,
    fallback: RenderFn,
}

impl RendererRegistry {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            renderers: HashMap::new(),
            fallback: render_raw,
        }
    }

    /// Registry with the built-in renderers installed.
    pub fn with_defaults(config: RenderConfig) -> Self {
        let mut registry = Self::new(config);
        registry.init();
        registry
    }

    pub fn init(&mut self) {
        let builtins: [(ValueType, RenderFn); 19] = [
            (ValueType::Text, render_raw),
            (ValueType::Money, render_money),
            (ValueType::Date, render_date),
            (ValueType::DateRange, render_date_range),
            (ValueType::DateTime, render_date),
            (ValueType::DateTimeRange, render_date_range),
            (ValueType::Time, render_date),
            (ValueType::Digit, render_digit),
            (ValueType::Percent, render_percent),
            (ValueType::Progress, render_progress),
            (ValueType::Avatar, render_media),
            (ValueType::Code, render_code),
            (ValueType::Image, render_media),
            (ValueType::Switch, render_switch),
            (ValueType::Radio, render_option),
            (ValueType::RadioGroup, render_option),
            (ValueType::Index, render_index),
            (ValueType::IndexBorder, render_index),
            (ValueType::Option, render_option),
        ];
        for (kind, render) in builtins {
            self.renderers.entry(kind).or_insert(render);
        }
    }

    pub fn dispose(&mut self) {
        self.renderers.clear();
    }

    pub fn register(&mut self, kind: ValueType, render: RenderFn) {
        self.renderers.insert(kind, render);
    }

    pub fn set_fallback(&mut self, render: RenderFn) {
        self.fallback = render;
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        !self.renderers.is_empty()
    }

    pub fn render(
        &self,
        text: &Value,
        spec: &ValueTypeSpec,
        row_index: usize,
        record: &Record,
    ) -> Rendered {
        self.render_with_enum(text, spec, row_index, record, None)
    }

    /// Renders the value `field` points at inside `record`.
    pub fn render_field(
        &self,
        field: &FieldDescriptor,
        record: &Record,
        row_index: usize,
    ) -> Rendered {
        let value = field.value_in(record).cloned().unwrap_or(Value::Null);
        self.render_with_enum(
            &value,
            &field.value_type,
            row_index,
            record,
            field.value_enum.as_ref(),
        )
    }

    fn render_with_enum(
        &self,
        text: &Value,
        spec: &ValueTypeSpec,
        row_index: usize,
        record: &Record,
        value_enum: Option<&ValueEnum>,
    ) -> Rendered {
        let resolved = spec.resolve(record);
        if !matches!(resolved.kind, ValueType::Index | ValueType::IndexBorder)
            && let Some(empty) = &self.config.empty_text
            && is_empty_value(text)
        {
            return Rendered::Placeholder(empty.clone());
        }

        let context = RenderContext {
            row_index,
            record,
            value_type: &resolved,
            value_enum,
            config: &self.config,
        };
        let render = self
            .renderers
            .get(&resolved.kind)
            .copied()
            .unwrap_or(self.fallback);
        render(text, &context)
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::with_defaults(RenderConfig::default())
    }
}

/// Null and empty strings are empty; booleans and numbers never are.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn precision(context: &RenderContext<'_>) -> u8 {
    context
        .value_type
        .options
        .precision
        .unwrap_or(DEFAULT_PRECISION)
}

fn render_raw(value: &Value, _context: &RenderContext<'_>) -> Rendered {
    Rendered::Raw(value.clone())
}

fn render_money(value: &Value, context: &RenderContext<'_>) -> Rendered {
    let symbol = context
        .value_type
        .options
        .symbol
        .as_deref()
        .unwrap_or(&context.config.currency_symbol);
    number_of(value)
        .and_then(|amount| format::format_money(amount, symbol, precision(context)))
        .map_or_else(|| Rendered::Raw(value.clone()), Rendered::Text)
}

fn render_digit(value: &Value, _context: &RenderContext<'_>) -> Rendered {
    number_of(value)
        .and_then(format::format_digit)
        .map_or_else(|| Rendered::Raw(value.clone()), Rendered::Text)
}

fn layout_of(context: &RenderContext<'_>) -> DateLayout {
    DateLayout::for_value_type(context.value_type.kind).unwrap_or(DateLayout::Date)
}

fn render_date(value: &Value, context: &RenderContext<'_>) -> Rendered {
    dates::format_date_value(value, layout_of(context))
        .map_or_else(|| Rendered::Raw(value.clone()), Rendered::Text)
}

fn render_date_range(value: &Value, context: &RenderContext<'_>) -> Rendered {
    let layout = layout_of(context);
    match value {
        Value::Array(endpoints) if endpoints.len() == 2 => Rendered::Lines(
            endpoints
                .iter()
                .map(|endpoint| {
                    dates::format_date_value(endpoint, layout)
                        .unwrap_or_else(|| plain_text(endpoint))
                })
                .collect(),
        ),
        _ => render_date(value, context),
    }
}

fn render_percent(value: &Value, context: &RenderContext<'_>) -> Rendered {
    let Some(number) = number_of(value) else {
        return Rendered::Raw(value.clone());
    };
    let Some(text) = format::format_percent(number, precision(context)) else {
        return Rendered::Raw(value.clone());
    };
    let trend = if number > 0.0 {
        Trend::Up
    } else if number < 0.0 {
        Trend::Down
    } else {
        Trend::Flat
    };
    Rendered::Percent {
        value: number,
        text,
        trend,
    }
}

fn render_progress(value: &Value, context: &RenderContext<'_>) -> Rendered {
    let number = number_of(value);
    let derived = match number {
        None => ProgressStatus::Exception,
        Some(number) if number < 0.0 => ProgressStatus::Exception,
        Some(number) if number >= 100.0 => ProgressStatus::Success,
        Some(_) => ProgressStatus::Active,
    };
    Rendered::Progress {
        percent: number.unwrap_or(0.0).clamp(0.0, 100.0),
        status: context.value_type.options.status.unwrap_or(derived),
    }
}

fn render_media(value: &Value, context: &RenderContext<'_>) -> Rendered {
    let first = match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    let Some(Value::String(url)) = first else {
        return Rendered::Raw(value.clone());
    };
    let url = url.clone();
    match context.value_type.kind {
        ValueType::Avatar => Rendered::Avatar { url },
        _ => Rendered::Image { url },
    }
}

fn render_code(value: &Value, _context: &RenderContext<'_>) -> Rendered {
    match value {
        Value::String(text) => Rendered::Code(text.clone()),
        Value::Null => Rendered::Raw(Value::Null),
        other => Rendered::Code(
            serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        ),
    }
}

fn render_switch(value: &Value, _context: &RenderContext<'_>) -> Rendered {
    match value {
        Value::Bool(on) => Rendered::Switch(*on),
        Value::Number(number) => Rendered::Switch(number.as_f64().is_some_and(|n| n != 0.0)),
        _ => Rendered::Raw(value.clone()),
    }
}

fn render_option(value: &Value, context: &RenderContext<'_>) -> Rendered {
    let label = context
        .value_enum
        .and_then(|value_enum| value_enum.label_for(value));
    match label {
        Some(label) => Rendered::Text(label.to_owned()),
        None => Rendered::Raw(value.clone()),
    }
}

fn render_index(_value: &Value, context: &RenderContext<'_>) -> Rendered {
    Rendered::Index {
        number: context.row_index + 1,
        bordered: context.value_type.kind == ValueType::IndexBorder,
    }
}

#[cfg(test)]
mod tests {
    use super::{RenderConfig, Rendered, RendererRegistry, Trend};
    use crate::model::{
        FieldDescriptor, ProgressStatus, Record, ResolvedValueType, ValueEnum, ValueType,
        ValueTypeSpec,
    };
    use serde_json::{Value, json};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn render(kind: ValueType, value: Value) -> Rendered {
        RendererRegistry::default().render(&value, &kind.into(), 0, &Record::new())
    }

    #[test]
    fn money_column_is_formatted_and_text_is_unchanged() {
        let registry = RendererRegistry::default();
        let row = record(json!({"name": "x", "amount": 1000}));
        let name = FieldDescriptor::new("name", "Name");
        let amount = FieldDescriptor::new("amount", "Amount").value_type(ValueType::Money);

        assert_eq!(registry.render_field(&name, &row, 0), Rendered::Raw(json!("x")));
        assert_eq!(
            registry.render_field(&amount, &row, 0),
            Rendered::Text("¥1,000.00".to_owned())
        );
    }

    #[test]
    fn money_parses_numeric_strings_and_honours_symbol_override() {
        assert_eq!(
            render(ValueType::Money, json!("2,500.5")),
            Rendered::Text("¥2,500.50".to_owned())
        );
        let registry = RendererRegistry::default();
        let spec = ValueTypeSpec::Fixed(ResolvedValueType {
            kind: ValueType::Money,
            options: crate::model::RenderOptions {
                symbol: Some("$".to_owned()),
                precision: Some(0),
                status: None,
            },
        });
        assert_eq!(
            registry.render(&json!(12.4), &spec, 0, &Record::new()),
            Rendered::Text("$12".to_owned())
        );
        assert_eq!(
            render(ValueType::Money, json!("n/a")),
            Rendered::Raw(json!("n/a"))
        );
    }

    #[test]
    fn empty_values_use_placeholder_except_numbers_and_booleans() {
        assert_eq!(
            render(ValueType::Text, json!("")),
            Rendered::Placeholder("-".to_owned())
        );
        assert_eq!(
            render(ValueType::Date, Value::Null),
            Rendered::Placeholder("-".to_owned())
        );
        assert_eq!(render(ValueType::Switch, json!(false)), Rendered::Switch(false));
        assert_eq!(
            render(ValueType::Digit, json!(0)),
            Rendered::Text("0".to_owned())
        );

        let bare = RendererRegistry::with_defaults(RenderConfig {
            empty_text: None,
            ..RenderConfig::default()
        });
        assert_eq!(
            bare.render(&Value::Null, &ValueType::Date.into(), 0, &Record::new()),
            Rendered::Raw(Value::Null)
        );
    }

    #[test]
    fn date_ranges_render_two_lines() {
        assert_eq!(
            render(
                ValueType::DateTimeRange,
                json!(["2026-01-02T03:04:05Z", "2026-01-03 00:00:00"])
            ),
            Rendered::Lines(vec![
                "2026-01-02 03:04:05".to_owned(),
                "2026-01-03 00:00:00".to_owned(),
            ])
        );
        assert_eq!(
            render(ValueType::DateRange, json!("2026-05-06 07:08:09")),
            Rendered::Text("2026-05-06".to_owned())
        );
    }

    #[test]
    fn progress_derives_status() {
        let status = |value: Value| match render(ValueType::Progress, value) {
            Rendered::Progress { status, .. } => status,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(status(json!("x")), ProgressStatus::Exception);
        assert_eq!(status(json!(-1)), ProgressStatus::Exception);
        assert_eq!(status(json!(100)), ProgressStatus::Success);
        assert_eq!(status(json!(40)), ProgressStatus::Active);

        let registry = RendererRegistry::default();
        let spec = ValueTypeSpec::dynamic(|_| {
            ResolvedValueType::plain(ValueType::Progress).with_status(ProgressStatus::Success)
        });
        assert_eq!(
            registry.render(&json!(10), &spec, 0, &Record::new()),
            Rendered::Progress {
                percent: 10.0,
                status: ProgressStatus::Success,
            }
        );
    }

    #[test]
    fn percent_reports_trend() {
        assert_eq!(
            render(ValueType::Percent, json!(-2.5)),
            Rendered::Percent {
                value: -2.5,
                text: "-2.50%".to_owned(),
                trend: Trend::Down,
            }
        );
    }

    #[test]
    fn index_ignores_text_and_image_takes_first() {
        let registry = RendererRegistry::default();
        assert_eq!(
            registry.render(&Value::Null, &ValueType::IndexBorder.into(), 4, &Record::new()),
            Rendered::Index {
                number: 5,
                bordered: true,
            }
        );
        assert_eq!(
            render(ValueType::Image, json!(["a.png", "b.png"])),
            Rendered::Image {
                url: "a.png".to_owned()
            }
        );
    }

    #[test]
    fn dynamic_type_switches_per_row() {
        let registry = RendererRegistry::default();
        let spec = ValueTypeSpec::dynamic(|row| {
            if row.get("isRate") == Some(&json!(true)) {
                ValueType::Percent.into()
            } else {
                ValueType::Money.into()
            }
        });
        let rate = record(json!({"isRate": true}));
        assert_eq!(registry.render(&json!(5), &spec, 0, &rate).plain(), "5.00%");
        assert_eq!(
            registry.render(&json!(5), &spec, 0, &Record::new()).plain(),
            "¥5.00"
        );
    }

    #[test]
    fn options_use_enum_labels() {
        let registry = RendererRegistry::default();
        let field = FieldDescriptor::new("status", "Status")
            .value_type(ValueType::Option)
            .value_enum(ValueEnum::new([("1", "Open"), ("2", "Closed")]));
        let row = record(json!({"status": 2}));
        assert_eq!(
            registry.render_field(&field, &row, 0),
            Rendered::Text("Closed".to_owned())
        );
    }

    #[test]
    fn dispose_falls_back_to_raw() {
        let mut registry = RendererRegistry::default();
        registry.dispose();
        assert!(!registry.is_initialized());
        assert_eq!(
            registry.render(&json!(1000), &ValueType::Money.into(), 0, &Record::new()),
            Rendered::Raw(json!(1000))
        );
        registry.init();
        assert_eq!(
            registry
                .render(&json!(1000), &ValueType::Money.into(), 0, &Record::new())
                .plain(),
            "¥1,000.00"
        );
    }
}
