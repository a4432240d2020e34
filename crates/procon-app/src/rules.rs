// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Field validation rules and cross-field mirrors.
//!
//! Rules are plain data attached to a descriptor, so the same checks serve any
//! field: a sale price is a `LessThanField` plus a `DiscountFloor`, a tiered
//! price list is a `Tiers` rule, and so on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::dates::{self, DateLayout};
use crate::format::{self, json_number, number_of, round_to};
use crate::model::{FieldDescriptor, Record, ValueType};

pub const DEFAULT_MIN_DISCOUNT_PERCENT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rule {
    Required,
    Min(f64),
    Max(f64),
    Range { min: f64, max: f64 },
    /// Strictly less than a sibling field of the same row.
    LessThanField { field: String },
    /// `(list - value) / list * 100` must reach `min_percent`.
    DiscountFloor {
        list_field: String,
        min_percent: Option<f64>,
    },
    /// Value is a percentage in `[0, 100]` that must reach `min_percent`.
    PercentFloor { min_percent: Option<f64> },
    Tiers(TierRule),
}

/// Keys of a tiered price-by-quantity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRule {
    pub min_key: String,
    pub max_key: String,
    pub price_key: String,
}

impl Default for TierRule {
    fn default() -> Self {
        Self {
            min_key: "countMin".to_owned(),
            max_key: "countMax".to_owned(),
            price_key: "price".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorRelation {
    /// The edited field is a price; the mirror receives its discount percent.
    PercentFromPrice { list_field: String },
    /// The edited field is a discount percent; the mirror receives the price.
    PriceFromPercent { list_field: String },
}

/// A sibling field recomputed whenever this one is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub field: String,
    pub relation: MirrorRelation,
}

impl Mirror {
    pub fn percent_from_price(field: &str, list_field: &str) -> Self {
        Self {
            field: field.to_owned(),
            relation: MirrorRelation::PercentFromPrice {
                list_field: list_field.to_owned(),
            },
        }
    }

    pub fn price_from_percent(field: &str, list_field: &str) -> Self {
        Self {
            field: field.to_owned(),
            relation: MirrorRelation::PriceFromPercent {
                list_field: list_field.to_owned(),
            },
        }
    }

    /// Mirrored value for `value`, or `None` when the list price is missing
    /// or zero.
    pub fn derive(&self, value: &Value, row: &Record) -> Option<Value> {
        let edited = number_of(value)?;
        match &self.relation {
            MirrorRelation::PercentFromPrice { list_field } => {
                let list = row.get(list_field).and_then(number_of)?;
                if list == 0.0 {
                    return None;
                }
                json_number(round_to((list - edited) / list * 100.0, 2))
            }
            MirrorRelation::PriceFromPercent { list_field } => {
                let list = row.get(list_field).and_then(number_of)?;
                json_number(round_to(list * (1.0 - edited / 100.0), 2))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

/// Runs every rule of `field` against `value`, reading siblings from `row`.
pub fn validate_field(field: &FieldDescriptor, value: &Value, row: &Record) -> Vec<FieldError> {
    let key = field.key();
    let mut errors = Vec::new();
    for rule in &field.rules {
        if let Err(message) = check_rule(rule, value, row) {
            errors.push(FieldError::new(&key, message));
        }
    }
    errors
}

fn check_rule(rule: &Rule, value: &Value, row: &Record) -> Result<(), String> {
    if is_blank(value) {
        return match rule {
            Rule::Required => Err("is required".to_owned()),
            _ => Ok(()),
        };
    }

    match rule {
        Rule::Required => Ok(()),
        Rule::Min(min) => {
            let number = require_number(value)?;
            if number < *min {
                return Err(format!("must be at least {}", trim_float(*min)));
            }
            Ok(())
        }
        Rule::Max(max) => {
            let number = require_number(value)?;
            if number > *max {
                return Err(format!("must be at most {}", trim_float(*max)));
            }
            Ok(())
        }
        Rule::Range { min, max } => {
            let number = require_number(value)?;
            if number < *min || number > *max {
                return Err(format!(
                    "must be between {} and {}",
                    trim_float(*min),
                    trim_float(*max)
                ));
            }
            Ok(())
        }
        Rule::LessThanField { field } => {
            let number = require_number(value)?;
            let Some(limit) = row.get(field).and_then(number_of) else {
                return Ok(());
            };
            if number >= limit {
                return Err(format!("must be smaller than {field}"));
            }
            Ok(())
        }
        Rule::DiscountFloor {
            list_field,
            min_percent,
        } => {
            let price = require_number(value)?;
            let Some(min_percent) = min_percent else {
                return Ok(());
            };
            let Some(list) = row.get(list_field).and_then(number_of) else {
                return Ok(());
            };
            if list <= 0.0 {
                return Ok(());
            }
            let discount = (list - price) / list * 100.0;
            if round_to(discount, 2) < *min_percent {
                return Err(format!(
                    "discount must be at least {}%",
                    trim_float(*min_percent)
                ));
            }
            Ok(())
        }
        Rule::PercentFloor { min_percent } => {
            let percent = require_number(value)?;
            if !(0.0..=100.0).contains(&percent) {
                return Err("must be between 0 and 100".to_owned());
            }
            if let Some(min_percent) = min_percent
                && percent < *min_percent
            {
                return Err(format!("must be at least {}%", trim_float(*min_percent)));
            }
            Ok(())
        }
        Rule::Tiers(tiers) => check_tiers(tiers, value),
    }
}

fn check_tiers(rule: &TierRule, value: &Value) -> Result<(), String> {
    let Value::Array(tiers) = value else {
        return Err("must be a list of tiers".to_owned());
    };

    let mut previous: Option<(f64, f64)> = None;
    for (position, tier) in tiers.iter().enumerate() {
        let tier_no = position + 1;
        let Value::Object(tier) = tier else {
            return Err(format!("tier {tier_no} must be an object"));
        };
        let read = |key: &str| {
            tier.get(key)
                .and_then(number_of)
                .ok_or_else(|| format!("tier {tier_no} {key} must be a number"))
        };
        let min = read(&rule.min_key)?;
        let max = read(&rule.max_key)?;
        let price = read(&rule.price_key)?;

        if max <= min {
            return Err(format!(
                "tier {tier_no} max count must be greater than its min count"
            ));
        }
        if let Some((previous_max, previous_price)) = previous {
            if price >= previous_price {
                return Err(format!(
                    "tier {tier_no} price must be smaller than previous tier"
                ));
            }
            if min <= previous_max {
                return Err(format!(
                    "tier {tier_no} min count must be greater than previous tier max count"
                ));
            }
        }
        previous = Some((max, price));
    }
    Ok(())
}

/// Converts typed cell input into the field's JSON value.
pub fn coerce_input(
    field: &FieldDescriptor,
    kind: ValueType,
    input: &str,
) -> Result<Value, FieldError> {
    let key = field.key();
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    if field.rules.iter().any(|rule| matches!(rule, Rule::Tiers(_))) {
        return serde_json::from_str(trimmed)
            .map_err(|_| FieldError::new(&key, "must be a JSON list of tiers"));
    }

    if kind.is_numeric() {
        let number = format::parse_number(trimmed)
            .ok_or_else(|| FieldError::new(&key, "must be a number"))?;
        return json_number(number).ok_or_else(|| FieldError::new(&key, "must be a number"));
    }

    if let Some(layout) = DateLayout::for_value_type(kind) {
        let parsed = dates::parse_date_text(trimmed)
            .ok_or_else(|| FieldError::new(&key, format!("must match {}", layout.pattern())))?;
        return dates::format_date_time(parsed, layout)
            .map(Value::String)
            .ok_or_else(|| FieldError::new(&key, "invalid date"));
    }

    match kind {
        ValueType::Switch => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "off" | "no" => Ok(Value::Bool(false)),
            _ => Err(FieldError::new(&key, "must be on or off")),
        },
        _ => Ok(Value::String(input.to_owned())),
    }
}

/// Text shown in an input that starts editing `value`.
pub fn input_text(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(value @ (Value::Array(_) | Value::Object(_))) => value.to_string(),
        Some(value) => format::plain_text(value),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn require_number(value: &Value) -> Result<f64, String> {
    number_of(value).ok_or_else(|| "must be a number".to_owned())
}

fn trim_float(value: f64) -> String {
    format::format_digit(value).unwrap_or_else(|| value.to_string())
}
