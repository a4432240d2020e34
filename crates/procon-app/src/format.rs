// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::{Number, Value};

pub const DEFAULT_CURRENCY_SYMBOL: &str = "¥";
const MAX_PRECISION: u8 = 8;

pub fn format_money(amount: f64, symbol: &str, precision: u8) -> Option<String> {
    let (sign, whole, fraction) = split_fixed(amount, precision)?;
    let mut out = format!("{sign}{symbol}{}", comma_format(whole));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(&fraction);
    }
    Some(out)
}

/// Thousands-separated number with at most three fraction digits and no
/// trailing zeros.
pub fn format_digit(value: f64) -> Option<String> {
    let (sign, whole, fraction) = split_fixed(value, 3)?;
    let fraction = fraction
        .map(|digits| digits.trim_end_matches('0').to_owned())
        .filter(|digits| !digits.is_empty());
    let sign = if whole == 0 && fraction.is_none() {
        ""
    } else {
        sign
    };
    Some(match fraction {
        Some(fraction) => format!("{sign}{}.{fraction}", comma_format(whole)),
        None => format!("{sign}{}", comma_format(whole)),
    })
}

pub fn format_percent(value: f64, precision: u8) -> Option<String> {
    let (sign, whole, fraction) = split_fixed(value, precision)?;
    Some(match fraction {
        Some(fraction) => format!("{sign}{whole}.{fraction}%"),
        None => format!("{sign}{whole}%"),
    })
}

/// Lenient numeric parse used for display: tolerates thousands separators,
/// a leading currency symbol, and a trailing percent sign.
pub fn parse_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let body = body
        .trim_start_matches(|ch: char| !ch.is_ascii_digit() && ch != '.')
        .trim_end_matches('%')
        .replace(',', "");
    if body.is_empty() {
        return None;
    }
    let value = body.parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

pub fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_number(text),
        _ => None,
    }
}

/// JSON number for `value`, kept integral when it has no fraction.
pub fn json_number(value: f64) -> Option<Value> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        return Some(Value::from(value as i64));
    }
    Number::from_f64(value).map(Value::Number)
}

pub fn round_to(value: f64, precision: u8) -> f64 {
    let factor = 10f64.powi(i32::from(precision.min(MAX_PRECISION)));
    (value * factor).round() / factor
}

/// Plain text for a JSON value: strings unquoted, null empty.
pub fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn split_fixed(value: f64, precision: u8) -> Option<(&'static str, u128, Option<String>)> {
    if !value.is_finite() {
        return None;
    }
    let precision = precision.min(MAX_PRECISION);
    let factor = 10u128.pow(u32::from(precision));
    let scaled = (value.abs() * factor as f64).round();
    if scaled >= u128::MAX as f64 {
        return None;
    }
    let scaled = scaled as u128;
    let sign = if value < 0.0 && scaled != 0 { "-" } else { "" };
    let whole = scaled / factor;
    let fraction = (precision > 0).then(|| {
        format!(
            "{:0width$}",
            scaled % factor,
            width = usize::from(precision)
        )
    });
    Some((sign, whole, fraction))
}

fn comma_format(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let mut chars = digits.chars().collect::<Vec<_>>();
    let mut count = 0usize;
    while let Some(ch) = chars.pop() {
        if count == 3 {
            out.push(',');
            count = 0;
        }
        out.push(ch);
        count += 1;
    }
    out.chars().rev().collect()
}
