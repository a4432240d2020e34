// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::model::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    Date,
    DateTime,
    Time,
}

impl DateLayout {
    /// Format used for a date-typed field; `None` for non-date types.
    pub const fn for_value_type(kind: ValueType) -> Option<Self> {
        match kind {
            ValueType::Date | ValueType::DateRange => Some(Self::Date),
            ValueType::DateTime | ValueType::DateTimeRange => Some(Self::DateTime),
            ValueType::Time => Some(Self::Time),
            _ => None,
        }
    }

    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Date => "YYYY-MM-DD",
            Self::DateTime => "YYYY-MM-DD HH:mm:ss",
            Self::Time => "HH:mm:ss",
        }
    }
}

/// Interprets a JSON value as a point in time (UTC).
///
/// Numbers are epoch milliseconds. Strings may be RFC 3339, `YYYY-MM-DD`,
/// `YYYY-MM-DD HH:mm:ss` (space or `T`), or a bare `HH:mm:ss`, which lands on
/// the epoch date.
pub fn parse_date_value(value: &Value) -> Option<PrimitiveDateTime> {
    match value {
        Value::Number(number) => {
            let millis = number
                .as_i64()
                .or_else(|| number.as_f64().map(|float| float.round() as i64))?;
            let nanos = i128::from(millis).checked_mul(1_000_000)?;
            let at = OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()?;
            Some(PrimitiveDateTime::new(at.date(), at.time()))
        }
        Value::String(raw) => parse_date_text(raw.trim()),
        _ => None,
    }
}

pub fn parse_date_text(raw: &str) -> Option<PrimitiveDateTime> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        let utc = value.to_offset(time::UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(utc.date(), utc.time()));
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Some(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]"),
    ) {
        return Some(value);
    }
    if let Ok(value) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Some(value.midnight());
    }
    if let Ok(value) = Time::parse(raw, &format_description!("[hour]:[minute]:[second]")) {
        return Some(PrimitiveDateTime::new(
            OffsetDateTime::UNIX_EPOCH.date(),
            value,
        ));
    }
    None
}

pub fn format_date_time(value: PrimitiveDateTime, layout: DateLayout) -> Option<String> {
    let formatted = match layout {
        DateLayout::Date => value.format(&format_description!("[year]-[month]-[day]")),
        DateLayout::DateTime => value.format(&format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        )),
        DateLayout::Time => value.format(&format_description!("[hour]:[minute]:[second]")),
    };
    formatted.ok()
}

pub fn epoch_millis(value: PrimitiveDateTime) -> i64 {
    (value.assume_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Formats a date-like JSON value, `None` when it is not date-like.
pub fn format_date_value(value: &Value, layout: DateLayout) -> Option<String> {
    format_date_time(parse_date_value(value)?, layout)
}
