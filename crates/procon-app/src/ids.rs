// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(EntityId);

impl EntityId {
    /// Reads an id out of a loosely typed JSON value.
    ///
    /// Backends hand ids back as integers, integral floats, numeric strings, or
    /// whole entity objects; anything else is not an id.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => {
                if let Some(id) = number.as_i64() {
                    return Some(Self(id));
                }
                let float = number.as_f64()?;
                if float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
                    Some(Self(float as i64))
                } else {
                    None
                }
            }
            Value::String(raw) => raw.trim().parse::<i64>().ok().map(Self),
            Value::Object(map) => map.get("id").and_then(Self::from_value),
            _ => None,
        }
    }

    pub fn to_value(self) -> Value {
        Value::from(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::EntityId;
    use serde_json::json;

    #[test]
    fn from_value_accepts_numbers_strings_and_objects() {
        assert_eq!(EntityId::from_value(&json!(7)), Some(EntityId::new(7)));
        assert_eq!(EntityId::from_value(&json!(7.0)), Some(EntityId::new(7)));
        assert_eq!(EntityId::from_value(&json!(" 12 ")), Some(EntityId::new(12)));
        assert_eq!(
            EntityId::from_value(&json!({"id": 3, "name": "x"})),
            Some(EntityId::new(3))
        );
    }

    #[test]
    fn from_value_rejects_non_ids() {
        assert_eq!(EntityId::from_value(&json!(null)), None);
        assert_eq!(EntityId::from_value(&json!(1.5)), None);
        assert_eq!(EntityId::from_value(&json!("abc")), None);
        assert_eq!(EntityId::from_value(&json!([1])), None);
    }
}
