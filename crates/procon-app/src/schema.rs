// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashMap;
use std::fmt;

use crate::model::{FieldDescriptor, Surface};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    EmptyKey { title: String },
    DuplicateKey(String),
    MissingApi(String),
    MissingSelectField(String),
    InvalidSelectField(String),
    UnknownField(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey { title } => {
                write!(f, "field {title:?} has neither a key nor a data index")
            }
            Self::DuplicateKey(key) => write!(f, "duplicate field key {key:?} in schema"),
            Self::MissingApi(key) => {
                write!(f, "field {key:?} is remote-bound but has no api name")
            }
            Self::MissingSelectField(key) => write!(
                f,
                "field {key:?} is remote-bound but has no select fields (expected `field$$Label`)"
            ),
            Self::InvalidSelectField(pair) => {
                write!(f, "invalid select field {pair:?}; expected `field$$Label`")
            }
            Self::UnknownField(key) => write!(f, "unknown field {key:?}"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Field key -> descriptor lookup shared by table and form renderers.
/// Descriptor order is preserved.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    fields: Vec<FieldDescriptor>,
    by_key: HashMap<String, usize>,
}

impl SchemaIndex {
    pub fn build(fields: Vec<FieldDescriptor>) -> Result<Self, SchemaError> {
        let mut by_key = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            let key = field.key();
            if key.is_empty() {
                return Err(SchemaError::EmptyKey {
                    title: field.title.clone(),
                });
            }
            if let Some(remote) = &field.remote {
                if remote.api.trim().is_empty() {
                    return Err(SchemaError::MissingApi(key));
                }
                if remote.select_fields()?.is_empty() {
                    return Err(SchemaError::MissingSelectField(key));
                }
            }
            if by_key.insert(key.clone(), position).is_some() {
                return Err(SchemaError::DuplicateKey(key));
            }
        }
        Ok(Self { fields, by_key })
    }

    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.by_key.get(key).map(|position| &self.fields[*position])
    }

    pub fn require(&self, key: &str) -> Result<&FieldDescriptor, SchemaError> {
        self.get(key)
            .ok_or_else(|| SchemaError::UnknownField(key.to_owned()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn visible(&self, surface: Surface) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(move |field| field.visible_in(surface))
    }

    pub fn editable_keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|field| field.editable)
            .map(FieldDescriptor::key)
            .collect()
    }
}
