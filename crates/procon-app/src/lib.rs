// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod array;
pub mod dates;
pub mod editable;
pub mod fetch;
pub mod format;
pub mod forms;
pub mod ids;
pub mod model;
pub mod query;
pub mod render;
pub mod rules;
pub mod schema;
pub mod selector;
pub mod sortable;
pub mod state;

pub use array::*;
pub use editable::*;
pub use fetch::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use query::*;
pub use render::*;
pub use rules::*;
pub use schema::*;
pub use selector::*;
pub use sortable::*;
pub use state::*;
