// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::debug;

/// Moves `old` to `new` in a copy of `items`.
///
/// An `old` past the end leaves the list as is. A `new` past the end moves
/// the item to the end.
pub fn array_move<T: Clone>(items: &[T], old: usize, new: usize) -> Vec<T> {
    let mut moved = items.to_vec();
    if old >= moved.len() {
        return moved;
    }
    let item = moved.remove(old);
    let target = new.min(moved.len());
    moved.insert(target, item);
    moved
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport<K> {
    pub key: K,
    pub old_index: usize,
    pub new_index: usize,
}

/// Ordered rows that can be dragged into a new order.
///
/// `key_of` must return a key that is stable across moves.
#[derive(Debug, Clone)]
pub struct SortableRows<T, F> {
    rows: Vec<T>,
    key_of: F,
}

impl<T: Clone, F> SortableRows<T, F> {
    pub fn new<K>(rows: Vec<T>, key_of: F) -> Self
    where
        F: Fn(&T) -> K,
    {
        Self { rows, key_of }
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }

    pub fn replace(&mut self, rows: Vec<T>) {
        self.rows = rows;
    }

    /// Moves a row and lets `update_order_field` restamp every row with its
    /// new position. Returns `None` when nothing moved.
    pub fn on_sort_end<K, U>(
        &mut self,
        old_index: usize,
        new_index: usize,
        mut update_order_field: U,
    ) -> Option<MoveReport<K>>
    where
        F: Fn(&T) -> K,
        U: FnMut(&mut T, usize),
    {
        if old_index >= self.rows.len() {
            debug!(old_index, len = self.rows.len(), "ignoring move of missing row");
            return None;
        }
        let new_index = new_index.min(self.rows.len() - 1);
        if old_index == new_index {
            return None;
        }

        let key = (self.key_of)(&self.rows[old_index]);
        let mut moved = array_move(&self.rows, old_index, new_index);
        for (position, row) in moved.iter_mut().enumerate() {
            update_order_field(row, position);
        }
        self.rows = moved;
        Some(MoveReport {
            key,
            old_index,
            new_index,
        })
    }
}
