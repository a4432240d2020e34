// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! The voucher catalog the console edits, and its demo dataset.

use anyhow::{Context, Result};
use procon_app::{FieldDescriptor, Rule, SchemaIndex};
use procon_db::Store;

const DEMO_SEED: u64 = 20_260_101;
const DEMO_GAMES: usize = 24;
const DEMO_VOUCHERS: usize = 60;

/// Voucher schema with the configured discount floor on both price fields.
pub fn voucher_schema(min_discount_percent: Option<f64>) -> Result<SchemaIndex> {
    let fields = procon_testkit::voucher_fields()
        .into_iter()
        .map(|field| with_discount_floor(field, min_discount_percent))
        .collect();
    SchemaIndex::build(fields).context("build voucher schema")
}

fn with_discount_floor(mut field: FieldDescriptor, floor: Option<f64>) -> FieldDescriptor {
    for rule in &mut field.rules {
        match rule {
            Rule::DiscountFloor { min_percent, .. } | Rule::PercentFloor { min_percent } => {
                *min_percent = floor;
            }
            _ => {}
        }
    }
    field
}

/// Fills `store` with a fixed, generated catalog. Returns the rows written.
pub fn seed_demo(store: &Store) -> Result<usize> {
    let mut written = 0;
    for (api, rows) in procon_testkit::catalog(DEMO_SEED, DEMO_GAMES, DEMO_VOUCHERS) {
        written += store
            .upsert_many(api, &rows)
            .with_context(|| format!("seed demo {api} rows"))?
            .len();
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::{seed_demo, voucher_schema};
    use anyhow::Result;
    use procon_app::Rule;
    use procon_db::Store;
    use procon_testkit::{GAME_API, VOUCHER_API};

    fn floors(min: Option<f64>) -> Result<Vec<Option<f64>>> {
        let schema = voucher_schema(min)?;
        Ok(schema
            .fields()
            .iter()
            .flat_map(|field| field.rules.iter())
            .filter_map(|rule| match rule {
                Rule::DiscountFloor { min_percent, .. } | Rule::PercentFloor { min_percent } => {
                    Some(*min_percent)
                }
                _ => None,
            })
            .collect())
    }

    #[test]
    fn discount_floor_follows_config() -> Result<()> {
        assert_eq!(floors(Some(12.5))?, vec![Some(12.5), Some(12.5)]);
        assert_eq!(floors(None)?, vec![None, None]);
        Ok(())
    }

    #[test]
    fn demo_seed_fills_both_apis() -> Result<()> {
        let store = Store::open_memory()?;
        store.bootstrap()?;
        assert_eq!(seed_demo(&store)?, 84);
        assert_eq!(store.count(GAME_API)?, 24);
        assert_eq!(store.count(VOUCHER_API)?, 60);
        // reseeding replaces rows by id
        seed_demo(&store)?;
        assert_eq!(store.count(VOUCHER_API)?, 60);
        Ok(())
    }
}
