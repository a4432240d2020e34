// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use procon_app::{
    EntityId, ListParams, PageRequest, PaginatedFetch, RemoteBinding, RemoteSelector, SortKey,
    SortOrder,
};
use procon_db::{Store, validate_db_path};
use procon_testkit::{GAME_API, PAGE_ID, catalog, record, temp_db_path};
use serde_json::json;

fn seeded_store() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    for (api, rows) in catalog(11, 12, 4) {
        store.upsert_many(api, &rows)?;
    }
    Ok(store)
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path(":memory:").is_ok());
    assert!(validate_db_path("/tmp/procon.db").is_ok());
}

#[test]
fn bootstrap_is_repeatable_and_persists_to_disk() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.upsert(GAME_API, &record(json!({"id": 7, "name": "Neon Harbor"})))?;
    }
    let store = Store::open(&path)?;
    store.bootstrap()?;
    let game = store.get(GAME_API, EntityId::new(7))?;
    assert_eq!(
        game.and_then(|game| game.get("name").cloned()),
        Some(json!("Neon Harbor"))
    );
    Ok(())
}

#[test]
fn bootstrap_rejects_schema_missing_required_column() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    store.raw_connection().execute_batch(
        "
            DROP TABLE records;
            CREATE TABLE records (
              api TEXT NOT NULL,
              id INTEGER NOT NULL,
              body TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            ",
    )?;

    let err = store
        .bootstrap()
        .expect_err("schema validation should fail");
    let message = err.to_string();
    assert!(message.contains("table `records` is missing required columns"));
    assert!(message.contains("updated_at"));
    Ok(())
}

#[test]
fn bootstrap_rejects_foreign_database() -> Result<()> {
    let store = Store::open_memory()?;
    store
        .raw_connection()
        .execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);")?;
    let err = store.bootstrap().expect_err("foreign schema");
    assert!(err.to_string().contains("missing required table `records`"));
    Ok(())
}

#[test]
fn upsert_assigns_ids_and_replaces_existing_rows() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    let first = store.upsert("voucher", &record(json!({"name": "a"})))?;
    let second = store.upsert("voucher", &record(json!({"name": "b"})))?;
    assert_eq!((first.get(), second.get()), (1, 2));

    store.upsert("voucher", &record(json!({"id": 2, "name": "b2"})))?;
    assert_eq!(store.count("voucher")?, 2);
    assert_eq!(
        store
            .get("voucher", second)?
            .and_then(|row| row.get("name").cloned()),
        Some(json!("b2"))
    );

    assert!(
        store
            .upsert("voucher", &record(json!({"id": "x"})))
            .is_err()
    );
    store.delete("voucher", first)?;
    assert!(store.delete("voucher", first).is_err());
    assert_eq!(store.apis()?, vec!["voucher".to_owned()]);
    Ok(())
}

#[test]
fn list_filters_with_backend_operators() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    store.upsert_many(
        GAME_API,
        &[
            record(json!({"id": 1, "name": "Iron Harbor", "listPrice": 40, "enabled": true})),
            record(json!({"id": 2, "name": "Iron Garden", "listPrice": 90, "enabled": false})),
            record(json!({"id": 3, "name": "Lost Tides", "listPrice": 60, "enabled": true})),
            record(json!({"id": 4, "name": "100% Iron", "listPrice": 75, "enabled": true})),
        ],
    )?;

    let page = store.list(
        GAME_API,
        &record(json!({"name": {"contains": "Iron"}, "enabled": true})),
        &[SortKey::new("listPrice", SortOrder::Descend)],
        10,
        0,
    )?;
    let ids: Vec<_> = page.data.iter().map(|row| row["id"].clone()).collect();
    assert_eq!(page.count, 2);
    assert_eq!(ids, vec![json!(4), json!(1)]);

    let page = store.list(
        GAME_API,
        &record(json!({"name": {"contains": "0%"}})),
        &[],
        10,
        0,
    )?;
    assert_eq!(page.count, 1);

    let page = store.list(
        GAME_API,
        &record(json!({"listPrice": {"gte": 60, "lt": 90}})),
        &[],
        10,
        0,
    )?;
    assert_eq!(page.count, 2);

    let page = store.list(GAME_API, &record(json!({"id": {"in": []}})), &[], 10, 0)?;
    assert_eq!(page.count, 0);
    assert!(page.data.is_empty());

    assert!(
        store
            .list(GAME_API, &record(json!({"bad name": 1})), &[], 10, 0)
            .is_err()
    );
    Ok(())
}

#[test]
fn paging_is_stable_and_counts_whole_result() -> Result<()> {
    let mut store = seeded_store()?;
    let mut seen = Vec::new();
    for current in 1..=3 {
        let params = ListParams::new(
            &Default::default(),
            &[SortKey::new("platform", SortOrder::Ascend)],
            PageRequest::new(current, 5),
        );
        let page = store.fetch_page(PAGE_ID, GAME_API, &params)?;
        assert_eq!(page.count, 12);
        seen.extend(
            page.data
                .iter()
                .filter_map(|row| row.get("id").and_then(EntityId::from_value)),
        );
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 12);
    Ok(())
}

#[test]
fn store_backs_a_remote_selector() -> Result<()> {
    let mut store = seeded_store()?;
    let binding = RemoteBinding::new(GAME_API, PAGE_ID, "name$$Name").multiple();
    let mut selector = RemoteSelector::new(&binding)?;

    for event in selector.set_value(&json!([3, 1])) {
        if let procon_app::SelectorEvent::NamesRequested(request) = event {
            selector.apply_names(request.run(&mut store));
        }
    }
    assert_eq!(selector.names().len(), 2);
    let expected: Vec<String> = [3, 1]
        .iter()
        .filter_map(|id| store.get(GAME_API, EntityId::new(*id)).ok().flatten())
        .filter_map(|row| row.get("name").and_then(|name| name.as_str()).map(str::to_owned))
        .collect();
    assert_eq!(selector.display_names(), expected);
    Ok(())
}
