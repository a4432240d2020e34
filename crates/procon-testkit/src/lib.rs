// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use procon_app::format::number_of;
use procon_app::{
    DEFAULT_MIN_DISCOUNT_PERCENT, DataIndex, EntityId, FieldDescriptor, ListParams, Mirror, Page,
    PaginatedFetch, Record, RemoteBinding, Rule, SchemaIndex, SortKey, SortOrder, TierRule,
    ValueEnum, ValueType,
};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;
use time::{Date, Duration, Month};

pub const GAME_API: &str = "game";
pub const VOUCHER_API: &str = "voucher";
pub const PAGE_ID: &str = "p1";

const GAME_ADJECTIVES: [&str; 14] = [
    "Crimson", "Silent", "Hollow", "Neon", "Iron", "Lost", "Frozen", "Wild", "Golden", "Broken",
    "Endless", "Shadow", "Solar", "Quiet",
];
const GAME_NOUNS: [&str; 14] = [
    "Frontier", "Harbor", "Kingdom", "Circuit", "Garden", "Citadel", "Voyage", "Signal",
    "Orchard", "Labyrinth", "Outpost", "Tides", "Relic", "Summit",
];
const PLATFORMS: [&str; 5] = ["PC", "Switch", "PS5", "Xbox", "Mobile"];
const VOUCHER_THEMES: [&str; 8] = [
    "Spring", "Summer", "Autumn", "Winter", "Launch", "Weekend", "Anniversary", "Holiday",
];

const REFERENCE_YEAR: i32 = 2026;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator of catalog records. The same seed always yields the same
/// sequence.
#[derive(Debug, Clone)]
pub struct CatalogFaker {
    rng: DeterministicRng,
}

impl CatalogFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn game(&mut self, id: i64) -> Record {
        let name = format!("{} {}", self.pick(&GAME_ADJECTIVES), self.pick(&GAME_NOUNS));
        let released_year = REFERENCE_YEAR - self.int_range(0, 4);
        let released = self.date_in_year(released_year);
        record(json!({
            "id": id,
            "name": name,
            "platform": self.pick(&PLATFORMS),
            "listPrice": self.int_range(30, 300),
            "releasedAt": released.to_string(),
            "enabled": self.rng.bool(),
        }))
    }

    /// A voucher whose prices, discount and tiers satisfy the voucher schema's
    /// rules. `game_ids` are the ids it may reference.
    pub fn voucher(&mut self, id: i64, game_ids: &[i64]) -> Record {
        let list_price = self.int_range(100, 1000);
        let discount = self.int_range(6, 60);
        let sale_price = round2(list_price as f64 * (1.0 - discount as f64 / 100.0));
        let start = self.date_in_year(REFERENCE_YEAR);
        let end = start + Duration::days(i64::from(self.int_range(7, 90)));

        let mut games = Vec::new();
        if !game_ids.is_empty() {
            for _ in 0..self.int_range(1, 3) {
                let game = game_ids[self.rng.int_n(game_ids.len())];
                if !games.contains(&game) {
                    games.push(game);
                }
            }
        }

        let state = if self.rng.bool() { "on" } else { "off" };
        record(json!({
            "id": id,
            "name": format!("{} voucher {id}", self.pick(&VOUCHER_THEMES)),
            "state": state,
            "listPrice": list_price,
            "salePrice": sale_price,
            "discountPercent": round2((list_price as f64 - sale_price) / list_price as f64 * 100.0),
            "priceTiers": self.tiers(list_price),
            "validRange": [start.to_string(), end.to_string()],
            "featuredGame": games.first(),
            "games": games,
        }))
    }

    /// Strictly cheaper, non-overlapping quantity tiers.
    pub fn tiers(&mut self, top_price: i32) -> Value {
        let count = self.int_range(1, 3);
        let mut tiers = Vec::new();
        let mut min = 1;
        let mut price = top_price;
        for _ in 0..count {
            let max = min + self.int_range(2, 9);
            tiers.push(json!({"countMin": min, "countMax": max, "price": price}));
            min = max + 1;
            price -= self.int_range(5, 20);
        }
        Value::Array(tiers)
    }

    pub fn date_in_year(&mut self, year: i32) -> Date {
        let start = Date::from_calendar_date(year, Month::January, 1).unwrap_or(Date::MIN);
        start + Duration::days(self.rng.int_n(365) as i64)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = i64::from(max) - i64::from(min) + 1;
        let offset = (self.rng.next_u64() % (span as u64)) as i64;
        (i64::from(min) + offset) as i32
    }
}

/// `games` games and `vouchers` vouchers that reference them, keyed by api.
pub fn catalog(seed: u64, games: usize, vouchers: usize) -> BTreeMap<&'static str, Vec<Record>> {
    let mut faker = CatalogFaker::new(seed);
    let game_rows: Vec<Record> = (1..=games as i64).map(|id| faker.game(id)).collect();
    let game_ids: Vec<i64> = (1..=games as i64).collect();
    let voucher_rows = (1..=vouchers as i64)
        .map(|id| faker.voucher(id, &game_ids))
        .collect();
    BTreeMap::from([(GAME_API, game_rows), (VOUCHER_API, voucher_rows)])
}

pub fn game_binding() -> RemoteBinding {
    RemoteBinding::new(GAME_API, PAGE_ID, "name$$Name,platform$$Platform")
}

/// Columns of the voucher table: a discounted sale price mirrored by a
/// discount percent, quantity tiers, a single featured game and a
/// multi-select of games.
pub fn voucher_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("id", "ID")
            .value_type(ValueType::Digit)
            .hide_in_form(),
        FieldDescriptor::new("name", "Name")
            .editable()
            .rule(Rule::Required),
        FieldDescriptor::new("state", "State")
            .value_enum(ValueEnum::new([
                ("all", "All"),
                ("on", "On sale"),
                ("off", "Off sale"),
            ]))
            .initial_value(json!("all")),
        FieldDescriptor::new("listPrice", "List price")
            .value_type(ValueType::Money)
            .rule(Rule::Min(0.0)),
        FieldDescriptor::new("salePrice", "Sale price")
            .value_type(ValueType::Money)
            .editable()
            .hide_in_search()
            .rule(Rule::LessThanField {
                field: "listPrice".to_owned(),
            })
            .rule(Rule::DiscountFloor {
                list_field: "listPrice".to_owned(),
                min_percent: Some(DEFAULT_MIN_DISCOUNT_PERCENT),
            })
            .mirror(Mirror::percent_from_price("discountPercent", "listPrice")),
        FieldDescriptor::new("discountPercent", "Discount")
            .value_type(ValueType::Percent)
            .editable()
            .hide_in_search()
            .rule(Rule::PercentFloor {
                min_percent: Some(DEFAULT_MIN_DISCOUNT_PERCENT),
            })
            .mirror(Mirror::price_from_percent("salePrice", "listPrice")),
        FieldDescriptor::new("priceTiers", "Tiers")
            .value_type(ValueType::Code)
            .editable()
            .hide_in_search()
            .rule(Rule::Tiers(TierRule::default())),
        FieldDescriptor::new("validRange", "Valid").value_type(ValueType::DateRange),
        FieldDescriptor::new("featuredGame", "Featured")
            .hide_in_search()
            .remote(game_binding()),
        FieldDescriptor::new("games", "Games").remote(game_binding().multiple()),
    ]
}

pub fn voucher_schema() -> Result<SchemaIndex> {
    SchemaIndex::build(voucher_fields()).context("build voucher schema")
}

/// Columns of a bundle's ordered game list.
pub fn bundle_entry_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("sequence", "#").value_type(ValueType::Index),
        FieldDescriptor::new("id", "Game").value_type(ValueType::Digit),
        FieldDescriptor::new("bundlePrice", "Bundle price")
            .value_type(ValueType::Money)
            .editable()
            .rule(Rule::Min(0.0)),
        FieldDescriptor::new("note", "Note").editable(),
    ]
}

pub fn bundle_entry_schema() -> Result<SchemaIndex> {
    SchemaIndex::build(bundle_entry_fields()).context("build bundle entry schema")
}

/// One recorded `fetch_page` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub page_id: String,
    pub api: String,
    pub params: ListParams,
}

/// In-memory list backend speaking the same filter language as the real ones.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: BTreeMap<String, Vec<Record>>,
    calls: Vec<FetchCall>,
    failures: Vec<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, api: &str, rows: Vec<Record>) -> Self {
        self.tables.insert(api.to_owned(), rows);
        self
    }

    pub fn with_catalog(seed: u64, games: usize, vouchers: usize) -> Self {
        let mut source = Self::new();
        for (api, rows) in catalog(seed, games, vouchers) {
            source.tables.insert(api.to_owned(), rows);
        }
        source
    }

    pub fn rows(&self, api: &str) -> &[Record] {
        self.tables.get(api).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn calls(&self) -> &[FetchCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Makes the next fetch fail with `message`.
    pub fn fail_next(&mut self, message: &str) {
        self.failures.push(message.to_owned());
    }
}

impl PaginatedFetch for MemorySource {
    fn fetch_page(&mut self, page_id: &str, api: &str, params: &ListParams) -> Result<Page> {
        self.calls.push(FetchCall {
            page_id: page_id.to_owned(),
            api: api.to_owned(),
            params: params.clone(),
        });
        if !self.failures.is_empty() {
            let message = self.failures.remove(0);
            bail!("{message}");
        }

        let filter = params.filter()?;
        let sort = params.sort_keys()?;
        let mut matched = Vec::new();
        for row in self.rows(api) {
            if matches_filter(row, &filter)? {
                matched.push(row.clone());
            }
        }
        matched.sort_by(|left, right| compare_rows(left, right, &sort));

        let count = matched.len() as u64;
        let data = matched
            .into_iter()
            .skip(params.skip)
            .take(params.limit.max(1))
            .collect();
        Ok(Page { data, count })
    }
}

fn matches_filter(row: &Record, filter: &Record) -> Result<bool> {
    for (field, condition) in filter {
        let actual = DataIndex::parse(field).get(row).unwrap_or(&Value::Null);
        let ok = match condition {
            Value::Null => true,
            Value::Object(operators) => {
                let mut ok = true;
                for (operator, operand) in operators {
                    ok &= match operator.as_str() {
                        "contains" => {
                            let needle = operand.as_str().unwrap_or_default().to_lowercase();
                            text_of(actual).to_lowercase().contains(&needle)
                        }
                        "in" => operand
                            .as_array()
                            .is_some_and(|items| items.iter().any(|item| same(actual, item))),
                        "gte" => compare_values(actual, operand) != Ordering::Less,
                        "gt" => compare_values(actual, operand) == Ordering::Greater,
                        "lte" => compare_values(actual, operand) != Ordering::Greater,
                        "lt" => compare_values(actual, operand) == Ordering::Less,
                        other => bail!("unsupported filter operator {other:?} on {field}"),
                    };
                }
                ok
            }
            expected => same(actual, expected),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn compare_rows(left: &Record, right: &Record, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let index = DataIndex::parse(&key.field);
        let ordering = compare_values(
            index.get(left).unwrap_or(&Value::Null),
            index.get(right).unwrap_or(&Value::Null),
        );
        let ordering = match key.order {
            SortOrder::Ascend => ordering,
            SortOrder::Descend => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    let id = |row: &Record| row.get("id").and_then(EntityId::from_value);
    id(left).cmp(&id(right))
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (number_of(left), number_of(right)) {
        (Some(left), Some(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        _ => text_of(left).cmp(&text_of(right)),
    }
}

fn same(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!((number_of(left), number_of(right)), (Some(l), Some(r)) if l == r)
        }
        _ => left == right,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("procon.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}
