// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use procon_app::format::DEFAULT_CURRENCY_SYMBOL;
use procon_app::{
    DEFAULT_COLLAPSED_COUNT, DEFAULT_MIN_DISCOUNT_PERCENT, DEFAULT_PAGE_SIZE, RenderConfig,
};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_PAGE_ID: &str = "p1";
const DEFAULT_TIMEOUT: &str = "5s";
const DEFAULT_EMPTY_TEXT: &str = "-";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub rules: Rules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            storage: Storage::default(),
            ui: Ui::default(),
            rules: Rules::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    /// Unset means the local SQLite store backs the console.
    pub base_url: Option<String>,
    pub page_id: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: None,
            page_id: Some(DEFAULT_PAGE_ID.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
    pub log_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub empty_text: Option<String>,
    pub currency_symbol: Option<String>,
    pub page_size: Option<i64>,
    pub collapsed_fields: Option<i64>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            empty_text: Some(DEFAULT_EMPTY_TEXT.to_owned()),
            currency_symbol: Some(DEFAULT_CURRENCY_SYMBOL.to_owned()),
            page_size: Some(DEFAULT_PAGE_SIZE as i64),
            collapsed_fields: Some(DEFAULT_COLLAPSED_COUNT as i64),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rules {
    pub min_discount_percent: Option<f64>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            min_discount_percent: Some(DEFAULT_MIN_DISCOUNT_PERCENT),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("PROCON_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set PROCON_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(procon_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [api], [storage], [ui], and [rules]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Regenerate it with --print-example-config",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            procon_db::validate_db_path(db_path)?;
        }

        if let Some(base_url) = &self.api.base_url
            && base_url.trim().is_empty()
        {
            bail!(
                "api.base_url in {} is empty; remove it to use the local store",
                path.display()
            );
        }

        if let Some(page_id) = &self.api.page_id
            && page_id.trim().is_empty()
        {
            bail!("api.page_id in {} must not be empty", path.display());
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(page_size) = self.ui.page_size
            && !(1..=procon_db::MAX_PAGE_SIZE as i64).contains(&page_size)
        {
            bail!(
                "ui.page_size in {} must be between 1 and {}, got {}",
                path.display(),
                procon_db::MAX_PAGE_SIZE,
                page_size
            );
        }

        if let Some(collapsed) = self.ui.collapsed_fields
            && collapsed < 0
        {
            bail!(
                "ui.collapsed_fields in {} must be non-negative, got {}",
                path.display(),
                collapsed
            );
        }

        if let Some(floor) = self.rules.min_discount_percent
            && !(0.0..100.0).contains(&floor)
        {
            bail!(
                "rules.min_discount_percent in {} must be at least 0 and below 100, got {}",
                path.display(),
                floor
            );
        }

        Ok(())
    }

    /// Remote endpoint, when one is configured.
    pub fn api_base_url(&self) -> Option<&str> {
        self.api
            .base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    pub fn page_id(&self) -> &str {
        self.api.page_id.as_deref().unwrap_or(DEFAULT_PAGE_ID)
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => procon_db::default_db_path(),
        }
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage.log_path {
            return Ok(PathBuf::from(path));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set storage.log_path in the config")
        })?;
        let app_dir = data_root.join(procon_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create data directory {}", app_dir.display()))?;
        Ok(app_dir.join("procon.log"))
    }

    /// An empty `empty_text` leaves empty cells blank.
    pub fn render_config(&self) -> RenderConfig {
        let empty_text = self
            .ui
            .empty_text
            .clone()
            .unwrap_or_else(|| DEFAULT_EMPTY_TEXT.to_owned());
        RenderConfig {
            empty_text: Some(empty_text).filter(|text| !text.is_empty()),
            currency_symbol: self
                .ui
                .currency_symbol
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY_SYMBOL.to_owned()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.ui
            .page_size
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn collapsed_fields(&self) -> usize {
        self.ui
            .collapsed_fields
            .and_then(|count| usize::try_from(count).ok())
            .unwrap_or(DEFAULT_COLLAPSED_COUNT)
    }

    /// `None` when the floor is switched off with `0`.
    pub fn min_discount_percent(&self) -> Option<f64> {
        let floor = self
            .rules
            .min_discount_percent
            .unwrap_or(DEFAULT_MIN_DISCOUNT_PERCENT);
        (floor > 0.0).then_some(floor)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# procon config\n# Place this file at: {}\n\nversion = 1\n\n[api]\n# Optional. Without base_url the console uses the local SQLite store.\n# base_url = \"http://localhost:8080/api\"\npage_id = \"{}\"\ntimeout = \"{}\"\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/procon/procon.db)\n# db_path = \"/absolute/path/to/procon.db\"\n# log_path = \"/absolute/path/to/procon.log\"\n\n[ui]\nempty_text = \"{}\"\ncurrency_symbol = \"{}\"\npage_size = {}\ncollapsed_fields = {}\n\n[rules]\n# 0 disables the discount floor\nmin_discount_percent = {}\n",
            path.display(),
            DEFAULT_PAGE_ID,
            DEFAULT_TIMEOUT,
            DEFAULT_EMPTY_TEXT,
            DEFAULT_CURRENCY_SYMBOL,
            DEFAULT_PAGE_SIZE,
            DEFAULT_COLLAPSED_COUNT,
            DEFAULT_MIN_DISCOUNT_PERCENT,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
