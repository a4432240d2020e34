// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod catalog;
mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use procon_app::ConsoleState;
use procon_db::Store;
use procon_testkit::VOUCHER_API;
use procon_tui::{ConsoleOptions, ViewData};
use runtime::Backend;
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PROCON_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `procon --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    if options.check_only {
        init_logging(None)?;
    } else {
        init_logging(Some(&config.log_path()?))?;
    }

    let schema = catalog::voucher_schema(config.min_discount_percent())?;
    let mut backend = open_backend(&config, options.demo)?;
    let page_id = config.page_id().to_owned();

    if options.check_only {
        let rows = backend
            .check(&page_id, VOUCHER_API)
            .with_context(|| format!("check backend {}", backend.describe()))?;
        println!(
            "ok: {rows} {VOUCHER_API} rows via {}",
            backend.describe()
        );
        return Ok(());
    }

    info!(backend = %backend.describe(), "starting console");
    let view_data = ViewData::new(
        schema,
        ConsoleOptions {
            page_id,
            api: VOUCHER_API.to_owned(),
            page_size: config.page_size(),
            collapsed_fields: config.collapsed_fields(),
            render: config.render_config(),
        },
    );
    let mut state = ConsoleState::default();
    procon_tui::run_console(&mut state, &mut backend, view_data)
}

/// `--demo` always runs on a seeded in-memory store; otherwise a configured
/// `api.base_url` wins over the local database.
fn open_backend(config: &Config, demo: bool) -> Result<Backend> {
    if !demo && let Some(base_url) = config.api_base_url() {
        let client = procon_api::Client::new(base_url, config.api_timeout()?)
            .context("invalid [api] config; fix base_url/timeout values")?;
        return Ok(Backend::Remote(client));
    }

    let db_path = if demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or PROCON_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if demo {
        let rows = catalog::seed_demo(&store)?;
        info!(rows, "seeded demo catalog");
    }
    Ok(Backend::Local(store))
}

/// Logs go to `log_file` so the terminal UI stays clean, or to stderr for
/// one-shot commands. `PROCON_LOG` takes an `EnvFilter` directive.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| {
                    format!(
                        "open log file {} -- set [storage].log_path to a writable file",
                        path.display()
                    )
                })?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    };
    installed.map_err(|error| anyhow!("install logger: {error}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("procon");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Launch with a seeded in-memory catalog");
    println!("  --check                  Validate config and reach the backend, then exit");
    println!("  --help                   Show this help");
    println!();
    println!("Set {LOG_ENV} (for example {LOG_ENV}=debug) to change log verbosity.");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, open_backend, parse_cli_args};
    use crate::config::Config;
    use anyhow::Result;
    use procon_testkit::{PAGE_ID, VOUCHER_API};
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/procon-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check", "--demo"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(options.demo);
        assert!(!options.show_help);

        assert!(parse_cli_args(vec!["-h"], default_options_path())?.show_help);
        Ok(())
    }

    #[test]
    fn demo_backend_is_seeded_even_with_a_remote_configured() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "version = 1\n[api]\nbase_url = \"http://127.0.0.1:1/api\"\n",
        )?;
        let config = Config::load(&path)?;

        let mut backend = open_backend(&config, true)?;
        assert_eq!(backend.describe(), "local store");
        assert_eq!(backend.check(PAGE_ID, VOUCHER_API)?, 60);

        let remote = open_backend(&config, false)?;
        assert_eq!(remote.describe(), "http://127.0.0.1:1/api");
        Ok(())
    }
}
