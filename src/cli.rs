//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::catalog_file_adapter::load_catalog;
use crate::adapters::console_report::{format_period, format_signal, format_simulation};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_series_adapter::JsonSeriesStore;
use crate::adapters::json_signal_adapter::SignalFileStore;
use crate::adapters::trade_log_csv::write_trade_log_file;
use crate::domain::catalog::Catalog;
use crate::domain::config_validation::{
    ma_periods, optional_number, validate_data_config, validate_scan_config,
    validate_simulation_config,
};
use crate::domain::error::DevscanError;
use crate::domain::series::SeriesKey;
use crate::domain::signal::{
    scan_store, ScanConfig, ScanReport, Thresholds, DEFAULT_BUY_THRESHOLD, DEFAULT_SELL_THRESHOLD,
    DEFAULT_SIGNAL_PERIOD, DEFAULT_TIMEFRAME,
};
use crate::domain::simulator::{simulate, SimulationParams, SimulationResult, DEFAULT_CASH_PER_BUY};
use crate::ports::config_port::ConfigPort;
use crate::ports::series_port::SeriesPort;
use crate::ports::signal_port::SignalPort;

pub const DEFAULT_DATA_ROOT: &str = "data";
pub const DEFAULT_OUTPUT_DIR: &str = "signals";
pub const BUY_DEV_ENV: &str = "BUY_DEV";
pub const SELL_DEV_ENV: &str = "SELL_DEV";

#[derive(Parser, Debug)]
#[command(
    name = "devscan",
    about = "Moving-average deviation scanner and trading simulator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan every series and write buy/sell signal lists
    Scan {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_root: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, allow_negative_numbers = true)]
        buy_threshold: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        sell_threshold: Option<f64>,
        /// Repeat to scan several time-frames
        #[arg(long)]
        timeframe: Vec<String>,
    },
    /// Run the trading simulator over one series
    Simulate {
        #[arg(long)]
        market: String,
        #[arg(long, default_value = DEFAULT_TIMEFRAME)]
        timeframe: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, allow_hyphen_values = true)]
        buy_threshold: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        sell_threshold: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        cash_per_buy: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_root: Option<PathBuf>,
        /// Write the trade log as CSV
        #[arg(long)]
        trades_csv: Option<PathBuf>,
        /// Print the result as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the last scan result
    Signals {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the latest bar of one series
    Info {
        #[arg(long)]
        market: String,
        #[arg(long, default_value = DEFAULT_TIMEFRAME)]
        timeframe: String,
        #[arg(long)]
        symbol: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        data_root: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Scan {
            config,
            data_root,
            output,
            buy_threshold,
            sell_threshold,
            timeframe,
        } => run_scan(
            config.as_ref(),
            data_root.as_ref(),
            output.as_ref(),
            buy_threshold,
            sell_threshold,
            timeframe,
        ),
        Command::Simulate {
            market,
            timeframe,
            symbol,
            buy_threshold,
            sell_threshold,
            cash_per_buy,
            config,
            data_root,
            trades_csv,
            json,
        } => run_simulate(
            &SeriesKey::new(market, timeframe, symbol),
            OperatorInput {
                buy_threshold: buy_threshold.as_deref(),
                sell_threshold: sell_threshold.as_deref(),
                cash_per_buy: cash_per_buy.as_deref(),
            },
            config.as_ref(),
            data_root.as_ref(),
            trades_csv.as_ref(),
            json,
        ),
        Command::Signals { config, output } => run_signals(config.as_ref(), output.as_ref()),
        Command::Info {
            market,
            timeframe,
            symbol,
            config,
            data_root,
        } => run_info(
            &SeriesKey::new(market, timeframe, symbol),
            config.as_ref(),
            data_root.as_ref(),
        ),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = DevscanError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Without a path every setting takes its default.
pub fn load_optional_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    match path {
        Some(p) => {
            eprintln!("Loading config from {}", p.display());
            load_config(p)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

fn fail(e: &DevscanError) -> ExitCode {
    eprintln!("error: {e}");
    e.into()
}

pub fn resolve_data_root(flag: Option<&PathBuf>, config: &dyn ConfigPort) -> PathBuf {
    flag.cloned()
        .or_else(|| config.get_string("data", "root").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT))
}

pub fn resolve_output_dir(flag: Option<&PathBuf>, config: &dyn ConfigPort) -> PathBuf {
    flag.cloned()
        .or_else(|| config.get_string("scan", "output_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

fn signal_period(config: &dyn ConfigPort) -> u32 {
    u32::try_from(config.get_int("scan", "signal_period", DEFAULT_SIGNAL_PERIOD as i64))
        .unwrap_or(DEFAULT_SIGNAL_PERIOD)
}

pub fn build_scan_config(config: &dyn ConfigPort) -> Result<ScanConfig, DevscanError> {
    let buy = optional_number(config, "scan", "buy_threshold")?.unwrap_or(DEFAULT_BUY_THRESHOLD);
    let sell = optional_number(config, "scan", "sell_threshold")?.unwrap_or(DEFAULT_SELL_THRESHOLD);
    let timeframes = config
        .get_list("scan", "timeframes")
        .unwrap_or_else(|| vec![DEFAULT_TIMEFRAME.to_string()]);

    Ok(ScanConfig {
        thresholds: Thresholds { buy, sell },
        signal_period: signal_period(config),
        timeframes,
    })
}

/// Apply `BUY_DEV` / `SELL_DEV` on top of file settings. `lookup` is the
/// environment reader, injectable for tests.
pub fn apply_env_overrides<F>(scan: &mut ScanConfig, lookup: F) -> Result<(), DevscanError>
where
    F: Fn(&str) -> Option<String>,
{
    let parse = |name: &str| -> Result<Option<f64>, DevscanError> {
        match lookup(name) {
            None => Ok(None),
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(DevscanError::ConfigInvalid {
                    section: "env".to_string(),
                    key: name.to_string(),
                    reason: format!("{raw:?} is not a number"),
                }),
            },
        }
    };
    if let Some(buy) = parse(BUY_DEV_ENV)? {
        scan.thresholds.buy = buy;
    }
    if let Some(sell) = parse(SELL_DEV_ENV)? {
        scan.thresholds.sell = sell;
    }
    Ok(())
}

/// Free-form numeric text typed by the operator; `None` keeps the config value.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorInput<'a> {
    pub buy_threshold: Option<&'a str>,
    pub sell_threshold: Option<&'a str>,
    pub cash_per_buy: Option<&'a str>,
}

pub fn build_simulation_params(
    config: &dyn ConfigPort,
    input: OperatorInput<'_>,
) -> Result<SimulationParams, DevscanError> {
    let base = |key: &str, default: f64| -> Result<String, DevscanError> {
        Ok(optional_number(config, "simulate", key)?
            .unwrap_or(default)
            .to_string())
    };
    let buy = match input.buy_threshold {
        Some(text) => text.to_string(),
        None => base("buy_threshold", DEFAULT_BUY_THRESHOLD)?,
    };
    let sell = match input.sell_threshold {
        Some(text) => text.to_string(),
        None => base("sell_threshold", DEFAULT_SELL_THRESHOLD)?,
    };
    let cash = match input.cash_per_buy {
        Some(text) => text.to_string(),
        None => base("cash_per_buy", DEFAULT_CASH_PER_BUY)?,
    };
    Ok(SimulationParams::from_operator_input(
        &buy,
        &sell,
        &cash,
        signal_period(config),
    ))
}

/// Catalog fragment paths from `[catalog] fragments`, in merge order.
pub fn catalog_paths(config: &dyn ConfigPort) -> Vec<PathBuf> {
    config
        .get_list("catalog", "fragments")
        .unwrap_or_default()
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

/// Scan the store and persist both lists.
pub fn run_scan_pipeline(
    series_port: &dyn SeriesPort,
    signal_port: &dyn SignalPort,
    scan: &ScanConfig,
) -> Result<ScanReport, DevscanError> {
    let report = scan_store(series_port, scan)?;
    signal_port.write_signals(&report.signals)?;
    Ok(report)
}

fn run_scan(
    config_path: Option<&PathBuf>,
    data_root: Option<&PathBuf>,
    output: Option<&PathBuf>,
    buy_threshold: Option<f64>,
    sell_threshold: Option<f64>,
    timeframes: Vec<String>,
) -> ExitCode {
    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_data_config(&adapter).and_then(|_| validate_scan_config(&adapter)) {
        return fail(&e);
    }

    let mut scan = match build_scan_config(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if let Err(e) = apply_env_overrides(&mut scan, |k| std::env::var(k).ok()) {
        return fail(&e);
    }
    if let Some(buy) = buy_threshold {
        scan.thresholds.buy = buy;
    }
    if let Some(sell) = sell_threshold {
        scan.thresholds.sell = sell;
    }
    if !timeframes.is_empty() {
        scan.timeframes = timeframes;
    }
    if scan.thresholds.overlap() {
        eprintln!(
            "warning: buy threshold {} >= sell threshold {}; a symbol can appear in both lists",
            scan.thresholds.buy, scan.thresholds.sell
        );
    }

    let root = resolve_data_root(data_root, &adapter);
    let out_dir = resolve_output_dir(output, &adapter);
    eprintln!(
        "Scanning {} ({}) for dev{} <= {} / >= {}",
        root.display(),
        scan.timeframes.join(", "),
        scan.signal_period,
        scan.thresholds.buy,
        scan.thresholds.sell
    );

    let store = JsonSeriesStore::new(&root);
    let signals = SignalFileStore::new(&out_dir);
    let report = match run_scan_pipeline(&store, &signals, &scan) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    println!("BUY : {}", report.signals.buy.len());
    println!("SELL: {}", report.signals.sell.len());
    eprintln!("{} series scanned", report.scanned);
    if !report.skipped.is_empty() {
        eprintln!("{} series skipped", report.skipped.len());
    }
    eprintln!("Signals written to: {}", out_dir.display());
    ExitCode::SUCCESS
}

pub fn simulate_series(
    port: &dyn SeriesPort,
    key: &SeriesKey,
    params: &SimulationParams,
) -> Result<SimulationResult, DevscanError> {
    let series = port.load_series(key)?;
    log::info!("{key}: {} bars", series.len());
    Ok(simulate(&series, params))
}

fn run_simulate(
    key: &SeriesKey,
    input: OperatorInput<'_>,
    config_path: Option<&PathBuf>,
    data_root: Option<&PathBuf>,
    trades_csv: Option<&PathBuf>,
    json: bool,
) -> ExitCode {
    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_simulation_config(&adapter) {
        return fail(&e);
    }
    let params = match build_simulation_params(&adapter, input) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    for field in params.invalid_fields() {
        eprintln!("warning: {field} is not a number; no trades will be made");
    }
    if params.thresholds_overlap() {
        eprintln!(
            "warning: buy threshold {} >= sell threshold {}; a bar can buy and sell at once",
            params.buy_threshold, params.sell_threshold
        );
    }

    let store = JsonSeriesStore::new(resolve_data_root(data_root, &adapter));
    let result = match simulate_series(&store, key, &params) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{text}"),
            Err(e) => return fail(&DevscanError::from(e)),
        }
    } else {
        print!("{}", format_simulation(key, &params, &result));
    }

    if let Some(path) = trades_csv {
        if let Err(e) = write_trade_log_file(path, &result.trades) {
            return fail(&e);
        }
        eprintln!("Trade log written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

fn load_configured_catalog(config: &dyn ConfigPort) -> Option<Catalog> {
    let paths = catalog_paths(config);
    if paths.is_empty() {
        return None;
    }
    match load_catalog(&paths) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("warning: {e}; listing without names");
            None
        }
    }
}

fn run_signals(config_path: Option<&PathBuf>, output: Option<&PathBuf>) -> ExitCode {
    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let store = SignalFileStore::new(resolve_output_dir(output, &adapter));
    let lists = match store.read_signals() {
        Ok(l) => l,
        Err(e) => return fail(&e),
    };
    let catalog = load_configured_catalog(&adapter);

    println!("=== BUY ({}) ===", lists.buy.len());
    for entry in &lists.buy {
        println!("{}", format_signal(entry, catalog.as_ref()));
    }
    println!("\n=== SELL ({}) ===", lists.sell.len());
    for entry in &lists.sell {
        println!("{}", format_signal(entry, catalog.as_ref()));
    }
    ExitCode::SUCCESS
}

fn run_info(key: &SeriesKey, config_path: Option<&PathBuf>, data_root: Option<&PathBuf>) -> ExitCode {
    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let periods = match ma_periods(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let store = JsonSeriesStore::new(resolve_data_root(data_root, &adapter));
    let series = match store.load_series(key) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    match series.last() {
        Some(last) => {
            print!("{}", format_period(key, last, &periods));
            eprintln!("{} bars", series.len());
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("No bars in {key}");
            ExitCode::SUCCESS
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(&config_path.to_path_buf()) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let checks = validate_data_config(&adapter)
        .and_then(|_| validate_scan_config(&adapter))
        .and_then(|_| validate_simulation_config(&adapter));
    if let Err(e) = checks {
        return fail(&e);
    }

    let scan = match build_scan_config(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    eprintln!("\nScan:");
    eprintln!("  data root:   {}", resolve_data_root(None, &adapter).display());
    eprintln!("  timeframes:  {}", scan.timeframes.join(", "));
    eprintln!("  signal:      dev{}", scan.signal_period);
    eprintln!("  buy  <= {}", scan.thresholds.buy);
    eprintln!("  sell >= {}", scan.thresholds.sell);

    let catalog = catalog_paths(&adapter);
    if !catalog.is_empty() {
        if let Err(e) = load_catalog(&catalog) {
            return fail(&e);
        }
        eprintln!("  catalog:     {} fragments", catalog.len());
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
