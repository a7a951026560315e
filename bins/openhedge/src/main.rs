//! OpenHedge CLI Binary
//!
//! Entry point for configuration management, offline pricing and
//! scripted replays of the protocol against an in-memory ledger.

mod price;
mod replay;
#[cfg(feature = "client")]
mod sweep;

use anyhow::{Context, Result};
use cli::{Cli, Commands, OptionKindArg, OracleCommands};
use common::OptionKind;
use config::{generate_default_config, load_config, save_config, validate_config, ProtocolConfig};
use observability::{init_logging, init_metrics, LogFormat};
use oracle::pricing_params;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::price::{load_candles, offline_fair_price, PriceRequest};
use crate::replay::{Replay, Script};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Configured format unless overridden on the command line
    let configured = load_config(&cli.config).ok();
    let format = match (cli.log_format, &configured) {
        (Some(arg), _) => LogFormat::from_config(arg.as_str()),
        (None, Some(config)) => LogFormat::from_config(&config.logging.format),
        (None, None) => LogFormat::Pretty,
    };
    init_logging("openhedge", format)?;
    debug!(?cli, "CLI arguments parsed");

    if let Some(port) = cli.metrics_port {
        init_metrics(port)?;
    }

    match cli.command {
        Commands::Init { output } => {
            info!("Executing 'init' command");
            init_command(&output)
        }
        Commands::Validate => {
            info!("Executing 'validate' command");
            validate_command(&cli.config)
        }
        Commands::Price {
            candles,
            spot,
            strike,
            maturity,
            now,
            kind,
        } => {
            info!("Executing 'price' command");
            let config = configured.unwrap_or_else(generate_default_config);
            let request = PriceRequest {
                spot,
                strike,
                maturity,
                now,
                kind: option_kind(kind),
            };
            price_command(&config, &candles, &request)
        }
        Commands::Replay { script } => {
            info!("Executing 'replay' command");
            let config = match configured {
                Some(config) => config,
                None => {
                    warn!(path = ?cli.config, "No readable configuration, replaying with defaults");
                    generate_default_config()
                }
            };
            replay_command(&config, &script).await
        }
        Commands::Oracle {
            command:
                OracleCommands::Sweep {
                    script,
                    now,
                    from_sequence,
                },
        } => {
            info!("Executing 'oracle sweep' command");
            let config = configured.with_context(|| format!("Failed to load configuration: {:?}", cli.config))?;
            sweep_command(&config, &script, now, from_sequence).await
        }
    }
}

fn option_kind(arg: OptionKindArg) -> OptionKind {
    match arg {
        OptionKindArg::Put => OptionKind::Put,
        OptionKindArg::Call => OptionKind::Call,
    }
}

fn validate_command(config_path: &Path) -> Result<()> {
    info!(path = ?config_path, "Validating configuration");

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Oracle key: {}", config.protocol.oracle_key);
    println!("Freeze window: {}s", config.protocol.freeze_seconds);
    println!(
        "Fee rate: {} ({} to the frontend)",
        config.protocol.protocol_fee_rate, config.protocol.frontend_share
    );
    println!("Supported pairs: {}", config.oracle.supported_pairs.len());
    for pair in &config.oracle.supported_pairs {
        println!("  - {}", pair.symbol);
    }

    Ok(())
}

fn init_command(output_path: &Path) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Set oracle_key, protocol_treasury and fee_asset to real keys");
    println!("  2. List the asset pairs the oracle prices under oracle.supported_pairs");
    println!(
        "  3. Run 'openhedge validate --config {:?}' to check configuration",
        output_path
    );

    Ok(())
}

fn price_command(config: &ProtocolConfig, candles_path: &Path, request: &PriceRequest) -> Result<()> {
    let candles = load_candles(candles_path)?;
    info!(candles = candles.len(), path = ?candles_path, "Loaded candles");

    let quote = offline_fair_price(request, candles, &pricing_params(&config.oracle))?;
    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}

fn load_script(script_path: &Path) -> Result<Script> {
    let content = std::fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read replay script: {:?}", script_path))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse replay script: {:?}", script_path))
}

async fn replay_command(config: &ProtocolConfig, script_path: &Path) -> Result<()> {
    let script = load_script(script_path)?;

    let mut replay = Replay::new(config, &script)?;
    let reports = replay.run(&script.steps).await?;
    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }

    let summaries = replay.summaries().await?;
    println!("{}", serde_yaml::to_string(&summaries)?);

    let violations: usize = summaries.iter().map(|s| s.violations.len()).sum();
    if violations > 0 {
        anyhow::bail!("{} vault invariant violations after replay", violations);
    }
    info!(steps = reports.len(), vaults = summaries.len(), "Replay finished");
    Ok(())
}

#[cfg(feature = "client")]
async fn sweep_command(config: &ProtocolConfig, script_path: &Path, now: u64, from_sequence: u64) -> Result<()> {
    let oracle = sweep::live_oracle(config)?;
    let script = load_script(script_path)?;
    let mut replay = Replay::new(config, &script)?;
    replay.run(&script.steps).await?;

    let result = sweep::sweep(&oracle, &replay, from_sequence, now).await;
    for line in sweep::lines(&result, &replay) {
        println!("{}", serde_json::to_string(&line)?);
    }
    println!("next_sequence: {}", result.next_sequence);
    Ok(())
}

#[cfg(not(feature = "client"))]
async fn sweep_command(_config: &ProtocolConfig, _script_path: &Path, _now: u64, _from_sequence: u64) -> Result<()> {
    anyhow::bail!("'oracle sweep' needs the remote candle feed; rebuild with the 'client' feature")
}
