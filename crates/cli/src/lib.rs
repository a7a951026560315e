use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "openhedge")]
#[command(about = "OpenHedge - Collateralized options vaults with oracle pricing")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "openhedge.yaml", env = "OPENHEDGE_CONFIG")]
    pub config: PathBuf,

    /// Log output format, overriding the configured one
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true)]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "openhedge.yaml")]
        output: PathBuf,
    },

    /// Validate the configuration file
    Validate,

    /// Compute a fair price offline from a candle file
    Price {
        /// JSON array of `{ "startTime": .., "close": .. }` candles
        #[arg(long)]
        candles: PathBuf,

        /// Current price of one whole base unit, in quote minor units
        #[arg(long)]
        spot: f64,

        /// Strike in quote minor units per whole base unit
        #[arg(long)]
        strike: f64,

        /// Maturity as a unix timestamp
        #[arg(long)]
        maturity: u64,

        /// Valuation time as a unix timestamp
        #[arg(long)]
        now: u64,

        #[arg(long, value_enum, default_value = "put")]
        kind: OptionKindArg,
    },

    /// Execute an instruction script against an in-memory ledger
    Replay {
        /// YAML script with assets, balances and steps
        #[arg(short, long)]
        script: PathBuf,
    },

    /// Oracle operations against the live candle feed
    Oracle {
        #[command(subcommand)]
        command: OracleCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum OracleCommands {
    /// Replay a script, then answer every ticket it left issued from the configured feed
    Sweep {
        /// YAML script building the ledger state
        #[arg(short, long)]
        script: PathBuf,

        /// Valuation time as a unix timestamp
        #[arg(long)]
        now: u64,

        /// First ledger event sequence to scan for issued tickets
        #[arg(long, default_value_t = 1)]
        from_sequence: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionKindArg {
    Put,
    Call,
}

impl OptionKindArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKindArg::Put => "put",
            OptionKindArg::Call => "call",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_arguments() {
        let cli = Cli::try_parse_from([
            "openhedge",
            "price",
            "--candles",
            "btc.json",
            "--spot",
            "24900000000",
            "--strike",
            "25000000000",
            "--maturity",
            "1700604840",
            "--now",
            "1700000040",
            "--kind",
            "call",
        ])
        .unwrap();
        match cli.command {
            Commands::Price { kind, maturity, .. } => {
                assert_eq!(kind, OptionKindArg::Call);
                assert_eq!(maturity, 1_700_604_840);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("openhedge.yaml"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "openhedge",
            "replay",
            "--script",
            "s.yaml",
            "--log-format",
            "json",
            "--config",
            "other.yaml",
        ])
        .unwrap();
        assert_eq!(cli.log_format, Some(LogFormatArg::Json));
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert!(matches!(cli.command, Commands::Replay { .. }));
    }

    #[test]
    fn test_oracle_sweep_arguments() {
        let cli = Cli::try_parse_from([
            "openhedge",
            "oracle",
            "sweep",
            "--script",
            "put.yaml",
            "--now",
            "1700604900",
        ])
        .unwrap();
        match cli.command {
            Commands::Oracle {
                command: OracleCommands::Sweep { now, from_sequence, .. },
            } => {
                assert_eq!(now, 1_700_604_900);
                assert_eq!(from_sequence, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
