use crate::config::ExchangeConfig;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Replay a script of card and currency operations against a fresh exchange
#[derive(Parser, Debug)]
#[command(name = "card-trade-engine")]
#[command(
    about = "Replay card and currency operations and print the final account states",
    long_about = None
)]
pub struct CliArgs {
    /// Input CSV file path containing the replay script
    #[arg(value_name = "INPUT", help = "Path to the input CSV script")]
    pub input_file: PathBuf,

    /// Processing strategy to use for the replay
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for batched replay"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of runtime worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of worker threads replaying batches (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Seconds a secured trade waits for confirmation
    #[arg(
        long = "trade-timeout",
        value_name = "SECS",
        default_value_t = 180,
        help = "Seconds before an unconfirmed secured trade expires"
    )]
    pub trade_timeout: u64,

    /// Refuse every secured trade proposal
    #[arg(long = "disable-secured-trades")]
    pub disable_secured_trades: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(
        long = "log-level",
        value_name = "FILTER",
        default_value = "warn",
        help = "Log level or filter directive (overridden by RUST_LOG)"
    )]
    pub log_level: String,
}

/// Available processing strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to the defaults; zero values are replaced by
    /// `BatchConfig::new` with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create an ExchangeConfig from CLI arguments
    pub fn to_exchange_config(&self) -> ExchangeConfig {
        ExchangeConfig::new(
            Duration::from_secs(self.trade_timeout),
            !self.disable_secured_trades,
        )
    }
}
