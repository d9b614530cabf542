//! Processing strategy module for script replay
//!
//! This module defines the Strategy pattern for complete replay pipelines,
//! encompassing both CSV parsing and command application. This allows different
//! processing implementations (synchronous, asynchronous batch) to be selected
//! at runtime.

use crate::cli::StrategyType;
use crate::config::ExchangeConfig;
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete replay pipelines
///
/// Each strategy reads ledger commands from a CSV script, applies them to a
/// fresh exchange, and writes the final account states to output.
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the script at `input_path` and write results to `output`
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the replay completed (individual commands may have failed)
    /// * `Err(String)` if a fatal error occurred
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened
    /// - The async runtime cannot be created
    /// - Output cannot be written
    ///
    /// Invalid rows and failed commands are logged and skipped; they never
    /// abort the replay.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `config` - Optional configuration for async batch processing (ignored for sync)
/// * `exchange_config` - Settings for the exchange the script runs against
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    exchange_config: ExchangeConfig,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(exchange_config)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config, exchange_config))
        }
    }
}
