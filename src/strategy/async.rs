//! Asynchronous batch processing strategy
//!
//! Replays a script in batches on a multi-threaded tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (dependency partitioning + tokio tasks)
//!         └── Exchange (shared, thread-safe)
//! ```
//!
//! Batches are processed one after another, so a user's commands keep their
//! order across batch boundaries. Within a batch, groups of commands that share
//! no user and no card run concurrently.

use crate::config::ExchangeConfig;
use crate::core::{BatchProcessor, Exchange};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_accounts_csv;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for batch processing
///
/// Controls how commands are batched and the number of runtime worker threads.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Number of tokio worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch replay strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    exchange_config: ExchangeConfig,
}

impl AsyncProcessingStrategy {
    /// Create a new AsyncProcessingStrategy
    ///
    /// # Arguments
    ///
    /// * `config` - BatchConfig with batch_size and max_concurrent_batches
    /// * `exchange_config` - Settings for the exchange the script runs against
    pub fn new(config: BatchConfig, exchange_config: ExchangeConfig) -> Self {
        Self {
            config,
            exchange_config,
        }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Replay the script batch by batch and write the final account states
    ///
    /// Fatal errors (file not found, runtime creation, output) are returned.
    /// Invalid rows and failed commands are logged and skipped.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .enable_time()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let exchange = Arc::new(Exchange::new(self.exchange_config.clone()));
            let processor = BatchProcessor::new(Arc::clone(&exchange));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let results = processor.process_batch(batch).await;
                let failed = results.iter().filter(|r| r.result.is_err()).count();
                debug!(applied = results.len(), failed, "batch replayed");
            }

            write_accounts_csv(&exchange.accounts(), output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(config: BatchConfig, content: &str) -> Result<String, String> {
        let file = create_temp_csv(content);
        let strategy = AsyncProcessingStrategy::new(config, ExchangeConfig::default());
        let mut output = Vec::new();
        strategy.process(file.path(), &mut output)?;
        Ok(String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_batch_config_zero_values_fall_back() {
        let config = BatchConfig::new(0, 0);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_concurrent_batches, num_cpus::get());
    }

    #[test]
    fn test_async_strategy_replays_independent_users() {
        let output = run(
            BatchConfig::default(),
            "op,user,peer,amount,cards,wanted\n\
             open,1,,100,,\n\
             open,2,,0,,\n\
             open,3,,40,a,\n\
             open,4,,0,,\n\
             pay,1,2,25,,\n\
             give,3,4,,a,\n",
        )
        .unwrap();

        assert_eq!(
            output,
            "user,balance,cards,banned\n\
             1,75,,false\n\
             2,25,,false\n\
             3,40,,false\n\
             4,0,a,false\n"
        );
    }

    #[test]
    fn test_async_strategy_maintains_ordering_across_batches() {
        // A small batch size forces the trade to span several batches.
        let output = run(
            BatchConfig::new(2, num_cpus::get()),
            "op,user,peer,amount,cards,wanted\n\
             open,1,,100,c1,\n\
             open,2,,50,c2,\n\
             pay,1,2,30,,\n\
             propose,2,1,,c2,c1\n\
             pay,2,1,70,,\n\
             confirm,1,2,,,\n",
        )
        .unwrap();

        assert_eq!(
            output,
            "user,balance,cards,banned\n1,140,c2,false\n2,10,c1,false\n"
        );
    }

    #[test]
    fn test_async_strategy_handles_missing_file() {
        let strategy =
            AsyncProcessingStrategy::new(BatchConfig::default(), ExchangeConfig::default());
        let mut output = Vec::new();

        let result = strategy.process(Path::new("nonexistent.csv"), &mut output);
        assert!(result.unwrap_err().contains("Failed to open file"));
    }
}
