//! Synchronous processing strategy
//!
//! Replays a script one command at a time, in file order, on the calling
//! thread.
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Command semantics to `Exchange`
//! - CSV output to `csv_format::write_accounts_csv`
//!
//! Memory use is bounded by the number of accounts and open trades, not by
//! the length of the script.

use crate::config::ExchangeConfig;
use crate::core::Exchange;
use crate::io::csv_format::write_accounts_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Sequential replay strategy
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    config: ExchangeConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: ExchangeConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let exchange = Exchange::new(self.config.clone());
        let reader = SyncReader::new(input_path)?;

        for result in reader {
            match result {
                Ok(command) => {
                    let op = command.name();
                    if let Err(e) = exchange.process(command) {
                        warn!(op, error = %e, "command failed");
                    }
                }
                Err(e) => warn!(error = %e, "skipping invalid script row"),
            }
        }

        write_accounts_csv(&exchange.accounts(), output)
    }
}
