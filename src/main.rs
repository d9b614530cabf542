//! Card Trade Engine CLI
//!
//! Replays a CSV script of ledger commands and prints the final account states.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- script.csv > accounts.csv
//! cargo run -- --strategy sync script.csv > accounts.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 script.csv > accounts.csv
//! cargo run -- --trade-timeout 60 --log-level debug script.csv > accounts.csv
//! ```
//!
//! Account rows go to stdout; logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, output failure, etc.)

use card_trade_engine::cli;
use card_trade_engine::strategy;
use std::process;

fn main() {
    let args = cli::parse_args();
    cli::init_logging(&args.log_level);

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), config, args.to_exchange_config())
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
