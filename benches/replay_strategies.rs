//! Benchmark suite for comparing replay strategies
//!
//! Compares the synchronous and asynchronous strategies on generated scripts
//! using the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Each script opens a set of accounts and then mixes payments, card gifts
//! and secured trades between neighbouring users, so the async strategy sees
//! several independent groups per batch.

use card_trade_engine::cli::StrategyType;
use card_trade_engine::config::ExchangeConfig;
use card_trade_engine::strategy::{create_strategy, BatchConfig};
use std::fmt::Write as _;
use std::io::Write;
use tempfile::NamedTempFile;

const SIZES: &[usize] = &[100, 1_000, 10_000];

fn main() {
    divan::main();
}

/// Build a script of roughly `commands` rows
fn generate_script(commands: usize) -> NamedTempFile {
    let users = ((commands / 10).max(4) as u64) & !1;
    let mut script = String::from("op,user,peer,amount,cards,wanted\n");

    for user in 0..users {
        let _ = writeln!(script, "open,{user},,1000,u{user}a u{user}b,");
    }

    // Pairs (2k, 2k+1) trade with each other; payments stay inside the pair.
    let rounds = commands.saturating_sub(users as usize) / 4;
    for round in 0..rounds as u64 {
        let a = (round * 2) % users;
        let b = a + 1;
        let _ = writeln!(script, "pay,{a},{b},1,,");
        let _ = writeln!(script, "give,{a},{b},,u{a}a,");
        let _ = writeln!(script, "propose,{b},{a},,u{a}a,u{a}b");
        let _ = writeln!(script, "confirm,{a},{b},,,");
    }

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(script.as_bytes())
        .expect("Failed to write benchmark script");
    file.flush().expect("Failed to flush benchmark script");
    file
}

#[divan::bench(args = SIZES)]
fn sync_strategy(bencher: divan::Bencher, size: usize) {
    let script = generate_script(size);
    let strategy = create_strategy(StrategyType::Sync, None, ExchangeConfig::default());

    bencher.bench_local(|| {
        let mut output = Vec::new();
        strategy
            .process(script.path(), &mut output)
            .expect("Processing failed");
        output
    });
}

#[divan::bench(args = SIZES)]
fn async_strategy(bencher: divan::Bencher, size: usize) {
    let script = generate_script(size);
    let strategy = create_strategy(
        StrategyType::Async,
        Some(BatchConfig::default()),
        ExchangeConfig::default(),
    );

    bencher.bench_local(|| {
        let mut output = Vec::new();
        strategy
            .process(script.path(), &mut output)
            .expect("Processing failed");
        output
    });
}
