//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays every command through a fresh exchange
//! 3. Generates output CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Payments and card gifts
//! - Secured trades (confirm, decline, one-sided gifts)
//! - Wrong confirmers and stale ownership at confirmation
//! - Transfer failures, bans and duplicate card ids
//! - Malformed script rows
//!
//! Each fixture is run with both the sync and the async strategy.

#[cfg(test)]
mod tests {
    use card_trade_engine::cli::StrategyType;
    use card_trade_engine::config::ExchangeConfig;
    use card_trade_engine::strategy::{create_strategy, BatchConfig};
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    /// Run a fixture and compare the output with expected.csv
    ///
    /// # Panics
    ///
    /// Panics if a fixture file cannot be read or the output differs.
    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType, batch: Option<BatchConfig>) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );

        let strategy = create_strategy(strategy_type.clone(), batch, ExchangeConfig::default());
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        strategy
            .process(Path::new(&input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to replay script: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    /// End-to-end test for all fixtures with both strategies
    #[rstest]
    #[case("happy_path")]
    #[case("secured_trade")]
    #[case("wrong_confirmer")]
    #[case("stale_ownership")]
    #[case("transfer_failures")]
    #[case("banned_users")]
    #[case("duplicate_cards")]
    #[case("malformed_data")]
    #[case("multiple_users")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy, None);
    }

    /// Batches of one and two rows split every multi-step flow across batches
    #[rstest]
    #[case("secured_trade")]
    #[case("stale_ownership")]
    #[case("banned_users")]
    fn test_fixtures_with_tiny_batches(#[case] fixture: &str, #[values(1, 2)] batch_size: usize) {
        run_test_fixture(
            fixture,
            StrategyType::Async,
            Some(BatchConfig::new(batch_size, 2)),
        );
    }
}
