//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over ledger commands from a replay script.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<LedgerCommand, String>` for each CSV row:
//!
//! ```no_run
//! use card_trade_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("script.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(command) => println!("Replaying: {:?}", command),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `new()`
//! - Individual row errors are yielded as Err variants, with the line number

use crate::io::csv_format::{convert_script_record, ScriptRecord};
use crate::types::LedgerCommand;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Streaming reader over a replay script
#[derive(Debug)]
pub struct SyncReader {
    /// CSV reader over the script file
    reader: csv::Reader<File>,

    /// Data rows consumed so far (the header is line 1)
    line_num: usize,
}

impl SyncReader {
    /// Open a replay script
    ///
    /// # Errors
    ///
    /// Returns an error string if the file cannot be opened.
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<LedgerCommand, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<ScriptRecord>();

        let row = deserializer.next()?;
        self.line_num += 1;
        let line = self.line_num + 1;

        Some(match row {
            Ok(record) => convert_script_record(record).map_err(|e| format!("Line {}: {}", line, e)),
            Err(e) => Err(format!("Line {}: CSV parse error: {}", line, e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_card_set, TransferRequest};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "op,user,peer,amount,cards,wanted\n";

    fn create_temp_csv(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(HEADER.as_bytes())
            .and_then(|_| file.write_all(body.as_bytes()))
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_sync_reader_new_fails_on_missing_file() {
        let result = SyncReader::new(Path::new("nonexistent.csv"));
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_sync_reader_iterates_commands_in_order() {
        let file = create_temp_csv(
            "open,1,,100,c1 c2,\n\
             pay,1,2,30,,\n\
             propose,1,2,,c1,c9\n\
             sweep,,,,,\n",
        );

        let records: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(
            records,
            vec![
                Ok(LedgerCommand::Open {
                    user: 1,
                    balance: 100,
                    cards: parse_card_set("c1 c2"),
                }),
                Ok(LedgerCommand::Transfer(TransferRequest::currency(1, 2, 30))),
                Ok(LedgerCommand::Propose {
                    initiator: 1,
                    counterparty: 2,
                    offered: parse_card_set("c1"),
                    requested: parse_card_set("c9"),
                }),
                Ok(LedgerCommand::Sweep),
            ]
        );
    }

    #[test]
    fn test_sync_reader_includes_line_numbers_and_continues() {
        let file = create_temp_csv(
            "open,1,,100,,\n\
             pay,1,2,lots,,\n\
             steal,1,2,,,\n\
             ban,x,,,,\n\
             ban,1,,,,\n",
        );

        let records: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(records.len(), 5);
        assert!(records[0].is_ok());
        let amount = records[1].as_ref().unwrap_err();
        assert!(amount.contains("Line 3") && amount.contains("Invalid amount"));
        let op = records[2].as_ref().unwrap_err();
        assert!(op.contains("Line 4") && op.contains("Invalid operation"));
        let parse = records[3].as_ref().unwrap_err();
        assert!(parse.contains("Line 5") && parse.contains("CSV parse error"));
        assert_eq!(records[4], Ok(LedgerCommand::Ban { user: 1 }));
    }

    #[test]
    fn test_sync_reader_handles_whitespace_and_short_rows() {
        let file = create_temp_csv("  give , 1 , 2 ,, c3  c4 ,\nsweep\n");

        let records: Vec<_> = SyncReader::new(file.path())
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert_eq!(
            records,
            vec![
                LedgerCommand::Transfer(TransferRequest::cards(1, 2, parse_card_set("c3 c4"))),
                LedgerCommand::Sweep,
            ]
        );
    }

    #[test]
    fn test_sync_reader_handles_empty_file_after_header() {
        let file = create_temp_csv("");
        assert_eq!(SyncReader::new(file.path()).unwrap().count(), 0);
    }
}
