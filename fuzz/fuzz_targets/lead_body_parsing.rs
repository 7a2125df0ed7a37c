#![no_main]

//! Fuzz target for lead body parsing.
//!
//! Feeds arbitrary bytes through the intake parser and row projection. Any
//! input must either be rejected with an error or produce a full-width row.

use leadsheet_core::{LeadRecord, HEADER_ROW};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    fuzz_lead_body(data);
});

fn fuzz_lead_body(data: &[u8]) {
    let Ok(record) = LeadRecord::parse(data) else {
        return;
    };

    let row = record.to_row();
    assert_eq!(row.len(), HEADER_ROW.len());

    for (column, cell) in HEADER_ROW.iter().zip(row.cells()) {
        match record.get(column) {
            None => assert!(cell.is_empty()),
            Some(serde_json::Value::String(text)) => assert_eq!(cell, text),
            Some(_) => {},
        }
    }
}
