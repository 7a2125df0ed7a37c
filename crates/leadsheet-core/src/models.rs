//! Lead records, the fixed header row and cell coercion.
//!
//! A lead arrives as an arbitrary JSON object. Only the ten header fields are
//! kept; everything else is dropped. Values are never validated, only turned
//! into display strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{LeadsheetError, Result};

/// Default name of the table leads are appended to.
pub const DEFAULT_TABLE_NAME: &str = "Leads";

/// Column names of the header row, in column order.
pub const HEADER_ROW: [&str; 10] = [
    "created_at",
    "niche",
    "name",
    "phone",
    "email",
    "budget",
    "region",
    "timeframe",
    "contacted_before",
    "status",
];

/// Body used when a request arrives without one.
const EMPTY_BODY_FALLBACK: &str = "{}";

/// One table row as an ordered list of string cells.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Vec<String>);

impl Row {
    /// The fixed header row.
    pub fn header() -> Self {
        Self(HEADER_ROW.iter().map(|name| (*name).to_string()).collect())
    }

    /// Cells in column order.
    pub fn cells(&self) -> &[String] {
        &self.0
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no cells at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this row equals the fixed header row.
    pub fn is_header(&self) -> bool {
        self.0.iter().map(String::as_str).eq(HEADER_ROW.iter().copied())
    }

    /// Consumes the row and returns its cells.
    pub fn into_cells(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for Row {
    fn from(cells: Vec<String>) -> Self {
        Self(cells)
    }
}

/// Handle to a table inside the bound document.
///
/// Backends that address tables by a numeric id (spreadsheet tabs) keep it
/// alongside the name; others leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Table name, unique within the document.
    pub name: String,
    /// Backend-specific numeric id, when the backend has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl TableRef {
    /// Creates a reference addressed by name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), id: None }
    }

    /// Attaches a backend id.
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A lead as submitted by the caller.
///
/// Holds the raw JSON object; header fields are looked up on demand and
/// unknown fields are carried but never written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeadRecord {
    fields: Map<String, Value>,
}

impl LeadRecord {
    /// Parses a request body.
    ///
    /// An empty body is treated as `{}`. A top-level array, string, number or
    /// boolean has no named fields and yields an empty record.
    ///
    /// # Errors
    ///
    /// Returns `LeadsheetError::Parse` for invalid UTF-8, malformed JSON, or a
    /// top-level `null`.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(body)?;
        let text = if text.is_empty() { EMPTY_BODY_FALLBACK } else { text };

        match serde_json::from_str::<Value>(text)? {
            Value::Object(fields) => Ok(Self { fields }),
            Value::Null => Err(LeadsheetError::parse("cannot read fields of null")),
            Value::Array(_) | Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                Ok(Self::default())
            },
        }
    }

    /// Wraps an already-parsed JSON object.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns the raw value of a field, if the key is present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Number of keys in the submitted object, header fields or not.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Builds the data row in header order.
    ///
    /// Present keys are coerced with [`coerce_cell`], including falsy values
    /// such as `0`, `false` and `""`. Absent keys become empty cells.
    pub fn to_row(&self) -> Row {
        HEADER_ROW
            .iter()
            .map(|field| self.get(field).map(coerce_cell).unwrap_or_default())
            .collect::<Vec<_>>()
            .into()
    }
}

impl From<Map<String, Value>> for LeadRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

/// Converts a JSON value into the string written to a cell.
///
/// Strings pass through unchanged, numbers are written the way a spreadsheet
/// displays them (see [`number_text`]), booleans as `true`/`false`, `null`
/// becomes a blank cell, arrays and objects are written as compact JSON.
pub fn coerce_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Formats a JSON number with ECMAScript `Number#toString` rules.
///
/// Integral floats lose their fraction (`500.0` is `"500"`), magnitudes in
/// `[1e-6, 1e21)` are written in positional notation, and everything else
/// uses an exponent with an explicit sign (`1.5e+300`, `1e-7`).
pub fn number_text(number: &Number) -> String {
    if let Some(i) = number.as_i64() {
        return i.to_string();
    }
    if let Some(u) = number.as_u64() {
        return u.to_string();
    }
    match number.as_f64() {
        Some(f) => float_text(f),
        None => number.to_string(),
    }
}

fn float_text(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&value.abs()) {
        // Display is shortest round-trip and never uses an exponent.
        return value.to_string();
    }

    let scientific = format!("{value:e}");
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        },
        _ => scientific,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> LeadRecord {
        match value {
            Value::Object(map) => LeadRecord::from_map(map),
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn header_row_has_fixed_order() {
        insta::assert_json_snapshot!(Row::header(), @r###"
        [
          "created_at",
          "niche",
          "name",
          "phone",
          "email",
          "budget",
          "region",
          "timeframe",
          "contacted_before",
          "status"
        ]
        "###);
        assert!(Row::header().is_header());
    }

    #[test]
    fn full_record_maps_in_header_order() {
        let lead = record(json!({
            "status": "hot",
            "name": "Anna",
            "created_at": "2024-05-01T10:00:00Z",
            "niche": "Mortgage",
            "phone": "+15550001111",
            "email": "anna@example.com",
            "budget": "100 000–300 000$",
            "region": "North",
            "timeframe": "Within a month",
            "contacted_before": "no",
        }));

        assert_eq!(lead.to_row().cells(), [
            "2024-05-01T10:00:00Z",
            "Mortgage",
            "Anna",
            "+15550001111",
            "anna@example.com",
            "100 000–300 000$",
            "North",
            "Within a month",
            "no",
            "hot",
        ]);
    }

    #[test]
    fn missing_fields_become_empty_cells() {
        let row = record(json!({ "name": "Bob" })).to_row();

        assert_eq!(row.len(), HEADER_ROW.len());
        assert_eq!(row.cells()[2], "Bob");
        assert!(row.cells().iter().enumerate().all(|(i, cell)| i == 2 || cell.is_empty()));
    }

    #[test]
    fn falsy_values_are_kept() {
        let row = record(json!({ "budget": 0, "status": false, "name": "" })).to_row();

        assert_eq!(row.cells()[5], "0");
        assert_eq!(row.cells()[9], "false");
        assert_eq!(row.cells()[2], "");
    }

    #[test]
    fn extra_fields_are_dropped() {
        let lead = record(json!({ "phone": "1", "budget_key": "mid", "timeframe_key": "week" }));

        assert_eq!(lead.field_count(), 3);
        assert_eq!(lead.to_row().len(), 10);
        assert!(!lead.to_row().cells().iter().any(|c| c == "mid" || c == "week"));
    }

    #[test]
    fn coercion_of_scalar_and_compound_values() {
        assert_eq!(coerce_cell(&json!("text")), "text");
        assert_eq!(coerce_cell(&json!(500)), "500");
        assert_eq!(coerce_cell(&json!(-2.5)), "-2.5");
        assert_eq!(coerce_cell(&json!(true)), "true");
        assert_eq!(coerce_cell(&Value::Null), "");
        assert_eq!(coerce_cell(&json!([1, "a"])), r#"[1,"a"]"#);
        assert_eq!(coerce_cell(&json!({"k": 1})), r#"{"k":1}"#);
    }

    #[test]
    fn empty_body_parses_as_empty_object() {
        let lead = LeadRecord::parse(b"").unwrap();

        assert_eq!(lead, LeadRecord::parse(b"{}").unwrap());
        assert!(lead.to_row().cells().iter().all(String::is_empty));
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        assert!(matches!(LeadRecord::parse(b"{bad"), Err(LeadsheetError::Parse { .. })));
        assert!(matches!(LeadRecord::parse(&[0xff, 0xfe]), Err(LeadsheetError::Parse { .. })));
        assert!(matches!(LeadRecord::parse(b"null"), Err(LeadsheetError::Parse { .. })));
        assert!(matches!(LeadRecord::parse(b" null "), Err(LeadsheetError::Parse { .. })));
    }

    #[test]
    fn non_object_bodies_yield_blank_rows() {
        let bodies: [&[u8]; 5] = [b"[1,2]", b"5", br#""text""#, b"true", br#"["name"]"#];
        for body in bodies {
            let lead = LeadRecord::parse(body).unwrap();

            assert_eq!(lead.field_count(), 0, "{}", String::from_utf8_lossy(body));
            assert_eq!(lead.to_row().len(), HEADER_ROW.len());
            assert!(lead.to_row().cells().iter().all(String::is_empty));
        }
    }

    #[test]
    fn numbers_are_written_like_a_spreadsheet_displays_them() {
        let row = LeadRecord::parse(br#"{"budget":500.0,"region":1e3,"status":1.5e300}"#)
            .unwrap()
            .to_row();

        assert_eq!(row.cells()[5], "500");
        assert_eq!(row.cells()[6], "1000");
        assert_eq!(row.cells()[9], "1.5e+300");
    }

    #[test]
    fn float_formatting_matches_number_to_string() {
        let cases = [
            (json!(-0.0), "0"),
            (json!(2.0), "2"),
            (json!(-42.0), "-42"),
            (json!(0.1), "0.1"),
            (json!(0.30000000000000004), "0.30000000000000004"),
            (json!(9007199254740992.0), "9007199254740992"),
            (json!(1e20), "100000000000000000000"),
            (json!(1e21), "1e+21"),
            (json!(0.000001), "0.000001"),
            (json!(1e-7), "1e-7"),
            (json!(-2.5e-9), "-2.5e-9"),
            (json!(u64::MAX), "18446744073709551615"),
        ];

        for (value, expected) in cases {
            assert_eq!(coerce_cell(&value), expected, "{value}");
        }
    }

    #[test]
    fn table_ref_displays_name() {
        let table = TableRef::named("Leads").with_id(7);

        assert_eq!(table.to_string(), "Leads");
        assert_eq!(table.id, Some(7));
    }
}
