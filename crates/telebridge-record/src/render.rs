//! Tabular and JSON renderings of a decoded record.

use std::fmt;

use serde_json::{json, Value};

use crate::codec::TelemetryRecord;
use crate::profile::FieldNameProfile;

/// Number of columns in a rendered row: sender address plus eight fields.
pub const ROW_WIDTH: usize = 9;

/// Header name of the sender address column.
pub const ADDRESS_COLUMN: &str = "address";

/// One cell of a rendered row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Number(u16),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(text) => f.write_str(text),
            Cell::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A rendered record, in [`header_row`] column order.
pub type Row = Vec<Cell>;

/// Field names in declaration order, with the profile's instrument names.
fn field_names(profile: FieldNameProfile) -> [&'static str; 8] {
    let [f1, f2, f3, f4] = profile.field_names();
    ["node_id", "node_subid", "sequence", f1, f2, f3, f4, "battery"]
}

/// Field values in declaration order.
fn field_values(record: &TelemetryRecord) -> [u16; 8] {
    [
        u16::from(record.node_id),
        u16::from(record.node_subid),
        record.sequence,
        record.field_1,
        record.field_2,
        record.field_3,
        record.field_4,
        record.battery,
    ]
}

/// Column names matching [`to_row`].
pub fn header_row(profile: FieldNameProfile) -> Vec<String> {
    std::iter::once(ADDRESS_COLUMN)
        .chain(field_names(profile))
        .map(str::to_string)
        .collect()
}

/// Render a record as a flat row: sender address, then every field.
pub fn to_row(sender: &str, record: &TelemetryRecord) -> Row {
    let mut row = Vec::with_capacity(ROW_WIDTH);
    row.push(Cell::Text(sender.to_string()));
    row.extend(field_values(record).into_iter().map(Cell::Number));
    row
}

/// Render a record as the bus document:
/// `{"values":[{"key":"node_id","value":1}, ...]}`.
pub fn to_json(record: &TelemetryRecord, profile: FieldNameProfile) -> Value {
    let values: Vec<Value> = field_names(profile)
        .into_iter()
        .zip(field_values(record))
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect();

    json!({ "values": values })
}
