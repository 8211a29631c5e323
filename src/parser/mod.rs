// Parser module: quote scanning, CREATE TABLE column extraction and INSERT
// tuple/value splitting. Everything here is pure; I/O lives in the driver.

pub mod insert;
pub mod scanner;
pub mod schema;

use serde::Serialize;

// Ordered column names of the target table, in declaration order.
pub type Schema = Vec<String>;

// One output row. After normalization its length equals the schema length.
pub type Row = Vec<String>;

// What to do with a tuple whose value count differs from the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArityPolicy {
    // Pad short tuples with empty values, truncate long ones.
    #[default]
    Lenient,
    // Skip mismatched tuples.
    Strict,
}

// Outcome of fitting one tuple to the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Exact(Row),
    // Padded or truncated from `found` values.
    Adjusted { row: Row, found: usize },
    Rejected { found: usize },
}

// Fit a tuple's values to `width` columns according to `policy`.
pub fn normalize_row(mut values: Row, width: usize, policy: ArityPolicy) -> Normalized {
    let found = values.len();
    if found == width {
        return Normalized::Exact(values);
    }
    match policy {
        ArityPolicy::Strict => Normalized::Rejected { found },
        ArityPolicy::Lenient => {
            values.resize(width, String::new());
            Normalized::Adjusted { row: values, found }
        }
    }
}

// Reorder values from an explicit INSERT column list into schema order.
// Schema columns missing from the list become empty; extra list columns are dropped.
pub fn project_row(schema: &[String], columns: &[String], values: Row) -> Row {
    let mut slots: Vec<Option<String>> = values.into_iter().map(Some).collect();
    schema
        .iter()
        .map(|col| {
            columns
                .iter()
                .position(|c| c == col)
                .and_then(|idx| slots.get_mut(idx).and_then(Option::take))
                .unwrap_or_default()
        })
        .collect()
}
