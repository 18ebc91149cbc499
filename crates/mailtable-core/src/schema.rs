//! Column schema shared by every folder table.

use serde::{Deserialize, Serialize};

/// Names of the record columns, in order.
pub const COLUMN_NAMES: [&str; 5] = ["sender", "receiver", "day", "subject", "message"];

/// Column value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Free text.
    Text,
    /// Calendar date formatted `YYYY-MM-DD`.
    Date,
}

/// One column of a folder table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Returns the fixed schema. Every folder has the same columns.
#[must_use]
pub fn columns() -> Vec<Column> {
    COLUMN_NAMES
        .iter()
        .map(|&name| Column {
            name: name.to_string(),
            column_type: if name == "day" {
                ColumnType::Date
            } else {
                ColumnType::Text
            },
        })
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_order() {
        let names: Vec<String> = columns().into_iter().map(|c| c.name).collect();
        assert_eq!(names, COLUMN_NAMES);
    }

    #[test]
    fn test_day_is_date() {
        let day = columns().into_iter().find(|c| c.name == "day").unwrap();
        assert_eq!(day.column_type, ColumnType::Date);
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&columns()[0]).unwrap();
        assert_eq!(json, r#"{"name":"sender","type":"text"}"#);
    }
}
