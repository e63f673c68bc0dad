//! Row set to JSON encoding.
//!
//! The reply is an array with one object per row. Object keys follow the
//! column order the driver reported, which a plain JSON map would not keep,
//! so rows are serialized straight from the cells. A name reported twice (as
//! in `SELECT * FROM a JOIN b`) appears once, holding the later value.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::dispatch::executor::{Cell, RowSet};
use crate::error::DispatchError;

pub fn encode_rows(rows: &RowSet) -> Result<Vec<u8>, DispatchError> {
    serde_json::to_vec(&JsonRows(rows)).map_err(|e| DispatchError::Encoding(e.to_string()))
}

struct JsonRows<'a>(&'a RowSet);

struct JsonRow<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

struct JsonCell<'a>(&'a Cell);

impl Serialize for JsonRows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.rows.len()))?;
        for cells in &self.0.rows {
            seq.serialize_element(&JsonRow {
                columns: &self.0.columns,
                cells,
            })?;
        }
        seq.end()
    }
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.columns.len() != self.cells.len() {
            return Err(S::Error::custom(format!(
                "row has {} cells for {} columns",
                self.cells.len(),
                self.columns.len()
            )));
        }
        // A repeated column name keeps its first position and its last value.
        let unique = self
            .columns
            .iter()
            .enumerate()
            .filter(|&(i, column)| !self.columns[..i].contains(column))
            .count();
        let mut map = serializer.serialize_map(Some(unique))?;
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].contains(column) {
                continue;
            }
            let last = self.columns.iter().rposition(|c| c == column).unwrap_or(i);
            map.serialize_entry(column, &JsonCell(&self.cells[last]))?;
        }
        map.end()
    }
}

impl Serialize for JsonCell<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Cell::Null => serializer.serialize_unit(),
            Cell::Integer(i) => serializer.serialize_i64(*i),
            Cell::Real(f) if f.is_finite() => serializer.serialize_f64(*f),
            Cell::Real(f) => Err(S::Error::custom(format!("{f} has no JSON representation"))),
            Cell::Text(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => serializer.serialize_str(text),
                Err(e) => Err(S::Error::custom(format!("TEXT value is not UTF-8: {e}"))),
            },
            Cell::Blob(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
        }
    }
}
