//! JSON dataset files.
//!
//! Layout:
//!
//! ```json
//! {
//!   "columns": [
//!     { "name": "frequency", "values": [3.10e6, 3.11e6, ...] },
//!     { "name": "psd",       "values": [1.2e-12, null, ...] }
//!   ],
//!   "metadata": { "ENBW": 30.0, "Vpi": 6.5 }
//! }
//! ```
//!
//! `null` samples read as NaN (and NaN is written back as `null`).

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::Metadata;
use crate::error::StoreError;
use crate::io::store::{Column, DatasetStore, Table};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStore;

#[derive(Serialize, Deserialize)]
struct JsonTable {
    columns: Vec<JsonColumn>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Serialize, Deserialize)]
struct JsonColumn {
    name: String,
    values: Vec<Option<f64>>,
}

impl DatasetStore for JsonStore {
    fn format_name(&self) -> &'static str {
        "json"
    }

    fn read_table(&self, path: &Path) -> Result<Table, StoreError> {
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        let raw: JsonTable = serde_json::from_reader(BufReader::new(file))?;

        let columns = raw
            .columns
            .into_iter()
            .map(|c| Column {
                name: c.name,
                values: c.values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect(),
            })
            .collect();
        Ok(Table {
            columns,
            metadata: raw.metadata,
        })
    }

    fn encode(&self, table: &Table, file: File) -> Result<(), StoreError> {
        let raw = JsonTable {
            columns: table
                .columns
                .iter()
                .map(|c| JsonColumn {
                    name: c.name.clone(),
                    values: c
                        .values
                        .iter()
                        .map(|v| v.is_finite().then_some(*v))
                        .collect(),
                })
                .collect(),
            metadata: table.metadata.clone(),
        };

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &raw)?;
        writer.flush().map_err(serde_json::Error::io)?;
        Ok(())
    }
}
