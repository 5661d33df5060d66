//! Parquet dataset files.
//!
//! Every numeric column (any integer or float type) is read as `f64`; nulls
//! become NaN and non-numeric columns are skipped. Dataset metadata lives in
//! the Arrow schema metadata, one entry per key with a JSON-encoded value, so
//! types survive a round trip.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::domain::{Metadata, MetadataValue};
use crate::error::StoreError;
use crate::io::store::{Column, DatasetStore, Table};

#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetStore;

impl DatasetStore for ParquetStore {
    fn format_name(&self) -> &'static str {
        "parquet"
    }

    fn read_table(&self, path: &Path) -> Result<Table, StoreError> {
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let metadata = decode_metadata(schema.metadata());

        let mut numeric = Vec::new();
        for (idx, field) in schema.fields().iter().enumerate() {
            if field.data_type().is_numeric() {
                numeric.push(idx);
            } else {
                debug!(
                    "{}: skipping non-numeric column '{}' ({:?})",
                    path.display(),
                    field.name(),
                    field.data_type()
                );
            }
        }
        let mut columns: Vec<Column> = numeric
            .iter()
            .map(|&idx| Column::new(schema.field(idx).name().clone(), Vec::new()))
            .collect();

        for batch in builder.build()? {
            let batch = batch?;
            for (column, &idx) in columns.iter_mut().zip(&numeric) {
                let values = cast(batch.column(idx), &DataType::Float64)?;
                let values = values.as_primitive::<Float64Type>();
                column
                    .values
                    .extend(values.iter().map(|v| v.unwrap_or(f64::NAN)));
            }
        }

        Ok(Table { columns, metadata })
    }

    fn encode(&self, table: &Table, file: File) -> Result<(), StoreError> {
        if table.columns.is_empty() {
            return Err(StoreError::Schema(
                "a parquet dataset needs at least one column".to_string(),
            ));
        }

        let fields: Vec<Field> = table
            .columns
            .iter()
            .map(|c| Field::new(c.name.as_str(), DataType::Float64, true))
            .collect();
        let schema = Arc::new(Schema::new_with_metadata(
            fields,
            encode_metadata(&table.metadata)?,
        ));
        let arrays: Vec<ArrayRef> = table
            .columns
            .iter()
            .map(|c| Arc::new(Float64Array::from(c.values.clone())) as ArrayRef)
            .collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }
}

fn encode_metadata(metadata: &Metadata) -> Result<HashMap<String, String>, StoreError> {
    metadata
        .iter()
        .map(|(k, v)| Ok((k.clone(), serde_json::to_string(v)?)))
        .collect()
}

/// Values that are not valid JSON scalars (e.g. written by other tools) are
/// kept verbatim as strings.
fn decode_metadata(raw: &HashMap<String, String>) -> Metadata {
    raw.iter()
        .filter(|(k, _)| !k.starts_with("ARROW:"))
        .map(|(k, v)| {
            let value = serde_json::from_str::<MetadataValue>(v)
                .unwrap_or_else(|_| MetadataValue::String(v.clone()));
            (k.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};

    #[test]
    fn metadata_types_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.parquet");

        let mut metadata = Metadata::new();
        metadata.insert("ENBW".into(), MetadataValue::Float(30.0));
        metadata.insert("averages".into(), MetadataValue::Integer(16));
        metadata.insert("operator".into(), MetadataValue::String("lab".into()));
        metadata.insert("locked".into(), MetadataValue::Bool(false));
        let table = Table {
            columns: vec![
                Column::new("frequency", vec![1.0, 2.0, 3.0]),
                Column::new("psd", vec![0.5, f64::NAN, 0.25]),
            ],
            metadata,
        };

        ParquetStore.write_dataset(&path, &table).unwrap();
        let back = ParquetStore.read_table(&path).unwrap();

        assert_eq!(back.metadata, table.metadata);
        assert_eq!(back.columns[0], table.columns[0]);
        assert!(back.columns[1].values[1].is_nan());
        assert_eq!(back.columns[1].values[2], 0.25);
    }

    #[test]
    fn integer_columns_are_cast_and_text_columns_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.parquet");

        let mut raw_meta = HashMap::new();
        raw_meta.insert("comment".to_string(), "not json".to_string());
        let schema = Arc::new(Schema::new_with_metadata(
            vec![
                Field::new("bin", DataType::Int32, true),
                Field::new("label", DataType::Utf8, true),
                Field::new("power", DataType::Float64, true),
            ],
            raw_meta,
        ));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])) as ArrayRef,
                Arc::new(StringArray::from(vec!["a", "b", "c"])) as ArrayRef,
                Arc::new(Float64Array::from(vec![0.1, 0.2, 0.3])) as ArrayRef,
            ],
        )
        .unwrap();
        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = ParquetStore.read_table(&path).unwrap();
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["bin", "power"]);
        assert_eq!(table.columns[0].values[0], 1.0);
        assert!(table.columns[0].values[1].is_nan());
        assert_eq!(
            table.metadata["comment"],
            MetadataValue::String("not json".into())
        );
    }

    #[test]
    fn empty_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ParquetStore
            .write_dataset(&dir.path().join("empty.parquet"), &Table::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
        assert!(!dir.path().join("empty.parquet").exists());
    }
}
