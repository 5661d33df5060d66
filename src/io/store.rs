//! Dataset storage.
//!
//! A dataset file is a table of named numeric columns plus string-keyed scalar
//! metadata. Concrete formats implement [`DatasetStore`]; callers pick one with
//! [`store_for_path`] (dispatch by extension).
//!
//! Writes replace the file atomically (sibling temp file + rename), so an
//! interrupted metadata update never leaves a truncated dataset behind.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::{Curve, FitResult, Metadata};
use crate::error::StoreError;
use crate::io::json_store::JsonStore;
use crate::io::parquet_store::ParquetStore;

/// One named numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Whole contents of a dataset file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub metadata: Metadata,
}

impl Table {
    /// Build the `(x, y)` curve described by `selection`.
    pub fn curve(&self, selection: &ColumnSelection) -> Result<Curve, StoreError> {
        let x = self.pick(selection.x.as_deref(), 0, "x")?;
        let y = self.pick(selection.y.as_deref(), 1, "y")?;
        Curve::new(x.name.clone(), y.name.clone(), x.values.clone(), y.values.clone())
    }

    fn pick(&self, name: Option<&str>, fallback: usize, axis: &str) -> Result<&Column, StoreError> {
        match name {
            Some(name) => self.columns.iter().find(|c| c.name == name).ok_or_else(|| {
                let available: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
                StoreError::Schema(format!(
                    "no column '{name}' for {axis} (available: {})",
                    available.join(", ")
                ))
            }),
            None => self.columns.get(fallback).ok_or_else(|| {
                StoreError::Schema(format!(
                    "dataset has {} column(s); cannot default {axis} to column {}",
                    self.columns.len(),
                    fallback + 1
                ))
            }),
        }
    }
}

/// Which columns hold x and y. Unset names mean the first and second column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    pub x: Option<String>,
    pub y: Option<String>,
}

/// A loaded dataset: where it came from, the selected curve, its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub path: PathBuf,
    pub curve: Curve,
    pub metadata: Metadata,
}

/// A file format able to hold a [`Table`].
pub trait DatasetStore: Send + Sync {
    fn format_name(&self) -> &'static str;

    fn read_table(&self, path: &Path) -> Result<Table, StoreError>;

    /// Serialize `table` into `file` (a fresh temp file next to the target).
    fn encode(&self, table: &Table, file: File) -> Result<(), StoreError>;

    fn read_columns(&self, path: &Path) -> Result<Vec<Column>, StoreError> {
        Ok(self.read_table(path)?.columns)
    }

    fn read_metadata(&self, path: &Path) -> Result<Metadata, StoreError> {
        Ok(self.read_table(path)?.metadata)
    }

    /// Merge `updates` into the stored metadata (last write wins; keys not in
    /// `updates` are kept). Columns are left untouched.
    fn write_metadata(&self, path: &Path, updates: &Metadata) -> Result<(), StoreError> {
        let mut table = self.read_table(path)?;
        for (k, v) in updates {
            table.metadata.insert(k.clone(), v.clone());
        }
        self.write_dataset(path, &table)
    }

    /// Create or replace the file at `path`.
    fn write_dataset(&self, path: &Path, table: &Table) -> Result<(), StoreError> {
        replace_file(path, |file| self.encode(table, file))
    }
}

/// File extensions with a store.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["json", "parquet", "pq"];

static JSON_STORE: JsonStore = JsonStore;
static PARQUET_STORE: ParquetStore = ParquetStore;

/// Select the store for `path` by extension (case-insensitive).
pub fn store_for_path(path: &Path) -> Result<&'static dyn DatasetStore, StoreError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => Ok(&JSON_STORE),
        "parquet" | "pq" => Ok(&PARQUET_STORE),
        _ => Err(StoreError::UnsupportedFormat(format!(
            "{} (expected one of: .{})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", .")
        ))),
    }
}

pub fn is_supported(path: &Path) -> bool {
    store_for_path(path).is_ok()
}

/// Read the file at `path` and select its curve.
pub fn load_dataset(path: &Path, selection: &ColumnSelection) -> Result<Dataset, StoreError> {
    let store = store_for_path(path)?;
    let table = store.read_table(path)?;
    let curve = table.curve(selection)?;
    debug!(
        "loaded {} ({}): {} points, {} metadata keys",
        path.display(),
        store.format_name(),
        curve.len(),
        table.metadata.len()
    );
    Ok(Dataset {
        path: path.to_path_buf(),
        curve,
        metadata: table.metadata,
    })
}

/// Persist fitted parameters into the dataset's metadata.
pub fn merge_fit_result(
    store: &dyn DatasetStore,
    path: &Path,
    result: &FitResult,
) -> Result<Metadata, StoreError> {
    let mut updates = Metadata::new();
    result.merge_into(&mut updates);
    store.write_metadata(path, &updates)?;
    debug!("wrote {} fit keys to {}", updates.len(), path.display());
    Ok(updates)
}

/// Write through a sibling temp file, then rename over `path`.
pub fn replace_file<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(File) -> Result<(), StoreError>,
{
    let tmp = temp_sibling(path);
    let file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
    if let Err(err) = write(file) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Lineshape, MetadataValue};

    fn table() -> Table {
        let mut metadata = Metadata::new();
        metadata.insert("ENBW".into(), MetadataValue::Float(30.0));
        Table {
            columns: vec![
                Column::new("frequency", vec![1.0, 2.0, 3.0]),
                Column::new("psd", vec![0.1, 0.4, 0.2]),
                Column::new("phase", vec![0.0, 0.5, 1.0]),
            ],
            metadata,
        }
    }

    #[test]
    fn default_selection_uses_first_two_columns() {
        let curve = table().curve(&ColumnSelection::default()).unwrap();
        assert_eq!(curve.x_name, "frequency");
        assert_eq!(curve.y_name, "psd");
        assert_eq!(curve.y, vec![0.1, 0.4, 0.2]);
    }

    #[test]
    fn named_selection_and_unknown_names() {
        let sel = ColumnSelection {
            x: None,
            y: Some("phase".into()),
        };
        assert_eq!(table().curve(&sel).unwrap().y_name, "phase");

        let bad = ColumnSelection {
            x: Some("time".into()),
            y: None,
        };
        assert!(matches!(table().curve(&bad), Err(StoreError::Schema(_))));
    }

    #[test]
    fn single_column_table_has_no_default_y() {
        let t = Table {
            columns: vec![Column::new("x", vec![1.0])],
            metadata: Metadata::new(),
        };
        assert!(matches!(
            t.curve(&ColumnSelection::default()),
            Err(StoreError::Schema(_))
        ));
    }

    #[test]
    fn dispatch_by_extension() {
        assert_eq!(store_for_path(Path::new("a/b.JSON")).unwrap().format_name(), "json");
        assert_eq!(store_for_path(Path::new("b.pq")).unwrap().format_name(), "parquet");
        assert!(matches!(
            store_for_path(Path::new("b.pickle")),
            Err(StoreError::UnsupportedFormat(_))
        ));
        assert!(!is_supported(Path::new("noext")));
    }

    #[test]
    fn merge_keeps_columns_and_unrelated_metadata() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["scan.json", "scan.parquet"] {
            let path = dir.path().join(name);
            let store = store_for_path(&path).unwrap();
            store.write_dataset(&path, &table()).unwrap();

            let result = FitResult::from_params(Lineshape::Gauss, &[0.0, 2.0, 0.4, 0.5]);
            merge_fit_result(store, &path, &result).unwrap();
            // second write wins
            let result = FitResult::from_params(Lineshape::Gauss, &[0.0, 2.5, 0.4, 0.5]);
            merge_fit_result(store, &path, &result).unwrap();

            let back = store.read_table(&path).unwrap();
            assert_eq!(back.columns, table().columns, "{name}");
            assert_eq!(back.metadata["ENBW"].as_f64(), Some(30.0));
            assert_eq!(back.metadata["Gauss_eigenfrequency"].as_f64(), Some(2.5));
            assert_eq!(back.metadata.len(), 5);
            assert!(!dir.path().join(format!(".{name}.tmp")).exists());
        }
    }

    #[test]
    fn load_dataset_selects_curve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        JsonStore.write_dataset(&path, &table()).unwrap();

        let ds = load_dataset(&path, &ColumnSelection::default()).unwrap();
        assert_eq!(ds.path, path);
        assert_eq!(ds.curve.len(), 3);
        assert_eq!(ds.metadata.len(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dataset(&dir.path().join("nope.json"), &ColumnSelection::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
