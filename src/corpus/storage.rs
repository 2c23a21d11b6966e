//! Pool persistence (Arrow/Parquet)
//!
//! Each pool is one Parquet file with the columns
//! `(id: Int64, review: Utf8, sentiment: Utf8 nullable)`. A partition
//! directory holds `train.parquet`, `validation.parquet`,
//! `unlabeled.parquet` and, for simulated sessions, `oracle.parquet` with the
//! withheld ground truth of the unlabeled pool.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::debug;

use super::{Corpus, Example, ExampleId, Partition, Pool, Sentiment};
use crate::{Error, Result};

const TRAIN_FILE: &str = "train.parquet";
const VALIDATION_FILE: &str = "validation.parquet";
const UNLABELED_FILE: &str = "unlabeled.parquet";
const ORACLE_FILE: &str = "oracle.parquet";

fn pool_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("review", DataType::Utf8, false),
        Field::new("sentiment", DataType::Utf8, true),
    ]))
}

fn to_column_id(id: ExampleId) -> Result<i64> {
    i64::try_from(id.0)
        .map_err(|_| Error::DataIntegrity(format!("example id {id} does not fit an Int64 column")))
}

/// Write one pool to a Parquet file.
///
/// # Errors
///
/// Returns error if the file cannot be created or an id exceeds `i64::MAX`.
pub fn write_pool<P: AsRef<Path>>(path: P, pool: &Pool) -> Result<()> {
    let ids = pool
        .iter()
        .map(|e| to_column_id(e.id))
        .collect::<Result<Vec<i64>>>()?;
    let reviews: Vec<&str> = pool.iter().map(|e| e.text.as_str()).collect();
    let sentiments: Vec<Option<&str>> = pool.iter().map(|e| e.label.map(Sentiment::as_str)).collect();

    let schema = pool_schema();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(ids)),
        Arc::new(StringArray::from(reviews)),
        Arc::new(StringArray::from(sentiments)),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let file = File::create(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet file: {e}")))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;

    debug!(path = %path.as_ref().display(), rows = pool.len(), "wrote pool");
    Ok(())
}

/// Read one pool from a Parquet file.
///
/// # Errors
///
/// Returns error if the file cannot be read, a required column is missing or
/// has the wrong type, or a sentiment value is not `positive`/`negative`.
pub fn read_pool<P: AsRef<Path>>(path: P) -> Result<Pool> {
    let file = File::open(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut pool = Pool::new();
    for batch in reader {
        let batch = batch?;
        for example in examples_from_batch(&batch)? {
            if pool.insert(example).is_some() {
                return Err(Error::DataIntegrity(format!(
                    "duplicate id in {}",
                    path.as_ref().display()
                )));
            }
        }
    }

    debug!(path = %path.as_ref().display(), rows = pool.len(), "read pool");
    Ok(pool)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let index = batch.schema().index_of(name)?;
    batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::StorageError(format!("column '{name}' is not Utf8")))
}

fn examples_from_batch(batch: &RecordBatch) -> Result<Vec<Example>> {
    let id_index = batch.schema().index_of("id")?;
    let ids = batch
        .column(id_index)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| Error::StorageError("column 'id' is not Int64".to_string()))?;
    let reviews = string_column(batch, "review")?;
    let sentiments = string_column(batch, "sentiment")?;

    let mut examples = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        if ids.is_null(row) || reviews.is_null(row) {
            return Err(Error::DataIntegrity(format!("null id or review at row {row}")));
        }
        let raw_id = ids.value(row);
        let id = u64::try_from(raw_id)
            .map_err(|_| Error::DataIntegrity(format!("negative example id {raw_id}")))?;
        let label = if sentiments.is_null(row) {
            None
        } else {
            Some(sentiments.value(row).parse::<Sentiment>()?)
        };
        examples.push(Example {
            id: ExampleId(id),
            text: reviews.value(row).to_string(),
            label,
        });
    }
    Ok(examples)
}

/// Persist a partition into `dir` (created if missing).
///
/// # Errors
///
/// Returns error if the directory or any file cannot be written.
pub fn write_partition<P: AsRef<Path>>(dir: P, partition: &Partition) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    write_pool(dir.join(TRAIN_FILE), partition.corpus.training())?;
    write_pool(dir.join(VALIDATION_FILE), partition.corpus.validation())?;
    write_pool(dir.join(UNLABELED_FILE), partition.corpus.unlabeled())?;

    let oracle: Pool = partition
        .withheld
        .iter()
        .map(|(id, label)| Example {
            id: *id,
            text: String::new(),
            label: Some(*label),
        })
        .collect();
    write_pool(dir.join(ORACLE_FILE), &oracle)
}

/// Load a partition written by [`write_partition`].
///
/// `oracle.parquet` is optional; without it the withheld map is empty and
/// labels must come from a real labeling interface.
///
/// # Errors
///
/// Returns error if a pool file is unreadable or the pools violate corpus
/// invariants.
pub fn read_partition<P: AsRef<Path>>(dir: P) -> Result<Partition> {
    let dir = dir.as_ref();
    let corpus = Corpus::new(
        read_pool(dir.join(TRAIN_FILE))?,
        read_pool(dir.join(VALIDATION_FILE))?,
        read_pool(dir.join(UNLABELED_FILE))?,
    )?;

    let oracle_path = dir.join(ORACLE_FILE);
    let withheld: BTreeMap<ExampleId, Sentiment> = if oracle_path.exists() {
        read_pool(oracle_path)?
            .iter()
            .filter_map(|e| e.label.map(|label| (e.id, label)))
            .collect()
    } else {
        BTreeMap::new()
    };

    Ok(Partition { corpus, withheld })
}
