// Integration tests for the Parquet partition writer

use std::fs::{self, File};
use std::sync::Arc;

use arrow::array::{Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use pqsplit_writer::{ErrorCode, ParquetPartitionWriter, PartitionWriter, WriterError};

fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("label", DataType::Utf8, true),
    ]))
}

fn batch(schema: &SchemaRef, start: i64, len: usize) -> RecordBatch {
    let ids: Vec<i64> = (start..start + len as i64).collect();
    let labels: Vec<Option<String>> = ids
        .iter()
        .map(|id| (id % 3 != 0).then(|| format!("row-{}", id)))
        .collect();
    RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(labels)),
        ],
    )
    .unwrap()
}

#[test]
fn written_file_reads_back_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ParquetPartitionWriter::in_dir(dir.path());
    let schema = schema();
    let batches = vec![batch(&schema, 0, 100), batch(&schema, 100, 50)];

    let written = writer.write(3, &batches, &schema).unwrap();
    assert_eq!(written.index, 3);
    assert_eq!(written.rows, 150);
    assert_eq!(written.path, dir.path().join("output_part_00003.parquet"));

    let bytes = fs::read(&written.path).unwrap();
    assert_eq!(written.bytes, bytes.len() as u64);
    assert_eq!(written.content_hash, blake3::hash(&bytes));

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&written.path).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let mut ids = Vec::new();
    for read in reader {
        let read = read.unwrap();
        assert_eq!(read.schema().fields(), schema.fields());
        let column = read
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        ids.extend(column.values().iter().copied());
    }
    assert_eq!(ids, (0..150).collect::<Vec<i64>>());
}

#[test]
fn file_metadata_records_partition_index() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ParquetPartitionWriter::new(dir.path(), 0);
    let schema = schema();

    let written = writer.write(12, &[batch(&schema, 0, 10)], &schema).unwrap();
    assert_eq!(written.path, dir.path().join("output_part_12.parquet"));

    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&written.path).unwrap())
        .unwrap();
    let kv = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .cloned()
        .unwrap_or_default();
    let index = kv
        .iter()
        .find(|entry| entry.key == "pqsplit.partition.index")
        .and_then(|entry| entry.value.clone());
    assert_eq!(index.as_deref(), Some("12"));
    assert!(kv.iter().any(|entry| entry.key == "pqsplit.version"));
}

#[test]
fn refuses_to_overwrite_committed_partition() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ParquetPartitionWriter::in_dir(dir.path());
    let schema = schema();

    let first = writer.write(0, &[batch(&schema, 0, 20)], &schema).unwrap();
    let before = fs::read(&first.path).unwrap();

    let err = writer
        .write(0, &[batch(&schema, 1000, 5)], &schema)
        .unwrap_err();
    assert!(matches!(err, WriterError::AlreadyExists { .. }));
    assert_eq!(err.code(), ErrorCode::E004AlreadyExists);
    assert_eq!(fs::read(&first.path).unwrap(), before);
}

#[test]
fn mismatched_batch_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ParquetPartitionWriter::in_dir(dir.path());
    let schema = schema();

    let other_schema = Arc::new(Schema::new(vec![Field::new(
        "value",
        DataType::Int64,
        false,
    )]));
    let other = RecordBatch::try_new(
        other_schema,
        vec![Arc::new(Int64Array::from(vec![1, 2]))],
    )
    .unwrap();

    let err = writer
        .write(1, &[batch(&schema, 0, 3), other], &schema)
        .unwrap_err();
    assert!(matches!(err, WriterError::SchemaMismatch { index: 1 }));
    assert!(!writer.path_for(1).exists());
}

#[test]
fn creates_missing_output_directory_and_leaves_no_staging_files() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested").join("out");
    let writer = ParquetPartitionWriter::in_dir(&nested);
    let schema = schema();

    writer.write(0, &[batch(&schema, 0, 4)], &schema).unwrap();
    writer.write(1, &[], &schema).unwrap();

    let mut names: Vec<String> = fs::read_dir(&nested)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["output_part_00000.parquet", "output_part_00001.parquet"]
    );

    let empty = ParquetRecordBatchReaderBuilder::try_new(
        File::open(writer.path_for(1)).unwrap(),
    )
    .unwrap();
    assert_eq!(empty.metadata().file_metadata().num_rows(), 0);
}

#[test]
fn nullable_column_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ParquetPartitionWriter::in_dir(dir.path());
    let schema = schema();

    let written = writer.write(0, &[batch(&schema, 0, 9)], &schema).unwrap();
    let mut reader = ParquetRecordBatchReaderBuilder::try_new(File::open(written.path).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let read = reader.next().unwrap().unwrap();
    let labels = read
        .column(1)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(labels.null_count(), 3);
    assert_eq!(labels.value(1), "row-1");
}
