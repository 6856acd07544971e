// End-to-end tests: Parquet file in, partition files out

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use pqsplit_batch::{
    BatchSource, ParquetFileSource, PartitionAccumulator, SourceError, SplitOptions,
};
use pqsplit_pool::WorkerPool;
use pqsplit_writer::ParquetPartitionWriter;

fn input_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("city", DataType::Utf8, false),
    ]))
}

/// Write `rows` rows to `path` in a single row group.
fn write_input(path: &Path, rows: usize) {
    let schema = input_schema();
    let ids: Vec<i64> = (0..rows as i64).collect();
    let cities: Vec<&str> = ids
        .iter()
        .map(|id| ["Lisbon", "Oslo", "Quito"][*id as usize % 3])
        .collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(cities)),
        ],
    )
    .unwrap();

    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn read_ids(path: &Path) -> Vec<i64> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let mut ids = Vec::new();
    for batch in reader {
        let batch = batch.unwrap();
        let column = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        ids.extend(column.values().iter().copied());
    }
    ids
}

#[test]
fn file_source_yields_fixed_size_batches() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.parquet");
    write_input(&input, 5000);

    let mut source = ParquetFileSource::open(&input).unwrap();
    assert_eq!(source.total_rows(), 5000);
    assert_eq!(source.schema().unwrap().fields(), input_schema().fields());

    let mut sizes = Vec::new();
    while let Some(batch) = source.next_batch().unwrap() {
        sizes.push(batch.num_rows());
    }
    assert_eq!(sizes, vec![2048, 2048, 904]);
}

#[test]
fn projection_keeps_only_requested_columns() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.parquet");
    write_input(&input, 10);

    let mut source =
        ParquetFileSource::with_options(&input, 4, &["city".to_string()]).unwrap();
    let schema = source.schema().unwrap();
    assert_eq!(schema.fields().len(), 1);
    assert_eq!(schema.field(0).name(), "city");

    let batch = source.next_batch().unwrap().unwrap();
    assert_eq!(batch.num_columns(), 1);
    assert_eq!(batch.num_rows(), 4);
    let cities = batch
        .column(0)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(cities.value(1), "Oslo");
}

#[test]
fn unknown_projection_column_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.parquet");
    write_input(&input, 10);

    let err = ParquetFileSource::with_options(&input, 4, &["country".to_string()])
        .err()
        .unwrap();
    match err {
        SourceError::UnknownColumn { name, available } => {
            assert_eq!(name, "country");
            assert_eq!(available, "id, city");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn split_writes_partition_files_and_returns_remainder() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.parquet");
    let output = dir.path().join("out");
    write_input(&input, 10_000);

    let mut source = ParquetFileSource::open(&input).unwrap();
    let pool = WorkerPool::new(4, Some(8)).unwrap();
    let writer = Arc::new(ParquetPartitionWriter::in_dir(&output));
    let options = SplitOptions {
        flush_threshold_rows: 4096,
        full_batch_rows: Some(2048),
        ..SplitOptions::default()
    };

    let outcome = PartitionAccumulator::new(options)
        .run(&mut source, &pool, writer)
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.written_indices(), vec![0, 1]);
    let mut names: Vec<String> = fs::read_dir(&output)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["output_part_00000.parquet", "output_part_00001.parquet"]
    );

    assert_eq!(read_ids(&output.join(&names[0])), (0..4096).collect::<Vec<i64>>());
    assert_eq!(read_ids(&output.join(&names[1])), (4096..8192).collect::<Vec<i64>>());

    // The short fifth batch ends the stream
    let remainder = outcome.table.concat().unwrap();
    assert_eq!(remainder.num_rows(), 10_000 - 8192);
    assert_eq!(remainder.column(0).len(), 1808);
}

#[test]
fn identical_input_produces_identical_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.parquet");
    write_input(&input, 9000);

    let run = |out: &Path| {
        let mut source = ParquetFileSource::open(&input).unwrap();
        let pool = WorkerPool::new(3, None).unwrap();
        let writer = Arc::new(ParquetPartitionWriter::in_dir(out));
        PartitionAccumulator::new(SplitOptions::with_threshold(2048))
            .run(&mut source, &pool, writer)
            .unwrap()
    };

    let first = run(&dir.path().join("a"));
    let second = run(&dir.path().join("b"));

    assert_eq!(first.written.len(), 4);
    assert_eq!(first.written_indices(), second.written_indices());
    for (a, b) in first.written.iter().zip(&second.written) {
        assert_eq!(a.path.file_name(), b.path.file_name());
        assert_eq!(a.rows, b.rows);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(read_ids(&a.path), read_ids(&b.path));
    }
    assert_eq!(first.table.num_rows(), second.table.num_rows());
}
