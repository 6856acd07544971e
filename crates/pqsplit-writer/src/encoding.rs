// Parquet encoding of a partition
//
// Every partition file shares one set of writer properties: Snappy
// compression, dictionary encoding and page statistics. The Arrow schema is
// embedded by ArrowWriter so readers recover the exact column types.

use std::sync::OnceLock;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::errors::ParquetError;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

const DEFAULT_ROW_GROUP_SIZE: usize = 32 * 1024;
static ROW_GROUP_SIZE: OnceLock<usize> = OnceLock::new();

/// Metadata key holding the partition index of a file
pub(crate) const PARTITION_INDEX_KEY: &str = "pqsplit.partition.index";

/// Configure the global Parquet row group size used by partition writers.
///
/// Must be called before the first partition is written. Subsequent calls
/// are ignored to preserve the existing writer properties cache.
pub fn set_parquet_row_group_size(row_group_size: usize) {
    if row_group_size == 0 {
        return;
    }

    let _ = ROW_GROUP_SIZE.set(row_group_size);
}

fn configured_row_group_size() -> usize {
    ROW_GROUP_SIZE
        .get()
        .copied()
        .unwrap_or(DEFAULT_ROW_GROUP_SIZE)
}

/// Get shared writer properties (cached)
///
/// - Snappy compression
/// - Dictionary encoding enabled
/// - 32k rows per group by default (configurable)
/// - Writer version embedded in file metadata
pub(crate) fn writer_properties() -> &'static WriterProperties {
    static PROPERTIES: OnceLock<WriterProperties> = OnceLock::new();
    PROPERTIES.get_or_init(|| {
        let metadata = vec![KeyValue {
            key: "pqsplit.version".to_string(),
            value: Some(env!("CARGO_PKG_VERSION").to_string()),
        }];

        WriterProperties::builder()
            .set_dictionary_enabled(true)
            .set_statistics_enabled(EnabledStatistics::Page)
            .set_compression(Compression::SNAPPY)
            .set_data_page_size_limit(256 * 1024)
            .set_write_batch_size(32 * 1024)
            .set_max_row_group_size(configured_row_group_size())
            .set_dictionary_page_size_limit(128 * 1024)
            .set_key_value_metadata(Some(metadata))
            .build()
    })
}

/// Encode the batches of one partition into an in-memory Parquet file.
///
/// Returns the file bytes and the number of rows written.
pub(crate) fn encode_partition(
    index: u64,
    batches: &[RecordBatch],
    schema: &SchemaRef,
) -> Result<(Vec<u8>, usize), ParquetError> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(
        &mut buffer,
        schema.clone(),
        Some(writer_properties().clone()),
    )?;
    writer.append_key_value_metadata(KeyValue {
        key: PARTITION_INDEX_KEY.to_string(),
        value: Some(index.to_string()),
    });

    let mut rows = 0usize;
    for batch in batches {
        writer.write(batch)?;
        rows += batch.num_rows();
    }
    writer.close()?;

    Ok((buffer, rows))
}
