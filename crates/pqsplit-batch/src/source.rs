// Batch sources feeding the accumulator
//
// A source reports its schema once and then yields batches until it returns
// Ok(None), the explicit end-of-stream marker.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;
use tracing::debug;

use crate::error::SourceError;

/// Rows per batch the file source yields unless configured otherwise
pub const DEFAULT_SOURCE_BATCH_SIZE: usize = 2048;

/// Producer of row batches sharing one schema.
pub trait BatchSource {
    /// Schema every batch of this source conforms to.
    fn schema(&mut self) -> Result<SchemaRef, SourceError>;

    /// Next batch, or `Ok(None)` once the source is exhausted.
    fn next_batch(&mut self) -> Result<Option<RecordBatch>, SourceError>;
}

impl<S: BatchSource + ?Sized> BatchSource for Box<S> {
    fn schema(&mut self) -> Result<SchemaRef, SourceError> {
        (**self).schema()
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, SourceError> {
        (**self).next_batch()
    }
}

/// Scans a Parquet file in fixed-size batches.
pub struct ParquetFileSource {
    path: PathBuf,
    schema: SchemaRef,
    total_rows: i64,
    reader: ParquetRecordBatchReader,
}

impl ParquetFileSource {
    /// Open `path` with the default batch size, reading every column.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Self::with_options(path, DEFAULT_SOURCE_BATCH_SIZE, &[])
    }

    /// Open `path`, yielding `batch_size` rows per batch.
    ///
    /// A non-empty `columns` list projects the scan onto those top-level
    /// columns, in file order.
    pub fn with_options(
        path: impl AsRef<Path>,
        batch_size: usize,
        columns: &[String],
    ) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| SourceError::Open {
            path: path.clone(),
            source,
        })?;

        let mut builder = ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(batch_size);
        let total_rows = builder.metadata().file_metadata().num_rows();

        if !columns.is_empty() {
            let file_schema = builder.schema().clone();
            let mut indices = Vec::with_capacity(columns.len());
            for name in columns {
                let index = file_schema
                    .index_of(name)
                    .map_err(|_| SourceError::UnknownColumn {
                        name: name.clone(),
                        available: file_schema
                            .fields()
                            .iter()
                            .map(|f| f.name().as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })?;
                indices.push(index);
            }
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
            builder = builder.with_projection(mask);
        }

        let reader = builder.build()?;
        let schema = reader.schema();

        debug!(
            path = %path.display(),
            total_rows,
            batch_size,
            columns = schema.fields().len(),
            "Opened parquet source"
        );

        Ok(Self {
            path,
            schema,
            total_rows,
            reader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Row count recorded in the file footer.
    pub fn total_rows(&self) -> i64 {
        self.total_rows
    }
}

impl BatchSource for ParquetFileSource {
    fn schema(&mut self) -> Result<SchemaRef, SourceError> {
        Ok(self.schema.clone())
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, SourceError> {
        self.reader.next().transpose().map_err(SourceError::from)
    }
}

/// Adapts an iterator of batches into a source.
pub struct IterSource<I> {
    schema: SchemaRef,
    iter: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Result<RecordBatch, SourceError>>,
{
    pub fn new(schema: SchemaRef, iter: I) -> Self {
        Self { schema, iter }
    }
}

impl IterSource<std::vec::IntoIter<Result<RecordBatch, SourceError>>> {
    /// Source yielding `batches` in order.
    pub fn from_batches(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        let items: Vec<_> = batches.into_iter().map(Ok).collect();
        Self::new(schema, items.into_iter())
    }
}

impl<I> BatchSource for IterSource<I>
where
    I: Iterator<Item = Result<RecordBatch, SourceError>>,
{
    fn schema(&mut self) -> Result<SchemaRef, SourceError> {
        Ok(self.schema.clone())
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, SourceError> {
        self.iter.next().transpose()
    }
}
