//! Partition writer trait and the Parquet file implementation

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use tracing::{debug, info};

use crate::encoding::encode_partition;
use crate::error::{Result, WriterError};
use crate::partition::{partition_file_name, staging_file_name, DEFAULT_INDEX_WIDTH};

/// Result of a committed partition write
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenPartition {
    /// Partition index the file was written for
    pub index: u64,
    /// Location of the committed file
    pub path: PathBuf,
    /// Number of rows in the file
    pub rows: usize,
    /// File size in bytes
    pub bytes: u64,
    /// blake3 hash of the file contents
    pub content_hash: blake3::Hash,
}

/// Persists one partition under a location derived from its index.
///
/// Writers are shared by every worker of a pool, so implementations must be
/// safe to call concurrently for distinct indices. Writing an index whose
/// output was already committed must fail without touching that output.
pub trait PartitionWriter: Send + Sync {
    fn write(
        &self,
        index: u64,
        batches: &[RecordBatch],
        schema: &SchemaRef,
    ) -> Result<WrittenPartition>;
}

/// Writes each partition as a Snappy-compressed Parquet file in one directory.
#[derive(Clone, Debug)]
pub struct ParquetPartitionWriter {
    output_dir: PathBuf,
    index_width: usize,
}

impl ParquetPartitionWriter {
    pub fn new(output_dir: impl Into<PathBuf>, index_width: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            index_width,
        }
    }

    /// Writer using the default index width.
    pub fn in_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self::new(output_dir, DEFAULT_INDEX_WIDTH)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Final location of partition `index`.
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.output_dir
            .join(partition_file_name(index, self.index_width))
    }

    /// Create the output directory if it does not exist yet.
    pub fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| WriterError::io(&self.output_dir, e))
    }

    fn stage(&self, index: u64, bytes: &[u8]) -> Result<PathBuf> {
        let staging = self
            .output_dir
            .join(staging_file_name(index, self.index_width));
        write_staged(&staging, |file| {
            file.write_all(bytes)?;
            file.sync_all()
        })?;
        Ok(staging)
    }

    /// Move the staged file to its final name without replacing anything.
    fn commit(&self, staging: &Path, target: &Path) -> Result<()> {
        // A hard link fails atomically when the target exists
        let linked = fs::hard_link(staging, target);
        let _ = fs::remove_file(staging);
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(WriterError::AlreadyExists {
                    path: target.to_path_buf(),
                })
            }
            Err(e) => Err(WriterError::io(target, e)),
        }
    }
}

impl PartitionWriter for ParquetPartitionWriter {
    fn write(
        &self,
        index: u64,
        batches: &[RecordBatch],
        schema: &SchemaRef,
    ) -> Result<WrittenPartition> {
        if batches
            .iter()
            .any(|batch| batch.schema().fields() != schema.fields())
        {
            return Err(WriterError::SchemaMismatch { index });
        }

        let target = self.path_for(index);
        if target.exists() {
            return Err(WriterError::AlreadyExists { path: target });
        }

        let (bytes, rows) = encode_partition(index, batches, schema)
            .map_err(|source| WriterError::Parquet { index, source })?;
        let content_hash = blake3::hash(&bytes);
        debug!(
            partition_index = index,
            rows,
            bytes = bytes.len(),
            hash = %content_hash.to_hex(),
            "Encoded partition"
        );

        self.ensure_output_dir()?;
        let staging = self.stage(index, &bytes)?;
        self.commit(&staging, &target)?;

        info!(
            partition_index = index,
            rows,
            path = %target.display(),
            "Wrote partition file"
        );

        Ok(WrittenPartition {
            index,
            path: target,
            rows,
            bytes: bytes.len() as u64,
            content_hash,
        })
    }
}

/// Create `staging` and fill it with `fill`; a partial file is removed on failure.
fn write_staged<F>(staging: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(staging)
        .map_err(|e| WriterError::io(staging, e))?;
    let filled = fill(&mut file);
    drop(file);
    filled.map_err(|e| {
        let _ = fs::remove_file(staging);
        WriterError::io(staging, e)
    })
}
