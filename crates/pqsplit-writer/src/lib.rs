//! Partition writers for pqsplit
//!
//! A partition is an ordered group of Arrow record batches sharing one
//! schema. Writers persist it under a name derived only from the partition
//! index, so re-running a split over the same input yields the same file
//! names.

mod encoding;
mod error;
mod partition;
mod writer;

pub use encoding::set_parquet_row_group_size;
pub use error::{ErrorCode, Result, WriterError};
pub use partition::{partition_file_name, DEFAULT_INDEX_WIDTH, PARTITION_FILE_PREFIX};
pub use writer::{ParquetPartitionWriter, PartitionWriter, WrittenPartition};
